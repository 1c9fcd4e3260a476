// crates/export-core/src/trim.rs
//
// Pure mapping between the effective (trimmed) output timeline and the
// source recording's timeline. No I/O, no ffmpeg.

use crate::model::TrimRegion;

/// Maps an effective-timeline offset to the corresponding source-timeline
/// offset, walking a sorted, non-overlapping list of trim regions.
#[derive(Debug, Clone)]
pub struct TrimMapper {
    trims: Vec<TrimRegion>,
}

impl TrimMapper {
    /// Sorts the given regions by `start_ms` once; unsorted input is fine.
    pub fn new(mut trims: Vec<TrimRegion>) -> Self {
        trims.sort_by_key(|t| t.start_ms);
        TrimMapper { trims }
    }

    /// Walks the sorted trim list; for each trim whose start lies at or
    /// before the running source offset, its length is skipped over.
    pub fn map(&self, effective_ms: i64) -> i64 {
        let mut source = effective_ms;
        for trim in &self.trims {
            if trim.start_ms <= source {
                source += trim.len_ms();
            } else {
                break;
            }
        }
        source
    }

    pub fn effective_duration_ms(&self, source_duration_ms: i64) -> i64 {
        let trimmed: i64 = self.trims.iter().map(TrimRegion::len_ms).sum();
        source_duration_ms - trimmed
    }

    pub fn trims(&self) -> &[TrimRegion] {
        &self.trims
    }

    /// The source-timeline spans NOT covered by any trim, in order — the
    /// segments a decode pass actually needs to visit to cover the whole
    /// effective timeline.
    pub fn retained_ranges(&self, source_duration_ms: i64) -> Vec<(i64, i64)> {
        let mut ranges = Vec::new();
        let mut cursor = 0i64;
        for trim in &self.trims {
            if trim.start_ms > cursor {
                ranges.push((cursor, trim.start_ms));
            }
            cursor = cursor.max(trim.end_ms);
        }
        if cursor < source_duration_ms {
            ranges.push((cursor, source_duration_ms));
        }
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trim(start: i64, end: i64) -> TrimRegion {
        TrimRegion { start_ms: start, end_ms: end }
    }

    #[test]
    fn no_trims_is_identity() {
        let m = TrimMapper::new(vec![]);
        assert_eq!(m.map(0), 0);
        assert_eq!(m.map(5000), 5000);
    }

    #[test]
    fn trim_at_zero_maps_effective_zero_to_trim_end() {
        let m = TrimMapper::new(vec![trim(0, 500)]);
        assert_eq!(m.map(0), 500);
    }

    #[test]
    fn e2_single_trim_2000_4000() {
        let m = TrimMapper::new(vec![trim(2000, 4000)]);
        // Effective 2000ms (frame 60 at 30fps) maps to source 4000ms.
        assert_eq!(m.map(2000), 4000);
    }

    #[test]
    fn e3_two_trims_mapping_check() {
        let m = TrimMapper::new(vec![trim(1000, 2000), trim(5000, 6000)]);
        assert_eq!(m.map(1000), 2000);
        assert_eq!(m.map(4000), 6000);
    }

    #[test]
    fn property_three_trims_formula() {
        let (a, b, c, d) = (1000, 2000, 6000, 7000);
        let m = TrimMapper::new(vec![trim(a, b), trim(c, d)]);
        assert_eq!(m.map(500), 500); // x < a
        assert_eq!(m.map(3000), 3000 + (b - a)); // a <= x < c-(b-a)
        assert_eq!(m.map(6000), 6000 + (b - a) + (d - c)); // thereafter
    }

    #[test]
    fn unsorted_input_is_sorted_at_construction() {
        let m = TrimMapper::new(vec![trim(5000, 6000), trim(1000, 2000)]);
        assert_eq!(m.trims()[0].start_ms, 1000);
        assert_eq!(m.trims()[1].start_ms, 5000);
    }

    #[test]
    fn effective_duration_subtracts_all_trims() {
        let m = TrimMapper::new(vec![trim(1000, 2000), trim(5000, 6000)]);
        assert_eq!(m.effective_duration_ms(10_000), 8_000);
    }

    #[test]
    fn retained_ranges_complement_the_trims() {
        let m = TrimMapper::new(vec![trim(1000, 2000), trim(5000, 6000)]);
        assert_eq!(m.retained_ranges(10_000), vec![(0, 1000), (2000, 5000), (6000, 10_000)]);
    }

    #[test]
    fn retained_ranges_handles_no_trims() {
        let m = TrimMapper::new(vec![]);
        assert_eq!(m.retained_ranges(5000), vec![(0, 5000)]);
    }

    #[test]
    fn retained_ranges_handles_trim_at_start() {
        let m = TrimMapper::new(vec![trim(0, 500)]);
        assert_eq!(m.retained_ranges(2000), vec![(500, 2000)]);
    }
}
