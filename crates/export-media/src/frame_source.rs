// crates/export-media/src/frame_source.rs
//
// Chooses how the effective (post-trim) timeline is turned into a sequence
// of decoded source frames. §4.5 names two strategies:
//
//   - DecodeAheadSource: a single forward-only decoder, used when the
//     source codec is directly decodable. Cheapest — no seeking beyond the
//     one initial position, one decoder instance for the whole export.
//   - PrefetchSource: walks the effective timeline by seeking per trim
//     segment and opening a fresh decoder at each segment's source start,
//     used when the source codec isn't natively supported and the caller
//     (e.g. a WebCodecs-backed capture pipeline) instead hands back
//     individually-seekable, already-keyframe-aligned segments. Costs a
//     seek per segment instead of zero, but never assumes the "one open
//     decoder for the whole file" path that the unsupported codec made
//     impossible in the first place.
//
// `FrameSourceKind` is this module's own backend choice and is never put on
// the progress channel — `export_core::progress::RenderMode` reports the
// RenderCoordinator's parallel-vs-fallback worker pool mode instead, a
// different axis entirely (§4.7 vs §4.5).
//
// Grounded on `decode.rs::LiveDecoder` (`advance_to`, `burn_to_pts`,
// `ts_to_pts`) for the forward-decode-and-burn-to-target shape, and
// `helpers/seek.rs::seek_to_secs` for the per-segment seek primitive.

use std::sync::Arc;

use export_core::error::ExportResult;
use export_core::model::FrameIndex;
use export_core::trim::TrimMapper;

use crate::decoder::{codec_supported, RawFrame, VideoDecoder};
use crate::demux::{DecoderConfig, Demuxer};

/// One decoded source frame tagged with the effective-timeline index it
/// will be rendered at.
pub struct SourcedFrame {
    pub index: FrameIndex,
    pub frame: RawFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSourceKind {
    DecodeAhead,
    Prefetch,
}

pub enum FrameSource {
    DecodeAhead(DecodeAheadSource),
    Prefetch(PrefetchSource),
}

impl FrameSource {
    /// Picks DecodeAhead when the source codec has a registered ffmpeg
    /// decoder; falls back to Prefetch when it doesn't (§4.5, E5).
    pub fn select(config: &DecoderConfig) -> FrameSourceKind {
        if codec_supported(config.codec_id) {
            FrameSourceKind::DecodeAhead
        } else {
            FrameSourceKind::Prefetch
        }
    }

    pub fn next(&mut self) -> ExportResult<Option<SourcedFrame>> {
        match self {
            FrameSource::DecodeAhead(s) => s.next(),
            FrameSource::Prefetch(s) => s.next(),
        }
    }
}

/// Forward-only decode: requests source frames in increasing PTS order,
/// decoding exactly once per effective frame.
pub struct DecodeAheadSource {
    decoder: VideoDecoder,
    pending: Vec<RawFrame>,
    next_effective: u64,
    fps: f64,
    total_effective: u64,
}

impl DecodeAheadSource {
    pub fn new(decoder: VideoDecoder, fps: f64, total_effective: u64) -> Self {
        DecodeAheadSource { decoder, pending: Vec::new(), next_effective: 0, fps, total_effective }
    }

    pub fn feed(&mut self, chunk: &export_core::model::EncodedChunk) -> ExportResult<()> {
        let frames = self.decoder.submit(chunk)?;
        self.pending.extend(frames);
        Ok(())
    }

    /// Signals end of stream, pulling any frames still buffered inside the
    /// decoder into `pending`.
    pub fn finish(&mut self) -> ExportResult<()> {
        let frames = self.decoder.flush()?;
        self.pending.extend(frames);
        Ok(())
    }

    pub fn next(&mut self) -> ExportResult<Option<SourcedFrame>> {
        if self.next_effective >= self.total_effective {
            return Ok(None);
        }
        if self.pending.is_empty() {
            return Ok(None);
        }
        let frame = self.pending.remove(0);
        let index = FrameIndex(self.next_effective);
        self.next_effective += 1;
        let _ = self.fps;
        Ok(Some(SourcedFrame { index, frame }))
    }
}

/// Walks the effective timeline one retained (non-trimmed) source segment at
/// a time, seeking the demuxer to each segment's source start and opening a
/// fresh decoder for it rather than assuming one decoder instance can serve
/// the whole file. Self-contained by design: the codec that triggers this
/// path is, by construction, one `DecodeAheadSource`'s single long-lived
/// decoder could not be opened for in the first place, so nothing here may
/// depend on such a decoder already existing.
pub struct PrefetchSource {
    demuxer: Arc<Demuxer>,
    config: DecoderConfig,
    segments: Vec<(i64, i64)>,
    fps: f64,
    segment_idx: usize,
    next_effective: u64,
    total_effective: u64,
    current: Option<DecodeAheadSource>,
}

impl PrefetchSource {
    /// `segments` are `(source_start_ms, source_end_ms)` retained spans in
    /// timeline order, per `TrimMapper::retained_ranges`.
    pub fn new(
        demuxer: Arc<Demuxer>,
        config: DecoderConfig,
        segments: Vec<(i64, i64)>,
        fps: f64,
        total_effective: u64,
    ) -> Self {
        PrefetchSource {
            demuxer,
            config,
            segments,
            fps,
            segment_idx: 0,
            next_effective: 0,
            total_effective,
            current: None,
        }
    }

    fn advance_segment(&mut self) -> ExportResult<bool> {
        if self.segment_idx >= self.segments.len() {
            return Ok(false);
        }
        let (start_ms, end_ms) = self.segments[self.segment_idx];
        self.segment_idx += 1;

        self.demuxer.seek_to_keyframe(start_ms as f64 / 1000.0)?;
        let chunks = self.demuxer.chunks_from(start_ms as f64 / 1000.0, end_ms as f64 / 1000.0)?;
        let decoder = VideoDecoder::new(&self.config)?;
        let mut source = DecodeAheadSource::new(decoder, self.fps, self.total_effective);
        for chunk in &chunks {
            source.feed(chunk)?;
        }
        source.finish()?;
        self.current = Some(source);
        Ok(true)
    }

    pub fn next(&mut self) -> ExportResult<Option<SourcedFrame>> {
        if self.next_effective >= self.total_effective {
            return Ok(None);
        }
        loop {
            if let Some(source) = self.current.as_mut() {
                if !source.pending.is_empty() {
                    let frame = source.pending.remove(0);
                    let index = FrameIndex(self.next_effective);
                    self.next_effective += 1;
                    return Ok(Some(SourcedFrame { index, frame }));
                }
            }
            if !self.advance_segment()? {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg_the_third::codec::Id as CodecId;

    fn config(codec_id: CodecId) -> DecoderConfig {
        DecoderConfig { codec_id, width: 64, height: 64 }
    }

    #[test]
    fn select_chooses_decode_ahead_for_supported_codec() {
        assert_eq!(FrameSource::select(&config(CodecId::H264)), FrameSourceKind::DecodeAhead);
    }

    #[test]
    fn select_falls_back_to_prefetch_for_unsupported_codec() {
        assert_eq!(FrameSource::select(&config(CodecId::None)), FrameSourceKind::Prefetch);
    }

    #[test]
    fn retained_ranges_feed_prefetch_segmentation() {
        // Exercised in trim.rs directly; this just checks the shape the
        // segments list needs to be in to drive `PrefetchSource`.
        let trims = TrimMapper::new(vec![export_core::model::TrimRegion { start_ms: 1000, end_ms: 2000 }]);
        let ranges = trims.retained_ranges(3000);
        assert_eq!(ranges, vec![(0, 1000), (2000, 3000)]);
    }
}
