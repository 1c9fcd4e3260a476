// crates/export-core/src/frame.rs
//
// Linear-ownership frame types. There is no real GPU surface in this
// implementation (no WebCodecs, no platform decoder) — a frame owns its
// pixel buffer directly as a `Vec<u8>` — but the ownership discipline the
// pipeline depends on (exactly one owner, explicit release, un-released
// drop is a defect) is enforced identically to how it would be for a real
// GPU handle.

use crate::model::{FrameIndex, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};

/// Owns a packed pixel buffer. `release()` consumes the handle and hands the
/// buffer back to the caller; dropping a handle that still holds its buffer
/// is a defect (logged, not panicked — matching the decoder's
/// resolve-rather-than-reject failure posture elsewhere in this pipeline).
#[derive(Debug)]
pub struct FrameHandle {
    data: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl FrameHandle {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        FrameHandle { data: Some(data), width, height }
    }

    pub fn bytes(&self) -> &[u8] {
        self.data.as_deref().expect("frame already released")
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().expect("frame already released")
    }

    /// Consumes the handle and returns the owned buffer. The only legal way
    /// to free a frame's memory.
    pub fn release(mut self) -> Vec<u8> {
        self.data.take().expect("frame already released")
    }
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        if self.data.is_some() {
            tracing::error!("defect: frame dropped without release (w={}, h={})", self.width, self.height);
        }
    }
}

/// A decoded frame with its source-timeline timestamp.
#[derive(Debug)]
pub struct DecodedFrame {
    pub handle: FrameHandle,
    pub source_timestamp: Timestamp,
}

impl DecodedFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, source_timestamp: Timestamp) -> Self {
        DecodedFrame { handle: FrameHandle::new(data, width, height), source_timestamp }
    }

    pub fn release(self) -> Vec<u8> {
        self.handle.release()
    }
}

/// A rendered frame tagged with its position on the effective timeline.
#[derive(Debug)]
pub struct RenderedFrame {
    pub handle: FrameHandle,
    pub index: FrameIndex,
}

impl RenderedFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: FrameIndex) -> Self {
        RenderedFrame { handle: FrameHandle::new(data, width, height), index }
    }

    pub fn release(self) -> Vec<u8> {
        self.handle.release()
    }
}

/// Tracks created-vs-released frame counts for one export instance, so the
/// ownership invariant (§3: "every decoded or rendered frame is eventually
/// released exactly once") can be asserted at shutdown. Owned by the
/// `Exporter` and shared (by reference) with whichever components create or
/// release frames — this is per-export bookkeeping, not process-global state.
#[derive(Debug, Default)]
pub struct FrameAccounting {
    created: AtomicU64,
    released: AtomicU64,
}

impl FrameAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    pub fn balanced(&self) -> bool {
        self.created() == self.released()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_returns_owned_bytes() {
        let f = DecodedFrame::new(vec![1, 2, 3], 1, 1, Timestamp::ZERO);
        assert_eq!(f.release(), vec![1, 2, 3]);
    }

    #[test]
    fn accounting_balances_after_matched_create_release() {
        let acct = FrameAccounting::new();
        let f = DecodedFrame::new(vec![0; 4], 2, 1, Timestamp::ZERO);
        acct.record_created();
        f.release();
        acct.record_released();
        assert!(acct.balanced());
        assert_eq!(acct.created(), 1);
    }

    #[test]
    fn accounting_detects_imbalance() {
        let acct = FrameAccounting::new();
        acct.record_created();
        acct.record_created();
        acct.record_released();
        assert!(!acct.balanced());
    }
}
