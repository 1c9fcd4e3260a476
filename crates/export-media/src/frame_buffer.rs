// crates/export-media/src/frame_buffer.rs
//
// Index-keyed bounded store between decode and render. A render worker can
// ask for frame N and block until it's available; the decoder blocks once
// the buffer holds `CAPACITY` frames nobody has taken yet — the same
// `Mutex`+`Condvar` shape as `decoder.rs`'s pending gate and the donor's
// `worker.rs::probe_sem`.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex};

use export_core::model::FrameIndex;

use crate::decoder::RawFrame;

const CAPACITY: usize = 16;

struct Inner {
    frames: BTreeMap<u64, RawFrame>,
    closed: bool,
}

pub struct FrameBuffer {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl FrameBuffer {
    pub fn new() -> Self {
        FrameBuffer {
            inner: Mutex::new(Inner { frames: BTreeMap::new(), closed: false }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Inserts a decoded frame, blocking while the buffer is at capacity.
    pub fn push(&self, index: FrameIndex, frame: RawFrame) {
        let mut inner = self.inner.lock().unwrap();
        while inner.frames.len() >= CAPACITY && !inner.closed {
            inner = self.not_full.wait(inner).unwrap();
        }
        inner.frames.insert(index.0, frame);
        self.not_empty.notify_all();
    }

    /// Removes and returns the frame at `index`, blocking until it arrives
    /// or the buffer is closed with no such frame pending.
    pub fn take(&self, index: FrameIndex) -> Option<RawFrame> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(frame) = inner.frames.remove(&index.0) {
                self.not_full.notify_all();
                return Some(frame);
            }
            if inner.closed {
                return None;
            }
            inner = self.not_empty.wait(inner).unwrap();
        }
    }

    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().frames.len()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(pts_us: i64) -> RawFrame {
        RawFrame { rgba: vec![0; 4], width: 1, height: 1, pts_us }
    }

    #[test]
    fn push_then_take_round_trips() {
        let buf = FrameBuffer::new();
        buf.push(FrameIndex(0), dummy(0));
        let f = buf.take(FrameIndex(0)).unwrap();
        assert_eq!(f.pts_us, 0);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn take_returns_none_after_close_with_nothing_pending() {
        let buf = FrameBuffer::new();
        buf.close();
        assert!(buf.take(FrameIndex(0)).is_none());
    }

    #[test]
    fn out_of_order_push_resolves_by_index() {
        let buf = FrameBuffer::new();
        buf.push(FrameIndex(2), dummy(2));
        buf.push(FrameIndex(1), dummy(1));
        assert_eq!(buf.take(FrameIndex(1)).unwrap().pts_us, 1);
        assert_eq!(buf.take(FrameIndex(2)).unwrap().pts_us, 2);
    }
}
