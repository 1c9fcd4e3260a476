// crates/export-media/src/encode_queue.rs
//
// Bounds how far the render stage can run ahead of the encoder, using the
// same `Mutex<u32>` + `Condvar` counting-semaphore shape as `decoder.rs`'s
// pending gate and the donor's `worker.rs::probe_sem`.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use export_core::model::FrameIndex;

const MAX_QUEUED: usize = 24;

struct Inner {
    queue: VecDeque<(FrameIndex, Vec<u8>)>,
    closed: bool,
}

pub struct EncodeQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl EncodeQueue {
    pub fn new() -> Self {
        EncodeQueue {
            inner: Mutex::new(Inner { queue: VecDeque::new(), closed: false }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn push(&self, index: FrameIndex, rgba: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        while inner.queue.len() >= MAX_QUEUED && !inner.closed {
            inner = self.not_full.wait(inner).unwrap();
        }
        inner.queue.push_back((index, rgba));
        self.not_empty.notify_one();
    }

    /// Non-blocking pop: returns `None` immediately if nothing is queued.
    pub fn try_pop(&self) -> Option<(FrameIndex, Vec<u8>)> {
        let mut inner = self.inner.lock().unwrap();
        let item = inner.queue.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    pub fn pop(&self) -> Option<(FrameIndex, Vec<u8>)> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(item) = inner.queue.pop_front() {
                self.not_full.notify_one();
                return Some(item);
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

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

impl Default for EncodeQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_preserves_order() {
        let q = EncodeQueue::new();
        q.push(FrameIndex(0), vec![0]);
        q.push(FrameIndex(1), vec![1]);
        assert_eq!(q.pop(), Some((FrameIndex(0), vec![0])));
        assert_eq!(q.pop(), Some((FrameIndex(1), vec![1])));
    }

    #[test]
    fn closed_empty_queue_returns_none() {
        let q = EncodeQueue::new();
        q.close();
        assert_eq!(q.pop(), None);
    }
}
