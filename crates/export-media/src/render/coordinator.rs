// crates/export-media/src/render/coordinator.rs
//
// Pulls source frames (camera PiP already composited onto them upstream by
// `CameraPipCompositor`, see exporter.rs), submits each to the render worker
// pool, and hands rendered frames to the reassembler in sequential order
// (§4.7/§4.8).
//
// Grounded on the same dedicated-thread-plus-bounded-channel shape as
// `worker.rs::MediaWorker::new`; the coordinator itself is the "submit loop"
// half of that pattern, with `RenderWorkerPool` as the worker half.

use std::sync::Arc;
use std::time::Duration;

use export_core::model::{FrameIndex, RenderPlan};

use crate::decoder::RawFrame;
use crate::reassembler::FrameReassembler;
use crate::render::pool::{RenderJob, RenderWorkerPool};

pub struct RenderCoordinator {
    pool: RenderWorkerPool,
    reassembler: FrameReassembler,
    plan: Arc<RenderPlan>,
    fps: f64,
}

impl RenderCoordinator {
    pub fn new(worker_count: usize, plan: Arc<RenderPlan>, fps: f64) -> Self {
        let pool = RenderWorkerPool::new(worker_count, Arc::clone(&plan));
        RenderCoordinator { pool, reassembler: FrameReassembler::new(), plan, fps }
    }

    /// Submits one source frame for rendering at its effective timeline
    /// position.
    pub fn submit(&mut self, index: FrameIndex, source: RawFrame) {
        let t_eff_ms = ((index.0 as f64 / self.fps) * 1000.0) as i64;
        self.pool.submit(RenderJob {
            index,
            frame: source.rgba,
            width: source.width,
            height: source.height,
            t_eff_ms,
        });
    }

    /// Drains any render results available so far into the reassembler.
    pub fn drain_available(&mut self) {
        while let Ok(rendered) = self.pool.results().try_recv() {
            self.reassembler.insert(rendered.index, rendered.frame);
        }
    }

    /// Blocks briefly waiting for at least one more render result.
    pub fn wait_for_next(&mut self, timeout: Duration) {
        if let Ok(rendered) = self.pool.results().recv_timeout(timeout) {
            self.reassembler.insert(rendered.index, rendered.frame);
        }
    }

    pub fn pop_sequential(&mut self) -> Option<(FrameIndex, Vec<u8>)> {
        self.reassembler.pop_next()
    }

    pub fn plan(&self) -> &RenderPlan {
        &self.plan
    }

    pub fn shutdown(self) {
        self.pool.shutdown();
    }
}
