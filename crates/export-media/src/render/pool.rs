// crates/export-media/src/render/pool.rs
//
// Thread-per-worker render pool. Each worker owns a dedicated thread and a
// bounded crossbeam channel pair, the same shape as the donor's
// `worker.rs::MediaWorker::new` (one thread per scrub/playback job,
// communicating over bounded `crossbeam_channel` queues rather than sharing
// mutable state across threads).

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use export_core::effects::{self, EffectKind, RenderEffect};
use export_core::model::{FrameIndex, RenderPlan};

const QUEUE_DEPTH: usize = 32;

pub struct RenderJob {
    pub index: FrameIndex,
    pub frame: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub t_eff_ms: i64,
}

pub struct RenderedJob {
    pub index: FrameIndex,
    pub frame: Vec<u8>,
}

pub struct RenderWorkerPool {
    senders: Vec<Sender<RenderJob>>,
    receiver: Receiver<RenderedJob>,
    handles: Vec<JoinHandle<()>>,
    next_worker: usize,
}

impl RenderWorkerPool {
    pub fn new(worker_count: usize, plan: Arc<RenderPlan>) -> Self {
        let registry: Arc<std::collections::HashMap<EffectKind, Box<dyn RenderEffect>>> =
            Arc::new(effects::registry());
        let (result_tx, result_rx) = bounded::<RenderedJob>(QUEUE_DEPTH);

        let mut senders = Vec::with_capacity(worker_count.max(1));
        let mut handles = Vec::with_capacity(worker_count.max(1));

        for _ in 0..worker_count.max(1) {
            let (job_tx, job_rx): (Sender<RenderJob>, Receiver<RenderJob>) = bounded(QUEUE_DEPTH);
            let plan = Arc::clone(&plan);
            let registry = Arc::clone(&registry);
            let result_tx = result_tx.clone();

            let handle = std::thread::spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    let rendered = effects::apply_all(
                        &job.frame,
                        job.width,
                        job.height,
                        &plan,
                        job.t_eff_ms,
                        &registry,
                    );
                    if result_tx.send(RenderedJob { index: job.index, frame: rendered }).is_err() {
                        break;
                    }
                }
            });

            senders.push(job_tx);
            handles.push(handle);
        }

        RenderWorkerPool { senders, receiver: result_rx, handles, next_worker: 0 }
    }

    /// Submits a job to the next worker in round-robin order.
    pub fn submit(&mut self, job: RenderJob) -> bool {
        if self.senders.is_empty() {
            return false;
        }
        let i = self.next_worker % self.senders.len();
        self.next_worker = self.next_worker.wrapping_add(1);
        self.senders[i].send(job).is_ok()
    }

    pub fn results(&self) -> &Receiver<RenderedJob> {
        &self.receiver
    }

    /// Drops all job senders so each worker thread exits its recv loop, then
    /// joins every thread.
    pub fn shutdown(mut self) {
        self.senders.clear();
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use export_core::model::RenderPlan;

    fn empty_plan() -> RenderPlan {
        RenderPlan {
            output_width: 4,
            output_height: 4,
            wallpaper_rgb: [0, 0, 0],
            zoom_regions: vec![],
            shadow_intensity: 0.0,
            blur: false,
            motion_blur: false,
            border_radius_px: 0,
            padding_px: 0,
            crop: None,
            annotations: vec![],
            source_width: 4,
            source_height: 4,
            camera_pip: None,
        }
    }

    #[test]
    fn single_job_round_trips_through_pool() {
        let mut pool = RenderWorkerPool::new(1, Arc::new(empty_plan()));
        let frame = vec![10u8; 4 * 4 * 4];
        pool.submit(RenderJob { index: FrameIndex(0), frame, width: 4, height: 4, t_eff_ms: 0 });
        let result = pool.results().recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(result.index, FrameIndex(0));
        assert_eq!(result.frame.len(), 4 * 4 * 4);
        pool.shutdown();
    }
}
