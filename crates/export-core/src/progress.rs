// crates/export-core/src/progress.rs
//
// The progress/error channel payload (§6/§4.12). Mirrors the shape of a
// `MediaResult`-style `EncodeProgress`/`EncodeDone`/`EncodeError` variant
// set, generalized into one phase-tagged event enum.
//
// `RenderMode` reports the RenderCoordinator's worker-pool mode (§4.7):
// `Parallel` when a multi-thread render pool was started, `Fallback` when
// rendering runs on a single worker thread. This is distinct from (and must
// not be conflated with) `FrameSource`'s own internal decode-ahead-vs-prefetch
// backend choice (§4.5) — that choice never reaches this channel.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportPhase {
    Idle,
    Initializing,
    Decoding,
    Rendering,
    Encoding,
    Finalizing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    Parallel,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEvent {
    pub phase: ExportPhase,
    pub current_frame: u64,
    pub total_frames: u64,
    pub mode: RenderMode,
    pub error: Option<ErrorDetail>,
}

impl ExportEvent {
    pub fn tick(phase: ExportPhase, current_frame: u64, total_frames: u64, mode: RenderMode) -> Self {
        ExportEvent { phase, current_frame, total_frames, mode, error: None }
    }

    pub fn failed(kind: &str, detail: impl Into<String>, mode: RenderMode) -> Self {
        ExportEvent {
            phase: ExportPhase::Failed,
            current_frame: 0,
            total_frames: 0,
            mode,
            error: Some(ErrorDetail { kind: kind.to_string(), detail: detail.into() }),
        }
    }

    pub fn progress_fraction(&self) -> f64 {
        if self.total_frames == 0 {
            0.0
        } else {
            self.current_frame as f64 / self.total_frames as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_fraction_handles_zero_total() {
        let e = ExportEvent::tick(ExportPhase::Initializing, 0, 0, RenderMode::Parallel);
        assert_eq!(e.progress_fraction(), 0.0);
    }

    #[test]
    fn progress_fraction_computes_ratio() {
        let e = ExportEvent::tick(ExportPhase::Encoding, 75, 300, RenderMode::Parallel);
        assert!((e.progress_fraction() - 0.25).abs() < 1e-9);
    }
}
