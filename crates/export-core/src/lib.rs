// crates/export-core/src/lib.rs
//
// Pure types and algorithms for the video export pipeline: no ffmpeg, no
// threads, no I/O. `export-media` builds the real pipeline on top of these.

pub mod effects;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod helpers;
pub mod model;
pub mod progress;
pub mod trim;

pub use error::{ExportError, ExportResult};
pub use frame::{DecodedFrame, FrameAccounting, FrameHandle, RenderedFrame};
pub use model::{ExportPlan, FrameIndex, RenderPlan, Timestamp, TrimRegion};
pub use progress::{ExportEvent, ExportPhase, RenderMode};
pub use trim::TrimMapper;
