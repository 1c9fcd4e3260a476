// crates/export-core/src/error.rs
//
// The error taxonomy a caller can match on. Deep ffmpeg/IO failures are
// `anyhow::Error` at the call site and get folded into one of these variants
// at the module boundary (Demuxer, Decoder, worker pool, Muxer) so exactly
// one error type ever reaches the progress/error channel.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("input not found: {0}")]
    InputNotFound(String),

    #[error("path escapes the recordings directory: {0}")]
    PathRejected(String),

    #[error("unrecognized container format: {0}")]
    UnsupportedContainer(String),

    #[error("codec not supported by the configured decoder: {0}")]
    UnsupportedCodec(String),

    #[error("no video track present in {0}")]
    NoVideoTrack(String),

    #[error("input could not be parsed: {0}")]
    CorruptInput(String),

    #[error("decoder error: {0}")]
    DecoderError(String),

    #[error("render worker pool failed to initialize: {0}")]
    WorkerInitFailed(String),

    #[error("render worker error on frame {frame_index}: {detail}")]
    WorkerRenderError { frame_index: u64, detail: String },

    #[error("video encoder error: {0}")]
    EncoderError(String),

    #[error("muxer error: {0}")]
    MuxerError(String),

    #[error("export cancelled")]
    Cancelled,

    #[error("operation timed out: {0}")]
    Timeout(String),
}

impl ExportError {
    /// Stable lowercase kind tag for the progress/error channel (§6).
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::InputNotFound(_) => "InputNotFound",
            ExportError::PathRejected(_) => "PathRejected",
            ExportError::UnsupportedContainer(_) => "UnsupportedContainer",
            ExportError::UnsupportedCodec(_) => "UnsupportedCodec",
            ExportError::NoVideoTrack(_) => "NoVideoTrack",
            ExportError::CorruptInput(_) => "CorruptInput",
            ExportError::DecoderError(_) => "DecoderError",
            ExportError::WorkerInitFailed(_) => "WorkerInitFailed",
            ExportError::WorkerRenderError { .. } => "WorkerRenderError",
            ExportError::EncoderError(_) => "EncoderError",
            ExportError::MuxerError(_) => "MuxerError",
            ExportError::Cancelled => "Cancelled",
            ExportError::Timeout(_) => "Timeout",
        }
    }

    /// Whether this kind aborts the state machine (vs. local recovery, §7).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ExportError::Cancelled | ExportError::Timeout(_))
    }
}

pub type ExportResult<T> = Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_and_timeout_are_not_fatal() {
        assert!(!ExportError::Cancelled.is_fatal());
        assert!(!ExportError::Timeout("seek".into()).is_fatal());
    }

    #[test]
    fn encoder_and_muxer_errors_are_fatal() {
        assert!(ExportError::EncoderError("x".into()).is_fatal());
        assert!(ExportError::MuxerError("x".into()).is_fatal());
    }

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(ExportError::NoVideoTrack("f".into()).kind(), "NoVideoTrack");
        assert_eq!(
            ExportError::WorkerRenderError { frame_index: 3, detail: "x".into() }.kind(),
            "WorkerRenderError"
        );
    }
}
