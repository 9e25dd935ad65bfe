//! Error types for the pipeline stages.
//!
//! Each variant maps to one containment policy:
//!
//! - `OpenFailure`: the source cannot be opened. Fatal; the pipeline reports
//!   the failure and starts no downstream workers.
//! - `DecodeFault`: a mid-stream read error. The source logs it, forwards the
//!   end-of-stream sentinel so downstream stages drain cleanly, and stops.
//! - `FrameProcessingFault`: a single frame's detection computation failed.
//!   The detector logs it, skips the frame, and continues.
//! - `PresentationFault`: the display surface cannot render or poll. The
//!   renderer logs it and terminates.
//!
//! Faults never cross stage boundaries. Sibling stages observe termination
//! only through the sentinel protocol or the orchestrator's cancellation.
//! There is no retry path anywhere.

use thiserror::Error;

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// Errors raised inside pipeline stages.
#[derive(Debug, Error)]
pub enum StageError {
    /// The video source could not be opened at all.
    #[error("cannot open video source '{path}': {reason}")]
    OpenFailure { path: String, reason: String },

    /// Decoding failed partway through the stream.
    #[error("mid-stream decode fault: {0}")]
    DecodeFault(#[source] opencv::Error),

    /// A single frame's detection computation failed.
    #[error("frame processing fault: {0}")]
    FrameProcessingFault(#[source] opencv::Error),

    /// The display surface failed to render or poll for input.
    #[error("presentation fault: {0}")]
    PresentationFault(#[source] opencv::Error),
}

impl StageError {
    pub fn open_failure(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OpenFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
