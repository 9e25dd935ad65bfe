//! motionview - real-time video motion detection.
//!
//! Reads frames from a video source, detects regions of frame-to-frame
//! change, and presents the frames with detection overlays at approximately
//! the source's native rate.
//!
//! # Architecture
//!
//! Three stages run as independent OS threads, connected by bounded FIFO
//! channels (capacity 10 each):
//!
//! 1. **Source** (`ingest`): decodes frames sequentially and emits
//!    `(seq, frame)` items, then exactly one end-of-stream sentinel.
//! 2. **Detector** (`detect`): frame differencing against a rolling
//!    single-frame background reference; emits the frame plus its motion
//!    regions.
//! 3. **Renderer** (`render`): overlays detections and a timestamp, presents
//!    frames at a paced rate, polls for quit.
//!
//! The bounded channels are the only synchronization points and the only
//! backpressure mechanism: a slow consumer blocks its producer, so no frame
//! is ever dropped between stages and in-flight memory stays bounded. The
//! orchestrator (`pipeline`) supervises the stages and escalates an external
//! interrupt from cooperative cancellation to forced termination after a
//! bounded grace period.
//!
//! Faults are contained per stage: see `error` for the taxonomy and the
//! skip-and-continue versus stop-at-stream policies.

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod render;

pub use config::{AppConfig, Overrides, RenderSettings};
pub use detect::{Detection, DetectorStats, FrameDiffer};
pub use error::{StageError, StageResult};
pub use frame::{AnnotatedFrame, Frame, StreamItem};
pub use ingest::{SourceStats, VideoConfig, VideoSource};
pub use pipeline::{
    PipelineOutcome, PipelineReport, ShutdownFlag, CHANNEL_CAPACITY, FALLBACK_FPS, SHUTDOWN_GRACE,
};
pub use render::{DisplaySurface, RenderMode, RenderOptions, RenderStats};
