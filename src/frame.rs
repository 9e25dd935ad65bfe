//! Frame containers and the stage-to-stage message protocol.
//!
//! Frames are owned by exactly one stage at a time. The source produces a
//! `Frame`, moves it to the detector, and the detector moves an
//! `AnnotatedFrame` to the renderer. No stage keeps a reference to a frame
//! after forwarding it; the detector's rolling background is a separately
//! allocated grayscale image, so the color frame is never aliased downstream.
//!
//! End-of-stream is a tagged variant, not a null frame. Each stage that
//! receives `EndOfStream` forwards it exactly once before terminating, which
//! is how graceful completion propagates through the pipeline.

use opencv::core::Mat;

use crate::detect::Detection;

/// A message on a stage channel: either a payload or the end-of-stream
/// sentinel.
#[derive(Debug)]
pub enum StreamItem<T> {
    Item(T),
    EndOfStream,
}

/// A decoded video frame with its capture-order sequence number.
///
/// Sequence numbers start at 0 and increase by exactly 1 per decoded frame.
/// Channels preserve FIFO order, so downstream stages observe them strictly
/// increasing.
#[derive(Debug)]
pub struct Frame {
    pub seq: u64,
    pub pixels: Mat,
}

/// A frame that has passed through the detector, carrying the motion regions
/// found in it. The detections are valid only in this frame's coordinate
/// space.
#[derive(Debug)]
pub struct AnnotatedFrame {
    pub seq: u64,
    pub pixels: Mat,
    pub detections: Vec<Detection>,
}
