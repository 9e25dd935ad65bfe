//! Motion detector stage.
//!
//! Consumes `(seq, frame)` items, computes per-frame motion regions by
//! differencing against a rolling background reference, and emits
//! `(seq, frame, detections)` downstream.
//!
//! Failure policy: a fault while processing a single frame is logged and the
//! frame is skipped; the loop continues. The stage forwards the end-of-stream
//! sentinel exactly once and exits cleanly when its input ends, including
//! when the upstream stage disappears without sending one.

mod differ;
mod result;

pub use differ::{FrameDiffer, BLUR_KERNEL, DEFAULT_MIN_AREA, DIFF_THRESHOLD};
pub use result::Detection;

use crossbeam_channel::{Receiver, Sender};

use crate::frame::{AnnotatedFrame, Frame, StreamItem};
use crate::pipeline::{recv_item, send_item, Received, ShutdownFlag};

/// Counters reported when the detector stage exits.
#[derive(Clone, Debug, Default)]
pub struct DetectorStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub detections_emitted: u64,
}

/// Detector stage loop. Runs until the input ends, the downstream stage hangs
/// up, or shutdown is requested.
pub fn run(
    rx: &Receiver<StreamItem<Frame>>,
    tx: &Sender<StreamItem<AnnotatedFrame>>,
    mut differ: FrameDiffer,
    shutdown: &ShutdownFlag,
) -> DetectorStats {
    let mut stats = DetectorStats::default();

    loop {
        match recv_item(rx, shutdown) {
            Received::Item(StreamItem::Item(frame)) => match differ.process(&frame.pixels) {
                Ok(detections) => {
                    stats.frames_processed += 1;
                    stats.detections_emitted += detections.len() as u64;

                    let annotated = AnnotatedFrame {
                        seq: frame.seq,
                        pixels: frame.pixels,
                        detections,
                    };
                    if !send_item(tx, StreamItem::Item(annotated), shutdown) {
                        log::debug!("detector: downstream closed, stopping");
                        break;
                    }
                }
                Err(err) => {
                    // Skip-and-continue: one corrupt frame must not kill the
                    // stage.
                    log::warn!("detector: skipping frame {}: {}", frame.seq, err);
                    stats.frames_skipped += 1;
                }
            },
            Received::Item(StreamItem::EndOfStream) => {
                send_item(tx, StreamItem::EndOfStream, shutdown);
                log::info!(
                    "detector: end of stream after {} frames ({} skipped)",
                    stats.frames_processed,
                    stats.frames_skipped
                );
                break;
            }
            Received::Disconnected => {
                // Upstream died without a sentinel. Still send one so the
                // renderer drains and exits instead of blocking forever.
                send_item(tx, StreamItem::EndOfStream, shutdown);
                log::warn!("detector: input channel closed without end-of-stream");
                break;
            }
            Received::Cancelled => {
                log::info!("detector: shutdown requested, stopping");
                break;
            }
        }
    }

    stats
}
