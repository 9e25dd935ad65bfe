//! Frame source stage.
//!
//! The source owns the video handle, decodes frames sequentially, and emits
//! `(seq, frame)` items with `seq` starting at 0. On end-of-stream it sends
//! exactly one sentinel and stops.
//!
//! Failure policy is best-effort forward progress: a mid-stream decode fault
//! is logged, never retried, and the sentinel is still sent so downstream
//! stages drain and exit instead of deadlocking. Downstream stages must
//! tolerate an abrupt stop without receiving every frame they might expect.

mod video;

pub use video::{VideoConfig, VideoSource};

use crossbeam_channel::Sender;

use crate::frame::{Frame, StreamItem};
use crate::pipeline::{send_item, ShutdownFlag};

/// Counters reported when the source stage exits.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_emitted: u64,
}

/// Source stage loop. Decodes until end-of-stream, a decode fault, a
/// downstream hangup, or shutdown.
pub fn run(
    mut source: VideoSource,
    tx: &Sender<StreamItem<Frame>>,
    shutdown: &ShutdownFlag,
) -> SourceStats {
    let mut stats = SourceStats::default();

    loop {
        if shutdown.is_raised() {
            log::info!("source: shutdown requested, stopping");
            break;
        }

        match source.next_frame() {
            Ok(Some(pixels)) => {
                let frame = Frame {
                    seq: stats.frames_emitted,
                    pixels,
                };
                if !send_item(tx, StreamItem::Item(frame), shutdown) {
                    log::debug!("source: downstream closed, stopping");
                    break;
                }
                stats.frames_emitted += 1;
            }
            Ok(None) => {
                send_item(tx, StreamItem::EndOfStream, shutdown);
                log::info!(
                    "source: end of stream after {} frames",
                    stats.frames_emitted
                );
                break;
            }
            Err(err) => {
                // Best-effort: no retry, and the sentinel still goes out so
                // downstream stages are not left blocking on the channel.
                log::error!("source: {}", err);
                send_item(tx, StreamItem::EndOfStream, shutdown);
                break;
            }
        }
    }

    stats
}
