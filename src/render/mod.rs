//! Renderer stage.
//!
//! Consumes annotated frames, overlays detection markers and a wall-clock
//! timestamp, presents each frame, and paces playback to approximate the
//! source's native rate. The pacing is cosmetic sleeping only; the renderer
//! does not drop frames to catch up when processing falls behind.
//!
//! The loop ends on the end-of-stream sentinel, on a quit keypress, or on a
//! presentation fault. The display surface is released unconditionally on
//! exit.

mod overlay;
mod surface;

pub use overlay::annotate;
pub use surface::DisplaySurface;

use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::error::StageResult;
use crate::frame::{AnnotatedFrame, StreamItem};
use crate::pipeline::{recv_item, Received, ShutdownFlag};

/// How detections are marked on the presented frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Rectangle outline around each detection.
    Outline,
    /// Blur the pixels inside each detection before drawing the outline, so
    /// whatever moved is not identifiable on screen.
    PrivacyBlur,
}

/// Renderer settings fixed for the lifetime of the stage.
#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    pub mode: RenderMode,
    /// Presentation rate in frames per second. Always positive; the
    /// orchestrator applies the fallback before the stage starts.
    pub pacing_fps: f64,
}

/// Counters reported when the renderer stage exits.
#[derive(Clone, Debug, Default)]
pub struct RenderStats {
    pub frames_presented: u64,
    pub quit_requested: bool,
}

/// Renderer stage loop.
pub fn run(
    rx: &Receiver<StreamItem<AnnotatedFrame>>,
    mut surface: DisplaySurface,
    options: RenderOptions,
    shutdown: &ShutdownFlag,
) -> RenderStats {
    let frame_delay = Duration::from_secs_f64(1.0 / options.pacing_fps);
    let mut stats = RenderStats::default();

    loop {
        match recv_item(rx, shutdown) {
            Received::Item(StreamItem::Item(mut frame)) => {
                if let Err(err) = present(&mut surface, &mut frame, options.mode) {
                    log::error!("renderer: {}", err);
                    break;
                }
                stats.frames_presented += 1;

                match surface.poll_quit() {
                    Ok(true) => {
                        log::info!("renderer: quit requested");
                        stats.quit_requested = true;
                        break;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        log::error!("renderer: {}", err);
                        break;
                    }
                }

                std::thread::sleep(frame_delay);
            }
            Received::Item(StreamItem::EndOfStream) => {
                log::info!(
                    "renderer: end of stream after {} frames",
                    stats.frames_presented
                );
                break;
            }
            Received::Disconnected => {
                log::warn!("renderer: input channel closed without end-of-stream");
                break;
            }
            Received::Cancelled => {
                log::info!("renderer: shutdown requested, stopping");
                break;
            }
        }
    }

    surface.release();
    stats
}

fn present(
    surface: &mut DisplaySurface,
    frame: &mut AnnotatedFrame,
    mode: RenderMode,
) -> StageResult<()> {
    annotate(&mut frame.pixels, &frame.detections, mode)?;
    surface.present(&frame.pixels)
}
