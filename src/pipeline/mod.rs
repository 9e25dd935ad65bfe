//! Pipeline orchestration.
//!
//! Wires the three stages (source, detector, renderer) through two bounded
//! channels and runs each stage on its own OS thread:
//!
//! ```text
//! source --[frames]--> detector --[annotated frames]--> renderer
//! ```
//!
//! The channels block the sender when full and the receiver when empty; that
//! blocking is the only backpressure mechanism and the only synchronization
//! between stages. A slow renderer throttles the detector, which throttles
//! the source, so in-flight memory stays bounded. Channels preserve FIFO
//! order; the pipeline never reorders frames.
//!
//! Shutdown is cooperative first, forced second. An external interrupt
//! raises the shared `ShutdownFlag`; stages observe it within one poll tick
//! and exit at a frame boundary. Any stage still running when the grace
//! period expires is abandoned and reported as a forced termination, so the
//! process never hangs on exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::config::AppConfig;
use crate::detect::{self, DetectorStats, FrameDiffer};
use crate::ingest::{self, SourceStats, VideoConfig, VideoSource};
use crate::render::{self, DisplaySurface, RenderMode, RenderOptions, RenderStats};

/// In-flight items per channel. Bounds memory growth when a downstream stage
/// lags.
pub const CHANNEL_CAPACITY: usize = 10;

/// Pacing rate used when the source does not report a usable frame rate.
pub const FALLBACK_FPS: f64 = 30.0;

/// How long stages get to exit cooperatively before a forced termination is
/// reported.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Tick at which blocking channel operations re-check the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Tick at which the orchestrator polls stage liveness.
const SUPERVISE_POLL: Duration = Duration::from_millis(50);

const WINDOW_TITLE: &str = "Motion Detection";

/// Cooperative cancellation token shared by the orchestrator and all stages.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a blocking receive that stays responsive to shutdown.
pub(crate) enum Received<T> {
    Item(T),
    Disconnected,
    Cancelled,
}

pub(crate) fn recv_item<T>(rx: &Receiver<T>, shutdown: &ShutdownFlag) -> Received<T> {
    loop {
        if shutdown.is_raised() {
            return Received::Cancelled;
        }
        match rx.recv_timeout(SHUTDOWN_POLL) {
            Ok(item) => return Received::Item(item),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Received::Disconnected,
        }
    }
}

/// Blocking send that stays responsive to shutdown. Returns false when the
/// receiving side is gone or shutdown was requested; the caller stops its
/// loop in both cases.
pub(crate) fn send_item<T>(tx: &Sender<T>, item: T, shutdown: &ShutdownFlag) -> bool {
    let mut pending = item;
    loop {
        if shutdown.is_raised() {
            return false;
        }
        match tx.send_timeout(pending, SHUTDOWN_POLL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(back)) => pending = back,
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

/// How the pipeline ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every stage exited on its own, either at end-of-stream or within the
    /// shutdown grace period.
    Completed,
    /// At least one stage was still running when the grace period expired
    /// and was abandoned.
    ForcedTermination,
}

/// Final pipeline status. Stage stats are absent for stages abandoned at
/// forced termination.
#[derive(Debug)]
pub struct PipelineReport {
    pub outcome: PipelineOutcome,
    pub source: Option<SourceStats>,
    pub detector: Option<DetectorStats>,
    pub renderer: Option<RenderStats>,
}

/// Run the full pipeline to completion.
///
/// The source is opened before any worker starts, so an `OpenFailure` is
/// reported without spawning the detector or renderer. The pacing rate comes
/// from the source's reported frame rate, with a fallback of
/// [`FALLBACK_FPS`] when the container reports nothing usable.
pub fn run(config: &AppConfig, shutdown: ShutdownFlag) -> Result<PipelineReport> {
    let source = VideoSource::open(VideoConfig::new(config.video.as_str()))?;

    let pacing_fps = config
        .render
        .fps_override
        .or_else(|| source.frame_rate())
        .unwrap_or(FALLBACK_FPS);

    let mode = if config.render.privacy_blur {
        RenderMode::PrivacyBlur
    } else {
        RenderMode::Outline
    };
    let surface = if config.render.headless {
        DisplaySurface::headless()
    } else {
        DisplaySurface::window(WINDOW_TITLE)?
    };
    let differ = FrameDiffer::new(f64::from(config.min_area))?;

    log::info!(
        "pipeline: {} -> detector (min_area {}) -> renderer ({:.1} fps, {:?})",
        source.path(),
        config.min_area,
        pacing_fps,
        mode
    );

    let (frame_tx, frame_rx) = bounded(CHANNEL_CAPACITY);
    let (annotated_tx, annotated_rx) = bounded(CHANNEL_CAPACITY);

    let source_handle = spawn_stage("source", {
        let shutdown = shutdown.clone();
        move || ingest::run(source, &frame_tx, &shutdown)
    })?;

    let detector_handle = spawn_stage("detector", {
        let shutdown = shutdown.clone();
        move || detect::run(&frame_rx, &annotated_tx, differ, &shutdown)
    })?;

    let renderer_handle = spawn_stage("renderer", {
        let shutdown = shutdown.clone();
        let options = RenderOptions { mode, pacing_fps };
        move || render::run(&annotated_rx, surface, options, &shutdown)
    })?;

    let outcome = supervise(&shutdown, &source_handle, &detector_handle, &renderer_handle);

    let report = PipelineReport {
        outcome,
        source: collect_stats("source", source_handle),
        detector: collect_stats("detector", detector_handle),
        renderer: collect_stats("renderer", renderer_handle),
    };

    match report.outcome {
        PipelineOutcome::Completed => log::info!("pipeline: all stages completed"),
        PipelineOutcome::ForcedTermination => {
            log::warn!("pipeline: forced termination occurred")
        }
    }

    Ok(report)
}

fn spawn_stage<T, F>(name: &str, body: F) -> Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .with_context(|| format!("failed to spawn {name} stage"))
}

/// Wait for natural completion, or escalate a raised shutdown flag into a
/// bounded grace wait followed by forced termination.
fn supervise<A, B, C>(
    shutdown: &ShutdownFlag,
    source: &JoinHandle<A>,
    detector: &JoinHandle<B>,
    renderer: &JoinHandle<C>,
) -> PipelineOutcome {
    let all_finished =
        || source.is_finished() && detector.is_finished() && renderer.is_finished();

    loop {
        if all_finished() {
            return PipelineOutcome::Completed;
        }
        if shutdown.is_raised() {
            break;
        }
        thread::sleep(SUPERVISE_POLL);
    }

    log::info!(
        "pipeline: shutdown requested, waiting up to {:?} for stages",
        SHUTDOWN_GRACE
    );
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    while Instant::now() < deadline {
        if all_finished() {
            return PipelineOutcome::Completed;
        }
        thread::sleep(SUPERVISE_POLL);
    }

    PipelineOutcome::ForcedTermination
}

/// Join a finished stage for its stats. A stage still running at forced
/// termination is abandoned; the process exit tears it down.
fn collect_stats<T>(name: &str, handle: JoinHandle<T>) -> Option<T> {
    if !handle.is_finished() {
        log::warn!("pipeline: stage '{}' abandoned at forced termination", name);
        return None;
    }
    match handle.join() {
        Ok(stats) => Some(stats),
        Err(_) => {
            log::error!("pipeline: stage '{}' panicked", name);
            None
        }
    }
}
