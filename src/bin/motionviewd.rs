//! motionviewd - real-time motion detection viewer.
//!
//! Opens a video, runs the three-stage detection pipeline, and shows the
//! frames with motion overlays until the stream ends, the user quits with
//! 'q', or the process is interrupted.

use anyhow::Result;
use clap::Parser;

use motionview::config::{AppConfig, Overrides};
use motionview::pipeline::{self, PipelineOutcome, ShutdownFlag};

#[derive(Parser, Debug)]
#[command(name = "motionviewd", version, about = "Real-time video motion detection viewer")]
struct Args {
    /// Path to the video file to analyze.
    #[arg(short = 'v', long)]
    video: Option<String>,

    /// Minimum area, in pixels, for a changed region to count as motion.
    #[arg(short = 'a', long)]
    min_area: Option<u32>,

    /// Blur the inside of each detection instead of only outlining it.
    #[arg(long)]
    privacy_blur: bool,

    /// Run without a display window (detection only).
    #[arg(long)]
    headless: bool,

    /// Present at this rate instead of the source's reported rate.
    #[arg(long)]
    fps: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = AppConfig::load(Overrides {
        video: args.video,
        min_area: args.min_area,
        privacy_blur: args.privacy_blur,
        headless: args.headless,
        fps: args.fps,
    })?;

    log::info!("motionview {} starting", env!("CARGO_PKG_VERSION"));
    log::info!("video={} min_area={}", cfg.video, cfg.min_area);

    let shutdown = ShutdownFlag::new();
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        handler_flag.raise();
    })
    .expect("error setting Ctrl-C handler");

    let report = pipeline::run(&cfg, shutdown)?;

    match report.outcome {
        PipelineOutcome::Completed => log::info!("motionview finished - all stages completed"),
        PipelineOutcome::ForcedTermination => {
            log::warn!("motionview finished - forced termination occurred")
        }
    }

    Ok(())
}
