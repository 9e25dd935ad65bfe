//! Video frame sources.
//!
//! `VideoSource` decodes frames sequentially from a local video file through
//! OpenCV's `VideoCapture`, or from a deterministic synthetic backend when
//! the configured path uses the `stub://` scheme. The synthetic backend
//! exists so the pipeline and its tests run without a real video file or a
//! codec installation.

use opencv::core::{self, Mat, Rect, Scalar};
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use crate::error::{StageError, StageResult};

/// Frame rate reported by the synthetic backend.
const SYNTHETIC_FPS: f64 = 120.0;

/// Frames emitted by the synthetic backend unless the path overrides it
/// with a `?frames=N` suffix.
const SYNTHETIC_DEFAULT_FRAMES: u64 = 30;

const SYNTHETIC_WIDTH: i32 = 640;
const SYNTHETIC_HEIGHT: i32 = 480;

/// Configuration for a video source.
#[derive(Clone, Debug)]
pub struct VideoConfig {
    /// Local file path, or `stub://<name>[?frames=N]` for the synthetic
    /// backend.
    pub path: String,
}

impl VideoConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// A sequential frame source.
pub struct VideoSource {
    backend: VideoBackend,
}

impl std::fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSource")
            .field("path", &self.path())
            .finish()
    }
}

enum VideoBackend {
    Capture(CaptureSource),
    Synthetic(SyntheticSource),
}

impl VideoSource {
    /// Open the configured source. `OpenFailure` here is fatal to the whole
    /// pipeline; nothing downstream is started.
    pub fn open(config: VideoConfig) -> StageResult<Self> {
        let backend = if config.path.starts_with("stub://") {
            VideoBackend::Synthetic(SyntheticSource::open(&config.path)?)
        } else {
            VideoBackend::Capture(CaptureSource::open(&config.path)?)
        };
        Ok(Self { backend })
    }

    /// Decode the next frame. `Ok(None)` marks end-of-stream.
    pub fn next_frame(&mut self) -> StageResult<Option<Mat>> {
        match &mut self.backend {
            VideoBackend::Capture(source) => source.next_frame(),
            VideoBackend::Synthetic(source) => Ok(source.next_frame()),
        }
    }

    /// The container's reported frame rate, if it reports a usable one.
    pub fn frame_rate(&self) -> Option<f64> {
        match &self.backend {
            VideoBackend::Capture(source) => source.frame_rate(),
            VideoBackend::Synthetic(_) => Some(SYNTHETIC_FPS),
        }
    }

    pub fn path(&self) -> &str {
        match &self.backend {
            VideoBackend::Capture(source) => &source.path,
            VideoBackend::Synthetic(source) => &source.path,
        }
    }
}

// ----------------------------------------------------------------------------
// OpenCV capture backend
// ----------------------------------------------------------------------------

struct CaptureSource {
    path: String,
    capture: VideoCapture,
}

impl CaptureSource {
    fn open(path: &str) -> StageResult<Self> {
        let capture = VideoCapture::from_file(path, videoio::CAP_ANY)
            .map_err(|err| StageError::open_failure(path, err.to_string()))?;

        if !capture.is_opened().unwrap_or(false) {
            return Err(StageError::open_failure(
                path,
                "container could not be opened",
            ));
        }

        log::info!("source: opened {}", path);
        Ok(Self {
            path: path.to_string(),
            capture,
        })
    }

    fn next_frame(&mut self) -> StageResult<Option<Mat>> {
        let mut pixels = Mat::default();
        let has_frame = self
            .capture
            .read(&mut pixels)
            .map_err(StageError::DecodeFault)?;

        if !has_frame || pixels.empty() {
            return Ok(None);
        }
        Ok(Some(pixels))
    }

    fn frame_rate(&self) -> Option<f64> {
        let fps = self.capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        (fps.is_finite() && fps > 0.0).then_some(fps)
    }
}

// ----------------------------------------------------------------------------
// Synthetic backend (stub://) for tests and codec-free runs
// ----------------------------------------------------------------------------

/// Emits a black first frame, then frames with a white 50x50 square that
/// toggles between two positions, so every frame after the first differs
/// from its predecessor.
struct SyntheticSource {
    path: String,
    total: u64,
    emitted: u64,
}

impl SyntheticSource {
    fn open(path: &str) -> StageResult<Self> {
        let total = match path.split_once("?frames=") {
            Some((_, count)) => count
                .parse()
                .map_err(|_| StageError::open_failure(path, "frames= must be an integer"))?,
            None => SYNTHETIC_DEFAULT_FRAMES,
        };

        log::info!("source: opened {} (synthetic, {} frames)", path, total);
        Ok(Self {
            path: path.to_string(),
            total,
            emitted: 0,
        })
    }

    fn next_frame(&mut self) -> Option<Mat> {
        if self.emitted >= self.total {
            return None;
        }

        let index = self.emitted;
        self.emitted += 1;
        Some(synthetic_frame(index))
    }
}

fn synthetic_frame(index: u64) -> Mat {
    let mut frame = Mat::new_rows_cols_with_default(
        SYNTHETIC_HEIGHT,
        SYNTHETIC_WIDTH,
        core::CV_8UC3,
        Scalar::all(0.0),
    )
    .expect("allocate synthetic frame");

    if index > 0 {
        let x = if index % 2 == 1 { 100 } else { 160 };
        let rect = Rect::new(x, 100, 50, 50);
        let mut region = Mat::roi_mut(&mut frame, rect).expect("synthetic square in bounds");
        region
            .set_to(&Scalar::all(255.0), &core::no_array())
            .expect("paint synthetic square");
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_emits_configured_frame_count() {
        let mut source = VideoSource::open(VideoConfig::new("stub://motion?frames=5")).unwrap();
        let mut frames = 0;
        while source.next_frame().unwrap().is_some() {
            frames += 1;
        }
        assert_eq!(frames, 5);

        // End-of-stream is stable, not a one-shot.
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn synthetic_source_reports_a_frame_rate() {
        let source = VideoSource::open(VideoConfig::new("stub://motion")).unwrap();
        assert_eq!(source.frame_rate(), Some(SYNTHETIC_FPS));
    }

    #[test]
    fn synthetic_frames_change_between_consecutive_frames() {
        let mut source = VideoSource::open(VideoConfig::new("stub://motion?frames=3")).unwrap();
        let first = source.next_frame().unwrap().unwrap();
        let second = source.next_frame().unwrap().unwrap();

        let mut diff = Mat::default();
        core::absdiff(&first, &second, &mut diff).unwrap();
        let changed = core::count_non_zero(&diff.reshape(1, 0).unwrap()).unwrap();
        assert!(changed > 0);
    }

    #[test]
    fn bad_frame_count_is_an_open_failure() {
        let err = VideoSource::open(VideoConfig::new("stub://motion?frames=lots")).unwrap_err();
        assert!(matches!(err, StageError::OpenFailure { .. }));
    }

    #[test]
    fn missing_file_is_an_open_failure() {
        let err =
            VideoSource::open(VideoConfig::new("/definitely/not/here.mp4")).unwrap_err();
        assert!(matches!(err, StageError::OpenFailure { .. }));
    }
}
