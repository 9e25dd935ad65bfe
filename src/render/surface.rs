//! Display surfaces.
//!
//! The renderer presents frames through a `DisplaySurface`, which is either a
//! real OpenCV `highgui` window or a headless backend that swallows frames
//! and never signals quit. The headless backend is for tests and for
//! detection-only runs on machines without a display.

use opencv::core::Mat;
use opencv::highgui;

use crate::error::{StageError, StageResult};

/// Key that requests an immediate stop of the renderer loop.
const QUIT_KEY: u8 = b'q';

/// Where the renderer presents frames.
pub struct DisplaySurface {
    backend: SurfaceBackend,
}

enum SurfaceBackend {
    Window { title: String },
    Headless,
}

impl DisplaySurface {
    /// Create an on-screen window surface.
    pub fn window(title: &str) -> StageResult<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
            .map_err(StageError::PresentationFault)?;
        Ok(Self {
            backend: SurfaceBackend::Window {
                title: title.to_string(),
            },
        })
    }

    /// Create a surface that discards frames and never signals quit.
    pub fn headless() -> Self {
        Self {
            backend: SurfaceBackend::Headless,
        }
    }

    /// Present one frame.
    pub fn present(&mut self, pixels: &Mat) -> StageResult<()> {
        match &self.backend {
            SurfaceBackend::Window { title } => {
                highgui::imshow(title, pixels).map_err(StageError::PresentationFault)
            }
            SurfaceBackend::Headless => Ok(()),
        }
    }

    /// Non-blocking poll (1 ms) for the quit key.
    pub fn poll_quit(&mut self) -> StageResult<bool> {
        match &self.backend {
            SurfaceBackend::Window { .. } => {
                let key = highgui::wait_key(1).map_err(StageError::PresentationFault)?;
                Ok((key & 0xff) == i32::from(QUIT_KEY))
            }
            SurfaceBackend::Headless => Ok(false),
        }
    }

    /// Release display resources. Called unconditionally on renderer exit;
    /// a failure here is logged, not propagated.
    pub fn release(&mut self) {
        if let SurfaceBackend::Window { .. } = &self.backend {
            if let Err(err) = highgui::destroy_all_windows() {
                log::warn!("renderer: failed to release display: {}", err);
            }
        }
    }
}
