//! Detection and timestamp overlays.

use chrono::Local;
use opencv::core::{self, Mat, Point, Rect, Scalar, Size};
use opencv::imgproc;
use opencv::prelude::*;

use crate::detect::Detection;
use crate::error::{StageError, StageResult};

use super::RenderMode;

/// Kernel side for the privacy blur applied inside detection rectangles.
/// Heavier than the detector's noise blur; clamped to the next odd value.
const PRIVACY_BLUR_KERNEL: i32 = 31;

const BOX_THICKNESS: i32 = 2;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_ORIGIN: (i32, i32) = (10, 30);
const TIMESTAMP_SCALE: f64 = 0.7;

/// Green, the usual marker color for motion overlays.
fn overlay_color() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

/// Draw the detection markers and the wall-clock timestamp onto `pixels`.
pub fn annotate(
    pixels: &mut Mat,
    detections: &[Detection],
    mode: RenderMode,
) -> StageResult<()> {
    for detection in detections {
        let rect = detection.rect();
        if mode == RenderMode::PrivacyBlur {
            blur_region(pixels, rect)?;
        }
        imgproc::rectangle(
            pixels,
            rect,
            overlay_color(),
            BOX_THICKNESS,
            imgproc::LINE_8,
            0,
        )
        .map_err(StageError::PresentationFault)?;
    }

    draw_timestamp(pixels)
}

/// Blur the pixels inside `rect` in place. Used by the privacy rendering
/// mode before the outline is drawn.
fn blur_region(pixels: &mut Mat, rect: Rect) -> StageResult<()> {
    let kernel = clamp_odd(PRIVACY_BLUR_KERNEL);

    let region = Mat::roi(pixels, rect)
        .map_err(StageError::PresentationFault)?
        .try_clone()
        .map_err(StageError::PresentationFault)?;

    let mut blurred = Mat::default();
    imgproc::gaussian_blur(
        &region,
        &mut blurred,
        Size::new(kernel, kernel),
        0.0,
        0.0,
        core::BORDER_DEFAULT,
    )
    .map_err(StageError::PresentationFault)?;

    let mut target = Mat::roi_mut(pixels, rect).map_err(StageError::PresentationFault)?;
    blurred
        .copy_to(&mut target)
        .map_err(StageError::PresentationFault)?;
    Ok(())
}

fn draw_timestamp(pixels: &mut Mat) -> StageResult<()> {
    let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    imgproc::put_text(
        pixels,
        &stamp,
        Point::new(TIMESTAMP_ORIGIN.0, TIMESTAMP_ORIGIN.1),
        imgproc::FONT_HERSHEY_SIMPLEX,
        TIMESTAMP_SCALE,
        overlay_color(),
        BOX_THICKNESS,
        imgproc::LINE_8,
        false,
    )
    .map_err(StageError::PresentationFault)
}

/// Gaussian kernels must be odd.
fn clamp_odd(kernel: i32) -> i32 {
    if kernel % 2 == 0 {
        kernel + 1
    } else {
        kernel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    fn test_frame() -> Mat {
        Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn center_mean(frame: &Mat, rect: Rect) -> Scalar {
        let region = Mat::roi(frame, rect).unwrap();
        core::mean(&region, &core::no_array()).unwrap()
    }

    #[test]
    fn outline_mode_leaves_box_interior_untouched() {
        let mut frame = test_frame();
        let detection = Detection {
            x: 100,
            y: 100,
            width: 50,
            height: 50,
            area: 2500.0,
        };

        annotate(&mut frame, &[detection], RenderMode::Outline).unwrap();

        // Away from the 2 px outline, the interior is still black.
        let interior = center_mean(&frame, Rect::new(110, 110, 30, 30));
        assert_eq!(interior[0], 0.0);
        assert_eq!(interior[1], 0.0);
    }

    #[test]
    fn privacy_mode_blurs_box_interior() {
        let mut frame = test_frame();
        // A small bright patch inside the detection so the blur has something
        // to smear.
        let mut patch = Mat::roi_mut(&mut frame, Rect::new(120, 120, 10, 10)).unwrap();
        patch.set_to(&Scalar::all(255.0), &core::no_array()).unwrap();

        let detection = Detection {
            x: 100,
            y: 100,
            width: 50,
            height: 50,
            area: 2500.0,
        };
        annotate(&mut frame, &[detection], RenderMode::PrivacyBlur).unwrap();

        // The hard edge of the patch is gone: pixels just outside it picked
        // up smeared intensity.
        let ring = center_mean(&frame, Rect::new(133, 120, 6, 10));
        assert!(ring[0] > 0.0, "expected blur spill, got {:?}", ring);
    }

    #[test]
    fn clamp_odd_rounds_up_even_kernels() {
        assert_eq!(clamp_odd(30), 31);
        assert_eq!(clamp_odd(31), 31);
    }
}
