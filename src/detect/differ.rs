//! Frame-differencing motion detection.
//!
//! The detector keeps a single rolling background reference: the grayscale,
//! blurred version of the most recently processed frame. Each new frame is
//! compared against that reference, so the baseline always trails by exactly
//! one frame. This is pure frame-to-frame differencing, not accumulated
//! background modeling. Known consequences: an object that stops moving still
//! registers as changed for one more frame, and a very slowly moving object
//! may never exceed the threshold. Both are accepted limitations of the
//! algorithm, not defects.

use opencv::core::{self, Mat, Point, Size, Vector};
use opencv::imgproc;

use crate::error::{StageError, StageResult};

use super::result::Detection;

/// Side of the Gaussian smoothing kernel applied before differencing.
/// Suppresses sensor noise so the difference does not fire on sub-pixel
/// flicker. Sigma is left at 0 so the library derives it from the kernel.
pub const BLUR_KERNEL: i32 = 21;

/// Intensity cutoff for the binary change mask. Chosen empirically.
pub const DIFF_THRESHOLD: f64 = 15.0;

/// Default minimum contour area, in pixels, for a region to count as motion.
pub const DEFAULT_MIN_AREA: f64 = 100.0;

/// Side of the elliptical structuring element used for morphological cleanup.
const MORPH_KERNEL: i32 = 5;

/// One erosion pass removes isolated noise pixels.
const ERODE_ITERATIONS: i32 = 1;

/// Three dilation passes reconnect and grow the surviving regions into solid
/// blobs suitable for bounding.
const DILATE_ITERATIONS: i32 = 3;

/// Stateful frame differencer. Single-owner: lives inside the detector
/// stage's loop and is never shared.
pub struct FrameDiffer {
    min_area: f64,
    kernel: Mat,
    background: Option<Mat>,
}

impl FrameDiffer {
    pub fn new(min_area: f64) -> StageResult<Self> {
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_ELLIPSE,
            Size::new(MORPH_KERNEL, MORPH_KERNEL),
            Point::new(-1, -1),
        )
        .map_err(StageError::FrameProcessingFault)?;

        Ok(Self {
            min_area,
            kernel,
            background: None,
        })
    }

    /// Compute the motion regions in `pixels` relative to the previous frame.
    ///
    /// The first frame ever processed establishes the background reference
    /// and yields zero detections. On error the differ's state is unchanged:
    /// a frame either fully completes processing or is abandoned whole.
    pub fn process(&mut self, pixels: &Mat) -> StageResult<Vec<Detection>> {
        let prepared = self.prepare(pixels)?;

        let Some(background) = self.background.as_ref() else {
            self.background = Some(prepared);
            return Ok(Vec::new());
        };

        let mut diff = Mat::default();
        core::absdiff(&prepared, background, &mut diff)
            .map_err(StageError::FrameProcessingFault)?;

        let mut mask = Mat::default();
        imgproc::threshold(
            &diff,
            &mut mask,
            DIFF_THRESHOLD,
            255.0,
            imgproc::THRESH_BINARY,
        )
        .map_err(StageError::FrameProcessingFault)?;

        let cleaned = self.cleanup(&mask)?;
        let detections = self.extract(&cleaned)?;

        // The reference always trails by exactly one frame.
        self.background = Some(prepared);

        Ok(detections)
    }

    /// Grayscale conversion plus noise-suppressing blur.
    fn prepare(&self, pixels: &Mat) -> StageResult<Mat> {
        let mut gray = Mat::default();
        imgproc::cvt_color(
            pixels,
            &mut gray,
            imgproc::COLOR_BGR2GRAY,
            0,
        )
        .map_err(StageError::FrameProcessingFault)?;

        let mut blurred = Mat::default();
        imgproc::gaussian_blur(
            &gray,
            &mut blurred,
            Size::new(BLUR_KERNEL, BLUR_KERNEL),
            0.0,
            0.0,
            core::BORDER_DEFAULT,
        )
        .map_err(StageError::FrameProcessingFault)?;

        Ok(blurred)
    }

    /// Erosion then heavier dilation on the binary mask.
    fn cleanup(&self, mask: &Mat) -> StageResult<Mat> {
        let border = imgproc::morphology_default_border_value()
            .map_err(StageError::FrameProcessingFault)?;

        let mut eroded = Mat::default();
        imgproc::erode(
            mask,
            &mut eroded,
            &self.kernel,
            Point::new(-1, -1),
            ERODE_ITERATIONS,
            core::BORDER_CONSTANT,
            border,
        )
        .map_err(StageError::FrameProcessingFault)?;

        let mut grown = Mat::default();
        imgproc::dilate(
            &eroded,
            &mut grown,
            &self.kernel,
            Point::new(-1, -1),
            DILATE_ITERATIONS,
            core::BORDER_CONSTANT,
            border,
        )
        .map_err(StageError::FrameProcessingFault)?;

        Ok(grown)
    }

    /// Outer contours of the mask, filtered by minimum area, as bounding
    /// rectangles.
    fn extract(&self, mask: &Mat) -> StageResult<Vec<Detection>> {
        let mut contours = Vector::<Vector<Point>>::new();
        imgproc::find_contours(
            mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )
        .map_err(StageError::FrameProcessingFault)?;

        let mut detections = Vec::new();
        for contour in contours.iter() {
            let area = imgproc::contour_area(&contour, false)
                .map_err(StageError::FrameProcessingFault)?;
            if area < self.min_area {
                continue;
            }

            let rect = imgproc::bounding_rect(&contour)
                .map_err(StageError::FrameProcessingFault)?;
            detections.push(Detection {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                area,
            });
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, Scalar};
    use opencv::prelude::*;

    const WIDTH: i32 = 640;
    const HEIGHT: i32 = 480;

    fn black_frame() -> Mat {
        Mat::new_rows_cols_with_default(HEIGHT, WIDTH, core::CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn frame_with_square(x: i32, y: i32, side: i32) -> Mat {
        let mut frame = black_frame();
        let mut region = Mat::roi_mut(&mut frame, Rect::new(x, y, side, side)).unwrap();
        region.set_to(&Scalar::all(255.0), &core::no_array()).unwrap();
        frame
    }

    #[test]
    fn first_frame_establishes_baseline_with_no_detections() {
        let mut differ = FrameDiffer::new(DEFAULT_MIN_AREA).unwrap();
        let detections = differ.process(&frame_with_square(100, 100, 50)).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn white_square_yields_single_detection() {
        let mut differ = FrameDiffer::new(DEFAULT_MIN_AREA).unwrap();
        assert!(differ.process(&black_frame()).unwrap().is_empty());

        let detections = differ.process(&frame_with_square(100, 100, 50)).unwrap();
        assert_eq!(detections.len(), 1);

        // Blur and dilation grow the changed region slightly past the square,
        // so the box must contain the square and stay close to it.
        let det = &detections[0];
        assert!(det.x <= 100 && det.x >= 80, "x = {}", det.x);
        assert!(det.y <= 100 && det.y >= 80, "y = {}", det.y);
        assert!(det.x + det.width >= 150 && det.x + det.width <= 170);
        assert!(det.y + det.height >= 150 && det.y + det.height <= 170);
        assert!(det.area >= 2500.0 && det.area <= 8000.0, "area = {}", det.area);
    }

    #[test]
    fn min_area_filter_rejects_small_regions() {
        let mut differ = FrameDiffer::new(100_000.0).unwrap();
        assert!(differ.process(&black_frame()).unwrap().is_empty());
        assert!(differ
            .process(&frame_with_square(100, 100, 50))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn emitted_areas_respect_min_area() {
        let mut differ = FrameDiffer::new(DEFAULT_MIN_AREA).unwrap();
        differ.process(&black_frame()).unwrap();
        for det in differ.process(&frame_with_square(200, 150, 60)).unwrap() {
            assert!(det.area >= DEFAULT_MIN_AREA);
            assert!(det.width > 0 && det.height > 0);
        }
    }

    #[test]
    fn detections_lie_within_frame_bounds() {
        let mut differ = FrameDiffer::new(DEFAULT_MIN_AREA).unwrap();
        differ.process(&black_frame()).unwrap();

        // A square flush against the corner stresses the clipping behavior of
        // the morphology and contour steps.
        for det in differ.process(&frame_with_square(0, 0, 50)).unwrap() {
            assert!(det.x >= 0 && det.y >= 0);
            assert!(det.x + det.width <= WIDTH);
            assert!(det.y + det.height <= HEIGHT);
        }
    }

    #[test]
    fn background_trails_by_exactly_one_frame() {
        let mut differ = FrameDiffer::new(DEFAULT_MIN_AREA).unwrap();
        differ.process(&black_frame()).unwrap();

        let square = frame_with_square(100, 100, 50);
        assert_eq!(differ.process(&square).unwrap().len(), 1);

        // The same frame again: the reference has caught up, nothing changed.
        assert!(differ.process(&square).unwrap().is_empty());
    }

    #[test]
    fn identical_runs_produce_identical_detections() {
        let frames = [
            black_frame(),
            frame_with_square(100, 100, 50),
            frame_with_square(160, 100, 50),
            frame_with_square(160, 160, 50),
        ];

        let mut first = FrameDiffer::new(DEFAULT_MIN_AREA).unwrap();
        let mut second = FrameDiffer::new(DEFAULT_MIN_AREA).unwrap();
        for frame in &frames {
            let a = first.process(frame).unwrap();
            let b = second.process(frame).unwrap();
            assert_eq!(a, b);
        }
    }
}
