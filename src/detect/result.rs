//! Detection records emitted by the motion detector.

use opencv::core::Rect;

/// A region of frame-to-frame change.
///
/// The bounding rectangle is axis-aligned and lies fully inside the frame
/// that carried it. `area` is the enclosed area of the contour that produced
/// the rectangle, in pixels; contour areas carry sub-integer precision, so it
/// stays a float even though the rectangle is integral. A detection only
/// exists when `area` reached the configured minimum.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub area: f64,
}

impl Detection {
    /// The bounding rectangle in the coordinate space of the source frame.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}
