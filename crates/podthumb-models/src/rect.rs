use serde::{Deserialize, Serialize};

/// A normalized bounding box (0.0 to 1.0) given by its corners.
///
/// This is the shape the video model reports for a face: `x1,y1` is the
/// top-left corner and `x2,y2` the bottom-right, relative to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl NormalizedBox {
    /// Box used for synthesized candidates: centered, most of the frame height.
    pub const CENTERED: NormalizedBox = NormalizedBox {
        x1: 0.3,
        y1: 0.1,
        x2: 0.7,
        y2: 0.9,
    };

    /// Create a new normalized box.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Clamp all four coordinates into `[0, 1]`.
    ///
    /// NaN coordinates collapse to 0.0 so that they surface as a degenerate box.
    pub fn clamped(&self) -> Self {
        fn unit(v: f64) -> f64 {
            if v.is_nan() {
                0.0
            } else {
                v.clamp(0.0, 1.0)
            }
        }
        Self {
            x1: unit(self.x1),
            y1: unit(self.y1),
            x2: unit(self.x2),
            y2: unit(self.y2),
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// True when the box has no horizontal or vertical extent.
    pub fn is_degenerate(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    /// Check if the box is valid (inside the unit square with positive extent).
    pub fn is_valid(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
            && !self.is_degenerate()
    }
}

impl Default for NormalizedBox {
    fn default() -> Self {
        Self::CENTERED
    }
}
