use image::GenericImageView;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn full<I: GenericImageView>(img: &I) -> Self {
        let (width, height) = img.dimensions();
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Square of half-size `half` around `center`, intersected with a
    /// `frame_w × frame_h` frame. Corners are truncated to whole pixels.
    /// Returns `None` when the intersection is empty.
    pub fn around(center: Point2<f64>, half: f64, frame_w: u32, frame_h: u32) -> Option<Self> {
        if !(center.x.is_finite() && center.y.is_finite() && half.is_finite()) {
            return None;
        }
        let x1 = ((center.x - half) as i64).max(0);
        let y1 = ((center.y - half) as i64).max(0);
        let x2 = ((center.x + half) as i64).min(frame_w as i64);
        let y2 = ((center.y + half) as i64).min(frame_h as i64);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Self {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        })
    }

    #[inline]
    pub fn offset(&self) -> nalgebra::Vector2<f64> {
        nalgebra::Vector2::new(self.x as f64, self.y as f64)
    }
}
