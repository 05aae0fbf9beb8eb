//! HSV conversion and in-range masks (8-bit convention: H in `0..180`,
//! S and V in `0..=255`).

use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::roi::Roi;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

pub fn rgb_to_hsv(Rgb([r, g, b]): Rgb<u8>) -> Hsv {
    let (rf, gf, bf) = (r as f64, g as f64, b as f64);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = max - min;

    let s = if max > 0.0 { 255.0 * diff / max } else { 0.0 };
    let h_deg = if diff == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / diff
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };
    let h = (h_deg / 2.0).round() as u16 % 180;

    Hsv {
        h: h as u8,
        s: s.round() as u8,
        v: max as u8,
    }
}

/// Inclusive HSV box. When `lower[0] > upper[0]` the hue interval wraps
/// through 0 (reds).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl Default for HsvRange {
    /// Muted yellow of the reference ball under indoor light.
    fn default() -> Self {
        Self {
            lower: [20, 80, 100],
            upper: [32, 200, 200],
        }
    }
}

impl HsvRange {
    #[inline]
    pub fn wraps_hue(&self) -> bool {
        self.lower[0] > self.upper[0]
    }

    #[inline]
    pub fn contains(&self, c: Hsv) -> bool {
        let hue_ok = if self.wraps_hue() {
            c.h >= self.lower[0] || c.h <= self.upper[0]
        } else {
            c.h >= self.lower[0] && c.h <= self.upper[0]
        };
        hue_ok
            && (self.lower[1]..=self.upper[1]).contains(&c.s)
            && (self.lower[2]..=self.upper[2]).contains(&c.v)
    }

    /// Window of `±margin` around a sampled colour, clamped to the valid
    /// ranges (hue does not wrap).
    pub fn around(c: Hsv, margin: [u8; 3]) -> Self {
        let lo = |v: u8, m: u8| v.saturating_sub(m);
        let hi = |v: u8, m: u8, cap: u8| v.saturating_add(m).min(cap);
        Self {
            lower: [lo(c.h, margin[0]), lo(c.s, margin[1]), lo(c.v, margin[2])],
            upper: [
                hi(c.h, margin[0], 179),
                hi(c.s, margin[1], 255),
                hi(c.v, margin[2], 255),
            ],
        }
    }
}

/// 255 where the pixel's colour lies in `range`, for the pixels of `roi`.
/// The mask has the size of the region.
pub fn hsv_mask(frame: &RgbImage, roi: Roi, range: &HsvRange) -> GrayImage {
    GrayImage::from_fn(roi.width, roi.height, |x, y| {
        let px = *frame.get_pixel(roi.x + x, roi.y + y);
        Luma([if range.contains(rgb_to_hsv(px)) { 255 } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_primary_colours() {
        assert_eq!(rgb_to_hsv(Rgb([255, 0, 0])), Hsv { h: 0, s: 255, v: 255 });
        assert_eq!(rgb_to_hsv(Rgb([0, 255, 0])), Hsv { h: 60, s: 255, v: 255 });
        assert_eq!(rgb_to_hsv(Rgb([0, 0, 255])), Hsv { h: 120, s: 255, v: 255 });
        assert_eq!(rgb_to_hsv(Rgb([0, 0, 0])), Hsv { h: 0, s: 0, v: 0 });
        assert_eq!(rgb_to_hsv(Rgb([255, 130, 0])).h, 15);
        assert_eq!(rgb_to_hsv(Rgb([190, 170, 70])), Hsv { h: 25, s: 161, v: 190 });
    }

    #[test]
    fn default_range_takes_yellow_and_rejects_orange_and_felt() {
        let range = HsvRange::default();
        assert!(range.contains(rgb_to_hsv(Rgb([190, 170, 70]))));
        assert!(!range.contains(rgb_to_hsv(Rgb([255, 130, 0]))));
        assert!(!range.contains(rgb_to_hsv(Rgb([40, 120, 40]))));
    }

    #[test]
    fn wrapped_hue_range_accepts_both_ends() {
        let reds = HsvRange {
            lower: [170, 100, 100],
            upper: [10, 255, 255],
        };
        assert!(reds.contains(Hsv { h: 175, s: 200, v: 200 }));
        assert!(reds.contains(Hsv { h: 3, s: 200, v: 200 }));
        assert!(!reds.contains(Hsv { h: 90, s: 200, v: 200 }));
        assert!(!reds.contains(Hsv { h: 3, s: 50, v: 200 }));
    }

    #[test]
    fn window_around_colour_is_clamped() {
        let r = HsvRange::around(Hsv { h: 5, s: 250, v: 30 }, [15, 60, 60]);
        assert_eq!(r.lower, [0, 190, 0]);
        assert_eq!(r.upper, [20, 255, 90]);
    }

    #[test]
    fn mask_covers_only_the_region() {
        let mut frame = RgbImage::from_pixel(20, 10, Rgb([40, 120, 40]));
        frame.put_pixel(12, 5, Rgb([190, 170, 70]));
        let roi = Roi {
            x: 10,
            y: 2,
            width: 5,
            height: 6,
        };
        let mask = hsv_mask(&frame, roi, &HsvRange::default());
        assert_eq!(mask.dimensions(), (5, 6));
        assert_eq!(mask.get_pixel(2, 3)[0], 255);
        assert_eq!(mask.pixels().filter(|p| p[0] == 255).count(), 1);
    }
}
