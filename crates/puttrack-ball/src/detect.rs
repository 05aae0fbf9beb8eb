//! Single-frame ball detection.

use image::RgbImage;
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::color::{hsv_mask, rgb_to_hsv, HsvRange};
use crate::hough::find_circles;
use crate::mask::clean_mask;
use crate::params::DetectorParams;
use crate::roi::Roi;
use crate::shape::{blob_shapes, BlobShape};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Where the ball is in the image, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalizationResult {
    pub center: Point2<f64>,
    pub radius: f64,
    /// Detection score or tracking confidence, in `[0, 1]`.
    pub confidence: f64,
}

/// Contour score: roundness first, then fill, with a small bonus for size.
pub fn detection_score(shape: &BlobShape) -> f64 {
    0.5 * shape.circularity + 0.3 * shape.fill_ratio + 0.2 * shape.area / 10_000.0
}

/// Colour and shape based detector.
#[derive(Clone, Debug, Default)]
pub struct BallDetector {
    params: DetectorParams,
}

impl BallDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Best ball candidate in the whole frame.
    pub fn detect(&self, frame: &RgbImage) -> Option<LocalizationResult> {
        self.detect_in_window(frame, Roi::full(frame))
    }

    /// Best ball candidate inside `roi`, reported in frame coordinates.
    ///
    /// Contours of the cleaned colour mask are filtered by area and enclosing
    /// radius and ranked by [`detection_score`]. When none survive, a circle
    /// search on the mask takes over and the largest circle wins.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(w = roi.width, h = roi.height))
    )]
    pub fn detect_in_window(&self, frame: &RgbImage, roi: Roi) -> Option<LocalizationResult> {
        let roi = clip(roi, frame)?;
        let p = &self.params;
        let mask = clean_mask(&hsv_mask(frame, roi, &p.hsv), &p.morphology);
        let offset = roi.offset();

        let best = blob_shapes(&mask)
            .into_iter()
            .filter(|s| self.plausible(s))
            .map(|s| (detection_score(&s), s))
            .max_by(|a, b| a.0.total_cmp(&b.0));

        if let Some((score, s)) = best {
            debug!(
                "ball contour at ({:.1}, {:.1}) r={:.1} score={:.3}",
                s.center.x + offset.x,
                s.center.y + offset.y,
                s.radius,
                score
            );
            return Some(LocalizationResult {
                center: s.center + offset,
                radius: s.radius,
                confidence: score.clamp(0.0, 1.0),
            });
        }

        if !p.hough.enabled {
            return None;
        }
        let circle = find_circles(&mask, p.min_radius_px, p.max_radius_px, &p.hough)
            .into_iter()
            .max_by(|a, b| a.radius.total_cmp(&b.radius))?;
        debug!(
            "ball circle fallback at ({:.1}, {:.1}) r={:.1}",
            circle.center.x + offset.x,
            circle.center.y + offset.y,
            circle.radius
        );
        Some(LocalizationResult {
            center: circle.center + offset,
            radius: circle.radius,
            confidence: circle.support,
        })
    }

    /// All plausible balls in the frame, largest first, at most `max`.
    pub fn detect_all(&self, frame: &RgbImage, max: usize) -> Vec<LocalizationResult> {
        let p = &self.params;
        let mask = clean_mask(&hsv_mask(frame, Roi::full(frame), &p.hsv), &p.morphology);
        let mut found: Vec<LocalizationResult> = blob_shapes(&mask)
            .into_iter()
            .filter(|s| self.plausible(s))
            .map(|s| LocalizationResult {
                center: s.center,
                radius: s.radius,
                confidence: detection_score(&s).clamp(0.0, 1.0),
            })
            .collect();
        found.sort_by(|a, b| b.radius.total_cmp(&a.radius));
        found.truncate(max);
        found
    }

    /// Ball at an externally chosen point (for example a mouse click).
    ///
    /// The colour under the point seeds a tolerance window; the closest
    /// blob of that colour with a plausible radius whose centre lies within
    /// 1.5 radii of the point sets the radius. The reported centre is the
    /// point itself.
    pub fn detect_at_point(
        &self,
        frame: &RgbImage,
        point: Point2<f64>,
    ) -> Option<LocalizationResult> {
        let (w, h) = frame.dimensions();
        if !(point.x >= 0.0 && point.y >= 0.0 && point.x < w as f64 && point.y < h as f64) {
            return None;
        }
        let p = &self.params;
        let seed = rgb_to_hsv(*frame.get_pixel(point.x as u32, point.y as u32));
        let range = HsvRange::around(seed, p.manual_margin);
        let mask = hsv_mask(frame, Roi::full(frame), &range);

        let (shape, dist) = blob_shapes(&mask)
            .into_iter()
            .filter(|s| p.min_radius_px < s.radius && s.radius < p.max_radius_px)
            .map(|s| ((s.center - point).norm(), s))
            .filter(|(d, s)| *d <= 1.5 * s.radius)
            .map(|(d, s)| (s, d))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        debug!(
            "manual pick at ({:.1}, {:.1}): r={:.1}, blob {:.1}px away",
            point.x, point.y, shape.radius, dist
        );

        Some(LocalizationResult {
            center: point,
            radius: shape.radius,
            confidence: 1.0,
        })
    }

    fn plausible(&self, s: &BlobShape) -> bool {
        let p = &self.params;
        s.area >= PI * p.min_radius_px * p.min_radius_px
            && p.min_radius_px < s.radius
            && s.radius < p.max_radius_px
    }
}

fn clip(roi: Roi, frame: &RgbImage) -> Option<Roi> {
    let (w, h) = frame.dimensions();
    if roi.x >= w || roi.y >= h {
        return None;
    }
    let width = roi.width.min(w - roi.x);
    let height = roi.height.min(h - roi.y);
    (width > 0 && height > 0).then_some(Roi {
        x: roi.x,
        y: roi.y,
        width,
        height,
    })
}
