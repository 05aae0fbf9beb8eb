//! Tunables for detection and tracking, with the reference defaults.

use serde::{Deserialize, Serialize};

use crate::color::HsvRange;

/// Rejected parameter combinations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParamsError {
    #[error("radius bounds must satisfy 0 <= min < max, got min={min} max={max}")]
    RadiusBounds { min: f64, max: f64 },
    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
}

/// Erode once, then dilate `dilate_iterations` times, with square kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyParams {
    /// Kernel half-size; 0 skips erosion.
    pub erode_radius: u8,
    pub dilate_radius: u8,
    pub dilate_iterations: u8,
}

impl MorphologyParams {
    /// 7×7 kernel, used for full-frame detection.
    pub fn detection() -> Self {
        Self {
            erode_radius: 3,
            dilate_radius: 3,
            dilate_iterations: 2,
        }
    }

    /// 5×5 kernel, used inside tracking windows.
    pub fn tracking() -> Self {
        Self {
            erode_radius: 2,
            dilate_radius: 2,
            dilate_iterations: 2,
        }
    }
}

impl Default for MorphologyParams {
    fn default() -> Self {
        Self::detection()
    }
}

/// Gradient-voting circle search used when no contour qualifies.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughParams {
    pub enabled: bool,
    /// Minimum distance between two reported centres.
    pub min_distance_px: f64,
    /// Edge threshold as a fraction of the strongest gradient.
    pub grad_threshold: f64,
    /// Peaks below this fraction of the strongest peak are ignored.
    pub min_vote_frac: f64,
    /// Fraction of the circumference that must be backed by edge pixels.
    pub min_support: f64,
    /// Smoothing applied to the mask before taking gradients.
    pub blur_sigma: f32,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            enabled: true,
            min_distance_px: 50.0,
            grad_threshold: 0.3,
            min_vote_frac: 0.5,
            min_support: 0.35,
            blur_sigma: 1.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub hsv: HsvRange,
    pub min_radius_px: f64,
    pub max_radius_px: f64,
    pub morphology: MorphologyParams,
    pub hough: HoughParams,
    /// H, S, V half-widths of the window built around a clicked colour.
    pub manual_margin: [u8; 3],
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            hsv: HsvRange::default(),
            min_radius_px: 8.0,
            max_radius_px: 120.0,
            morphology: MorphologyParams::detection(),
            hough: HoughParams::default(),
            manual_margin: [15, 60, 60],
        }
    }
}

impl DetectorParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        let (min, max) = (self.min_radius_px, self.max_radius_px);
        if !(min >= 0.0 && min < max && max.is_finite()) {
            return Err(ParamsError::RadiusBounds { min, max });
        }
        for (name, value) in [
            ("hough.grad_threshold", self.hough.grad_threshold),
            ("hough.min_vote_frac", self.hough.min_vote_frac),
            ("hough.min_support", self.hough.min_support),
        ] {
            unit_range(name, value)?;
        }
        Ok(())
    }
}

/// Which frame-to-frame tracker the localizer runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMethod {
    /// Colour segmentation inside a predicted search window.
    #[default]
    Color,
    /// Gray template matching seeded from the detection.
    Template,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    pub method: TrackingMethod,
    /// Base half-size of the search window, grown by twice the ball radius.
    pub search_margin_px: f64,
    /// Consecutive misses tolerated before the track is declared lost.
    pub max_lost_frames: u32,
    /// Weight of the newest displacement in the velocity estimate.
    pub velocity_alpha: f64,
    /// Weight of the previous radius in the smoothed radius.
    pub radius_smoothing: f64,
    /// Windows narrower than this (either axis) count as a miss.
    pub min_window_px: u32,
    pub morphology: MorphologyParams,
    /// Template tracker: a best match with a larger normalized squared
    /// error counts as a miss.
    pub max_template_error: f64,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            method: TrackingMethod::Color,
            search_margin_px: 80.0,
            max_lost_frames: 30,
            velocity_alpha: 0.6,
            radius_smoothing: 0.7,
            min_window_px: 10,
            morphology: MorphologyParams::tracking(),
            max_template_error: 0.1,
        }
    }
}

impl TrackerParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        unit_range("velocity_alpha", self.velocity_alpha)?;
        unit_range("radius_smoothing", self.radius_smoothing)?;
        if !(self.search_margin_px > 0.0) {
            return Err(ParamsError::NotPositive {
                name: "search_margin_px",
                value: self.search_margin_px,
            });
        }
        if !(self.max_template_error > 0.0) {
            return Err(ParamsError::NotPositive {
                name: "max_template_error",
                value: self.max_template_error,
            });
        }
        Ok(())
    }
}

/// Everything the [`Localizer`](crate::Localizer) needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerParams {
    pub detector: DetectorParams,
    pub tracker: TrackerParams,
}

impl LocalizerParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        self.detector.validate()?;
        self.tracker.validate()
    }
}

fn unit_range(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParamsError::OutOfUnitRange { name, value })
    }
}
