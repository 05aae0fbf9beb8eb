//! Frame-to-frame trackers seeded by a detection.
//!
//! A tracker keeps a [`TrackState`] and searches a window around the
//! predicted position. A miss keeps reporting the last position
//! ([`TrackUpdate::Coasting`]) until more than `max_lost_frames`
//! consecutive misses have accumulated, after which the track is
//! [`TrackUpdate::Lost`] until it is re-initialised.

use image::imageops::{crop_imm, grayscale};
use image::{GrayImage, RgbImage};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use log::debug;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::color::{hsv_mask, HsvRange};
use crate::detect::LocalizationResult;
use crate::mask::clean_mask;
use crate::params::{DetectorParams, TrackerParams, TrackingMethod};
use crate::roi::Roi;
use crate::shape::blob_shapes;

/// Motion state of an active track, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackState {
    pub position: Point2<f64>,
    /// Smoothed radius.
    pub radius: f64,
    /// Smoothed displacement per frame.
    pub velocity: Vector2<f64>,
    /// Consecutive frames without a match.
    pub lost_frames: u32,
    /// Half-size of the last search window.
    pub search_margin: f64,
}

impl TrackState {
    pub fn new(seed: &LocalizationResult, search_margin: f64) -> Self {
        Self {
            position: seed.center,
            radius: seed.radius,
            velocity: Vector2::zeros(),
            lost_frames: 0,
            search_margin,
        }
    }

    /// Constant-velocity guess for the next frame.
    #[inline]
    pub fn predicted(&self) -> Point2<f64> {
        self.position + self.velocity
    }

    fn coast(&mut self, max_lost_frames: u32) -> TrackUpdate {
        self.lost_frames = self.lost_frames.saturating_add(1);
        if self.lost_frames > max_lost_frames {
            return TrackUpdate::Lost;
        }
        TrackUpdate::Coasting(LocalizationResult {
            center: self.position,
            radius: self.radius,
            confidence: 0.0,
        })
    }

    fn accept(&mut self, center: Point2<f64>, radius: f64, params: &TrackerParams) {
        let alpha = params.velocity_alpha;
        self.velocity = (center - self.position) * alpha + self.velocity * (1.0 - alpha);
        self.position = center;
        let k = params.radius_smoothing;
        self.radius = k * self.radius + (1.0 - k) * radius;
        self.lost_frames = 0;
    }
}

/// Result of one tracking step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrackUpdate {
    /// Matched in this frame; the radius is the smoothed one.
    Found(LocalizationResult),
    /// Missed; carries the last known position.
    Coasting(LocalizationResult),
    /// Too many consecutive misses, or no active track.
    Lost,
}

pub trait Tracker: std::fmt::Debug + Send {
    fn method(&self) -> TrackingMethod;

    /// Start a new track from a detection in `frame`.
    fn init(&mut self, frame: &RgbImage, seed: &LocalizationResult);

    fn update(&mut self, frame: &RgbImage) -> TrackUpdate;

    fn state(&self) -> Option<&TrackState>;

    fn reset(&mut self);

    fn is_active(&self) -> bool {
        self.state().is_some()
    }
}

/// Build the tracker selected by `params.method`.
pub fn build_tracker(detector: &DetectorParams, params: &TrackerParams) -> Box<dyn Tracker> {
    match params.method {
        TrackingMethod::Color => Box::new(ColorTracker::new(detector, params.clone())),
        TrackingMethod::Template => Box::new(TemplateTracker::new(params.clone())),
    }
}

fn search_window(state: &TrackState, params: &TrackerParams, frame: &RgbImage) -> Option<Roi> {
    let (w, h) = frame.dimensions();
    Roi::around(state.predicted(), state.search_margin, w, h)
        .filter(|r| r.width >= params.min_window_px && r.height >= params.min_window_px)
}

/// Re-runs colour segmentation inside a window around the prediction.
#[derive(Clone, Debug)]
pub struct ColorTracker {
    hsv: HsvRange,
    min_radius: f64,
    max_radius: f64,
    params: TrackerParams,
    state: Option<TrackState>,
}

impl ColorTracker {
    pub fn new(detector: &DetectorParams, params: TrackerParams) -> Self {
        Self {
            hsv: detector.hsv,
            min_radius: detector.min_radius_px,
            max_radius: detector.max_radius_px,
            params,
            state: None,
        }
    }
}

impl Tracker for ColorTracker {
    fn method(&self) -> TrackingMethod {
        TrackingMethod::Color
    }

    fn init(&mut self, _frame: &RgbImage, seed: &LocalizationResult) {
        let margin = self.params.search_margin_px + 2.0 * seed.radius;
        self.state = Some(TrackState::new(seed, margin));
    }

    fn update(&mut self, frame: &RgbImage) -> TrackUpdate {
        let params = &self.params;
        let Some(state) = self.state.as_mut() else {
            return TrackUpdate::Lost;
        };
        state.search_margin = params.search_margin_px + 2.0 * state.radius;

        let Some(roi) = search_window(state, params, frame) else {
            debug!("color track: search window degenerate");
            return state.coast(params.max_lost_frames);
        };

        let mask = clean_mask(&hsv_mask(frame, roi, &self.hsv), &params.morphology);
        let predicted = state.predicted();
        let half = state.search_margin;
        let last_radius = state.radius;
        let min_area = 0.3 * PI * self.min_radius * self.min_radius;
        let (r_lo, r_hi) = (0.5 * self.min_radius, 1.5 * self.max_radius);

        let best = blob_shapes(&mask)
            .into_iter()
            .filter(|s| s.area >= min_area && s.radius >= r_lo && s.radius <= r_hi)
            .map(|s| {
                let center = s.center + roi.offset();
                let dist = (center - predicted).norm();
                let radius_diff = (s.radius - last_radius).abs() / last_radius.max(1.0);
                let score = s.circularity - dist / half - 0.5 * radius_diff;
                (score, center, s.radius)
            })
            .max_by(|a, b| a.0.total_cmp(&b.0));

        let Some((score, center, radius)) = best else {
            debug!("color track: no candidate ({} misses)", state.lost_frames + 1);
            return state.coast(params.max_lost_frames);
        };

        state.accept(center, radius, params);
        TrackUpdate::Found(LocalizationResult {
            center,
            radius: state.radius,
            confidence: score.clamp(0.0, 1.0),
        })
    }

    fn state(&self) -> Option<&TrackState> {
        self.state.as_ref()
    }

    fn reset(&mut self) {
        self.state = None;
    }
}

/// Follows the gray appearance of the seed detection by template matching.
#[derive(Clone, Debug)]
pub struct TemplateTracker {
    params: TrackerParams,
    template: Option<GrayImage>,
    /// Ball centre relative to the template's top-left corner.
    anchor: Vector2<f64>,
    state: Option<TrackState>,
}

impl TemplateTracker {
    const MIN_TEMPLATE_PX: u32 = 3;

    pub fn new(params: TrackerParams) -> Self {
        Self {
            params,
            template: None,
            anchor: Vector2::zeros(),
            state: None,
        }
    }
}

impl Tracker for TemplateTracker {
    fn method(&self) -> TrackingMethod {
        TrackingMethod::Template
    }

    fn init(&mut self, frame: &RgbImage, seed: &LocalizationResult) {
        self.reset();
        let (w, h) = frame.dimensions();
        let Some(bbox) = Roi::around(seed.center, seed.radius.max(2.0), w, h) else {
            return;
        };
        if bbox.width < Self::MIN_TEMPLATE_PX || bbox.height < Self::MIN_TEMPLATE_PX {
            return;
        }
        let patch = crop_imm(frame, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
        self.template = Some(grayscale(&patch));
        self.anchor = seed.center - Point2::from(bbox.offset());
        let margin = self.params.search_margin_px + 2.0 * seed.radius;
        self.state = Some(TrackState::new(seed, margin));
    }

    fn update(&mut self, frame: &RgbImage) -> TrackUpdate {
        let params = &self.params;
        let (Some(state), Some(template)) = (self.state.as_mut(), self.template.as_ref()) else {
            return TrackUpdate::Lost;
        };
        state.search_margin = params.search_margin_px + 2.0 * state.radius;

        let window = search_window(state, params, frame)
            .filter(|r| r.width >= template.width() && r.height >= template.height());
        let Some(roi) = window else {
            debug!("template track: search window degenerate");
            return state.coast(params.max_lost_frames);
        };

        let patch = grayscale(&crop_imm(frame, roi.x, roi.y, roi.width, roi.height).to_image());
        let errors = match_template(
            &patch,
            template,
            MatchTemplateMethod::SumOfSquaredErrorsNormalized,
        );
        let extremes = find_extremes(&errors);
        let err = extremes.min_value as f64;
        if !(err <= params.max_template_error) {
            debug!("template track: best error {err:.3} above limit");
            return state.coast(params.max_lost_frames);
        }

        let (mx, my) = extremes.min_value_location;
        let center = Point2::new(roi.x as f64 + mx as f64, roi.y as f64 + my as f64) + self.anchor;
        let radius = state.radius;
        state.accept(center, radius, params);
        TrackUpdate::Found(LocalizationResult {
            center,
            radius: state.radius,
            confidence: (1.0 - err).clamp(0.0, 1.0),
        })
    }

    fn state(&self) -> Option<&TrackState> {
        self.state.as_ref()
    }

    fn reset(&mut self) {
        self.state = None;
        self.template = None;
        self.anchor = Vector2::zeros();
    }
}
