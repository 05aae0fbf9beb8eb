use image::RgbImage;
use log::{debug, info};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::detect::{BallDetector, LocalizationResult};
use crate::params::{LocalizerParams, ParamsError, TrackingMethod};
use crate::track::{build_tracker, TrackState, TrackUpdate, Tracker};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// How the ball position of a frame was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalizeStatus {
    /// Cold start: found by full-frame detection.
    Detected,
    /// Matched by the tracker.
    Tracked,
    /// Tracker missed; the last known position is repeated.
    Coasting,
    /// The track was lost and full-frame detection found nothing.
    Lost,
    /// The track was lost and full-frame detection found the ball again.
    Reacquired,
    /// No track and nothing detected.
    NotFound,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalizeOutcome {
    pub status: LocalizeStatus,
    pub result: Option<LocalizationResult>,
}

impl LocalizeOutcome {
    fn new(status: LocalizeStatus, result: Option<LocalizationResult>) -> Self {
        Self { status, result }
    }

    pub fn position(&self) -> Option<Point2<f64>> {
        self.result.map(|r| r.center)
    }

    /// True when this frame ended a track.
    pub fn is_lost(&self) -> bool {
        matches!(self.status, LocalizeStatus::Lost | LocalizeStatus::Reacquired)
    }
}

/// Detection on cold start, tracking while warm, detection again after loss.
#[derive(Debug)]
pub struct Localizer {
    detector: BallDetector,
    tracker: Box<dyn Tracker>,
}

impl Localizer {
    pub fn new(params: &LocalizerParams) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self {
            detector: BallDetector::new(params.detector.clone()),
            tracker: build_tracker(&params.detector, &params.tracker),
        })
    }

    pub fn detector(&self) -> &BallDetector {
        &self.detector
    }

    pub fn tracking_method(&self) -> TrackingMethod {
        self.tracker.method()
    }

    pub fn track_state(&self) -> Option<&TrackState> {
        self.tracker.state()
    }

    pub fn is_tracking(&self) -> bool {
        self.tracker.is_active()
    }

    /// Localize the ball in the next frame of the stream.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(tracking = self.tracker.is_active()))
    )]
    pub fn process(&mut self, frame: &RgbImage) -> LocalizeOutcome {
        if !self.tracker.is_active() {
            return match self.detect_and_seed(frame) {
                Some(r) => LocalizeOutcome::new(LocalizeStatus::Detected, Some(r)),
                None => LocalizeOutcome::new(LocalizeStatus::NotFound, None),
            };
        }

        match self.tracker.update(frame) {
            TrackUpdate::Found(r) => LocalizeOutcome::new(LocalizeStatus::Tracked, Some(r)),
            TrackUpdate::Coasting(r) => LocalizeOutcome::new(LocalizeStatus::Coasting, Some(r)),
            TrackUpdate::Lost => {
                info!("ball track lost, falling back to full-frame detection");
                self.tracker.reset();
                match self.detect_and_seed(frame) {
                    Some(r) => LocalizeOutcome::new(LocalizeStatus::Reacquired, Some(r)),
                    None => LocalizeOutcome::new(LocalizeStatus::Lost, None),
                }
            }
        }
    }

    /// Seed the track from an externally chosen point. Leaves the current
    /// track untouched when nothing plausible is under the point.
    pub fn detect_manual(
        &mut self,
        frame: &RgbImage,
        point: Point2<f64>,
    ) -> Option<LocalizationResult> {
        let r = self.detector.detect_at_point(frame, point)?;
        info!(
            "manual ball pick at ({:.1}, {:.1}), r={:.1}",
            r.center.x, r.center.y, r.radius
        );
        self.tracker.init(frame, &r);
        Some(r)
    }

    /// Drop the current track; the next frame starts with detection.
    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    fn detect_and_seed(&mut self, frame: &RgbImage) -> Option<LocalizationResult> {
        let r = self.detector.detect(frame)?;
        debug!(
            "ball detected at ({:.1}, {:.1}), r={:.1}",
            r.center.x, r.center.y, r.radius
        );
        self.tracker.init(frame, &r);
        Some(r)
    }
}
