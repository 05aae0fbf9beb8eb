//! Frame pipeline: localize, position, play.

use crate::calibration::{Calibrator, PlanarMapping};
use crate::config::PuttrackConfig;
use crate::error::{CalibrationError, ConfigError, PuttrackError};
use crate::positioning::{PlanarPositioner, PlanePosition};
use image::RgbImage;
use log::debug;
use nalgebra::Point2;
use puttrack_aruco::MarkerDetector;
use puttrack_ball::{LocalizationResult, LocalizeOutcome, Localizer};
use puttrack_core::Homography;
use puttrack_game::{GameEngine, GameState};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Everything learned from one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame_index: u64,
    pub localization: LocalizeOutcome,
    /// `None` while uncalibrated or when the ball was not found.
    pub plane_position: Option<PlanePosition>,
    pub game: GameState,
}

/// Owns every stage of the pipeline and runs them once per frame.
#[derive(Debug)]
pub struct Session {
    config: PuttrackConfig,
    calibrator: Calibrator,
    positioner: PlanarPositioner,
    localizer: Localizer,
    game: GameEngine,
    frames: u64,
}

impl Session {
    pub fn new(config: PuttrackConfig) -> Result<Self, PuttrackError> {
        config.validate()?;
        let mut calibrator =
            Calibrator::new(config.calibration.clone(), config.play_area.corners());
        if let Some(dict) = &config.markers.dictionary {
            let detector = MarkerDetector::new(dict.clone(), config.markers.params.clone())
                .map_err(ConfigError::from)?;
            calibrator = calibrator.with_markers(detector, config.markers.required_ids);
        }
        let localizer = Localizer::new(&config.localizer).map_err(ConfigError::from)?;
        let game = GameEngine::new(config.game.clone(), config.play_area, config.ball.radius)
            .map_err(ConfigError::from)?;
        Ok(Self {
            positioner: PlanarPositioner::new(config.pose.clone()),
            config,
            calibrator,
            localizer,
            game,
            frames: 0,
        })
    }

    pub fn config(&self) -> &PuttrackConfig {
        &self.config
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn positioner(&self) -> &PlanarPositioner {
        &self.positioner
    }

    pub fn positioner_mut(&mut self) -> &mut PlanarPositioner {
        &mut self.positioner
    }

    pub fn localizer(&self) -> &Localizer {
        &self.localizer
    }

    pub fn game(&self) -> &GameEngine {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut GameEngine {
        &mut self.game
    }

    /// Calibrate from the image positions of the play-area corners.
    pub fn calibrate_points(&mut self, image: [Point2<f64>; 4]) -> Result<(), CalibrationError> {
        let mapping = *self.calibrator.calibrate_points(image)?;
        self.install(mapping);
        Ok(())
    }

    /// Calibrate from the corner markers visible in `frame`.
    pub fn calibrate_from_frame(&mut self, frame: &RgbImage) -> Result<(), CalibrationError> {
        let mapping = *self.calibrator.calibrate_markers(frame)?;
        self.install(mapping);
        Ok(())
    }

    pub fn set_homography_direct(&mut self, image_to_plane: Homography) -> Result<(), CalibrationError> {
        let mapping = *self.calibrator.set_homography_direct(image_to_plane)?;
        self.install(mapping);
        Ok(())
    }

    /// Seed tracking from a picked image point.
    pub fn detect_manual(
        &mut self,
        frame: &RgbImage,
        point: Point2<f64>,
    ) -> Option<LocalizationResult> {
        self.localizer.detect_manual(frame, point)
    }

    pub fn restart_game(&mut self) {
        self.game.restart_game();
        self.localizer.reset();
    }

    /// Run one frame through localization, positioning and the game.
    /// `now` is a monotonic timestamp used for game timers.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(frame = self.frames))
    )]
    pub fn process_frame(&mut self, frame: &RgbImage, now: Duration) -> FrameReport {
        let frame_index = self.frames;
        self.frames += 1;

        let localization = self.localizer.process(frame);
        let plane_position = localization.position().and_then(|p| {
            self.positioner
                .locate(p, self.config.ball.known_height())
                .inspect_err(|e| debug!("frame {frame_index}: ball not positioned ({e})"))
                .ok()
        });
        let game = self
            .game
            .update(plane_position.map(|p| p.position), now)
            .clone();

        FrameReport {
            frame_index,
            localization,
            plane_position,
            game,
        }
    }

    fn install(&mut self, mapping: PlanarMapping) {
        self.positioner.set_mapping(mapping);
    }
}
