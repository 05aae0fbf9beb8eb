//! Planar ball positioning and a mini-golf game built on it.
//!
//! The pipeline, per frame:
//! 1. [`ball::Localizer`] finds the ball in the image (detection on cold
//!    start, tracking while warm, detection again after loss).
//! 2. [`PlanarPositioner`] maps the ball centre onto the play plane through
//!    the calibrated homography and corrects for the height of the ball
//!    centre using the camera pose recovered from that homography.
//! 3. [`game::GameEngine`] turns the plane trajectory into strokes, holes
//!    and levels.
//!
//! [`Session`] wires the three together from a [`PuttrackConfig`].
//!
//! ## Quickstart
//!
//! ```no_run
//! use nalgebra::Point2;
//! use puttrack::{PuttrackConfig, Session};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = PuttrackConfig::load_json("puttrack.json")?;
//! let mut session = Session::new(cfg)?;
//! session.calibrate_points([
//!     Point2::new(102.0, 81.0),
//!     Point2::new(538.0, 95.0),
//!     Point2::new(590.0, 410.0),
//!     Point2::new(60.0, 395.0),
//! ])?;
//!
//! let frame = image::open("frame_0001.png")?.to_rgb8();
//! let report = session.process_frame(&frame, Duration::ZERO);
//! println!("{}", report.game.status);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `puttrack::core`: homographies, RANSAC, gray image views, logger.
//! - `puttrack::aruco`: runtime dictionaries and square marker detection.
//! - `puttrack::ball`: ball detection, trackers and the localizer.
//! - `puttrack::game`: motion hysteresis and the game state machine.

pub use puttrack_aruco as aruco;
pub use puttrack_ball as ball;
pub use puttrack_core as core;
pub use puttrack_game as game;

pub mod calibration;
pub mod config;
mod error;
pub mod pose;
pub mod positioning;
pub mod session;

pub use calibration::{
    correspondences_from_markers, CalibrationParams, Calibrator, CorrespondenceSet, PlanarMapping,
};
pub use config::{BallSpec, MarkerConfig, PuttrackConfig};
pub use error::{CalibrationError, ConfigError, PositioningError, PuttrackError};
pub use pose::{CameraPose, PoseParams};
pub use positioning::{HeightCorrection, PlanePosition, PlanarPositioner};
pub use session::{FrameReport, Session};

pub use puttrack_ball::{LocalizationResult, LocalizeStatus};
pub use puttrack_game::{GamePhase, GameState, PlayArea};
