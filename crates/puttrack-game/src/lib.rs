//! Mini-golf game logic over planar ball positions.
//!
//! [`GameEngine`] consumes one optional plane position per frame and keeps
//! track of strokes, holes and level progression. Motion is classified by
//! [`MotionDetector`] with a frame-count hysteresis so jitter does not
//! register as strokes.
//!
//! ```
//! use nalgebra::Point2;
//! use puttrack_game::{GameEngine, GameParams, PlayArea};
//! use std::time::Duration;
//!
//! let mut game = GameEngine::new(GameParams::default(), PlayArea::default(), 2.0).unwrap();
//! let state = game.update(Some(Point2::new(10.0, 10.0)), Duration::ZERO);
//! assert_eq!(state.level, 1);
//! ```

mod engine;
mod motion;
mod params;
mod state;

pub use engine::GameEngine;
pub use motion::MotionDetector;
pub use params::{GameParams, GameParamsError, Obstacle, PlayArea};
pub use state::{GamePhase, GameState};
