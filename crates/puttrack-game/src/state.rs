use crate::params::Obstacle;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Where the current level stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Level started, ball not observed yet.
    AwaitingFirstContact,
    InPlay,
    /// Ball holed; the next level starts once the celebration elapses.
    CelebratingHoleIn,
    /// All levels played. Further updates are ignored.
    Completed,
}

/// Snapshot of the game after an update. Plane units throughout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub phase: GamePhase,
    /// 1-based level index.
    pub level: u32,
    pub strokes: u32,
    /// Score of the last holed level.
    pub last_score: Option<u32>,
    pub total_score: u32,
    pub status: String,
    pub ball_position: Option<Point2<f64>>,
    pub target: Option<Point2<f64>>,
    /// `None` until the ball has been seen on this level.
    pub distance_to_target: Option<f64>,
    pub obstacles: Vec<Obstacle>,
    pub moving: bool,
    pub still_frames: usize,
    pub holed: bool,
    pub game_over: bool,
}

impl GameState {
    pub(crate) fn new(target: Option<Point2<f64>>, obstacles: Vec<Obstacle>) -> Self {
        Self {
            phase: GamePhase::AwaitingFirstContact,
            level: 1,
            strokes: 0,
            last_score: None,
            total_score: 0,
            status: "Level 1 - play!".to_string(),
            ball_position: None,
            target,
            distance_to_target: None,
            obstacles,
            moving: false,
            still_frames: 0,
            holed: false,
            game_over: false,
        }
    }
}
