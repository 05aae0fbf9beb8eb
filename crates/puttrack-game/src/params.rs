use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Rectangular play area with its origin at the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayArea {
    pub width: f64,
    pub height: f64,
}

impl Default for PlayArea {
    fn default() -> Self {
        Self {
            width: 60.0,
            height: 40.0,
        }
    }
}

impl PlayArea {
    /// Corners in TL, TR, BR, BL order.
    pub fn corners(&self) -> [Point2<f64>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(self.width, 0.0),
            Point2::new(self.width, self.height),
            Point2::new(0.0, self.height),
        ]
    }

    /// True when a ball of radius `inset` centred at `p` lies fully inside.
    pub fn contains_inset(&self, p: Point2<f64>, inset: f64) -> bool {
        (inset..=self.width - inset).contains(&p.x) && (inset..=self.height - inset).contains(&p.y)
    }
}

/// Circular obstacle on the plane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub center: Point2<f64>,
    pub radius: f64,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GameParamsError {
    #[error("at least one target position is required")]
    NoTargets,
    #[error("stopped_frames must be at least 2, got {0}")]
    StoppedFrames(usize),
    #[error("max_strokes must be at least 1")]
    MaxStrokes,
    #[error("{name} must be positive and finite, got {value}")]
    NotPositive { name: &'static str, value: f64 },
}

/// Rules of the game, in plane units (centimetres by default).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameParams {
    pub hole_radius: f64,
    /// A stopped ball closer than this to the target is holed.
    pub hole_in_tolerance: f64,
    /// Largest per-frame step that still counts as standing still.
    pub stopped_threshold: f64,
    /// Consecutive still samples needed before the ball is stopped.
    pub stopped_frames: usize,
    pub max_strokes: u32,
    pub celebration_secs: f64,
    /// Target per level; levels beyond the list end the game.
    pub targets: Vec<Point2<f64>>,
    pub obstacles: Vec<Obstacle>,
}

impl Default for GameParams {
    fn default() -> Self {
        Self {
            hole_radius: 3.5,
            hole_in_tolerance: 4.0,
            stopped_threshold: 0.8,
            stopped_frames: 15,
            max_strokes: 10,
            celebration_secs: 3.0,
            targets: vec![
                Point2::new(45.0, 20.0),
                Point2::new(15.0, 10.0),
                Point2::new(50.0, 35.0),
                Point2::new(10.0, 30.0),
                Point2::new(30.0, 5.0),
            ],
            obstacles: Vec::new(),
        }
    }
}

impl GameParams {
    pub fn validate(&self) -> Result<(), GameParamsError> {
        if self.targets.is_empty() {
            return Err(GameParamsError::NoTargets);
        }
        if self.stopped_frames < 2 {
            return Err(GameParamsError::StoppedFrames(self.stopped_frames));
        }
        if self.max_strokes == 0 {
            return Err(GameParamsError::MaxStrokes);
        }
        for (name, value) in [
            ("hole_radius", self.hole_radius),
            ("hole_in_tolerance", self.hole_in_tolerance),
            ("stopped_threshold", self.stopped_threshold),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(GameParamsError::NotPositive { name, value });
            }
        }
        if !(self.celebration_secs >= 0.0 && self.celebration_secs.is_finite()) {
            return Err(GameParamsError::NotPositive {
                name: "celebration_secs",
                value: self.celebration_secs,
            });
        }
        Ok(())
    }
}
