//! Game state machine driven by per-frame plane positions.

use crate::motion::MotionDetector;
use crate::params::{GameParams, GameParamsError, Obstacle, PlayArea};
use crate::state::{GamePhase, GameState};
use log::info;
use nalgebra::Point2;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Mini-golf rules over a stream of ball positions.
///
/// Time is supplied by the caller as a monotonic offset, so replays and
/// tests run without a wall clock.
#[derive(Clone, Debug)]
pub struct GameEngine {
    params: GameParams,
    area: PlayArea,
    ball_radius: f64,
    motion: MotionDetector,
    state: GameState,
    holed_at: Option<Duration>,
}

impl GameEngine {
    pub fn new(
        params: GameParams,
        area: PlayArea,
        ball_radius: f64,
    ) -> Result<Self, GameParamsError> {
        params.validate()?;
        if !(ball_radius >= 0.0 && ball_radius.is_finite()) {
            return Err(GameParamsError::NotPositive {
                name: "ball_radius",
                value: ball_radius,
            });
        }
        let motion = MotionDetector::new(params.stopped_frames, params.stopped_threshold);
        let state = GameState::new(params.targets.first().copied(), params.obstacles.clone());
        let mut engine = Self {
            params,
            area,
            ball_radius,
            motion,
            state,
            holed_at: None,
        };
        engine.start();
        Ok(engine)
    }

    pub fn params(&self) -> &GameParams {
        &self.params
    }

    pub fn play_area(&self) -> PlayArea {
        self.area
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Start a fresh game at level 1.
    pub fn start(&mut self) {
        self.state = GameState::new(self.target_for(1), self.params.obstacles.clone());
        self.motion.clear();
        self.holed_at = None;
        info!("game started, level 1 target {:?}", self.state.target);
    }

    pub fn restart_game(&mut self) {
        self.start();
    }

    /// Replay the current level. Total score is kept.
    pub fn restart_level(&mut self) {
        if self.state.game_over {
            return;
        }
        self.reset_level();
        self.holed_at = None;
        self.state.status = format!("Level {} restarted", self.state.level);
        info!("level {} restarted", self.state.level);
    }

    /// Move to the next level, or finish the game after the last target.
    pub fn advance_level(&mut self) {
        if self.state.game_over {
            return;
        }
        self.state.level += 1;
        self.reset_level();
        self.holed_at = None;

        if self.state.level as usize > self.params.targets.len() {
            self.state.game_over = true;
            self.state.phase = GamePhase::Completed;
            self.state.status = format!("Game complete! Total score: {}", self.state.total_score);
            info!("game complete, total score {}", self.state.total_score);
        } else {
            self.state.target = self.target_for(self.state.level);
            self.state.status = format!("Level {} - play!", self.state.level);
            info!(
                "advanced to level {}, target {:?}",
                self.state.level, self.state.target
            );
        }
    }

    /// Feed one frame. `None` means the ball was not seen.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn update(&mut self, position: Option<Point2<f64>>, now: Duration) -> &GameState {
        match self.state.phase {
            GamePhase::Completed => return &self.state,
            GamePhase::CelebratingHoleIn => {
                let since = self.holed_at.unwrap_or(now);
                let elapsed = now.saturating_sub(since).as_secs_f64();
                if elapsed > self.params.celebration_secs {
                    self.advance_level();
                } else {
                    let remaining = self.params.celebration_secs - elapsed;
                    self.state.status = format!("HOLE IN! Next level in {remaining:.0}s");
                }
                return &self.state;
            }
            GamePhase::AwaitingFirstContact | GamePhase::InPlay => {}
        }

        let Some(p) = position else {
            self.state.status = "Ball not detected".to_string();
            return &self.state;
        };

        self.state.phase = GamePhase::InPlay;
        self.state.ball_position = Some(p);

        let dist = self
            .state
            .target
            .map(|t| (p - t).norm())
            .unwrap_or(f64::INFINITY);
        if dist.is_finite() {
            self.state.distance_to_target = Some(dist);
        }

        let moving = self.motion.push(p);
        let was_moving = self.state.moving;
        self.state.moving = moving;
        self.state.still_frames = self.motion.still_frames();

        if was_moving && !moving {
            self.state.strokes += 1;
            info!(
                "stroke {} ended at ({:.1}, {:.1}), {:.1} from target",
                self.state.strokes, p.x, p.y, dist
            );
        }

        if dist < self.params.hole_in_tolerance && (!moving || dist < self.params.hole_radius) {
            self.hole_in(now);
            return &self.state;
        }

        if moving {
            self.state.status = format!("Ball moving... distance {dist:.1}");
        } else if self.state.strokes == 0 {
            self.state.status = format!("Level {} - hit the ball!", self.state.level);
        } else if self.state.strokes >= self.params.max_strokes {
            self.state.strokes = self.params.max_strokes;
            info!("stroke limit reached on level {}", self.state.level);
            self.advance_level();
        } else {
            self.state.status = format!("Strokes: {} | distance {dist:.1}", self.state.strokes);
        }

        &self.state
    }

    /// First obstacle overlapping a ball centred at `p`.
    pub fn check_obstacle_collision(&self, p: Point2<f64>) -> Option<Obstacle> {
        self.state
            .obstacles
            .iter()
            .find(|o| (p - o.center).norm() < o.radius + self.ball_radius)
            .copied()
    }

    pub fn is_in_bounds(&self, p: Point2<f64>) -> bool {
        self.area.contains_inset(p, self.ball_radius)
    }

    fn hole_in(&mut self, now: Duration) {
        let state = &mut self.state;
        state.holed = true;
        state.strokes = state.strokes.max(1);
        state.last_score = Some(state.strokes);
        state.total_score += state.strokes;
        state.phase = GamePhase::CelebratingHoleIn;
        state.status = format!(
            "HOLE IN {} stroke{}!",
            state.strokes,
            if state.strokes == 1 { "" } else { "s" }
        );
        self.holed_at = Some(now);
        info!(
            "level {} holed in {} stroke(s), total {}",
            state.level, state.strokes, state.total_score
        );
    }

    fn reset_level(&mut self) {
        self.motion.clear();
        let state = &mut self.state;
        state.strokes = 0;
        state.holed = false;
        state.moving = false;
        state.still_frames = 0;
        state.distance_to_target = None;
        state.phase = GamePhase::AwaitingFirstContact;
    }

    fn target_for(&self, level: u32) -> Option<Point2<f64>> {
        let n = self.params.targets.len();
        if n == 0 || level == 0 {
            return None;
        }
        self.params.targets.get((level as usize - 1) % n).copied()
    }
}
