use nalgebra::Point2;
use std::collections::VecDeque;

/// Moving/stopped classification with hysteresis over recent positions.
///
/// The ball counts as stopped once the last `window` samples are all
/// within `threshold` of their predecessor. With fewer samples than the
/// window it counts as moving. Windows shorter than two samples hold no
/// step and are widened to two.
#[derive(Clone, Debug)]
pub struct MotionDetector {
    window: usize,
    threshold: f64,
    history: VecDeque<Point2<f64>>,
    still_frames: usize,
}

impl MotionDetector {
    pub fn new(window: usize, threshold: f64) -> Self {
        let window = window.max(2);
        Self {
            window,
            threshold,
            history: VecDeque::with_capacity(2 * window),
            still_frames: 0,
        }
    }

    /// Record a sample and return `true` while the ball is moving.
    pub fn push(&mut self, p: Point2<f64>) -> bool {
        self.history.push_back(p);
        while self.history.len() > 2 * self.window {
            self.history.pop_front();
        }
        if self.history.len() < self.window {
            return true;
        }

        let start = self.history.len() - self.window;
        let max_step = self
            .history
            .range(start..)
            .zip(self.history.range(start + 1..))
            .map(|(a, b)| (b - a).norm())
            .fold(0.0, f64::max);

        if max_step < self.threshold {
            self.still_frames += 1;
            false
        } else {
            self.still_frames = 0;
            true
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Consecutive updates classified as still.
    pub fn still_frames(&self) -> usize {
        self.still_frames
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.still_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_windows_are_widened_to_one_step() {
        for window in [0, 1] {
            let mut m = MotionDetector::new(window, 0.8);
            assert_eq!(m.window(), 2);
            let p = Point2::new(3.0, 4.0);
            assert!(m.push(p));
            assert!(!m.push(p));
            assert!(m.push(Point2::new(9.0, 4.0)));
            assert_eq!(m.len(), 3);
        }
    }

    #[test]
    fn stationary_ball_stops_on_the_fifteenth_sample() {
        let mut m = MotionDetector::new(15, 0.8);
        let p = Point2::new(10.0, 10.0);
        for frame in 1..=20 {
            let moving = m.push(p);
            assert_eq!(moving, frame < 15, "frame {frame}");
        }
        assert_eq!(m.still_frames(), 6);
        assert_eq!(m.len(), 20);
    }

    #[test]
    fn one_large_step_restarts_the_wait() {
        let mut m = MotionDetector::new(5, 0.8);
        for _ in 0..5 {
            m.push(Point2::new(0.0, 0.0));
        }
        assert!(!m.push(Point2::new(0.1, 0.0)));
        assert!(m.push(Point2::new(3.0, 0.0)));
        assert_eq!(m.still_frames(), 0);
        for _ in 0..4 {
            assert!(m.push(Point2::new(3.0, 0.0)));
        }
        assert!(!m.push(Point2::new(3.0, 0.0)));
    }

    #[test]
    fn history_is_bounded() {
        let mut m = MotionDetector::new(3, 0.5);
        for i in 0..50 {
            m.push(Point2::new(i as f64, 0.0));
        }
        assert_eq!(m.len(), 6);
        m.clear();
        assert!(m.is_empty());
    }
}
