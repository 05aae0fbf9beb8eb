//! Plays one putt on a rendered table: a perspective camera looks at the
//! 60×40 play area, the ball rolls towards the first hole and stops.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use nalgebra::{Matrix3, Point2, Rotation3, Vector3};
use puttrack::{PuttrackConfig, Session};
use std::time::Duration;

#[cfg(not(feature = "tracing"))]
use log::LevelFilter;
#[cfg(feature = "tracing")]
use puttrack::core::init_tracing;

struct Camera {
    k: Matrix3<f64>,
    r: Matrix3<f64>,
    c: Vector3<f64>,
}

impl Camera {
    fn project(&self, x: f64, y: f64, z: f64) -> Point2<f64> {
        let p = self.k * (self.r * (Vector3::new(x, y, z) - self.c));
        Point2::new(p.x / p.z, p.y / p.z)
    }
}

fn render(cam: &Camera, ball: Point2<f64>, radius: f64) -> RgbImage {
    let mut img = RgbImage::from_pixel(640, 480, Rgb([40, 120, 40]));
    let px = cam.project(ball.x, ball.y, radius);
    let r_px = (cam.k[(0, 0)] * radius / (cam.c.z - radius)).round() as i32;
    draw_filled_circle_mut(
        &mut img,
        (px.x.round() as i32, px.y.round() as i32),
        r_px,
        Rgb([190, 170, 70]),
    );
    img
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing")]
    init_tracing(false);
    #[cfg(not(feature = "tracing"))]
    puttrack::core::init_from_env(LevelFilter::Info)?;

    let cam = Camera {
        k: Matrix3::new(800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0),
        r: *Rotation3::from_euler_angles(0.1, 0.05, 0.02).matrix()
            * Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, -1.0)),
        c: Vector3::new(30.0, 20.0, 100.0),
    };

    let cfg = PuttrackConfig::default();
    let radius = cfg.ball.radius;
    let mut session = Session::new(cfg)?;
    let corners = session
        .calibrator()
        .plane_corners()
        .map(|p| cam.project(p.x, p.y, 0.0));
    session.calibrate_points(corners)?;

    let start = Point2::new(15.0, 26.0);
    let rest = Point2::new(45.6, 20.4);
    for i in 0..60u64 {
        // Ease-out roll over 30 frames, then rest.
        let t = (i as f64 / 30.0).min(1.0);
        let s = 1.0 - (1.0 - t).powi(3);
        let ball = start + (rest - start) * s;
        let frame = render(&cam, ball, radius);
        let report = session.process_frame(&frame, Duration::from_millis(33 * i));

        if let Some(p) = report.plane_position {
            println!(
                "frame {:2}: ball ({:5.2}, {:5.2}) truth ({:5.2}, {:5.2}) | {}",
                report.frame_index, p.position.x, p.position.y, ball.x, ball.y, report.game.status
            );
        }
        if report.game.holed {
            println!(
                "holed on level {} with {} stroke(s)",
                report.game.level, report.game.strokes
            );
            break;
        }
    }
    Ok(())
}
