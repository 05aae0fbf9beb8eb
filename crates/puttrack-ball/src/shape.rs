//! Shape measurements of mask blobs.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::arc_length;
use nalgebra::Point2;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use std::f64::consts::PI;

/// Measurements of one outermost blob outline, in mask pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlobShape {
    /// Centre of the minimal enclosing circle.
    pub center: Point2<f64>,
    /// Radius of the minimal enclosing circle.
    pub radius: f64,
    /// Polygon area of the outline.
    pub area: f64,
    pub perimeter: f64,
    /// `4πA / P²`, 1 for a perfect disc.
    pub circularity: f64,
    /// `A / (π r²)`.
    pub fill_ratio: f64,
}

/// Measure every outermost foreground outline of `mask`.
pub fn blob_shapes(mask: &GrayImage) -> Vec<BlobShape> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| {
            let perimeter = arc_length(&c.points, true);
            let pts: Vec<Point2<f64>> = c
                .points
                .iter()
                .map(|p| Point2::new(p.x as f64, p.y as f64))
                .collect();
            let (center, radius) = min_enclosing_circle(&pts)?;
            let area = polygon_area(&pts);
            let circularity = if perimeter > 0.0 {
                4.0 * PI * area / (perimeter * perimeter)
            } else {
                0.0
            };
            let circle_area = PI * radius * radius;
            let fill_ratio = if circle_area > 0.0 {
                area / circle_area
            } else {
                0.0
            };
            Some(BlobShape {
                center,
                radius,
                area,
                perimeter,
                circularity,
                fill_ratio,
            })
        })
        .collect()
}

/// Unsigned shoelace area of a closed polygon.
pub fn polygon_area(pts: &[Point2<f64>]) -> f64 {
    if pts.len() < 3 {
        return 0.0;
    }
    let twice: f64 = pts
        .iter()
        .zip(pts.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    0.5 * twice.abs()
}

#[derive(Clone, Copy, Debug)]
struct Circle {
    c: Point2<f64>,
    r: f64,
}

impl Circle {
    #[inline]
    fn contains(&self, p: &Point2<f64>) -> bool {
        (p - self.c).norm() <= self.r * (1.0 + 1e-12) + 1e-9
    }

    fn diameter(a: Point2<f64>, b: Point2<f64>) -> Self {
        let c = Point2::from((a.coords + b.coords) * 0.5);
        Self {
            c,
            r: (a - c).norm().max((b - c).norm()),
        }
    }

    fn circumscribed(a: Point2<f64>, b: Point2<f64>, p: Point2<f64>) -> Option<Self> {
        let (bx, by) = (b.x - a.x, b.y - a.y);
        let (cx, cy) = (p.x - a.x, p.y - a.y);
        let d = 2.0 * (bx * cy - by * cx);
        if d.abs() < 1e-12 {
            return None;
        }
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (cy * b2 - by * c2) / d;
        let uy = (bx * c2 - cx * b2) / d;
        let c = Point2::new(a.x + ux, a.y + uy);
        let r = [a, b, p].iter().map(|q| (q - c).norm()).fold(0.0, f64::max);
        Some(Self { c, r })
    }
}

#[inline]
fn cross(a: Point2<f64>, b: Point2<f64>, p: Point2<f64>) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Smallest circle containing all points (Welzl, expected linear time).
///
/// The shuffle is seeded, so results are reproducible.
pub fn min_enclosing_circle(points: &[Point2<f64>]) -> Option<(Point2<f64>, f64)> {
    let mut pts = points.to_vec();
    pts.shuffle(&mut StdRng::seed_from_u64(0x0c1c_1e5));

    let mut circle: Option<Circle> = None;
    for i in 0..pts.len() {
        if circle.is_none_or(|c| !c.contains(&pts[i])) {
            circle = Some(circle_with_one(&pts[..i], pts[i]));
        }
    }
    circle.map(|c| (c.c, c.r))
}

fn circle_with_one(pts: &[Point2<f64>], p: Point2<f64>) -> Circle {
    let mut c = Circle { c: p, r: 0.0 };
    for i in 0..pts.len() {
        let q = pts[i];
        if !c.contains(&q) {
            c = if c.r == 0.0 {
                Circle::diameter(p, q)
            } else {
                circle_with_two(&pts[..i], p, q)
            };
        }
    }
    c
}

fn circle_with_two(pts: &[Point2<f64>], p: Point2<f64>, q: Point2<f64>) -> Circle {
    let base = Circle::diameter(p, q);
    let mut left: Option<Circle> = None;
    let mut right: Option<Circle> = None;

    for &r in pts {
        if base.contains(&r) {
            continue;
        }
        let side = cross(p, q, r);
        let Some(c) = Circle::circumscribed(p, q, r) else {
            continue;
        };
        let offset = cross(p, q, c.c);
        if side > 0.0 && left.is_none_or(|l| offset > cross(p, q, l.c)) {
            left = Some(c);
        } else if side < 0.0 && right.is_none_or(|rc| offset < cross(p, q, rc.c)) {
            right = Some(c);
        }
    }

    match (left, right) {
        (None, None) => base,
        (Some(l), None) => l,
        (None, Some(r)) => r,
        (Some(l), Some(r)) => {
            if l.r <= r.r {
                l
            } else {
                r
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    #[test]
    fn enclosing_circle_of_square_corners() {
        let pts = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
            Point2::new(5.0, 5.0),
        ];
        let (c, r) = min_enclosing_circle(&pts).expect("circle");
        assert_relative_eq!(c.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(c.y, 5.0, epsilon = 1e-9);
        assert_relative_eq!(r, 50f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn enclosing_circle_of_obtuse_triangle_uses_longest_side() {
        let pts = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(5.0, 1.0),
        ];
        let (c, r) = min_enclosing_circle(&pts).expect("circle");
        assert_relative_eq!(c.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(c.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(r, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn disc_blob_is_round_and_full() {
        let mut mask = GrayImage::new(100, 100);
        draw_filled_circle_mut(&mut mask, (50, 40), 20, Luma([255u8]));
        let shapes = blob_shapes(&mask);
        assert_eq!(shapes.len(), 1);
        let s = shapes[0];
        assert!((s.center - Point2::new(50.0, 40.0)).norm() < 1.0);
        assert!((s.radius - 20.0).abs() < 1.5);
        assert!(s.circularity > 0.8, "circularity {}", s.circularity);
        assert!(s.fill_ratio > 0.85, "fill {}", s.fill_ratio);
    }

    #[test]
    fn elongated_blob_has_low_fill() {
        let mut mask = GrayImage::new(120, 60);
        draw_filled_rect_mut(&mut mask, Rect::at(10, 25).of_size(90, 8), Luma([255u8]));
        let s = blob_shapes(&mask)[0];
        assert!(s.fill_ratio < 0.3);
        assert!(s.circularity < 0.5);
    }

    #[test]
    fn shoelace_area() {
        let sq = [
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 3.0),
            Point2::new(0.0, 3.0),
        ];
        assert_relative_eq!(polygon_area(&sq), 12.0);
    }
}
