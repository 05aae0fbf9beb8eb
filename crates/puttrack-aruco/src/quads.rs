//! Candidate square finding on a binary mask.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use nalgebra::Point2;
use puttrack_core::cross2;

/// A convex four-sided outline, corners clockwise in image coordinates
/// starting from the corner closest to the image origin.
#[derive(Clone, Debug, PartialEq)]
pub struct Quad {
    pub corners: [Point2<f64>; 4],
    pub perimeter: f64,
}

/// Outer contours of the foreground (non-zero) regions that simplify to a
/// convex quadrilateral.
pub fn find_quads(mask: &GrayImage, min_perimeter_px: f64, epsilon_frac: f64) -> Vec<Quad> {
    let mut out = Vec::new();
    for contour in find_contours::<i32>(mask) {
        if contour.border_type != BorderType::Outer || contour.points.len() < 4 {
            continue;
        }
        let perimeter = arc_length(&contour.points, true);
        if perimeter < min_perimeter_px {
            continue;
        }
        let eps = epsilon_frac * perimeter;
        let poly: Vec<Point2<f64>> = approximate_polygon_dp(&contour.points, eps, true)
            .into_iter()
            .map(|p| Point2::new(p.x as f64, p.y as f64))
            .collect();
        let poly = drop_redundant_vertices(poly, eps.max(1.0));
        let Ok(corners) = <[Point2<f64>; 4]>::try_from(poly) else {
            continue;
        };
        if let Some(corners) = order_convex_quad(corners) {
            out.push(Quad {
                corners: expand_half_pixel(corners),
                perimeter,
            });
        }
    }
    out
}

/// Remove repeated vertices and vertices lying on the chord of their neighbours.
fn drop_redundant_vertices(mut poly: Vec<Point2<f64>>, tol: f64) -> Vec<Point2<f64>> {
    loop {
        let n = poly.len();
        if n <= 3 {
            return poly;
        }
        let redundant = (0..n).find(|&i| {
            let prev = poly[(i + n - 1) % n];
            let cur = poly[i];
            let next = poly[(i + 1) % n];
            let chord = (next - prev).norm();
            if (cur - prev).norm() < 1e-9 || chord < 1e-9 {
                return true;
            }
            cross2(prev, next, cur).abs() / chord < tol
        });
        match redundant {
            Some(i) => {
                poly.remove(i);
            }
            None => return poly,
        }
    }
}

fn order_convex_quad(mut c: [Point2<f64>; 4]) -> Option<[Point2<f64>; 4]> {
    let turns: Vec<f64> = (0..4)
        .map(|i| cross2(c[i], c[(i + 1) % 4], c[(i + 2) % 4]))
        .collect();
    let convex = turns.iter().all(|&t| t > 0.0) || turns.iter().all(|&t| t < 0.0);
    if !convex {
        return None;
    }
    // Positive turns are clockwise when y points down.
    if turns[0] < 0.0 {
        c.reverse();
    }
    let start = (0..4)
        .min_by(|&a, &b| (c[a].x + c[a].y).total_cmp(&(c[b].x + c[b].y)))
        .unwrap_or(0);
    c.rotate_left(start);
    Some(c)
}

/// Contour points are pixel centres; move corners out to the pixel edges.
fn expand_half_pixel(c: [Point2<f64>; 4]) -> [Point2<f64>; 4] {
    let cx = c.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = c.iter().map(|p| p.y).sum::<f64>() / 4.0;
    c.map(|p| {
        Point2::new(
            p.x + 0.5 * (p.x - cx).signum(),
            p.y + 0.5 * (p.y - cy).signum(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn finds_filled_square_with_ordered_corners() {
        let mut mask = GrayImage::new(120, 100);
        draw_filled_rect_mut(&mut mask, Rect::at(30, 20).of_size(40, 40), Luma([255u8]));

        let quads = find_quads(&mask, 40.0, 0.03);
        assert_eq!(quads.len(), 1);
        let c = quads[0].corners;
        assert_eq!(c[0], Point2::new(29.5, 19.5));
        assert_eq!(c[1], Point2::new(69.5, 19.5));
        assert_eq!(c[2], Point2::new(69.5, 59.5));
        assert_eq!(c[3], Point2::new(29.5, 59.5));
    }

    #[test]
    fn ignores_small_and_round_blobs() {
        let mut mask = GrayImage::new(120, 100);
        draw_filled_rect_mut(&mut mask, Rect::at(5, 5).of_size(4, 4), Luma([255u8]));
        imageproc::drawing::draw_filled_circle_mut(&mut mask, (70, 50), 25, Luma([255u8]));
        assert!(find_quads(&mask, 40.0, 0.03).is_empty());
    }

    #[test]
    fn collinear_vertices_are_dropped() {
        let poly = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(20.0, 0.0),
            Point2::new(20.0, 20.0),
            Point2::new(0.0, 20.0),
            Point2::new(0.0, 1.0),
        ];
        let out = drop_redundant_vertices(poly, 1.0);
        assert_eq!(out.len(), 4);
    }
}
