use nalgebra::Point2;

/// Relative area below which three points count as collinear.
pub const COLLINEAR_REL_EPS: f64 = 1e-9;

/// Twice the signed area of triangle `abc`.
#[inline]
pub fn cross2(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Largest axis-aligned extent of a point set, at least 1.
pub fn extent(pts: &[Point2<f64>]) -> f64 {
    let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in pts {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (max.x - min.x).max(max.y - min.y).max(1.0)
}

/// True when any three points of `pts` are (nearly) collinear.
///
/// The tolerance scales with the square of the set's extent, so the check
/// is unit independent.
pub fn has_collinear_triple(pts: &[Point2<f64>]) -> bool {
    let scale = extent(pts);
    let tol = COLLINEAR_REL_EPS * scale * scale;
    let n = pts.len();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                if cross2(pts[i], pts[j], pts[k]).abs() <= tol {
                    return true;
                }
            }
        }
    }
    false
}

/// Arithmetic mean of a non-empty point set.
pub fn centroid(pts: &[Point2<f64>]) -> Option<Point2<f64>> {
    if pts.is_empty() {
        return None;
    }
    let n = pts.len() as f64;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(ax, ay), p| (ax + p.x, ay + p.y));
    Some(Point2::new(sx / n, sy / n))
}
