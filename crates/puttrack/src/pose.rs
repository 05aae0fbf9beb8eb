//! Camera centre from the plane homography.
//!
//! The plane → image homography of a pinhole camera factors as
//! `G ~ K [r1 r2 t]`. With an approximate `K` (square pixels, known or
//! assumed principal point) the rotation columns and translation follow
//! up to scale, and the camera centre is `C = -Rᵀ t`.

use crate::calibration::PlanarMapping;
use log::{debug, warn};
use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Intrinsics assumed for the decomposition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseParams {
    /// Focal length in pixels. Estimated from the homography when unset.
    pub focal_length_px: Option<f64>,
    pub principal_point: Option<Point2<f64>>,
    /// Frame size; its centre is the principal point when none is given.
    pub image_size: Option<[u32; 2]>,
}

impl Default for PoseParams {
    fn default() -> Self {
        Self {
            focal_length_px: None,
            principal_point: None,
            image_size: Some([640, 480]),
        }
    }
}

impl PoseParams {
    pub fn resolved_principal_point(&self) -> Option<Point2<f64>> {
        self.principal_point.or_else(|| {
            self.image_size
                .map(|[w, h]| Point2::new(w as f64 / 2.0, h as f64 / 2.0))
        })
    }
}

/// Camera placement relative to the plane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    /// Camera centre in plane coordinates; `z` is the height above the plane.
    pub center: Vector3<f64>,
    /// Plane → camera rotation.
    pub rotation: Matrix3<f64>,
    pub focal_length_px: f64,
    pub principal_point: Point2<f64>,
}

impl CameraPose {
    /// Decompose the mapping's plane → image homography.
    ///
    /// Returns `None` for uncalibrated mappings and homographies whose
    /// rotation columns vanish.
    pub fn estimate(mapping: &PlanarMapping, params: &PoseParams) -> Option<Self> {
        if !mapping.calibrated {
            return None;
        }
        let g = mapping.plane_to_image.h;
        let pp = params.resolved_principal_point();
        let c = pp.unwrap_or(Point2::origin());
        let shift = Matrix3::new(1.0, 0.0, -c.x, 0.0, 1.0, -c.y, 0.0, 0.0, 1.0);
        let g = shift * g;

        let f = match (params.focal_length_px, pp) {
            (Some(f), _) => f,
            (None, Some(_)) => estimate_focal(&g).unwrap_or_else(|| {
                warn!("focal length not observable from the homography, using 1");
                1.0
            }),
            (None, None) => 1.0,
        };
        let m = Matrix3::from_diagonal(&Vector3::new(1.0 / f, 1.0 / f, 1.0)) * g;

        let h1 = m.column(0).into_owned();
        let h2 = m.column(1).into_owned();
        let h3 = m.column(2).into_owned();
        let lambda = (h1.norm() + h2.norm()) / 2.0;
        if lambda.is_nan() || lambda < 1e-10 {
            return None;
        }
        // The plane lies in front of the camera.
        let sign = if h3.z < 0.0 { -1.0 } else { 1.0 };
        let r1 = h1 * (sign / lambda);
        let r2 = h2 * (sign / lambda);
        let t = h3 * (sign / lambda);
        let r = Matrix3::from_columns(&[r1, r2, r1.cross(&r2)]);

        let svd = r.svd(true, true);
        let (mut u, v_t) = (svd.u?, svd.v_t?);
        if (u * v_t).determinant() < 0.0 {
            for x in u.column_mut(2).iter_mut() {
                *x = -*x;
            }
        }
        let rotation = u * v_t;

        let mut center = -(rotation.transpose() * t);
        center.z = center.z.abs();
        if !center.iter().all(|v| v.is_finite()) {
            return None;
        }
        debug!(
            "camera centre ({:.2}, {:.2}, {:.2}), f={:.1}px",
            center.x, center.y, center.z, f
        );
        Some(Self {
            center,
            rotation,
            focal_length_px: f,
            principal_point: c,
        })
    }

    pub fn height(&self) -> f64 {
        self.center.z
    }
}

/// Focal length from the orthonormality of `K⁻¹ G` columns, with `G`
/// already shifted to a zero principal point.
fn estimate_focal(g: &Matrix3<f64>) -> Option<f64> {
    let (a1, b1, c1) = (g[(0, 0)], g[(1, 0)], g[(2, 0)]);
    let (a2, b2, c2) = (g[(0, 1)], g[(1, 1)], g[(2, 1)]);

    // r1·r2 = 0 and |r1| = |r2|, each linear in 1/f².
    let candidates = [
        (-(a1 * a2 + b1 * b2), c1 * c2),
        (a2 * a2 + b2 * b2 - a1 * a1 - b1 * b1, c1 * c1 - c2 * c2),
    ];
    let scale = g.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(1e-300);
    candidates
        .iter()
        .filter(|(_, den)| den.abs() > 1e-12 * scale * scale)
        .max_by(|x, y| x.1.abs().total_cmp(&y.1.abs()))
        .map(|(num, den)| num / den)
        .filter(|f2| *f2 > 0.0 && f2.is_finite())
        .map(f64::sqrt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationParams, CorrespondenceSet};
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    fn project(k: &Matrix3<f64>, r: &Matrix3<f64>, c: &Vector3<f64>, p: Vector3<f64>) -> Point2<f64> {
        let x = k * (r * (p - c));
        Point2::new(x.x / x.z, x.y / x.z)
    }

    fn synthetic_mapping(f: f64, r: &Matrix3<f64>, c: &Vector3<f64>) -> PlanarMapping {
        let k = Matrix3::new(f, 0.0, 320.0, 0.0, f, 240.0, 0.0, 0.0, 1.0);
        let plane = [
            Point2::new(0.0, 0.0),
            Point2::new(60.0, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(0.0, 40.0),
        ];
        let image = plane.map(|p| project(&k, r, c, Vector3::new(p.x, p.y, 0.0)));
        PlanarMapping::compute(
            &CorrespondenceSet::new(image, plane),
            &CalibrationParams::default(),
        )
        .expect("mapping")
    }

    fn tilted() -> Matrix3<f64> {
        *Rotation3::from_euler_angles(0.3, 0.2, 0.1).matrix()
            * Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, -1.0))
    }

    #[test]
    fn recovers_camera_centre_with_known_focal() {
        let c = Vector3::new(30.0, 20.0, 100.0);
        let mapping = synthetic_mapping(800.0, &tilted(), &c);
        let params = PoseParams {
            focal_length_px: Some(800.0),
            ..PoseParams::default()
        };
        let pose = CameraPose::estimate(&mapping, &params).expect("pose");
        assert_relative_eq!(pose.center, c, epsilon = 1e-5);
        assert_relative_eq!(pose.rotation, tilted(), epsilon = 1e-7);
    }

    #[test]
    fn estimates_focal_from_a_tilted_view() {
        let c = Vector3::new(30.0, 20.0, 100.0);
        let mapping = synthetic_mapping(800.0, &tilted(), &c);
        let pose = CameraPose::estimate(&mapping, &PoseParams::default()).expect("pose");
        assert_relative_eq!(pose.focal_length_px, 800.0, max_relative = 1e-6);
        assert_relative_eq!(pose.center, c, epsilon = 1e-4);
        assert_relative_eq!(pose.height(), 100.0, epsilon = 1e-4);
    }

    #[test]
    fn uncalibrated_or_vanishing_mapping_has_no_pose() {
        let c = Vector3::new(30.0, 20.0, 100.0);
        let mut mapping = synthetic_mapping(800.0, &tilted(), &c);
        mapping.calibrated = false;
        assert!(CameraPose::estimate(&mapping, &PoseParams::default()).is_none());

        mapping.calibrated = true;
        mapping.plane_to_image.h = Matrix3::new(0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0);
        assert!(CameraPose::estimate(&mapping, &PoseParams::default()).is_none());
    }

    #[test]
    fn principal_point_defaults_to_image_centre() {
        assert_eq!(
            PoseParams::default().resolved_principal_point(),
            Some(Point2::new(320.0, 240.0))
        );
        let raw = PoseParams {
            image_size: None,
            ..PoseParams::default()
        };
        assert_eq!(raw.resolved_principal_point(), None);
    }
}
