//! Image point → plane position, with optional height correction.

use crate::calibration::PlanarMapping;
use crate::error::PositioningError;
use crate::pose::{CameraPose, PoseParams};
use log::{info, warn};
use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Heights closer to zero than this need no correction.
const HEIGHT_EPS: f64 = 1e-6;

/// What happened to the height correction of a located point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeightCorrection {
    NotRequested,
    /// No camera centre known; the apparent position is returned.
    PoseUnavailable,
    /// Camera centre at the object's height; the apparent position is returned.
    DegenerateRay,
    Applied { factor: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanePosition {
    /// Best estimate of the object's foot point on the plane.
    pub position: Point2<f64>,
    /// Where the viewing ray meets the plane.
    pub apparent: Point2<f64>,
    pub correction: HeightCorrection,
}

/// Owns the active mapping and the camera centre derived from it.
#[derive(Clone, Debug, Default)]
pub struct PlanarPositioner {
    mapping: Option<PlanarMapping>,
    pose: Option<CameraPose>,
    camera_center: Option<Vector3<f64>>,
    pose_params: PoseParams,
}

impl PlanarPositioner {
    pub fn new(pose_params: PoseParams) -> Self {
        Self {
            pose_params,
            ..Self::default()
        }
    }

    /// Swap in a new mapping and re-derive the camera pose from it.
    pub fn set_mapping(&mut self, mapping: PlanarMapping) {
        self.pose = CameraPose::estimate(&mapping, &self.pose_params);
        self.camera_center = self.pose.map(|p| p.center);
        match self.camera_center {
            Some(c) => info!(
                "camera centre estimated at ({:.1}, {:.1}, {:.1})",
                c.x, c.y, c.z
            ),
            None => warn!("camera pose not recoverable from the new mapping"),
        }
        self.mapping = Some(mapping);
    }

    /// Override the camera centre, e.g. from a measured installation.
    pub fn set_camera_center(&mut self, center: Vector3<f64>) {
        self.camera_center = Some(center);
    }

    pub fn mapping(&self) -> Option<&PlanarMapping> {
        self.mapping.as_ref()
    }

    pub fn pose(&self) -> Option<&CameraPose> {
        self.pose.as_ref()
    }

    pub fn camera_center(&self) -> Option<Vector3<f64>> {
        self.camera_center
    }

    pub fn is_calibrated(&self) -> bool {
        self.mapping.is_some_and(|m| m.calibrated)
    }

    pub fn image_to_plane(&self, p: Point2<f64>) -> Result<Point2<f64>, PositioningError> {
        self.calibrated()?
            .image_to_plane_point(p)
            .ok_or(PositioningError::ProjectionDegenerate)
    }

    pub fn plane_to_image(&self, p: Point2<f64>) -> Result<Point2<f64>, PositioningError> {
        self.calibrated()?
            .plane_to_image_point(p)
            .ok_or(PositioningError::ProjectionDegenerate)
    }

    /// Correct an apparent plane point for an object centre `h` above the
    /// plane: `P = C + k (P' - C)` in plane coordinates, `k = Cz / (Cz - h)`.
    ///
    /// `k` is the ratio between the ray parameters of the plane and height-`h`
    /// crossings, so for `Cz > h > 0` the point moves away from the camera
    /// foot point `(Cx, Cy)`.
    pub fn correct_height(&self, apparent: Point2<f64>, h: f64) -> (Point2<f64>, HeightCorrection) {
        if h.abs() < HEIGHT_EPS {
            return (apparent, HeightCorrection::NotRequested);
        }
        let Some(c) = self.camera_center else {
            warn!("camera centre unknown, height correction skipped");
            return (apparent, HeightCorrection::PoseUnavailable);
        };
        if (c.z - h).abs() < HEIGHT_EPS {
            warn!("camera at object height {h}, height correction skipped");
            return (apparent, HeightCorrection::DegenerateRay);
        }
        let k = c.z / (c.z - h);
        let corrected = Point2::new(c.x + k * (apparent.x - c.x), c.y + k * (apparent.y - c.y));
        (corrected, HeightCorrection::Applied { factor: k })
    }

    /// Plane position of an image point whose 3D point sits `known_height`
    /// above the plane.
    pub fn locate(
        &self,
        image_point: Point2<f64>,
        known_height: Option<f64>,
    ) -> Result<PlanePosition, PositioningError> {
        let apparent = self.image_to_plane(image_point)?;
        let (position, correction) = match known_height {
            Some(h) => self.correct_height(apparent, h),
            None => (apparent, HeightCorrection::NotRequested),
        };
        Ok(PlanePosition {
            position,
            apparent,
            correction,
        })
    }

    pub fn locate_point(&self, image_point: Point2<f64>, known_height: Option<f64>) -> Option<Point2<f64>> {
        self.locate(image_point, known_height).ok().map(|p| p.position)
    }

    fn calibrated(&self) -> Result<&PlanarMapping, PositioningError> {
        self.mapping
            .as_ref()
            .filter(|m| m.calibrated)
            .ok_or(PositioningError::NotCalibrated)
    }
}
