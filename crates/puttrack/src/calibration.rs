//! Image ↔ plane calibration from point or marker correspondences.

use crate::error::CalibrationError;
use image::RgbImage;
use log::{error, info, warn};
use nalgebra::Point2;
use puttrack_aruco::{MarkerDetection, MarkerDetector};
use puttrack_core::{
    has_collinear_triple, mean_transfer_error, ransac, Homography, HomographyEstimator, PointPair,
    RansacOptions,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Four image points and the plane points they show, in TL, TR, BR, BL order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceSet {
    pub image: [Point2<f64>; 4],
    pub plane: [Point2<f64>; 4],
}

impl CorrespondenceSet {
    pub fn new(image: [Point2<f64>; 4], plane: [Point2<f64>; 4]) -> Self {
        Self { image, plane }
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        validate_points(&self.image, &self.plane)
    }
}

fn validate_points(image: &[Point2<f64>], plane: &[Point2<f64>]) -> Result<(), CalibrationError> {
    let finite = |p: &Point2<f64>| p.x.is_finite() && p.y.is_finite();
    let got = image
        .iter()
        .zip(plane)
        .filter(|(i, p)| finite(i) && finite(p))
        .count();
    if image.len() != plane.len() || got != image.len() || got < 4 {
        return Err(CalibrationError::InsufficientCorrespondences { got });
    }
    // With more than four pairs RANSAC skips collinear samples on its own.
    if got == 4 && (has_collinear_triple(image) || has_collinear_triple(plane)) {
        return Err(CalibrationError::Degenerate("three points are collinear"));
    }
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Consensus search; `thresh` is the inlier reprojection threshold in pixels.
    pub ransac: RansacOptions,
    /// Reject calibrations whose mean reprojection error exceeds this.
    pub max_reprojection_error_px: Option<f64>,
}

/// Forward and inverse plane homographies with their fit quality.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanarMapping {
    pub image_to_plane: Homography,
    pub plane_to_image: Homography,
    pub calibrated: bool,
    /// Mean pixel distance between the calibration image points and their
    /// reprojected plane points.
    pub reprojection_error: f64,
}

impl PlanarMapping {
    pub fn compute(
        set: &CorrespondenceSet,
        params: &CalibrationParams,
    ) -> Result<Self, CalibrationError> {
        Self::compute_from_pairs(&set.image, &set.plane, params)
    }

    /// Fit from `N >= 4` pairs. Outliers beyond `params.ransac.thresh`
    /// pixels do not contribute to the final fit.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(image, plane, params), fields(n = image.len()))
    )]
    pub fn compute_from_pairs(
        image: &[Point2<f64>],
        plane: &[Point2<f64>],
        params: &CalibrationParams,
    ) -> Result<Self, CalibrationError> {
        validate_points(image, plane)?;

        let pairs: Vec<PointPair> = plane
            .iter()
            .zip(image)
            .map(|(&src, &dst)| PointPair { src, dst })
            .collect();
        let res = ransac::<HomographyEstimator>(&pairs, &params.ransac);
        let Some(h) = res.model else {
            return Err(CalibrationError::Degenerate("no consistent homography"));
        };

        let mut mapping = Self::from_plane_to_image(h)?;
        mapping.reprojection_error = mean_transfer_error(&mapping.plane_to_image, plane, image);
        info!(
            "plane calibrated from {} pairs ({} inliers), reprojection error {:.3}px",
            pairs.len(),
            res.inliers.len(),
            mapping.reprojection_error
        );
        Ok(mapping)
    }

    /// Build from a known image → plane homography.
    pub fn from_image_to_plane(h: Homography) -> Result<Self, CalibrationError> {
        let fwd = checked(h)?;
        let inv = fwd
            .inverse()
            .ok_or(CalibrationError::Degenerate("singular homography"))?;
        Ok(Self {
            image_to_plane: fwd,
            plane_to_image: checked(inv)?,
            calibrated: true,
            reprojection_error: 0.0,
        })
    }

    fn from_plane_to_image(h: Homography) -> Result<Self, CalibrationError> {
        let fwd = checked(h)?;
        let inv = fwd
            .inverse()
            .ok_or(CalibrationError::Degenerate("singular homography"))?;
        Ok(Self {
            image_to_plane: checked(inv)?,
            plane_to_image: fwd,
            calibrated: true,
            reprojection_error: 0.0,
        })
    }

    pub fn image_to_plane_point(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        self.image_to_plane.try_apply(p)
    }

    pub fn plane_to_image_point(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        self.plane_to_image.try_apply(p)
    }
}

fn checked(h: Homography) -> Result<Homography, CalibrationError> {
    if !h.is_finite() {
        error!("homography has non-finite entries: {:?}", h.to_array());
        return Err(CalibrationError::NonFinite);
    }
    let h = h
        .normalized()
        .ok_or(CalibrationError::Degenerate("h33 vanishes"))?;
    if h.h.determinant().abs() < 1e-12 {
        return Err(CalibrationError::Degenerate("singular homography"));
    }
    Ok(h)
}

/// Image points of the `required_ids` markers, paired with `plane_corners`.
pub fn correspondences_from_markers(
    detections: &[MarkerDetection],
    required_ids: &[u32; 4],
    plane_corners: &[Point2<f64>; 4],
) -> Result<CorrespondenceSet, CalibrationError> {
    let found: Vec<Point2<f64>> = required_ids
        .iter()
        .filter_map(|id| detections.iter().find(|d| d.id == *id).map(|d| d.center))
        .collect();
    let image: [Point2<f64>; 4] = found
        .as_slice()
        .try_into()
        .map_err(|_| CalibrationError::InsufficientCorrespondences { got: found.len() })?;
    Ok(CorrespondenceSet::new(image, *plane_corners))
}

/// Holds the active mapping. Failed calibrations leave it untouched.
#[derive(Clone, Debug)]
pub struct Calibrator {
    params: CalibrationParams,
    plane_corners: [Point2<f64>; 4],
    markers: Option<(MarkerDetector, [u32; 4])>,
    mapping: Option<PlanarMapping>,
}

impl Calibrator {
    pub fn new(params: CalibrationParams, plane_corners: [Point2<f64>; 4]) -> Self {
        Self {
            params,
            plane_corners,
            markers: None,
            mapping: None,
        }
    }

    /// Enable [`Calibrator::calibrate_markers`].
    pub fn with_markers(mut self, detector: MarkerDetector, required_ids: [u32; 4]) -> Self {
        self.markers = Some((detector, required_ids));
        self
    }

    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    pub fn plane_corners(&self) -> &[Point2<f64>; 4] {
        &self.plane_corners
    }

    pub fn mapping(&self) -> Option<&PlanarMapping> {
        self.mapping.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.mapping.is_some_and(|m| m.calibrated)
    }

    /// Calibrate from the image positions of the play-area corners.
    pub fn calibrate_points(
        &mut self,
        image: [Point2<f64>; 4],
    ) -> Result<&PlanarMapping, CalibrationError> {
        let set = CorrespondenceSet::new(image, self.plane_corners);
        self.calibrate_set(&set)
    }

    pub fn calibrate_set(
        &mut self,
        set: &CorrespondenceSet,
    ) -> Result<&PlanarMapping, CalibrationError> {
        let result = PlanarMapping::compute(set, &self.params).and_then(|m| self.accept(m));
        self.commit(result)
    }

    /// Calibrate from the four corner markers visible in `frame`.
    pub fn calibrate_markers(
        &mut self,
        frame: &RgbImage,
    ) -> Result<&PlanarMapping, CalibrationError> {
        let result = match &self.markers {
            None => Err(CalibrationError::MarkersUnavailable),
            Some((detector, ids)) => {
                let detections = detector.detect_rgb(frame);
                info!("{} markers detected for calibration", detections.len());
                correspondences_from_markers(&detections, ids, &self.plane_corners)
                    .and_then(|set| PlanarMapping::compute(&set, &self.params))
                    .and_then(|m| self.accept(m))
            }
        };
        self.commit(result)
    }

    /// Install a known image → plane homography.
    pub fn set_homography_direct(
        &mut self,
        image_to_plane: Homography,
    ) -> Result<&PlanarMapping, CalibrationError> {
        let result = PlanarMapping::from_image_to_plane(image_to_plane);
        self.commit(result)
    }

    fn accept(&self, m: PlanarMapping) -> Result<PlanarMapping, CalibrationError> {
        match self.params.max_reprojection_error_px {
            Some(max) if m.reprojection_error > max => {
                Err(CalibrationError::ReprojectionTooLarge {
                    error: m.reprojection_error,
                    max,
                })
            }
            _ => Ok(m),
        }
    }

    fn commit(
        &mut self,
        result: Result<PlanarMapping, CalibrationError>,
    ) -> Result<&PlanarMapping, CalibrationError> {
        match result {
            Ok(m) => Ok(self.mapping.insert(m)),
            Err(e) => {
                warn!("calibration rejected ({e}), keeping the previous mapping");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plane() -> [Point2<f64>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(60.0, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(0.0, 40.0),
        ]
    }

    fn image() -> [Point2<f64>; 4] {
        [
            Point2::new(102.0, 81.0),
            Point2::new(538.0, 95.0),
            Point2::new(590.0, 410.0),
            Point2::new(60.0, 395.0),
        ]
    }

    #[test]
    fn four_points_map_exactly_both_ways() {
        let set = CorrespondenceSet::new(image(), plane());
        let m = PlanarMapping::compute(&set, &CalibrationParams::default()).expect("mapping");
        assert!(m.calibrated);
        assert!(m.reprojection_error < 1e-6);
        for (i, p) in image().iter().zip(plane()) {
            let q = m.image_to_plane_point(*i).expect("finite");
            assert_relative_eq!(q.x, p.x, epsilon = 1e-6);
            assert_relative_eq!(q.y, p.y, epsilon = 1e-6);
            let back = m.plane_to_image_point(q).expect("finite");
            assert_relative_eq!(back.x, i.x, epsilon = 1e-6);
            assert_relative_eq!(back.y, i.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let mut img = image();
        img[1] = Point2::new(320.0, 88.0);
        img[2] = Point2::new(538.0, 95.0);
        img[0] = Point2::new(102.0, 81.0);
        let set = CorrespondenceSet::new(img, plane());
        assert!(matches!(
            PlanarMapping::compute(&set, &CalibrationParams::default()),
            Err(CalibrationError::Degenerate(_))
        ));
    }

    #[test]
    fn non_finite_points_are_rejected() {
        let mut img = image();
        img[3].x = f64::NAN;
        let set = CorrespondenceSet::new(img, plane());
        assert_eq!(
            set.validate(),
            Err(CalibrationError::InsufficientCorrespondences { got: 3 })
        );
    }

    #[test]
    fn failed_calibration_keeps_previous_mapping() {
        let mut cal = Calibrator::new(CalibrationParams::default(), plane());
        assert!(!cal.is_calibrated());
        let first = *cal.calibrate_points(image()).expect("calibrate");

        let mut bad = image();
        bad[2] = bad[0];
        assert!(cal.calibrate_points(bad).is_err());
        assert_eq!(cal.mapping(), Some(&first));

        assert_eq!(
            cal.calibrate_markers(&RgbImage::new(8, 8)).err(),
            Some(CalibrationError::MarkersUnavailable)
        );
        assert_eq!(cal.mapping(), Some(&first));
    }

    #[test]
    fn non_finite_homography_is_refused_loudly() {
        let mut cal = Calibrator::new(CalibrationParams::default(), plane());
        let first = *cal.calibrate_points(image()).expect("calibrate");

        let nan = Homography::from_array([[1.0, 0.0, 0.0], [0.0, f64::NAN, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(
            cal.set_homography_direct(nan).err(),
            Some(CalibrationError::NonFinite)
        );
        let inf = Homography::from_array([[1.0, 0.0, f64::INFINITY], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(
            PlanarMapping::from_image_to_plane(inf).err(),
            Some(CalibrationError::NonFinite)
        );
        assert_eq!(cal.mapping(), Some(&first));
    }

    #[test]
    fn reprojection_limit_applies_to_overdetermined_fits() {
        let exact = PlanarMapping::compute(
            &CorrespondenceSet::new(image(), plane()),
            &CalibrationParams::default(),
        )
        .expect("mapping");
        let plane_pts: Vec<Point2<f64>> = (0..5)
            .flat_map(|i| (0..4).map(move |j| Point2::new(i as f64 * 15.0, j as f64 * 13.0)))
            .collect();
        let image_pts: Vec<Point2<f64>> = plane_pts
            .iter()
            .enumerate()
            .map(|(k, p)| {
                let q = exact.plane_to_image_point(*p).expect("finite");
                let d = if k % 2 == 0 { 1.5 } else { -1.5 };
                Point2::new(q.x + d, q.y - d)
            })
            .collect();

        let params = CalibrationParams {
            max_reprojection_error_px: Some(0.5),
            ..CalibrationParams::default()
        };
        let m = PlanarMapping::compute_from_pairs(&image_pts, &plane_pts, &params).expect("fit");
        assert!(m.reprojection_error > 0.5 && m.reprojection_error < 5.0);

        let mut cal = Calibrator::new(params, plane());
        let corners = [0, 16, 19, 3];
        let set = CorrespondenceSet::new(
            corners.map(|k| image_pts[k]),
            corners.map(|k| plane_pts[k]),
        );
        // Four pairs are always fitted exactly, so only the overdetermined
        // fit trips the limit.
        assert!(cal.calibrate_set(&set).is_ok());
        assert!(cal.accept(m).is_err());
    }

    #[test]
    fn marker_correspondences_follow_required_order() {
        let det = |id: u32, x: f64, y: f64| MarkerDetection {
            id,
            corners: [Point2::new(x, y); 4],
            center: Point2::new(x, y),
            rotation: 0,
            hamming: 0,
            border_score: 1.0,
            score: 1.0,
        };
        let detections = vec![
            det(2, 500.0, 400.0),
            det(0, 100.0, 80.0),
            det(3, 90.0, 390.0),
            det(1, 520.0, 90.0),
            det(7, 1.0, 1.0),
        ];
        let set = correspondences_from_markers(&detections, &[0, 1, 2, 3], &plane()).expect("set");
        assert_eq!(set.image[0], Point2::new(100.0, 80.0));
        assert_eq!(set.image[2], Point2::new(500.0, 400.0));
        assert_eq!(set.plane, plane());

        let missing = correspondences_from_markers(&detections[..3], &[0, 1, 2, 3], &plane());
        assert_eq!(
            missing,
            Err(CalibrationError::InsufficientCorrespondences { got: 3 })
        );
    }
}
