//! Per-frame pose estimation from a detected homography.
//!
//! Object coordinates are model-image pixels on the `z = 0` plane, so a
//! projection produced here maps ROI corners straight into the camera frame.

use anyhow::Result;
use nalgebra::{Matrix3, Vector3};

use crate::calib::CameraCalibration;
use crate::detect::MarkerDetection;
use crate::geometry::{Homography, Intrinsics, Mat3x4};

/// Default bound on the mean inlier reprojection error, in pixels.
pub const DEFAULT_MAX_REPROJECTION_ERROR: f64 = 4.0;

/// Recover the rigid transform `[R | t]` of the marker plane from a
/// model-to-frame homography and the camera intrinsics.
///
/// Returns `None` for degenerate homographies. The rotation is projected back
/// onto SO(3) and the sign is chosen so the marker lies in front of the camera.
pub fn planar_pose(intrinsics: &Intrinsics, homography: &Homography) -> Option<Mat3x4> {
    let k_inv = intrinsics.inverse()?;
    let b = k_inv * homography.matrix();
    let b1: Vector3<f64> = b.column(0).into_owned();
    let b2: Vector3<f64> = b.column(1).into_owned();
    let b3: Vector3<f64> = b.column(2).into_owned();

    let norm = (b1.norm() + b2.norm()) / 2.0;
    if norm < f64::EPSILON {
        return None;
    }
    let mut lambda = 1.0 / norm;
    if (b3 * lambda).z < 0.0 {
        lambda = -lambda;
    }

    let r1 = b1 * lambda;
    let r2 = b2 * lambda;
    let r3 = r1.cross(&r2);
    let t = b3 * lambda;

    let approx = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = approx.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut rotation = u * v_t;
    if rotation.determinant() < 0.0 {
        let mut u = u;
        u.column_mut(2).neg_mut();
        rotation = u * v_t;
    }
    Some(Mat3x4::from_parts(&rotation, &t))
}

/// Produces the raw (unstabilised) projection matrix for one frame.
pub trait PoseEstimator {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the marker was not detected or the fit is rejected.
    fn estimate(
        &mut self,
        calibration: &CameraCalibration,
        detection: &MarkerDetection,
    ) -> Result<Option<Mat3x4>>;
}

/// Homography decomposition with a reprojection check on inlier matches.
#[derive(Clone, Debug)]
pub struct PlanarPoseEstimator {
    max_reprojection_error: f64,
}

impl Default for PlanarPoseEstimator {
    fn default() -> Self {
        Self {
            max_reprojection_error: DEFAULT_MAX_REPROJECTION_ERROR,
        }
    }
}

impl PlanarPoseEstimator {
    pub fn new(max_reprojection_error: f64) -> Self {
        Self {
            max_reprojection_error,
        }
    }
}

impl PoseEstimator for PlanarPoseEstimator {
    fn name(&self) -> &'static str {
        "planar"
    }

    fn estimate(
        &mut self,
        calibration: &CameraCalibration,
        detection: &MarkerDetection,
    ) -> Result<Option<Mat3x4>> {
        let Some(homography) = detection.homography.filter(|_| detection.detected) else {
            return Ok(None);
        };
        let Some(pose) = planar_pose(&calibration.intrinsics, &homography) else {
            return Ok(None);
        };
        let projection = Mat3x4::from_matrix(calibration.intrinsics.matrix() * pose.matrix());

        let mut total = 0.0;
        let mut count = 0usize;
        for m in detection.matches.iter().filter(|m| m.inlier) {
            let Some(p) = projection.project(Vector3::new(m.model.x, m.model.y, 0.0)) else {
                return Ok(None);
            };
            total += ((p.x - m.image.x).powi(2) + (p.y - m.image.y).powi(2)).sqrt();
            count += 1;
        }
        if count > 0 && total / count as f64 > self.max_reprojection_error {
            log::debug!(
                "pose rejected: mean reprojection error {:.2}px over {} inliers",
                total / count as f64,
                count
            );
            return Ok(None);
        }
        Ok(Some(projection))
    }
}

/// Projection state for one camera.
///
/// `current` is what the compositor draws this frame; `last_good` is the most
/// recently accepted estimate and survives frames without a raw pose.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    pub current: Option<Mat3x4>,
    pub valid: bool,
    pub last_good: Option<Mat3x4>,
}

impl Pose {
    /// Valid projection for this frame, if any.
    pub fn projection(&self) -> Option<&Mat3x4> {
        self.current.as_ref().filter(|_| self.valid)
    }
}
