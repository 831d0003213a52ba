use anyhow::Result;
use nalgebra::Vector3;

use super::accumulator::{HomographyAccumulator, HomographyObservation};
use super::artifacts::{CalibrationResult, CameraCalibration, CameraExtrinsics};
use crate::frame::{CameraId, CameraInfo};
use crate::geometry::{Intrinsics, Mat3x4};
use crate::pose::planar_pose;

/// How the solver picks homographies when it has more than it can use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingMode {
    /// Spread the selection evenly over the recorded sequence.
    Padding,
    /// Draw a random subset.
    Random,
}

/// Fixed parameter set handed to the solver on every attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverParams {
    pub max_homographies: usize,
    pub sampling: SamplingMode,
    pub random_draws: u32,
    /// Padding ratio as a power of two: 1 keeps every other homography.
    pub padding_ratio: u32,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub iterations: u32,
    pub epsilon: f64,
    pub post_filter_epsilon: f64,
}

impl SolverParams {
    /// Parameters for a rig of `cameras` cameras: padded sampling for rigs,
    /// random sampling with three draws for a single camera.
    pub fn for_cameras(cameras: usize) -> Self {
        let rig = cameras > 1;
        Self {
            max_homographies: 50,
            sampling: if rig {
                SamplingMode::Padding
            } else {
                SamplingMode::Random
            },
            random_draws: if rig { 0 } else { 3 },
            padding_ratio: 1,
            alpha: 0.0078125,
            beta: 0.9,
            gamma: 0.001953125,
            iterations: 10,
            epsilon: 0.05,
            post_filter_epsilon: 3.0,
        }
    }
}

/// Camera geometry solver.
///
/// `Ok(None)` means the solve did not converge; the caller keeps accumulating
/// and tries again on a later frame. `Err` is reserved for faults.
pub trait CalibrationSolver {
    fn name(&self) -> &'static str;

    fn solve(
        &mut self,
        accumulator: &HomographyAccumulator,
        params: &SolverParams,
    ) -> Result<Option<CalibrationResult>>;
}

/// Solver that assumes nominal pinhole intrinsics instead of estimating them.
///
/// Focal length is `focal_scale * max(width, height)` with the principal point
/// at the image centre. The reference pose of each camera comes from its most
/// recent detected homography; extrinsics are expressed relative to camera 0
/// using the most recent frame in which camera 0 and the camera both saw the
/// marker. A camera without enough detections, or a rig camera that never
/// co-observed the marker with camera 0, leaves the solve unconverged.
#[derive(Clone, Debug)]
pub struct NominalSolver {
    focal_scale: f64,
    min_detections: usize,
}

impl Default for NominalSolver {
    fn default() -> Self {
        Self {
            focal_scale: 1.0,
            min_detections: 1,
        }
    }
}

impl NominalSolver {
    pub fn new(focal_scale: f64, min_detections: usize) -> Self {
        Self {
            focal_scale,
            min_detections,
        }
    }

    fn intrinsics(&self, camera: &CameraInfo) -> Intrinsics {
        let focal = self.focal_scale * camera.width.max(camera.height) as f64;
        Intrinsics {
            fx: focal,
            fy: focal,
            cx: camera.width as f64 / 2.0,
            cy: camera.height as f64 / 2.0,
        }
    }
}

impl CalibrationSolver for NominalSolver {
    fn name(&self) -> &'static str {
        "nominal"
    }

    fn solve(
        &mut self,
        accumulator: &HomographyAccumulator,
        params: &SolverParams,
    ) -> Result<Option<CalibrationResult>> {
        let cameras = accumulator.cameras();
        if cameras.is_empty() {
            return Ok(None);
        }

        let mut calibrations = Vec::with_capacity(cameras.len());
        for camera in cameras {
            if accumulator.detected_count(camera.id) < self.min_detections {
                log::debug!(
                    "nominal solver: {} has {} detections (need {})",
                    camera.id,
                    accumulator.detected_count(camera.id),
                    self.min_detections
                );
                return Ok(None);
            }
            let intrinsics = self.intrinsics(camera);
            let Some(pose) = latest_pose(accumulator, camera.id, &intrinsics, params) else {
                return Ok(None);
            };
            calibrations.push((camera, intrinsics, pose));
        }

        let mut extrinsics = Vec::with_capacity(cameras.len());
        extrinsics.push(CameraExtrinsics::reference());
        for (camera, intrinsics, _) in calibrations.iter().skip(1) {
            let Some(relative) =
                relative_extrinsics(accumulator, camera.id, intrinsics, &calibrations[0].1)
            else {
                return Ok(None);
            };
            extrinsics.push(relative);
        }

        let cameras = calibrations
            .into_iter()
            .map(|(camera, intrinsics, pose)| CameraCalibration {
                width: camera.width,
                height: camera.height,
                projection: Mat3x4::from_matrix(intrinsics.matrix() * pose.matrix()),
                intrinsics,
            })
            .collect();
        Ok(Some(CalibrationResult {
            cameras,
            extrinsics,
        }))
    }
}

/// Most recent usable pose among the last `max_homographies` detections.
fn latest_pose(
    accumulator: &HomographyAccumulator,
    camera: CameraId,
    intrinsics: &Intrinsics,
    params: &SolverParams,
) -> Option<Mat3x4> {
    accumulator
        .observations(camera)
        .iter()
        .rev()
        .filter_map(HomographyObservation::homography)
        .take(params.max_homographies.max(1))
        .find_map(|h| planar_pose(intrinsics, h))
}

fn relative_extrinsics(
    accumulator: &HomographyAccumulator,
    camera: CameraId,
    intrinsics: &Intrinsics,
    reference_intrinsics: &Intrinsics,
) -> Option<CameraExtrinsics> {
    let reference = accumulator.observations(CameraId(0));
    let own = accumulator.observations(camera);
    reference.iter().zip(own).rev().find_map(|(r, o)| {
        let reference_pose = planar_pose(reference_intrinsics, r.homography()?)?;
        let pose = planar_pose(intrinsics, o.homography()?)?;
        let r0 = reference_pose.rotation_block();
        let ri = pose.rotation_block();
        let rotation = ri * r0.transpose();
        let translation: Vector3<f64> =
            pose.translation_column() - rotation * reference_pose.translation_column();
        let mut rows = [[0.0; 3]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = rotation[(i, j)];
            }
        }
        Some(CameraExtrinsics {
            rotation: rows,
            translation: [translation.x, translation.y, translation.z],
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::MarkerDetection;
    use crate::geometry::{Homography, Point2};

    fn rig(n: usize) -> HomographyAccumulator {
        let mut acc = HomographyAccumulator::new();
        for i in 0..n {
            acc.register_camera(CameraInfo {
                id: CameraId(i),
                width: 320,
                height: 240,
            });
        }
        acc
    }

    fn hit() -> MarkerDetection {
        MarkerDetection::found(Homography::scale(0.5, 0.5), vec![])
    }

    #[test]
    fn single_camera_params_use_random_sampling() {
        let params = SolverParams::for_cameras(1);
        assert_eq!(params.sampling, SamplingMode::Random);
        assert_eq!(params.random_draws, 3);
        assert_eq!(params.iterations, 10);
        let rig = SolverParams::for_cameras(2);
        assert_eq!(rig.sampling, SamplingMode::Padding);
        assert_eq!(rig.random_draws, 0);
    }

    #[test]
    fn no_detections_does_not_converge() -> Result<()> {
        let acc = rig(1);
        let result = NominalSolver::default().solve(&acc, &SolverParams::for_cameras(1))?;
        assert!(result.is_none());
        Ok(())
    }

    #[test]
    fn single_camera_solution_reprojects_the_homography() -> Result<()> {
        let mut acc = rig(1);
        acc.add_frame(&[hit()])?;
        let result = NominalSolver::default()
            .solve(&acc, &SolverParams::for_cameras(1))?
            .expect("converged");
        let camera = result.camera(CameraId(0)).unwrap();
        assert_eq!(camera.intrinsics.cx, 160.0);
        let p = camera
            .projection
            .project(Vector3::new(200.0, 100.0, 0.0))
            .unwrap();
        let expected = Point2::new(100.0, 50.0);
        assert!((p.x - expected.x).abs() < 1e-6);
        assert!((p.y - expected.y).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn rig_camera_without_shared_view_does_not_converge() -> Result<()> {
        let mut acc = rig(2);
        acc.add_frame(&[hit(), MarkerDetection::miss()])?;
        acc.add_frame(&[MarkerDetection::miss(), hit()])?;
        let result = NominalSolver::default().solve(&acc, &SolverParams::for_cameras(2))?;
        assert!(result.is_none());

        acc.add_frame(&[hit(), hit()])?;
        let result = NominalSolver::default()
            .solve(&acc, &SolverParams::for_cameras(2))?
            .expect("converged");
        assert_eq!(result.extrinsics.len(), 2);
        // Identical views: camera 1 sits on camera 0.
        for (i, row) in result.extrinsics[1].rotation.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((value - expected).abs() < 1e-9);
            }
        }
        assert!(result.extrinsics[1].translation.iter().all(|t| t.abs() < 1e-6));
        Ok(())
    }
}
