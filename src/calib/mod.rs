//! Geometric calibration.
//!
//! - `HomographyAccumulator`: per-camera observation sequences and the
//!   frame counter that gates the solve.
//! - `CalibrationSolver`: turns accumulated observations into per-camera
//!   intrinsics and extrinsics.
//! - `ArtifactStore`: the persisted pair of calibration files.
//! - `CalibrationState`: counter, loaded artifacts and the ready flag.

mod accumulator;
mod artifacts;
mod solver;

pub use accumulator::{HomographyAccumulator, HomographyObservation};
pub use artifacts::{
    ArtifactStore, CalibrationResult, CameraCalibration, CameraExtrinsics, DEFAULT_EXTRINSICS_PATH,
    DEFAULT_INTRINSICS_PATH,
};
pub use solver::{CalibrationSolver, NominalSolver, SamplingMode, SolverParams};

/// Observation count that triggers a solve attempt.
pub const DEFAULT_OBSERVATION_THRESHOLD: u32 = 150;

/// Calibration progress owned by the session.
#[derive(Clone, Debug, Default)]
pub struct CalibrationState {
    /// Frames with at least one detecting camera. Never decreases.
    pub observation_count: u32,
    /// Loaded artifacts; present exactly when `ready` is set.
    pub artifacts: Option<CalibrationResult>,
    pub ready: bool,
}

impl CalibrationState {
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Already calibrated from a cached artifact pair.
    pub fn from_cache(artifacts: CalibrationResult) -> Self {
        Self {
            observation_count: 0,
            artifacts: Some(artifacts),
            ready: true,
        }
    }
}
