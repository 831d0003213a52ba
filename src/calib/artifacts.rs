use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::frame::CameraId;
use crate::geometry::{Intrinsics, Mat3x4};

pub const DEFAULT_INTRINSICS_PATH: &str = "camera_c.json";
pub const DEFAULT_EXTRINSICS_PATH: &str = "camera_r_t.json";

/// Per-camera intrinsic data: resolution, pinhole parameters and the
/// reference projection matrix of the calibration pose.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub width: u32,
    pub height: u32,
    pub intrinsics: Intrinsics,
    pub projection: Mat3x4,
}

/// Per-camera rotation and translation relative to the rig reference camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraExtrinsics {
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
}

impl CameraExtrinsics {
    pub fn reference() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }
}

/// Output of a successful solve; one entry per camera in both vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationResult {
    pub cameras: Vec<CameraCalibration>,
    pub extrinsics: Vec<CameraExtrinsics>,
}

impl CalibrationResult {
    pub fn camera(&self, camera: CameraId) -> Option<&CameraCalibration> {
        self.cameras.get(camera.index())
    }

    fn validate(&self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(anyhow!("calibration holds no cameras"));
        }
        if self.cameras.len() != self.extrinsics.len() {
            return Err(anyhow!(
                "calibration artifacts disagree: {} intrinsic entries, {} extrinsic entries",
                self.cameras.len(),
                self.extrinsics.len()
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct IntrinsicsFile {
    cameras: Vec<CameraCalibration>,
}

#[derive(Serialize, Deserialize)]
struct ExtrinsicsFile {
    extrinsics: Vec<CameraExtrinsics>,
}

/// The persisted calibration pair. Both files are written together on every
/// successful solve and must both load for a load to succeed.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    intrinsics_path: PathBuf,
    extrinsics_path: PathBuf,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_INTRINSICS_PATH, DEFAULT_EXTRINSICS_PATH)
    }
}

impl ArtifactStore {
    pub fn new(intrinsics_path: impl Into<PathBuf>, extrinsics_path: impl Into<PathBuf>) -> Self {
        Self {
            intrinsics_path: intrinsics_path.into(),
            extrinsics_path: extrinsics_path.into(),
        }
    }

    pub fn intrinsics_path(&self) -> &Path {
        &self.intrinsics_path
    }

    pub fn extrinsics_path(&self) -> &Path {
        &self.extrinsics_path
    }

    /// Both artifacts are present on disk.
    pub fn exists(&self) -> bool {
        self.intrinsics_path.is_file() && self.extrinsics_path.is_file()
    }

    /// Overwrite both artifacts. Each file is staged next to its target and
    /// renamed into place once both are written.
    pub fn save(&self, result: &CalibrationResult) -> Result<()> {
        result.validate()?;
        let intrinsics = serde_json::to_vec_pretty(&IntrinsicsFile {
            cameras: result.cameras.clone(),
        })?;
        let extrinsics = serde_json::to_vec_pretty(&ExtrinsicsFile {
            extrinsics: result.extrinsics.clone(),
        })?;

        let intrinsics_tmp = staging_path(&self.intrinsics_path);
        let extrinsics_tmp = staging_path(&self.extrinsics_path);
        fs::write(&intrinsics_tmp, intrinsics)
            .with_context(|| format!("failed to write {}", intrinsics_tmp.display()))?;
        fs::write(&extrinsics_tmp, extrinsics)
            .with_context(|| format!("failed to write {}", extrinsics_tmp.display()))?;
        fs::rename(&intrinsics_tmp, &self.intrinsics_path)
            .with_context(|| format!("failed to replace {}", self.intrinsics_path.display()))?;
        fs::rename(&extrinsics_tmp, &self.extrinsics_path)
            .with_context(|| format!("failed to replace {}", self.extrinsics_path.display()))?;
        Ok(())
    }

    /// Load both artifacts. Any missing, unreadable or inconsistent file fails the load.
    pub fn load(&self) -> Result<CalibrationResult> {
        let intrinsics: IntrinsicsFile = read_json(&self.intrinsics_path)?;
        let extrinsics: ExtrinsicsFile = read_json(&self.extrinsics_path)?;
        let result = CalibrationResult {
            cameras: intrinsics.cameras,
            extrinsics: extrinsics.extrinsics,
        };
        result.validate()?;
        Ok(result)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read calibration file {}: {}", path.display(), e))?;
    serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid calibration file {}: {}", path.display(), e))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
