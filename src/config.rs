use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::calib::{
    ArtifactStore, DEFAULT_EXTRINSICS_PATH, DEFAULT_INTRINSICS_PATH, DEFAULT_OBSERVATION_THRESHOLD,
};
use crate::composite::{
    CompositorConfig, DEFAULT_FADE_STEP, DEFAULT_LABEL_LINE_SPACING, DEFAULT_LABEL_MARGIN,
};
use crate::ingest::CaptureConfig;
use crate::phase::SessionConfig;
use crate::stabilize::{StabilizerConfig, DEFAULT_INTENSITY_DELTA, DEFAULT_MOTION_THRESHOLD};

const DEFAULT_MODEL_PATH: &str = "model.bmp";
const DEFAULT_CAPTURE_URL: &str = "stub://camera";
const DEFAULT_CAMERAS: usize = 1;
const DEFAULT_CAPTURE_WIDTH: u32 = 320;
const DEFAULT_CAPTURE_HEIGHT: u32 = 240;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_OVERLAY_DIR: &str = ".";
const DEFAULT_OVERLAY_VIDEO_SCALE: f64 = 0.5;

#[derive(Debug, Deserialize, Default)]
struct ArtvertiserConfigFile {
    model: Option<PathBuf>,
    capture: Option<CaptureConfigFile>,
    calibration: Option<CalibrationConfigFile>,
    stabilizer: Option<StabilizerConfigFile>,
    compositor: Option<CompositorConfigFile>,
    overlays: Option<OverlayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    url: Option<String>,
    cameras: Option<usize>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CalibrationConfigFile {
    observation_threshold: Option<u32>,
    use_cache: Option<bool>,
    intrinsics_path: Option<PathBuf>,
    extrinsics_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct StabilizerConfigFile {
    intensity_delta: Option<u8>,
    motion_threshold: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CompositorConfigFile {
    fade_step: Option<f32>,
    label_margin: Option<f64>,
    label_line_spacing: Option<f64>,
    augment_on_start: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    manifest: Option<PathBuf>,
    dir: Option<PathBuf>,
    video: Option<String>,
    video_scale: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ArtvertiserConfig {
    pub model_path: PathBuf,
    pub capture: CaptureSettings,
    pub calibration: CalibrationSettings,
    pub stabilizer: StabilizerConfig,
    pub compositor: CompositorConfig,
    pub overlays: OverlaySettings,
    pub augment_on_start: bool,
    /// Recompute lighting instead of loading the cached map.
    pub redo_lighting: bool,
    /// Retrain the detector instead of loading its cached classifier.
    pub retrain: bool,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub url: String,
    pub cameras: usize,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct CalibrationSettings {
    pub observation_threshold: u32,
    pub use_cache: bool,
    pub intrinsics_path: PathBuf,
    pub extrinsics_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    /// JSON catalog manifest; the built-in five-asset set is used when absent.
    pub manifest: Option<PathBuf>,
    /// Directory holding the built-in `artvertN.png` files.
    pub dir: PathBuf,
    /// Image-sequence source played as the overlay when video is toggled on.
    pub video: Option<String>,
    /// Overlay video size relative to the capture size.
    pub video_scale: f64,
}

impl ArtvertiserConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ARTVERT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ArtvertiserConfigFile) -> Self {
        let capture = file.capture.unwrap_or_default();
        let calibration = file.calibration.unwrap_or_default();
        let stabilizer = file.stabilizer.unwrap_or_default();
        let compositor = file.compositor.unwrap_or_default();
        let overlays = file.overlays.unwrap_or_default();
        Self {
            model_path: file
                .model
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            capture: CaptureSettings {
                url: capture
                    .url
                    .unwrap_or_else(|| DEFAULT_CAPTURE_URL.to_string()),
                cameras: capture.cameras.unwrap_or(DEFAULT_CAMERAS),
                width: capture.width.unwrap_or(DEFAULT_CAPTURE_WIDTH),
                height: capture.height.unwrap_or(DEFAULT_CAPTURE_HEIGHT),
                target_fps: capture.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            },
            calibration: CalibrationSettings {
                observation_threshold: calibration
                    .observation_threshold
                    .unwrap_or(DEFAULT_OBSERVATION_THRESHOLD),
                use_cache: calibration.use_cache.unwrap_or(true),
                intrinsics_path: calibration
                    .intrinsics_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_INTRINSICS_PATH)),
                extrinsics_path: calibration
                    .extrinsics_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_EXTRINSICS_PATH)),
            },
            stabilizer: StabilizerConfig {
                intensity_delta: stabilizer
                    .intensity_delta
                    .unwrap_or(DEFAULT_INTENSITY_DELTA),
                motion_threshold: stabilizer
                    .motion_threshold
                    .unwrap_or(DEFAULT_MOTION_THRESHOLD),
            },
            compositor: CompositorConfig {
                fade_step: compositor.fade_step.unwrap_or(DEFAULT_FADE_STEP),
                label_margin: compositor.label_margin.unwrap_or(DEFAULT_LABEL_MARGIN),
                label_line_spacing: compositor
                    .label_line_spacing
                    .unwrap_or(DEFAULT_LABEL_LINE_SPACING),
            },
            overlays: OverlaySettings {
                manifest: overlays.manifest,
                dir: overlays
                    .dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OVERLAY_DIR)),
                video: overlays.video,
                video_scale: overlays.video_scale.unwrap_or(DEFAULT_OVERLAY_VIDEO_SCALE),
            },
            augment_on_start: compositor.augment_on_start.unwrap_or(true),
            redo_lighting: false,
            retrain: false,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(model) = std::env::var("ARTVERT_MODEL") {
            if !model.trim().is_empty() {
                self.model_path = PathBuf::from(model);
            }
        }
        if let Ok(url) = std::env::var("ARTVERT_CAPTURE_URL") {
            if !url.trim().is_empty() {
                self.capture.url = url;
            }
        }
        if let Ok(cameras) = std::env::var("ARTVERT_CAMERAS") {
            self.capture.cameras = cameras
                .trim()
                .parse()
                .map_err(|_| anyhow!("ARTVERT_CAMERAS must be a positive integer"))?;
        }
        if let Ok(threshold) = std::env::var("ARTVERT_MOTION_THRESHOLD") {
            self.stabilizer.motion_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("ARTVERT_MOTION_THRESHOLD must be an integer pixel count"))?;
        }
        if let Ok(threshold) = std::env::var("ARTVERT_OBSERVATION_THRESHOLD") {
            self.calibration.observation_threshold = threshold.trim().parse().map_err(|_| {
                anyhow!("ARTVERT_OBSERVATION_THRESHOLD must be an integer frame count")
            })?;
        }
        if let Ok(cache) = std::env::var("ARTVERT_CALIB_CACHE") {
            self.calibration.use_cache = parse_bool(&cache)
                .ok_or_else(|| anyhow!("ARTVERT_CALIB_CACHE must be true/false, 1/0 or on/off"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.capture.cameras == 0 {
            return Err(anyhow!("capture.cameras must be at least 1"));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!(
                "capture resolution must be non-zero (got {}x{})",
                self.capture.width,
                self.capture.height
            ));
        }
        if self.calibration.observation_threshold == 0 {
            return Err(anyhow!("calibration.observation_threshold must be greater than zero"));
        }
        let step = self.compositor.fade_step;
        if !(step > 0.0 && step <= 1.0) {
            return Err(anyhow!("compositor.fade_step must be in (0, 1], got {}", step));
        }
        if !(self.overlays.video_scale > 0.0 && self.overlays.video_scale <= 1.0) {
            return Err(anyhow!(
                "overlays.video_scale must be in (0, 1], got {}",
                self.overlays.video_scale
            ));
        }
        Ok(())
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            url: self.capture.url.clone(),
            cameras: self.capture.cameras,
            width: self.capture.width,
            height: self.capture.height,
        }
    }

    /// Single-camera source for the overlay video, if one is configured.
    pub fn overlay_video_config(&self) -> Option<CaptureConfig> {
        let (width, height) = self.overlay_video_size();
        self.overlays.video.as_ref().map(|url| CaptureConfig {
            url: url.clone(),
            cameras: 1,
            width,
            height,
        })
    }

    pub fn overlay_video_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f64 * self.overlays.video_scale).round() as u32).max(1);
        (scale(self.capture.width), scale(self.capture.height))
    }

    pub fn artifact_store(&self) -> ArtifactStore {
        ArtifactStore::new(
            self.calibration.intrinsics_path.clone(),
            self.calibration.extrinsics_path.clone(),
        )
    }

    pub fn session_config(&self, model_size: (u32, u32)) -> SessionConfig {
        SessionConfig {
            observation_threshold: self.calibration.observation_threshold,
            use_cache: self.calibration.use_cache,
            stabilizer: self.stabilizer,
            compositor: self.compositor,
            model_size,
            overlay_video_size: self.overlay_video_size(),
            augment: self.augment_on_start,
            redo_lighting: self.redo_lighting,
        }
    }
}

fn read_config_file(path: &Path) -> Result<ArtvertiserConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() -> Result<()> {
        let cfg = ArtvertiserConfig::from_file(ArtvertiserConfigFile::default());
        cfg.validate()?;
        assert_eq!(cfg.overlay_video_size(), (160, 120));
        assert!(cfg.overlay_video_config().is_none());
        let session = cfg.session_config((640, 480));
        assert_eq!(session.observation_threshold, 150);
        assert_eq!(session.stabilizer.motion_threshold, 10_000);
        assert!(session.use_cache);
        Ok(())
    }

    #[test]
    fn fade_step_out_of_range_is_rejected() {
        let mut cfg = ArtvertiserConfig::from_file(ArtvertiserConfigFile::default());
        cfg.compositor.fade_step = 0.0;
        assert!(cfg.validate().is_err());
        cfg.compositor.fade_step = 1.5;
        assert!(cfg.validate().is_err());
        cfg.compositor.fade_step = 1.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bool_spellings() {
        assert_eq!(parse_bool(" ON "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
