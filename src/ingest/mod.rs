//! Frame acquisition.
//!
//! This module provides the sources a session pulls camera frames from:
//! - Synthetic scenes (`stub://` URLs) for tests and headless runs
//! - Still-image sequences read from a local directory (one sub-directory per
//!   camera for rigs, or the directory itself for a single camera)
//!
//! All sources produce `Frame` instances. A source owns its camera set, which
//! is fixed for the life of the source. `next_frame` may block until the
//! camera has a new image; no timeout is applied.
//!
//! The same `CaptureSource` type doubles as the overlay-video handle used by
//! the compositor when video playback is toggled on.

pub mod stills;
pub mod synthetic;

use anyhow::{anyhow, Result};

use crate::frame::{CameraId, CameraInfo, Frame};

pub use stills::StillSequenceSource;
pub use synthetic::SyntheticSource;

/// A provider of camera frames.
pub trait FrameSource {
    /// Cameras served by this source, indexed by `CameraId`.
    fn cameras(&self) -> &[CameraInfo];

    /// Open the underlying device or stream. Attempted once.
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Latest image for `camera`.
    fn next_frame(&mut self, camera: CameraId) -> Result<Frame>;

    fn is_healthy(&self) -> bool {
        true
    }

    /// Capture statistics, when the source keeps any.
    fn stats(&self) -> Option<CaptureStats> {
        None
    }
}

/// Configuration for a capture source.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// `stub://<name>` for a synthetic scene, otherwise a local directory path.
    pub url: String,
    /// Number of cameras to open.
    pub cameras: usize,
    /// Frame width delivered to the pipeline.
    pub width: u32,
    /// Frame height delivered to the pipeline.
    pub height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            cameras: 1,
            width: 320,
            height: 240,
        }
    }
}

/// Frame source selected from a `CaptureConfig`.
pub struct CaptureSource {
    backend: CaptureBackend,
}

enum CaptureBackend {
    Synthetic(SyntheticSource),
    Stills(StillSequenceSource),
}

impl CaptureSource {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        if config.cameras == 0 {
            return Err(anyhow!("capture requires at least one camera"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "capture resolution must be non-zero (got {}x{})",
                config.width,
                config.height
            ));
        }
        if config.url.starts_with("stub://") {
            return Ok(Self {
                backend: CaptureBackend::Synthetic(SyntheticSource::new(config)),
            });
        }
        if !is_local_path(&config.url) {
            return Err(anyhow!(
                "capture only supports stub:// scenes and local directories, got {}",
                config.url
            ));
        }
        Ok(Self {
            backend: CaptureBackend::Stills(StillSequenceSource::new(config)?),
        })
    }
}

impl FrameSource for CaptureSource {
    fn cameras(&self) -> &[CameraInfo] {
        match &self.backend {
            CaptureBackend::Synthetic(source) => source.cameras(),
            CaptureBackend::Stills(source) => source.cameras(),
        }
    }

    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.connect(),
            CaptureBackend::Stills(source) => source.connect(),
        }
    }

    fn next_frame(&mut self, camera: CameraId) -> Result<Frame> {
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.next_frame(camera),
            CaptureBackend::Stills(source) => source.next_frame(camera),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CaptureBackend::Synthetic(source) => source.is_healthy(),
            CaptureBackend::Stills(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> Option<CaptureStats> {
        Some(match &self.backend {
            CaptureBackend::Synthetic(source) => source.stats(),
            CaptureBackend::Stills(source) => source.stats(),
        })
    }
}

/// Statistics for a capture source.
#[derive(Clone, Debug)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub url: String,
}

pub(crate) fn camera_set(count: usize, width: u32, height: u32) -> Vec<CameraInfo> {
    (0..count)
        .map(|i| CameraInfo {
            id: CameraId(i),
            width,
            height,
        })
        .collect()
}

pub(crate) fn check_camera(cameras: &[CameraInfo], camera: CameraId) -> Result<()> {
    if camera.index() >= cameras.len() {
        return Err(anyhow!(
            "camera {} out of range ({} cameras)",
            camera,
            cameras.len()
        ));
    }
    Ok(())
}

fn is_local_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.contains("://")
}
