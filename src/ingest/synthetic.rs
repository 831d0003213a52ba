//! Synthetic frame source (`stub://`).
//!
//! Produces a diagonal gradient scene with low-amplitude sensor noise. The
//! scene shifts every `SCENE_PERIOD` frames to simulate the camera or marker
//! being moved, except for `stub://static`, which never shifts.

use anyhow::Result;
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{camera_set, check_camera, CaptureConfig, CaptureStats};
use crate::frame::{CameraId, CameraInfo, Frame};

/// Frames between simulated scene shifts.
const SCENE_PERIOD: u64 = 50;
/// Gradient offset applied per scene shift. Larger than the motion intensity delta.
const SCENE_SHIFT: u32 = 37;
/// Peak per-channel noise amplitude. Kept well under the motion intensity delta.
const NOISE_AMPLITUDE: u8 = 3;

pub struct SyntheticSource {
    config: CaptureConfig,
    cameras: Vec<CameraInfo>,
    sequences: Vec<u64>,
    scene_state: u32,
    frames_captured: u64,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(config: CaptureConfig) -> Self {
        let cameras = camera_set(config.cameras, config.width, config.height);
        Self {
            sequences: vec![0; cameras.len()],
            cameras,
            config,
            scene_state: 0,
            frames_captured: 0,
            rng: StdRng::seed_from_u64(0x4172_7476),
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({} cameras, {}x{})",
            self.config.url,
            self.cameras.len(),
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    pub fn cameras(&self) -> &[CameraInfo] {
        &self.cameras
    }

    pub fn next_frame(&mut self, camera: CameraId) -> Result<Frame> {
        check_camera(&self.cameras, camera)?;
        let sequence = {
            let seq = &mut self.sequences[camera.index()];
            *seq += 1;
            *seq
        };
        self.frames_captured += 1;

        // The primary camera drives the scene clock so every camera sees the same shift.
        if camera.index() == 0 && !self.is_static() && sequence % SCENE_PERIOD == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let image = self.render(camera);
        Ok(Frame::new(camera, sequence, image))
    }

    pub fn is_healthy(&self) -> bool {
        true
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured,
            url: self.config.url.clone(),
        }
    }

    fn is_static(&self) -> bool {
        self.config.url == "stub://static"
    }

    fn render(&mut self, camera: CameraId) -> RgbImage {
        let offset = (self.scene_state.wrapping_mul(SCENE_SHIFT) % 256) + camera.index() as u32 * 11;
        let mut image = RgbImage::new(self.config.width, self.config.height);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let base = ((x + y + offset) % 256) as u8;
            let noise = self.rng.gen_range(0..=NOISE_AMPLITUDE);
            let value = base.saturating_add(noise);
            *pixel = Rgb([value, value, value]);
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(url: &str) -> CaptureConfig {
        CaptureConfig {
            url: url.to_string(),
            cameras: 1,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn sequence_numbers_are_per_camera() -> Result<()> {
        let mut source = SyntheticSource::new(CaptureConfig {
            cameras: 2,
            ..stub_config("stub://rig")
        });
        assert_eq!(source.next_frame(CameraId(0))?.sequence, 1);
        assert_eq!(source.next_frame(CameraId(0))?.sequence, 2);
        assert_eq!(source.next_frame(CameraId(1))?.sequence, 1);
        assert_eq!(source.stats().frames_captured, 3);
        Ok(())
    }

    #[test]
    fn static_scene_never_shifts() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config("stub://static"));
        for _ in 0..(SCENE_PERIOD * 2) {
            source.next_frame(CameraId(0))?;
        }
        assert_eq!(source.scene_state, 0);
        Ok(())
    }

    #[test]
    fn moving_scene_shifts_each_period() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config("stub://moving"));
        for _ in 0..SCENE_PERIOD {
            source.next_frame(CameraId(0))?;
        }
        assert_eq!(source.scene_state, 1);
        Ok(())
    }
}
