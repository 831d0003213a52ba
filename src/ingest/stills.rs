//! Still-image sequence source.
//!
//! Reads PNG/JPEG/BMP files from a local directory in lexical order and loops
//! when the sequence is exhausted. A single-camera source reads the directory
//! itself; a rig reads sub-directories `cam0`, `cam1`, ... Images are resized
//! to the configured capture resolution when they differ.

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use std::fs;
use std::path::{Path, PathBuf};

use super::{camera_set, check_camera, CaptureConfig, CaptureStats};
use crate::frame::{CameraId, CameraInfo, Frame};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

pub struct StillSequenceSource {
    config: CaptureConfig,
    cameras: Vec<CameraInfo>,
    sequences: Vec<CameraSequence>,
    frames_captured: u64,
    healthy: bool,
}

struct CameraSequence {
    files: Vec<PathBuf>,
    cursor: usize,
    captured: u64,
}

impl StillSequenceSource {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let root = PathBuf::from(&config.url);
        if !root.is_dir() {
            return Err(anyhow!("capture directory {} does not exist", root.display()));
        }
        let cameras = camera_set(config.cameras, config.width, config.height);
        let mut sequences = Vec::with_capacity(cameras.len());
        for camera in &cameras {
            let dir = if config.cameras == 1 {
                root.clone()
            } else {
                root.join(format!("cam{}", camera.id.index()))
            };
            let files = list_images(&dir)?;
            if files.is_empty() {
                return Err(anyhow!("no images found in {}", dir.display()));
            }
            sequences.push(CameraSequence {
                files,
                cursor: 0,
                captured: 0,
            });
        }
        Ok(Self {
            config,
            cameras,
            sequences,
            frames_captured: 0,
            healthy: true,
        })
    }

    pub fn connect(&mut self) -> Result<()> {
        log::info!(
            "StillSequenceSource: connected to {} ({} cameras)",
            self.config.url,
            self.cameras.len()
        );
        Ok(())
    }

    pub fn cameras(&self) -> &[CameraInfo] {
        &self.cameras
    }

    pub fn next_frame(&mut self, camera: CameraId) -> Result<Frame> {
        check_camera(&self.cameras, camera)?;
        let (width, height) = (self.config.width, self.config.height);
        let seq = &mut self.sequences[camera.index()];
        let path = seq.files[seq.cursor].clone();
        seq.cursor = (seq.cursor + 1) % seq.files.len();
        seq.captured += 1;
        let sequence = seq.captured;

        let decoded = match image::open(&path) {
            Ok(img) => img,
            Err(e) => {
                self.healthy = false;
                return Err(anyhow!("failed to decode {}: {}", path.display(), e));
            }
        };
        let mut rgb = decoded.to_rgb8();
        if rgb.dimensions() != (width, height) {
            rgb = image::imageops::resize(&rgb, width, height, FilterType::Triangle);
        }
        self.frames_captured += 1;
        self.healthy = true;
        Ok(Frame::new(camera, sequence, rgb))
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured,
            url: self.config.url.clone(),
        }
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_image && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_frame(dir: &Path, name: &str, value: u8) {
        RgbImage::from_pixel(16, 12, Rgb([value, value, value]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn loops_over_sorted_images_and_resizes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_frame(dir.path(), "b.png", 200);
        write_frame(dir.path(), "a.png", 10);
        fs::write(dir.path().join("notes.txt"), "ignored")?;

        let mut source = StillSequenceSource::new(CaptureConfig {
            url: dir.path().display().to_string(),
            cameras: 1,
            width: 32,
            height: 24,
        })?;

        let first = source.next_frame(CameraId(0))?;
        assert_eq!((first.width(), first.height()), (32, 24));
        assert!(first.image().get_pixel(0, 0).0[0].abs_diff(10) <= 1);
        let second = source.next_frame(CameraId(0))?;
        assert!(second.image().get_pixel(0, 0).0[0].abs_diff(200) <= 1);
        let third = source.next_frame(CameraId(0))?;
        assert!(third.image().get_pixel(0, 0).0[0].abs_diff(10) <= 1);
        assert_eq!(third.sequence, 3);
        Ok(())
    }

    #[test]
    fn rig_reads_one_directory_per_camera() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for cam in 0..2 {
            let sub = dir.path().join(format!("cam{}", cam));
            fs::create_dir(&sub)?;
            write_frame(&sub, "0001.png", 50 * (cam as u8 + 1));
        }
        let mut source = StillSequenceSource::new(CaptureConfig {
            url: dir.path().display().to_string(),
            cameras: 2,
            width: 16,
            height: 12,
        })?;
        assert_eq!(source.next_frame(CameraId(1))?.image().get_pixel(0, 0).0[0], 100);
        Ok(())
    }

    #[test]
    fn empty_directory_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let result = StillSequenceSource::new(CaptureConfig {
            url: dir.path().display().to_string(),
            ..CaptureConfig::default()
        });
        assert!(result.is_err());
        Ok(())
    }
}
