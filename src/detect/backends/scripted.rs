use anyhow::Result;
use std::collections::VecDeque;

use crate::detect::backend::FeatureDetector;
use crate::detect::result::MarkerDetection;
use crate::frame::{CameraId, Frame};

/// Replays queued detections per camera. An empty queue reports a miss.
#[derive(Default)]
pub struct ScriptedDetector {
    scripts: Vec<VecDeque<MarkerDetection>>,
    calls: u64,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next result for `camera`.
    pub fn push(&mut self, camera: CameraId, detection: MarkerDetection) {
        let index = camera.index();
        if self.scripts.len() <= index {
            self.scripts.resize_with(index + 1, VecDeque::new);
        }
        self.scripts[index].push_back(detection);
    }

    /// Queue `count` copies of `detection` for `camera`.
    pub fn repeat(&mut self, camera: CameraId, detection: MarkerDetection, count: usize) {
        for _ in 0..count {
            self.push(camera, detection.clone());
        }
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl FeatureDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, frame: &Frame) -> Result<MarkerDetection> {
        self.calls += 1;
        Ok(self
            .scripts
            .get_mut(frame.camera.index())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(MarkerDetection::miss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Homography;
    use image::RgbImage;

    #[test]
    fn replays_per_camera_then_misses() -> Result<()> {
        let mut detector = ScriptedDetector::new();
        detector.push(CameraId(1), MarkerDetection::found(Homography::identity(), vec![]));

        let cam0 = Frame::new(CameraId(0), 1, RgbImage::new(4, 4));
        let cam1 = Frame::new(CameraId(1), 1, RgbImage::new(4, 4));

        assert!(!detector.detect(&cam0)?.detected);
        assert!(detector.detect(&cam1)?.detected);
        assert!(!detector.detect(&cam1)?.detected);
        assert_eq!(detector.calls(), 3);
        Ok(())
    }
}
