use anyhow::{anyhow, Result};

use crate::detect::MarkerDetection;
use crate::frame::{CameraId, CameraInfo};
use crate::geometry::Homography;

/// One camera's contribution for one counted frame.
#[derive(Clone, Debug, PartialEq)]
pub enum HomographyObservation {
    Detected(Homography),
    /// Placeholder keeping per-camera sequences the same length.
    Miss,
}

impl HomographyObservation {
    pub fn homography(&self) -> Option<&Homography> {
        match self {
            Self::Detected(h) => Some(h),
            Self::Miss => None,
        }
    }
}

/// Append-only collection of homography observations.
///
/// A frame is recorded only when at least one camera detected the marker; it
/// then adds exactly one observation per registered camera and increments the
/// counter by one. Nothing is ever removed or reweighted.
#[derive(Debug, Default)]
pub struct HomographyAccumulator {
    cameras: Vec<CameraInfo>,
    observations: Vec<Vec<HomographyObservation>>,
    count: u32,
}

impl HomographyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a camera. Cameras are registered once, in id order, before any frame.
    pub fn register_camera(&mut self, camera: CameraInfo) {
        self.cameras.push(camera);
        self.observations.push(Vec::new());
    }

    pub fn cameras(&self) -> &[CameraInfo] {
        &self.cameras
    }

    /// Record a single camera's result for the current frame.
    pub fn add_observation(&mut self, camera: CameraId, detection: &MarkerDetection) -> Result<()> {
        let sequence = self
            .observations
            .get_mut(camera.index())
            .ok_or_else(|| anyhow!("camera {} is not registered with the accumulator", camera))?;
        let observation = match (detection.detected, detection.homography) {
            (true, Some(h)) => HomographyObservation::Detected(h),
            _ => HomographyObservation::Miss,
        };
        sequence.push(observation);
        Ok(())
    }

    /// Record one frame: `detections[i]` is camera `i`'s result.
    ///
    /// Returns whether the frame counted (at least one camera detected).
    pub fn add_frame(&mut self, detections: &[MarkerDetection]) -> Result<bool> {
        if detections.len() != self.cameras.len() {
            return Err(anyhow!(
                "expected {} detections, got {}",
                self.cameras.len(),
                detections.len()
            ));
        }
        if !detections.iter().any(|d| d.detected) {
            return Ok(false);
        }
        for (index, detection) in detections.iter().enumerate() {
            self.add_observation(CameraId(index), detection)?;
        }
        self.count = self.count.saturating_add(1);
        Ok(true)
    }

    /// Frames that counted towards the solve threshold.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn observations(&self, camera: CameraId) -> &[HomographyObservation] {
        self.observations
            .get(camera.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn detected_count(&self, camera: CameraId) -> usize {
        self.observations(camera)
            .iter()
            .filter(|o| o.homography().is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
        MarkerDetection::found(Homography::identity(), vec![])
    }

    #[test]
    fn frame_with_any_detection_counts_once() -> Result<()> {
        let mut acc = rig(2);
        assert!(acc.add_frame(&[hit(), MarkerDetection::miss()])?);
        assert_eq!(acc.count(), 1);
        assert_eq!(
            acc.observations(CameraId(1)),
            &[HomographyObservation::Miss][..]
        );
        assert_eq!(acc.detected_count(CameraId(0)), 1);
        Ok(())
    }

    #[test]
    fn all_miss_frame_is_not_recorded() -> Result<()> {
        let mut acc = rig(2);
        assert!(!acc.add_frame(&[MarkerDetection::miss(), MarkerDetection::miss()])?);
        assert_eq!(acc.count(), 0);
        assert!(acc.observations(CameraId(0)).is_empty());
        Ok(())
    }

    #[test]
    fn counter_is_monotonic_and_sequences_stay_aligned() -> Result<()> {
        let mut acc = rig(3);
        let mut previous = 0;
        for i in 0..40 {
            let frame = [
                if i % 2 == 0 { hit() } else { MarkerDetection::miss() },
                if i % 3 == 0 { hit() } else { MarkerDetection::miss() },
                MarkerDetection::miss(),
            ];
            acc.add_frame(&frame)?;
            assert!(acc.count() >= previous);
            assert!(acc.count() - previous <= 1);
            previous = acc.count();
        }
        let len = acc.observations(CameraId(0)).len();
        assert_eq!(len, acc.count() as usize);
        assert_eq!(acc.observations(CameraId(1)).len(), len);
        assert_eq!(acc.observations(CameraId(2)).len(), len);
        Ok(())
    }

    #[test]
    fn detection_count_mismatch_is_an_error() {
        let mut acc = rig(2);
        assert!(acc.add_frame(&[hit()]).is_err());
    }
}
