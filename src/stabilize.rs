//! Motion-gated pose stabilisation.
//!
//! Raw per-frame poses jitter at sub-pixel scale while marker and camera are
//! still. A coarse motion score (pixels whose intensity changed by more than
//! `intensity_delta` since the previous frame of the same camera) gates
//! whether a new raw estimate replaces the last accepted one:
//!
//! - motion score `>= motion_threshold`, no previous frame, or no pose
//!   accepted yet: accept the raw estimate and overwrite the last-good copy;
//! - otherwise: keep drawing the last-good projection unchanged.
//!
//! The previous-frame buffer advances only on frames that carry a raw pose.

use anyhow::{anyhow, Result};
use image::GrayImage;

use crate::frame::{CameraId, Frame};
use crate::geometry::Mat3x4;
use crate::pose::Pose;

pub const DEFAULT_INTENSITY_DELTA: u8 = 30;
pub const DEFAULT_MOTION_THRESHOLD: u32 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StabilizerConfig {
    /// Per-pixel absolute intensity change that counts as "changed".
    pub intensity_delta: u8,
    /// Changed-pixel count at or above which a new raw pose is accepted.
    pub motion_threshold: u32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            intensity_delta: DEFAULT_INTENSITY_DELTA,
            motion_threshold: DEFAULT_MOTION_THRESHOLD,
        }
    }
}

/// Count of pixels whose absolute intensity difference exceeds `delta`.
///
/// Images of different dimensions have no meaningful difference; callers treat
/// that as "no previous frame".
pub fn motion_score(previous: &GrayImage, current: &GrayImage, delta: u8) -> Option<u32> {
    if previous.dimensions() != current.dimensions() {
        return None;
    }
    let changed = previous
        .as_raw()
        .iter()
        .zip(current.as_raw())
        .filter(|(a, b)| a.abs_diff(**b) > delta)
        .count();
    Some(changed as u32)
}

/// Frame-differencing motion signal for one camera.
#[derive(Debug, Default)]
pub struct MotionGate {
    intensity_delta: u8,
    previous: Option<GrayImage>,
}

impl MotionGate {
    pub fn new(intensity_delta: u8) -> Self {
        Self {
            intensity_delta,
            previous: None,
        }
    }

    /// Score `current` against the retained previous buffer, then retain `current`.
    ///
    /// `None` on the first frame (or after a resolution change).
    pub fn score(&mut self, current: GrayImage) -> Option<u32> {
        let score = self
            .previous
            .as_ref()
            .and_then(|previous| motion_score(previous, &current, self.intensity_delta));
        self.previous = Some(current);
        score
    }
}

/// What the stabiliser did with a raw estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Raw estimate accepted; last-good overwritten.
    Accepted,
    /// Raw estimate discarded; last-good reused.
    Held,
    /// No raw estimate this frame.
    NoPose,
}

/// Result of stabilising one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stabilized {
    pub projection: Option<Mat3x4>,
    pub decision: Decision,
    pub motion_score: Option<u32>,
}

struct CameraTrack {
    gate: MotionGate,
    pose: Pose,
}

/// Per-camera pose stabiliser.
pub struct PoseStabilizer {
    config: StabilizerConfig,
    tracks: Vec<CameraTrack>,
}

impl PoseStabilizer {
    pub fn new(config: StabilizerConfig, cameras: usize) -> Self {
        let tracks = (0..cameras)
            .map(|_| CameraTrack {
                gate: MotionGate::new(config.intensity_delta),
                pose: Pose::default(),
            })
            .collect();
        Self { config, tracks }
    }

    pub fn pose(&self, camera: CameraId) -> Option<&Pose> {
        self.tracks.get(camera.index()).map(|t| &t.pose)
    }

    /// Stabilise the raw estimate for `frame`'s camera.
    pub fn stabilize(&mut self, frame: &Frame, raw: Option<Mat3x4>) -> Result<Stabilized> {
        let threshold = self.config.motion_threshold;
        let track = self
            .tracks
            .get_mut(frame.camera.index())
            .ok_or_else(|| anyhow!("no stabiliser track for {}", frame.camera))?;

        let Some(raw) = raw else {
            track.pose.current = None;
            track.pose.valid = false;
            return Ok(Stabilized {
                projection: None,
                decision: Decision::NoPose,
                motion_score: None,
            });
        };

        let motion = track.gate.score(frame.intensity());
        let accept = match (motion, track.pose.last_good) {
            (_, None) => true,
            (None, _) => true,
            (Some(score), Some(_)) => score >= threshold,
        };

        let decision = if accept {
            track.pose.current = Some(raw);
            track.pose.last_good = Some(raw);
            Decision::Accepted
        } else {
            track.pose.current = track.pose.last_good;
            Decision::Held
        };
        track.pose.valid = true;

        log::debug!(
            "{} frame {}: motion={:?} decision={:?}",
            frame.camera,
            frame.sequence,
            motion,
            decision
        );

        Ok(Stabilized {
            projection: track.pose.current,
            decision,
            motion_score: motion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    fn frame(sequence: u64, value: u8) -> Frame {
        Frame::new(CameraId(0), sequence, RgbImage::from_pixel(200, 100, Rgb([value; 3])))
    }

    fn raw(tx: f64) -> Mat3x4 {
        Mat3x4::translation(tx, 0.0, 500.0)
    }

    #[test]
    fn motion_score_counts_pixels_beyond_delta() {
        let a = GrayImage::from_pixel(10, 10, Luma([100]));
        let mut b = a.clone();
        b.put_pixel(0, 0, Luma([131]));
        b.put_pixel(1, 0, Luma([130]));
        b.put_pixel(2, 0, Luma([60]));
        assert_eq!(motion_score(&a, &b, 30), Some(2));
    }

    #[test]
    fn motion_score_rejects_mismatched_sizes() {
        let a = GrayImage::new(4, 4);
        let b = GrayImage::new(4, 5);
        assert_eq!(motion_score(&a, &b, 30), None);
    }

    #[test]
    fn first_pose_is_accepted_regardless_of_motion() -> Result<()> {
        let mut stabilizer = PoseStabilizer::new(StabilizerConfig::default(), 1);
        let out = stabilizer.stabilize(&frame(1, 10), Some(raw(1.0)))?;
        assert_eq!(out.decision, Decision::Accepted);
        assert_eq!(out.motion_score, None);
        assert_eq!(out.projection, Some(raw(1.0)));
        Ok(())
    }

    #[test]
    fn identical_frames_hold_the_pose() -> Result<()> {
        let mut stabilizer = PoseStabilizer::new(StabilizerConfig::default(), 1);
        stabilizer.stabilize(&frame(1, 10), Some(raw(1.0)))?;
        let out = stabilizer.stabilize(&frame(2, 10), Some(raw(2.0)))?;
        assert_eq!(out.motion_score, Some(0));
        assert_eq!(out.decision, Decision::Held);
        assert_eq!(out.projection, Some(raw(1.0)));
        let out = stabilizer.stabilize(&frame(3, 10), Some(raw(3.0)))?;
        assert_eq!(out.projection, Some(raw(1.0)));
        Ok(())
    }

    #[test]
    fn large_motion_accepts_the_new_pose() -> Result<()> {
        let mut stabilizer = PoseStabilizer::new(StabilizerConfig::default(), 1);
        stabilizer.stabilize(&frame(1, 10), Some(raw(1.0)))?;
        // 200x100 = 20000 changed pixels, above the 10000 threshold.
        let out = stabilizer.stabilize(&frame(2, 200), Some(raw(2.0)))?;
        assert_eq!(out.motion_score, Some(20_000));
        assert_eq!(out.decision, Decision::Accepted);
        assert_eq!(stabilizer.pose(CameraId(0)).unwrap().last_good, Some(raw(2.0)));
        Ok(())
    }

    #[test]
    fn threshold_is_inclusive_and_configurable() -> Result<()> {
        let config = StabilizerConfig {
            intensity_delta: 30,
            motion_threshold: 20_000,
        };
        let mut stabilizer = PoseStabilizer::new(config, 1);
        stabilizer.stabilize(&frame(1, 10), Some(raw(1.0)))?;
        let out = stabilizer.stabilize(&frame(2, 200), Some(raw(2.0)))?;
        assert_eq!(out.decision, Decision::Accepted);
        Ok(())
    }

    #[test]
    fn missing_raw_pose_invalidates_but_keeps_last_good() -> Result<()> {
        let mut stabilizer = PoseStabilizer::new(StabilizerConfig::default(), 1);
        stabilizer.stabilize(&frame(1, 10), Some(raw(1.0)))?;
        let out = stabilizer.stabilize(&frame(2, 200), None)?;
        assert_eq!(out.decision, Decision::NoPose);
        let pose = stabilizer.pose(CameraId(0)).unwrap();
        assert!(!pose.valid);
        assert_eq!(pose.last_good, Some(raw(1.0)));

        // The baseline did not advance on the pose-less frame.
        let out = stabilizer.stabilize(&frame(3, 10), Some(raw(3.0)))?;
        assert_eq!(out.motion_score, Some(0));
        assert_eq!(out.projection, Some(raw(1.0)));
        Ok(())
    }

    #[test]
    fn unknown_camera_is_an_error() {
        let mut stabilizer = PoseStabilizer::new(StabilizerConfig::default(), 1);
        let other = Frame::new(CameraId(4), 1, RgbImage::new(2, 2));
        assert!(stabilizer.stabilize(&other, Some(raw(0.0))).is_err());
    }
}
