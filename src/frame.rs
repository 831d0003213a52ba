//! Captured frames and camera descriptors.
//!
//! A `Frame` is transient: the source replaces it every cycle. The only
//! derived data that outlives a cycle is the previous intensity buffer kept
//! by the stabilizer.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a camera. The camera set is fixed at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CameraId(pub usize);

impl CameraId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cam{}", self.0)
    }
}

/// Static description of a camera: identifier and frame resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraInfo {
    pub id: CameraId,
    pub width: u32,
    pub height: u32,
}

/// One captured RGB image from one camera.
///
/// `sequence` is the per-camera capture order; there is no wall-clock timestamp.
#[derive(Clone)]
pub struct Frame {
    pub camera: CameraId,
    pub sequence: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(camera: CameraId, sequence: u64, image: RgbImage) -> Self {
        Self {
            camera,
            sequence,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Single-channel intensity (luma) conversion of the frame.
    pub fn intensity(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }
}

// Frames carry pixel data; Debug only reports the envelope.
impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("camera", &self.camera)
            .field("sequence", &self.sequence)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
