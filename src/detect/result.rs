use crate::geometry::{Homography, Point2};

/// Outcome of running the marker detector on one frame.
#[derive(Clone, Debug, Default)]
pub struct MarkerDetection {
    /// Is the marker visible in this frame?
    pub detected: bool,
    /// Model-image to frame mapping, present when detected.
    pub homography: Option<Homography>,
    /// Matched feature correspondences (model pixel -> frame pixel).
    pub matches: Vec<PointMatch>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointMatch {
    pub model: Point2,
    pub image: Point2,
    /// Survived outlier rejection during homography estimation.
    pub inlier: bool,
}

impl MarkerDetection {
    pub fn miss() -> Self {
        Self::default()
    }

    pub fn found(homography: Homography, matches: Vec<PointMatch>) -> Self {
        Self {
            detected: true,
            homography: Some(homography),
            matches,
        }
    }

    /// Frame positions of inlier matches (what the calibration view plots).
    pub fn inlier_points(&self) -> impl Iterator<Item = Point2> + '_ {
        self.matches
            .iter()
            .filter(|m| m.inlier)
            .map(|m| m.image)
    }
}
