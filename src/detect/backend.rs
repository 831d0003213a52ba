use anyhow::Result;

use crate::detect::result::MarkerDetection;
use crate::frame::Frame;

/// Planar marker detector.
///
/// # Boundary
///
/// Feature extraction, matching and homography estimation live behind this
/// trait. The session only consumes the outcome: whether the marker is visible
/// in the frame, the model-to-frame homography, and the matched points.
///
/// Implementations are called once per camera per frame, sequentially, from
/// the single frame loop.
pub trait FeatureDetector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// A marker that is not visible is `Ok(MarkerDetection::miss())`, not an error.
    fn detect(&mut self, frame: &Frame) -> Result<MarkerDetection>;

    /// Optional warm-up hook (classifier training or cache load).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
