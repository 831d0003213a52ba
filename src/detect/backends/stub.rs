use anyhow::Result;
use nalgebra::Matrix3;

use crate::detect::backend::FeatureDetector;
use crate::detect::result::{MarkerDetection, PointMatch};
use crate::frame::Frame;
use crate::geometry::{Homography, Point2};

/// Stub backend for synthetic scenes.
///
/// Reports the marker centred in the frame at the largest size that fits:
/// the homography is a uniform scale plus offset and the matches are the
/// four model corners. With
/// `miss_every(n)` every n-th frame per camera is reported as a miss.
pub struct StubDetector {
    model_width: u32,
    model_height: u32,
    miss_every: Option<u64>,
    use_cached_classifier: bool,
}

impl StubDetector {
    pub fn new(model_width: u32, model_height: u32) -> Self {
        Self {
            model_width: model_width.max(1),
            model_height: model_height.max(1),
            miss_every: None,
            use_cached_classifier: true,
        }
    }

    pub fn miss_every(mut self, period: u64) -> Self {
        self.miss_every = (period > 0).then_some(period);
        self
    }

    /// Retrain instead of loading the cached classifier on warm-up.
    pub fn retrain(mut self, retrain: bool) -> Self {
        self.use_cached_classifier = !retrain;
        self
    }

    /// Uniform scale that fits the model inside the frame, centred.
    fn fit(&self, width: u32, height: u32) -> Homography {
        let (mw, mh) = (self.model_width as f64, self.model_height as f64);
        let scale = (width as f64 / mw).min(height as f64 / mh);
        let dx = (width as f64 - mw * scale) / 2.0;
        let dy = (height as f64 - mh * scale) / 2.0;
        Homography::from_matrix(Matrix3::new(scale, 0.0, dx, 0.0, scale, dy, 0.0, 0.0, 1.0))
    }

    fn corners(&self) -> [Point2; 4] {
        let (w, h) = (self.model_width as f64, self.model_height as f64);
        [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }
}

impl FeatureDetector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<MarkerDetection> {
        if let Some(period) = self.miss_every {
            if frame.sequence % period == 0 {
                return Ok(MarkerDetection::miss());
            }
        }
        let homography = self.fit(frame.width(), frame.height());
        let matches = self
            .corners()
            .iter()
            .filter_map(|&model| {
                homography.apply(model).map(|image| PointMatch {
                    model,
                    image,
                    inlier: true,
                })
            })
            .collect();
        Ok(MarkerDetection::found(homography, matches))
    }

    fn warm_up(&mut self) -> Result<()> {
        if self.use_cached_classifier {
            log::info!("stub detector: using cached classifier");
        } else {
            log::info!("stub detector: retraining classifier");
        }
        Ok(())
    }
}
