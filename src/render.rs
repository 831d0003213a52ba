//! The drawing collaborator.
//!
//! A `Renderer` receives the per-frame `CompositeFrame` and owns all pixel
//! output. `LogRenderer` is the headless implementation used by the binary.

use anyhow::Result;

use crate::composite::{CompositeFrame, OverlayTexture, BANNER_TITLE};

pub trait Renderer {
    fn name(&self) -> &'static str;

    fn present(&mut self, frame: &CompositeFrame<'_>) -> Result<()>;

    fn set_fullscreen(&mut self, _fullscreen: bool) -> Result<()> {
        Ok(())
    }
}

/// Renders nothing; logs what would have been drawn.
#[derive(Debug, Default)]
pub struct LogRenderer {
    presented: u64,
    tracked: u64,
    fullscreen: bool,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Frames presented with a valid pose.
    pub fn tracked(&self) -> u64 {
        self.tracked
    }

    pub fn fullscreen(&self) -> bool {
        self.fullscreen
    }
}

impl Renderer for LogRenderer {
    fn name(&self) -> &'static str {
        "log"
    }

    fn present(&mut self, frame: &CompositeFrame<'_>) -> Result<()> {
        self.presented += 1;
        match frame {
            CompositeFrame::Calibrating {
                matches,
                observations,
                threshold,
                ..
            } => {
                log::debug!(
                    "{}: calibrating {}/{} ({} inlier points)",
                    BANNER_TITLE,
                    observations,
                    threshold,
                    matches.len()
                );
            }
            CompositeFrame::Tracking {
                overlay,
                tracking,
                lighting,
                ..
            } => {
                if *tracking {
                    self.tracked += 1;
                }
                match overlay {
                    Some(params) => {
                        let texture = match params.texture {
                            OverlayTexture::Image(img) => format!("image {:?}", img.dimensions()),
                            OverlayTexture::VideoFrame(img) => {
                                format!("video {:?}", img.dimensions())
                            }
                        };
                        log::debug!(
                            "{}: overlay {} fade={:.1} quad={} label={} lighting={:?}",
                            BANNER_TITLE,
                            texture,
                            params.fade,
                            params.quad.len(),
                            params.label.is_some(),
                            lighting
                        );
                    }
                    None => log::debug!("{}: tracking={} no overlay", BANNER_TITLE, tracking),
                }
            }
        }
        Ok(())
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<()> {
        self.fullscreen = fullscreen;
        log::info!("fullscreen {}", if fullscreen { "on" } else { "off" });
        Ok(())
    }
}
