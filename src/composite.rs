//! Composition parameters for the rendering collaborator.
//!
//! The compositor decides *what* to draw: which overlay texture, mapped onto
//! which quad, under which projection, at which fade weight, and whether the
//! label overlay is shown. Pixel output belongs to the `Renderer`.

use image::{RgbImage, RgbaImage};
use nalgebra::Vector3;
use std::f64::consts::PI;

use crate::catalog::{OverlayCatalog, OverlayMetadata, OverlaySelector};
use crate::frame::Frame;
use crate::geometry::{Mat3x4, Point2};
use crate::roi::Roi;

pub const DEFAULT_FADE_STEP: f32 = 0.2;
pub const DEFAULT_LABEL_MARGIN: f64 = 10.0;
pub const DEFAULT_LABEL_LINE_SPACING: f64 = 12.0;
/// Horizontal gap between the ROI's second corner and the label panel.
const LABEL_ANCHOR_OFFSET: f64 = 12.0;
/// Depth of the overlay object frame below the marker plane.
const OBJECT_DEPTH: f64 = -90.0;

pub const BANNER_TITLE: &str = "the artvertiser";

/// Texture coordinates for ROI corners 0..4.
pub const QUAD_TEX_COORDS: [(f32, f32); 4] = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositorConfig {
    pub fade_step: f32,
    pub label_margin: f64,
    pub label_line_spacing: f64,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            fade_step: DEFAULT_FADE_STEP,
            label_margin: DEFAULT_LABEL_MARGIN,
            label_line_spacing: DEFAULT_LABEL_LINE_SPACING,
        }
    }
}

/// Blend weight in `[0, 1]` used to fade a newly tracked overlay in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadeWeight {
    value: f32,
    step: f32,
}

impl FadeWeight {
    pub fn new(step: f32) -> Self {
        Self { value: 0.0, step }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Step towards 1 and return the new weight.
    pub fn advance(&mut self) -> f32 {
        self.value = (self.value + self.step).min(1.0);
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

/// Texture source for the overlay quad.
#[derive(Clone, Copy, Debug)]
pub enum OverlayTexture<'a> {
    Image(&'a RgbaImage),
    VideoFrame(&'a RgbImage),
}

/// Label panel drawn next to the ROI.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelOverlay<'a> {
    /// ROI expanded outward by the label margin.
    pub border: [Point2; 4],
    /// Top-left of the text panel.
    pub anchor: Point2,
    /// Title, date, author, client, location.
    pub lines: [&'a str; 5],
    pub line_spacing: f64,
}

impl<'a> LabelOverlay<'a> {
    /// Baseline of each text line, stacked downwards from the anchor.
    pub fn line_positions(&self) -> impl Iterator<Item = (Point2, &'a str)> + '_ {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| (self.anchor.offset(0.0, i as f64 * self.line_spacing), *line))
    }
}

/// Everything the renderer needs to draw the overlay for one frame.
#[derive(Clone, Debug)]
pub struct DrawParams<'a> {
    /// Stabilised camera projection (model-image pixels -> frame pixels).
    pub projection: Mat3x4,
    /// Object frame for shading: model centre, flipped about X.
    pub object_transform: Mat3x4,
    pub texture: OverlayTexture<'a>,
    /// ROI corners as loaded. Fewer than four means a malformed ROI file.
    pub quad: &'a [Point2],
    pub fade: f32,
    pub label: Option<LabelOverlay<'a>>,
}

/// Per-frame output of `Session::composite`.
#[derive(Debug)]
pub enum CompositeFrame<'a> {
    /// Geometry not solved yet: plot inlier matches and progress.
    Calibrating {
        background: Option<&'a Frame>,
        matches: Vec<Point2>,
        observations: u32,
        threshold: u32,
    },
    Tracking {
        background: Option<&'a Frame>,
        overlay: Option<DrawParams<'a>>,
        /// A valid stabilised pose exists this frame.
        tracking: bool,
        lighting: Lighting,
    },
}

/// Lighting behaviour requested of the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lighting {
    /// Recompute the lighting map instead of loading the cached one.
    pub recompute: bool,
    /// Keep updating the lighting estimate every frame.
    pub dynamic: bool,
}

/// Overlay selection, fade and label state.
pub struct Compositor {
    config: CompositorConfig,
    selector: OverlaySelector,
    fade: FadeWeight,
    label_visible: bool,
    video_playback: bool,
    video_frame: Option<RgbImage>,
}

impl Compositor {
    pub fn new(config: CompositorConfig, selector: OverlaySelector) -> Self {
        Self {
            fade: FadeWeight::new(config.fade_step),
            config,
            selector,
            label_visible: false,
            video_playback: false,
            video_frame: None,
        }
    }

    pub fn selector(&self) -> &OverlaySelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut OverlaySelector {
        &mut self.selector
    }

    pub fn fade(&self) -> f32 {
        self.fade.value()
    }

    /// Step the fade weight towards 1 for a frame on which the overlay is drawn.
    pub fn advance_fade(&mut self) -> f32 {
        self.fade.advance()
    }

    /// Drop the fade weight to 0 after tracking is lost.
    pub fn reset_fade(&mut self) {
        self.fade.reset();
    }

    pub fn label_visible(&self) -> bool {
        self.label_visible
    }

    pub fn set_label_visible(&mut self, visible: bool) {
        self.label_visible = visible;
    }

    pub fn video_playback(&self) -> bool {
        self.video_playback
    }

    pub fn set_video_playback(&mut self, on: bool) {
        self.video_playback = on;
        if !on {
            self.video_frame = None;
        }
    }

    /// Latest overlay video frame, used while playback is on.
    pub fn set_video_frame(&mut self, frame: RgbImage) {
        self.video_frame = Some(frame);
    }

    /// Draw parameters for the current frame; `None` draws nothing.
    ///
    /// Reads the fade weight without stepping it.
    pub fn compose<'a>(
        &'a self,
        projection: Option<&Mat3x4>,
        roi: &'a Roi,
        catalog: &'a OverlayCatalog,
        model_size: (u32, u32),
    ) -> Option<DrawParams<'a>> {
        let projection = projection?;
        let fade = self.fade.value();

        let asset = catalog.selected(&self.selector)?;
        let texture = match (&self.video_frame, self.video_playback) {
            (Some(frame), true) => OverlayTexture::VideoFrame(frame),
            _ => OverlayTexture::Image(&asset.image),
        };
        let label = if self.label_visible {
            label_overlay(roi, &asset.metadata, &self.config)
        } else {
            None
        };

        Some(DrawParams {
            projection: *projection,
            object_transform: object_transform(model_size),
            texture,
            quad: roi.points(),
            fade,
            label,
        })
    }
}

/// Model-centred object frame, rotated half a turn about X.
pub fn object_transform(model_size: (u32, u32)) -> Mat3x4 {
    let (w, h) = model_size;
    Mat3x4::translation(w as f64 / 2.0, h as f64 / 2.0, OBJECT_DEPTH)
        .mul(&Mat3x4::rotation(Vector3::new(1.0, 0.0, 0.0), PI))
}

/// Label panel for a complete ROI; `None` when the ROI lacks corners.
pub fn label_overlay<'a>(
    roi: &Roi,
    metadata: &'a OverlayMetadata,
    config: &CompositorConfig,
) -> Option<LabelOverlay<'a>> {
    let [c0, c1, c2, c3] = roi.corners()?;
    let m = config.label_margin;
    Some(LabelOverlay {
        border: [
            c0.offset(-m, -m),
            c1.offset(m, -m),
            c2.offset(m, m),
            c3.offset(-m, m),
        ],
        anchor: c1.offset(LABEL_ANCHOR_OFFSET, 0.0),
        lines: metadata.lines(),
        line_spacing: config.label_line_spacing,
    })
}
