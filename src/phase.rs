//! The calibration/tracking state machine.
//!
//! `Session` owns every piece of per-run state: the capture source, detector,
//! solver, pose estimator, accumulator, stabiliser and compositor. The owning
//! loop calls `advance()` once per frame and `composite()` to get what to draw;
//! the active phase decides what `advance()` does.
//!
//! ```text
//! Uncalibrated --(cached artifacts)--------------------> Calibrated
//!      |                                                     ^
//!      +--> Calibrating --(count >= threshold, solved)-------+
//! ```
//!
//! `Calibrated` is terminal for the life of the session.

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use std::fmt;

use crate::calib::{
    ArtifactStore, CalibrationResult, CalibrationSolver, CalibrationState, HomographyAccumulator,
    SolverParams, DEFAULT_OBSERVATION_THRESHOLD,
};
use crate::catalog::{OverlayCatalog, OverlaySelector};
use crate::composite::{CompositeFrame, Compositor, CompositorConfig, Lighting};
use crate::controls::{Control, ControlOutcome};
use crate::detect::{FeatureDetector, MarkerDetection};
use crate::frame::{CameraId, CameraInfo, Frame};
use crate::ingest::{CaptureStats, FrameSource};
use crate::pose::{Pose, PoseEstimator};
use crate::roi::Roi;
use crate::stabilize::{PoseStabilizer, Stabilized, StabilizerConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uncalibrated,
    Calibrating,
    Calibrated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Uncalibrated => "uncalibrated",
            Phase::Calibrating => "calibrating",
            Phase::Calibrated => "calibrated",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    /// Counted frames needed before the solver is tried.
    pub observation_threshold: u32,
    /// Start from the persisted calibration when it is present.
    pub use_cache: bool,
    pub stabilizer: StabilizerConfig,
    pub compositor: CompositorConfig,
    /// Model image dimensions in pixels.
    pub model_size: (u32, u32),
    /// Size overlay video frames are resized to.
    pub overlay_video_size: (u32, u32),
    /// Draw overlays from the start.
    pub augment: bool,
    pub redo_lighting: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            observation_threshold: DEFAULT_OBSERVATION_THRESHOLD,
            use_cache: true,
            stabilizer: StabilizerConfig::default(),
            compositor: CompositorConfig::default(),
            model_size: (320, 240),
            overlay_video_size: (160, 120),
            augment: true,
            redo_lighting: false,
        }
    }
}

/// External collaborators driven by the session.
pub struct Collaborators {
    pub source: Box<dyn FrameSource>,
    pub detector: Box<dyn FeatureDetector>,
    pub solver: Box<dyn CalibrationSolver>,
    pub estimator: Box<dyn PoseEstimator>,
    /// Played as the overlay while video playback is on.
    pub overlay_video: Option<Box<dyn FrameSource>>,
}

pub struct Session {
    config: SessionConfig,
    phase: Phase,
    source: Box<dyn FrameSource>,
    detector: Box<dyn FeatureDetector>,
    solver: Box<dyn CalibrationSolver>,
    estimator: Box<dyn PoseEstimator>,
    overlay_video: Option<Box<dyn FrameSource>>,
    store: ArtifactStore,
    cameras: Vec<CameraInfo>,
    accumulator: HomographyAccumulator,
    calibration: CalibrationState,
    solve_attempts: u32,
    stabilizer: PoseStabilizer,
    compositor: Compositor,
    catalog: OverlayCatalog,
    roi: Roi,
    active_camera: CameraId,
    last_frame: Option<Frame>,
    last_detection: MarkerDetection,
    last_stabilized: Option<Stabilized>,
    frames: u64,
    augment: bool,
    dynamic_lighting: bool,
    fullscreen: bool,
}

impl Session {
    /// Open the collaborators and pick the starting phase.
    ///
    /// Capture, detector or catalog failures are fatal. A cached calibration
    /// that exists but does not load is reported and calibration starts over.
    pub fn start(
        config: SessionConfig,
        collaborators: Collaborators,
        catalog: OverlayCatalog,
        roi: Roi,
        store: ArtifactStore,
    ) -> Result<Self> {
        let Collaborators {
            mut source,
            mut detector,
            solver,
            estimator,
            mut overlay_video,
        } = collaborators;

        source.connect().context("failed to open capture source")?;
        let cameras = source.cameras().to_vec();
        if cameras.is_empty() {
            return Err(anyhow!("capture source reports no cameras"));
        }
        detector
            .warm_up()
            .with_context(|| format!("failed to initialise {} detector", detector.name()))?;
        if let Some(video) = overlay_video.as_mut() {
            video.connect().context("failed to open overlay video")?;
        }

        let selector = OverlaySelector::new(catalog.len())?;
        let compositor = Compositor::new(config.compositor, selector);

        let mut session = Self {
            phase: Phase::Uncalibrated,
            stabilizer: PoseStabilizer::new(config.stabilizer, cameras.len()),
            source,
            detector,
            solver,
            estimator,
            overlay_video,
            store,
            accumulator: HomographyAccumulator::new(),
            calibration: CalibrationState::fresh(),
            solve_attempts: 0,
            compositor,
            catalog,
            roi,
            active_camera: CameraId(0),
            last_frame: None,
            last_detection: MarkerDetection::miss(),
            last_stabilized: None,
            frames: 0,
            augment: config.augment,
            dynamic_lighting: false,
            fullscreen: false,
            cameras,
            config,
        };

        match session.cached_calibration() {
            Some(artifacts) => {
                session.calibration = CalibrationState::from_cache(artifacts);
                session.enter(Phase::Calibrated);
            }
            None => session.begin_calibration(),
        }

        log::info!(
            "session started: {} camera(s), detector={}, solver={}, pose={}, {} overlay(s), lighting {}",
            session.cameras.len(),
            session.detector.name(),
            session.solver.name(),
            session.estimator.name(),
            session.catalog.len(),
            if session.config.redo_lighting { "recomputed" } else { "cached" }
        );
        Ok(session)
    }

    fn cached_calibration(&self) -> Option<CalibrationResult> {
        if !self.config.use_cache || !self.store.exists() {
            return None;
        }
        match self.store.load() {
            Ok(result) if result.cameras.len() == self.cameras.len() => {
                log::info!(
                    "loaded cached calibration from {} and {}",
                    self.store.intrinsics_path().display(),
                    self.store.extrinsics_path().display()
                );
                Some(result)
            }
            Ok(result) => {
                log::warn!(
                    "cached calibration covers {} camera(s), capture has {}; recalibrating",
                    result.cameras.len(),
                    self.cameras.len()
                );
                None
            }
            Err(e) => {
                log::warn!("cached calibration unusable ({:#}); recalibrating", e);
                None
            }
        }
    }

    fn begin_calibration(&mut self) {
        self.accumulator = HomographyAccumulator::new();
        for camera in &self.cameras {
            self.accumulator.register_camera(*camera);
        }
        self.calibration = CalibrationState::fresh();
        self.enter(Phase::Calibrating);
    }

    fn enter(&mut self, next: Phase) {
        log::info!("phase {} -> {}", self.phase, next);
        self.phase = next;
    }

    /// One per-frame update.
    pub fn advance(&mut self) -> Result<()> {
        self.frames += 1;
        match self.phase {
            Phase::Uncalibrated => {}
            Phase::Calibrating => self.advance_calibrating()?,
            Phase::Calibrated => self.advance_tracking()?,
        }
        self.advance_overlay_video();
        Ok(())
    }

    fn advance_calibrating(&mut self) -> Result<()> {
        let mut detections = Vec::with_capacity(self.cameras.len());
        for camera in &self.cameras {
            let frame = self.source.next_frame(camera.id)?;
            let detection = self.detector.detect(&frame)?;
            if camera.id == self.active_camera {
                self.last_frame = Some(frame);
                self.last_detection = detection.clone();
            }
            detections.push(detection);
        }

        if self.accumulator.add_frame(&detections)? {
            self.calibration.observation_count = self.accumulator.count();
            log::debug!(
                "calibration observation {}/{}",
                self.calibration.observation_count,
                self.config.observation_threshold
            );
        }

        if self.calibration.observation_count >= self.config.observation_threshold {
            self.try_solve()?;
        }
        Ok(())
    }

    fn try_solve(&mut self) -> Result<()> {
        self.solve_attempts += 1;
        let params = SolverParams::for_cameras(self.cameras.len());
        let Some(result) = self.solver.solve(&self.accumulator, &params)? else {
            log::warn!(
                "calibration did not converge after {} observations (attempt {}); still accumulating",
                self.calibration.observation_count,
                self.solve_attempts
            );
            return Ok(());
        };

        if let Err(e) = self.store.save(&result) {
            log::error!("failed to persist calibration: {:#}", e);
            return Err(e.context("calibration solved but could not be persisted"));
        }
        let artifacts = match self.store.load() {
            Ok(artifacts) => artifacts,
            Err(e) => {
                log::error!("calibration reload failed after a successful solve: {:#}", e);
                return Err(e.context("persisted calibration does not load"));
            }
        };

        self.calibration.artifacts = Some(artifacts);
        self.calibration.ready = true;
        log::info!(
            "calibration solved after {} observations, saved to {} and {}",
            self.calibration.observation_count,
            self.store.intrinsics_path().display(),
            self.store.extrinsics_path().display()
        );
        self.enter(Phase::Calibrated);
        Ok(())
    }

    fn advance_tracking(&mut self) -> Result<()> {
        let camera = self.active_camera;
        let frame = self.source.next_frame(camera)?;
        let detection = self.detector.detect(&frame)?;
        let calibration = self
            .calibration
            .artifacts
            .as_ref()
            .and_then(|artifacts| artifacts.camera(camera))
            .ok_or_else(|| anyhow!("no calibration for {}", camera))?;
        let raw = self.estimator.estimate(calibration, &detection)?;
        let stabilized = self.stabilizer.stabilize(&frame, raw)?;

        match (stabilized.projection.is_some(), self.augment) {
            (false, _) => self.compositor.reset_fade(),
            (true, true) => {
                self.compositor.advance_fade();
            }
            (true, false) => {}
        }

        self.last_frame = Some(frame);
        self.last_detection = detection;
        self.last_stabilized = Some(stabilized);
        Ok(())
    }

    fn advance_overlay_video(&mut self) {
        if !self.compositor.video_playback() {
            return;
        }
        let Some(video) = self.overlay_video.as_mut() else {
            return;
        };
        match video.next_frame(CameraId(0)) {
            Ok(frame) => {
                let (w, h) = self.config.overlay_video_size;
                let resized = imageops::resize(frame.image(), w, h, FilterType::Triangle);
                self.compositor.set_video_frame(resized);
            }
            Err(e) => {
                log::warn!("overlay video stopped: {:#}", e);
                self.compositor.set_video_playback(false);
            }
        }
    }

    /// What to draw for the most recent frame.
    pub fn composite(&self) -> CompositeFrame<'_> {
        match self.phase {
            Phase::Uncalibrated | Phase::Calibrating => CompositeFrame::Calibrating {
                background: self.last_frame.as_ref(),
                matches: self.last_detection.inlier_points().collect(),
                observations: self.calibration.observation_count,
                threshold: self.config.observation_threshold,
            },
            Phase::Calibrated => {
                let projection = self
                    .stabilizer
                    .pose(self.active_camera)
                    .and_then(Pose::projection)
                    .copied();
                let drawn = projection.filter(|_| self.augment);
                let overlay = self.compositor.compose(
                    drawn.as_ref(),
                    &self.roi,
                    &self.catalog,
                    self.config.model_size,
                );
                CompositeFrame::Tracking {
                    background: self.last_frame.as_ref(),
                    overlay,
                    tracking: projection.is_some(),
                    lighting: Lighting {
                        recompute: self.config.redo_lighting,
                        dynamic: self.dynamic_lighting,
                    },
                }
            }
        }
    }

    /// Apply a user command.
    pub fn handle(&mut self, control: Control) -> ControlOutcome {
        match control {
            Control::Quit => return ControlOutcome::Quit,
            Control::NextCamera => self.switch_camera(1),
            Control::PreviousCamera => self.switch_camera(-1),
            Control::ToggleDynamicLighting => {
                self.dynamic_lighting = !self.dynamic_lighting;
                log::info!("dynamic lighting {}", on_off(self.dynamic_lighting));
            }
            Control::ToggleVideoPlayback => {
                if self.overlay_video.is_none() {
                    log::warn!("no overlay video configured");
                } else {
                    let on = !self.compositor.video_playback();
                    self.compositor.set_video_playback(on);
                    log::info!("overlay video {}", on_off(on));
                }
            }
            Control::ToggleFullscreen => {
                self.fullscreen = !self.fullscreen;
                return ControlOutcome::Fullscreen(self.fullscreen);
            }
            Control::NextOverlay => {
                let index = self.compositor.selector_mut().next();
                self.log_overlay(index);
            }
            Control::ResetOverlay => {
                self.compositor.selector_mut().reset();
                self.log_overlay(0);
            }
            Control::SelectOverlay(index) => match self.compositor.selector_mut().select(index) {
                Ok(()) => self.log_overlay(index),
                Err(e) => log::warn!("{:#}", e),
            },
            Control::ShowLabel(visible) => self.compositor.set_label_visible(visible),
            Control::ToggleAugmentation => {
                self.augment = !self.augment;
                log::info!("augmentation {}", on_off(self.augment));
            }
        }
        ControlOutcome::Continue
    }

    fn switch_camera(&mut self, step: isize) {
        let last = self.cameras.len().saturating_sub(1) as isize;
        let next = (self.active_camera.index() as isize + step).clamp(0, last) as usize;
        if next != self.active_camera.index() {
            self.active_camera = CameraId(next);
            log::info!("active camera {}", self.active_camera);
        }
    }

    fn log_overlay(&self, index: usize) {
        if let Some(asset) = self.catalog.get(index) {
            log::info!("overlay {} selected: {}", index, asset.metadata.title);
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    pub fn observation_count(&self) -> u32 {
        self.calibration.observation_count
    }

    pub fn observation_threshold(&self) -> u32 {
        self.config.observation_threshold
    }

    /// Number of times the solver has been invoked.
    pub fn solve_attempts(&self) -> u32 {
        self.solve_attempts
    }

    pub fn accumulator(&self) -> &HomographyAccumulator {
        &self.accumulator
    }

    pub fn cameras(&self) -> &[CameraInfo] {
        &self.cameras
    }

    pub fn active_camera(&self) -> CameraId {
        self.active_camera
    }

    pub fn pose(&self, camera: CameraId) -> Option<&Pose> {
        self.stabilizer.pose(camera)
    }

    /// Stabiliser outcome of the latest tracking frame.
    pub fn last_stabilized(&self) -> Option<&Stabilized> {
        self.last_stabilized.as_ref()
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn augmenting(&self) -> bool {
        self.augment
    }

    pub fn dynamic_lighting(&self) -> bool {
        self.dynamic_lighting
    }

    pub fn source_healthy(&self) -> bool {
        self.source.is_healthy()
    }

    pub fn capture_stats(&self) -> Option<CaptureStats> {
        self.source.stats()
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
