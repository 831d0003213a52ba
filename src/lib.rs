//! Artvertiser
//!
//! Replaces a flat physical marker (a billboard, a poster) seen live through
//! one or more cameras with a substitute image, video frame or label.
//!
//! # Architecture
//!
//! A run has two phases, driven by [`phase::Session`]:
//!
//! 1. **Calibrating**: every camera is captured and searched for the marker
//!    each frame. Frames in which at least one camera saw the marker are
//!    accumulated until a threshold is reached, then the camera geometry is
//!    solved and persisted as a pair of artifacts.
//! 2. **Calibrated**: the active camera's per-frame pose is estimated from the
//!    detected homography and stabilised by a motion gate, and the compositor
//!    produces the parameters for drawing the selected overlay onto the ROI.
//!
//! A persisted calibration found at startup skips straight to phase 2.
//!
//! # Module Structure
//!
//! - `geometry`: points, homographies, 3x4 projection matrices, intrinsics
//! - `frame`: camera descriptors and captured frames
//! - `ingest`: frame sources (synthetic scenes, still-image sequences)
//! - `detect`: marker detectors
//! - `calib`: observation accumulation, solving, artifact persistence
//! - `pose`, `stabilize`: raw pose estimation and motion-gated smoothing
//! - `catalog`, `roi`, `composite`: overlay assets, target quad, draw parameters
//! - `controls`, `render`, `phase`: user input, drawing seam, the session

pub mod calib;
pub mod catalog;
pub mod composite;
pub mod config;
pub mod controls;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod phase;
pub mod pose;
pub mod render;
pub mod roi;
pub mod stabilize;

pub use calib::{ArtifactStore, CalibrationResult, CalibrationSolver, NominalSolver, SolverParams};
pub use catalog::{OverlayCatalog, OverlayMetadata, OverlaySelector};
pub use composite::{CompositeFrame, Compositor, DrawParams, FadeWeight};
pub use config::ArtvertiserConfig;
pub use controls::{Control, ControlOutcome, MouseButton};
pub use detect::{FeatureDetector, MarkerDetection, ScriptedDetector, StubDetector};
pub use frame::{CameraId, CameraInfo, Frame};
pub use geometry::{Homography, Intrinsics, Mat3x4, Point2};
pub use ingest::{CaptureConfig, CaptureSource, FrameSource};
pub use phase::{Collaborators, Phase, Session, SessionConfig};
pub use pose::{PlanarPoseEstimator, PoseEstimator};
pub use render::{LogRenderer, Renderer};
pub use roi::Roi;
pub use stabilize::{MotionGate, PoseStabilizer, StabilizerConfig};
