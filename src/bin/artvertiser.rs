//! artvertiser - live marker replacement
//!
//! This program:
//! 1. Loads the model image, its ROI and the overlay catalog
//! 2. Opens the capture source and the marker detector
//! 3. Calibrates the camera geometry (or loads the cached calibration)
//! 4. Tracks the marker and hands stabilised draw parameters to the renderer
//!
//! Controls are read from stdin, one line at a time (`+ - q d a f i n 0-9`,
//! `label`/`unlabel`).

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use artvertiser::roi::roi_path;
use artvertiser::{
    ArtvertiserConfig, CaptureSource, Collaborators, Control, ControlOutcome, FrameSource,
    LogRenderer, NominalSolver, OverlayCatalog, Phase, PlanarPoseEstimator, Renderer, Roi,
    Session, StubDetector,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Model image of the marker (its ROI is read from `<model>.roi`).
    #[arg(short = 'm', long, env = "ARTVERT_MODEL")]
    model: Option<PathBuf>,
    /// Redo geometry, lighting and training.
    #[arg(short = 'r', long)]
    redo_all: bool,
    /// Redo geometric calibration.
    #[arg(short = 'g', long)]
    redo_geometry: bool,
    /// Redo lighting calibration.
    #[arg(short = 'l', long)]
    redo_lighting: bool,
    /// Retrain the detector.
    #[arg(short = 't', long)]
    redo_training: bool,
    /// Image sequence played as the overlay video.
    #[arg(short = 'a', long, value_name = "SOURCE")]
    overlay_video: Option<String>,
    /// Capture source (`stub://name` or a directory of frames).
    #[arg(short = 'b', long, value_name = "SOURCE")]
    capture: Option<String>,
    /// Single overlay image replacing the catalog.
    #[arg(short = 'i', long, value_name = "PATH")]
    image: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

impl Args {
    fn apply(&self, cfg: &mut ArtvertiserConfig) {
        if let Some(model) = &self.model {
            cfg.model_path = model.clone();
        }
        if let Some(capture) = &self.capture {
            cfg.capture.url = capture.clone();
        }
        if let Some(video) = &self.overlay_video {
            cfg.overlays.video = Some(video.clone());
        }
        if self.redo_all || self.redo_geometry {
            cfg.calibration.use_cache = false;
        }
        if self.redo_all || self.redo_lighting {
            cfg.redo_lighting = true;
        }
        if self.redo_all || self.redo_training {
            cfg.retrain = true;
        }
    }
}

enum Event {
    Control(Control),
    Interrupt,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let mut cfg = ArtvertiserConfig::load()?;
    args.apply(&mut cfg);

    let model_size = {
        let _stage = ui.stage("Load model");
        image::image_dimensions(&cfg.model_path)
            .with_context(|| format!("failed to load model image {}", cfg.model_path.display()))?
    };
    let roi = Roi::load(&roi_path(&cfg.model_path))?;
    let catalog = {
        let _stage = ui.stage("Load overlays");
        match (&args.image, &cfg.overlays.manifest) {
            (Some(image), _) => OverlayCatalog::single(image)?,
            (None, Some(manifest)) => OverlayCatalog::from_manifest(manifest)?,
            (None, None) => OverlayCatalog::default_set(&cfg.overlays.dir)?,
        }
    };

    let mut session = {
        let _stage = ui.stage("Open capture");
        let source = CaptureSource::new(cfg.capture_config())?;
        let overlay_video = cfg
            .overlay_video_config()
            .map(CaptureSource::new)
            .transpose()?
            .map(|source| Box::new(source) as Box<dyn FrameSource>);
        let collaborators = Collaborators {
            source: Box::new(source),
            detector: Box::new(StubDetector::new(model_size.0, model_size.1).retrain(cfg.retrain)),
            solver: Box::new(NominalSolver::default()),
            estimator: Box::new(PlanarPoseEstimator::default()),
            overlay_video,
        };
        Session::start(
            cfg.session_config(model_size),
            collaborators,
            catalog,
            roi,
            cfg.artifact_store(),
        )?
    };

    let events = spawn_event_sources()?;
    let mut renderer = LogRenderer::new();
    let frame_interval = Duration::from_secs_f64(1.0 / cfg.capture.target_fps.max(1) as f64);
    let mut progress = (session.phase() == Phase::Calibrating)
        .then(|| ui.calibration_progress(session.observation_threshold()));
    let mut solve_attempts = 0;
    let mut last_health_log = Instant::now();

    log::info!(
        "artvertiser running: model={} capture={} renderer={}",
        cfg.model_path.display(),
        cfg.capture.url,
        renderer.name()
    );

    'frames: loop {
        let started = Instant::now();
        for event in events.try_iter() {
            let control = match event {
                Event::Control(control) => control,
                Event::Interrupt => Control::Quit,
            };
            match session.handle(control) {
                ControlOutcome::Continue => {}
                ControlOutcome::Fullscreen(on) => renderer.set_fullscreen(on)?,
                ControlOutcome::Quit => break 'frames,
            }
        }

        session.advance()?;

        if let Some(bar) = progress.as_mut() {
            bar.update(session.observation_count());
            if session.solve_attempts() != solve_attempts {
                solve_attempts = session.solve_attempts();
                bar.retrying(solve_attempts);
            }
            if session.phase() == Phase::Calibrated {
                bar.finish();
            }
        }
        if session.phase() == Phase::Calibrated {
            progress = None;
        }

        renderer.present(&session.composite())?;

        if args.frames.is_some_and(|limit| session.frames() >= limit) {
            break;
        }
        if last_health_log.elapsed() >= Duration::from_secs(5) {
            match session.capture_stats() {
                Some(stats) => log::info!(
                    "capture health={} frames_captured={} url={} phase={}",
                    session.source_healthy(),
                    stats.frames_captured,
                    stats.url,
                    session.phase()
                ),
                None => log::info!(
                    "capture health={} frames={} phase={}",
                    session.source_healthy(),
                    session.frames(),
                    session.phase()
                ),
            }
            last_health_log = Instant::now();
        }
        if let Some(rest) = frame_interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    log::info!(
        "stopped after {} frames ({} tracked), phase={}",
        session.frames(),
        renderer.tracked(),
        session.phase()
    );
    Ok(())
}

/// Ctrl-C and stdin controls, merged into one channel.
fn spawn_event_sources() -> Result<mpsc::Receiver<Event>> {
    let (tx, rx) = mpsc::channel();

    let interrupt = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt.send(Event::Interrupt);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            for control in Control::parse_line(&line) {
                if tx.send(Event::Control(control)).is_err() {
                    return;
                }
            }
        }
    });
    Ok(rx)
}
