use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Startup stages and calibration progress on stderr.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Bar counting calibration observations up to `threshold`.
    pub fn calibration_progress(&self, threshold: u32) -> CalibrationProgress {
        let bar = self.pretty().then(|| {
            let bar = ProgressBar::new(threshold as u64);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("calibrating [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        });
        CalibrationProgress {
            bar,
            threshold,
            last: 0,
        }
    }
}

pub struct CalibrationProgress {
    bar: Option<ProgressBar>,
    threshold: u32,
    last: u32,
}

impl CalibrationProgress {
    /// Report the current observation count. Plain mode prints every tenth.
    pub fn update(&mut self, observations: u32) {
        if observations == self.last {
            return;
        }
        self.last = observations;
        match &self.bar {
            Some(bar) => bar.set_position(observations.min(self.threshold) as u64),
            None if observations % 10 == 0 || observations == self.threshold => {
                eprintln!("calibrating {}/{}", observations, self.threshold);
            }
            None => {}
        }
    }

    /// Note a solve attempt that did not converge.
    pub fn retrying(&self, attempts: u32) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("solver attempt {attempts}"));
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message("✔ solved");
        } else {
            eprintln!("✔ calibration solved");
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_never_draws() {
        let ui = Ui::from_args(Some("plain"), true);
        assert!(!ui.pretty());
        assert!(ui.calibration_progress(150).bar.is_none());
        assert!(Ui::from_args(None, true).pretty());
        assert!(!Ui::from_args(Some("pretty"), false).pretty());
    }

    #[test]
    fn durations_format_by_magnitude() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
