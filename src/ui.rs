use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

/// Terminal feedback for the `recognize` CLI. Falls back to plain stderr
/// lines when stderr is not a terminal.
#[derive(Clone, Copy, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    pub fn new(stderr_is_tty: bool, plain: bool) -> Self {
        Self {
            pretty: stderr_is_tty && !plain,
        }
    }

    /// Spinner for a one-shot step such as loading the model.
    pub fn stage(&self, name: &str) -> StageGuard {
        let spinner = self.pretty.then(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message(format!("{name}…"));
            spinner
        });
        if spinner.is_none() {
            eprintln!("==> {name}");
        }
        StageGuard {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
        }
    }

    /// Bar counting processed frames up to `cap`.
    pub fn frames(&self, source: &str, cap: u32) -> FrameProgress {
        let bar = self.pretty.then(|| {
            let bar = ProgressBar::new(u64::from(cap));
            bar.set_draw_target(ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template("{bar:30} {pos}/{len} frames {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_message(source.to_string());
            bar
        });
        FrameProgress {
            bar,
            detections: 0,
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_duration(self.start.elapsed()));
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

pub struct FrameProgress {
    bar: Option<ProgressBar>,
    detections: usize,
}

impl FrameProgress {
    pub fn frame_done(&mut self, index: u32, detections: usize) {
        self.detections += detections;
        match &self.bar {
            Some(bar) => bar.set_position(u64::from(index)),
            None => eprintln!("frame {index}: {detections} detections"),
        }
    }
}

impl Drop for FrameProgress {
    fn drop(&mut self) {
        let message = format!("{} detections", self.detections);
        match &self.bar {
            Some(bar) => bar.finish_with_message(message),
            None => eprintln!("{message}"),
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
