//! Progress bar for the download pipeline.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use ltex_core::ProgressSink;

/// Resolution of the bar; fractions are mapped onto `0..=STEPS`.
const STEPS: u64 = 1000;

const TICK_INTERVAL_MS: u64 = 80;

/// Renders [`ProgressSink`] updates as an indicatif bar on stderr.
pub struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(STEPS))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/dim}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸━");
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressSink for ProgressBarSink {
    fn report(&self, fraction: f64, message: &str) {
        if self.bar.position() == 0 && !self.bar.is_finished() {
            self.bar
                .enable_steady_tick(Duration::from_millis(TICK_INTERVAL_MS));
        }

        self.bar.set_position(to_steps(fraction));
        self.bar.set_message(message.to_string());

        if fraction >= 1.0 {
            self.bar.finish_and_clear();
        }
    }
}

fn to_steps(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * STEPS as f64).round() as u64
}
