use crate::error::{CliError, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};

/// Progress bar for loops with a known number of steps, drawn on stderr.
pub struct CliProgressBar {
    pb: ProgressBar,
}

impl CliProgressBar {
    pub fn new(total_steps: u64, message: &str) -> Result<Self> {
        let pb = ProgressBar::new(total_steps)
            .with_style(Self::bar_style()?)
            .with_message(message.to_string());
        pb.set_draw_target(ProgressDrawTarget::stderr());
        Ok(Self { pb })
    }

    /// A bar that tracks progress without drawing anything.
    pub fn hidden(total_steps: u64) -> Self {
        let pb = ProgressBar::hidden();
        pb.set_length(total_steps);
        Self { pb }
    }

    pub fn inc(&self) {
        self.pb.inc(1);
    }

    pub fn position(&self) -> u64 {
        self.pb.position()
    }

    pub fn finish(&self) {
        if let Some(length) = self.pb.length() {
            self.pb.set_position(length);
        }
        self.pb.finish_with_message("✓ Done");
    }

    pub fn is_finished(&self) -> bool {
        self.pb.is_finished()
    }

    fn bar_style() -> Result<ProgressStyle> {
        Ok(
            ProgressStyle::with_template("{msg:<20} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .map_err(|e| CliError::Other(e.into()))?
                .with_key(
                    "eta",
                    |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                        let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                    },
                )
                .progress_chars("##-"),
        )
    }
}
