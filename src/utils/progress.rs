//! Progress indicators for slow external calls.
//!
//! Discovery, export and decompilation can take a while against a live
//! environment. A spinner shows which stage is running. It is hidden when
//! disabled by the caller (`--no-progress`), when `RGCLONE_NO_PROGRESS` is
//! set, or when stderr is not a terminal, so logs and piped output stay clean.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// Environment variable that disables progress output.
pub const NO_PROGRESS_ENV: &str = "RGCLONE_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some() || !std::io::stderr().is_terminal()
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
}

/// A spinner with rgclone styling.
///
/// ```rust,no_run
/// use rgclone::utils::progress::ProgressBar;
///
/// let spinner = ProgressBar::new_spinner(true);
/// spinner.set_message("Decompiling");
/// spinner.finish_and_clear();
/// ```
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// A ticking spinner, or a hidden one when `enabled` is false or progress
    /// is disabled for this process.
    pub fn new_spinner(enabled: bool) -> Self {
        let bar = if !enabled || is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// A spinner that never draws.
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Whether the spinner draws nothing.
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_spinner_is_hidden() {
        let spinner = ProgressBar::new_spinner(false);
        assert!(spinner.is_hidden());
        spinner.set_message("Decompiling");
        spinner.finish_and_clear();
    }

    #[test]
    fn test_hidden_spinner() {
        assert!(ProgressBar::hidden().is_hidden());
    }
}
