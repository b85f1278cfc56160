//! Progress bar utilities for transfer operations
//!
//! The engine reports every committed slice through a callback; the bar is
//! cheap to clone so one handle can live inside that callback.

use super::OutputConfig;

const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} {bytes}";

/// Progress bar wrapper
///
/// Handles progress display based on output configuration.
/// In quiet or JSON mode, progress is suppressed.
#[derive(Debug, Clone)]
pub struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
}

fn hidden(config: &OutputConfig) -> bool {
    config.quiet || config.json || config.no_progress
}

impl ProgressBar {
    /// Create a new progress bar with the given total size
    pub fn new(config: &OutputConfig, total: u64) -> Self {
        if hidden(config) {
            return Self { bar: None };
        }

        let bar = indicatif::ProgressBar::new(total);
        if let Ok(style) = indicatif::ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar: Some(bar) }
    }

    /// Create a spinner for transfers of unknown total size
    pub fn spinner(config: &OutputConfig, message: &str) -> Self {
        if hidden(config) {
            return Self { bar: None };
        }

        let bar = indicatif::ProgressBar::new_spinner();
        if let Ok(style) = indicatif::ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// Increment progress
    pub fn inc(&self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Check if progress bar is visible
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_quiet_mode() {
        let config = OutputConfig {
            quiet: true,
            ..Default::default()
        };
        let bar = ProgressBar::new(&config, 100);
        assert!(!bar.is_visible());
    }

    #[test]
    fn test_progress_bar_json_mode() {
        let config = OutputConfig {
            json: true,
            ..Default::default()
        };
        assert!(!ProgressBar::new(&config, 100).is_visible());
        assert!(!ProgressBar::spinner(&config, "copying").is_visible());
    }

    #[test]
    fn test_progress_bar_no_progress() {
        let config = OutputConfig {
            no_progress: true,
            ..Default::default()
        };
        let bar = ProgressBar::new(&config, 100);
        assert!(!bar.is_visible());
    }

    #[test]
    fn test_progress_bar_normal() {
        let bar = ProgressBar::new(&OutputConfig::default(), 100);
        assert!(bar.is_visible());

        let handle = bar.clone();
        handle.inc(40);
        handle.finish_and_clear();
    }
}
