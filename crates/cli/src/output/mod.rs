//! Output formatting utilities
//!
//! Human-readable and JSON output, colors and transfer progress.

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::ProgressBar;

/// Output configuration derived from CLI flags and config defaults
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Disable progress bar
    pub no_progress: bool,
    /// Suppress non-error output
    pub quiet: bool,
}

impl OutputConfig {
    /// Merge command-line flags with the `[defaults]` table of the config file
    ///
    /// Flags can only switch features off or force JSON; they never re-enable
    /// something the config disabled.
    pub fn merge(self, defaults: &ds_core::config::Defaults) -> Self {
        Self {
            json: self.json || defaults.output == "json",
            no_color: self.no_color || defaults.color == "never",
            no_progress: self.no_progress || !defaults.progress,
            quiet: self.quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_with_defaults() {
        let defaults = ds_core::config::Defaults::default();
        let merged = OutputConfig::default().merge(&defaults);
        assert!(!merged.json);
        assert!(!merged.no_progress);

        let defaults = ds_core::config::Defaults {
            output: "json".into(),
            color: "never".into(),
            progress: false,
            ..Default::default()
        };
        let merged = OutputConfig::default().merge(&defaults);
        assert!(merged.json);
        assert!(merged.no_color);
        assert!(merged.no_progress);
    }
}
