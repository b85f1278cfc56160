//! Human-readable and JSON output
//!
//! Results go to stdout, diagnostics to stderr. In JSON mode stdout carries
//! exactly one JSON document per command and errors are JSON objects too.

use serde::Serialize;

use super::OutputConfig;
use crate::exit_code::ExitCode;

const GREEN: &str = "32";
const RED: &str = "31";

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes_transferred: Option<u64>,
}

/// Writes command output according to an [`OutputConfig`]
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    /// ANSI colors only for humans, and only when not disabled
    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    fn mark(&self, symbol: &str, color: &str) -> String {
        if self.colors_enabled() {
            format!("\x1b[{color}m{symbol}\x1b[0m")
        } else {
            symbol.to_string()
        }
    }

    /// Confirmation line; silent in quiet and JSON mode
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        println!("{} {message}", self.mark("✓", GREEN));
    }

    /// Errors are printed even in quiet mode
    pub fn error(&self, message: &str) {
        self.report(message, None, None);
    }

    /// Report a library error and pick the matching exit code
    pub fn fail(&self, context: &str, error: &ds_core::Error) -> ExitCode {
        let code = ExitCode::from(error);
        let bytes = error.bytes_transferred().filter(|b| *b > 0);
        let message = match bytes {
            Some(bytes) => format!(
                "{context}: {error} ({} written, destination left uncommitted)",
                humansize::format_size(bytes, humansize::BINARY)
            ),
            None => format!("{context}: {error}"),
        };
        self.report(&message, Some(code.as_i32()), bytes);
        code
    }

    fn report(&self, message: &str, code: Option<i32>, bytes_transferred: Option<u64>) {
        if self.config.json {
            let output = ErrorOutput {
                error: message,
                code,
                bytes_transferred,
            };
            match serde_json::to_string_pretty(&output) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{message}"),
            }
        } else {
            eprintln!("{} {message}", self.mark("✗", RED));
        }
    }

    /// Print a value as pretty JSON on stdout
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text unless quiet
    pub fn println(&self, message: &str) {
        if !self.config.quiet {
            println!("{message}");
        }
    }
}
