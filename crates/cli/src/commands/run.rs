//! run command - Execute a JSON transfer request
//!
//! The request names the action, the source and optionally a destination,
//! each as a URI plus credential. See `ds_core::request` for the format.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use ds_core::{Outcome, TransferRequest};

use super::{Context, InterruptGuard};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Execute a JSON transfer request
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Request file (`-` reads standard input)
    pub request: PathBuf,

    /// Bytes read from the source per slice (default from config, 4 MiB)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub slice_size: Option<u64>,
}

fn load_request(path: &Path) -> anyhow::Result<TransferRequest> {
    let json = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("failed to read request from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request file {}", path.display()))?
    };

    TransferRequest::from_json(&json)
        .with_context(|| format!("{} is not a valid transfer request", path.display()))
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Listed { names } => names.join("\n"),
        Outcome::Stat { stat } => format!(
            "{} ({}, {})",
            stat.name,
            if stat.is_dir() { "directory" } else { "file" },
            stat.size_human()
        ),
        Outcome::Created { path } => format!("Created {path}"),
        Outcome::Deleted { path } => format!("Deleted {path}"),
        Outcome::Transferred { report } => format!(
            "Transferred {} files in {} directories ({})",
            report.files,
            report.directories,
            humansize::format_size(report.bytes, humansize::BINARY)
        ),
    }
}

/// Execute the run command
pub async fn execute(args: RunArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let request = match load_request(&args.request) {
        Ok(r) => r,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::UsageError;
        }
    };
    tracing::debug!(action = ?request.action, src = %request.src.uri, "loaded request");

    let resolved = match request.resolve(&ctx.registry) {
        Ok(r) => r,
        Err(e) => return formatter.fail("Invalid request", &e),
    };

    let progress = ProgressBar::spinner(&output_config, "running request");
    let engine = ctx.engine(args.slice_size, &progress);
    let _interrupt = InterruptGuard::new(engine.cancellation_token());

    let result = resolved.execute(&engine).await;
    progress.finish_and_clear();

    match result {
        Ok(outcome) => {
            if formatter.is_json() {
                formatter.json(&outcome);
            } else {
                formatter.println(&describe(&outcome));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail("Request failed", &e),
    }
}
