//! cp command - Copy a file or directory tree between endpoints
//!
//! Data is streamed slice by slice from the source straight into the
//! destination; nothing is staged on local disk. Ctrl-C stops the copy after
//! the slice in flight and leaves the destination upload uncommitted.

use clap::Args;
use ds_core::{Action, Outcome, ResolvedRequest, Stat, TransferRequest, TreeReport};
use serde::Serialize;

use super::{Context, InterruptGuard};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Copy a file or directory tree
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source path (endpoint/path or a full URI)
    pub source: String,

    /// Destination path; a trailing `/` copies a file into that directory
    pub target: String,

    /// Levels of sub-directories to descend into when copying a directory
    #[arg(short, long, default_value = "0")]
    pub depth: u32,

    /// Bytes read from the source per slice (default from config, 4 MiB)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub slice_size: Option<u64>,
}

#[derive(Debug, Serialize)]
struct CpOutput {
    status: &'static str,
    source: String,
    target: String,
    files: u64,
    directories: u64,
    size_bytes: u64,
    size_human: String,
}

impl CpOutput {
    fn new(source: &str, target: &str, report: &TreeReport) -> Self {
        Self {
            status: "success",
            source: source.to_string(),
            target: target.to_string(),
            files: report.files,
            directories: report.directories,
            size_bytes: report.bytes,
            size_human: humansize::format_size(report.bytes, humansize::BINARY),
        }
    }
}

/// Bind source and target, sharing one session when both sit on the same base
fn resolve(args: &CpArgs, ctx: &Context) -> ds_core::Result<ResolvedRequest> {
    let request = TransferRequest::new(Action::Transfer, ctx.descriptor(&args.source)?)
        .with_dest(ctx.descriptor(&args.target)?)
        .with_depth(args.depth);
    request.resolve(&ctx.registry)
}

/// Progress display sized from the source metadata
fn progress_for(stat: &Stat, output_config: &OutputConfig) -> ProgressBar {
    if stat.is_file() {
        ProgressBar::new(output_config, stat.size)
    } else {
        ProgressBar::spinner(output_config, &format!("copying {}", stat.name))
    }
}

/// Execute the cp command
pub async fn execute(args: CpArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let mut request = match resolve(&args, ctx) {
        Ok(r) => r,
        Err(e) => return formatter.fail("Invalid copy arguments", &e),
    };

    let stat = match request.source.stat().await {
        Ok(s) => s,
        Err(e) => return formatter.fail(&format!("Cannot read {}", args.source), &e),
    };

    if stat.is_file() && args.target.ends_with('/') {
        request.destination = request
            .destination
            .map(|dest| dest.select(request.source.path().name()));
    }

    let progress = progress_for(&stat, &output_config);
    let engine = ctx.engine(args.slice_size, &progress);
    let _interrupt = InterruptGuard::new(engine.cancellation_token());

    let result = request.execute(&engine).await;
    progress.finish_and_clear();

    match result {
        Ok(Outcome::Transferred { report }) => {
            let output = CpOutput::new(&args.source, &args.target, &report);
            if formatter.is_json() {
                formatter.json(&output);
            } else if stat.is_file() {
                formatter.println(&format!(
                    "{} -> {} ({})",
                    args.source, args.target, output.size_human
                ));
            } else {
                formatter.println(&format!(
                    "{} -> {}: {} files in {} directories ({})",
                    args.source,
                    args.target,
                    report.files,
                    report.directories,
                    output.size_human
                ));
            }
            ExitCode::Success
        }
        Ok(other) => {
            tracing::error!(?other, "copy produced an unexpected outcome");
            ExitCode::GeneralError
        }
        Err(e) => formatter.fail(&format!("Failed to copy {}", args.source), &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cp_output() {
        let report = TreeReport {
            files: 3,
            directories: 2,
            bytes: 3 * 1024,
        };
        let output = CpOutput::new("src/in", "dst/out", &report);
        insta::assert_json_snapshot!(output, @r#"
        {
          "status": "success",
          "source": "src/in",
          "target": "dst/out",
          "files": 3,
          "directories": 2,
          "size_bytes": 3072,
          "size_human": "3 KiB"
        }
        "#);
    }

    #[test]
    fn test_progress_follows_source_kind() {
        let quiet = OutputConfig {
            quiet: true,
            ..Default::default()
        };
        assert!(!progress_for(&Stat::file("a", 10, 0), &quiet).is_visible());
        assert!(progress_for(&Stat::file("a", 10, 0), &OutputConfig::default()).is_visible());
        assert!(progress_for(&Stat::directory("d", 0), &OutputConfig::default()).is_visible());
    }
}
