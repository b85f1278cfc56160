//! rm command - Remove a file or a directory tree

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Remove a file or a directory tree
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Path (endpoint/path or a full URI)
    pub path: String,

    /// Remove directories and everything below them
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    path: String,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let resource = match ctx.resolve(&args.path) {
        Ok(r) => r,
        Err(e) => return formatter.fail(&format!("Invalid path '{}'", args.path), &e),
    };

    if !args.recursive {
        match resource.stat().await {
            Ok(stat) if stat.is_dir() => {
                formatter.error(&format!(
                    "{} is a directory, use --recursive to remove it",
                    args.path
                ));
                return ExitCode::UsageError;
            }
            Ok(_) => {}
            Err(e) => return formatter.fail(&format!("Failed to remove {}", args.path), &e),
        }
    }

    match resource.delete().await {
        Ok(removed) => {
            tracing::debug!(resource = %removed, "removed");
            if formatter.is_json() {
                formatter.json(&RmOutput {
                    status: "success",
                    path: args.path,
                });
            } else {
                formatter.success(&format!("Removed {}", args.path));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&format!("Failed to remove {}", args.path), &e),
    }
}
