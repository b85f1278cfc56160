//! mkdir command - Create a directory and any missing parents

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Create a directory
#[derive(Args, Debug)]
pub struct MkdirArgs {
    /// Directory path (endpoint/path or a full URI)
    pub path: String,
}

#[derive(Debug, Serialize)]
struct MkdirOutput {
    status: &'static str,
    path: String,
}

/// Execute the mkdir command
pub async fn execute(args: MkdirArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let resource = match ctx.resolve(&args.path) {
        Ok(r) => r,
        Err(e) => return formatter.fail(&format!("Invalid path '{}'", args.path), &e),
    };

    match resource.mkdir().await {
        Ok(created) => {
            if formatter.is_json() {
                formatter.json(&MkdirOutput {
                    status: "success",
                    path: created.path().to_string(),
                });
            } else {
                formatter.success(&format!("Created {}", args.path));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&format!("Failed to create {}", args.path), &e),
    }
}
