//! stat command - Show metadata of a file or directory

use clap::Args;
use ds_core::{EntryKind, Stat};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show metadata of a file or directory
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Path (endpoint/path or a full URI)
    pub path: String,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    name: String,
    kind: EntryKind,
    size_bytes: u64,
    size_human: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entries: Option<usize>,
}

impl From<&Stat> for StatOutput {
    fn from(stat: &Stat) -> Self {
        Self {
            name: stat.name.clone(),
            kind: stat.kind,
            size_bytes: stat.size,
            size_human: stat.size_human(),
            last_modified: stat
                .modified()
                .filter(|_| stat.time > 0)
                .map(|t| t.to_string()),
            entries: stat.children.as_ref().map(Vec::len),
        }
    }
}

/// Execute the stat command
pub async fn execute(args: StatArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let resource = match ctx.resolve(&args.path) {
        Ok(r) => r,
        Err(e) => return formatter.fail(&format!("Invalid path '{}'", args.path), &e),
    };

    let stat = match resource.stat().await {
        Ok(s) => s,
        Err(e) => return formatter.fail(&format!("Failed to stat {}", args.path), &e),
    };

    let output = StatOutput::from(&stat);
    if formatter.is_json() {
        formatter.json(&output);
    } else {
        formatter.println(&format!("Name      : {}", output.name));
        formatter.println(&format!(
            "Type      : {}",
            if stat.is_dir() { "directory" } else { "file" }
        ));
        if let Some(modified) = &output.last_modified {
            formatter.println(&format!("Date      : {modified}"));
        }
        if stat.is_file() {
            formatter.println(&format!(
                "Size      : {} ({} bytes)",
                output.size_human, output.size_bytes
            ));
        }
        if let Some(entries) = output.entries {
            formatter.println(&format!("Entries   : {entries}"));
        }
    }
    ExitCode::Success
}
