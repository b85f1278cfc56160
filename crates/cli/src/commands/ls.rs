//! ls command - List a directory
//!
//! Lists one level of a directory. A file argument lists just that file.

use clap::Args;
use ds_core::{EntryKind, Stat};
use futures::StreamExt;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List a directory
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Path (endpoint/path or a full URI)
    pub path: String,

    /// Print names only, as they are listed
    #[arg(short, long)]
    pub names: bool,

    /// Summarize output (show totals only)
    #[arg(long)]
    pub summarize: bool,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    items: Vec<Entry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
struct Entry {
    name: String,
    kind: EntryKind,
    size_bytes: u64,
    time: i64,
}

#[derive(Debug, Serialize)]
struct Summary {
    files: usize,
    directories: usize,
    total_size_bytes: u64,
    total_size_human: String,
}

impl From<&Stat> for Entry {
    fn from(stat: &Stat) -> Self {
        Self {
            name: stat.name.clone(),
            kind: stat.kind,
            size_bytes: stat.size,
            time: stat.time,
        }
    }
}

fn summarize(items: &[Entry]) -> Summary {
    let files = items.iter().filter(|i| i.kind == EntryKind::File).count();
    let total: u64 = items.iter().map(|i| i.size_bytes).sum();
    Summary {
        files,
        directories: items.len() - files,
        total_size_bytes: total,
        total_size_human: humansize::format_size(total, humansize::BINARY),
    }
}

fn format_line(entry: &Entry) -> String {
    let date = jiff::Timestamp::from_second(entry.time)
        .ok()
        .filter(|_| entry.time > 0)
        .map(|t| t.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| " ".repeat(19));

    match entry.kind {
        EntryKind::Directory => format!("[{date}]     0B {}/", entry.name),
        EntryKind::File => format!(
            "[{date}] {:>6} {}",
            humansize::format_size(entry.size_bytes, humansize::BINARY),
            entry.name
        ),
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let resource = match ctx.resolve(&args.path) {
        Ok(r) => r,
        Err(e) => return formatter.fail(&format!("Invalid path '{}'", args.path), &e),
    };

    if args.names && !formatter.is_json() {
        let mut names = resource.list();
        while let Some(name) = names.next().await {
            match name {
                Ok(name) => formatter.println(&name),
                Err(e) => return formatter.fail(&format!("Failed to list {}", args.path), &e),
            }
        }
        return ExitCode::Success;
    }

    let stat = match resource.stat().await {
        Ok(s) => s,
        Err(e) => return formatter.fail(&format!("Failed to list {}", args.path), &e),
    };

    let items: Vec<Entry> = match &stat.children {
        Some(children) => children.iter().map(Entry::from).collect(),
        None => vec![Entry::from(&stat)],
    };

    if formatter.is_json() {
        let summary = args.summarize.then(|| summarize(&items));
        formatter.json(&LsOutput { items, summary });
        return ExitCode::Success;
    }

    if !args.summarize {
        for item in &items {
            formatter.println(&format_line(item));
        }
    }
    if args.summarize || items.len() > 1 {
        let summary = summarize(&items);
        formatter.println(&format!(
            "\nTotal: {} files, {} directories, {}",
            summary.files, summary.directories, summary.total_size_human
        ));
    }
    ExitCode::Success
}
