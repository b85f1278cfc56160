//! ds - move data between storage backends
//!
//! Local directories, S3 buckets and HTTP(S) servers are addressed through
//! named endpoints and copied slice by slice.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use datashare_cli::commands::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --debug wins over RUST_LOG; logs go to stderr so JSON on stdout stays clean
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let exit_code = commands::execute(cli).await;

    std::process::exit(exit_code.as_i32());
}
