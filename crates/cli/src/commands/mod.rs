//! CLI command definitions and execution
//!
//! Every command resolves its path arguments through a [`Context`]: the loaded
//! config, the endpoint table and the registry of storage backends.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use ds_core::backends::LocalConnector;
use ds_core::{
    BackendRegistry, Config, ConfigManager, Credential, EndpointManager, Resource,
    ResourceDescriptor, TransferEngine, parse_endpoint_path,
};
use ds_http::HttpConnector;
use ds_s3::S3Connector;
use tokio_util::sync::CancellationToken;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

pub mod completions;
pub mod cp;
pub mod endpoint;
pub mod ls;
pub mod mkdir;
pub mod rm;
pub mod run;
pub mod stat;

/// ds - move data between storage backends
///
/// Paths are written `endpoint/path` for configured endpoints, or as full
/// URIs such as `s3://bucket/key` and `file:///tmp/x`.
#[derive(Parser, Debug)]
#[command(name = "ds")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage named storage endpoints
    #[command(subcommand)]
    Endpoint(endpoint::EndpointCommands),

    /// List a directory
    Ls(ls::LsArgs),

    /// Show metadata of a file or directory
    Stat(stat::StatArgs),

    /// Create a directory and any missing parents
    Mkdir(mkdir::MkdirArgs),

    /// Remove a file or a directory tree
    Rm(rm::RmArgs),

    /// Copy a file or directory tree between endpoints
    Cp(cp::CpArgs),

    /// Execute a JSON transfer request
    Run(run::RunArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let flags = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    if let Commands::Completions(args) = cli.command {
        return completions::execute(args);
    }

    let ctx = match Context::load() {
        Ok(ctx) => ctx,
        Err(e) => return Formatter::new(flags).fail("Failed to load configuration", &e),
    };
    let output_config = flags.merge(&ctx.config.defaults);

    match cli.command {
        Commands::Endpoint(cmd) => endpoint::execute(cmd, &ctx, output_config).await,
        Commands::Ls(args) => ls::execute(args, &ctx, output_config).await,
        Commands::Stat(args) => stat::execute(args, &ctx, output_config).await,
        Commands::Mkdir(args) => mkdir::execute(args, &ctx, output_config).await,
        Commands::Rm(args) => rm::execute(args, &ctx, output_config).await,
        Commands::Cp(args) => cp::execute(args, &ctx, output_config).await,
        Commands::Run(args) => run::execute(args, &ctx, output_config).await,
        Commands::Completions(_) => ExitCode::Success,
    }
}

/// Every backend the binary ships with
pub fn default_registry() -> ds_core::Result<BackendRegistry> {
    Ok(BackendRegistry::new()
        .with(Arc::new(LocalConnector::new()))
        .with(Arc::new(S3Connector::new()))
        .with(Arc::new(HttpConnector::new()?)))
}

/// State shared by all commands of one invocation
pub struct Context {
    pub config: Config,
    pub endpoints: EndpointManager,
    pub registry: BackendRegistry,
}

impl Context {
    /// Load the config from the default location and register every backend
    pub fn load() -> ds_core::Result<Self> {
        let config_manager = ConfigManager::new()?;
        let config = config_manager.load()?;
        Ok(Self {
            config,
            endpoints: EndpointManager::with_config_manager(config_manager),
            registry: default_registry()?,
        })
    }

    /// Turn a path argument into a URI plus credential
    ///
    /// Full URIs are used as given, anonymously. Anything else is
    /// `endpoint/path` and takes the endpoint's base URI and credential.
    pub fn descriptor(&self, arg: &str) -> ds_core::Result<ResourceDescriptor> {
        if arg.contains("://") {
            return Ok(ResourceDescriptor::new(arg, Credential::Anonymous));
        }

        let target = parse_endpoint_path(arg)?;
        let endpoint = self.endpoints.get(&target.endpoint)?;
        let uri = endpoint.locate(target.path.as_str())?;
        tracing::debug!(argument = arg, %uri, "resolved endpoint path");
        Ok(ResourceDescriptor::new(uri, endpoint.credential))
    }

    /// Resolve a path argument into a resource on a fresh session
    pub fn resolve(&self, arg: &str) -> ds_core::Result<Resource> {
        let descriptor = self.descriptor(arg)?;
        self.registry.resolve(&descriptor.uri, descriptor.credential)
    }

    /// Transfer engine using `slice_size`, or the configured default
    pub fn engine(&self, slice_size: Option<u64>, progress: &ProgressBar) -> TransferEngine {
        let progress = progress.clone();
        TransferEngine::new(slice_size.unwrap_or(self.config.defaults.slice_size))
            .on_progress(move |bytes| progress.inc(bytes))
    }
}

/// Cancels a token on Ctrl-C until dropped
pub struct InterruptGuard {
    watcher: tokio::task::JoinHandle<()>,
}

impl InterruptGuard {
    pub fn new(token: CancellationToken) -> Self {
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, stopping after the current slice");
                token.cancel();
            }
        });
        Self { watcher }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}
