//! Endpoint management commands
//!
//! Endpoints are named storage locations: a base URI plus the credential
//! used to open sessions against it.

use clap::Subcommand;
use ds_core::{Credential, Endpoint};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Endpoint subcommands
#[derive(Subcommand, Debug)]
pub enum EndpointCommands {
    /// Add or update an endpoint
    Set(SetArgs),

    /// List all configured endpoints
    List(ListArgs),

    /// Remove an endpoint
    Remove(RemoveArgs),
}

/// Arguments for the `endpoint set` command
#[derive(clap::Args, Debug, Default)]
pub struct SetArgs {
    /// Endpoint name (e.g., "archive", "scratch")
    pub name: String,

    /// Base URI (e.g., "s3://bucket?region=eu-west-1", "file:///srv/data", "https://host/files")
    pub uri: String,

    /// Access key ID (S3)
    #[arg(long, requires = "secret_key", conflicts_with_all = ["token", "username"])]
    pub access_key: Option<String>,

    /// Secret access key (S3)
    #[arg(long, requires = "access_key")]
    pub secret_key: Option<String>,

    /// Bearer token (HTTP)
    #[arg(long, conflicts_with = "username")]
    pub token: Option<String>,

    /// Username for basic authentication (HTTP)
    #[arg(long, requires = "password")]
    pub username: Option<String>,

    /// Password for basic authentication (HTTP)
    #[arg(long, requires = "username")]
    pub password: Option<String>,
}

impl SetArgs {
    /// Credential described by the flags; anonymous when none are given
    fn credential(&self) -> Credential {
        match (
            &self.access_key,
            &self.secret_key,
            &self.token,
            &self.username,
            &self.password,
        ) {
            (Some(access), Some(secret), ..) => Credential::key_pair(access, secret),
            (_, _, Some(token), ..) => Credential::oauth(token),
            (.., Some(username), Some(password)) => Credential::user_password(username, password),
            _ => Credential::Anonymous,
        }
    }
}

/// Arguments for the `endpoint list` command
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show the credential type of each endpoint
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for the `endpoint remove` command
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the endpoint to remove
    pub name: String,
}

#[derive(Serialize)]
struct EndpointListOutput {
    endpoints: Vec<EndpointInfo>,
}

/// Endpoint information for output, without secrets
#[derive(Debug, Serialize)]
struct EndpointInfo {
    name: String,
    uri: String,
    credential: String,
}

impl From<&Endpoint> for EndpointInfo {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            name: endpoint.name.clone(),
            uri: endpoint.uri.clone(),
            credential: endpoint.credential.kind().to_string(),
        }
    }
}

#[derive(Serialize)]
struct EndpointOperationOutput {
    success: bool,
    endpoint: String,
    message: String,
}

/// Execute an endpoint subcommand
pub async fn execute(cmd: EndpointCommands, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    match cmd {
        EndpointCommands::Set(args) => execute_set(args, ctx, &formatter),
        EndpointCommands::List(args) => execute_list(args, ctx, &formatter),
        EndpointCommands::Remove(args) => execute_remove(args, ctx, &formatter),
    }
}

fn execute_set(args: SetArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let endpoint = Endpoint::new(&args.name, &args.uri, args.credential());

    if let Err(e) = ctx.registry.connector(url_scheme(&args.uri)) {
        return formatter.fail(&format!("Cannot use '{}'", args.uri), &e);
    }

    match ctx.endpoints.set(endpoint) {
        Ok(()) => {
            let message = format!("Endpoint '{}' configured successfully", args.name);
            if formatter.is_json() {
                formatter.json(&EndpointOperationOutput {
                    success: true,
                    endpoint: args.name,
                    message,
                });
            } else {
                formatter.success(&message);
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail("Failed to save endpoint", &e),
    }
}

fn url_scheme(uri: &str) -> &str {
    uri.split_once("://").map(|(scheme, _)| scheme).unwrap_or(uri)
}

fn execute_list(args: ListArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let endpoints = match ctx.endpoints.list() {
        Ok(endpoints) => endpoints,
        Err(e) => return formatter.fail("Failed to load endpoints", &e),
    };

    if formatter.is_json() {
        formatter.json(&EndpointListOutput {
            endpoints: endpoints.iter().map(EndpointInfo::from).collect(),
        });
    } else if endpoints.is_empty() {
        formatter.println("No endpoints configured.");
    } else {
        for endpoint in &endpoints {
            if args.long {
                formatter.println(&format!(
                    "{:<12} {} ({})",
                    endpoint.name,
                    endpoint.uri,
                    endpoint.credential.kind()
                ));
            } else {
                formatter.println(&format!("{:<12} {}", endpoint.name, endpoint.uri));
            }
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    match ctx.endpoints.remove(&args.name) {
        Ok(()) => {
            let message = format!("Endpoint '{}' removed successfully", args.name);
            if formatter.is_json() {
                formatter.json(&EndpointOperationOutput {
                    success: true,
                    endpoint: args.name,
                    message,
                });
            } else {
                formatter.success(&message);
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&format!("Cannot remove endpoint '{}'", args.name), &e),
    }
}
