//! CLI entry point for grant.

pub mod auth;
pub mod clone;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::auth::FlowKind;
use crate::config::GrantConfig;

/// grant is a command line tool for testing the OAuth device authorization grant.
#[derive(Parser, Debug)]
#[command(
    name = "grant",
    version,
    about = "grant is a command line tool for testing the OAuth device authorization grant"
)]
pub struct Cli {
    #[command(flatten)]
    pub flow: FlowArgs,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Without a subcommand, run the flow and report the outcome
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags selecting the client and provider. Unset flags fall back to
/// `GRANT_*` environment variables.
#[derive(Args, Debug, Clone, Default)]
pub struct FlowArgs {
    /// Client ID used for the flow
    #[arg(short = 'c', long = "client-id", visible_alias = "client_id", global = true)]
    pub client_id: Option<String>,

    /// Issuer base URL (required for the oidc flow)
    #[arg(long, global = true)]
    pub issuer: Option<String>,

    /// Flow to run: github or oidc
    #[arg(long, global = true)]
    pub flow: Option<FlowKind>,

    /// Scope to request instead of the flow default
    #[arg(long, global = true)]
    pub scope: Option<String>,

    /// Directory holding cached tokens
    #[arg(long, global = true)]
    pub token_dir: Option<PathBuf>,

    /// Stop polling once the device code lifetime has elapsed locally
    #[arg(long, global = true)]
    pub client_deadline: bool,
}

impl FlowArgs {
    /// Layer these flags over `config`.
    pub fn apply(self, mut config: GrantConfig) -> GrantConfig {
        if let Some(client_id) = self.client_id {
            config.client_id = client_id;
        }
        if let Some(issuer) = self.issuer {
            config.issuer = Some(issuer);
            if self.flow.is_none() {
                config.flow = FlowKind::Oidc;
            }
        }
        if let Some(flow) = self.flow {
            config.flow = flow;
        }
        if let Some(scope) = self.scope {
            config.scope = Some(scope);
        }
        if let Some(dir) = self.token_dir {
            config.token_dir = Some(dir);
        }
        if self.client_deadline {
            config.client_deadline = true;
        }
        config
    }
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clone a repository without history using the access token
    Clone(CloneArgs),
    /// Show the cached token for the configured client
    Status,
    /// Remove the cached token for the configured client
    Logout,
}

/// Arguments for `grant clone`.
#[derive(Parser, Debug)]
pub struct CloneArgs {
    /// HTTPS URL of the repository to clone
    pub repository_url: String,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "grant=debug" } else { "grant=warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
