#![forbid(unsafe_code)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::Config;

pub mod bootstrap;
pub mod compile;

pub use compile::CompileArgs;

#[derive(Debug, Parser)]
#[command(name = "tcore", about = "theCore framework CLI", version)]
pub struct Cli {
    /// Logging filter (TCORE_LOG takes precedence)
    #[arg(long = "log", default_value = "info", global = true)]
    pub verbosity: String,

    /// Emit machine-readable JSON output where applicable
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Installs theCore development environment
    Bootstrap(bootstrap::BootstrapArgs),
    /// Deletes theCore development environment
    Purge,
    /// Initialize project based on theCore
    Init(InitArgs),
    /// Build project
    Compile(CompileArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct InitArgs {
    /// Git remote to download project from
    #[arg(short, long, value_name = "URL")]
    pub remote: Option<String>,
}

/// Resolve the logging filter to use for telemetry initialisation.
pub fn resolve_env_filter(cli: &Cli) -> String {
    std::env::var("TCORE_LOG").unwrap_or_else(|_| cli.verbosity.clone())
}

/// Execute the CLI using a pre-parsed argument set.
pub fn run_with_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Bootstrap(args) => bootstrap::handle(args, &Config::from_env()?, cli.json)?,
        Command::Compile(args) => compile::handle(args, &Config::from_env()?, cli.json)?,
        Command::Purge => warn!("purge is not implemented yet"),
        Command::Init(args) => {
            warn!(remote = ?args.remote, "init is not implemented yet")
        }
    }

    Ok(())
}
