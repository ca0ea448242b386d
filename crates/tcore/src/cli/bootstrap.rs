#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::bootstrap::{BootstrapReport, Bootstrapper};
use crate::config::Config;
use crate::fetch::HttpFetcher;
use crate::shell::SystemShell;

#[derive(Debug, Clone, Parser)]
pub struct BootstrapArgs {
    /// Force (re)install theCore dev environment
    #[arg(short, long)]
    pub force: bool,
}

pub fn handle(args: BootstrapArgs, config: &Config, json: bool) -> Result<()> {
    info!(install_dir = %config.install_dir.display(), force = args.force, "bootstrapping theCore");

    let shell = SystemShell::new(config);
    let report = Bootstrapper::new(config, &shell, &HttpFetcher)
        .run(args.force)
        .context("bootstrap failed")?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print_human(&report, config);
    }

    Ok(())
}

fn print_human(report: &BootstrapReport, config: &Config) {
    println!(
        "theCore development environment ready\n  nix installed: {}\n  sources fetched: {}\n  sources: {}",
        yes_no(report.package_manager_installed),
        yes_no(report.sources_fetched),
        config.core_src_dir.display()
    );
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no (already present)" }
}
