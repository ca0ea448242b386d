#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::bootstrap;
use crate::config::Config;
use crate::manifest::{self, Resolution, TargetRow};
use crate::plan::{self, BuildType};
use crate::shell::SystemShell;

#[derive(Debug, Clone, Parser)]
pub struct CompileArgs {
    /// Path to the source code. Defaults to current directory.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub source: PathBuf,

    /// Path to the build directory. Defaults to <source>/build/<target>-<buildtype>
    #[arg(short = 'b', long = "builddir", value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Build type
    #[arg(long = "buildtype", value_enum, default_value_t = BuildType::None)]
    pub build_type: BuildType,

    /// Target name to compile for
    #[arg(short, long, value_name = "NAME")]
    pub target: Option<String>,

    /// List supported targets
    #[arg(short, long)]
    pub list_targets: bool,

    /// Clean build
    #[arg(short, long)]
    pub clean: bool,

    /// Print the generator and build commands without running them
    #[arg(long)]
    pub dry_run: bool,
}

pub fn handle(args: CompileArgs, config: &Config, json: bool) -> Result<()> {
    let source_dir = manifest::normalize_source(&args.source);
    info!(path = %source_dir.display(), "using source directory");

    let project = manifest::load(&source_dir)?;
    info!(project = %project.name, "compiling project");

    let target = match manifest::resolve(&project, args.target.as_deref(), args.list_targets)? {
        Resolution::Listing(rows) => return print_listing(&rows, json),
        Resolution::Target(target) => target,
    };

    let build_plan = plan::plan(
        config,
        &source_dir,
        &target,
        args.build_dir.as_deref(),
        args.build_type,
        args.clean,
    )?;
    info!(
        target = %build_plan.target_name,
        build_dir = %build_plan.build_dir.display(),
        build_type = %build_plan.build_type,
        clean = build_plan.clean,
        "resolved build plan"
    );

    if args.dry_run {
        for command in plan::commands(&build_plan, config)? {
            println!("{}", command.script);
        }
        info!("dry-run complete; nothing executed");
        return Ok(());
    }

    bootstrap::ensure_environment(config)?;
    plan::execute(&build_plan, config, &SystemShell::new(config))?;
    Ok(())
}

fn print_listing(rows: &[TargetRow], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else {
        println!("Supported targets:\n{}", manifest::render_listing(rows));
    }
    Ok(())
}
