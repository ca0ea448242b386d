#![forbid(unsafe_code)]

//! Provisioning of the Nix package manager and the theCore source tree.
//!
//! The two gates are independent: Nix is considered installed when its root
//! directory exists, the sources when the install record exists. `force`
//! bypasses both checks. Nothing is rolled back on failure; the next run's
//! checks are the only recovery.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, TcoreError};
use crate::fetch::Fetcher;
use crate::install::{InstallStore, InstallationRecord};
use crate::shell::{CommandRunner, ShellCommand, quote, quote_path};

/// What a bootstrap run actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub package_manager_installed: bool,
    pub sources_fetched: bool,
}

pub struct Bootstrapper<'a> {
    config: &'a Config,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn Fetcher,
    store: InstallStore,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn CommandRunner, fetcher: &'a dyn Fetcher) -> Self {
        Self {
            config,
            runner,
            fetcher,
            store: InstallStore::new(&config.install_file),
        }
    }

    pub fn run(&self, force: bool) -> Result<BootstrapReport> {
        if force {
            warn!("force (re)install theCore dev environment");
        }

        let package_manager_installed = self.ensure_package_manager(force)?;
        let sources_fetched = self.ensure_sources(force)?;

        Ok(BootstrapReport {
            package_manager_installed,
            sources_fetched,
        })
    }

    fn ensure_package_manager(&self, force: bool) -> Result<bool> {
        if self.config.nix_dir.is_dir() && !force {
            info!(nix_dir = %self.config.nix_dir.display(), "Nix is already installed");
            return Ok(false);
        }

        info!("installing Nix");
        let script = &self.config.nix_install_script;
        self.fetcher.fetch(&self.config.nix_installer_url, script)?;
        make_executable(script)?;
        self.runner.run(&ShellCommand::plain(quote_path(script)?))?;

        Ok(true)
    }

    fn ensure_sources(&self, force: bool) -> Result<bool> {
        if self.store.exists() && !force {
            info!(install_file = %self.store.path().display(), "theCore is already downloaded");
            return Ok(false);
        }

        let src_dir = self.config.core_src_dir();
        if src_dir.is_dir() {
            info!(path = %src_dir.display(), "removing old theCore files");
            fs::remove_dir_all(src_dir).map_err(|err| TcoreError::io(src_dir, err))?;
        }

        if self.store.exists() {
            info!(path = %self.store.path().display(), "removing theCore install record");
            self.store.remove()?;
        }

        info!(upstream = %self.config.core_upstream, "downloading theCore");
        fs::create_dir_all(src_dir).map_err(|err| TcoreError::io(src_dir, err))?;

        self.runner.run(&ShellCommand::profile("nix-env -i git"))?;
        self.runner.run(&ShellCommand::profile(format!(
            "git clone {} {}",
            quote(&self.config.core_upstream)?,
            quote_path(src_dir)?
        )))?;
        self.runner.run(
            &ShellCommand::profile("git submodule update --init --recursive").in_dir(src_dir),
        )?;

        self.store.write(&InstallationRecord::current())?;

        // Entering the shell once makes Nix download every declared dependency.
        self.runner.run(&ShellCommand::shell("true"))?;

        Ok(true)
    }
}

/// Fails with `EnvironmentMissing` unless a previous bootstrap left both the
/// Nix profile script and the theCore install record in place.
pub fn ensure_environment(config: &Config) -> Result<()> {
    if !config.nix_profile_script.is_file() {
        return Err(TcoreError::EnvironmentMissing(format!(
            "Nix profile script {} not found, run `tcore bootstrap` first",
            config.nix_profile_script.display()
        )));
    }

    let store = InstallStore::new(&config.install_file);
    if !store.exists() {
        return Err(TcoreError::EnvironmentMissing(format!(
            "theCore is not installed ({} not found), run `tcore bootstrap` first",
            store.path().display()
        )));
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt as _;

    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .map_err(|err| TcoreError::io(path, err))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
