#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use crate::error::{Result, TcoreError};
use crate::manifest::normalize_source;

/// Overrides the root of the theCore installation (defaults to `~/.theCore`).
pub const HOME_ENV: &str = "TCORE_HOME";

pub const DEFAULT_UPSTREAM: &str = "https://github.com/forGGe/theCore";
pub const DEFAULT_NIX_INSTALLER_URL: &str = "https://nixos.org/nix/install";

/// Filesystem locations and remote endpoints used by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub install_dir: PathBuf,
    pub core_src_dir: PathBuf,
    pub toolchain_dir: PathBuf,
    pub install_file: PathBuf,
    pub thirdparty_dir: PathBuf,
    pub core_upstream: String,
    pub nix_dir: PathBuf,
    pub nix_installer_url: String,
    pub nix_install_script: PathBuf,
    pub nix_profile_script: PathBuf,
}

impl Config {
    /// Builds the default layout for the current user, honouring `TCORE_HOME`.
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            TcoreError::EnvironmentMissing("could not determine the home directory".to_string())
        })?;

        Ok(Self::for_home(
            &home,
            std::env::var_os(HOME_ENV).map(PathBuf::from),
        ))
    }

    /// Layout for a user whose home is `home`. A relative `install_dir` is
    /// anchored at the current directory.
    pub fn for_home(home: &Path, install_dir: Option<PathBuf>) -> Self {
        let install_dir = install_dir
            .map(|dir| normalize_source(&dir))
            .unwrap_or_else(|| home.join(".theCore"));

        let mut config = Self::with_install_dir(install_dir);
        config.nix_profile_script = home
            .join(".nix-profile")
            .join("etc")
            .join("profile.d")
            .join("nix.sh");
        config
    }

    /// Lays out every theCore path under `install_dir`.
    ///
    /// Nix locations keep their system-wide defaults; callers that need full
    /// isolation (tests) overwrite them afterwards.
    pub fn with_install_dir(install_dir: impl Into<PathBuf>) -> Self {
        let install_dir = install_dir.into();
        let core_src_dir = install_dir.join("theCore");

        Self {
            toolchain_dir: core_src_dir.join("toolchains"),
            install_file: install_dir.join("installfile.json"),
            thirdparty_dir: install_dir.join("thirdparties"),
            core_upstream: DEFAULT_UPSTREAM.to_string(),
            nix_dir: PathBuf::from("/nix"),
            nix_installer_url: DEFAULT_NIX_INSTALLER_URL.to_string(),
            nix_install_script: std::env::temp_dir().join("nix_install.sh"),
            nix_profile_script: PathBuf::from("/etc/profile.d/nix.sh"),
            core_src_dir,
            install_dir,
        }
    }

    pub fn core_src_dir(&self) -> &Path {
        &self.core_src_dir
    }
}
