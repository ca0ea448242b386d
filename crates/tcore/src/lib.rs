#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod install;
pub mod manifest;
pub mod plan;
pub mod shell;
pub mod telemetry;

pub use bootstrap::{BootstrapReport, Bootstrapper};
pub use config::Config;
pub use error::{Result, TcoreError};
pub use plan::{BuildPlan, BuildType};

/// Version recorded in the install file.
pub fn tool_version() -> semver::Version {
    semver::Version::parse(env!("CARGO_PKG_VERSION"))
        .unwrap_or_else(|_| semver::Version::new(0, 0, 0))
}
