#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while bootstrapping the environment or building a project.
#[derive(Debug, Error)]
pub enum TcoreError {
    #[error("development environment is missing: {0}")]
    EnvironmentMissing(String),
    #[error("meta.json must be present in the project directory (looked up {path})")]
    ManifestNotFound { path: PathBuf },
    #[error("{path} is not a valid project manifest: {reason}")]
    ManifestMalformed { path: PathBuf, reason: String },
    #[error("target name must be specified. Use --list-targets for list of available targets")]
    TargetNameRequired,
    #[error("no such target exists: {name}")]
    TargetNotFound { name: String },
    #[error("no such toolchain found: {path}")]
    ToolchainNotFound { path: PathBuf },
    #[error("no such configuration file found: {path}")]
    ConfigFileNotFound { path: PathBuf },
    #[error("failed to run command: {command}")]
    ExecutionFailed { command: String },
    #[error("cannot quote shell word {word:?}: it contains a NUL byte")]
    UnquotableWord { word: String },
    #[error("install record not found at {path}")]
    InstallRecordNotFound { path: PathBuf },
    #[error("install record {path} is malformed: {reason}")]
    InstallRecordMalformed { path: PathBuf, reason: String },
    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TcoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit status reported for this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

pub type Result<T, E = TcoreError> = std::result::Result<T, E>;
