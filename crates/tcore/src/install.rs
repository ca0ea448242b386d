#![forbid(unsafe_code)]

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{Result, TcoreError};

/// Marker written once the theCore sources were fetched successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRecord {
    #[serde(rename = "tcore_ver")]
    pub tool_version: Version,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub installed_at: Option<OffsetDateTime>,
}

impl InstallationRecord {
    /// Record for the running tool version, stamped with the current time.
    pub fn current() -> Self {
        Self {
            tool_version: crate::tool_version(),
            installed_at: Some(OffsetDateTime::now_utc()),
        }
    }
}

/// Reads and writes the install marker file.
#[derive(Debug, Clone)]
pub struct InstallStore {
    path: PathBuf,
}

impl InstallStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn read(&self) -> Result<InstallationRecord> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(TcoreError::InstallRecordNotFound {
                    path: self.path.clone(),
                });
            }
            Err(err) => return Err(TcoreError::io(&self.path, err)),
        };

        serde_json::from_str(&contents).map_err(|err| TcoreError::InstallRecordMalformed {
            path: self.path.clone(),
            reason: err.to_string(),
        })
    }

    /// Replaces the record. Contents go to a sibling temp file that is then
    /// renamed over the target, so readers never see a partial file.
    pub fn write(&self, record: &InstallationRecord) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|err| TcoreError::io(parent, err))?;

        let mut body = serde_json::to_string_pretty(record).map_err(|err| {
            TcoreError::InstallRecordMalformed {
                path: self.path.clone(),
                reason: err.to_string(),
            }
        })?;
        body.push('\n');

        let mut file = NamedTempFile::new_in(parent).map_err(|err| TcoreError::io(parent, err))?;
        file.write_all(body.as_bytes())
            .and_then(|()| file.as_file().sync_all())
            .map_err(|err| TcoreError::io(file.path(), err))?;
        file.persist(&self.path)
            .map_err(|err| TcoreError::io(&self.path, err.error))?;

        debug!(path = %self.path.display(), version = %record.tool_version, "wrote install record");
        Ok(())
    }

    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(TcoreError::io(&self.path, err)),
        }
    }
}
