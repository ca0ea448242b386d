#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use comfy_table::{Table, presets};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TcoreError};

pub const MANIFEST_FILE: &str = "meta.json";

/// Contents of a project's `meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectManifest {
    pub name: String,
    pub targets: Vec<TargetDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TargetDescriptor {
    pub name: String,
    pub config: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<bool>,
}

impl TargetDescriptor {
    /// A target is built with the host toolchain only when `host` is present
    /// and explicitly `false`.
    pub fn is_host_build(&self) -> bool {
        self.host == Some(false)
    }

    fn validate(&self, index: usize) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(format!("targets[{index}].name must not be empty"));
        }
        if !is_single_component(&self.name) {
            return Err(format!(
                "targets[{index}].name must be a plain directory name, got {:?}",
                self.name
            ));
        }
        if self.config.trim().is_empty() {
            return Err(format!("targets[{}].config must not be empty", self.name));
        }
        if !self.is_host_build()
            && self
                .toolchain
                .as_deref()
                .is_none_or(|toolchain| toolchain.trim().is_empty())
        {
            return Err(format!(
                "targets[{}].toolchain is required for cross builds",
                self.name
            ));
        }
        Ok(())
    }
}

impl ProjectManifest {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("project name must not be empty".to_string());
        }

        let mut seen = BTreeSet::new();
        for (index, target) in self.targets.iter().enumerate() {
            target.validate(index)?;
            if !seen.insert(target.name.as_str()) {
                return Err(format!("duplicate target name: {}", target.name));
            }
        }
        Ok(())
    }
}

/// Target names become a build directory under `<source>/build`, so they may
/// not escape it.
fn is_single_component(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// One line of `--list-targets` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetRow {
    pub name: String,
    pub config: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Listing(Vec<TargetRow>),
    Target(TargetDescriptor),
}

/// Makes `path` absolute against the current directory and collapses `.` and
/// `..` components without touching the filesystem.
pub fn normalize_source(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

pub fn load(source_dir: &Path) -> Result<ProjectManifest> {
    let path = source_dir.join(MANIFEST_FILE);
    info!(path = %path.display(), "looking up metafile");

    if !path.is_file() {
        return Err(TcoreError::ManifestNotFound { path });
    }

    let contents = fs::read_to_string(&path).map_err(|err| TcoreError::io(&path, err))?;
    let manifest: ProjectManifest =
        serde_json::from_str(&contents).map_err(|err| TcoreError::ManifestMalformed {
            path: path.clone(),
            reason: err.to_string(),
        })?;
    manifest
        .validate()
        .map_err(|reason| TcoreError::ManifestMalformed {
            path: path.clone(),
            reason,
        })?;

    debug!(project = %manifest.name, targets = manifest.targets.len(), "loaded manifest");
    Ok(manifest)
}

/// Selects a target, or lists all of them when `list_only` is set.
pub fn resolve(
    manifest: &ProjectManifest,
    target: Option<&str>,
    list_only: bool,
) -> Result<Resolution> {
    if list_only {
        let rows = manifest
            .targets
            .iter()
            .map(|target| TargetRow {
                name: target.name.clone(),
                config: target.config.clone(),
                description: target.description.clone(),
            })
            .collect();
        return Ok(Resolution::Listing(rows));
    }

    let name = target
        .filter(|name| !name.is_empty())
        .ok_or(TcoreError::TargetNameRequired)?;

    manifest
        .targets
        .iter()
        .find(|candidate| candidate.name == name)
        .cloned()
        .map(Resolution::Target)
        .ok_or_else(|| TcoreError::TargetNotFound {
            name: name.to_string(),
        })
}

pub fn render_listing(rows: &[TargetRow]) -> String {
    let mut table = Table::new();
    table
        .load_preset(presets::ASCII_FULL)
        .set_header(vec!["Target name", "Configuration file", "Description"]);
    for row in rows {
        table.add_row(vec![
            row.name.as_str(),
            row.config.as_str(),
            row.description.as_str(),
        ]);
    }
    table.to_string()
}
