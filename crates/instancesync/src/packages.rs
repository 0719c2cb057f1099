//! Per-item package metadata (one TOML file per installed item).
//!
//! ```toml
//! filename = "sodium-0.5.jar"
//! side = "client"
//!
//! [update.modrinth]
//! mod-id = "AANobbMI"
//! version = "Yp8wLY1P"
//! ```
//!
//! Records without a usable update block are defects: they are left out of
//! the fresh entry set and collected for the operator, never fatal.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::manifest::{ContentEntry, Identity, Side};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PackageFile {
    filename: Option<String>,
    side: Option<String>,
    update: Option<UpdateSection>,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateSection {
    curseforge: Option<CurseForgeUpdate>,
    modrinth: Option<ModrinthUpdate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CurseForgeUpdate {
    project_id: Option<u64>,
    file_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ModrinthUpdate {
    mod_id: Option<String>,
    version: Option<String>,
}

/// A validated package record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub filename: String,
    pub side: Side,
    pub identity: Identity,
}

impl PackageRecord {
    pub fn parse(text: &str) -> Result<Self, PackageError> {
        let file: PackageFile = toml::from_str(text)?;

        let filename = file
            .filename
            .filter(|name| !name.trim().is_empty())
            .ok_or(PackageError::MissingFilename)?;

        let side = match file.side.as_deref().map(str::trim) {
            None | Some("") => Side::Both,
            Some(raw) => raw.parse().map_err(|_| PackageError::InvalidSide {
                filename: filename.clone(),
                side: raw.to_string(),
            })?,
        };

        let identity = identity_of(file.update.unwrap_or_default()).map_err(|reason| {
            PackageError::MissingIdentity {
                filename: filename.clone(),
                reason,
            }
        })?;

        Ok(Self {
            filename,
            side,
            identity,
        })
    }

    pub fn into_entry(self) -> ContentEntry {
        ContentEntry::new(self.filename, self.side, self.identity)
    }
}

fn identity_of(update: UpdateSection) -> Result<Identity, &'static str> {
    match (update.curseforge, update.modrinth) {
        (Some(_), Some(_)) => Err("both [update.curseforge] and [update.modrinth] present"),
        (Some(cf), None) => {
            let pair = cf.project_id.zip(cf.file_id);
            Identity::from_parts(pair, None).map_err(|_| "missing update.curseforge.project-id/file-id")
        }
        (None, Some(mr)) => {
            let pair = mr.mod_id.zip(mr.version);
            Identity::from_parts(None, pair).map_err(|_| "missing update.modrinth.mod-id/version")
        }
        (None, None) => Err("missing [update.curseforge] or [update.modrinth]"),
    }
}

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing filename")]
    MissingFilename,

    #[error("{filename} has invalid side '{side}'")]
    InvalidSide { filename: String, side: String },

    #[error("{filename} ({reason})")]
    MissingIdentity { filename: String, reason: &'static str },
}

/// A record excluded from the fresh set, kept for the operator's review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDefect {
    pub category: String,
    pub filename: String,
    pub reason: String,
}

impl fmt::Display for PackageDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.category, self.filename, self.reason)
    }
}

#[derive(Debug, Default, Clone)]
pub struct PackageScan {
    pub entries: Vec<ContentEntry>,
    pub defects: Vec<PackageDefect>,
}

/// Read every `*.toml` record in `dir`, in filename order
pub fn scan_package_dir(dir: &Path, category: &str) -> PackageScan {
    let mut scan = PackageScan::default();

    let mut paths: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
            .collect(),
        Err(e) => {
            warn!("Failed to read package records in {}: {}", dir.display(), e);
            return scan;
        }
    };
    paths.sort();

    for path in paths {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                continue;
            }
        };

        match PackageRecord::parse(&text) {
            Ok(record) => {
                debug!("{}: {} ({})", category, record.filename, record.identity.backend_name());
                scan.entries.push(record.into_entry());
            }
            Err(PackageError::MissingFilename) => {
                warn!("Skipping {} (missing filename)", path.display());
            }
            Err(PackageError::Parse(e)) => {
                warn!("Failed to parse {} ({})", path.display(), e);
            }
            Err(PackageError::InvalidSide { filename, side }) => scan.defects.push(PackageDefect {
                category: category.to_string(),
                filename,
                reason: format!("invalid side '{}'", side),
            }),
            Err(PackageError::MissingIdentity { filename, reason }) => scan.defects.push(PackageDefect {
                category: category.to_string(),
                filename,
                reason: reason.to_string(),
            }),
        }
    }

    scan
}
