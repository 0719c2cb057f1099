//! Turns a manifest entry's identity into fetchable URLs.
//!
//! CurseForge files live on a two-level CDN path derived from the numeric
//! file id (`files/<id / 1000>/<id % 1000>/<name>`) and have a fallback host.
//! Modrinth files live under `data/<modId>/versions/<version>/<name>` and have
//! none. The remote name never carries the local disabled marker.

use thiserror::Error;
use url::Url;

use crate::downloader::{DownloadConfig, DownloadError};
use crate::manifest::{ContentEntry, Identity};

/// Smallest file id the CDN path scheme accepts (seven decimal digits)
pub const MIN_CURSEFORGE_FILE_ID: u64 = 1_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("file id {file_id} has fewer than 7 digits")]
    InvalidIdentity { file_id: u64 },

    #[error("exactly one of a CurseForge or Modrinth identity is required")]
    AmbiguousOrMissingIdentity,

    #[error("resolved URL '{url}' is invalid")]
    InvalidUrl { url: String },
}

/// Which hosting backend a resolved URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    CurseForge,
    Modrinth,
}

/// Primary URL plus the single fallback, where the backend defines one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub backend: Backend,
    pub primary: Url,
    pub fallback: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct SourceResolver {
    curseforge_host: String,
    curseforge_fallback_host: String,
    modrinth_host: String,
}

impl SourceResolver {
    pub fn new(config: &DownloadConfig) -> Result<Self, DownloadError> {
        Ok(Self {
            curseforge_host: validated_base(&config.curseforge_host)?,
            curseforge_fallback_host: validated_base(&config.curseforge_fallback_host)?,
            modrinth_host: validated_base(&config.modrinth_host)?,
        })
    }

    pub fn resolve(&self, entry: &ContentEntry) -> Result<ResolvedSource, ResolveError> {
        let identity = entry
            .identity
            .as_ref()
            .ok_or(ResolveError::AmbiguousOrMissingIdentity)?;
        let filename = entry.remote_filename();

        match identity {
            Identity::CurseForge { file_id, .. } => {
                let path = curseforge_path(*file_id, filename)?;
                Ok(ResolvedSource {
                    backend: Backend::CurseForge,
                    primary: join(&self.curseforge_host, &path)?,
                    fallback: Some(join(&self.curseforge_fallback_host, &path)?),
                })
            }
            Identity::Modrinth { mod_id, version } => {
                let path = modrinth_path(mod_id, version, filename);
                Ok(ResolvedSource {
                    backend: Backend::Modrinth,
                    primary: join(&self.modrinth_host, &path)?,
                    fallback: None,
                })
            }
        }
    }
}

/// `files/<prefix>/<mid>/<encoded filename>`
pub fn curseforge_path(file_id: u64, filename: &str) -> Result<String, ResolveError> {
    if file_id < MIN_CURSEFORGE_FILE_ID {
        return Err(ResolveError::InvalidIdentity { file_id });
    }
    Ok(format!(
        "files/{}/{}/{}",
        file_id / 1000,
        file_id % 1000,
        encode_filename(filename)
    ))
}

/// `data/<modId>/versions/<version>/<encoded filename>`
pub fn modrinth_path(mod_id: &str, version: &str, filename: &str) -> String {
    format!(
        "data/{}/versions/{}/{}",
        encode_filename(mod_id),
        encode_filename(version),
        encode_filename(filename)
    )
}

/// Percent-encode a single path segment; spaces become `%20`, never `+`
pub fn encode_filename(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

fn validated_base(host: &str) -> Result<String, DownloadError> {
    let trimmed = host.trim().trim_end_matches('/');
    Url::parse(trimmed).map_err(|source| DownloadError::InvalidUrl {
        url: host.to_string(),
        source,
    })?;
    Ok(trimmed.to_string())
}

fn join(base: &str, path: &str) -> Result<Url, ResolveError> {
    let url = format!("{}/{}", base, path);
    Url::parse(&url).map_err(|_| ResolveError::InvalidUrl { url })
}
