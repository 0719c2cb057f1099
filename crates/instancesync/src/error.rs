//! Run-level errors. Only these abort a sync or update run.

use std::path::PathBuf;

use thiserror::Error;

use crate::downloader::DownloadError;
use crate::manifest::ManifestParseError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Manifest not found at '{0}'")]
    ManifestMissing(PathBuf),

    #[error("Failed to read manifest '{path}'")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest '{path}' is malformed")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: ManifestParseError,
    },

    #[error("Failed to write manifest '{path}'")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Package metadata directory not found at '{0}'")]
    MetadataDirMissing(PathBuf),

    #[error("Invalid side selection '{0}' (expected 1-6 or all, client, server, client-only, server-only, both-only)")]
    InvalidSideSelection(String),

    #[error("Failed to create directory '{path}'")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Download(#[from] DownloadError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
