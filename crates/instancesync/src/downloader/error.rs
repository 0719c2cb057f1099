//! Error types for transfers, with file/URL context

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while fetching a single file
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Transport-level failure (connect, TLS, body stream)
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Remote answered with a non-success status
    #[error("'{url}' answered with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request to '{url}' timed out")]
    NetworkTimeout { url: String },

    /// File system I/O errors with file context
    #[error("Failed {operation} '{path}'")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid base URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to create HTTP client")]
    Client(#[source] reqwest::Error),
}

/// Types of file operations for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Create,
    Write,
    Move,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Move => write!(f, "moving"),
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
    pub(crate) fn request(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            DownloadError::NetworkTimeout { url: url.to_string() }
        } else {
            DownloadError::HttpRequest {
                url: url.to_string(),
                source,
            }
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, operation: FileOperation, source: std::io::Error) -> Self {
        DownloadError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Whether trying the same file again (e.g. on another host) could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            DownloadError::HttpRequest { .. } => true,
            DownloadError::NetworkTimeout { .. } => true,
            DownloadError::HttpStatus { .. } => true,
            DownloadError::FileSystem { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            DownloadError::InvalidUrl { .. } => false,
            DownloadError::Client(_) => false,
        }
    }

    /// Short category name for logging
    pub fn category(&self) -> &'static str {
        match self {
            DownloadError::HttpRequest { .. } => "http_request",
            DownloadError::HttpStatus { .. } => "http_status",
            DownloadError::NetworkTimeout { .. } => "network_timeout",
            DownloadError::FileSystem { .. } => "file_system",
            DownloadError::InvalidUrl { .. } => "invalid_url",
            DownloadError::Client(_) => "client",
        }
    }

    /// Message including the source chain, for one-line log output
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
