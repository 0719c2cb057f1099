//! Downloader module
//!
//! Transfer plumbing used by the orchestrator: configuration, the streaming
//! HTTP client, error types and progress reporting.

pub mod config;
pub mod error;
pub mod http;
pub mod progress;

// Re-export main types for convenience
pub use config::{DownloadConfig, DownloadConfigBuilder};
pub use error::{DownloadError, FileOperation, Result};
pub use http::HttpClient;
pub use progress::{
    ConsoleProgressReporter, IntoProgressCallback, NullProgressReporter, ProgressCallback,
    ProgressEvent, ProgressReporter,
};
