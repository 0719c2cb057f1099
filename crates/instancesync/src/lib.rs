//! InstanceSync Library
//!
//! Keeps a modpack instance (mods, shaderpacks, resourcepacks, datapacks)
//! in step with a declarative manifest, `modlist.json`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use instancesync::{ConsoleProgressReporter, IntoProgressCallback, SideFilter, SyncOptions, run_sync};
//!
//! # async fn example() -> instancesync::Result<()> {
//! let options = SyncOptions::new(".", SideFilter::Client);
//! let progress = ConsoleProgressReporter::new(false).into_callback();
//!
//! let summary = run_sync(&options, Some(progress)).await?;
//! for category in &summary.categories {
//!     println!("{}: {} downloaded, {} deleted", category.key, category.report.downloaded, category.report.deleted);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Consumer mode** ([`run_sync`]): downloads missing files from the CurseForge
//!   or Modrinth CDN with a bounded worker pool, deletes files the manifest no
//!   longer lists, and renames files the manifest marks as disabled
//! - **Producer mode** ([`run_update`]): rebuilds the manifest from per-item
//!   package records, keeping hand-edited sides and the operator's
//!   enabled/disabled choices
//! - **Fallback host**: CurseForge downloads are retried once on a second CDN host
//! - **Loader pairing**: the manifest's mod loader is mirrored into the
//!   launcher's `mmc-pack.json`

pub mod disabled;
pub mod downloader;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod orchestrator;
pub mod packages;
pub mod reconcile;
pub mod resolver;
pub mod sync;

// Re-export commonly used types for convenience
pub use downloader::{
    ConsoleProgressReporter, DownloadConfig, DownloadConfigBuilder, DownloadError,
    IntoProgressCallback, NullProgressReporter, ProgressCallback, ProgressEvent, ProgressReporter,
};
pub use error::{Result, SyncError};
pub use loader::LoaderInfo;
pub use manifest::{ContentEntry, Identity, Manifest, Side, SideFilter};
pub use orchestrator::{CategoryReport, CategoryTarget, Orchestrator};
pub use resolver::{ResolveError, SourceResolver};
pub use sync::{SyncOptions, SyncSummary, UpdateOptions, UpdateSummary, run_sync, run_update};
