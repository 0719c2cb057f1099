//! Applies one manifest category to its directory.
//!
//! A run has three phases that never overlap:
//!
//! 1. Planning: side filtering, presence checks and URL resolution.
//! 2. Transfer: missing files are fetched by a worker pool bounded by
//!    [`DownloadConfig::max_concurrent_downloads`]. CurseForge files get one
//!    retry against the fallback host; anything else that fails is abandoned.
//! 3. Cleanup: files the manifest marks as disabled are renamed into their
//!    disabled form, then managed files the manifest does not name are deleted.
//!
//! Cleanup starts once every transfer has finished, or once the join deadline
//! passes. Transfers still running at the deadline are left to finish on
//! their own; they write to `.part` files, which cleanup never touches.
//!
//! Per-file failures are logged and counted in the [`CategoryReport`]; they
//! never fail the category.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::disabled;
use crate::downloader::{
    DownloadConfig, DownloadError, HttpClient, ProgressCallback, ProgressEvent, Result,
};
use crate::manifest::{ContentEntry, SideFilter};
use crate::resolver::{ResolvedSource, SourceResolver};

#[cfg(test)]
mod tests;

/// A content directory and the file extensions it manages
#[derive(Debug, Clone)]
pub struct CategoryTarget {
    pub label: String,
    pub directory: PathBuf,
    /// Lowercase, with the leading dot
    pub extensions: Vec<String>,
    /// Names that count as known even though no entry carries them
    pub reserved_names: HashSet<String>,
}

impl CategoryTarget {
    pub fn new<L, P>(label: L, directory: P, extensions: &[&str]) -> Self
    where
        L: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            label: label.into(),
            directory: directory.into(),
            extensions: extensions.iter().map(|ext| ext.to_ascii_lowercase()).collect(),
            reserved_names: HashSet::new(),
        }
    }

    pub fn with_reserved_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Whether the orphan pass may delete a file of this name.
    ///
    /// Matches a managed extension case-insensitively, plain or followed by
    /// the disabled marker.
    pub fn is_managed(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        let base = disabled::strip_marker(&lower);
        self.extensions.iter().any(|ext| base.ends_with(ext.as_str()))
    }
}

/// Final result of one transfer
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Downloaded { size: u64, via_fallback: bool },
    Abandoned { reason: String },
}

/// A file that could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub filename: String,
    pub reason: String,
}

/// Counts and failures for one category
#[derive(Debug, Clone, Default)]
pub struct CategoryReport {
    pub label: String,
    /// Files fetched successfully, including through the fallback host
    pub downloaded: usize,
    pub downloaded_via_fallback: usize,
    /// Files abandoned after their last attempt
    pub failed: Vec<FailedFile>,
    /// Entries excluded by the side filter
    pub skipped: usize,
    /// Entries whose file was already on disk
    pub already_present: usize,
    /// Entries with no usable source
    pub unresolvable: Vec<FailedFile>,
    pub renamed: usize,
    pub deleted: usize,
    /// Whether the join deadline passed with transfers still running
    pub deadline_exceeded: bool,
    /// Transfers still running when the deadline passed
    pub pending: usize,
    pub bytes: u64,
    pub elapsed: Duration,
}

struct DownloadTask {
    filename: String,
    dest: PathBuf,
    source: ResolvedSource,
}

/// Download orchestrator. One worker pool is created per [`apply`](Self::apply) call.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<DownloadConfig>,
    client: HttpClient,
    resolver: Arc<SourceResolver>,
    progress: Option<ProgressCallback>,
}

impl Orchestrator {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = HttpClient::from_config(&config)?;
        let resolver = SourceResolver::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            client,
            resolver: Arc::new(resolver),
            progress: None,
        })
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub async fn apply(
        &self,
        target: &CategoryTarget,
        entries: &[ContentEntry],
        filter: SideFilter,
    ) -> CategoryReport {
        let started = Instant::now();
        let mut report = CategoryReport {
            label: target.label.clone(),
            ..CategoryReport::default()
        };

        if let Err(e) = fs::create_dir_all(&target.directory).await {
            warn!("Failed to create {}: {}", target.directory.display(), e);
        }

        info!("Downloading any missing {}", target.label);
        let tasks = self.plan(target, entries, filter, &mut report).await;

        if tasks.is_empty() {
            info!("No {} need to be downloaded", target.label);
        } else {
            let count = tasks.len();
            self.run_pool(tasks, &mut report).await;
            info!(
                "Finished downloading {} of {} {} (Took {:.2}s)",
                report.downloaded,
                count,
                target.label,
                started.elapsed().as_secs_f32()
            );
        }

        report.renamed = normalize_disabled(&target.directory, entries).await;
        report.deleted = delete_orphans(target, entries).await;
        report.elapsed = started.elapsed();
        report
    }

    async fn plan(
        &self,
        target: &CategoryTarget,
        entries: &[ContentEntry],
        filter: SideFilter,
        report: &mut CategoryReport,
    ) -> Vec<DownloadTask> {
        let mut tasks = Vec::new();
        let mut planned: HashSet<&str> = HashSet::new();

        for entry in entries {
            if !filter.accepts(&entry.side) {
                if entry.side.is_known() {
                    info!("Skipping {} (side: {})", entry.filename, entry.side);
                } else {
                    warn!("Skipping {}: unrecognized side '{}'", entry.filename, entry.side);
                }
                report.skipped += 1;
                continue;
            }

            let dest = target.directory.join(&entry.filename);
            if exists(&dest).await {
                debug!("{} already present", entry.filename);
                report.already_present += 1;
                continue;
            }
            // disabled by the operator before the manifest caught up; cleanup renames it
            if entry.is_disabled() && exists(&target.directory.join(entry.remote_filename())).await {
                debug!("{} present in enabled form", entry.filename);
                report.already_present += 1;
                continue;
            }

            if !planned.insert(entry.filename.as_str()) {
                warn!("Skipping duplicate entry {}", entry.filename);
                continue;
            }

            match self.resolver.resolve(entry) {
                Ok(source) => tasks.push(DownloadTask {
                    filename: entry.filename.clone(),
                    dest,
                    source,
                }),
                Err(e) => {
                    warn!("Skipping {}: {}", entry.filename, e);
                    report.unresolvable.push(FailedFile {
                        filename: entry.filename.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tasks
    }

    async fn run_pool(&self, tasks: Vec<DownloadTask>, report: &mut CategoryReport) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_downloads.max(1)));
        let mut running = FuturesUnordered::new();

        for task in tasks {
            let semaphore = Arc::clone(&semaphore);
            let client = self.client.clone();
            let progress = self.progress.clone();
            let filename = task.filename.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return DownloadOutcome::Abandoned {
                        reason: "worker pool closed".to_string(),
                    };
                };
                fetch(&client, &task, progress.as_ref()).await
            });
            running.push(async move { (filename, handle.await) });
        }

        // dropping `running` at the deadline detaches, not aborts, the spawned tasks
        let deadline = Instant::now().checked_add(self.config.join_timeout);
        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, running.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        report.deadline_exceeded = true;
                        report.pending = running.len();
                        warn!(
                            "Join deadline of {:?} exceeded with {} transfer(s) still running",
                            self.config.join_timeout,
                            report.pending
                        );
                        break;
                    }
                },
                None => running.next().await,
            };

            let Some((filename, joined)) = next else {
                break;
            };
            match joined {
                Ok(DownloadOutcome::Downloaded { size, via_fallback }) => {
                    report.downloaded += 1;
                    report.bytes += size;
                    if via_fallback {
                        report.downloaded_via_fallback += 1;
                    }
                }
                Ok(DownloadOutcome::Abandoned { reason }) => {
                    report.failed.push(FailedFile { filename, reason });
                }
                Err(e) => {
                    warn!("Download task for {} did not complete: {}", filename, e);
                    report.failed.push(FailedFile {
                        filename,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Primary URL, then the fallback once if the backend has one
async fn fetch(
    client: &HttpClient,
    task: &DownloadTask,
    progress: Option<&ProgressCallback>,
) -> DownloadOutcome {
    let started = Instant::now();
    let primary = &task.source.primary;

    let error = match client.download_to_file(primary, &task.dest, progress).await {
        Ok(size) => return completed(task, size, false, started.elapsed(), progress),
        Err(e) => e,
    };

    let fallback = match &task.source.fallback {
        Some(fallback) if error.is_recoverable() => fallback,
        _ => return abandon(task, &error, progress),
    };

    warn!("{} failed at {}: {}", task.filename, primary, error.report());
    if let Some(callback) = progress {
        callback(ProgressEvent::FallbackAttempt {
            file: task.filename.clone(),
            failed_url: primary.to_string(),
            fallback_url: fallback.to_string(),
        });
    }

    match client.download_to_file(fallback, &task.dest, progress).await {
        Ok(size) => completed(task, size, true, started.elapsed(), progress),
        Err(e) => abandon(task, &e, progress),
    }
}

fn completed(
    task: &DownloadTask,
    size: u64,
    via_fallback: bool,
    elapsed: Duration,
    progress: Option<&ProgressCallback>,
) -> DownloadOutcome {
    debug!("Downloaded {} ({} bytes)", task.filename, size);
    if let Some(callback) = progress {
        callback(ProgressEvent::DownloadComplete {
            file: task.filename.clone(),
            final_size: size,
            elapsed,
        });
    }
    DownloadOutcome::Downloaded { size, via_fallback }
}

fn abandon(
    task: &DownloadTask,
    error: &DownloadError,
    progress: Option<&ProgressCallback>,
) -> DownloadOutcome {
    let reason = error.report();
    warn!("Failed to download {} [{}]: {}", task.filename, error.category(), reason);
    if let Some(callback) = progress {
        callback(ProgressEvent::DownloadAbandoned {
            file: task.filename.clone(),
            error: reason.clone(),
        });
    }
    DownloadOutcome::Abandoned { reason }
}

/// Rename `x` to `x.disabled` for every disabled entry whose marked file is absent
async fn normalize_disabled(directory: &Path, entries: &[ContentEntry]) -> usize {
    let mut renamed = 0;

    for entry in entries.iter().filter(|e| e.is_disabled()) {
        let enabled_path = directory.join(entry.remote_filename());
        let disabled_path = directory.join(&entry.filename);

        if !exists(&enabled_path).await || exists(&disabled_path).await {
            continue;
        }

        match fs::rename(&enabled_path, &disabled_path).await {
            Ok(()) => {
                info!("Renamed {} to {}", entry.remote_filename(), entry.filename);
                renamed += 1;
            }
            Err(e) => warn!(
                "Failed to rename {} to {}: {}",
                entry.remote_filename(),
                entry.filename,
                e
            ),
        }
    }

    renamed
}

/// Delete managed files that neither an entry nor a reserved name accounts for
async fn delete_orphans(target: &CategoryTarget, entries: &[ContentEntry]) -> usize {
    info!("Deleting any removed {}", target.label);

    let known: HashSet<&str> = entries
        .iter()
        .map(|e| e.filename.as_str())
        .chain(target.reserved_names.iter().map(String::as_str))
        .collect();

    let mut orphans = Vec::new();
    match fs::read_dir(&target.directory).await {
        Ok(mut dir) => loop {
            match dir.next_entry().await {
                Ok(Some(item)) => {
                    let is_file = item.file_type().await.map(|t| t.is_file()).unwrap_or(false);
                    let name = item.file_name().to_string_lossy().into_owned();
                    if is_file && target.is_managed(&name) && !known.contains(name.as_str()) {
                        orphans.push(item.path());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to list {}: {}", target.directory.display(), e);
                    break;
                }
            }
        },
        Err(e) => {
            warn!("Failed to list {}: {}", target.directory.display(), e);
            return 0;
        }
    }
    orphans.sort();

    let mut deleted = 0;
    for path in orphans {
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted {}", path.display());
                deleted += 1;
            }
            Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
        }
    }

    if deleted == 0 {
        info!("No {} were removed", target.label);
    } else {
        info!("Deleted {} old {}", deleted, target.label);
    }
    deleted
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}
