//! Consumer and producer entry points.
//!
//! [`run_sync`] makes an instance directory match its manifest.
//! [`run_update`] rebuilds the manifest from the per-item package records.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::disabled::{adopt_disabled_files, sync_disabled_state};
use crate::downloader::{DownloadConfig, ProgressCallback};
use crate::error::{Result, SyncError};
use crate::loader::{self, INSTANCE_PACK_FILE, LoaderInfo, PackSyncOutcome};
use crate::manifest::{MANIFEST_FILE_NAME, Manifest, ManifestCategory, RejectedRow, SideFilter};
use crate::orchestrator::{CategoryReport, CategoryTarget, Orchestrator};
use crate::packages::{PackageDefect, scan_package_dir};
use crate::reconcile::{MergeSummary, merge_with_summary, sort_entries};

/// One content category and where it lives on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryLayout {
    /// Key of the category array in the manifest
    pub key: &'static str,
    pub label: &'static str,
    /// Directory under the instance root
    pub directory: &'static str,
    pub extensions: &'static [&'static str],
}

pub const CATEGORIES: [CategoryLayout; 4] = [
    CategoryLayout {
        key: "mods",
        label: "mods",
        directory: "mods",
        extensions: &[".jar"],
    },
    CategoryLayout {
        key: "shaderpacks",
        label: "shaderpacks",
        directory: "shaderpacks",
        extensions: &[".zip"],
    },
    CategoryLayout {
        key: "resourcepacks",
        label: "resourcepacks",
        directory: "resourcepacks",
        extensions: &[".zip"],
    },
    CategoryLayout {
        key: "datapacks",
        label: "datapacks",
        directory: "datapacks",
        extensions: &[".zip"],
    },
];

/// Package records for mods live in a hidden index next to the jars
pub const DEFAULT_MODS_INDEX_DIR: &str = "mods/.index";

/// `mmc-pack.json` in the parent of the instance root
pub fn default_instance_pack(root: &Path) -> Option<PathBuf> {
    let absolute = std::path::absolute(root).ok()?;
    absolute.parent().map(|parent| parent.join(INSTANCE_PACK_FILE))
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Instance root holding the content directories
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    /// Launcher pack file whose loader is kept in line with the manifest
    pub instance_pack: Option<PathBuf>,
    pub side_filter: SideFilter,
    pub download: DownloadConfig,
}

impl SyncOptions {
    pub fn new<P: Into<PathBuf>>(root: P, side_filter: SideFilter) -> Self {
        let root = root.into();
        Self {
            manifest_path: root.join(MANIFEST_FILE_NAME),
            instance_pack: default_instance_pack(&root),
            root,
            side_filter,
            download: DownloadConfig::default(),
        }
    }
}

/// Outcome of one category in a consumer run
#[derive(Debug, Clone)]
pub struct CategorySyncResult {
    pub key: &'static str,
    pub report: CategoryReport,
    /// Manifest rows that could not be read
    pub rejected: Vec<RejectedRow>,
    /// Rows pointed at a `.disabled` file the operator left on disk
    pub disabled_adopted: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub categories: Vec<CategorySyncResult>,
    /// Keys of categories the manifest does not have
    pub absent: Vec<&'static str>,
    pub loader_sync: Option<PackSyncOutcome>,
    pub elapsed: Duration,
}

impl SyncSummary {
    pub fn deadline_exceeded(&self) -> bool {
        self.categories.iter().any(|c| c.report.deadline_exceeded)
    }
}

/// Consumer mode.
///
/// Configuration defects (missing manifest, uncreatable directory) abort
/// before anything on disk changes. Everything after that is per file and
/// only shows up in the summary.
pub async fn run_sync(options: &SyncOptions, progress: Option<ProgressCallback>) -> Result<SyncSummary> {
    let started = Instant::now();
    info!("Running in {}", options.root.display());

    let manifest = Manifest::load(&options.manifest_path)?;
    info!("Found {}", options.manifest_path.display());

    for layout in &CATEGORIES {
        ensure_dir(&options.root.join(layout.directory))?;
    }

    let orchestrator = Orchestrator::new(options.download.clone())?;
    let orchestrator = match progress {
        Some(callback) => orchestrator.with_progress(callback),
        None => orchestrator,
    };

    let counts: Vec<String> = CATEGORIES
        .iter()
        .map(|layout| {
            let n = manifest.category(layout.key).map_or(0, |c| c.entries.len());
            format!("{} {}", n, layout.label)
        })
        .collect();
    info!("Instance loaded, has {}", counts.join(", "));
    info!("Downloading {}", options.side_filter);

    let mut summary = SyncSummary {
        loader_sync: sync_loader(&manifest, options.instance_pack.as_deref()),
        ..SyncSummary::default()
    };

    for layout in &CATEGORIES {
        let Some(category) = manifest.category(layout.key) else {
            info!("No \"{}\" section in manifest, skipping", layout.key);
            summary.absent.push(layout.key);
            continue;
        };

        for row in &category.rejected {
            warn!(
                "{}: ignoring row {} ({}): {}",
                layout.key,
                row.index,
                row.filename.as_deref().unwrap_or("?"),
                row.error
            );
        }

        let directory = options.root.join(layout.directory);
        let mut entries = category.entries.clone();
        let disabled_adopted = adopt_disabled_files(&directory, &mut entries);
        if disabled_adopted > 0 {
            info!("{} {} are disabled on disk, keeping them disabled", disabled_adopted, layout.label);
        }

        let target = CategoryTarget::new(layout.label, directory, layout.extensions)
            .with_reserved_names(category.rejected_filenames());
        let report = orchestrator.apply(&target, &entries, options.side_filter).await;

        summary.categories.push(CategorySyncResult {
            key: layout.key,
            report,
            rejected: category.rejected.clone(),
            disabled_adopted,
        });
    }

    summary.elapsed = started.elapsed();
    info!("Done! Took {:.2}s", summary.elapsed.as_secs_f32());
    Ok(summary)
}

fn sync_loader(manifest: &Manifest, instance_pack: Option<&Path>) -> Option<PackSyncOutcome> {
    let Some(loader) = &manifest.loader else {
        info!("No loader info in manifest, skipping {} loader sync", INSTANCE_PACK_FILE);
        return None;
    };
    let Some(pack) = instance_pack else {
        info!("No {} location, skipping loader sync", INSTANCE_PACK_FILE);
        return None;
    };
    Some(loader::sync_instance_pack(pack, loader))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    info!("{} does not exist, creating", dir.display());
    std::fs::create_dir_all(dir).map_err(|source| SyncError::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    /// Package records for mods
    pub index_dir: PathBuf,
    /// Launcher pack file the loader is read from
    pub instance_pack: Option<PathBuf>,
}

impl UpdateOptions {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        Self {
            manifest_path: root.join(MANIFEST_FILE_NAME),
            index_dir: root.join(DEFAULT_MODS_INDEX_DIR),
            instance_pack: default_instance_pack(&root),
            root,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryUpdate {
    pub key: &'static str,
    pub entries: usize,
    pub merge: MergeSummary,
    /// Rows rewritten to the enabled/disabled name found on disk
    pub disabled_synced: usize,
    /// Existing manifest rows that could not be read and were not carried over
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSummary {
    pub categories: Vec<CategoryUpdate>,
    /// Package records left out for lack of a usable identity
    pub defects: Vec<PackageDefect>,
    /// Whether an unreadable manifest was replaced instead of merged into
    pub regenerated: bool,
    pub loader: Option<LoaderInfo>,
    pub elapsed: Duration,
}

/// Producer mode: merge package records into the manifest and write it.
pub fn run_update(options: &UpdateOptions) -> Result<UpdateSummary> {
    let started = Instant::now();

    if !options.index_dir.is_dir() {
        return Err(SyncError::MetadataDirMissing(options.index_dir.clone()));
    }

    let mut summary = UpdateSummary::default();
    let existing = load_existing(&options.manifest_path, &mut summary)?;

    let mut manifest = Manifest::default();
    for layout in &CATEGORIES {
        let content_dir = options.root.join(layout.directory);
        let records_dir = if layout.key == "mods" {
            options.index_dir.clone()
        } else {
            content_dir.clone()
        };

        let scan = if records_dir.is_dir() {
            scan_package_dir(&records_dir, layout.key)
        } else {
            debug!("{} does not exist, no {} records", records_dir.display(), layout.key);
            Default::default()
        };
        summary.defects.extend(scan.defects);

        let existing_category = existing.as_ref().and_then(|m| m.category(layout.key));
        let existing_rows = existing_category.map(|c| c.entries.clone()).unwrap_or_default();
        let rejected = existing_category.map(|c| c.rejected.clone()).unwrap_or_default();
        for row in &rejected {
            warn!(
                "{}: dropping unreadable manifest row {} ({}): {}",
                layout.key,
                row.index,
                row.filename.as_deref().unwrap_or("?"),
                row.error
            );
        }

        let (mut rows, merge) = merge_with_summary(existing_rows, scan.entries);
        let disabled_synced = sync_disabled_state(&content_dir, &mut rows);
        sort_entries(&mut rows);

        info!(
            "{}: {} entries ({} updated, {} added, {} removed)",
            layout.key,
            rows.len(),
            merge.updated,
            merge.added,
            merge.removed
        );
        summary.categories.push(CategoryUpdate {
            key: layout.key,
            entries: rows.len(),
            merge,
            disabled_synced,
            rejected,
        });
        manifest.categories.push(ManifestCategory::new(layout.key, rows));
    }

    manifest.loader = options
        .instance_pack
        .as_deref()
        .and_then(loader::detect_loader)
        .or_else(|| existing.as_ref().and_then(|m| m.loader.clone()));
    summary.loader = manifest.loader.clone();

    manifest.save(&options.manifest_path)?;
    info!("Wrote {}", options.manifest_path.display());

    summary.elapsed = started.elapsed();
    Ok(summary)
}

/// The current manifest, `None` when absent or unreadable as a manifest
fn load_existing(path: &Path, summary: &mut UpdateSummary) -> Result<Option<Manifest>> {
    if !path.is_file() {
        debug!("No manifest at {}, creating one", path.display());
        return Ok(None);
    }

    match Manifest::load(path) {
        Ok(manifest) => Ok(Some(manifest)),
        Err(SyncError::ManifestParse { source, .. }) => {
            warn!("Failed to read existing manifest, regenerating: {}", source);
            summary.regenerated = true;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
