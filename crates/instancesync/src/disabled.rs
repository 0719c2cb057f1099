//! Disabled filename marker and the synchronizer that keeps manifest rows
//! in line with what the operator enabled or disabled on disk.
//!
//! The synchronizer only rewrites row filenames. It never touches the disk.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::manifest::ContentEntry;

/// Filename suffix meaning "present but deliberately inactive"
pub const DISABLED_MARKER: &str = ".disabled";

pub fn is_disabled(name: &str) -> bool {
    name.ends_with(DISABLED_MARKER)
}

/// Strip one trailing disabled marker, if any
pub fn strip_marker(name: &str) -> &str {
    name.strip_suffix(DISABLED_MARKER).unwrap_or(name)
}

pub fn with_marker(name: &str) -> String {
    format!("{}{}", name, DISABLED_MARKER)
}

/// Names of the regular files in one content directory
#[derive(Debug, Default, Clone)]
pub struct DirectoryListing {
    present: HashSet<String>,
    present_disabled: HashSet<String>,
}

impl DirectoryListing {
    /// Scan `dir` for regular files. Returns `Ok(None)` if the directory does not exist.
    pub fn scan(dir: &Path) -> io::Result<Option<Self>> {
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => debug!("Ignoring non UTF-8 filename {:?}", raw),
            }
        }

        Ok(Some(Self::from_names(names)))
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut listing = Self::default();
        for name in names {
            let name = name.into();
            if is_disabled(&name) {
                listing.present_disabled.insert(name.clone());
            }
            listing.present.insert(name);
        }
        listing
    }

    pub fn contains(&self, name: &str) -> bool {
        self.present.contains(name)
    }

    pub fn contains_disabled(&self, name: &str) -> bool {
        self.present_disabled.contains(name)
    }

    /// Rewrite row filenames to the enabled/disabled variant present in this listing.
    ///
    /// Returns the number of rows changed.
    pub fn apply(&self, entries: &mut [ContentEntry]) -> usize {
        entries
            .iter_mut()
            .map(|entry| self.adopt_disabled(entry) || self.adopt_enabled(entry))
            .filter(|&changed| changed)
            .count()
    }

    /// Only the enabled -> disabled direction of [`apply`](Self::apply).
    ///
    /// Consumer runs use this: a marked row stays marked so the rename pass can
    /// disable the file on disk.
    pub fn apply_disabled(&self, entries: &mut [ContentEntry]) -> usize {
        entries
            .iter_mut()
            .map(|entry| self.adopt_disabled(entry))
            .filter(|&changed| changed)
            .count()
    }

    /// Unmarked row whose marked file is present
    fn adopt_disabled(&self, entry: &mut ContentEntry) -> bool {
        if entry.filename.trim().is_empty() || is_disabled(&entry.filename) {
            return false;
        }
        let disabled_name = with_marker(&entry.filename);
        if !self.contains_disabled(&disabled_name) {
            return false;
        }
        debug!("{} is disabled on disk", entry.filename);
        entry.filename = disabled_name;
        true
    }

    /// Marked row whose marked file is missing but whose unmarked file is present
    fn adopt_enabled(&self, entry: &mut ContentEntry) -> bool {
        if !is_disabled(&entry.filename) || self.contains_disabled(&entry.filename) {
            return false;
        }
        let enabled_name = strip_marker(&entry.filename);
        if enabled_name.trim().is_empty() || !self.contains(enabled_name) {
            return false;
        }
        debug!("{} is enabled on disk", enabled_name);
        entry.filename = enabled_name.to_string();
        true
    }
}

/// Adjust each row's filename to the enabled or disabled file present in `dir`.
///
/// Missing directories are skipped; scan failures are logged and leave the rows untouched.
pub fn sync_disabled_state(dir: &Path, entries: &mut [ContentEntry]) -> usize {
    with_listing(dir, entries, DirectoryListing::apply)
}

/// Point unmarked rows at the disabled file the operator left in `dir`.
///
/// Marked rows are left alone.
pub fn adopt_disabled_files(dir: &Path, entries: &mut [ContentEntry]) -> usize {
    with_listing(dir, entries, DirectoryListing::apply_disabled)
}

fn with_listing(
    dir: &Path,
    entries: &mut [ContentEntry],
    apply: fn(&DirectoryListing, &mut [ContentEntry]) -> usize,
) -> usize {
    if entries.is_empty() {
        return 0;
    }

    match DirectoryListing::scan(dir) {
        Ok(Some(listing)) => apply(&listing, entries),
        Ok(None) => {
            debug!("{} does not exist, nothing to sync", dir.display());
            0
        }
        Err(e) => {
            warn!("Failed to scan {}: {}", dir.display(), e);
            0
        }
    }
}
