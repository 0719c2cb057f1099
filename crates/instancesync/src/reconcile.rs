//! Manifest reconciliation: upsert fresh package data into an existing
//! category, then prune what was uninstalled.
//!
//! Rows are matched on their stable id (CurseForge project id or Modrinth mod
//! id). A match takes the fresh filename and identity but keeps the existing
//! row's side, since that column is maintained by hand. Fresh data decides
//! membership: existing rows whose stable id is not in the fresh set are
//! removed, and rows without a stable id cannot be matched and are dropped.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::manifest::{ContentEntry, StableId};

/// Counts from one [`merge_with_summary`] call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// Existing rows whose filename or identity changed
    pub updated: usize,
    pub added: usize,
    /// Existing rows with no counterpart in the fresh set
    pub removed: usize,
    /// Existing rows with no stable id
    pub dropped_unkeyed: usize,
    /// Rows ignored because an earlier row had the same stable id or filename
    pub duplicates: usize,
}

impl MergeSummary {
    pub fn is_noop(&self) -> bool {
        self.updated == 0 && self.added == 0 && self.removed == 0 && self.dropped_unkeyed == 0
    }
}

pub fn merge(existing: Vec<ContentEntry>, fresh: Vec<ContentEntry>) -> Vec<ContentEntry> {
    merge_with_summary(existing, fresh).0
}

/// Merge `fresh` into `existing` and sort the result.
pub fn merge_with_summary(
    existing: Vec<ContentEntry>,
    fresh: Vec<ContentEntry>,
) -> (Vec<ContentEntry>, MergeSummary) {
    let mut summary = MergeSummary::default();

    let mut rows: Vec<ContentEntry> = Vec::with_capacity(existing.len().max(fresh.len()));
    let mut index: HashMap<StableId, usize> = HashMap::with_capacity(existing.len());

    for row in existing {
        let Some(id) = row.stable_id() else {
            debug!("Dropping {}: no stable id", row.filename);
            summary.dropped_unkeyed += 1;
            continue;
        };
        if index.contains_key(&id) {
            warn!("Dropping duplicate manifest row {} ({})", row.filename, id);
            summary.duplicates += 1;
            continue;
        }
        index.insert(id, rows.len());
        rows.push(row);
    }

    let mut seen: HashSet<StableId> = HashSet::with_capacity(fresh.len());
    let mut seen_names: HashSet<String> = HashSet::with_capacity(fresh.len());

    for row in fresh {
        let Some(id) = row.stable_id() else {
            debug!("Ignoring fresh row {}: no stable id", row.filename);
            continue;
        };
        if seen.contains(&id) || seen_names.contains(&row.filename) {
            warn!("Ignoring duplicate package record {} ({})", row.filename, id);
            summary.duplicates += 1;
            continue;
        }
        seen.insert(id.clone());
        seen_names.insert(row.filename.clone());

        match index.get(&id) {
            Some(&i) => {
                let target = &mut rows[i];
                if target.filename != row.filename || target.identity != row.identity {
                    debug!("Updating {} -> {}", target.filename, row.filename);
                    target.filename = row.filename;
                    target.identity = row.identity;
                    summary.updated += 1;
                }
            }
            None => {
                debug!("Adding {}", row.filename);
                index.insert(id, rows.len());
                rows.push(row);
                summary.added += 1;
            }
        }
    }

    let before = rows.len();
    rows.retain(|row| row.stable_id().is_some_and(|id| seen.contains(&id)));
    summary.removed = before - rows.len();

    sort_entries(&mut rows);
    (rows, summary)
}

/// Case-insensitive by filename; exact filename breaks ties so the order is total
pub fn sort_entries(entries: &mut [ContentEntry]) {
    entries.sort_by_cached_key(|e| (e.filename.to_lowercase(), e.filename.clone()));
}
