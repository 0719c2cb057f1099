//! Mod-loader pairing between the manifest and the launcher's instance pack.
//!
//! Producer runs read the loader out of `mmc-pack.json`; consumer runs push
//! the manifest's loader back into it. Neither direction ever fails a run.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub const INSTANCE_PACK_FILE: &str = "mmc-pack.json";

const NEOFORGE: &str = "NeoForge";
const FABRIC_LOADER: &str = "Fabric Loader";

const NEOFORGE_UID: &str = "net.neoforged";
const FABRIC_LOADER_UID: &str = "net.fabricmc.fabric-loader";
const FABRIC_INTERMEDIARY_UID: &str = "net.fabricmc.intermediary";

/// The `"loader": [name, version]` pair of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderInfo {
    pub name: String,
    pub version: String,
}

impl LoaderInfo {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, version: V) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty() || self.version.trim().is_empty()
    }

    /// Component uid the launcher uses for this loader, if it is one we know
    pub fn component_uid(&self) -> Option<&'static str> {
        match self.name.as_str() {
            NEOFORGE => Some(NEOFORGE_UID),
            FABRIC_LOADER => Some(FABRIC_LOADER_UID),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoaderInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// What [`sync_instance_pack`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackSyncOutcome {
    /// Nothing to do, with the reason
    Skipped(String),
    Unchanged,
    Added,
    Updated { from: String },
    CachedVersionUpdated,
    Failed(String),
}

/// Read the loader from an instance pack.
///
/// NeoForge wins over Fabric. For Fabric the loader component's version is
/// preferred and the intermediary version is the fallback.
pub fn detect_loader(pack_path: &Path) -> Option<LoaderInfo> {
    if !pack_path.is_file() {
        warn!(
            "{} is missing, is the instance root next to it?",
            pack_path.display()
        );
        return None;
    }

    let root = match read_pack(pack_path) {
        Ok(root) => root,
        Err(reason) => {
            warn!("Failed to read {} for loader detection: {}", pack_path.display(), reason);
            return None;
        }
    };

    let components = root.get("components")?.as_array()?;
    let version_of = |uid: &str| {
        components
            .iter()
            .filter_map(Value::as_object)
            .find(|c| c.get("uid").and_then(Value::as_str) == Some(uid))
            .map(|c| string_field(c, "version"))
    };

    if let Some(version) = version_of(NEOFORGE_UID).filter(|v| !v.trim().is_empty()) {
        return Some(LoaderInfo::new(NEOFORGE, version));
    }

    let intermediary = version_of(FABRIC_INTERMEDIARY_UID)?;
    let version = version_of(FABRIC_LOADER_UID)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(intermediary);
    (!version.trim().is_empty()).then(|| LoaderInfo::new(FABRIC_LOADER, version))
}

/// Make the instance pack's loader component match `loader`.
///
/// The file is rewritten, pretty-printed, only when a field changed.
pub fn sync_instance_pack(pack_path: &Path, loader: &LoaderInfo) -> PackSyncOutcome {
    let outcome = sync_inner(pack_path, loader);
    match &outcome {
        PackSyncOutcome::Skipped(reason) => info!("Skipping {} loader sync: {}", INSTANCE_PACK_FILE, reason),
        PackSyncOutcome::Unchanged => info!("Loader in {} already matches ({})", INSTANCE_PACK_FILE, loader),
        PackSyncOutcome::Added => info!("Added loader to {}: {}", INSTANCE_PACK_FILE, loader),
        PackSyncOutcome::Updated { from } => info!(
            "Updated loader in {}: {} {} -> {}",
            INSTANCE_PACK_FILE, loader.name, from, loader.version
        ),
        PackSyncOutcome::CachedVersionUpdated => {
            info!("Updated loader cachedVersion in {}: {}", INSTANCE_PACK_FILE, loader)
        }
        PackSyncOutcome::Failed(reason) => warn!("Failed to sync {} loader: {}", INSTANCE_PACK_FILE, reason),
    }
    outcome
}

fn sync_inner(pack_path: &Path, loader: &LoaderInfo) -> PackSyncOutcome {
    if loader.is_blank() {
        return PackSyncOutcome::Skipped("manifest loader is empty".to_string());
    }
    let Some(uid) = loader.component_uid() else {
        return PackSyncOutcome::Skipped(format!("unknown loader name \"{}\"", loader.name));
    };
    if !pack_path.is_file() {
        return PackSyncOutcome::Skipped(format!("{} is missing", pack_path.display()));
    }

    let mut root = match read_pack(pack_path) {
        Ok(root) => root,
        Err(reason) => return PackSyncOutcome::Failed(reason),
    };

    let components = root
        .entry("components")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Some(components) = components.as_array_mut() else {
        return PackSyncOutcome::Failed("\"components\" is not an array".to_string());
    };

    let existing = components
        .iter_mut()
        .filter_map(Value::as_object_mut)
        .find(|c| c.get("uid").and_then(Value::as_str) == Some(uid));

    let outcome = match existing {
        Some(component) => {
            let old_version = string_field(component, "version");
            if old_version != loader.version {
                component.insert("version".into(), Value::String(loader.version.clone()));
                component.insert("cachedVersion".into(), Value::String(loader.version.clone()));
                PackSyncOutcome::Updated { from: old_version }
            } else if string_field(component, "cachedVersion") != loader.version {
                component.insert("cachedVersion".into(), Value::String(loader.version.clone()));
                PackSyncOutcome::CachedVersionUpdated
            } else {
                PackSyncOutcome::Unchanged
            }
        }
        None => {
            let mut component = Map::new();
            component.insert("uid".into(), Value::String(uid.to_string()));
            component.insert("version".into(), Value::String(loader.version.clone()));
            components.push(Value::Object(component));
            PackSyncOutcome::Added
        }
    };

    if outcome == PackSyncOutcome::Unchanged {
        return outcome;
    }

    let rendered = match serde_json::to_string_pretty(&Value::Object(root)) {
        Ok(rendered) => rendered,
        Err(e) => return PackSyncOutcome::Failed(e.to_string()),
    };
    if let Err(e) = fs::write(pack_path, rendered) {
        return PackSyncOutcome::Failed(format!("writing {}: {}", pack_path.display(), e));
    }

    debug!("Rewrote {}", pack_path.display());
    outcome
}

fn read_pack(path: &Path) -> Result<Map<String, Value>, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    match serde_json::from_str::<Value>(&text).map_err(|e| e.to_string())? {
        Value::Object(root) => Ok(root),
        _ => Err("top level is not an object".to_string()),
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
