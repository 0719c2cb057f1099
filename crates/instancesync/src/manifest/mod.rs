//! Manifest model and file format

pub mod entry;
pub mod file;

pub use entry::{ContentEntry, EntryError, Identity, Side, SideFilter, StableId};
pub use file::{
    HEADER_COMMENT, MANIFEST_FILE_NAME, Manifest, ManifestCategory, ManifestParseError, RejectedRow,
};
