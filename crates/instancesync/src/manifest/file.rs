//! Reading and writing the manifest document.
//!
//! The document is a JSON object preceded by a `//` comment line. Each
//! category is a top-level array of `[filename, id1, id2, side]` rows, and an
//! optional `"loader": [name, version]` pair names the mod loader the pack
//! targets. Saving always rewrites the comment line and puts one row per line,
//! so diffs between runs stay readable.

use std::fs;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::entry::{ContentEntry, EntryError};
use crate::error::{Result, SyncError};
use crate::loader::LoaderInfo;

pub const MANIFEST_FILE_NAME: &str = "modlist.json";

pub const HEADER_COMMENT: &str = "// [filename, project-id/mod-id, file-id/version, side]";

const LOADER_KEY: &str = "loader";

#[derive(Error, Debug)]
pub enum ManifestParseError {
    #[error("invalid JSON")]
    Json(#[from] serde_json::Error),

    #[error("top level is not an object")]
    NotAnObject,
}

/// A manifest row that could not be turned into an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// Position in the category array
    pub index: usize,
    /// First field, when it was readable
    pub filename: Option<String>,
    pub error: EntryError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestCategory {
    pub name: String,
    pub entries: Vec<ContentEntry>,
    pub rejected: Vec<RejectedRow>,
}

impl ManifestCategory {
    pub fn new<S: Into<String>>(name: S, entries: Vec<ContentEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
            rejected: Vec::new(),
        }
    }

    /// Filenames of rejected rows, which still count as known on disk
    pub fn rejected_filenames(&self) -> impl Iterator<Item = &str> {
        self.rejected.iter().filter_map(|row| row.filename.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub loader: Option<LoaderInfo>,
    pub categories: Vec<ManifestCategory>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SyncError::ManifestMissing(path.to_path_buf()));
        }

        let text = fs::read_to_string(path).map_err(|source| SyncError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&text).map_err(|source| SyncError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> std::result::Result<Self, ManifestParseError> {
        let body: String = text
            .lines()
            .filter(|line| !line.trim_start().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        let root: Value = serde_json::from_str(&body)?;
        let Value::Object(root) = root else {
            return Err(ManifestParseError::NotAnObject);
        };

        let mut manifest = Manifest::default();
        for (key, value) in root {
            if key == LOADER_KEY {
                manifest.loader = parse_loader(&value);
                continue;
            }

            let Value::Array(rows) = value else {
                warn!("Ignoring manifest key \"{}\": not an array", key);
                continue;
            };

            let mut category = ManifestCategory::new(key, Vec::with_capacity(rows.len()));
            for (index, row) in rows.iter().enumerate() {
                match parse_row(row) {
                    Ok(entry) => category.entries.push(entry),
                    Err(error) => category.rejected.push(RejectedRow {
                        index,
                        filename: first_field(row),
                        error,
                    }),
                }
            }
            manifest.categories.push(category);
        }

        Ok(manifest)
    }

    pub fn category(&self, name: &str) -> Option<&ManifestCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Replace the rows of `name`, appending the category if it is new
    pub fn set_category(&mut self, name: &str, entries: Vec<ContentEntry>) {
        match self.categories.iter_mut().find(|c| c.name == name) {
            Some(category) => {
                category.entries = entries;
                category.rejected.clear();
            }
            None => self.categories.push(ManifestCategory::new(name, entries)),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER_COMMENT);
        out.push_str("\n{\n");

        let (name, version) = self
            .loader
            .as_ref()
            .map(|l| (l.name.as_str(), l.version.as_str()))
            .unwrap_or(("", ""));
        out.push_str(&format!("\"{}\": [{}, {}]", LOADER_KEY, json_string(name), json_string(version)));
        out.push_str(if self.categories.is_empty() { "\n" } else { ",\n" });

        for (i, category) in self.categories.iter().enumerate() {
            out.push_str(&format!("{}:[\n", json_string(&category.name)));
            for (j, entry) in category.entries.iter().enumerate() {
                let [filename, first, second, side] = entry.to_columns();
                out.push_str(&format!(
                    "  [{}, {}, {}, {}]",
                    json_string(&filename),
                    json_string(&first),
                    json_string(&second),
                    json_string(&side)
                ));
                if j + 1 < category.entries.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(if i + 1 < self.categories.len() { "],\n" } else { "]\n" });
        }

        out.push_str("}\n");
        out
    }

    /// Write the rendered manifest next to `path`, then move it into place
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = std::path::PathBuf::from(temp_name);

        let write_err = |source| SyncError::ManifestWrite {
            path: path.to_path_buf(),
            source,
        };

        fs::write(&temp_path, self.render()).map_err(write_err)?;
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(write_err(e));
        }

        debug!("Wrote manifest {}", path.display());
        Ok(())
    }
}

fn parse_loader(value: &Value) -> Option<LoaderInfo> {
    let pair = value.as_array()?;
    let name = scalar(pair.first()?)?;
    let version = scalar(pair.get(1)?)?;
    let loader = LoaderInfo::new(name, version);
    (!loader.is_blank()).then_some(loader)
}

fn parse_row(row: &Value) -> std::result::Result<ContentEntry, EntryError> {
    let fields = row.as_array().ok_or(EntryError::NotARow)?;
    if fields.len() < 4 {
        return Err(EntryError::ShortRow(fields.len()));
    }

    let mut columns: [String; 4] = Default::default();
    for (i, column) in columns.iter_mut().enumerate() {
        *column = scalar(&fields[i]).ok_or(EntryError::NonScalarField(i))?;
    }

    let [filename, first, second, side] = &columns;
    ContentEntry::from_columns(filename, first, second, side)
}

fn first_field(row: &Value) -> Option<String> {
    row.as_array()
        .and_then(|fields| fields.first())
        .and_then(scalar)
        .filter(|name| !name.trim().is_empty())
}

/// Strings as-is, numbers in their decimal form
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Side;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"// [filename, project-id/mod-id, file-id/version, side]
{
"loader": ["NeoForge", "21.1.77"],
"mods":[
  ["cloth-config-12.0.jar", "308769", "5246236", "both"],
  ["sodium-0.5.jar.disabled", "AANobbMI", "Yp8wLY1P", "client"]
],
"shaderpacks":[
  ["Complementary.zip", 627557, 5390404, "client"]
],
"resourcepacks":[
],
"datapacks":[
  ["broken.zip", "1", "2"],
  ["weird.zip", "1", "2", " "],
  "not a row"
]
}"#;

    #[test]
    fn parse_tolerates_comment_and_reads_rows() {
        let manifest = Manifest::parse(SAMPLE).unwrap();

        assert_eq!(manifest.loader, Some(LoaderInfo::new("NeoForge", "21.1.77")));
        assert_eq!(
            manifest.categories.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            ["mods", "shaderpacks", "resourcepacks", "datapacks"]
        );

        let mods = manifest.category("mods").unwrap();
        assert_eq!(mods.entries[0], ContentEntry::curseforge("cloth-config-12.0.jar", 308769, 5246236, Side::Both));
        assert_eq!(mods.entries[1], ContentEntry::modrinth("sodium-0.5.jar.disabled", "AANobbMI", "Yp8wLY1P", Side::Client));

        // numeric fields are read in decimal form
        let shaders = manifest.category("shaderpacks").unwrap();
        assert_eq!(shaders.entries[0], ContentEntry::curseforge("Complementary.zip", 627557, 5390404, Side::Client));

        assert!(manifest.category("resourcepacks").unwrap().entries.is_empty());
    }

    #[test]
    fn malformed_rows_are_rejected_not_fatal() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let datapacks = manifest.category("datapacks").unwrap();

        assert!(datapacks.entries.is_empty());
        assert_eq!(
            datapacks.rejected,
            vec![
                RejectedRow { index: 0, filename: Some("broken.zip".into()), error: EntryError::ShortRow(3) },
                RejectedRow {
                    index: 1,
                    filename: Some("weird.zip".into()),
                    error: EntryError::InvalidSide(" ".into()),
                },
                RejectedRow { index: 2, filename: None, error: EntryError::NotARow },
            ]
        );
        assert_eq!(datapacks.rejected_filenames().collect::<Vec<_>>(), ["broken.zip", "weird.zip"]);
    }

    #[test]
    fn unknown_side_is_kept_and_written_back() {
        let text = "{\"mods\": [[\"jei.jar\", \"238222\", \"2000001\", \"client-only\"]]}";
        let manifest = Manifest::parse(text).unwrap();
        let mods = manifest.category("mods").unwrap();

        assert!(mods.rejected.is_empty());
        assert_eq!(mods.entries[0].side, Side::Other("client-only".into()));
        assert!(manifest.render().contains(r#"  ["jei.jar", "238222", "2000001", "client-only"]"#));
    }

    #[test]
    fn non_object_document_is_an_error() {
        assert!(matches!(Manifest::parse("[1, 2]"), Err(ManifestParseError::NotAnObject)));
        assert!(matches!(Manifest::parse("{ nope"), Err(ManifestParseError::Json(_))));
    }

    #[test]
    fn blank_loader_reads_as_none() {
        let manifest = Manifest::parse(r#"{"loader": ["", ""], "mods": []}"#).unwrap();
        assert_eq!(manifest.loader, None);
    }

    #[test]
    fn render_matches_expected_layout() {
        let mut manifest = Manifest {
            loader: Some(LoaderInfo::new("Fabric Loader", "0.16.9")),
            categories: Vec::new(),
        };
        manifest.set_category(
            "mods",
            vec![
                ContentEntry::curseforge("a b.jar", 1, 1234567, Side::Both),
                ContentEntry::modrinth("c.jar", "AAAA", "BBBB", Side::Server),
            ],
        );
        manifest.set_category("shaderpacks", Vec::new());

        let expected = concat!(
            "// [filename, project-id/mod-id, file-id/version, side]\n",
            "{\n",
            "\"loader\": [\"Fabric Loader\", \"0.16.9\"],\n",
            "\"mods\":[\n",
            "  [\"a b.jar\", \"1\", \"1234567\", \"both\"],\n",
            "  [\"c.jar\", \"AAAA\", \"BBBB\", \"server\"]\n",
            "],\n",
            "\"shaderpacks\":[\n",
            "]\n",
            "}\n",
        );
        assert_eq!(manifest.render(), expected);
    }

    #[test]
    fn save_then_load_keeps_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);

        let mut manifest = Manifest::default();
        manifest.set_category("mods", vec![ContentEntry::curseforge("q\"uote.jar", 10, 2000000, Side::Client)]);
        manifest.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert!(!dir.path().join("modlist.json.tmp").exists());
        assert!(std::fs::read_to_string(&path).unwrap().starts_with(HEADER_COMMENT));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempdir().unwrap();
        let err = Manifest::load(&dir.path().join(MANIFEST_FILE_NAME)).unwrap_err();
        assert!(matches!(err, SyncError::ManifestMissing(_)));
    }
}
