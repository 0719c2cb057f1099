//! Manifest rows and the side/identity types they are built from

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::disabled;
use crate::error::SyncError;
use crate::resolver::ResolveError;

/// Deployment scope of an entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Side {
    Client,
    Server,
    Both,
    /// Hand-written value outside the three known sides, kept verbatim.
    /// Only the `all` filter fetches these.
    Other(String),
}

impl Side {
    pub fn as_str(&self) -> &str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
            Side::Both => "both",
            Side::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Side::Other(_))
    }

    /// Lenient parse for manifest rows: unknown values become [`Side::Other`],
    /// only a blank side is an error.
    pub fn from_manifest(raw: &str) -> Result<Self, EntryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EntryError::InvalidSide(raw.to_string()));
        }
        Ok(trimmed.parse().unwrap_or_else(|_| Side::Other(trimmed.to_string())))
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = EntryError;

    /// Strict: only client, server and both
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Side::Client),
            "server" => Ok(Side::Server),
            "both" => Ok(Side::Both),
            _ => Err(EntryError::InvalidSide(s.to_string())),
        }
    }
}

/// Which sides a consumer run fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideFilter {
    All,
    /// Client plus both
    Client,
    /// Server plus both
    Server,
    ClientOnly,
    ServerOnly,
    BothOnly,
}

impl SideFilter {
    /// Menu entries in the order the interactive prompt lists them
    pub const MENU: [(SideFilter, &'static str); 6] = [
        (SideFilter::All, "All"),
        (SideFilter::Client, "Client (client + both)"),
        (SideFilter::Server, "Server (server + both)"),
        (SideFilter::ClientOnly, "Client-only"),
        (SideFilter::ServerOnly, "Server-only"),
        (SideFilter::BothOnly, "\"both\"-side only"),
    ];

    /// Map a 1-based menu choice to a filter
    pub fn from_menu_choice(choice: u8) -> Option<Self> {
        Self::MENU
            .get(usize::from(choice).checked_sub(1)?)
            .map(|(filter, _)| *filter)
    }

    pub fn accepts(&self, side: &Side) -> bool {
        match self {
            SideFilter::All => true,
            SideFilter::Client => matches!(side, Side::Client | Side::Both),
            SideFilter::Server => matches!(side, Side::Server | Side::Both),
            SideFilter::ClientOnly => *side == Side::Client,
            SideFilter::ServerOnly => *side == Side::Server,
            SideFilter::BothOnly => *side == Side::Both,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SideFilter::All => "all",
            SideFilter::Client => "client",
            SideFilter::Server => "server",
            SideFilter::ClientOnly => "client-only",
            SideFilter::ServerOnly => "server-only",
            SideFilter::BothOnly => "both-only",
        }
    }
}

impl fmt::Display for SideFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SideFilter {
    type Err = SyncError;

    /// Accepts the filter names as well as the numeric menu choices
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if let Ok(choice) = normalized.parse::<u8>() {
            return Self::from_menu_choice(choice)
                .ok_or_else(|| SyncError::InvalidSideSelection(s.to_string()));
        }
        Self::MENU
            .iter()
            .map(|(filter, _)| *filter)
            .find(|filter| filter.as_str() == normalized)
            .ok_or_else(|| SyncError::InvalidSideSelection(s.to_string()))
    }
}

/// Where an entry is fetched from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    CurseForge { project_id: u64, file_id: u64 },
    Modrinth { mod_id: String, version: String },
}

/// The part of an identity that survives version updates; used as the merge key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StableId {
    CurseForge(u64),
    Modrinth(String),
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StableId::CurseForge(project_id) => write!(f, "curseforge:{}", project_id),
            StableId::Modrinth(mod_id) => write!(f, "modrinth:{}", mod_id),
        }
    }
}

impl Identity {
    /// Build an identity from optional CurseForge and Modrinth parts.
    ///
    /// Exactly one must be present; blank Modrinth fields count as absent.
    pub fn from_parts(
        curseforge: Option<(u64, u64)>,
        modrinth: Option<(String, String)>,
    ) -> Result<Self, ResolveError> {
        let modrinth = modrinth.filter(|(mod_id, version)| {
            !mod_id.trim().is_empty() && !version.trim().is_empty()
        });

        match (curseforge, modrinth) {
            (Some((project_id, file_id)), None) => Ok(Identity::CurseForge { project_id, file_id }),
            (None, Some((mod_id, version))) => Ok(Identity::Modrinth { mod_id, version }),
            _ => Err(ResolveError::AmbiguousOrMissingIdentity),
        }
    }

    /// Classify the two identity columns of a manifest row.
    ///
    /// Both all-digits means `{projectId, fileId}`; anything else is
    /// `{modId, version}`. Returns `None` when a column is blank.
    pub fn classify(first: &str, second: &str) -> Option<Self> {
        let (first, second) = (first.trim(), second.trim());
        if first.is_empty() || second.is_empty() {
            return None;
        }

        if is_digits_only(first) && is_digits_only(second) {
            let project_id = first.parse().ok()?;
            let file_id = second.parse().ok()?;
            return Some(Identity::CurseForge { project_id, file_id });
        }

        Some(Identity::Modrinth {
            mod_id: first.to_string(),
            version: second.to_string(),
        })
    }

    pub fn stable_id(&self) -> StableId {
        match self {
            Identity::CurseForge { project_id, .. } => StableId::CurseForge(*project_id),
            Identity::Modrinth { mod_id, .. } => StableId::Modrinth(mod_id.clone()),
        }
    }

    /// The two manifest columns, in file order
    pub fn columns(&self) -> (String, String) {
        match self {
            Identity::CurseForge { project_id, file_id } => {
                (project_id.to_string(), file_id.to_string())
            }
            Identity::Modrinth { mod_id, version } => (mod_id.clone(), version.clone()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Identity::CurseForge { .. } => "CurseForge",
            Identity::Modrinth { .. } => "Modrinth",
        }
    }
}

fn is_digits_only(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// One row of a manifest category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    /// Name on disk, possibly carrying the disabled marker
    pub filename: String,
    pub side: Side,
    /// `None` for rows that name no usable source; those are never downloaded
    pub identity: Option<Identity>,
}

impl ContentEntry {
    pub fn new<S: Into<String>>(filename: S, side: Side, identity: Identity) -> Self {
        Self {
            filename: filename.into(),
            side,
            identity: Some(identity),
        }
    }

    pub fn unresolved<S: Into<String>>(filename: S, side: Side) -> Self {
        Self {
            filename: filename.into(),
            side,
            identity: None,
        }
    }

    pub fn curseforge<S: Into<String>>(filename: S, project_id: u64, file_id: u64, side: Side) -> Self {
        Self::new(filename, side, Identity::CurseForge { project_id, file_id })
    }

    pub fn modrinth<S, M, V>(filename: S, mod_id: M, version: V, side: Side) -> Self
    where
        S: Into<String>,
        M: Into<String>,
        V: Into<String>,
    {
        Self::new(
            filename,
            side,
            Identity::Modrinth {
                mod_id: mod_id.into(),
                version: version.into(),
            },
        )
    }

    /// Build an entry from the four manifest columns
    pub fn from_columns(filename: &str, first: &str, second: &str, side: &str) -> Result<Self, EntryError> {
        if filename.trim().is_empty() {
            return Err(EntryError::BlankFilename);
        }
        let side = Side::from_manifest(side)?;

        Ok(Self {
            filename: filename.to_string(),
            side,
            identity: Identity::classify(first, second),
        })
    }

    /// The four manifest columns: `[filename, id1, id2, side]`
    pub fn to_columns(&self) -> [String; 4] {
        let (first, second) = self
            .identity
            .as_ref()
            .map(Identity::columns)
            .unwrap_or_default();
        [self.filename.clone(), first, second, self.side.as_str().to_string()]
    }

    pub fn stable_id(&self) -> Option<StableId> {
        self.identity.as_ref().map(Identity::stable_id)
    }

    pub fn is_disabled(&self) -> bool {
        disabled::is_disabled(&self.filename)
    }

    /// Filename without the disabled marker; the name the remote file has
    pub fn remote_filename(&self) -> &str {
        disabled::strip_marker(&self.filename)
    }
}

/// Entry-level defect in a manifest row or package record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("row is not an array")]
    NotARow,

    #[error("row has {0} fields, expected 4")]
    ShortRow(usize),

    #[error("field {0} is not a string or number")]
    NonScalarField(usize),

    #[error("blank filename")]
    BlankFilename,

    #[error("invalid side '{0}'")]
    InvalidSide(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!(" Client ".parse::<Side>().unwrap(), Side::Client);
        assert_eq!("BOTH".parse::<Side>().unwrap(), Side::Both);
        assert_eq!(
            "client-only".parse::<Side>(),
            Err(EntryError::InvalidSide("client-only".to_string()))
        );
    }

    #[test]
    fn manifest_side_keeps_unknown_values() {
        assert_eq!(Side::from_manifest(" Server"), Ok(Side::Server));
        assert_eq!(Side::from_manifest("client-only "), Ok(Side::Other("client-only".into())));
        assert_eq!(Side::from_manifest("  "), Err(EntryError::InvalidSide("  ".into())));
        assert_eq!(Side::Other("client-only".into()).as_str(), "client-only");

        let row = ContentEntry::from_columns("jei.jar", "238222", "2000001", "client-only").unwrap();
        assert_eq!(row.to_columns()[3], "client-only");
    }

    #[test]
    fn side_filter_semantics() {
        use Side::*;
        let cases = [
            (SideFilter::All, [true, true, true]),
            (SideFilter::Client, [true, false, true]),
            (SideFilter::Server, [false, true, true]),
            (SideFilter::ClientOnly, [true, false, false]),
            (SideFilter::ServerOnly, [false, true, false]),
            (SideFilter::BothOnly, [false, false, true]),
        ];
        for (filter, expected) in cases {
            let actual = [filter.accepts(&Client), filter.accepts(&Server), filter.accepts(&Both)];
            assert_eq!(actual, expected, "filter {}", filter);
            assert_eq!(filter.accepts(&Other("client-only".into())), filter == SideFilter::All);
        }
    }

    #[test]
    fn side_filter_from_names_and_menu() {
        assert_eq!("client-only".parse::<SideFilter>().unwrap(), SideFilter::ClientOnly);
        assert_eq!("1".parse::<SideFilter>().unwrap(), SideFilter::All);
        assert_eq!("6".parse::<SideFilter>().unwrap(), SideFilter::BothOnly);
        assert!(matches!(
            "7".parse::<SideFilter>(),
            Err(SyncError::InvalidSideSelection(_))
        ));
        assert!("everything".parse::<SideFilter>().is_err());
        assert_eq!(SideFilter::from_menu_choice(0), None);
    }

    #[test]
    fn classify_uses_digits_only_heuristic() {
        assert_eq!(
            Identity::classify("308769", "5246236"),
            Some(Identity::CurseForge { project_id: 308769, file_id: 5246236 })
        );
        assert_eq!(
            Identity::classify("AANobbMI", "12345"),
            Some(Identity::Modrinth { mod_id: "AANobbMI".into(), version: "12345".into() })
        );
        assert_eq!(Identity::classify("", "5246236"), None);
        assert_eq!(Identity::classify("308769", "  "), None);
    }

    #[test]
    fn from_parts_requires_exactly_one_identity() {
        assert!(Identity::from_parts(Some((1, 2)), None).is_ok());
        assert!(Identity::from_parts(None, Some(("a".into(), "b".into()))).is_ok());
        assert_eq!(
            Identity::from_parts(Some((1, 2)), Some(("a".into(), "b".into()))),
            Err(ResolveError::AmbiguousOrMissingIdentity)
        );
        assert_eq!(
            Identity::from_parts(None, None),
            Err(ResolveError::AmbiguousOrMissingIdentity)
        );
        assert_eq!(
            Identity::from_parts(None, Some(("a".into(), " ".into()))),
            Err(ResolveError::AmbiguousOrMissingIdentity)
        );
    }

    #[test]
    fn columns_follow_manifest_order() {
        let entry = ContentEntry::curseforge("cloth-config-12.0.jar", 308769, 5246236, Side::Both);
        assert_eq!(
            entry.to_columns(),
            ["cloth-config-12.0.jar", "308769", "5246236", "both"].map(String::from)
        );

        let parsed = ContentEntry::from_columns("cloth-config-12.0.jar", "308769", "5246236", "both").unwrap();
        assert_eq!(parsed, entry);
        assert_eq!(parsed.stable_id(), Some(StableId::CurseForge(308769)));
    }

    #[test]
    fn remote_filename_drops_marker() {
        let entry = ContentEntry::modrinth("sodium.jar.disabled", "AANobbMI", "v1", Side::Client);
        assert!(entry.is_disabled());
        assert_eq!(entry.remote_filename(), "sodium.jar");
    }
}
