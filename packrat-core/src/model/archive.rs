use crate::{model::Status, provider::ProviderKind, Timestamp};
use std::{fmt, path::PathBuf, str::FromStr};

/// Where an archive lives: a local zip file, or an object held by a cloud provider.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum ArchiveLocation {
    Local(PathBuf),
    Remote { provider: ProviderKind, id: String },
}

impl ArchiveLocation {
    pub fn remote(provider: ProviderKind, id: impl Into<String>) -> Self {
        ArchiveLocation::Remote {
            provider,
            id: id.into(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ArchiveLocation::Remote { .. })
    }

    /// Short human-readable name, used in status messages.
    pub fn file_name(&self) -> String {
        match self {
            ArchiveLocation::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            ArchiveLocation::Remote { id, .. } => id.clone(),
        }
    }
}

impl fmt::Display for ArchiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveLocation::Local(path) => write!(f, "{}", path.display()),
            ArchiveLocation::Remote { provider, id } => write!(f, "{}://{}", provider.tag(), id),
        }
    }
}

impl FromStr for ArchiveLocation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((scheme, id)) = s.split_once("://") {
            if let Ok(provider) = scheme.parse::<ProviderKind>() {
                if provider != ProviderKind::Local {
                    return Ok(ArchiveLocation::remote(provider, id));
                }
            }
        }
        Ok(ArchiveLocation::Local(PathBuf::from(s)))
    }
}

/// One file that was written into an archive.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ArchivedFile {
    pub original_path: PathBuf,
    /// Path of the entry inside the archive, `/`-separated.
    pub entry_name: String,
    pub archive: ArchiveLocation,
    pub size: u64,
    pub compressed_size: u64,
    pub modified_at: Option<Timestamp>,
    pub recorded_at: Timestamp,
}

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub struct RestoreRecordId(pub i64);

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RestoreRecord {
    pub id: RestoreRecordId,
    pub label: String,
    pub destination: PathBuf,
    /// Free-form while in progress ("Initializing"), a [`Status`] label once finished.
    pub status: String,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub entries: Vec<String>,
}

impl RestoreRecord {
    /// Status of a restore that has been recorded but hasn't finished.
    pub const INITIALIZING: &'static str = "Initializing";

    pub fn final_status(&self) -> Option<Status> {
        self.status.parse().ok()
    }
}
