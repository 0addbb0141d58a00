use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

/// Upper bound on `name_N.ext` candidates tried before giving up.
pub const MAX_RENAME_ATTEMPTS: u32 = 10_000;

/// What to do when the archive about to be written already exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Resolution {
    Overwrite,
    Rename,
    Cancel,
}

impl FromStr for Resolution {
    type Err = UnknownResolution;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "o" | "overwrite" => Ok(Resolution::Overwrite),
            "r" | "rename" => Ok(Resolution::Rename),
            "c" | "cancel" => Ok(Resolution::Cancel),
            _ => Err(UnknownResolution(s.to_owned())),
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown conflict resolution '{0}'")]
pub struct UnknownResolution(pub String);

/// Asks somebody (usually a person) how to resolve a conflict.
pub trait ConflictPrompt: Send + Sync {
    /// `None` means the question was declined, which cancels packaging.
    fn ask(&self, existing: &Path) -> Option<Resolution>;
}

#[derive(Clone)]
pub enum ConflictPolicy {
    Fixed(Resolution),
    Ask(Arc<dyn ConflictPrompt>),
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        ConflictPolicy::Fixed(Resolution::Rename)
    }
}

impl From<Resolution> for ConflictPolicy {
    fn from(resolution: Resolution) -> Self {
        ConflictPolicy::Fixed(resolution)
    }
}

impl fmt::Debug for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::Fixed(resolution) => f.debug_tuple("Fixed").field(resolution).finish(),
            ConflictPolicy::Ask(_) => f.write_str("Ask"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("no free name found for {} after {} attempts", .0.display(), MAX_RENAME_ATTEMPTS)]
    RenameExhausted(PathBuf),
}

/// Picks the path an archive should be written to.
///
/// Returns `Ok(None)` if the conflict resolution was to cancel.
pub fn resolve(path: &Path, policy: &ConflictPolicy) -> Result<Option<PathBuf>, ConflictError> {
    if !path.exists() {
        return Ok(Some(path.to_owned()));
    }
    let resolution = match policy {
        ConflictPolicy::Fixed(resolution) => Some(*resolution),
        ConflictPolicy::Ask(prompt) => prompt.ask(path),
    };
    match resolution {
        Some(Resolution::Overwrite) => Ok(Some(path.to_owned())),
        Some(Resolution::Rename) => renamed(path).map(Some),
        Some(Resolution::Cancel) | None => {
            tracing::info!(path = %path.display(), "archive exists, cancelling");
            Ok(None)
        }
    }
}

fn renamed(path: &Path) -> Result<PathBuf, ConflictError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    (1..=MAX_RENAME_ATTEMPTS)
        .map(|n| path.with_file_name(format!("{stem}_{n}{extension}")))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| ConflictError::RenameExhausted(path.to_owned()))
}
