use crate::{
    cancellation::{Cancelled, Token},
    conflict::{ConflictError, ConflictPolicy},
    Timestamp,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PackAction {
    Created,
    Overwritten,
    Renamed,
}

/// One source file as it was written into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedEntry {
    pub original_path: PathBuf,
    pub entry_name: String,
    pub size: u64,
    pub compressed_size: u64,
    pub modified_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub action: PackAction,
    pub path: PathBuf,
    pub entries: Vec<PackedEntry>,
}

impl Package {
    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|entry| entry.size).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackOutcome {
    Packed(Package),
    /// The conflict policy chose not to write the archive.
    Declined,
}

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("source {} does not exist", .0.display())]
    MissingSource(PathBuf),
    #[error("i/o error on {}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to write archive")]
    Archive(#[source] eyre::Report),
}

/// Turns a source directory into a single archive file.
pub trait Packager: Send + Sync {
    /// Packs `source` (a directory, or a single file) into `<output_root>/<source name>.<ext>`,
    /// consulting `policy` if that file already exists. A cancelled token aborts packing and
    /// removes the partial archive.
    fn pack(
        &self,
        source: &Path,
        output_root: &Path,
        policy: &ConflictPolicy,
        cancel: &Token,
    ) -> Result<PackOutcome, PackError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error("entry '{0}' not found in archive")]
    MissingEntry(String),
    #[error("entry '{0}' would be extracted outside the destination")]
    UnsafeEntry(String),
    #[error("i/o error on {}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to read archive")]
    Archive(#[source] eyre::Report),
}

pub trait Extractor: Send + Sync {
    /// Extracts the named entries of `archive` below `destination`, keeping their relative
    /// paths. Returns the number of bytes written.
    fn extract(
        &self,
        archive: &Path,
        entries: &[String],
        destination: &Path,
        cancel: &Token,
    ) -> Result<u64, ExtractError>;
}

/// Archive file name for a source directory, e.g. `documents.zip` for `/home/me/documents`.
pub fn archive_file_name(source: &Path, extension: &str) -> String {
    let base = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "archive".to_owned());
    format!("{base}.{extension}")
}
