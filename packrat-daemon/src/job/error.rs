use packrat_core::{
    archive::{ExtractError, PackError},
    cancellation::{Cancelled, Reason},
};
use std::{fmt, path::PathBuf};

/// Where a run noticed it should stop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CancelPoint {
    BeforeStart,
    /// The conflict policy declined to replace an existing archive.
    ConflictDeclined,
    Requested(Reason),
}

impl fmt::Display for CancelPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelPoint::BeforeStart => f.write_str("before start"),
            CancelPoint::ConflictDeclined => f.write_str("because the archive already exists"),
            CancelPoint::Requested(reason) => write!(f, "({reason})"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("cancelled {0}")]
    Cancelled(CancelPoint),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("packaging failed: {0}")]
    Packaging(PackError),
    #[error("extraction failed: {0}")]
    Extraction(ExtractError),
    #[error("transfer failed: {0}")]
    Transfer(String),
    #[error("source {} does not exist", .0.display())]
    SourceMissing(PathBuf),
    #[error("unexpected error: {0:#}")]
    Unhandled(eyre::Report),
}

impl JobError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled(_))
    }
}

impl From<Cancelled> for JobError {
    fn from(Cancelled(reason): Cancelled) -> Self {
        JobError::Cancelled(CancelPoint::Requested(reason))
    }
}

impl From<PackError> for JobError {
    fn from(err: PackError) -> Self {
        match err {
            PackError::Cancelled(cancelled) => cancelled.into(),
            PackError::MissingSource(path) => JobError::SourceMissing(path),
            err => JobError::Packaging(err),
        }
    }
}

impl From<ExtractError> for JobError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Cancelled(cancelled) => cancelled.into(),
            err => JobError::Extraction(err),
        }
    }
}
