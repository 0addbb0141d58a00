use crate::{
    model::{ArchiveLocation, ArchivedFile, JobDescriptor, JobId, RestoreRecordId, Status},
    Timestamp,
};
use std::path::Path;

/// A change of a job's persisted run state. Fields left as `None` keep their stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: Status,
    /// `Some(None)` clears the next run, e.g. for a `Once` job that has run.
    pub next_run_at: Option<Option<Timestamp>>,
    pub last_run: Option<LastRun>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LastRun {
    pub at: Timestamp,
    pub outcome: Status,
}

impl StatusUpdate {
    pub fn new(status: Status) -> Self {
        StatusUpdate {
            status,
            next_run_at: None,
            last_run: None,
        }
    }

    pub fn next_run_at(mut self, next_run_at: Option<Timestamp>) -> Self {
        self.next_run_at = Some(next_run_at);
        self
    }

    pub fn last_run(mut self, at: Timestamp, outcome: Status) -> Self {
        self.last_run = Some(LastRun { at, outcome });
        self
    }
}

/// Persistent storage for jobs, archived files and restore history.
///
/// Calls block; async callers should keep them short or move them to the blocking pool.
pub trait JobStore: Send + Sync {
    fn list_jobs(&self) -> eyre::Result<Vec<JobDescriptor>>;

    fn get_job(&self, name: &str) -> eyre::Result<Option<JobDescriptor>>;

    fn update_status(&self, id: JobId, update: &StatusUpdate) -> eyre::Result<()>;

    fn record_archived_files(&self, files: &[ArchivedFile]) -> eyre::Result<()>;

    /// Re-points every file recorded for `old` to `new`. Returns the number of files moved.
    fn update_archive_location(
        &self,
        old: &ArchiveLocation,
        new: &ArchiveLocation,
    ) -> eyre::Result<usize>;

    fn files_in_archive(&self, location: &ArchiveLocation) -> eyre::Result<Vec<ArchivedFile>>;

    fn add_restore_history(
        &self,
        label: &str,
        destination: &Path,
        entries: &[String],
        started_at: Timestamp,
    ) -> eyre::Result<RestoreRecordId>;

    fn finish_restore_history(
        &self,
        id: RestoreRecordId,
        status: Status,
        finished_at: Timestamp,
    ) -> eyre::Result<()>;
}
