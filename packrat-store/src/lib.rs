use eyre::WrapErr;
use packrat_core::{
    model::{ArchiveLocation, ArchivedFile, JobDescriptor, JobId, RestoreRecordId, Status},
    store::{JobStore, StatusUpdate},
    timestamp, Timestamp,
};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

mod files;
mod history;
mod jobs;
mod memory;
mod migrations;

pub use jobs::JobDefinition;
pub use memory::MemoryStore;

/// SQLite-backed job store. All access is serialized through one connection.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> eyre::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .wrap_err_with(|| format!("failed to open database {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "wal")?;
        conn.pragma_update(None, "synchronous", "normal")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> eyre::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> eyre::Result<Self> {
        conn.pragma_update(None, "foreign_keys", "on")?;
        migrations::migrations().to_latest(&mut conn)?;
        tracing::debug!("database ready");
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }
}

fn format_ts(ts: &Timestamp) -> eyre::Result<String> {
    Ok(timestamp::format(ts)?)
}

fn parse_ts(s: &str) -> eyre::Result<Timestamp> {
    timestamp::parse(s).wrap_err_with(|| format!("invalid timestamp '{s}'"))
}

fn parse_opt_ts(s: Option<&str>) -> eyre::Result<Option<Timestamp>> {
    s.filter(|s| !s.is_empty()).map(parse_ts).transpose()
}

impl JobStore for Database {
    fn list_jobs(&self) -> eyre::Result<Vec<JobDescriptor>> {
        self.jobs()
    }

    fn get_job(&self, name: &str) -> eyre::Result<Option<JobDescriptor>> {
        self.job(name)
    }

    fn update_status(&self, id: JobId, update: &StatusUpdate) -> eyre::Result<()> {
        self.update_job_status(id, update)
    }

    fn record_archived_files(&self, files: &[ArchivedFile]) -> eyre::Result<()> {
        self.insert_archived_files(files)
    }

    fn update_archive_location(
        &self,
        old: &ArchiveLocation,
        new: &ArchiveLocation,
    ) -> eyre::Result<usize> {
        self.move_archive(old, new)
    }

    fn files_in_archive(&self, location: &ArchiveLocation) -> eyre::Result<Vec<ArchivedFile>> {
        self.archive_contents(location)
    }

    fn add_restore_history(
        &self,
        label: &str,
        destination: &Path,
        entries: &[String],
        started_at: Timestamp,
    ) -> eyre::Result<RestoreRecordId> {
        self.insert_restore(label, destination, entries, started_at)
    }

    fn finish_restore_history(
        &self,
        id: RestoreRecordId,
        status: Status,
        finished_at: Timestamp,
    ) -> eyre::Result<()> {
        self.finish_restore(id, status, finished_at)
    }
}
