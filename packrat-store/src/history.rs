use crate::{format_ts, parse_opt_ts, parse_ts, Database};
use eyre::WrapErr;
use packrat_core::{
    model::{RestoreRecord, RestoreRecordId, Status},
    Timestamp,
};
use std::path::{Path, PathBuf};

#[derive(serde::Deserialize)]
struct RestoreRow {
    id: i64,
    label: String,
    destination_path: String,
    status: String,
    started_at: String,
    finished_at: Option<String>,
    entries: String,
}

impl TryFrom<RestoreRow> for RestoreRecord {
    type Error = eyre::Report;

    fn try_from(row: RestoreRow) -> eyre::Result<Self> {
        Ok(RestoreRecord {
            id: RestoreRecordId(row.id),
            label: row.label,
            destination: PathBuf::from(row.destination_path),
            status: row.status,
            started_at: parse_ts(&row.started_at)?,
            finished_at: parse_opt_ts(row.finished_at.as_deref())?,
            entries: serde_json::from_str(&row.entries)
                .wrap_err("invalid restore history entries")?,
        })
    }
}

impl Database {
    pub(crate) fn insert_restore(
        &self,
        label: &str,
        destination: &Path,
        entries: &[String],
        started_at: Timestamp,
    ) -> eyre::Result<RestoreRecordId> {
        let entries = serde_json::to_string(entries)?;
        let started_at = format_ts(&started_at)?;
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn.prepare_cached(
            "--
INSERT INTO restore_history (label, destination_path, status, started_at, entries)
VALUES (?, ?, ?, ?, ?)
RETURNING id",
        )?;
        let id = stmt.query_row(
            (
                label,
                destination.to_string_lossy().into_owned(),
                RestoreRecord::INITIALIZING,
                started_at,
                entries,
            ),
            |r| r.get(0),
        )?;
        Ok(RestoreRecordId(id))
    }

    pub(crate) fn finish_restore(
        &self,
        id: RestoreRecordId,
        status: Status,
        finished_at: Timestamp,
    ) -> eyre::Result<()> {
        let finished_at = format_ts(&finished_at)?;
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn
            .prepare_cached("UPDATE restore_history SET finished_at = ?, status = ? WHERE id = ?")?;
        stmt.execute((finished_at, status.label(), id.0))?;
        Ok(())
    }

    /// All recorded restores, newest first.
    pub fn list_restore_history(&self) -> eyre::Result<Vec<RestoreRecord>> {
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn
            .prepare_cached("SELECT * FROM restore_history ORDER BY started_at DESC, id DESC")?;
        let rows = stmt.query(())?;
        let records = serde_rusqlite::from_rows::<RestoreRow>(rows)
            .map(|row| RestoreRecord::try_from(row?))
            .collect::<eyre::Result<_>>()?;
        Ok(records)
    }
}
