use crate::{format_ts, parse_opt_ts, parse_ts, Database};
use packrat_core::model::{ArchiveLocation, ArchivedFile};
use rusqlite::named_params;
use std::{collections::BTreeMap, path::PathBuf};

#[derive(serde::Deserialize)]
struct FileRow {
    original_path: String,
    entry_name: String,
    archive: String,
    file_size: i64,
    compressed_size: i64,
    modified_at: Option<String>,
    recorded_at: String,
}

impl TryFrom<FileRow> for ArchivedFile {
    type Error = eyre::Report;

    fn try_from(row: FileRow) -> eyre::Result<Self> {
        // parsing an archive location can't fail
        let archive = row.archive.parse().unwrap_or_else(|never| match never {});
        Ok(ArchivedFile {
            original_path: PathBuf::from(row.original_path),
            entry_name: row.entry_name,
            archive,
            size: row.file_size.max(0) as u64,
            compressed_size: row.compressed_size.max(0) as u64,
            modified_at: parse_opt_ts(row.modified_at.as_deref())?,
            recorded_at: parse_ts(&row.recorded_at)?,
        })
    }
}

fn collect_files(rows: rusqlite::Rows<'_>) -> eyre::Result<Vec<ArchivedFile>> {
    serde_rusqlite::from_rows::<FileRow>(rows)
        .map(|row| ArchivedFile::try_from(row?))
        .collect()
}

impl Database {
    pub(crate) fn insert_archived_files(&self, files: &[ArchivedFile]) -> eyre::Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            //language=SQLite
            let mut stmt = tx.prepare_cached(
                "--
INSERT INTO archived_files (original_path, entry_name, archive, file_size, compressed_size,
                            modified_at, recorded_at)
VALUES (:original_path, :entry_name, :archive, :file_size, :compressed_size, :modified_at,
        :recorded_at)",
            )?;
            for file in files {
                stmt.execute(named_params! {
                    ":original_path": file.original_path.to_string_lossy().into_owned(),
                    ":entry_name": file.entry_name,
                    ":archive": file.archive.to_string(),
                    ":file_size": file.size as i64,
                    ":compressed_size": file.compressed_size as i64,
                    ":modified_at": file.modified_at.as_ref().map(format_ts).transpose()?,
                    ":recorded_at": format_ts(&file.recorded_at)?,
                })?;
            }
        }
        tx.commit()?;
        tracing::debug!(count = files.len(), "recorded archived files");
        Ok(())
    }

    pub(crate) fn move_archive(
        &self,
        old: &ArchiveLocation,
        new: &ArchiveLocation,
    ) -> eyre::Result<usize> {
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt =
            conn.prepare_cached("UPDATE archived_files SET archive = ? WHERE archive = ?")?;
        Ok(stmt.execute([new.to_string(), old.to_string()])?)
    }

    pub(crate) fn archive_contents(
        &self,
        location: &ArchiveLocation,
    ) -> eyre::Result<Vec<ArchivedFile>> {
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM archived_files WHERE archive = ? ORDER BY entry_name",
        )?;
        let rows = stmt.query([location.to_string()])?;
        let files = collect_files(rows)?;
        Ok(files)
    }

    /// Most recently recorded files whose entry name or original path contains `query`,
    /// ignoring case. An empty query matches everything.
    pub fn search_files(&self, query: &str, limit: u32) -> eyre::Result<Vec<ArchivedFile>> {
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn.prepare_cached(
            "--
SELECT *
FROM archived_files
WHERE :query = ''
   OR entry_name LIKE '%' || :query || '%' COLLATE NOCASE
   OR original_path LIKE '%' || :query || '%' COLLATE NOCASE
ORDER BY recorded_at DESC, id DESC
LIMIT :limit",
        )?;
        let rows = stmt.query(named_params! { ":query": query, ":limit": limit })?;
        let files = collect_files(rows)?;
        Ok(files)
    }

    /// Entry names that occur in more than one archive, with the archives they occur in.
    pub fn find_duplicates(&self) -> eyre::Result<BTreeMap<String, Vec<ArchiveLocation>>> {
        let conn = self.conn.lock();
        //language=SQLite
        let mut stmt = conn.prepare_cached(
            "--
SELECT DISTINCT entry_name, archive
FROM archived_files
WHERE entry_name IN (SELECT entry_name
                     FROM archived_files
                     GROUP BY entry_name
                     HAVING COUNT(DISTINCT archive) > 1)
ORDER BY entry_name, archive",
        )?;
        let mut rows = stmt.query(())?;
        let mut duplicates: BTreeMap<String, Vec<ArchiveLocation>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let entry_name: String = row.get(0)?;
            let archive: String = row.get(1)?;
            let archive = archive.parse().unwrap_or_else(|never| match never {});
            duplicates.entry(entry_name).or_default().push(archive);
        }
        Ok(duplicates)
    }
}
