use rusqlite_migration::{Migrations, M};

pub(crate) fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        //language=SQLite
        M::up(
            r#"--
CREATE TABLE destinations
(
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name     TEXT NOT NULL UNIQUE,
    location TEXT NOT NULL,
    provider TEXT NOT NULL DEFAULT 'local'
);

CREATE TABLE jobs
(
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    name                     TEXT    NOT NULL UNIQUE,
    source_path              TEXT    NOT NULL,
    destination_id           INTEGER NOT NULL,
    move_files               INTEGER NOT NULL DEFAULT 0,
    schedule                 TEXT    NOT NULL DEFAULT 'Manual',
    schedule_hour            INTEGER,
    schedule_minute          INTEGER,
    schedule_date            TEXT,
    schedule_day_of_week     TEXT,
    send_email_on_completion INTEGER NOT NULL DEFAULT 0,
    recipient_email          TEXT,
    status                   TEXT DEFAULT 'Idle',
    last_run_at              TEXT,
    last_run_status          TEXT,
    next_run_at              TEXT,
    created_at               TEXT    NOT NULL,
    FOREIGN KEY (destination_id) REFERENCES destinations (id)
);
"#,
        ),
        //language=SQLite
        M::up(
            r#"--
CREATE TABLE archived_files
(
    id              INTEGER PRIMARY KEY,
    original_path   TEXT    NOT NULL,
    entry_name      TEXT    NOT NULL,
    archive         TEXT    NOT NULL,
    file_size       INTEGER NOT NULL,
    compressed_size INTEGER NOT NULL,
    modified_at     TEXT,
    recorded_at     TEXT    NOT NULL
);

CREATE INDEX archived_files_entry_name_idx ON archived_files (entry_name);
CREATE INDEX archived_files_archive_idx ON archived_files (archive);
"#,
        ),
        //language=SQLite
        M::up(
            r#"--
CREATE TABLE restore_history
(
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    label            TEXT NOT NULL,
    destination_path TEXT NOT NULL,
    status           TEXT NOT NULL,
    started_at       TEXT NOT NULL,
    finished_at      TEXT,
    entries          TEXT NOT NULL
);
"#,
        ),
    ])
}
