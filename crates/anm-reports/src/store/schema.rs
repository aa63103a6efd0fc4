//! # Reports SQLite Schema
//!
//! Reference tables (`anm`, `indicator`, `dates`), the append-only
//! `anm_report_data` table and `annual_target`.

use rusqlite::{Connection, OptionalExtension};

use crate::{Error, Result};

const REPORTS_SCHEMA_VERSION: i32 = 1;

const CREATE_REFERENCE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS anm (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    anm_identifier TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS indicator (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    indicator TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS dates (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL UNIQUE
);
"#;

const CREATE_REPORT_DATA: &str = r#"
CREATE TABLE IF NOT EXISTS anm_report_data (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    anm_id       INTEGER NOT NULL REFERENCES anm(id),
    external_id  TEXT NOT NULL,
    indicator_id INTEGER NOT NULL REFERENCES indicator(id),
    date_id      INTEGER NOT NULL REFERENCES dates(id)
);

CREATE TABLE IF NOT EXISTS annual_target (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    anm_id       INTEGER NOT NULL REFERENCES anm(id),
    indicator_id INTEGER NOT NULL REFERENCES indicator(id),
    target       INTEGER NOT NULL,
    start_date   TEXT NOT NULL,
    end_date     TEXT NOT NULL
);
"#;

const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS anm_report_data_anm
ON anm_report_data(anm_id, date_id);

CREATE INDEX IF NOT EXISTS annual_target_lookup
ON annual_target(anm_id, indicator_id, start_date);
"#;

const CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS reports_metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON")?;
    conn.execute_batch("PRAGMA temp_store = MEMORY")?;
    conn.execute_batch(CREATE_REFERENCE_TABLES)?;
    conn.execute_batch(CREATE_REPORT_DATA)?;
    conn.execute_batch(CREATE_INDEXES)?;
    conn.execute_batch(CREATE_METADATA)?;

    ensure_schema_version(conn)
}

/// WAL and relaxed sync only make sense for file-backed databases.
pub fn tune_file_database(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL")?;
    conn.execute_batch("PRAGMA synchronous = NORMAL")?;
    Ok(())
}

fn ensure_schema_version(conn: &Connection) -> Result<()> {
    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM reports_metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match version {
        Some(value) => {
            let parsed: i32 = value
                .parse()
                .map_err(|_| Error::Schema("reports schema version is invalid".to_string()))?;
            if parsed != REPORTS_SCHEMA_VERSION {
                return Err(Error::Schema(format!(
                    "reports schema version mismatch: database has version {parsed}, expected {REPORTS_SCHEMA_VERSION}"
                )));
            }
        }
        None => {
            conn.execute(
                "INSERT INTO reports_metadata (key, value) VALUES ('schema_version', ?)",
                [REPORTS_SCHEMA_VERSION.to_string()],
            )?;
        }
    }

    Ok(())
}
