//! # SQLite Report Store
//!
//! One connection shared behind a mutex. Every write is a single statement or
//! a short transaction, so a failed report row never takes other rows with it.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use super::schema::{init_schema, tune_file_database};
use super::{AnnualTargetStore, ReportDataStore};
use crate::cache::CacheableRepository;
use crate::types::{Anm, AnnualTarget, Dates, Indicator, ReportEvent};
use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed reporting database.
#[derive(Debug)]
pub struct ReportsDb {
    conn: Mutex<Connection>,
}

impl ReportsDb {
    /// Opens (or creates) the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                Error::Schema(format!("failed to create database directory: {}", err))
            })?;
        }

        let conn = Connection::open(path)?;
        tune_file_database(&conn)?;
        init_schema(&conn)?;
        info!(path = %path.display(), "opened reports database");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // Every write is one statement or a transaction that rolls back on drop,
    // so a panic while holding the lock leaves the connection usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a target, creating the referenced field worker and indicator if
    /// needed.
    pub fn save_annual_target(&self, target: &AnnualTarget) -> Result<AnnualTarget> {
        if target.end_date < target.start_date {
            return Err(Error::Schema(format!(
                "annual target ends ({}) before it starts ({})",
                target.end_date, target.start_date
            )));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let anm = get_or_create_anm(&tx, &target.anm_identifier)?;
        let indicator = get_or_create_indicator(&tx, &target.indicator)?;
        tx.execute(
            "INSERT INTO annual_target (anm_id, indicator_id, target, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                persisted_id(anm.id, "anm")?,
                persisted_id(indicator.id, "indicator")?,
                target.target,
                format_date(target.start_date),
                format_date(target.end_date),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(AnnualTarget {
            id: Some(id),
            ..target.clone()
        })
    }

    /// Number of stored report rows.
    pub fn report_row_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM anm_report_data", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }
}

// =============================================================================
// Reference Entities
// =============================================================================

impl CacheableRepository<Anm> for ReportsDb {
    fn find(&self, entity: &Anm) -> Result<Option<Anm>> {
        find_anm(&*self.conn(), &entity.anm_identifier)
    }

    fn save(&self, entity: &Anm) -> Result<Anm> {
        get_or_create_anm(&*self.conn(), &entity.anm_identifier)
    }

    fn find_all(&self) -> Result<Vec<Anm>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, anm_identifier FROM anm ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Anm::new(row.get::<_, String>(1)?).with_id(row.get(0)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl CacheableRepository<Indicator> for ReportsDb {
    fn find(&self, entity: &Indicator) -> Result<Option<Indicator>> {
        find_indicator(&*self.conn(), &entity.indicator)
    }

    fn save(&self, entity: &Indicator) -> Result<Indicator> {
        get_or_create_indicator(&*self.conn(), &entity.indicator)
    }

    fn find_all(&self) -> Result<Vec<Indicator>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, indicator FROM indicator ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Indicator::new(row.get::<_, String>(1)?).with_id(row.get(0)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl CacheableRepository<Dates> for ReportsDb {
    fn find(&self, entity: &Dates) -> Result<Option<Dates>> {
        find_dates(&*self.conn(), entity.date)
    }

    fn save(&self, entity: &Dates) -> Result<Dates> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO dates (date) VALUES (?1)",
            [format_date(entity.date)],
        )?;
        find_dates(&conn, entity.date)?
            .ok_or_else(|| Error::Schema(format!("date {} missing after insert", entity.date)))
    }

    fn find_all(&self) -> Result<Vec<Dates>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, date FROM dates ORDER BY date")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(id, date)| Ok(Dates::new(parse_stored_date(&date)?).with_id(id)))
            .collect()
    }
}

// =============================================================================
// Report Rows and Targets
// =============================================================================

impl ReportDataStore for ReportsDb {
    fn save(
        &self,
        anm: &Anm,
        external_id: &str,
        indicator: &Indicator,
        dates: &Dates,
    ) -> Result<()> {
        let anm_id = persisted_id(anm.id, "anm")?;
        let indicator_id = persisted_id(indicator.id, "indicator")?;
        let date_id = persisted_id(dates.id, "dates")?;

        self.conn().execute(
            "INSERT INTO anm_report_data (anm_id, external_id, indicator_id, date_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![anm_id, external_id, indicator_id, date_id],
        )?;
        Ok(())
    }

    fn fetch_by_anm_and_date(
        &self,
        anm_identifier: &str,
        start_date: NaiveDate,
    ) -> Result<Vec<ReportEvent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT r.id, a.id, a.anm_identifier, r.external_id, i.id, i.indicator, d.id, d.date
             FROM anm_report_data r
             JOIN anm a ON a.id = r.anm_id
             JOIN indicator i ON i.id = r.indicator_id
             JOIN dates d ON d.id = r.date_id
             WHERE a.anm_identifier = ?1 AND d.date >= ?2
             ORDER BY d.date, r.id",
        )?;

        let mut rows = stmt.query(params![anm_identifier, format_date(start_date)])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            let date: String = row.get(7)?;
            events.push(ReportEvent {
                id: row.get(0)?,
                anm: Anm::new(row.get::<_, String>(2)?).with_id(row.get(1)?),
                external_id: row.get(3)?,
                indicator: Indicator::new(row.get::<_, String>(5)?).with_id(row.get(4)?),
                date: Dates::new(parse_stored_date(&date)?).with_id(row.get(6)?),
            });
        }

        Ok(events)
    }
}

impl AnnualTargetStore for ReportsDb {
    fn fetch_for(
        &self,
        anm_identifier: &str,
        indicator: &Indicator,
        as_of: NaiveDate,
    ) -> Result<Option<AnnualTarget>> {
        let conn = self.conn();
        let as_of = format_date(as_of);
        let row = conn
            .query_row(
                "SELECT t.id, t.target, t.start_date, t.end_date
                 FROM annual_target t
                 JOIN anm a ON a.id = t.anm_id
                 JOIN indicator i ON i.id = t.indicator_id
                 WHERE a.anm_identifier = ?1 AND i.indicator = ?2
                   AND t.start_date <= ?3 AND t.end_date >= ?3
                 ORDER BY t.start_date DESC, t.id DESC
                 LIMIT 1",
                params![anm_identifier, indicator.indicator, as_of],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, target, start, end)| {
            Ok(AnnualTarget {
                id: Some(id),
                anm_identifier: anm_identifier.to_string(),
                indicator: indicator.indicator.clone(),
                target,
                start_date: parse_stored_date(&start)?,
                end_date: parse_stored_date(&end)?,
            })
        })
        .transpose()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn find_anm(conn: &Connection, anm_identifier: &str) -> Result<Option<Anm>> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT id FROM anm WHERE anm_identifier = ?1",
            [anm_identifier],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(|id| Anm::new(anm_identifier).with_id(id)))
}

fn get_or_create_anm(conn: &Connection, anm_identifier: &str) -> Result<Anm> {
    conn.execute(
        "INSERT OR IGNORE INTO anm (anm_identifier) VALUES (?1)",
        [anm_identifier],
    )?;
    find_anm(conn, anm_identifier)?
        .ok_or_else(|| Error::Schema(format!("anm '{}' missing after insert", anm_identifier)))
}

fn find_indicator(conn: &Connection, indicator: &str) -> Result<Option<Indicator>> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT id FROM indicator WHERE indicator = ?1",
            [indicator],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(|id| Indicator::new(indicator).with_id(id)))
}

fn get_or_create_indicator(conn: &Connection, indicator: &str) -> Result<Indicator> {
    conn.execute(
        "INSERT OR IGNORE INTO indicator (indicator) VALUES (?1)",
        [indicator],
    )?;
    find_indicator(conn, indicator)?
        .ok_or_else(|| Error::Schema(format!("indicator '{}' missing after insert", indicator)))
}

fn find_dates(conn: &Connection, date: NaiveDate) -> Result<Option<Dates>> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT id FROM dates WHERE date = ?1",
            [format_date(date)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(|id| Dates::new(date).with_id(id)))
}

fn persisted_id(id: Option<i64>, table: &str) -> Result<i64> {
    id.ok_or_else(|| Error::Schema(format!("{} entity has not been persisted", table)))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_stored_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| Error::Schema(format!("stored date '{}' is invalid", value)))
}
