//! # Report Stores
//!
//! Storage seams consumed by [`AnmReports`](crate::AnmReports):
//!
//! - [`CacheableRepository`](crate::CacheableRepository) for the reference
//!   entities (get-or-create by natural key)
//! - [`ReportDataStore`] for the append-only report rows
//! - [`AnnualTargetStore`] for target lookups
//!
//! [`ReportsDb`] implements all of them on one SQLite database.

use chrono::NaiveDate;

use crate::types::{Anm, AnnualTarget, Dates, Indicator, ReportEvent};
use crate::Result;

mod schema;
mod sqlite;

pub use sqlite::ReportsDb;

/// Append-only store of report rows.
pub trait ReportDataStore: Send + Sync {
    /// Writes one report row. The reference entities must already be
    /// persisted (carry an id).
    fn save(&self, anm: &Anm, external_id: &str, indicator: &Indicator, dates: &Dates)
        -> Result<()>;

    /// All rows for the field worker dated on or after `start_date`, ordered
    /// by date then insertion.
    fn fetch_by_anm_and_date(
        &self,
        anm_identifier: &str,
        start_date: NaiveDate,
    ) -> Result<Vec<ReportEvent>>;
}

/// Point lookup of annual targets.
pub trait AnnualTargetStore: Send + Sync {
    /// The target for the field worker and indicator whose validity window
    /// contains `as_of`, if any.
    fn fetch_for(
        &self,
        anm_identifier: &str,
        indicator: &Indicator,
        as_of: NaiveDate,
    ) -> Result<Option<AnnualTarget>>;
}
