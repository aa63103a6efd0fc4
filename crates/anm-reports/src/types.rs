//! # Reporting Types
//!
//! Reference entities (field worker, indicator, date), the stored report
//! event, annual targets, and the derived summary shapes returned by the
//! aggregation.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// =============================================================================
// Reference Entities
// =============================================================================

/// A field worker (ANM). Identity is the identifier; `id` is the row id once
/// the entity has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Anm {
    pub id: Option<i64>,
    pub anm_identifier: String,
}

impl Anm {
    pub fn new(anm_identifier: impl Into<String>) -> Self {
        Self {
            id: None,
            anm_identifier: anm_identifier.into(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

/// A named category of reportable activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Indicator {
    pub id: Option<i64>,
    pub indicator: String,
}

impl Indicator {
    pub fn new(indicator: impl Into<String>) -> Self {
        Self {
            id: None,
            indicator: indicator.into(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

/// A calendar date stored once and referenced by report rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dates {
    pub id: Option<i64>,
    pub date: NaiveDate,
}

impl Dates {
    pub fn new(date: NaiveDate) -> Self {
        Self { id: None, date }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Calendar month, 0-based (January = 0).
    pub fn month_index(&self) -> u32 {
        self.date.month0()
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

// =============================================================================
// Stored Rows
// =============================================================================

/// One unit of reported activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEvent {
    pub id: i64,
    pub anm: Anm,
    pub external_id: String,
    pub indicator: Indicator,
    pub date: Dates,
}

/// Yearly target for a field worker and indicator, valid between
/// `start_date` and `end_date` inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnualTarget {
    pub id: Option<i64>,
    pub anm_identifier: String,
    pub indicator: String,
    pub target: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl AnnualTarget {
    pub fn new(
        anm_identifier: impl Into<String>,
        indicator: impl Into<String>,
        target: u32,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            anm_identifier: anm_identifier.into(),
            indicator: indicator.into(),
            target,
            start_date,
            end_date,
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

// =============================================================================
// Derived Summaries
// =============================================================================

/// Activity for one indicator in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    /// Calendar month, 1-based.
    pub month: u32,
    pub year: i32,
    pub current_progress: usize,
    /// Running total over this and every earlier emitted month.
    pub aggregated_progress: usize,
    pub external_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnmIndicatorSummary {
    pub indicator: String,
    pub annual_target: Option<u32>,
    pub monthly_summaries: Vec<MonthSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnmReport {
    pub anm_identifier: String,
    pub indicator_summaries: Vec<AnmIndicatorSummary>,
}
