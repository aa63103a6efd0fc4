//! # ANM Reports
//!
//! Writes report rows through the reference caches and aggregates a field
//! worker's rows for the current reporting year into monthly summaries.
//!
//! ## Save Path
//!
//! ```text
//! save(anm, case, indicator, date, quantity)
//!     │
//!     ├── parse date + quantity           (errors propagate)
//!     ├── [cache probe]  resolve anm / indicator / date via caches
//!     └── [insert probe] write `quantity` rows, each independently
//!                          └── on failure: evict the three cache entries,
//!                              count it, keep going
//! ```
//!
//! A multi-row save is best-effort: rows already written stay written when a
//! later row fails, and the call still returns `Ok`. The number of failed
//! rows is reported in [`SaveOutcome`].

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tracing::warn;

use crate::cache::{CacheableRepository, CachingRepository, ReadOnlyCachingRepository};
use crate::clock::{Clock, SystemClock};
use crate::config::{ReportingCutoff, ReportsConfig};
use crate::monitor::{Metric, MetricsMonitor, Monitor};
use crate::store::{AnnualTargetStore, ReportDataStore, ReportsDb};
use crate::types::{
    Anm, AnmIndicatorSummary, AnmReport, Dates, Indicator, MonthSummary, ReportEvent,
};
use crate::{Error, Result};

const REPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Result of one [`AnmReports::save`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Rows asked for: the parsed quantity, or 0 when it is not positive.
    pub requested: u32,
    pub written: u32,
    pub failed: u32,
}

impl SaveOutcome {
    pub fn is_complete(&self) -> bool {
        self.written == self.requested
    }
}

/// Report aggregation and caching repository.
pub struct AnmReports {
    cached_anms: ReadOnlyCachingRepository<Anm>,
    cached_indicators: ReadOnlyCachingRepository<Indicator>,
    cached_dates: CachingRepository<Dates>,
    report_data: Arc<dyn ReportDataStore>,
    annual_targets: Arc<dyn AnnualTargetStore>,
    monitor: Arc<dyn Monitor>,
    clock: Arc<dyn Clock>,
    cutoff: ReportingCutoff,
}

impl AnmReports {
    pub fn new(
        anm_repository: Arc<dyn CacheableRepository<Anm>>,
        indicator_repository: Arc<dyn CacheableRepository<Indicator>>,
        dates_repository: Arc<dyn CacheableRepository<Dates>>,
        report_data: Arc<dyn ReportDataStore>,
        annual_targets: Arc<dyn AnnualTargetStore>,
        monitor: Arc<dyn Monitor>,
        config: &ReportsConfig,
    ) -> Result<Self> {
        config.validate()?;
        let capacity = config.cache_capacity()?;

        Ok(Self {
            cached_anms: ReadOnlyCachingRepository::new(anm_repository, capacity),
            cached_indicators: ReadOnlyCachingRepository::new(indicator_repository, capacity),
            cached_dates: CachingRepository::new(dates_repository, capacity),
            report_data,
            annual_targets,
            monitor,
            clock: Arc::new(SystemClock),
            cutoff: config.reporting_cutoff,
        })
    }

    /// Wires every store to one SQLite database.
    pub fn from_db(
        db: Arc<ReportsDb>,
        monitor: Arc<dyn Monitor>,
        config: &ReportsConfig,
    ) -> Result<Self> {
        Self::new(db.clone(), db.clone(), db.clone(), db.clone(), db, monitor, config)
    }

    /// Opens the database named by the config.
    pub fn open(config: &ReportsConfig) -> Result<Self> {
        let db = Arc::new(ReportsDb::open(&config.db_path)?);
        Self::from_db(db, Arc::new(MetricsMonitor::new()), config)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn anm_cache(&self) -> &ReadOnlyCachingRepository<Anm> {
        &self.cached_anms
    }

    pub fn indicator_cache(&self) -> &ReadOnlyCachingRepository<Indicator> {
        &self.cached_indicators
    }

    pub fn dates_cache(&self) -> &CachingRepository<Dates> {
        &self.cached_dates
    }

    // =========================================================================
    // Save
    // =========================================================================

    /// Records `quantity` (default 1) units of `indicator` activity for the
    /// field worker on `date` (`YYYY-MM-DD`).
    pub fn save(
        &self,
        anm_identifier: &str,
        external_id: &str,
        indicator: &str,
        date: &str,
        quantity: Option<&str>,
    ) -> Result<SaveOutcome> {
        let date = parse_report_date(date)?;
        let count = parse_quantity(quantity)?;

        let probe = self.monitor.start(Metric::ReportingAnmReportsCacheTime);
        let resolved = self.resolve_references(anm_identifier, indicator, date);
        self.monitor.end(probe);
        let (anm, indicator, dates) = resolved?;

        let probe = self.monitor.start(Metric::ReportingAnmReportsInsertTime);
        let mut outcome = SaveOutcome {
            requested: count,
            written: 0,
            failed: 0,
        };
        for _ in 0..count {
            match self.report_data.save(&anm, external_id, &indicator, &dates) {
                Ok(()) => outcome.written += 1,
                Err(err) => {
                    warn!(
                        anm = %anm.anm_identifier,
                        indicator = %indicator.indicator,
                        date = %dates.date,
                        error = %err,
                        "failed to save report row; evicting cached references"
                    );
                    self.cached_anms.clear(&anm);
                    self.cached_indicators.clear(&indicator);
                    self.cached_dates.clear(&dates);
                    outcome.failed += 1;
                }
            }
        }
        self.monitor.end(probe);

        Ok(outcome)
    }

    fn resolve_references(
        &self,
        anm_identifier: &str,
        indicator: &str,
        date: NaiveDate,
    ) -> Result<(Anm, Indicator, Dates)> {
        let anm = self.cached_anms.fetch(&Anm::new(anm_identifier))?;
        let indicator = self.cached_indicators.fetch(&Indicator::new(indicator))?;
        let dates = self.cached_dates.fetch(&Dates::new(date))?;
        Ok((anm, indicator, dates))
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    /// Per-indicator monthly summaries of the field worker's activity in the
    /// current reporting year. The current calendar month is not summarized.
    pub fn fetch_anm_summary(&self, anm_identifier: &str) -> Result<Vec<AnmIndicatorSummary>> {
        let today = self.clock.today();
        let start = start_of_reporting_year(today, self.cutoff)?;
        let rows = self.report_data.fetch_by_anm_and_date(anm_identifier, start)?;

        let mut summaries = Vec::new();
        for indicator in distinct_indicators(&rows) {
            let indicator_rows: Vec<&ReportEvent> = rows
                .iter()
                .filter(|row| row.indicator.indicator == indicator.indicator)
                .collect();
            let monthly_summaries = summarize_months(&indicator_rows, today.month0());
            let annual_target = self
                .annual_targets
                .fetch_for(anm_identifier, &indicator, today)?
                .map(|target| target.target);

            summaries.push(AnmIndicatorSummary {
                indicator: indicator.indicator,
                annual_target,
                monthly_summaries,
            });
        }

        Ok(summaries)
    }

    /// Summaries for every known field worker.
    pub fn fetch_all_anms_report(&self) -> Result<Vec<AnmReport>> {
        self.cached_anms
            .fetch_all()?
            .into_iter()
            .map(|anm| -> Result<AnmReport> {
                let indicator_summaries = self.fetch_anm_summary(&anm.anm_identifier)?;
                Ok(AnmReport {
                    anm_identifier: anm.anm_identifier,
                    indicator_summaries,
                })
            })
            .collect()
    }
}

/// First day of the reporting year containing `today`.
pub fn start_of_reporting_year(today: NaiveDate, cutoff: ReportingCutoff) -> Result<NaiveDate> {
    let this_year = cutoff.in_year(today.year())?;
    if today < this_year {
        cutoff.in_year(today.year() - 1)
    } else {
        Ok(this_year)
    }
}

fn parse_report_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, REPORT_DATE_FORMAT).map_err(|source| Error::InvalidDate {
        value: value.to_string(),
        source,
    })
}

/// Number of rows to write. Parsed as a signed 32-bit integer; zero or a
/// negative count writes nothing.
fn parse_quantity(value: Option<&str>) -> Result<u32> {
    let Some(value) = value else {
        return Ok(1);
    };
    let count: i32 = value.parse().map_err(|source| Error::InvalidQuantity {
        value: value.to_string(),
        source,
    })?;
    Ok(u32::try_from(count).unwrap_or(0))
}

fn distinct_indicators(rows: &[ReportEvent]) -> Vec<Indicator> {
    let mut indicators: Vec<Indicator> = Vec::new();
    for row in rows {
        if !indicators.iter().any(|seen| seen.indicator == row.indicator.indicator) {
            indicators.push(row.indicator.clone());
        }
    }
    indicators
}

/// Buckets one indicator's rows by calendar month for months
/// `0..current_month_index`. Empty months are skipped without resetting the
/// running total; a bucket's year is the year of its first row.
fn summarize_months(rows: &[&ReportEvent], current_month_index: u32) -> Vec<MonthSummary> {
    let mut aggregated_progress = 0;
    let mut summaries = Vec::new();

    for month in 0..current_month_index {
        let month_rows: Vec<&ReportEvent> = rows
            .iter()
            .copied()
            .filter(|row| row.date.month_index() == month)
            .collect();
        let Some(first) = month_rows.first() else {
            continue;
        };

        let current_progress = month_rows.len();
        aggregated_progress += current_progress;

        let mut external_ids: Vec<String> = Vec::new();
        for row in &month_rows {
            if !external_ids.contains(&row.external_id) {
                external_ids.push(row.external_id.clone());
            }
        }

        summaries.push(MonthSummary {
            month: month + 1,
            year: first.date.year(),
            current_progress,
            aggregated_progress,
            external_ids,
        });
    }

    summaries
}
