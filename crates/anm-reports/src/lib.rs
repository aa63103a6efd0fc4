//! # ANM Reports
//!
//! Indicator reporting for field workers (ANMs). Report events are appended to
//! a SQLite store, reference entities (field worker, indicator, date) are
//! resolved through read-through caches, and the events of the current
//! reporting year are aggregated into per-indicator monthly summaries.
//!
//! ## Architecture
//!
//! ```text
//! ReportingService ──> AnmReports ──┬── ReadOnlyCachingRepository<Anm>
//!                                   ├── ReadOnlyCachingRepository<Indicator>
//!                                   ├── CachingRepository<Dates>
//!                                   ├── ReportDataStore   (anm_report_data)
//!                                   ├── AnnualTargetStore (annual_target)
//!                                   ├── Monitor
//!                                   └── Clock
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use anm_reports::{AnmReports, ReportsConfig};
//!
//! let config = ReportsConfig::default();
//! let reports = AnmReports::open(&config)?;
//!
//! reports.save("ANM1", "case-1", "ANC", "2024-05-10", Some("3"))?;
//! let summaries = reports.fetch_anm_summary("ANM1")?;
//! # Ok::<(), anm_reports::Error>(())
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod monitor;
pub mod reports;
pub mod rules;
pub mod service;
pub mod store;
pub mod types;

pub use cache::{Cacheable, CacheableRepository, CachingRepository, ReadOnlyCachingRepository};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ReportingCutoff, ReportsConfig};
pub use error::{Error, Result};
pub use monitor::{Metric, MetricStats, MetricsMonitor, Monitor, Probe};
pub use reports::{AnmReports, SaveOutcome, start_of_reporting_year};
pub use rules::{Rule, RuleRegistry, SafeMap};
pub use service::{IndicatorDefinition, ReportingData, ReportingService, SubmitOutcome};
pub use store::{AnnualTargetStore, ReportDataStore, ReportsDb};
pub use types::{
    Anm, AnmIndicatorSummary, AnmReport, AnnualTarget, Dates, Indicator, MonthSummary,
    ReportEvent,
};
