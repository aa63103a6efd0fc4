//! Reporting configuration.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{Error, Result};

/// Day and month on which a reporting year begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReportingCutoff {
    pub day: u32,
    pub month: u32,
}

impl ReportingCutoff {
    pub fn new(day: u32, month: u32) -> Self {
        Self { day, month }
    }

    /// The cutoff date in the given calendar year.
    pub fn in_year(&self, year: i32) -> Result<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).ok_or_else(|| {
            Error::Config(format!(
                "reporting cutoff day {} month {} is not a calendar date in {}",
                self.day, self.month, year
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        // 2023 is not a leap year, so 29 February is rejected up front.
        self.in_year(2023).map(|_| ())
    }
}

impl Default for ReportingCutoff {
    fn default() -> Self {
        Self { day: 26, month: 3 }
    }
}

/// Configuration for the reporting store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// First day of the reporting year.
    pub reporting_cutoff: ReportingCutoff,
    /// Max entries held by each reference cache.
    pub cache_capacity: usize,
}

impl ReportsConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            reporting_cutoff: ReportingCutoff::default(),
            cache_capacity: 10_000,
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|err| Error::Config(format!("invalid configuration: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.reporting_cutoff.validate()?;
        self.cache_capacity()?;
        Ok(())
    }

    pub fn cache_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.cache_capacity)
            .ok_or_else(|| Error::Config("cache_capacity must be >= 1".to_string()))
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self::new("reports.db")
    }
}
