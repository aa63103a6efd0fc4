#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use anm_reports::{
    Anm, AnmReports, AnnualTarget, AnnualTargetStore, CacheableRepository, Dates, Error,
    FixedClock, Indicator, MetricsMonitor, ReportDataStore, ReportEvent, ReportingCutoff,
    ReportsConfig, Result,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn test_config() -> ReportsConfig {
    let mut config = ReportsConfig::new(":memory:");
    config.reporting_cutoff = ReportingCutoff::new(1, 4);
    config
}

/// In-memory stand-in for every store, with injectable insert failures and
/// per-kind resolution counters.
#[derive(Default)]
pub struct MemoryStore {
    anms: Mutex<HashMap<String, Anm>>,
    indicators: Mutex<HashMap<String, Indicator>>,
    dates: Mutex<HashMap<NaiveDate, Dates>>,
    rows: Mutex<Vec<ReportEvent>>,
    targets: Mutex<Vec<AnnualTarget>>,
    next_id: AtomicUsize,
    insert_attempts: AtomicUsize,
    failing_attempts: Mutex<HashSet<usize>>,
    pub anm_resolutions: AtomicUsize,
    pub indicator_resolutions: AtomicUsize,
    pub date_resolutions: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the given 0-based insert attempts fail.
    pub fn fail_insert_attempts(&self, attempts: &[usize]) {
        self.failing_attempts.lock().unwrap().extend(attempts.iter().copied());
    }

    pub fn add_target(&self, target: AnnualTarget) {
        self.targets.lock().unwrap().push(target);
    }

    pub fn rows(&self) -> Vec<ReportEvent> {
        self.rows.lock().unwrap().clone()
    }

    pub fn resolutions(&self) -> (usize, usize, usize) {
        (
            self.anm_resolutions.load(Ordering::SeqCst),
            self.indicator_resolutions.load(Ordering::SeqCst),
            self.date_resolutions.load(Ordering::SeqCst),
        )
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1
    }
}

impl CacheableRepository<Anm> for MemoryStore {
    fn find(&self, entity: &Anm) -> Result<Option<Anm>> {
        self.anm_resolutions.fetch_add(1, Ordering::SeqCst);
        Ok(self.anms.lock().unwrap().get(&entity.anm_identifier).cloned())
    }

    fn save(&self, entity: &Anm) -> Result<Anm> {
        let id = self.next_id();
        let mut anms = self.anms.lock().unwrap();
        Ok(anms
            .entry(entity.anm_identifier.clone())
            .or_insert_with(|| Anm::new(entity.anm_identifier.clone()).with_id(id))
            .clone())
    }

    fn find_all(&self) -> Result<Vec<Anm>> {
        let mut all: Vec<Anm> = self.anms.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|anm| anm.id);
        Ok(all)
    }
}

impl CacheableRepository<Indicator> for MemoryStore {
    fn find(&self, entity: &Indicator) -> Result<Option<Indicator>> {
        self.indicator_resolutions.fetch_add(1, Ordering::SeqCst);
        Ok(self.indicators.lock().unwrap().get(&entity.indicator).cloned())
    }

    fn save(&self, entity: &Indicator) -> Result<Indicator> {
        let id = self.next_id();
        let mut indicators = self.indicators.lock().unwrap();
        Ok(indicators
            .entry(entity.indicator.clone())
            .or_insert_with(|| Indicator::new(entity.indicator.clone()).with_id(id))
            .clone())
    }

    fn find_all(&self) -> Result<Vec<Indicator>> {
        Ok(self.indicators.lock().unwrap().values().cloned().collect())
    }
}

impl CacheableRepository<Dates> for MemoryStore {
    fn find(&self, entity: &Dates) -> Result<Option<Dates>> {
        self.date_resolutions.fetch_add(1, Ordering::SeqCst);
        Ok(self.dates.lock().unwrap().get(&entity.date).cloned())
    }

    fn save(&self, entity: &Dates) -> Result<Dates> {
        let id = self.next_id();
        let mut dates = self.dates.lock().unwrap();
        Ok(dates
            .entry(entity.date)
            .or_insert_with(|| Dates::new(entity.date).with_id(id))
            .clone())
    }

    fn find_all(&self) -> Result<Vec<Dates>> {
        Ok(self.dates.lock().unwrap().values().cloned().collect())
    }
}

impl ReportDataStore for MemoryStore {
    fn save(
        &self,
        anm: &Anm,
        external_id: &str,
        indicator: &Indicator,
        dates: &Dates,
    ) -> Result<()> {
        let attempt = self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_attempts.lock().unwrap().contains(&attempt) {
            return Err(Error::Schema(format!("injected failure on insert {}", attempt)));
        }

        let id = self.next_id();
        self.rows.lock().unwrap().push(ReportEvent {
            id,
            anm: anm.clone(),
            external_id: external_id.to_string(),
            indicator: indicator.clone(),
            date: dates.clone(),
        });
        Ok(())
    }

    fn fetch_by_anm_and_date(
        &self,
        anm_identifier: &str,
        start_date: NaiveDate,
    ) -> Result<Vec<ReportEvent>> {
        let mut rows: Vec<ReportEvent> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.anm.anm_identifier == anm_identifier && row.date.date >= start_date)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.date.date, row.id));
        Ok(rows)
    }
}

impl AnnualTargetStore for MemoryStore {
    fn fetch_for(
        &self,
        anm_identifier: &str,
        indicator: &Indicator,
        as_of: NaiveDate,
    ) -> Result<Option<AnnualTarget>> {
        Ok(self
            .targets
            .lock()
            .unwrap()
            .iter()
            .find(|t| {
                t.anm_identifier == anm_identifier
                    && t.indicator == indicator.indicator
                    && t.covers(as_of)
            })
            .cloned())
    }
}

/// Reports wired entirely to `store`, with today pinned.
pub fn memory_reports(store: &Arc<MemoryStore>, today: NaiveDate) -> AnmReports {
    AnmReports::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(MetricsMonitor::new()),
        &test_config(),
    )
    .unwrap()
    .with_clock(Arc::new(FixedClock(today)))
}
