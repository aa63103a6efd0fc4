//! # Monitoring
//!
//! Named timing probes. A [`Probe`] is started for a [`Metric`] and handed
//! back to [`Monitor::end`], which records the elapsed time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Timed sections of the reporting path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Resolving field worker, indicator and date through the caches.
    ReportingAnmReportsCacheTime,
    /// Writing the report rows of one `save` call.
    ReportingAnmReportsInsertTime,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::ReportingAnmReportsCacheTime => "reporting_anm_reports_cache_time",
            Metric::ReportingAnmReportsInsertTime => "reporting_anm_reports_insert_time",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-flight timing measurement.
#[derive(Debug)]
#[must_use = "a probe records nothing until it is passed to Monitor::end"]
pub struct Probe {
    metric: Metric,
    started: Instant,
}

impl Probe {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            started: Instant::now(),
        }
    }
}

/// Sink for timing probes.
pub trait Monitor: Send + Sync {
    fn start(&self, metric: Metric) -> Probe {
        Probe::new(metric)
    }

    fn end(&self, probe: Probe);
}

/// Aggregated timings for one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricStats {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl MetricStats {
    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
    }
}

/// Monitor that logs each probe and keeps per-metric statistics.
#[derive(Debug, Default)]
pub struct MetricsMonitor {
    stats: Mutex<HashMap<Metric, MetricStats>>,
}

impl MetricsMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, metric: Metric) -> MetricStats {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&metric)
            .copied()
            .unwrap_or_default()
    }
}

impl Monitor for MetricsMonitor {
    fn end(&self, probe: Probe) {
        let elapsed = probe.started.elapsed();
        debug!(metric = %probe.metric, elapsed_us = elapsed.as_micros() as u64, "probe");
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(probe.metric)
            .or_default()
            .record(elapsed);
    }
}
