//! Refresh counters for observability.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters owned by one cache instance.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
    /// Completed refresh cycles (all projects attempted)
    cycles: AtomicUsize,

    /// Project refreshes that replaced a snapshot
    project_refreshes: AtomicUsize,

    /// Project refreshes that failed and left the snapshot untouched
    project_failures: AtomicUsize,
}

impl RefreshMetrics {
    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_project_refresh(&self) {
        self.project_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_project_failure(&self) {
        self.project_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycles(&self) -> usize {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn project_refreshes(&self) -> usize {
        self.project_refreshes.load(Ordering::Relaxed)
    }

    pub fn project_failures(&self) -> usize {
        self.project_failures.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> MetricsReport {
        let refreshes = self.project_refreshes();
        let failures = self.project_failures();
        let attempts = refreshes + failures;

        let success_rate = if attempts > 0 {
            (refreshes as f64 / attempts as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cycles: self.cycles(),
            project_refreshes: refreshes,
            project_failures: failures,
            success_rate,
        }
    }
}

/// Point-in-time copy of [`RefreshMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub cycles: usize,
    pub project_refreshes: usize,
    pub project_failures: usize,

    /// Project refresh success rate as a percentage (0-100)
    pub success_rate: f64,
}
