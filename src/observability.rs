//! In-process job counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the job lifecycle
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_admitted: AtomicU64,
    jobs_rejected: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_admitted(&self) {
        self.jobs_admitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_admitted", "Metric incremented");
    }

    pub fn job_rejected(&self) {
        self.jobs_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_rejected", "Metric incremented");
    }

    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_completed", "Metric incremented");
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_admitted: self.jobs_admitted.load(Ordering::Relaxed),
            jobs_rejected: self.jobs_rejected.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_admitted: u64,
    pub jobs_rejected: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
}
