//! Atomic counters and gauges exposing pool utilization and processing
//! outcomes. Single-word increments; no lock is held while reading a
//! snapshot.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use crate::model::WorkerStats;

pub struct StatsRegistry {
    max_workers: usize,
    active_workers: AtomicUsize,
    queued_jobs: AtomicUsize,
    total_processed: AtomicU64,
    total_successful: AtomicU64,
    total_failed: AtomicU64,
    total_timeout: AtomicU64,
    total_errors: AtomicU64,
    started_at: Instant,
}

impl StatsRegistry {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            active_workers: AtomicUsize::new(0),
            queued_jobs: AtomicUsize::new(0),
            total_processed: AtomicU64::new(0),
            total_successful: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            total_timeout: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn job_enqueued(&self) {
        self.queued_jobs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_dequeued(&self) {
        self.queued_jobs.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_finished(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records one terminal outcome. The four outcome categories are
    /// mutually exclusive; callers pick exactly one.
    pub fn record_outcome(&self, outcome: Outcome) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Outcome::Successful => &self.total_successful,
            Outcome::Failed => &self.total_failed,
            Outcome::Timeout => &self.total_timeout,
            Outcome::Error => &self.total_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerStats {
        let active = self.active_workers.load(Ordering::Relaxed);
        WorkerStats {
            max_workers: self.max_workers,
            active_workers: active,
            available_slots: self.max_workers.saturating_sub(active),
            queued_jobs: self.queued_jobs.load(Ordering::Relaxed),
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_successful: self.total_successful.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_timeout: self.total_timeout.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Successful,
    Failed,
    Timeout,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_slots_derivation() {
        let stats = StatsRegistry::new(5);
        stats.worker_started();
        stats.worker_started();
        let snap = stats.snapshot();
        assert_eq!(snap.active_workers, 2);
        assert_eq!(snap.available_slots, 3);
    }

    #[test]
    fn test_outcomes_are_mutually_exclusive_counters() {
        let stats = StatsRegistry::new(5);
        stats.record_outcome(Outcome::Successful);
        stats.record_outcome(Outcome::Timeout);
        stats.record_outcome(Outcome::Error);

        let snap = stats.snapshot();
        assert_eq!(snap.total_processed, 3);
        assert_eq!(snap.total_successful, 1);
        assert_eq!(snap.total_timeout, 1);
        assert_eq!(snap.total_errors, 1);
        assert_eq!(snap.total_failed, 0);
    }
}
