use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Terminal classification of one candidate, for accounting purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Reported,
    Suppressed,
    Failed,
}

/// Read-only view of scan progress at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub total: usize,
    pub completed: usize,
    pub in_flight: usize,
    pub remaining: usize,
    pub reported: usize,
    pub suppressed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Counts dispatched and completed work across all workers.
///
/// All counters are atomics so a progress observer can snapshot at any
/// cadence without blocking the scan. At completion,
/// `reported + suppressed + failed == completed == total started`.
#[derive(Debug)]
pub struct ScanTracker {
    total: AtomicUsize,
    started: AtomicUsize,
    completed: AtomicUsize,
    reported: AtomicUsize,
    suppressed: AtomicUsize,
    failed: AtomicUsize,
    started_at: Instant,
}

impl ScanTracker {
    pub fn new() -> Self {
        Self {
            total: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            reported: AtomicUsize::new(0),
            suppressed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record the expected candidate count once the source size is known.
    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// A candidate was dispatched to a worker (first attempt only).
    pub fn note_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    /// A candidate reached its terminal result.
    pub fn note_finished(&self, completion: Completion) {
        match completion {
            Completion::Reported => self.reported.fetch_add(1, Ordering::Relaxed),
            Completion::Suppressed => self.suppressed.fetch_add(1, Ordering::Relaxed),
            Completion::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        let total = self.total.load(Ordering::Relaxed);
        let started = self.started.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);

        Snapshot {
            total: total.max(started),
            completed,
            in_flight: started.saturating_sub(completed),
            remaining: total.max(started).saturating_sub(started),
            reported: self.reported.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            elapsed: self.started_at.elapsed(),
        }
    }

    /// True once every started candidate is terminal and the total is reached.
    pub fn is_complete(&self) -> bool {
        let snapshot = self.snapshot();
        snapshot.in_flight == 0 && snapshot.completed == snapshot.total
    }
}

impl Default for ScanTracker {
    fn default() -> Self {
        Self::new()
    }
}
