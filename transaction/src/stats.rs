//! Counters describing what a manager has done since construction.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated with relaxed ordering.
#[derive(Debug, Default)]
pub struct ManagerStats {
    /// Transactions started.
    pub started: AtomicU64,
    /// Transactions committed.
    pub committed: AtomicU64,
    /// Transactions rolled back.
    pub rolled_back: AtomicU64,
    /// Times a caller parked on a held resource.
    pub waits: AtomicU64,
    /// Wait cycles broken by aborting a victim.
    pub deadlocks_resolved: AtomicU64,
    /// Operations undone because an abort arrived while they ran.
    pub operations_undone: AtomicU64,
}

impl ManagerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wait(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deadlock(&self) {
        self.deadlocks_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_undone_operation(&self) {
        self.operations_undone.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of stats.
    pub fn snapshot(&self) -> ManagerStatsSnapshot {
        ManagerStatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            deadlocks_resolved: self.deadlocks_resolved.load(Ordering::Relaxed),
            operations_undone: self.operations_undone.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ManagerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStatsSnapshot {
    pub started: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub waits: u64,
    pub deadlocks_resolved: u64,
    pub operations_undone: u64,
}
