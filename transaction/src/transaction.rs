//! Per-caller transaction record: held resources and the undo log.

use std::fmt;

use baton_core::{CallerId, ResourceId, ResourceOperation};

use crate::deadlock::VictimRank;

/// An operation applied inside a transaction, kept for rollback.
pub(crate) struct AppliedOperation<R> {
    pub resource: ResourceId,
    pub operation: Box<dyn ResourceOperation<R>>,
}

/// State of one caller's open transaction on one manager.
pub(crate) struct Transaction<R> {
    owner: CallerId,
    started_at: u64,
    /// Granted resources in grant order, without duplicates.
    held: Vec<ResourceId>,
    /// Successfully applied operations in execution order.
    history: Vec<AppliedOperation<R>>,
    waiting_for: Option<ResourceId>,
    aborted: bool,
    /// Pending abort signal not yet observed by the owner.
    interrupted: bool,
}

impl<R> Transaction<R> {
    pub fn new(owner: CallerId, started_at: u64) -> Self {
        Self {
            owner,
            started_at,
            held: Vec::new(),
            history: Vec::new(),
            waiting_for: None,
            aborted: false,
            interrupted: false,
        }
    }

    pub fn owner(&self) -> CallerId {
        self.owner
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    pub fn rank(&self) -> VictimRank {
        VictimRank {
            started_at: self.started_at,
            caller: self.owner,
        }
    }

    // ========== Locks ==========

    pub fn held_resources(&self) -> &[ResourceId] {
        &self.held
    }

    pub fn holds(&self, resource: ResourceId) -> bool {
        self.held.contains(&resource)
    }

    pub fn grant(&mut self, resource: ResourceId) {
        if !self.holds(resource) {
            self.held.push(resource);
        }
    }

    pub fn waiting_for(&self) -> Option<ResourceId> {
        self.waiting_for
    }

    pub fn wait_on(&mut self, resource: ResourceId) {
        self.waiting_for = Some(resource);
    }

    /// Clear the wait marker, returning the resource that was awaited.
    pub fn stop_waiting(&mut self) -> Option<ResourceId> {
        self.waiting_for.take()
    }

    // ========== Abort ==========

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn signal_interrupt(&mut self) {
        self.interrupted = true;
    }

    /// Consume a pending abort signal.
    pub fn take_interrupt(&mut self) -> bool {
        std::mem::take(&mut self.interrupted)
    }

    // ========== History ==========

    pub fn record(&mut self, resource: ResourceId, operation: Box<dyn ResourceOperation<R>>) {
        self.history.push(AppliedOperation {
            resource,
            operation,
        });
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Take the undo log, newest operation first.
    pub fn drain_undo_log(&mut self) -> impl Iterator<Item = AppliedOperation<R>> + '_ {
        self.history.drain(..).rev()
    }
}

impl<R> fmt::Debug for Transaction<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("owner", &self.owner)
            .field("started_at", &self.started_at)
            .field("held", &self.held)
            .field("history_len", &self.history.len())
            .field("waiting_for", &self.waiting_for)
            .field("aborted", &self.aborted)
            .field("interrupted", &self.interrupted)
            .finish()
    }
}
