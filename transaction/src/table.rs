//! Lock and wait bookkeeping owned by one manager.
//!
//! Everything here is plain data; the manager mutates it only while it
//! holds the baton, and pairs each [`Gate`] with a condition variable.

use std::collections::{HashMap, VecDeque};

use baton_core::{CallerId, ResourceId};

/// FIFO admission ticket for the manager's critical section.
///
/// Holding the baton is what "holding the manager mutex" means. It can be
/// released, or kept on behalf of a waiter woken by a hand-off.
#[derive(Debug, Default)]
pub(crate) struct Baton {
    held: bool,
    next_ticket: u64,
    now_serving: u64,
}

impl Baton {
    pub fn take_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    pub fn admits(&self, ticket: u64) -> bool {
        !self.held && self.now_serving == ticket
    }

    pub fn enter(&mut self) {
        self.held = true;
        self.now_serving += 1;
    }

    pub fn release(&mut self) {
        self.held = false;
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

/// Queue of callers parked on one resource.
#[derive(Debug, Default)]
struct Gate {
    waiters: VecDeque<CallerId>,
    permits: usize,
}

/// Holder, waiters and pending releases for every managed resource.
#[derive(Debug)]
pub(crate) struct LockTable {
    holders: HashMap<ResourceId, CallerId>,
    gates: HashMap<ResourceId, Gate>,
    /// Resources freed while someone waited on them, woken one at a time.
    pending_releases: VecDeque<ResourceId>,
}

impl LockTable {
    pub fn new(resources: impl IntoIterator<Item = ResourceId>) -> Self {
        Self {
            holders: HashMap::new(),
            gates: resources.into_iter().map(|id| (id, Gate::default())).collect(),
            pending_releases: VecDeque::new(),
        }
    }

    pub fn holder(&self, resource: ResourceId) -> Option<CallerId> {
        self.holders.get(&resource).copied()
    }

    pub fn grant(&mut self, resource: ResourceId, caller: CallerId) {
        self.holders.insert(resource, caller);
    }

    /// Clear the holder. Returns true when the resource was queued for
    /// hand-off because somebody is waiting on it.
    pub fn release(&mut self, resource: ResourceId) -> bool {
        self.holders.remove(&resource);
        if self.wait_count(resource) > 0 {
            self.pending_releases.push_back(resource);
            true
        } else {
            false
        }
    }

    pub fn wait_count(&self, resource: ResourceId) -> usize {
        self.gates.get(&resource).map_or(0, |gate| gate.waiters.len())
    }

    pub fn enqueue_waiter(&mut self, resource: ResourceId, caller: CallerId) {
        if let Some(gate) = self.gates.get_mut(&resource) {
            gate.waiters.push_back(caller);
        }
    }

    /// Drop a cancelled waiter from the queue.
    pub fn remove_waiter(&mut self, resource: ResourceId, caller: CallerId) -> bool {
        let Some(gate) = self.gates.get_mut(&resource) else {
            return false;
        };
        match gate.waiters.iter().position(|w| *w == caller) {
            Some(index) => {
                gate.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn has_pending_releases(&self) -> bool {
        !self.pending_releases.is_empty()
    }

    /// Pop the next pending release that still has a waiter and give its
    /// gate one permit. Returns the resource whose gate must be woken.
    pub fn forward_pending(&mut self) -> Option<ResourceId> {
        while let Some(resource) = self.pending_releases.pop_front() {
            if let Some(gate) = self.gates.get_mut(&resource) {
                if !gate.waiters.is_empty() {
                    gate.permits += 1;
                    return Some(resource);
                }
            }
        }
        None
    }

    /// Consume a permit if `caller` is first in line on `resource`.
    pub fn try_resume(&mut self, resource: ResourceId, caller: CallerId) -> bool {
        let Some(gate) = self.gates.get_mut(&resource) else {
            return false;
        };
        if gate.permits > 0 && gate.waiters.front() == Some(&caller) {
            gate.permits -= 1;
            gate.waiters.pop_front();
            true
        } else {
            false
        }
    }

    pub fn resource_ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<_> = self.gates.keys().copied().collect();
        ids.sort();
        ids
    }
}
