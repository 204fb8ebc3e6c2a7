//! Wait-for chain walk with victim selection.
//!
//! Every transaction waits on at most one resource and every resource has at
//! most one holder, so the wait-for graph is a set of chains. A new wait edge
//! closes a cycle exactly when the chain starting at the current holder leads
//! back to the requester. Among the transactions on that cycle the youngest
//! one is chosen as victim.

use baton_core::{CallerId, ResourceId};

/// Victim ordering key. The greatest rank on a cycle is aborted: the latest
/// start time, then the larger caller ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct VictimRank {
    pub started_at: u64,
    pub caller: CallerId,
}

/// Outcome of a walk that closed a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Deadlock {
    pub victim: CallerId,
    /// Number of transactions on the cycle, requester included.
    pub cycle_length: usize,
}

/// Read-only view of the wait-for graph.
pub(crate) trait WaitForGraph {
    fn rank(&self, caller: CallerId) -> Option<VictimRank>;
    fn waiting_for(&self, caller: CallerId) -> Option<ResourceId>;
    fn holder(&self, resource: ResourceId) -> Option<CallerId>;
}

/// Walk the chain from `holder` and report a cycle through `requester`.
///
/// `limit` bounds the number of steps; the chain can never be longer than
/// the number of open transactions.
pub(crate) fn detect_cycle<G: WaitForGraph + ?Sized>(
    graph: &G,
    requester: VictimRank,
    holder: CallerId,
    limit: usize,
) -> Option<Deadlock> {
    let mut victim = requester;
    let mut cycle_length = 1;
    let mut current = holder;

    for _ in 0..=limit {
        if current == requester.caller {
            return Some(Deadlock {
                victim: victim.caller,
                cycle_length,
            });
        }

        let rank = graph.rank(current)?;
        if rank > victim {
            victim = rank;
        }
        cycle_length += 1;

        let awaited = graph.waiting_for(current)?;
        // A released resource that has not been handed over yet ends the chain.
        current = graph.holder(awaited)?;
    }

    None
}
