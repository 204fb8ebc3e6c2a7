//! Transaction manager: lifecycle, lock acquisition and critical-section hand-off.
//!
//! The manager's critical section is a FIFO [`Baton`] kept inside the state
//! mutex. Whoever holds it may touch the lock table and the transaction map.
//! When resources freed by a commit or rollback have waiters, the baton is
//! not released: it is passed to one waiter per pending release, and each
//! woken waiter passes it on in turn. Only when no release is pending does
//! the baton become free for the next caller in admission order.

use std::collections::HashMap;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use baton_core::{
    CallerId, IdentitySource, Resource, ResourceId, ResourceOperation, ThreadIdentity, TimeSource,
};

use crate::config::ManagerConfig;
use crate::deadlock::{self, VictimRank, WaitForGraph};
use crate::error::{TransactionError, TransactionResult};
use crate::registry;
use crate::stats::{ManagerStats, ManagerStatsSnapshot};
use crate::table::{Baton, LockTable};
use crate::transaction::Transaction;

/// Everything guarded by the manager mutex.
struct ManagerState<R> {
    baton: Baton,
    table: LockTable,
    transactions: HashMap<CallerId, Transaction<R>>,
}

impl<R> WaitForGraph for ManagerState<R> {
    fn rank(&self, caller: CallerId) -> Option<VictimRank> {
        self.transactions.get(&caller).map(Transaction::rank)
    }

    fn waiting_for(&self, caller: CallerId) -> Option<ResourceId> {
        self.transactions.get(&caller)?.waiting_for()
    }

    fn holder(&self, resource: ResourceId) -> Option<CallerId> {
        self.table.holder(resource)
    }
}

type StateGuard<'a, R> = MutexGuard<'a, ManagerState<R>>;

/// Leaves the critical section when dropped during a panic.
struct LeaveOnUnwind<'a, R: Resource, I: IdentitySource> {
    manager: &'a TransactionManager<R, I>,
    state: &'a mut ManagerState<R>,
}

impl<R: Resource, I: IdentitySource> Drop for LeaveOnUnwind<'_, R, I> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!(
                manager = %self.manager.config.name,
                "Undo panicked, leaving critical section"
            );
            self.manager.release_or_forward(self.state);
        }
    }
}

/// Lock manager for a fixed set of resources.
///
/// Every call acts on behalf of the caller reported by the identity source
/// (the current thread by default). A caller may have one open transaction
/// across all managers in the process.
pub struct TransactionManager<R, I = ThreadIdentity> {
    config: ManagerConfig,
    identity: I,
    clock: Box<dyn TimeSource>,
    resources: HashMap<ResourceId, Mutex<R>>,
    state: Mutex<ManagerState<R>>,
    /// Signalled when the baton is released.
    admission: Condvar,
    /// Signalled on hand-off to, or cancellation of, a resource's waiters.
    gates: HashMap<ResourceId, Condvar>,
    stats: ManagerStats,
}

impl<R: Resource> TransactionManager<R, ThreadIdentity> {
    /// Create a manager over `resources`, timestamping transactions with `clock`.
    pub fn new(resources: impl IntoIterator<Item = R>, clock: impl TimeSource + 'static) -> Self {
        Self::with_config(resources, clock, ManagerConfig::default())
    }

    pub fn with_config(
        resources: impl IntoIterator<Item = R>,
        clock: impl TimeSource + 'static,
        config: ManagerConfig,
    ) -> Self {
        Self::with_identity(resources, clock, ThreadIdentity, config)
    }
}

impl<R: Resource, I: IdentitySource> TransactionManager<R, I> {
    /// Create a manager whose callers are identified by `identity`.
    ///
    /// Resources sharing an id replace earlier ones.
    pub fn with_identity(
        resources: impl IntoIterator<Item = R>,
        clock: impl TimeSource + 'static,
        identity: I,
        config: ManagerConfig,
    ) -> Self {
        let resources: HashMap<ResourceId, Mutex<R>> = resources
            .into_iter()
            .map(|resource| (resource.id(), Mutex::new(resource)))
            .collect();
        let gates = resources.keys().map(|id| (*id, Condvar::new())).collect();
        let table = LockTable::new(resources.keys().copied());

        debug!(
            manager = %config.name,
            resources = resources.len(),
            "Transaction manager created"
        );

        Self {
            config,
            identity,
            clock: Box::new(clock),
            resources,
            state: Mutex::new(ManagerState {
                baton: Baton::default(),
                table,
                transactions: HashMap::new(),
            }),
            admission: Condvar::new(),
            gates,
            stats: ManagerStats::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Identity the manager sees for the current caller.
    pub fn current_caller(&self) -> CallerId {
        self.identity.current()
    }

    // ========== Transaction Lifecycle ==========

    /// Open a transaction for the current caller.
    pub fn start_transaction(&self) -> TransactionResult<()> {
        let caller = self.identity.current();
        let mut state = self.acquire_baton();

        let started_at = self.clock.now();
        if !registry::try_register(caller) {
            self.release_or_forward(&mut state);
            return Err(TransactionError::another_active(caller));
        }

        state
            .transactions
            .insert(caller, Transaction::new(caller, started_at));
        self.release_or_forward(&mut state);
        drop(state);

        self.stats.record_start();
        debug!(manager = %self.config.name, caller = %caller, started_at, "Transaction started");
        Ok(())
    }

    /// Commit the current caller's transaction, keeping all applied effects.
    pub fn commit_current_transaction(&self) -> TransactionResult<()> {
        let caller = self.identity.current();
        let mut state = self.acquire_baton();

        match state.transactions.get(&caller).map(Transaction::is_aborted) {
            None => {
                self.release_or_forward(&mut state);
                return Err(TransactionError::no_active(caller));
            }
            Some(true) => {
                self.release_or_forward(&mut state);
                return Err(TransactionError::aborted(caller));
            }
            Some(false) => {}
        }

        if let Some(txn) = state.transactions.remove(&caller) {
            self.free_resources(&mut state, &txn);
            debug!(
                manager = %self.config.name,
                caller = %caller,
                started_at = txn.started_at(),
                operations = txn.history_len(),
                resources = txn.held_resources().len(),
                "Transaction committed"
            );
        }
        registry::unregister(caller);
        self.release_or_forward(&mut state);
        drop(state);

        self.stats.record_commit();
        Ok(())
    }

    /// Undo the current caller's operations, newest first, and release its
    /// resources. Does nothing when the caller has no transaction.
    pub fn rollback_current_transaction(&self) {
        let caller = self.identity.current();
        let mut state = self.acquire_baton();

        let Some(mut txn) = state.transactions.remove(&caller) else {
            self.release_or_forward(&mut state);
            return;
        };

        // Locks are handed over only by `release_or_forward`, so freeing them
        // first is invisible to other callers until every undo has run.
        self.free_resources(&mut state, &txn);
        registry::unregister(caller);
        let undone = self.leave_on_unwind(&mut state, || {
            let mut undone = 0usize;
            for applied in txn.drain_undo_log() {
                if let Some(resource) = self.resources.get(&applied.resource) {
                    applied.operation.undo(&mut resource.lock());
                    undone += 1;
                }
            }
            undone
        });
        self.release_or_forward(&mut state);
        drop(state);

        self.stats.record_rollback();
        debug!(
            manager = %self.config.name,
            caller = %caller,
            undone,
            aborted = txn.is_aborted(),
            "Transaction rolled back"
        );
    }

    /// Whether the current caller has a transaction open on this manager.
    pub fn is_transaction_active(&self) -> bool {
        let caller = self.identity.current();
        self.state.lock().transactions.contains_key(&caller)
    }

    /// Whether the current caller's transaction on this manager was aborted.
    pub fn is_transaction_aborted(&self) -> bool {
        let caller = self.identity.current();
        self.state
            .lock()
            .transactions
            .get(&caller)
            .map_or(false, Transaction::is_aborted)
    }

    // ========== Operations ==========

    /// Apply `operation` to `resource` inside the current transaction.
    ///
    /// Blocks while another transaction holds the resource. If waiting would
    /// close a wait cycle, the youngest transaction on the cycle is aborted;
    /// when that is the caller, this returns [`TransactionError::Aborted`].
    ///
    /// The operation runs outside the manager's critical section. Its own
    /// failure is returned unchanged and is not recorded for rollback.
    pub fn operate_on_resource<O>(&self, resource: ResourceId, operation: O) -> TransactionResult<()>
    where
        O: ResourceOperation<R> + 'static,
    {
        let caller = self.identity.current();
        let mut state = self.acquire_baton();

        if !state.transactions.contains_key(&caller) {
            self.release_or_forward(&mut state);
            return Err(TransactionError::no_active(caller));
        }
        let (Some(cell), Some(gate)) = (self.resources.get(&resource), self.gates.get(&resource))
        else {
            self.release_or_forward(&mut state);
            return Err(TransactionError::unknown_resource(resource));
        };
        if state
            .transactions
            .get(&caller)
            .map_or(false, Transaction::is_aborted)
        {
            self.release_or_forward(&mut state);
            return Err(TransactionError::aborted(caller));
        }

        let contended = state.table.holder(resource).filter(|holder| *holder != caller);
        if let Some(holder) = contended {
            state = self.wait_for_resource(state, gate, caller, resource, holder)?;
        }

        state.table.grant(resource, caller);
        if let Some(txn) = state.transactions.get_mut(&caller) {
            txn.grant(resource);
        }
        self.release_or_forward(&mut state);
        drop(state);

        operation.execute(&mut cell.lock())?;

        let mut state = self.acquire_baton();
        let interrupted = state
            .transactions
            .get_mut(&caller)
            .map_or(false, Transaction::take_interrupt);
        if interrupted {
            self.leave_on_unwind(&mut state, || operation.undo(&mut cell.lock()));
            self.release_or_forward(&mut state);
            drop(state);

            self.stats.record_undone_operation();
            warn!(
                manager = %self.config.name,
                caller = %caller,
                resource = %resource,
                "Abort arrived during operation, operation undone"
            );
            return Err(TransactionError::wait_interrupted(caller, resource));
        }

        if let Some(txn) = state.transactions.get_mut(&caller) {
            txn.record(resource, Box::new(operation));
        }
        self.release_or_forward(&mut state);
        Ok(())
    }

    /// Park the caller on `resource` until it is handed over.
    ///
    /// Called with the baton held. On success the baton is held again,
    /// inherited from the caller that woke us. On failure it is not held.
    fn wait_for_resource<'a>(
        &'a self,
        mut state: StateGuard<'a, R>,
        gate: &Condvar,
        caller: CallerId,
        resource: ResourceId,
        holder: CallerId,
    ) -> TransactionResult<StateGuard<'a, R>> {
        let found = state.rank(caller).and_then(|requester| {
            deadlock::detect_cycle(&*state, requester, holder, state.transactions.len())
        });
        if let Some(deadlock) = found {
            if let Some(victim) = state.transactions.get_mut(&deadlock.victim) {
                victim.abort();
            }
            self.stats.record_deadlock();
            info!(
                manager = %self.config.name,
                requester = %caller,
                victim = %deadlock.victim,
                cycle_length = deadlock.cycle_length,
                "Wait cycle broken by aborting victim"
            );
        }

        if state
            .transactions
            .get(&caller)
            .map_or(true, Transaction::is_aborted)
        {
            self.release_or_forward(&mut state);
            return Err(TransactionError::aborted(caller));
        }

        state.table.enqueue_waiter(resource, caller);
        if let Some(txn) = state.transactions.get_mut(&caller) {
            txn.wait_on(resource);
        }
        if let Some(deadlock) = found {
            self.interrupt(&mut state, deadlock.victim);
        }
        self.release_or_forward(&mut state);
        self.stats.record_wait();
        debug!(
            manager = %self.config.name,
            caller = %caller,
            resource = %resource,
            holder = %holder,
            "Waiting for resource"
        );

        loop {
            if state.table.try_resume(resource, caller) {
                break;
            }
            let interrupted = state
                .transactions
                .get_mut(&caller)
                .map_or(false, Transaction::take_interrupt);
            if interrupted {
                debug!(
                    manager = %self.config.name,
                    caller = %caller,
                    resource = %resource,
                    "Wait cancelled by abort"
                );
                return Err(TransactionError::aborted(caller));
            }
            gate.wait(&mut state);
        }

        if let Some(txn) = state.transactions.get_mut(&caller) {
            txn.stop_waiting();
        }
        debug!(
            manager = %self.config.name,
            caller = %caller,
            resource = %resource,
            "Resumed by hand-off"
        );
        Ok(state)
    }

    /// Deliver an abort signal to `victim`, pulling it out of any wait queue.
    fn interrupt(&self, state: &mut ManagerState<R>, victim: CallerId) {
        let Some(txn) = state.transactions.get_mut(&victim) else {
            return;
        };
        txn.signal_interrupt();
        if let Some(awaited) = txn.stop_waiting() {
            state.table.remove_waiter(awaited, victim);
            if let Some(gate) = self.gates.get(&awaited) {
                gate.notify_all();
            }
        }
    }

    /// Clear every lock held by `txn`, queueing contended ones for hand-off.
    fn free_resources(&self, state: &mut ManagerState<R>, txn: &Transaction<R>) {
        for resource in txn.held_resources() {
            if state.table.release(*resource) {
                debug!(
                    manager = %self.config.name,
                    caller = %txn.owner(),
                    resource = %resource,
                    waiters = state.table.wait_count(*resource),
                    "Released resource queued for hand-off"
                );
            }
        }
    }

    // ========== Critical Section ==========

    /// Enter the critical section, in arrival order.
    fn acquire_baton(&self) -> StateGuard<'_, R> {
        let mut state = self.state.lock();
        let ticket = state.baton.take_ticket();
        while !state.baton.admits(ticket) {
            self.admission.wait(&mut state);
        }
        state.baton.enter();
        debug_assert!(!state.table.has_pending_releases());
        state
    }

    /// Leave the critical section, or pass it to the next waiter of a
    /// pending release without letting anyone else in between.
    fn release_or_forward(&self, state: &mut ManagerState<R>) {
        debug_assert!(state.baton.is_held());
        match state.table.forward_pending() {
            Some(resource) => {
                debug!(
                    manager = %self.config.name,
                    resource = %resource,
                    "Handing critical section to waiter"
                );
                if let Some(gate) = self.gates.get(&resource) {
                    gate.notify_all();
                }
            }
            None => {
                state.baton.release();
                self.admission.notify_all();
            }
        }
    }

    /// Run collaborator code inside the critical section. If it panics, the
    /// baton is passed on before the panic leaves the manager.
    fn leave_on_unwind<T>(&self, state: &mut ManagerState<R>, run: impl FnOnce() -> T) -> T {
        let _guard = LeaveOnUnwind {
            manager: self,
            state,
        };
        run()
    }

    // ========== Introspection ==========

    /// Current holder of `resource`, if any.
    pub fn holder_of(&self, resource: ResourceId) -> Option<CallerId> {
        self.state.lock().table.holder(resource)
    }

    /// Number of callers parked on `resource`.
    pub fn waiting_count(&self, resource: ResourceId) -> usize {
        self.state.lock().table.wait_count(resource)
    }

    /// Number of open transactions on this manager.
    pub fn active_transactions(&self) -> usize {
        self.state.lock().transactions.len()
    }

    /// Ids of the managed resources, ascending.
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        self.state.lock().table.resource_ids()
    }

    /// Inspect a resource.
    ///
    /// Takes the resource's own lock, so it waits for an operation running
    /// on it to finish. It does not take part in the transaction protocol.
    pub fn with_resource<T>(
        &self,
        resource: ResourceId,
        inspect: impl FnOnce(&R) -> T,
    ) -> TransactionResult<T> {
        let cell = self
            .resources
            .get(&resource)
            .ok_or_else(|| TransactionError::unknown_resource(resource))?;
        let guard = cell.lock();
        Ok(inspect(&guard))
    }

    pub fn stats(&self) -> ManagerStatsSnapshot {
        self.stats.snapshot()
    }
}
