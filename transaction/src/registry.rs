//! Process-wide registry of callers with an open transaction.
//!
//! Shared by every manager in the process so that a caller can hold at most
//! one transaction at a time, whichever manager it was started on. The map
//! is created on first use and lives until process exit; entries are removed
//! on commit and rollback.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;

use baton_core::CallerId;

static ACTIVE_CALLERS: Lazy<DashMap<CallerId, bool>> = Lazy::new(DashMap::new);

/// Mark `caller` as having an open transaction.
///
/// Returns `false`, leaving the registry unchanged, when it already has one.
pub(crate) fn try_register(caller: CallerId) -> bool {
    match ACTIVE_CALLERS.entry(caller) {
        Entry::Occupied(_) => false,
        Entry::Vacant(slot) => {
            slot.insert(true);
            true
        }
    }
}

pub(crate) fn unregister(caller: CallerId) {
    ACTIVE_CALLERS.remove(&caller);
}

/// Whether `caller` has an open transaction on any manager.
pub fn is_registered(caller: CallerId) -> bool {
    ACTIVE_CALLERS.get(&caller).map_or(false, |active| *active)
}

/// Number of callers with an open transaction anywhere in the process.
pub fn registered_count() -> usize {
    ACTIVE_CALLERS.len()
}
