//! Sources of caller identity.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::CallerId;

/// Supplies the identity of the execution context making the current call.
///
/// The identity must stay stable for as long as the caller has a
/// transaction open, and must differ between contexts that can run
/// concurrently.
pub trait IdentitySource: Send + Sync {
    fn current(&self) -> CallerId;
}

static NEXT_THREAD_ORDINAL: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_CALLER: CallerId =
        CallerId::new(NEXT_THREAD_ORDINAL.fetch_add(1, Ordering::Relaxed));
}

/// Identifies callers by OS thread.
///
/// Each thread receives a process-unique ordinal the first time it asks for
/// one; ordinals grow in first-use order and are never reused.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadIdentity;

impl ThreadIdentity {
    /// Identity of the calling thread.
    pub fn current_thread() -> CallerId {
        THREAD_CALLER.with(|id| *id)
    }
}

impl IdentitySource for ThreadIdentity {
    fn current(&self) -> CallerId {
        Self::current_thread()
    }
}
