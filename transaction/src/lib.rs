//! Baton Transaction
//!
//! In-memory lock manager with multi-resource transactions and deadlock
//! prevention by victim abort.
//!
//! Responsibilities:
//! - Start, commit and roll back one transaction per caller
//! - Grant exclusive access to resources, parking callers on contention
//! - Abort the youngest transaction on a wait cycle before it can deadlock
//! - Hand the critical section directly to woken waiters, in release order
//! - Undo applied operations newest first on rollback

mod config;
mod deadlock;
mod error;
mod manager;
pub mod registry;
mod stats;
mod table;
mod transaction;

pub use config::ManagerConfig;
pub use error::{TransactionError, TransactionResult};
pub use manager::TransactionManager;
pub use stats::{ManagerStats, ManagerStatsSnapshot};
