//! Transaction error types.

use baton_core::{CallerId, OperationError, ResourceId};
use thiserror::Error;

/// Transaction errors.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The caller already has a transaction open on some manager.
    #[error("caller {caller} already has an active transaction")]
    AnotherTransactionActive { caller: CallerId },

    /// No transaction is active for the caller on this manager.
    #[error("no transaction is active for caller {caller}")]
    NoActiveTransaction { caller: CallerId },

    /// The resource is not managed by this manager.
    #[error("unknown resource: {resource}")]
    UnknownResource { resource: ResourceId },

    /// The caller's transaction was chosen as a deadlock victim.
    #[error("transaction of caller {caller} was aborted")]
    Aborted { caller: CallerId },

    /// An abort signal arrived while the operation ran outside the manager;
    /// the operation has been undone.
    #[error("operation on {resource} by caller {caller} interrupted by abort")]
    WaitInterrupted {
        caller: CallerId,
        resource: ResourceId,
    },

    /// The operation itself failed.
    #[error(transparent)]
    Operation(#[from] OperationError),
}

impl TransactionError {
    pub fn another_active(caller: CallerId) -> Self {
        Self::AnotherTransactionActive { caller }
    }

    pub fn no_active(caller: CallerId) -> Self {
        Self::NoActiveTransaction { caller }
    }

    pub fn unknown_resource(resource: ResourceId) -> Self {
        Self::UnknownResource { resource }
    }

    pub fn aborted(caller: CallerId) -> Self {
        Self::Aborted { caller }
    }

    pub fn wait_interrupted(caller: CallerId, resource: ResourceId) -> Self {
        Self::WaitInterrupted { caller, resource }
    }

    /// True when the transaction was cancelled by deadlock prevention.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted { .. } | Self::WaitInterrupted { .. })
    }

    /// True when the caller broke the API contract.
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(
            self,
            Self::AnotherTransactionActive { .. }
                | Self::NoActiveTransaction { .. }
                | Self::UnknownResource { .. }
        )
    }
}

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;
