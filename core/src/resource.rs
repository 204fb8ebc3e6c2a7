//! Collaborator contracts: resources and the operations applied to them.

use crate::{OperationError, ResourceId};

/// A mutable object the transaction manager hands out exclusively.
///
/// The manager only looks at the identity; everything else is opaque.
pub trait Resource: Send {
    fn id(&self) -> ResourceId;
}

/// A reversible action on a resource.
///
/// `undo` must reverse the effect of a successful `execute` on the resource
/// in whatever state it is in when `undo` is called. A failed `execute` is
/// never undone, so it must leave the resource unchanged.
pub trait ResourceOperation<R>: Send + Sync {
    /// Apply the operation.
    fn execute(&self, resource: &mut R) -> Result<(), OperationError>;

    /// Reverse a previous successful `execute`.
    fn undo(&self, resource: &mut R);
}

impl<R, O: ResourceOperation<R> + ?Sized> ResourceOperation<R> for Box<O> {
    fn execute(&self, resource: &mut R) -> Result<(), OperationError> {
        (**self).execute(resource)
    }

    fn undo(&self, resource: &mut R) {
        (**self).undo(resource)
    }
}

impl<R, O: ResourceOperation<R> + ?Sized> ResourceOperation<R> for std::sync::Arc<O> {
    fn execute(&self, resource: &mut R) -> Result<(), OperationError> {
        (**self).execute(resource)
    }

    fn undo(&self, resource: &mut R) {
        (**self).undo(resource)
    }
}
