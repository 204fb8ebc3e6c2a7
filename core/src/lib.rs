//! Baton Core Types
//!
//! This crate provides the contracts shared by the lock manager and its
//! collaborators:
//! - Identity types (ResourceId, CallerId)
//! - Caller identity sources (ThreadIdentity)
//! - Resource and operation traits
//! - Logical time sources
//! - Operation error type

mod caller;
mod clock;
mod error;
mod id;
mod resource;

pub use caller::*;
pub use clock::*;
pub use error::*;
pub use id::*;
pub use resource::*;
