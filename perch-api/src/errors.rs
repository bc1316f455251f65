//! # Error Types
//!
//! Three kinds of runtime failure can reach callers of the control block:
//!
//! - **Delivery failure**: `enqueue` on a terminated actor. Signaled by a
//!   `false` return, not by an error value.
//! - **Resolution failure**: an identity cannot be turned back into a handle.
//!   Reported as [`ResolutionError`]; recoverable, the usual reaction is to
//!   treat the actor as gone.
//! - **Upgrade failure**: a weak handle whose actor is gone. This is a plain
//!   `None` and never an error.
//! - **Configuration failure**: a system cannot be built from its
//!   configuration. Reported as [`SystemError`].
//!
//! Reference count underflow is a caller bug and is caught by debug
//! assertions, not by these types.
//!
//! ## Usage Example
//!
//! ```rust
//! use perch_api::errors::ResolutionError;
//!
//! fn describe(error: &ResolutionError) -> &'static str {
//!     match error {
//!         ResolutionError::UnknownActor { .. } => "actor no longer exists",
//!         ResolutionError::UnknownNode(_) => "node unreachable",
//!         _ => "cannot resolve",
//!     }
//! }
//! ```

use thiserror::Error;

use crate::identity::{ActorAddress, ActorId, NodeId};

/// Failure to convert between a handle and its serialized identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The identity names the local node but no live actor has this id.
    #[error("Unknown actor {id}@{node}")]
    UnknownActor { id: ActorId, node: NodeId },

    /// The identity names a node that is neither local nor reachable.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// The identity names a remote node but this system has no proxy registry.
    #[error("No proxy registry available to resolve node {0}")]
    NoProxyRegistry(NodeId),

    /// A weak handle was saved after its actor terminated.
    #[error("Actor {0} expired before it could be saved")]
    Expired(ActorAddress),
}

impl ResolutionError {
    /// Returns `true` when the error means the actor no longer exists, as
    /// opposed to the identity being unreachable.
    pub fn is_actor_gone(&self) -> bool {
        matches!(self, Self::UnknownActor { .. } | Self::Expired(_))
    }
}

/// Errors related to building and running an actor system.
#[derive(Error, Debug)]
pub enum SystemError {
    /// Rejected by `SystemConfig::validate` or the system builder.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
