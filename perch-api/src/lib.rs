//! # Perch API
//!
//! Shared vocabulary for the perch actor control block: the identity of an
//! actor, the message id carried with every delivery, and the error taxonomy
//! surfaced by the resolution bridge.
//!
//! ## Module Organization
//!
//! - [`identity`]: Actor ids, node ids and the `(id, node)` address pair
//! - [`message`]: Message id tagging and the boxed message type
//! - [`errors`]: Resolution and system errors
//! - [`types`]: Common type aliases

pub mod errors;
pub mod identity;
pub mod message;
pub mod types;

pub use errors::{ResolutionError, SystemError};
pub use identity::{ActorAddress, ActorId, NodeId, INVALID_ACTOR_ID};
pub use message::MessageId;
pub use types::{BoxedMessage, ResolveResult, SystemResult};
