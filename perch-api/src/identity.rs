//! # Actor Identity
//!
//! ## Key Concepts
//! - ActorId: Sequence number assigned by the owning runtime instance
//! - NodeId: Identifier of a runtime instance
//! - ActorAddress: The `(id, node)` pair naming an actor across all nodes
//!
//! An identity is a reference, never a snapshot: it carries no payload data
//! and no reference counts. It stays valid for as long as any strong or weak
//! handle to the actor survives.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sequence number of an actor within its owning runtime instance.
pub type ActorId = u64;

/// Reserved id that never names an actor.
pub const INVALID_ACTOR_ID: ActorId = 0;

/// # Node Identifier
///
/// ## Overview
/// Names one runtime instance in a distributed system. Immutable once an
/// actor has been created with it.
///
/// ## Implementation Details
/// Wraps a 128-bit value. The nil value is reserved as "no node" and is what
/// an empty handle serializes to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generates a fresh node identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// The invalid node.
    pub const fn none() -> Self {
        Self(Uuid::nil())
    }

    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns `false` for [`NodeId::none`].
    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0.simple())
        } else {
            f.write_str("invalid-node")
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "invalid-node" {
            return Ok(Self::none());
        }
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for NodeId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// # Actor Address
///
/// ## Overview
/// The identity pair of an actor. This is the complete serialized form of an
/// actor handle: exactly two fields, `id` and `node`.
///
/// ## Ordering
/// Addresses order by node first, then by id.
///
/// ## Examples
/// ```rust
/// use perch_api::identity::{ActorAddress, NodeId};
///
/// let node = NodeId::random();
/// let addr = ActorAddress::new(7, node);
/// assert_eq!(addr.to_string(), format!("7@{}", node));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename = "actor")]
pub struct ActorAddress {
    pub id: ActorId,
    pub node: NodeId,
}

impl ActorAddress {
    pub const fn new(id: ActorId, node: NodeId) -> Self {
        Self { id, node }
    }

    /// The address an empty handle saves as.
    pub const fn invalid() -> Self {
        Self {
            id: INVALID_ACTOR_ID,
            node: NodeId::none(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.id != INVALID_ACTOR_ID && self.node.is_valid()
    }
}

impl Default for ActorAddress {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PartialOrd for ActorAddress {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActorAddress {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.node.cmp(&other.node).then(self.id.cmp(&other.id))
    }
}

impl fmt::Display for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.node)
    }
}

impl fmt::Debug for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorAddress({})", self)
    }
}
