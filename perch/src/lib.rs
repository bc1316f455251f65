// Perch actor control blocks
//
// Every actor lives in a single allocation: a cache-line sized control block
// followed by the actor object itself. Strong and weak handles count
// references to that block; the bridge turns handles into `(id, node)` pairs
// and back.

pub mod actor;
pub mod bridge;
pub mod config;
pub mod control_block;
pub mod handle;
pub mod logging;
pub mod mailbox;
pub mod proxy;
pub mod registry;
pub mod system;

mod storage;

// Re-export commonly used types
pub use actor::{AbstractActor, ExecutionUnit};
pub use bridge::{ActorSeed, OptionalActorSeed, WeakActorSeed, save_actor, save_optional, save_weak};
pub use config::SystemConfig;
pub use control_block::{ActorControlBlock, CACHE_LINE_SIZE};
pub use handle::{StrongActorPtr, WeakActorPtr, hash_key};
pub use mailbox::{EnqueueResult, Mailbox, MailboxElement};
pub use proxy::{ActorProxy, ChannelBackend, ProxyBackend, ProxyRegistry};
pub use registry::ActorRegistry;
pub use system::{ActorSystem, ActorSystemBuilder};

pub use perch_api::errors::{ResolutionError, SystemError};
pub use perch_api::identity::{ActorAddress, ActorId, INVALID_ACTOR_ID, NodeId};
pub use perch_api::message::MessageId;
pub use perch_api::types::{BoxedMessage, ResolveResult, SystemResult};
