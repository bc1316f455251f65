//! Payload contract and the scheduler hook.
//!
//! Anything stored behind a control block implements [`AbstractActor`]. The
//! control block only ever asks the payload to accept a message; running the
//! actor is left to an [`ExecutionUnit`].

use downcast_rs::{DowncastSync, impl_downcast};

use crate::handle::StrongActorPtr;
use crate::mailbox::{EnqueueResult, MailboxElement};

/// Actor state placed in actor storage.
///
/// Implementations must not block in [`AbstractActor::enqueue`]. Mutation of
/// the actor's own state is serialized by the scheduler, not by this crate.
pub trait AbstractActor: DowncastSync {
    /// Stores a message for later processing.
    fn enqueue(&self, element: MailboxElement) -> EnqueueResult;

    /// Human readable type name used in logs.
    fn name(&self) -> &str {
        "user.actor"
    }
}

impl_downcast!(sync AbstractActor);

/// Something that can run actors, such as a worker thread of a scheduler.
pub trait ExecutionUnit: Send + Sync {
    /// Schedules `job` to run. Must not block.
    fn exec_later(&self, job: StrongActorPtr);
}
