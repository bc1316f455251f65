//! # Actor Control Block
//!
//! Every actor is allocated together with a control block that stores its
//! identity plus a strong and a weak reference count. The goal is not to
//! allocate the actor separately from its counts, as common weak pointer
//! designs do. The only goal is to break cycles: linking or monitoring two
//! actors creates a cycle that never collects under strong counts alone.
//!
//! ```text
//!     +-------------------------------------------+
//!     |              ActorStorage<T>              |
//!     +-------------------------------------------+
//!     | +-------------------+-------------------+ |
//!     | |   control block   |  actor data (T)   | |
//!     | +-------------------+-------------------+ |
//!     | | strong refs       | mailbox           | |
//!     | | weak refs         | .                 | |
//!     | | actor id          | .                 | |
//!     | | node id           | .                 | |
//!     | | home system       | .                 | |
//!     | | vtable            | .                 | |
//!     | +-------------------+-------------------+ |
//!     +-------------------------------------------+
//!     ^                     ^
//!     0                     CACHE_LINE_SIZE
//! ```
//!
//! ## Reference Counting Protocol
//! - Both counts start at 1. The initial strong count is transferred to the
//!   first handle; the initial weak count belongs to the strong references
//!   as a group.
//! - When the strong count drops to 0 the payload is destroyed, then the
//!   group's weak unit is released.
//! - When the weak count drops to 0 the whole allocation is freed.
//!
//! Increments are relaxed: they are always performed by someone who already
//! holds a reference and can never trigger destruction. Decrements release,
//! and the decrement reaching zero is followed by an acquire fence so the
//! destructor sees a quiesced object.

use std::fmt;
use std::process;
use std::ptr::{self, NonNull};
use std::sync::Weak;
use std::sync::atomic::{AtomicUsize, Ordering, fence};

use perch_api::identity::{ActorAddress, ActorId, NodeId};

use crate::actor::{AbstractActor, ExecutionUnit};
use crate::handle::StrongActorPtr;
use crate::mailbox::{EnqueueResult, MailboxElement};
use crate::system::{ActorSystem, SystemInner};

/// Byte offset between a control block and its actor payload.
///
/// Matches the padding `crossbeam` applies per target, so that payloads
/// holding a [`Mailbox`](crate::mailbox::Mailbox) fit behind the block.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "powerpc64"))]
pub const CACHE_LINE_SIZE: usize = 128;

/// Byte offset between a control block and its actor payload.
#[cfg(target_arch = "s390x")]
pub const CACHE_LINE_SIZE: usize = 256;

/// Byte offset between a control block and its actor payload.
#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "powerpc64",
    target_arch = "s390x",
)))]
pub const CACHE_LINE_SIZE: usize = 64;

const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Type-erased operations on the payload, one static instance per actor type.
pub(crate) struct ActorVTable {
    /// Destroys the payload in place. Runs once, when the strong count hits 0.
    pub(crate) data_dtor: unsafe fn(NonNull<ActorControlBlock>),
    /// Frees the allocation. Runs once, when the weak count hits 0.
    pub(crate) block_dtor: unsafe fn(NonNull<ActorControlBlock>),
    /// Views the payload as a trait object.
    pub(crate) data: unsafe fn(NonNull<ActorControlBlock>) -> NonNull<dyn AbstractActor>,
}

/// Identity, reference counts and destruction callbacks of one actor.
///
/// A control block is never constructed on its own; `ActorSystem` places it
/// at the start of an actor storage allocation. Shared references to it are
/// handed out by [`StrongActorPtr`] only, so holding `&ActorControlBlock`
/// implies the payload is alive.
#[repr(C)]
pub struct ActorControlBlock {
    strong_refs: AtomicUsize,
    weak_refs: AtomicUsize,
    aid: ActorId,
    nid: NodeId,
    home_system: Weak<SystemInner>,
    vtable: &'static ActorVTable,
}

impl ActorControlBlock {
    pub(crate) fn new(
        address: ActorAddress,
        home_system: Weak<SystemInner>,
        vtable: &'static ActorVTable,
    ) -> Self {
        Self {
            strong_refs: AtomicUsize::new(1),
            weak_refs: AtomicUsize::new(1),
            aid: address.id,
            nid: address.node,
            home_system,
            vtable,
        }
    }

    pub fn id(&self) -> ActorId {
        self.aid
    }

    pub fn node(&self) -> NodeId {
        self.nid
    }

    pub fn address(&self) -> ActorAddress {
        ActorAddress::new(self.aid, self.nid)
    }

    /// Snapshot of the strong count.
    pub fn strong_count(&self) -> usize {
        self.strong_refs.load(Ordering::Acquire)
    }

    /// Snapshot of the weak count, including the unit held by the strong
    /// references as a group.
    pub fn weak_count(&self) -> usize {
        self.weak_refs.load(Ordering::Acquire)
    }

    /// The runtime instance this block was created by, if it is still running.
    pub fn home_system(&self) -> Option<ActorSystem> {
        self.home_system.upgrade().map(ActorSystem::from_inner)
    }

    /// Returns `true` if the actor runs on its home system rather than being
    /// a proxy for a remote actor.
    pub fn is_local(&self) -> bool {
        self.home_system
            .upgrade()
            .is_some_and(|system| system.node == self.nid)
    }

    /// Adds a strong reference. The caller must already hold one.
    pub fn add_strong(&self) {
        let old = self.strong_refs.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            process::abort();
        }
    }

    /// Adds a weak reference. The caller must already hold a strong or weak
    /// reference.
    pub fn add_weak(&self) {
        let old = self.weak_refs.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            process::abort();
        }
    }

    /// Adds a strong reference unless the strong count already reached zero.
    ///
    /// A count of zero is final: the payload is gone or being destroyed, and
    /// this never brings it back.
    pub fn try_upgrade(&self) -> bool {
        let mut count = self.strong_refs.load(Ordering::Relaxed);
        loop {
            if count == 0 {
                return false;
            }
            if count > MAX_REFCOUNT {
                process::abort();
            }
            match self.strong_refs.compare_exchange_weak(
                count,
                count + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => count = actual,
            }
        }
    }

    /// Drops a strong reference, destroying the payload on the last one.
    ///
    /// # Safety
    /// `this` must point to a live control block and the caller must own one
    /// of its strong references, which is consumed by this call.
    pub unsafe fn release_strong(this: NonNull<Self>) {
        let block = unsafe { this.as_ref() };
        let old = block.strong_refs.fetch_sub(1, Ordering::Release);
        debug_assert!(
            old > 0,
            "strong reference count underflow for actor {}",
            block.address()
        );
        if old != 1 {
            return;
        }
        fence(Ordering::Acquire);
        crate::log_lifecycle!(block.address(), "payload_destroyed");
        unsafe {
            (block.vtable.data_dtor)(this);
            Self::release_weak(this);
        }
    }

    /// Drops a weak reference, freeing the storage on the last one.
    ///
    /// # Safety
    /// `this` must point to a live control block and the caller must own one
    /// of its weak references, which is consumed by this call.
    pub unsafe fn release_weak(this: NonNull<Self>) {
        let block = unsafe { this.as_ref() };
        let old = block.weak_refs.fetch_sub(1, Ordering::Release);
        debug_assert!(
            old > 0,
            "weak reference count underflow for actor {}",
            block.address()
        );
        if old != 1 {
            return;
        }
        fence(Ordering::Acquire);
        crate::log_lifecycle!(block.address(), "storage_released");
        let block_dtor = block.vtable.block_dtor;
        unsafe { block_dtor(this) };
    }

    /// Payload address for a control block address. Inverse of
    /// [`ActorControlBlock::from_actor`]; no memory is read and the result is
    /// only meaningful for blocks living in actor storage.
    pub fn data_ptr(this: *const Self) -> *const u8 {
        this.cast::<u8>().wrapping_add(CACHE_LINE_SIZE)
    }

    /// Control block address for a payload address. No memory is read; the
    /// result is only meaningful for payloads living in actor storage.
    pub fn from_actor<T: ?Sized>(actor: *const T) -> *const Self {
        actor
            .cast::<u8>()
            .wrapping_sub(CACHE_LINE_SIZE)
            .cast::<Self>()
    }

    /// Views the payload.
    ///
    /// # Safety
    /// The caller must hold a strong reference for the lifetime `'a`.
    pub(crate) unsafe fn data<'a>(this: NonNull<Self>) -> &'a dyn AbstractActor {
        unsafe {
            let view = this.as_ref().vtable.data;
            view(this).as_ref()
        }
    }

    /// Delivers a message to the payload without blocking.
    ///
    /// Returns `false` if the actor already terminated and closed its
    /// mailbox. If the message wakes up the actor, it is scheduled on `host`,
    /// or on the home system's default execution unit when no host is given.
    ///
    /// # Safety
    /// `this` must point to a live control block and the caller must hold a
    /// strong reference for the duration of the call.
    pub unsafe fn enqueue(
        this: NonNull<Self>,
        element: MailboxElement,
        host: Option<&dyn ExecutionUnit>,
    ) -> bool {
        let (block, actor) = unsafe { (this.as_ref(), Self::data(this)) };
        match actor.enqueue(element) {
            EnqueueResult::Success => true,
            EnqueueResult::UnblockedReader => {
                // SAFETY: the caller holds a strong reference, so adding one is valid.
                let job = unsafe { StrongActorPtr::share(this) };
                match host {
                    Some(host) => host.exec_later(job),
                    None => match block.home_system().and_then(|system| system.scheduler()) {
                        Some(scheduler) => scheduler.exec_later(job),
                        None => tracing::trace!(
                            actor = %block.address(),
                            "no execution unit available, actor stays idle"
                        ),
                    },
                }
                true
            }
            EnqueueResult::QueueClosed => {
                tracing::trace!(actor = %block.address(), "dropped message for terminated actor");
                false
            }
        }
    }

    pub(crate) fn home_system_weak(&self) -> &Weak<SystemInner> {
        &self.home_system
    }
}

impl fmt::Debug for ActorControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorControlBlock")
            .field("address", &self.address())
            .field("strong_refs", &self.strong_refs.load(Ordering::Relaxed))
            .field("weak_refs", &self.weak_refs.load(Ordering::Relaxed))
            .finish()
    }
}

/// Pointer comparison between a control block and a payload.
pub(crate) fn is_block_of(block: NonNull<ActorControlBlock>, actor: &dyn AbstractActor) -> bool {
    let actor: *const dyn AbstractActor = actor;
    ptr::eq(ActorControlBlock::from_actor(actor), block.as_ptr())
}
