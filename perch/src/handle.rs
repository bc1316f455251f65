//! # Strong and Weak Actor Handles
//!
//! ## Key Concepts
//! - StrongActorPtr: keeps the actor payload alive and may deliver messages
//! - WeakActorPtr: keeps only the control block alive; must be upgraded with
//!   [`WeakActorPtr::lock`] before the actor can be used
//!
//! Both handles are thin pointers to an [`ActorControlBlock`]. Cloning adds
//! a reference of the same kind, dropping releases it, and moving transfers
//! it without touching the counts. An empty handle is `None`.
//!
//! Handles compare, order and hash by actor identity. Two handles to
//! different blocks with the same identity (a proxy replaced after a
//! reconnect, for example) compare equal; use `ptr_eq` to tell them apart.
//!
//! ## Hashing
//! `Hash` feeds only the actor id to the hasher. `Option<StrongActorPtr>`
//! hashes through std's `Option` impl, which adds a variant tag; code that
//! needs the plain key (0 for an empty handle, the id otherwise) uses
//! [`hash_key`] instead.
//!
//! ## Examples
//! ```rust,ignore
//! let ptr = system.spawn(actor);
//! let weak = ptr.downgrade();
//! assert_eq!(weak.lock().as_ref(), Some(&ptr));
//! drop(ptr);
//! assert!(weak.lock().is_none());
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::ops::Deref;
use std::ptr::NonNull;

use perch_api::identity::{ActorAddress, ActorId, INVALID_ACTOR_ID, NodeId};
use perch_api::message::MessageId;
use perch_api::types::BoxedMessage;

use crate::actor::{AbstractActor, ExecutionUnit};
use crate::control_block::{self, ActorControlBlock};
use crate::mailbox::MailboxElement;
use crate::system::ActorSystem;

/// Owning reference to an actor.
pub struct StrongActorPtr {
    ptr: NonNull<ActorControlBlock>,
}

// SAFETY: the block is only mutated through atomics and the payload is
// `Send + Sync` by the `AbstractActor` bound.
unsafe impl Send for StrongActorPtr {}
unsafe impl Sync for StrongActorPtr {}

impl StrongActorPtr {
    /// Adopts a strong reference that was already accounted for, for example
    /// one returned by [`StrongActorPtr::into_raw`].
    ///
    /// # Safety
    /// `ptr` must point to a live control block and the caller must transfer
    /// ownership of one strong reference.
    pub unsafe fn from_raw(ptr: NonNull<ActorControlBlock>) -> Self {
        Self { ptr }
    }

    /// Creates an additional strong reference.
    ///
    /// # Safety
    /// `ptr` must point to a live control block whose strong count is
    /// non-zero for the duration of the call.
    pub unsafe fn share(ptr: NonNull<ActorControlBlock>) -> Self {
        unsafe { ptr.as_ref() }.add_strong();
        Self { ptr }
    }

    /// Gives up the handle without releasing its reference.
    ///
    /// # Returns
    /// The control block pointer, still owning one strong reference. Hand it
    /// back to [`StrongActorPtr::from_raw`] to avoid a leak.
    pub fn into_raw(self) -> NonNull<ActorControlBlock> {
        let ptr = self.ptr;
        mem::forget(self);
        ptr
    }

    /// The control block pointer, without touching the counts.
    pub fn as_ptr(&self) -> NonNull<ActorControlBlock> {
        self.ptr
    }

    /// Key used by `Hash`: the actor id.
    pub fn hash_key(&self) -> ActorId {
        self.id()
    }

    /// The actor payload.
    pub fn get(&self) -> &dyn AbstractActor {
        // SAFETY: `self` holds a strong reference for the borrow's lifetime.
        unsafe { ActorControlBlock::data(self.ptr) }
    }

    /// The payload as a `T`, or `None` if the actor has another type.
    ///
    /// # Type Parameters
    /// * `T` - Concrete payload type the actor was spawned with
    pub fn downcast_ref<T: AbstractActor>(&self) -> Option<&T> {
        self.get().downcast_ref::<T>()
    }

    /// Returns `true` if `actor` is the payload this handle points to.
    pub fn is(&self, actor: &dyn AbstractActor) -> bool {
        control_block::is_block_of(self.ptr, actor)
    }

    /// Returns `true` if both handles point to the same control block.
    ///
    /// Stricter than `==`, which compares identities only.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }

    /// Creates a weak handle to the same actor, adding one weak reference.
    pub fn downgrade(&self) -> WeakActorPtr {
        self.block().add_weak();
        WeakActorPtr { ptr: self.ptr }
    }

    /// Delivers a message without blocking.
    ///
    /// # Parameters
    /// * `sender` - Handle of the sending actor, if any
    /// * `mid` - Message id, tagging requests, responses and priority
    /// * `content` - Type-erased message
    /// * `host` - Execution unit that schedules the actor if this message
    ///   wakes it up; `None` falls back to the home system's scheduler
    ///
    /// # Returns
    /// `false` if the actor already terminated. That is not an error;
    /// callers decide whether to log or drop.
    pub fn enqueue(
        &self,
        sender: Option<StrongActorPtr>,
        mid: MessageId,
        content: BoxedMessage,
        host: Option<&dyn ExecutionUnit>,
    ) -> bool {
        self.enqueue_element(MailboxElement::new(sender, mid, content), host)
    }

    /// Like [`StrongActorPtr::enqueue`] with a prebuilt element.
    pub fn enqueue_element(&self, element: MailboxElement, host: Option<&dyn ExecutionUnit>) -> bool {
        // SAFETY: `self` holds a strong reference for the whole call.
        unsafe { ActorControlBlock::enqueue(self.ptr, element, host) }
    }

    fn block(&self) -> &ActorControlBlock {
        // SAFETY: a strong reference keeps the block alive.
        unsafe { self.ptr.as_ref() }
    }
}

impl Deref for StrongActorPtr {
    type Target = ActorControlBlock;

    fn deref(&self) -> &ActorControlBlock {
        self.block()
    }
}

impl Clone for StrongActorPtr {
    fn clone(&self) -> Self {
        self.block().add_strong();
        Self { ptr: self.ptr }
    }
}

impl Drop for StrongActorPtr {
    fn drop(&mut self) {
        // SAFETY: this handle owns one strong reference.
        unsafe { ActorControlBlock::release_strong(self.ptr) }
    }
}

impl PartialEq for StrongActorPtr {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr || self.address() == other.address()
    }
}

impl Eq for StrongActorPtr {}

impl PartialOrd for StrongActorPtr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StrongActorPtr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.address().cmp(&other.address())
    }
}

impl Hash for StrongActorPtr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_key().hash(state);
    }
}

/// Hash key of an optional handle: 0 when empty, the actor id otherwise.
pub fn hash_key(ptr: Option<&StrongActorPtr>) -> ActorId {
    ptr.map_or(INVALID_ACTOR_ID, StrongActorPtr::hash_key)
}

impl fmt::Display for StrongActorPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.address(), f)
    }
}

impl fmt::Debug for StrongActorPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrongActorPtr")
            .field("address", &self.address())
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}

/// Non-owning reference to an actor.
///
/// Identity and counts stay readable after the actor terminated; the payload
/// does not.
pub struct WeakActorPtr {
    ptr: NonNull<ActorControlBlock>,
}

// SAFETY: see `StrongActorPtr`; a weak handle never touches the payload.
unsafe impl Send for WeakActorPtr {}
unsafe impl Sync for WeakActorPtr {}

impl WeakActorPtr {
    /// Adopts a weak reference that was already accounted for.
    ///
    /// # Safety
    /// `ptr` must point to a live control block and the caller must transfer
    /// ownership of one weak reference.
    pub unsafe fn from_raw(ptr: NonNull<ActorControlBlock>) -> Self {
        Self { ptr }
    }

    /// Creates an additional weak reference.
    ///
    /// # Safety
    /// `ptr` must point to a live control block for the duration of the call.
    pub unsafe fn share(ptr: NonNull<ActorControlBlock>) -> Self {
        unsafe { ptr.as_ref() }.add_weak();
        Self { ptr }
    }

    /// Gives up the handle without releasing its weak reference.
    pub fn into_raw(self) -> NonNull<ActorControlBlock> {
        let ptr = self.ptr;
        mem::forget(self);
        ptr
    }

    /// The control block pointer. Only identity and counts may be read
    /// through it; the payload may already be gone.
    pub fn as_ptr(&self) -> NonNull<ActorControlBlock> {
        self.ptr
    }

    /// Upgrades to a strong handle. Returns `None` once the actor is gone;
    /// after that every later call returns `None` as well.
    pub fn lock(&self) -> Option<StrongActorPtr> {
        if self.block().try_upgrade() {
            Some(StrongActorPtr { ptr: self.ptr })
        } else {
            None
        }
    }

    /// Id of the actor; readable after termination.
    pub fn id(&self) -> ActorId {
        self.block().id()
    }

    pub fn node(&self) -> NodeId {
        self.block().node()
    }

    pub fn address(&self) -> ActorAddress {
        self.block().address()
    }

    /// Snapshot of the strong count; 0 once the actor is gone.
    pub fn strong_count(&self) -> usize {
        self.block().strong_count()
    }

    /// Snapshot of the weak count, including the unit held by the strong
    /// references while any exist.
    pub fn weak_count(&self) -> usize {
        self.block().weak_count()
    }

    /// Returns `true` once the payload has been destroyed.
    pub fn is_expired(&self) -> bool {
        self.strong_count() == 0
    }

    /// The system this actor was created by, if it is still running.
    pub fn home_system(&self) -> Option<ActorSystem> {
        self.block().home_system()
    }

    /// Returns `true` if both handles point to the same control block.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }

    // Never exposed: callers must not reach the payload through a weak handle.
    fn block(&self) -> &ActorControlBlock {
        // SAFETY: a weak reference keeps the block alive.
        unsafe { self.ptr.as_ref() }
    }
}

impl From<&StrongActorPtr> for WeakActorPtr {
    fn from(ptr: &StrongActorPtr) -> Self {
        ptr.downgrade()
    }
}

impl Clone for WeakActorPtr {
    fn clone(&self) -> Self {
        self.block().add_weak();
        Self { ptr: self.ptr }
    }
}

impl Drop for WeakActorPtr {
    fn drop(&mut self) {
        // SAFETY: this handle owns one weak reference.
        unsafe { ActorControlBlock::release_weak(self.ptr) }
    }
}

impl PartialEq for WeakActorPtr {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr || self.address() == other.address()
    }
}

impl Eq for WeakActorPtr {}

impl PartialOrd for WeakActorPtr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WeakActorPtr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.address().cmp(&other.address())
    }
}

impl Hash for WeakActorPtr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Display for WeakActorPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.address(), f)
    }
}

impl fmt::Debug for WeakActorPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakActorPtr")
            .field("address", &self.address())
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}
