//! Local actor registry keyed by actor id.
//!
//! Entries are weak handles: being registered never keeps an actor alive.
//! The entry of an actor is removed when its payload is destroyed.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use perch_api::identity::ActorId;

use crate::handle::{StrongActorPtr, WeakActorPtr};

/// Weak id-to-actor map of one actor system.
///
/// # Examples
/// ```rust,ignore
/// system.registry().put(&ptr);
/// let found = system.registry().get(ptr.id());
/// assert!(found.is_some_and(|found| found.ptr_eq(&ptr)));
/// ```
#[derive(Default)]
pub struct ActorRegistry {
    entries: RwLock<HashMap<ActorId, WeakActorPtr>>,
}

impl ActorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ptr` under its id. Registering twice is a no-op.
    pub fn put(&self, ptr: &StrongActorPtr) {
        let mut entries = self.entries.write();
        entries.entry(ptr.id()).or_insert_with(|| ptr.downgrade());
    }

    /// Strong handle to the actor with `id`, or `None` if it is unknown or
    /// already terminated.
    pub fn get(&self, id: ActorId) -> Option<StrongActorPtr> {
        self.entries.read().get(&id).and_then(WeakActorPtr::lock)
    }

    /// Returns `true` if there is an entry for `id`, even for a terminated
    /// actor whose entry was not evicted yet.
    pub fn contains(&self, id: ActorId) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// Removes the entry for `id`. Returns `true` if there was one.
    pub fn erase(&self, id: ActorId) -> bool {
        let removed = self.entries.write().remove(&id);
        // Dropped outside the lock; releasing a weak reference may free storage.
        removed.is_some()
    }

    /// Number of registered actors whose payload is still alive.
    pub fn running(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| !entry.is_expired())
            .count()
    }

    /// Number of entries, live or not.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("entries", &self.len())
            .finish()
    }
}
