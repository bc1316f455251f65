//! # Resolution Bridge
//!
//! Converts between live handles and their serialized form. Saving emits the
//! identity pair only: no payload bytes, no counts. Loading resolves the
//! pair against a system: a local actor through the registry, a remote one
//! through a (possibly new) proxy.
//!
//! ## Serde Integration
//! Handles implement `Serialize` as a struct named `actor` with the fields
//! `id` and `node`. Deserialization needs the system as context, so it goes
//! through `DeserializeSeed`:
//!
//! ```rust,ignore
//! use serde::de::DeserializeSeed;
//!
//! let json = serde_json::to_string(&ptr)?;
//! let mut de = serde_json::Deserializer::from_str(&json);
//! let loaded = system.actor_seed().deserialize(&mut de)?;
//! assert_eq!(loaded, ptr);
//! ```
//!
//! A failed load returns an error and produces no handle, so whatever the
//! caller held before is left untouched.

use serde::de::{self, DeserializeSeed, Deserializer};
use serde::ser::{self, Serialize, Serializer};
use serde::Deserialize;

use perch_api::errors::ResolutionError;
use perch_api::identity::ActorAddress;
use perch_api::types::ResolveResult;

use crate::handle::{StrongActorPtr, WeakActorPtr};
use crate::system::ActorSystem;

/// Serialized form of `ptr`.
///
/// Local actors are added to their home system's registry on the way out,
/// so the identity can be loaded back later.
pub fn save_actor(ptr: &StrongActorPtr) -> ActorAddress {
    if let Some(system) = ptr.home_system() {
        if system.node() == ptr.node() {
            system.registry().put(ptr);
        }
    }
    ptr.address()
}

/// Serialized form of an optional handle; `None` saves as the invalid address.
pub fn save_optional(ptr: Option<&StrongActorPtr>) -> ActorAddress {
    ptr.map_or_else(ActorAddress::invalid, save_actor)
}

/// Serialized form of a weak handle. The actor must still be alive.
pub fn save_weak(ptr: &WeakActorPtr) -> ResolveResult<ActorAddress> {
    match ptr.lock() {
        Some(strong) => Ok(save_actor(&strong)),
        None => Err(ResolutionError::Expired(ptr.address())),
    }
}

impl ActorSystem {
    /// Resolves an identity to a strong handle.
    ///
    /// On success the strong count of the target grows by exactly one.
    pub fn load_actor(&self, address: ActorAddress) -> ResolveResult<StrongActorPtr> {
        let result = self.resolve(address);
        match &result {
            Ok(ptr) => crate::log_resolution!(address, "resolved", local = ptr.is_local()),
            Err(error) => crate::log_resolution!(address, "failed", error = %error),
        }
        result
    }

    /// Like [`ActorSystem::load_actor`], but the invalid address loads as
    /// `None` instead of failing.
    pub fn load_optional(&self, address: ActorAddress) -> ResolveResult<Option<StrongActorPtr>> {
        if address == ActorAddress::invalid() {
            return Ok(None);
        }
        self.load_actor(address).map(Some)
    }

    /// Resolves an identity and keeps only a weak reference to it.
    pub fn load_weak(&self, address: ActorAddress) -> ResolveResult<WeakActorPtr> {
        self.load_actor(address).map(|ptr| ptr.downgrade())
    }

    pub fn actor_seed(&self) -> ActorSeed<'_> {
        ActorSeed { system: self }
    }

    pub fn weak_actor_seed(&self) -> WeakActorSeed<'_> {
        WeakActorSeed { system: self }
    }

    pub fn optional_actor_seed(&self) -> OptionalActorSeed<'_> {
        OptionalActorSeed { system: self }
    }

    fn resolve(&self, address: ActorAddress) -> ResolveResult<StrongActorPtr> {
        let unknown = || ResolutionError::UnknownActor {
            id: address.id,
            node: address.node,
        };
        if !address.is_valid() {
            return Err(unknown());
        }
        if address.node == self.node() {
            return self.registry().get(address.id).ok_or_else(unknown);
        }
        match self.proxies() {
            Some(proxies) => proxies.get_or_put(self, address),
            None => Err(ResolutionError::NoProxyRegistry(address.node)),
        }
    }
}

impl Serialize for StrongActorPtr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        save_actor(self).serialize(serializer)
    }
}

impl Serialize for WeakActorPtr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        save_weak(self)
            .map_err(<S::Error as ser::Error>::custom)?
            .serialize(serializer)
    }
}

/// Loads a [`StrongActorPtr`] from its `id`/`node` fields.
#[derive(Clone, Copy)]
pub struct ActorSeed<'a> {
    system: &'a ActorSystem,
}

impl<'de> DeserializeSeed<'de> for ActorSeed<'_> {
    type Value = StrongActorPtr;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        let address = ActorAddress::deserialize(deserializer)?;
        self.system.load_actor(address).map_err(de::Error::custom)
    }
}

/// Loads a [`WeakActorPtr`]; the actor must be alive at load time.
#[derive(Clone, Copy)]
pub struct WeakActorSeed<'a> {
    system: &'a ActorSystem,
}

impl<'de> DeserializeSeed<'de> for WeakActorSeed<'_> {
    type Value = WeakActorPtr;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        let address = ActorAddress::deserialize(deserializer)?;
        self.system.load_weak(address).map_err(de::Error::custom)
    }
}

/// Loads an optional handle; the invalid address becomes `None`.
#[derive(Clone, Copy)]
pub struct OptionalActorSeed<'a> {
    system: &'a ActorSystem,
}

impl<'de> DeserializeSeed<'de> for OptionalActorSeed<'_> {
    type Value = Option<StrongActorPtr>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        let address = ActorAddress::deserialize(deserializer)?;
        self.system.load_optional(address).map_err(de::Error::custom)
    }
}

/// `serialize_with` helper for `Option<StrongActorPtr>` fields, writing the
/// invalid address for `None` instead of a serde option.
pub mod nullable {
    use super::*;

    pub fn serialize<S: Serializer>(ptr: &Option<StrongActorPtr>, serializer: S) -> Result<S::Ok, S::Error> {
        save_optional(ptr.as_ref()).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::AbstractActor;
    use crate::config::SystemConfig;
    use crate::mailbox::{EnqueueResult, Mailbox, MailboxElement};
    use perch_api::identity::NodeId;

    #[derive(Default)]
    struct Idle {
        mailbox: Mailbox,
    }

    impl AbstractActor for Idle {
        fn enqueue(&self, element: MailboxElement) -> EnqueueResult {
            self.mailbox.push(element)
        }
    }

    #[test]
    fn test_save_registers_local_actor() {
        let system = ActorSystem::new(SystemConfig::default()).unwrap();
        let ptr = system.spawn(Idle::default());
        assert!(system.load_actor(ptr.address()).is_err());

        let address = save_actor(&ptr);
        assert_eq!(address, ptr.address());
        let loaded = system.load_actor(address).unwrap();
        assert!(loaded.ptr_eq(&ptr));
        assert_eq!(ptr.strong_count(), 2);
    }

    #[test]
    fn test_save_weak_of_dead_actor_fails() {
        let system = ActorSystem::new(SystemConfig::default()).unwrap();
        let ptr = system.spawn(Idle::default());
        let weak = ptr.downgrade();
        let address = ptr.address();
        drop(ptr);
        assert_eq!(save_weak(&weak), Err(ResolutionError::Expired(address)));
    }

    #[test]
    fn test_optional_round_trip() {
        let system = ActorSystem::new(SystemConfig::default()).unwrap();
        assert_eq!(save_optional(None), ActorAddress::invalid());
        assert!(system.load_optional(ActorAddress::invalid()).unwrap().is_none());
    }

    #[test]
    fn test_remote_without_proxy_registry() {
        let system = ActorSystem::new(SystemConfig::default()).unwrap();
        let remote = NodeId::random();
        let result = system.load_actor(ActorAddress::new(4, remote));
        assert_eq!(result.unwrap_err(), ResolutionError::NoProxyRegistry(remote));
    }
}
