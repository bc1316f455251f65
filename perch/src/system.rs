//! # Actor System
//!
//! The runtime instance collaborator of the control block. An
//! `ActorSystem` hands out actor ids, allocates actor storage, owns the local
//! registry and the proxy registry, and provides the default execution unit
//! for actors woken up by a message.
//!
//! ## Ownership
//! Control blocks refer back to their system through a `Weak`, so an actor
//! never keeps its system alive. The system refers to actors only through
//! its registries: weak entries for local actors, strong entries for
//! proxies until their node is erased.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use perch_api::errors::SystemError;
use perch_api::identity::{ActorAddress, ActorId, NodeId};
use perch_api::types::SystemResult;
use tracing::{debug, info};

use crate::actor::{AbstractActor, ExecutionUnit};
use crate::config::SystemConfig;
use crate::handle::StrongActorPtr;
use crate::proxy::{ProxyBackend, ProxyRegistry};
use crate::registry::ActorRegistry;
use crate::storage::ActorStorage;

pub(crate) struct SystemInner {
    pub(crate) node: NodeId,
    pub(crate) config: SystemConfig,
    pub(crate) registry: ActorRegistry,
    pub(crate) proxies: Option<ProxyRegistry>,
    pub(crate) scheduler: Option<Arc<dyn ExecutionUnit>>,
    pub(crate) live_blocks: AtomicUsize,
    next_id: AtomicU64,
}

/// Handle to a runtime instance. Cloning is cheap and shares the instance.
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

impl ActorSystem {
    /// Creates a system without proxy backend or default execution unit.
    pub fn new(config: SystemConfig) -> SystemResult<Self> {
        Self::builder().config(config).build()
    }

    /// Starts building a system with optional proxy backend and scheduler.
    ///
    /// # Examples
    /// ```rust,ignore
    /// let system = ActorSystem::builder()
    ///     .config(SystemConfig::default())
    ///     .proxy_backend(backend)
    ///     .scheduler(scheduler)
    ///     .build()?;
    /// ```
    pub fn builder() -> ActorSystemBuilder {
        ActorSystemBuilder::default()
    }

    pub(crate) fn from_inner(inner: Arc<SystemInner>) -> Self {
        Self { inner }
    }

    /// Node id of this runtime instance. Actors with another node id are
    /// proxies.
    pub fn node(&self) -> NodeId {
        self.inner.node
    }

    /// The validated configuration the system was built with.
    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    /// Registry of local actors that can be loaded by id.
    pub fn registry(&self) -> &ActorRegistry {
        &self.inner.registry
    }

    /// The proxy registry, if the system was built with a proxy backend.
    pub fn proxies(&self) -> Option<&ProxyRegistry> {
        self.inner.proxies.as_ref()
    }

    /// Default execution unit for actors without an explicit host.
    pub fn scheduler(&self) -> Option<Arc<dyn ExecutionUnit>> {
        self.inner.scheduler.clone()
    }

    /// Number of actor storage allocations that have not been freed yet.
    pub fn live_storage_count(&self) -> usize {
        self.inner.live_blocks.load(Ordering::Acquire)
    }

    /// Reserves the next actor id. Ids are never reused.
    pub fn next_actor_id(&self) -> ActorId {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Places `payload` in a fresh actor storage and returns the only strong
    /// handle to it.
    pub fn spawn<T: AbstractActor>(&self, payload: T) -> StrongActorPtr {
        self.spawn_with(|_| payload)
    }

    /// Like [`ActorSystem::spawn`] for payloads that need to know their own
    /// address at construction.
    pub fn spawn_with<T, F>(&self, make: F) -> StrongActorPtr
    where
        T: AbstractActor,
        F: FnOnce(ActorAddress) -> T,
    {
        let address = ActorAddress::new(self.next_actor_id(), self.node());
        let ptr = self.make_actor(address, make(address));
        if self.inner.config.register_on_spawn {
            self.inner.registry.put(&ptr);
        }
        debug!(actor = %address, name = ptr.get().name(), "spawned actor");
        ptr
    }

    /// Allocates storage for an actor with a given identity, homed on this
    /// system. Used for local actors and for proxies of remote ones.
    pub(crate) fn make_actor<T: AbstractActor>(&self, address: ActorAddress, payload: T) -> StrongActorPtr {
        let raw = ActorStorage::allocate(address, Arc::downgrade(&self.inner), payload);
        self.inner.live_blocks.fetch_add(1, Ordering::Relaxed);
        // SAFETY: a freshly allocated block carries exactly one strong
        // reference, which is adopted here.
        unsafe { StrongActorPtr::from_raw(raw) }
    }

    /// Returns `true` if both handles share the same runtime instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("name", &self.inner.config.name)
            .field("node", &self.inner.node)
            .field("registry", &self.inner.registry)
            .field("proxies", &self.inner.proxies)
            .field("live_blocks", &self.live_storage_count())
            .finish()
    }
}

/// Builder for [`ActorSystem`].
#[derive(Default)]
pub struct ActorSystemBuilder {
    config: SystemConfig,
    backend: Option<Arc<dyn ProxyBackend>>,
    scheduler: Option<Arc<dyn ExecutionUnit>>,
}

impl ActorSystemBuilder {
    /// Replaces the default configuration.
    pub fn config(mut self, config: SystemConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables proxies for remote nodes reachable through `backend`.
    pub fn proxy_backend(mut self, backend: Arc<dyn ProxyBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sets the default execution unit for actors woken up without a host.
    pub fn scheduler(mut self, scheduler: Arc<dyn ExecutionUnit>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Validates the configuration and starts the system.
    ///
    /// # Returns
    /// `SystemError::InvalidConfig` if the configuration is rejected.
    pub fn build(self) -> SystemResult<ActorSystem> {
        self.config.validate()?;
        let node = self.config.node.unwrap_or_else(NodeId::random);
        if !node.is_valid() {
            return Err(SystemError::InvalidConfig(format!("invalid node id {}", node)));
        }
        let inner = SystemInner {
            node,
            next_id: AtomicU64::new(self.config.first_actor_id),
            registry: ActorRegistry::new(),
            proxies: self.backend.map(ProxyRegistry::new),
            scheduler: self.scheduler,
            live_blocks: AtomicUsize::new(0),
            config: self.config,
        };
        info!(
            name = %inner.config.name,
            %node,
            proxies = inner.proxies.is_some(),
            "actor system started"
        );
        Ok(ActorSystem::from_inner(Arc::new(inner)))
    }
}
