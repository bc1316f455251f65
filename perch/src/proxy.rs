//! # Proxies for Remote Actors
//!
//! A proxy is a local control block carrying the identity of an actor that
//! lives on another node. Messages enqueued to it are handed to a
//! [`ProxyBackend`], which stands in for the transport layer.
//!
//! The [`ProxyRegistry`] caches one proxy per remote identity and keeps it
//! alive until the node or the single proxy is erased.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use perch_api::errors::ResolutionError;
use perch_api::identity::{ActorAddress, ActorId, NodeId};
use perch_api::types::ResolveResult;
use tracing::debug;

use crate::actor::AbstractActor;
use crate::handle::StrongActorPtr;
use crate::mailbox::{EnqueueResult, MailboxElement};
use crate::system::ActorSystem;

/// Transport-facing side of the proxy registry.
pub trait ProxyBackend: Send + Sync {
    /// Returns `true` if messages for `node` can be routed.
    fn is_reachable(&self, node: &NodeId) -> bool;

    /// Ships `element` to `receiver`. Must not block. Returns `false` if the
    /// message could not be handed off.
    fn forward(&self, receiver: ActorAddress, element: MailboxElement) -> bool;
}

/// Payload of a proxy control block.
pub struct ActorProxy {
    address: ActorAddress,
    backend: Arc<dyn ProxyBackend>,
    killed: AtomicBool,
}

impl ActorProxy {
    pub fn new(address: ActorAddress, backend: Arc<dyn ProxyBackend>) -> Self {
        Self {
            address,
            backend,
            killed: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> ActorAddress {
        self.address
    }

    /// Marks the remote actor as unreachable. Later deliveries fail.
    pub fn kill(&self) {
        if !self.killed.swap(true, Ordering::AcqRel) {
            crate::log_lifecycle!(self.address, "proxy_killed");
        }
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }
}

impl AbstractActor for ActorProxy {
    fn enqueue(&self, element: MailboxElement) -> EnqueueResult {
        if self.is_killed() || !self.backend.forward(self.address, element) {
            return EnqueueResult::QueueClosed;
        }
        EnqueueResult::Success
    }

    fn name(&self) -> &str {
        "perch.proxy"
    }
}

impl fmt::Debug for ActorProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorProxy")
            .field("address", &self.address)
            .field("killed", &self.is_killed())
            .finish()
    }
}

/// Cache of proxies, grouped by node.
pub struct ProxyRegistry {
    backend: Arc<dyn ProxyBackend>,
    proxies: Mutex<HashMap<NodeId, HashMap<ActorId, StrongActorPtr>>>,
}

impl ProxyRegistry {
    pub fn new(backend: Arc<dyn ProxyBackend>) -> Self {
        Self {
            backend,
            proxies: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ProxyBackend> {
        &self.backend
    }

    /// Cached proxy for `address`, if any.
    pub fn get(&self, address: ActorAddress) -> Option<StrongActorPtr> {
        self.proxies
            .lock()
            .get(&address.node)
            .and_then(|actors| actors.get(&address.id))
            .cloned()
    }

    /// Returns the cached proxy for `address` or creates one on `system`.
    pub(crate) fn get_or_put(
        &self,
        system: &ActorSystem,
        address: ActorAddress,
    ) -> ResolveResult<StrongActorPtr> {
        if let Some(proxy) = self.get(address) {
            return Ok(proxy);
        }
        if !self.backend.is_reachable(&address.node) {
            return Err(ResolutionError::UnknownNode(address.node));
        }
        let mut proxies = self.proxies.lock();
        let proxy = proxies
            .entry(address.node)
            .or_default()
            .entry(address.id)
            .or_insert_with(|| {
                debug!(actor = %address, system = %system.node(), "created proxy");
                system.make_actor(address, ActorProxy::new(address, self.backend.clone()))
            });
        Ok(proxy.clone())
    }

    /// Kills and drops every proxy for `node`. Returns how many were removed.
    pub fn erase_node(&self, node: NodeId) -> usize {
        let removed = self.proxies.lock().remove(&node);
        let Some(removed) = removed else {
            return 0;
        };
        let count = removed.len();
        for proxy in removed.into_values() {
            kill_proxy(&proxy);
        }
        debug!(%node, count, "erased proxies of node");
        count
    }

    /// Kills and drops the proxy for `address`.
    pub fn erase(&self, address: ActorAddress) -> bool {
        let removed = {
            let mut proxies = self.proxies.lock();
            let removed = proxies
                .get_mut(&address.node)
                .and_then(|actors| actors.remove(&address.id));
            if proxies.get(&address.node).is_some_and(HashMap::is_empty) {
                proxies.remove(&address.node);
            }
            removed
        };
        match removed {
            Some(proxy) => {
                kill_proxy(&proxy);
                true
            }
            None => false,
        }
    }

    pub fn count_proxies(&self, node: NodeId) -> usize {
        self.proxies.lock().get(&node).map_or(0, HashMap::len)
    }
}

impl fmt::Debug for ProxyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let proxies = self.proxies.lock();
        f.debug_struct("ProxyRegistry")
            .field("nodes", &proxies.len())
            .field("proxies", &proxies.values().map(HashMap::len).sum::<usize>())
            .finish()
    }
}

fn kill_proxy(proxy: &StrongActorPtr) {
    if let Some(proxy) = proxy.downcast_ref::<ActorProxy>() {
        proxy.kill();
    }
}

/// In-process backend that hands forwarded messages to a channel.
///
/// Useful as a loopback transport: the receiving end decides what to do with
/// each `(receiver, element)` pair.
pub struct ChannelBackend {
    reachable: RwLock<HashSet<NodeId>>,
    outbound: flume::Sender<(ActorAddress, MailboxElement)>,
}

impl ChannelBackend {
    pub fn new() -> (Self, flume::Receiver<(ActorAddress, MailboxElement)>) {
        let (outbound, inbound) = flume::unbounded();
        let backend = Self {
            reachable: RwLock::new(HashSet::new()),
            outbound,
        };
        (backend, inbound)
    }

    pub fn connect(&self, node: NodeId) {
        self.reachable.write().insert(node);
    }

    pub fn disconnect(&self, node: NodeId) -> bool {
        self.reachable.write().remove(&node)
    }
}

impl ProxyBackend for ChannelBackend {
    fn is_reachable(&self, node: &NodeId) -> bool {
        self.reachable.read().contains(node)
    }

    fn forward(&self, receiver: ActorAddress, element: MailboxElement) -> bool {
        if !self.is_reachable(&receiver.node) {
            return false;
        }
        self.outbound.send((receiver, element)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use perch_api::message::MessageId;

    fn setup() -> (
        ActorSystem,
        Arc<ChannelBackend>,
        flume::Receiver<(ActorAddress, MailboxElement)>,
        NodeId,
    ) {
        let (backend, inbound) = ChannelBackend::new();
        let backend = Arc::new(backend);
        let remote = NodeId::random();
        backend.connect(remote);
        let system = ActorSystem::builder()
            .config(SystemConfig::default())
            .proxy_backend(backend.clone())
            .build()
            .unwrap();
        (system, backend, inbound, remote)
    }

    #[test]
    fn test_get_or_put_reuses_proxy() {
        let (system, _backend, _inbound, remote) = setup();
        let proxies = system.proxies().unwrap();
        let address = ActorAddress::new(7, remote);

        let first = proxies.get_or_put(&system, address).unwrap();
        let second = proxies.get_or_put(&system, address).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(first.address(), address);
        assert!(!first.is_local());
        assert_eq!(proxies.count_proxies(remote), 1);
    }

    #[test]
    fn test_unreachable_node_is_rejected() {
        let (system, _backend, _inbound, _remote) = setup();
        let stranger = NodeId::random();
        let result = system.proxies().unwrap().get_or_put(&system, ActorAddress::new(1, stranger));
        assert_eq!(result.unwrap_err(), ResolutionError::UnknownNode(stranger));
    }

    #[test]
    fn test_proxy_forwards_through_backend() {
        let (system, _backend, inbound, remote) = setup();
        let address = ActorAddress::new(3, remote);
        let proxy = system.proxies().unwrap().get_or_put(&system, address).unwrap();

        assert!(proxy.enqueue(None, MessageId::make_request(1), Box::new("ping"), None));
        let (receiver, element) = inbound.try_recv().unwrap();
        assert_eq!(receiver, address);
        assert_eq!(element.mid, MessageId::make_request(1));
        assert_eq!(element.into_content::<&str>(), Some("ping"));
    }

    #[test]
    fn test_erase_node_kills_proxies() {
        let (system, _backend, inbound, remote) = setup();
        let proxies = system.proxies().unwrap();
        let kept = proxies.get_or_put(&system, ActorAddress::new(1, remote)).unwrap();
        proxies.get_or_put(&system, ActorAddress::new(2, remote)).unwrap();

        assert_eq!(proxies.erase_node(remote), 2);
        assert_eq!(proxies.count_proxies(remote), 0);
        assert!(kept.downcast_ref::<ActorProxy>().unwrap().is_killed());
        assert!(!kept.enqueue(None, MessageId::async_(), Box::new(1u8), None));
        assert!(inbound.try_recv().is_err());
    }

    #[test]
    fn test_erase_single_proxy() {
        let (system, _backend, _inbound, remote) = setup();
        let proxies = system.proxies().unwrap();
        let address = ActorAddress::new(9, remote);
        let proxy = proxies.get_or_put(&system, address).unwrap();
        assert_eq!(proxy.strong_count(), 2);

        assert!(proxies.erase(address));
        assert!(!proxies.erase(address));
        assert_eq!(proxy.strong_count(), 1);
        assert!(proxies.get(address).is_none());
    }
}
