//! In-memory network broker and node.
//!
//! A shared [`MemoryNetwork`] connects every [`MemoryNode`] joined to it.
//! All online nodes see each other as swarm peers, and topic subscriptions
//! are tracked per node so pubsub peer queries behave like a real mesh.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::store::{MemoryEngine, StoreRecord};
use crate::config::NodeConfig;
use crate::engine::{AccessPolicy, Connection, NetworkNode, NodeConnector, StoreAddress};
use crate::error::EngineError;

#[derive(Debug, Default)]
struct PeerRecord {
    online: bool,
    topics: BTreeSet<String>,
}

#[derive(Default)]
pub(crate) struct NetworkInner {
    peers: RwLock<BTreeMap<String, PeerRecord>>,
    pub(crate) stores: RwLock<HashMap<StoreAddress, Arc<StoreRecord>>>,
}

pub(crate) fn poisoned() -> EngineError {
    EngineError::Backend("memory network lock poisoned".into())
}

impl NetworkInner {
    fn set_online(&self, peer_id: &str, online: bool) -> Result<(), EngineError> {
        let mut peers = self.peers.write().map_err(|_| poisoned())?;
        peers.entry(peer_id.to_string()).or_default().online = online;
        Ok(())
    }

    fn is_online(&self, peer_id: &str) -> bool {
        self.peers
            .read()
            .map(|peers| peers.get(peer_id).map(|p| p.online).unwrap_or(false))
            .unwrap_or(false)
    }

    pub(crate) fn subscribe(&self, peer_id: &str, topic: &str) -> Result<(), EngineError> {
        let mut peers = self.peers.write().map_err(|_| poisoned())?;
        peers
            .entry(peer_id.to_string())
            .or_default()
            .topics
            .insert(topic.to_string());
        Ok(())
    }

    pub(crate) fn unsubscribe(&self, peer_id: &str, topic: &str) -> Result<(), EngineError> {
        let mut peers = self.peers.write().map_err(|_| poisoned())?;
        if let Some(peer) = peers.get_mut(peer_id) {
            peer.topics.remove(topic);
        }
        Ok(())
    }

    fn peers_matching<F>(&self, own_id: &str, predicate: F) -> Result<Vec<String>, EngineError>
    where
        F: Fn(&PeerRecord) -> bool,
    {
        let peers = self.peers.read().map_err(|_| poisoned())?;
        Ok(peers
            .iter()
            .filter(|(id, record)| id.as_str() != own_id && record.online && predicate(record))
            .map(|(id, _)| id.clone())
            .collect())
    }
}

/// Shared in-process network that nodes and engines join.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the network as `name`, returning the node and engine pair.
    pub fn join(&self, name: &str) -> MemoryPeer {
        let node = Arc::new(MemoryNode::new(format!("peer-{}", name), self));
        let engine = Arc::new(MemoryEngine::new(
            format!("identity-{}", name),
            node.peer_id.clone(),
            Arc::clone(&self.inner),
        ));
        MemoryPeer { node, engine }
    }

    /// Join the network as `name` and return the connection.
    pub fn connect(&self, name: &str) -> Connection {
        self.join(name).connection()
    }

    /// Connector that joins this network as `name`.
    pub fn connector(&self, name: &str) -> MemoryConnector {
        MemoryConnector {
            network: self.clone(),
            name: name.to_string(),
        }
    }

    /// Register a store manifest directly, bypassing type validation.
    ///
    /// Lets tests publish manifests written by engines that support more
    /// store types than this crate does.
    pub fn insert_manifest(&self, name: &str, store_type: &str, access: AccessPolicy) -> StoreAddress {
        let record = StoreRecord::new(name, store_type, access);
        let address = record.address.clone();
        if let Ok(mut stores) = self.inner.stores.write() {
            stores.entry(address.clone()).or_insert_with(|| Arc::new(record));
        }
        address
    }

    /// Number of stores known to the network.
    pub fn store_count(&self) -> usize {
        self.inner.stores.read().map(|s| s.len()).unwrap_or(0)
    }
}

/// Node and engine of one participant on a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryPeer {
    pub node: Arc<MemoryNode>,
    pub engine: Arc<MemoryEngine>,
}

impl MemoryPeer {
    pub fn connection(&self) -> Connection {
        Connection::new(self.node.clone(), self.engine.clone())
    }
}

/// In-memory [`NetworkNode`].
pub struct MemoryNode {
    peer_id: String,
    network: Arc<NetworkInner>,
}

impl MemoryNode {
    fn new(peer_id: String, network: &MemoryNetwork) -> Self {
        if let Err(e) = network.inner.set_online(&peer_id, true) {
            tracing::warn!(peer_id = %peer_id, error = %e, "node joined offline");
        }
        Self {
            peer_id,
            network: Arc::clone(&network.inner),
        }
    }

    /// Take the node offline.
    pub fn stop(&self) -> Result<(), EngineError> {
        self.network.set_online(&self.peer_id, false)
    }

    /// Bring the node back online.
    pub fn start(&self) -> Result<(), EngineError> {
        self.network.set_online(&self.peer_id, true)
    }

    /// Subscribe to a pubsub topic.
    pub fn subscribe(&self, topic: &str) -> Result<(), EngineError> {
        self.network.subscribe(&self.peer_id, topic)
    }

    fn ensure_online(&self) -> Result<(), EngineError> {
        if self.network.is_online(&self.peer_id) {
            Ok(())
        } else {
            Err(EngineError::Unavailable(format!(
                "node {} is offline",
                self.peer_id
            )))
        }
    }
}

#[async_trait]
impl NetworkNode for MemoryNode {
    fn peer_id(&self) -> String {
        self.peer_id.clone()
    }

    fn is_online(&self) -> bool {
        self.network.is_online(&self.peer_id)
    }

    async fn swarm_peers(&self) -> Result<Vec<String>, EngineError> {
        self.ensure_online()?;
        self.network.peers_matching(&self.peer_id, |_| true)
    }

    async fn pubsub_peers(&self, topic: &str) -> Result<Vec<String>, EngineError> {
        self.ensure_online()?;
        self.network
            .peers_matching(&self.peer_id, |peer| peer.topics.contains(topic))
    }
}

/// [`NodeConnector`] that joins a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryConnector {
    network: MemoryNetwork,
    name: String,
}

#[async_trait]
impl NodeConnector for MemoryConnector {
    async fn connect(&self, config: &NodeConfig) -> crate::Result<Connection> {
        let peer = self.network.join(&self.name);
        if !config.start {
            peer.node.stop()?;
        }
        if config.pubsub {
            tracing::debug!(
                swarm = ?config.swarm_addresses,
                "pubsub enabled on memory node"
            );
        }
        Ok(peer.connection())
    }
}
