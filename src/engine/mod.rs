//! Boundary to the network node and replicated log engine.
//!
//! The session layer only talks to these traits. Production deployments
//! plug in adapters for a real node and engine; [`crate::memory`] provides
//! an in-process implementation.

mod address;
mod store;
mod variant;

pub use address::{StoreAddress, ADDRESS_PREFIX};
pub use store::{
    CounterStore, Entry, KeyedStore, LamportClock, LoadProgress, LogStore, OpenOptions,
    Operation, Payload, ReplicationStatus, Store, StoreCore, StoreEvent,
};
pub use variant::{AccessPolicy, StoreVariant, WILDCARD};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::NodeConfig;
use crate::error::{EngineError, StoreSessionError};
use crate::Result;

/// Peer-to-peer transport with topic-based pub/sub.
#[async_trait]
pub trait NetworkNode: Send + Sync {
    /// Identifier of this node on the network.
    fn peer_id(&self) -> String;

    /// Whether the node is started and reachable.
    fn is_online(&self) -> bool;

    /// All peers currently connected to this node.
    async fn swarm_peers(&self) -> std::result::Result<Vec<String>, EngineError>;

    /// Peers subscribed to `topic`.
    async fn pubsub_peers(&self, topic: &str) -> std::result::Result<Vec<String>, EngineError>;
}

/// Replicated log engine hosting named stores.
#[async_trait]
pub trait LogEngine: Send + Sync {
    /// Identity used to sign writes.
    fn identity(&self) -> String;

    /// Open or create a store by address or name.
    async fn open(&self, address_or_name: &str, options: OpenOptions) -> Result<Store>;
}

/// Establishes a node and engine from bootstrap configuration.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    async fn connect(&self, config: &NodeConfig) -> Result<Connection>;
}

/// Connected node and engine pair shared by store sessions.
#[derive(Clone)]
pub struct Connection {
    pub node: Arc<dyn NetworkNode>,
    pub engine: Arc<dyn LogEngine>,
}

impl Connection {
    pub fn new(node: Arc<dyn NetworkNode>, engine: Arc<dyn LogEngine>) -> Self {
        Self { node, engine }
    }

    /// Identity of the engine, reported in status snapshots.
    pub fn identity(&self) -> String {
        self.engine.identity()
    }

    /// Fail with [`StoreSessionError::NotConnected`] when the node is offline.
    pub fn ensure_online(&self) -> Result<()> {
        if self.node.is_online() {
            Ok(())
        } else {
            Err(StoreSessionError::NotConnected)
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer_id", &self.node.peer_id())
            .field("identity", &self.engine.identity())
            .finish()
    }
}
