//! Store handles and the variant-specific reader traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use super::address::StoreAddress;
use super::variant::{AccessPolicy, StoreVariant};
use crate::error::EngineError;

/// Operation recorded by an oplog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Add,
    Put,
    Del,
    Counter,
}

/// Payload carried by an oplog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub op: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: Value,
}

/// Lamport clock attached to every entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LamportClock {
    pub id: String,
    pub time: u64,
}

/// A single oplog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Content hash of the entry.
    pub hash: String,
    /// Identity that wrote the entry.
    pub identity: String,
    pub payload: Payload,
    pub clock: LamportClock,
}

/// Replication counters reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplicationStatus {
    /// Entries replicated so far.
    pub progress: u64,
    /// Replication target.
    pub max: u64,
}

/// Payload of a `load.progress` event.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProgress {
    pub address: String,
    pub hash: String,
    pub entry: Entry,
    pub progress: u64,
    pub total: u64,
}

/// Lifecycle event emitted by a store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Local load finished.
    Ready { address: String, heads: usize },
    /// Entries were merged from a peer.
    Replicated { address: String, count: usize },
    /// A local write was appended.
    Write { address: String, entry: Entry },
    /// Replication fetched another entry.
    ReplicateProgress {
        address: String,
        hash: String,
        progress: u64,
        have: u64,
    },
    /// Local load advanced.
    LoadProgress(LoadProgress),
}

impl StoreEvent {
    /// Event name as used on the engine's event stream.
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::Ready { .. } => "ready",
            StoreEvent::Replicated { .. } => "replicated",
            StoreEvent::Write { .. } => "write",
            StoreEvent::ReplicateProgress { .. } => "replicate.progress",
            StoreEvent::LoadProgress(_) => "load.progress",
        }
    }
}

/// Operations shared by every store variant.
#[async_trait]
pub trait StoreCore: Send + Sync {
    fn address(&self) -> StoreAddress;

    fn access_policy(&self) -> AccessPolicy;

    /// Subscribe to the store's lifecycle events.
    fn events(&self) -> broadcast::Receiver<StoreEvent>;

    fn replication_status(&self) -> ReplicationStatus;

    /// Number of entries in the local oplog.
    fn oplog_length(&self) -> u64;

    /// Load the locally persisted log and start synchronizing.
    async fn load(&self) -> Result<(), EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

/// Reader for log-shaped stores (eventlog, feed).
pub trait LogStore: StoreCore {
    /// The last `limit` entries, oldest first.
    fn iterator(&self, limit: usize) -> Result<Vec<Entry>, EngineError>;
}

/// Reader for keyed stores (docstore, keyvalue).
pub trait KeyedStore: StoreCore {
    /// Values stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<Value>, EngineError>;
}

/// Reader for counter stores.
pub trait CounterStore: StoreCore {
    fn value(&self) -> Result<u64, EngineError>;
}

/// Handle to an opened store, tagged by variant.
#[derive(Clone)]
pub enum Store {
    EventLog(Arc<dyn LogStore>),
    Feed(Arc<dyn LogStore>),
    DocStore(Arc<dyn KeyedStore>),
    KeyValue(Arc<dyn KeyedStore>),
    Counter(Arc<dyn CounterStore>),
}

macro_rules! with_core {
    ($store:expr, $s:ident => $body:expr) => {
        match $store {
            Store::EventLog($s) | Store::Feed($s) => $body,
            Store::DocStore($s) | Store::KeyValue($s) => $body,
            Store::Counter($s) => $body,
        }
    };
}

impl Store {
    pub fn variant(&self) -> StoreVariant {
        match self {
            Store::EventLog(_) => StoreVariant::EventLog,
            Store::Feed(_) => StoreVariant::Feed,
            Store::DocStore(_) => StoreVariant::DocStore,
            Store::KeyValue(_) => StoreVariant::KeyValue,
            Store::Counter(_) => StoreVariant::Counter,
        }
    }

    pub fn address(&self) -> StoreAddress {
        with_core!(self, s => s.address())
    }

    pub fn access_policy(&self) -> AccessPolicy {
        with_core!(self, s => s.access_policy())
    }

    pub fn events(&self) -> broadcast::Receiver<StoreEvent> {
        with_core!(self, s => s.events())
    }

    pub fn replication_status(&self) -> ReplicationStatus {
        with_core!(self, s => s.replication_status())
    }

    pub fn oplog_length(&self) -> u64 {
        with_core!(self, s => s.oplog_length())
    }

    pub async fn load(&self) -> Result<(), EngineError> {
        with_core!(self, s => s.load().await)
    }

    pub async fn close(&self) -> Result<(), EngineError> {
        with_core!(self, s => s.close().await)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("variant", &self.variant())
            .field("address", &self.address().to_string())
            .finish()
    }
}

/// Options passed to [`LogEngine::open`](super::LogEngine::open).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenOptions {
    /// Create the store if it does not exist.
    pub create: bool,
    /// Replace an existing store of the same name.
    pub overwrite: bool,
    /// Only load the local copy, never fetch from peers.
    pub local_only: bool,
    /// Variant to create; ignored when opening.
    pub variant: Option<StoreVariant>,
    /// Access policy to create with; ignored when opening.
    pub access: Option<AccessPolicy>,
}

impl OpenOptions {
    /// Options for creating a fresh store that synchronizes with the network.
    pub fn create(variant: StoreVariant, access: AccessPolicy) -> Self {
        Self {
            create: true,
            overwrite: true,
            local_only: false,
            variant: Some(variant),
            access: Some(access),
        }
    }

    /// Options for opening an existing store in synchronized mode.
    pub fn sync() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let ready = StoreEvent::Ready {
            address: "/orbitdb/a/b".into(),
            heads: 0,
        };
        assert_eq!(ready.name(), "ready");

        let progress = StoreEvent::ReplicateProgress {
            address: "/orbitdb/a/b".into(),
            hash: "h".into(),
            progress: 1,
            have: 2,
        };
        assert_eq!(progress.name(), "replicate.progress");
    }

    #[test]
    fn test_create_options() {
        let opts = OpenOptions::create(StoreVariant::Feed, AccessPolicy::Public);
        assert!(opts.create);
        assert!(opts.overwrite);
        assert!(!opts.local_only);
        assert_eq!(opts.variant, Some(StoreVariant::Feed));
    }

    #[test]
    fn test_sync_options() {
        let opts = OpenOptions::sync();
        assert!(!opts.create);
        assert!(!opts.local_only);
        assert!(opts.access.is_none());
    }

    #[test]
    fn test_payload_wire_format() {
        let payload = Payload {
            op: Operation::Put,
            key: Some("mykey".into()),
            value: serde_json::json!(42),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["op"], "PUT");
        assert_eq!(json["key"], "mykey");
        assert_eq!(json["value"], 42);
    }
}
