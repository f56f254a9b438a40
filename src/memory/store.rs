//! In-memory log engine and store handles.
//!
//! Stores live in the network's registry keyed by address, so every handle
//! opened on the same address shares one oplog. A write through one handle
//! is reported as `write` to that handle and as `replicate.progress` plus
//! `replicated` to every other loaded handle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tracing::debug;

use super::network::{poisoned, NetworkInner};
use crate::engine::{
    AccessPolicy, CounterStore, Entry, KeyedStore, LamportClock, LoadProgress, LogEngine,
    LogStore, OpenOptions, Operation, Payload, ReplicationStatus, Store, StoreAddress, StoreCore,
    StoreEvent, StoreVariant,
};
use crate::error::EngineError;

/// Capacity of each handle's event channel.
const EVENT_CAPACITY: usize = 256;

/// Field used as the document id in document stores.
pub const DOC_INDEX_FIELD: &str = "_id";

/// Manifest and shared oplog of one store.
pub(crate) struct StoreRecord {
    pub(crate) address: StoreAddress,
    store_type: String,
    access: AccessPolicy,
    oplog: RwLock<Vec<Entry>>,
    handles: Mutex<Vec<Weak<MemoryStore>>>,
}

impl StoreRecord {
    pub(crate) fn new(name: &str, store_type: &str, access: AccessPolicy) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(b"/");
        hasher.update(store_type.as_bytes());
        for writer in access.write_set() {
            hasher.update(b"/");
            hasher.update(writer.as_bytes());
        }
        let root = format!("{:x}", hasher.finalize());

        Self {
            address: StoreAddress::new(root, name),
            store_type: store_type.to_string(),
            access,
            oplog: RwLock::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    fn register(&self, handle: &Arc<MemoryStore>) -> Result<(), EngineError> {
        let mut handles = self.handles.lock().map_err(|_| poisoned())?;
        handles.retain(|h| h.strong_count() > 0);
        handles.push(Arc::downgrade(handle));
        Ok(())
    }

    fn peers_of(&self, writer: &MemoryStore) -> Vec<Arc<MemoryStore>> {
        self.handles
            .lock()
            .map(|handles| {
                handles
                    .iter()
                    .filter_map(Weak::upgrade)
                    .filter(|h| !std::ptr::eq(h.as_ref(), writer))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-memory [`LogEngine`].
pub struct MemoryEngine {
    identity: String,
    peer_id: String,
    network: Arc<NetworkInner>,
    failing_opens: AtomicUsize,
}

impl MemoryEngine {
    pub(crate) fn new(identity: String, peer_id: String, network: Arc<NetworkInner>) -> Self {
        Self {
            identity,
            peer_id,
            network,
            failing_opens: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` open calls fail with a transient error.
    pub fn fail_next_opens(&self, count: usize) {
        self.failing_opens.store(count, Ordering::SeqCst);
    }

    /// Open a typed handle, for writing to a store directly.
    pub fn open_handle(
        &self,
        address_or_name: &str,
        options: &OpenOptions,
    ) -> crate::Result<Arc<MemoryStore>> {
        let take_failure = self
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if take_failure {
            return Err(EngineError::Unavailable("simulated peer timeout".into()).into());
        }

        let record = if options.create {
            self.create_record(address_or_name, options)?
        } else {
            self.find_record(address_or_name)?
        };
        let variant: StoreVariant = record.store_type.parse()?;

        let handle = Arc::new(MemoryStore {
            record: Arc::clone(&record),
            variant,
            identity: self.identity.clone(),
            peer_id: self.peer_id.clone(),
            network: Arc::clone(&self.network),
            events: broadcast::channel(EVENT_CAPACITY).0,
            replication: Mutex::new(ReplicationStatus::default()),
            loaded: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });
        record.register(&handle)?;
        debug!(address = %record.address, local_only = options.local_only, "memory store opened");
        Ok(handle)
    }

    fn create_record(
        &self,
        name: &str,
        options: &OpenOptions,
    ) -> crate::Result<Arc<StoreRecord>> {
        let variant = options
            .variant
            .ok_or_else(|| EngineError::Backend("store type is required to create".into()))?;
        let access = options
            .access
            .clone()
            .unwrap_or_else(|| AccessPolicy::for_creator(false, &self.identity));
        let record = StoreRecord::new(name, variant.as_str(), access);

        let mut stores = self.network.stores.write().map_err(|_| poisoned())?;
        if let Some(existing) = stores.get(&record.address) {
            if !options.overwrite {
                return Err(EngineError::Backend(format!(
                    "store already exists: {}",
                    record.address
                ))
                .into());
            }
            return Ok(Arc::clone(existing));
        }
        let record = Arc::new(record);
        stores.insert(record.address.clone(), Arc::clone(&record));
        Ok(record)
    }

    fn find_record(&self, address: &str) -> crate::Result<Arc<StoreRecord>> {
        let parsed: StoreAddress = address
            .parse()
            .map_err(|_| EngineError::AddressNotFound(address.to_string()))?;
        let stores = self.network.stores.read().map_err(|_| poisoned())?;
        stores
            .get(&parsed)
            .cloned()
            .ok_or_else(|| EngineError::AddressNotFound(address.to_string()).into())
    }
}

#[async_trait]
impl LogEngine for MemoryEngine {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    async fn open(&self, address_or_name: &str, options: OpenOptions) -> crate::Result<Store> {
        let handle = self.open_handle(address_or_name, &options)?;
        Ok(handle.into_store())
    }
}

/// Handle to a store on a [`MemoryNetwork`](super::MemoryNetwork).
pub struct MemoryStore {
    record: Arc<StoreRecord>,
    variant: StoreVariant,
    identity: String,
    peer_id: String,
    network: Arc<NetworkInner>,
    events: broadcast::Sender<StoreEvent>,
    replication: Mutex<ReplicationStatus>,
    loaded: AtomicBool,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Wrap this handle in the variant-tagged [`Store`].
    pub fn into_store(self: Arc<Self>) -> Store {
        match self.variant {
            StoreVariant::EventLog => Store::EventLog(self),
            StoreVariant::Feed => Store::Feed(self),
            StoreVariant::DocStore => Store::DocStore(self),
            StoreVariant::KeyValue => Store::KeyValue(self),
            StoreVariant::Counter => Store::Counter(self),
        }
    }

    pub fn variant(&self) -> StoreVariant {
        self.variant
    }

    /// Append a value to an eventlog or feed.
    pub fn add(&self, value: Value) -> Result<String, EngineError> {
        self.expect_variant(&[StoreVariant::EventLog, StoreVariant::Feed], "add")?;
        self.append(Operation::Add, None, value)
    }

    /// Remove a feed entry by hash.
    pub fn remove(&self, hash: &str) -> Result<String, EngineError> {
        self.expect_variant(&[StoreVariant::Feed], "remove")?;
        self.append(Operation::Del, Some(hash.to_string()), Value::Null)
    }

    /// Set a key in a key-value store.
    pub fn put(&self, key: &str, value: Value) -> Result<String, EngineError> {
        self.expect_variant(&[StoreVariant::KeyValue], "put")?;
        self.append(Operation::Put, Some(key.to_string()), value)
    }

    /// Delete a key from a key-value or document store.
    pub fn delete(&self, key: &str) -> Result<String, EngineError> {
        self.expect_variant(&[StoreVariant::KeyValue, StoreVariant::DocStore], "delete")?;
        self.append(Operation::Del, Some(key.to_string()), Value::Null)
    }

    /// Insert or replace a document, indexed by its `_id` field.
    pub fn put_doc(&self, doc: Value) -> Result<String, EngineError> {
        self.expect_variant(&[StoreVariant::DocStore], "put_doc")?;
        let id = doc
            .get(DOC_INDEX_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                EngineError::Backend(format!("document is missing '{}'", DOC_INDEX_FIELD))
            })?;
        self.append(Operation::Put, Some(id), doc)
    }

    /// Increment a counter.
    pub fn inc(&self, amount: u64) -> Result<String, EngineError> {
        self.expect_variant(&[StoreVariant::Counter], "inc")?;
        self.append(Operation::Counter, None, Value::from(amount))
    }

    /// Inject an event into this handle's stream.
    pub fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    /// Override the replication counters reported by this handle.
    pub fn set_replication_status(&self, status: ReplicationStatus) {
        if let Ok(mut current) = self.replication.lock() {
            *current = status;
        }
    }

    fn expect_variant(&self, allowed: &[StoreVariant], op: &str) -> Result<(), EngineError> {
        if allowed.contains(&self.variant) {
            Ok(())
        } else {
            Err(EngineError::Backend(format!(
                "{} is not supported by {} stores",
                op, self.variant
            )))
        }
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(EngineError::StoreClosed(self.record.address.to_string()))
        } else {
            Ok(())
        }
    }

    fn append(&self, op: Operation, key: Option<String>, value: Value) -> Result<String, EngineError> {
        self.ensure_open()?;
        if !self.record.access.can_write(&self.identity) {
            return Err(EngineError::AccessDenied {
                identity: self.identity.clone(),
                address: self.record.address.to_string(),
            });
        }

        let entry = {
            let mut oplog = self.record.oplog.write().map_err(|_| poisoned())?;
            let time = oplog.last().map(|e| e.clock.time).unwrap_or(0) + 1;
            let payload = Payload { op, key, value };
            let entry = Entry {
                hash: entry_hash(&self.identity, time, &payload)?,
                identity: self.identity.clone(),
                payload,
                clock: LamportClock {
                    id: self.identity.clone(),
                    time,
                },
            };
            oplog.push(entry.clone());
            entry
        };

        let address = self.record.address.to_string();
        for peer in self.record.peers_of(self) {
            peer.receive_replica(&entry);
        }
        self.emit(StoreEvent::Write {
            address,
            entry: entry.clone(),
        });
        Ok(entry.hash)
    }

    fn receive_replica(&self, entry: &Entry) {
        if !self.loaded.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst) {
            return;
        }
        let status = match self.replication.lock() {
            Ok(mut status) => {
                status.progress += 1;
                status.max = status.max.max(status.progress);
                *status
            }
            Err(_) => return,
        };
        let address = self.record.address.to_string();
        self.emit(StoreEvent::ReplicateProgress {
            address: address.clone(),
            hash: entry.hash.clone(),
            progress: status.progress,
            have: status.max,
        });
        self.emit(StoreEvent::Replicated { address, count: 1 });
    }

    fn snapshot(&self) -> Result<Vec<Entry>, EngineError> {
        self.ensure_open()?;
        self.record
            .oplog
            .read()
            .map(|oplog| oplog.clone())
            .map_err(|_| poisoned())
    }
}

fn entry_hash(identity: &str, time: u64, payload: &Payload) -> Result<String, EngineError> {
    let encoded = serde_json::to_vec(payload)
        .map_err(|e| EngineError::Backend(format!("failed to encode payload: {}", e)))?;
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hasher.update(time.to_be_bytes());
    hasher.update(encoded);
    Ok(format!("{:x}", hasher.finalize()))
}

#[async_trait]
impl StoreCore for MemoryStore {
    fn address(&self) -> StoreAddress {
        self.record.address.clone()
    }

    fn access_policy(&self) -> AccessPolicy {
        self.record.access.clone()
    }

    fn events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn replication_status(&self) -> ReplicationStatus {
        self.replication.lock().map(|s| *s).unwrap_or_default()
    }

    fn oplog_length(&self) -> u64 {
        self.record
            .oplog
            .read()
            .map(|oplog| oplog.len() as u64)
            .unwrap_or(0)
    }

    async fn load(&self) -> Result<(), EngineError> {
        let entries = self.snapshot()?;
        let address = self.record.address.to_string();
        let total = entries.len() as u64;

        for (i, entry) in entries.iter().enumerate() {
            self.emit(StoreEvent::LoadProgress(LoadProgress {
                address: address.clone(),
                hash: entry.hash.clone(),
                entry: entry.clone(),
                progress: i as u64 + 1,
                total,
            }));
        }

        self.set_replication_status(ReplicationStatus {
            progress: total,
            max: total,
        });
        self.network.subscribe(&self.peer_id, &address)?;
        self.loaded.store(true, Ordering::SeqCst);
        self.emit(StoreEvent::Ready {
            address,
            heads: usize::from(total > 0),
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.network
            .unsubscribe(&self.peer_id, &self.record.address.to_string())
    }
}

impl LogStore for MemoryStore {
    fn iterator(&self, limit: usize) -> Result<Vec<Entry>, EngineError> {
        let entries = self.snapshot()?;
        let removed: Vec<&str> = entries
            .iter()
            .filter(|e| e.payload.op == Operation::Del)
            .filter_map(|e| e.payload.key.as_deref())
            .collect();

        let live: Vec<Entry> = entries
            .iter()
            .filter(|e| e.payload.op == Operation::Add && !removed.contains(&e.hash.as_str()))
            .cloned()
            .collect();
        let skip = live.len().saturating_sub(limit);
        Ok(live.into_iter().skip(skip).collect())
    }
}

impl KeyedStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<Value>, EngineError> {
        // Fold the oplog into an index ordered by last write.
        let mut index: Vec<(String, Value)> = Vec::new();
        for entry in self.snapshot()? {
            let Some(id) = entry.payload.key else { continue };
            index.retain(|(k, _)| k != &id);
            if entry.payload.op == Operation::Put {
                index.push((id, entry.payload.value));
            }
        }

        let values = match self.variant {
            StoreVariant::DocStore => {
                let needle = key.to_lowercase();
                index
                    .into_iter()
                    .filter(|(id, _)| id.to_lowercase().contains(&needle))
                    .map(|(_, doc)| doc)
                    .collect()
            }
            _ => index
                .into_iter()
                .filter(|(id, _)| id == key)
                .map(|(_, value)| value)
                .collect(),
        };
        Ok(values)
    }
}

impl CounterStore for MemoryStore {
    fn value(&self) -> Result<u64, EngineError> {
        Ok(self
            .snapshot()?
            .iter()
            .filter(|e| e.payload.op == Operation::Counter)
            .filter_map(|e| e.payload.value.as_u64())
            .sum())
    }
}
