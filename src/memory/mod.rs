//! In-process network and log engine.
//!
//! Backs the demo binary and the test suite. Every participant joins a shared
//! [`MemoryNetwork`] and gets a node and an engine; stores opened at the same
//! address share one oplog, so writes from one peer replicate to the others.

mod network;
mod store;

pub use network::{MemoryConnector, MemoryNetwork, MemoryNode, MemoryPeer};
pub use store::{MemoryEngine, MemoryStore, DOC_INDEX_FIELD};
