//! # store-session
//!
//! Session controller for replicated peer-to-peer log stores.
//!
//! A [`StoreSession`] creates or opens one store of a fixed variant (event
//! log, feed, document store, key-value store or counter), loads it, and
//! publishes a status report to a [`StatusSink`] every time the store's
//! lifecycle events say something changed.
//!
//! ## Features
//!
//! - **Variant dispatch**: one closed [`Store`] enum with exhaustive queries
//! - **Serialized reporting**: coalesced refreshes with monotonic sequence numbers
//! - **Load watermark**: progress text that never moves backwards
//! - **Pluggable backends**: network node and log engine behind async traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use store_session::memory::MemoryNetwork;
//! use store_session::{SessionManager, SessionOptions, StatusUpdate, StoreVariant};
//!
//! #[tokio::main]
//! async fn main() -> store_session::Result<()> {
//!     store_session::logging::try_init().ok();
//!
//!     let network = MemoryNetwork::new();
//!     let manager = SessionManager::with_connection(network.connect("alice"), SessionOptions::default());
//!
//!     let sink = Arc::new(|update: StatusUpdate| println!("{}", update.status));
//!     let mut session = manager
//!         .create_database("events", StoreVariant::EventLog, false, sink)
//!         .await?;
//!     session.load_store().await?;
//!
//!     let report = session.query_and_render().await?;
//!     println!("{:?}", report.query_result);
//!
//!     session.reset_store().await
//! }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod memory;
pub mod session;

// Re-export commonly used types
pub use config::{Config, NodeConfig};
pub use engine::{
    AccessPolicy, Connection, LogEngine, NetworkNode, NodeConnector, Store, StoreAddress,
    StoreEvent, StoreVariant,
};
pub use error::{EngineError, Result, StoreSessionError};
pub use session::{
    PeerDensity, QueryResult, SessionManager, SessionOptions, SessionState, StatusReport,
    StatusSink, StatusUpdate, StoreQuery, StoreSession,
};
