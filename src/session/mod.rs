//! Store session management.
//!
//! This module provides the store session state machine, status reporting,
//! query dispatch over store variants, and the session manager that binds
//! sessions to a connection.

mod manager;
mod query;
mod retry;
mod state;
mod status;
mod store_session;
mod watermark;
mod worker;

pub use manager::{SessionManager, SessionOptions, DEFAULT_READY_DELAY};
pub use query::{
    run as run_query, QueryResult, StoreQuery, DEFAULT_DOCUMENT_KEY, DEFAULT_KEYVALUE_KEY,
    DEFAULT_LIMIT,
};
pub use retry::RetryConfig;
pub use state::SessionState;
pub use status::{NullSink, PeerDensity, StatusReport, StatusSink, StatusUpdate, READY_STATUS};
pub use store_session::StoreSession;
pub use watermark::LoadWatermark;
