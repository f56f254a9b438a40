//! Session manager: connection holder and store session factory.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::info;

use super::query::StoreQuery;
use super::retry::RetryConfig;
use super::status::StatusSink;
use super::store_session::StoreSession;
use crate::config::NodeConfig;
use crate::engine::{Connection, NodeConnector, StoreVariant};
use crate::error::StoreSessionError;
use crate::Result;

/// Default delay before the "Database is ready" message is published.
pub const DEFAULT_READY_DELAY: Duration = Duration::from_millis(1000);

/// Options applied to every session created by a manager.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Query run for each status report.
    pub query: StoreQuery,
    /// Delay between the `ready` event and the ready status message.
    pub ready_delay: Duration,
    /// Retry policy for open and load calls.
    pub retry: RetryConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            query: StoreQuery::default(),
            ready_delay: DEFAULT_READY_DELAY,
            retry: RetryConfig::no_retry(),
        }
    }
}

impl SessionOptions {
    pub fn with_query(mut self, query: StoreQuery) -> Self {
        self.query = query;
        self
    }

    pub fn with_ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Holds one connection and hands out store sessions bound to it.
pub struct SessionManager {
    connection: RwLock<Option<Connection>>,
    options: SessionOptions,
}

impl SessionManager {
    /// Create a manager with no connection yet.
    pub fn new(options: SessionOptions) -> Self {
        Self {
            connection: RwLock::new(None),
            options,
        }
    }

    /// Create a manager around an established connection.
    pub fn with_connection(connection: Connection, options: SessionOptions) -> Self {
        Self {
            connection: RwLock::new(Some(connection)),
            options,
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Bootstrap a node and engine through `connector`.
    pub async fn connect(&self, connector: &dyn NodeConnector, config: &NodeConfig) -> Result<()> {
        let connection = connector.connect(config).await?;
        info!(
            peer_id = %connection.node.peer_id(),
            identity = %connection.identity(),
            "connected to network"
        );
        self.attach(connection)
    }

    /// Use an already established connection.
    pub fn attach(&self, connection: Connection) -> Result<()> {
        let mut current = self
            .connection
            .write()
            .map_err(|_| StoreSessionError::LockPoisoned)?;
        *current = Some(connection);
        Ok(())
    }

    /// Drop the connection. Existing sessions keep their own reference.
    pub fn disconnect(&self) -> Result<Option<Connection>> {
        let mut current = self
            .connection
            .write()
            .map_err(|_| StoreSessionError::LockPoisoned)?;
        Ok(current.take())
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .read()
            .map(|c| c.is_some())
            .unwrap_or(false)
    }

    /// The current connection, or [`StoreSessionError::NotConnected`].
    pub fn connection(&self) -> Result<Connection> {
        let current = self
            .connection
            .read()
            .map_err(|_| StoreSessionError::LockPoisoned)?;
        current.clone().ok_or(StoreSessionError::NotConnected)
    }

    /// Create an uninitialized session reporting to `sink`.
    pub fn session(&self, sink: Arc<dyn StatusSink>) -> Result<StoreSession> {
        Ok(StoreSession::new(
            self.connection()?,
            sink,
            self.options.clone(),
        ))
    }

    /// Create a session and a fresh store in one step.
    pub async fn create_database(
        &self,
        name: &str,
        variant: StoreVariant,
        public: bool,
        sink: Arc<dyn StatusSink>,
    ) -> Result<StoreSession> {
        let mut session = self.session(sink)?;
        session.create_store(name, variant, public).await?;
        Ok(session)
    }

    /// Create a session and open an existing store in one step.
    pub async fn open_database(
        &self,
        address: &str,
        sink: Arc<dyn StatusSink>,
    ) -> Result<StoreSession> {
        let mut session = self.session(sink)?;
        session.open_store(address).await?;
        Ok(session)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}
