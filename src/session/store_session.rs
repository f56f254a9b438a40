//! Store session: one store handle and its status reporting.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::manager::SessionOptions;
use super::query::StoreQuery;
use super::retry::retrying;
use super::state::SessionState;
use super::status::{StatusReport, StatusSink};
use super::watermark::LoadWatermark;
use super::worker::{self, SessionShared};
use crate::engine::{
    AccessPolicy, Connection, OpenOptions, Store, StoreAddress, StoreVariant,
};
use crate::error::StoreSessionError;
use crate::Result;

/// Session over a single replicated store.
///
/// A session starts `Uninitialized`, holds at most one store after
/// [`create_store`](Self::create_store) or [`open_store`](Self::open_store),
/// and becomes permanently `Closed` after [`reset_store`](Self::reset_store).
pub struct StoreSession {
    state: SessionState,
    store: Option<Store>,
    options: SessionOptions,
    shared: Arc<SessionShared>,
    workers: Vec<JoinHandle<()>>,
}

impl StoreSession {
    /// Create an uninitialized session on an established connection.
    pub fn new(connection: Connection, sink: Arc<dyn StatusSink>, options: SessionOptions) -> Self {
        let shared = SessionShared::new(connection, sink, options.query.clone());
        Self {
            state: SessionState::Uninitialized,
            store: None,
            options,
            shared: Arc::new(shared),
            workers: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }

    /// Identity this session writes with.
    pub fn identity(&self) -> String {
        self.shared.connection.identity()
    }

    pub fn store_variant(&self) -> Option<StoreVariant> {
        self.store.as_ref().map(Store::variant)
    }

    pub fn store_address(&self) -> Option<StoreAddress> {
        self.store.as_ref().map(Store::address)
    }

    pub fn access_policy(&self) -> Option<AccessPolicy> {
        self.store.as_ref().map(Store::access_policy)
    }

    /// The held store handle, if any.
    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    /// Current load-progress watermark.
    pub fn watermark(&self) -> Result<LoadWatermark> {
        self.shared.watermark()
    }

    /// Replace the query run for subsequent status reports.
    pub fn set_query(&self, query: StoreQuery) -> Result<()> {
        self.shared.set_query(query)
    }

    /// Create a fresh store named `name`.
    ///
    /// Public stores accept writes from any identity; otherwise only this
    /// session's identity may write.
    pub async fn create_store(
        &mut self,
        name: &str,
        variant: StoreVariant,
        public: bool,
    ) -> Result<()> {
        if self.state.is_terminal() {
            return Err(StoreSessionError::SessionClosed);
        }
        if name.trim().is_empty() {
            return Err(StoreSessionError::InvalidStoreName);
        }
        let opening = self.begin_open()?;
        let result = self.create_inner(name, variant, public).await;
        self.finish_open(opening, result)
    }

    /// Open an existing store in synchronized mode.
    pub async fn open_store(&mut self, address: &str) -> Result<()> {
        if self.state.is_terminal() {
            return Err(StoreSessionError::SessionClosed);
        }
        let address: StoreAddress = address.parse()?;
        let opening = self.begin_open()?;
        let result = self.open_inner(&address).await;
        self.finish_open(opening, result)
    }

    async fn create_inner(&self, name: &str, variant: StoreVariant, public: bool) -> Result<Store> {
        let connection = &self.shared.connection;
        connection.ensure_online()?;

        let access = AccessPolicy::for_creator(public, &connection.identity());
        let options = OpenOptions::create(variant, access);
        debug!(name, %variant, public, "creating store");

        let engine = Arc::clone(&connection.engine);
        retrying(&self.options.retry, "create", || {
            let engine = Arc::clone(&engine);
            let options = options.clone();
            let name = name.to_string();
            async move { engine.open(&name, options).await }
        })
        .await
    }

    async fn open_inner(&self, address: &StoreAddress) -> Result<Store> {
        let connection = &self.shared.connection;
        connection.ensure_online()?;
        debug!(%address, "opening store");

        let engine = Arc::clone(&connection.engine);
        let address = address.to_string();
        retrying(&self.options.retry, "open", || {
            let engine = Arc::clone(&engine);
            let address = address.clone();
            async move { engine.open(&address, OpenOptions::sync()).await }
        })
        .await
    }

    /// Validate the move to `Opening` without committing it.
    ///
    /// `self.state` only changes once the engine call has returned, so a
    /// create or open future dropped mid-flight leaves the session as it was.
    fn begin_open(&self) -> Result<SessionState> {
        let mut opening = self.state;
        opening.transition_to(SessionState::Opening)?;
        Ok(opening)
    }

    fn finish_open(&mut self, mut opening: SessionState, result: Result<Store>) -> Result<()> {
        match result {
            Ok(store) => {
                opening.transition_to(SessionState::Ready)?;
                info!(
                    address = %store.address(),
                    variant = %store.variant(),
                    public = store.access_policy().is_public(),
                    "store ready"
                );
                self.store = Some(store);
                self.state = opening;
                Ok(())
            }
            Err(e) => {
                opening.transition_to(SessionState::Uninitialized)?;
                self.state = opening;
                Err(e)
            }
        }
    }

    /// Subscribe to the store's events and load its local log.
    ///
    /// Returns once the local load has completed. Replication continues in
    /// the background and is reported through the sink.
    pub async fn load_store(&mut self) -> Result<()> {
        self.state.require_store()?;
        let store = self.store.clone().ok_or(StoreSessionError::NoStore)?;

        // Subscribe before loading so no load event is missed.
        if self.workers.is_empty() {
            let events = store.events();
            self.workers = worker::spawn(
                Arc::clone(&self.shared),
                store.clone(),
                events,
                self.options.ready_delay,
            );
        }

        info!(address = %store.address(), "loading store");
        retrying(&self.options.retry, "load", || {
            let store = store.clone();
            async move { store.load().await.map_err(StoreSessionError::from) }
        })
        .await
    }

    /// Compute a status report now and publish it to the sink.
    ///
    /// On failure nothing is published and the previous report stays the
    /// last known good state.
    pub async fn query_and_render(&self) -> Result<StatusReport> {
        self.state.require_store()?;
        let store = self.store.as_ref().ok_or(StoreSessionError::NoStore)?;
        self.shared.render(store).await
    }

    /// Close the store and end the session.
    ///
    /// Closing an already closed session is a no-op. A session without a
    /// store holds nothing to close: it fails with `NoStore` and stays
    /// usable for another create or open.
    pub async fn reset_store(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            debug!("store already closed");
            return Ok(());
        }
        self.state.require_store()?;
        let store = self.store.take().ok_or(StoreSessionError::NoStore)?;

        self.shared.cancel.cancel();
        for handle in self.workers.drain(..) {
            handle.abort();
        }
        self.state.transition_to(SessionState::Closed)?;

        info!(address = %store.address(), "closing store");
        store.close().await?;
        Ok(())
    }
}

impl Drop for StoreSession {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl std::fmt::Debug for StoreSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSession")
            .field("state", &self.state)
            .field("store", &self.store)
            .finish()
    }
}
