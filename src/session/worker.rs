//! Event pump and status worker.
//!
//! Lifecycle events arrive on a broadcast receiver in emission order. The
//! pump handles `load.progress` inline and turns every other event into a
//! refresh request. A single status worker drains refresh requests, so at
//! most one status computation is in flight per session; requests that
//! arrive while it runs collapse into one follow-up computation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::query::{self, StoreQuery};
use super::status::{PeerDensity, StatusReport, StatusSink, StatusUpdate, READY_STATUS};
use super::watermark::LoadWatermark;
use crate::engine::{Connection, LoadProgress, Store, StoreEvent};
use crate::error::StoreSessionError;
use crate::Result;

/// State shared between a session and its background tasks.
pub(crate) struct SessionShared {
    pub(crate) connection: Connection,
    sink: Arc<dyn StatusSink>,
    query: RwLock<StoreQuery>,
    watermark: Mutex<LoadWatermark>,
    sequence: AtomicU64,
    refresh: Notify,
    pub(crate) cancel: CancellationToken,
}

impl SessionShared {
    pub(crate) fn new(connection: Connection, sink: Arc<dyn StatusSink>, query: StoreQuery) -> Self {
        Self {
            connection,
            sink,
            query: RwLock::new(query),
            watermark: Mutex::new(LoadWatermark::new()),
            sequence: AtomicU64::new(0),
            refresh: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn query(&self) -> Result<StoreQuery> {
        self.query
            .read()
            .map(|q| q.clone())
            .map_err(|_| StoreSessionError::LockPoisoned)
    }

    pub(crate) fn set_query(&self, query: StoreQuery) -> Result<()> {
        let mut current = self
            .query
            .write()
            .map_err(|_| StoreSessionError::LockPoisoned)?;
        *current = query;
        Ok(())
    }

    pub(crate) fn watermark(&self) -> Result<LoadWatermark> {
        self.watermark
            .lock()
            .map(|w| *w)
            .map_err(|_| StoreSessionError::LockPoisoned)
    }

    /// Ask the status worker for a fresh report.
    pub(crate) fn request_refresh(&self) {
        self.refresh.notify_one();
    }

    /// Publish an update unless the session has been closed.
    pub(crate) fn publish(&self, update: StatusUpdate) {
        if self.cancel.is_cancelled() {
            debug!(status = %update.status, "session closed, update suppressed");
            return;
        }
        self.sink.publish(update);
    }

    /// Fold a load-progress event into the watermark and publish the progress line.
    pub(crate) fn observe_load(&self, event: &LoadProgress) -> Result<()> {
        let text = {
            let mut watermark = self
                .watermark
                .lock()
                .map_err(|_| StoreSessionError::LockPoisoned)?;
            watermark.observe(event);
            watermark.status_text()
        };
        self.publish(StatusUpdate::progress(text));
        Ok(())
    }

    /// Compute a status report for `store`.
    pub(crate) async fn compute(&self, store: &Store) -> Result<StatusReport> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let address = store.address();
        let topic = address.to_string();

        let network_peers = self.connection.node.swarm_peers().await?;
        let store_peers = self.connection.node.pubsub_peers(&topic).await?;

        let replication = store.replication_status();
        let query = self.query()?;
        let query_result = query::run(store, &query)?;

        Ok(StatusReport {
            sequence,
            store_variant: store.variant(),
            store_address: address,
            session_identity: self.connection.identity(),
            peer_density: PeerDensity::new(store_peers.len(), network_peers.len()),
            oplog_upper: replication.progress.max(store.oplog_length()),
            oplog_lower: replication.max,
            query_result,
        })
    }

    /// Compute a report and hand it to the sink.
    pub(crate) async fn render(&self, store: &Store) -> Result<StatusReport> {
        let report = self.compute(store).await?;
        debug!(
            sequence = report.sequence,
            address = %report.store_address,
            oplog_upper = report.oplog_upper,
            oplog_lower = report.oplog_lower,
            "status report"
        );
        self.publish(StatusUpdate::report(report.clone()));
        Ok(report)
    }
}

/// Spawn the event pump and status worker for a loaded store.
pub(crate) fn spawn(
    shared: Arc<SessionShared>,
    store: Store,
    events: broadcast::Receiver<StoreEvent>,
    ready_delay: Duration,
) -> Vec<JoinHandle<()>> {
    let worker = tokio::spawn(status_worker(Arc::clone(&shared), store));
    let pump = tokio::spawn(event_pump(shared, events, ready_delay));
    vec![worker, pump]
}

async fn status_worker(shared: Arc<SessionShared>, store: Store) {
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = shared.refresh.notified() => {
                if let Err(e) = shared.render(&store).await {
                    warn!(error = %e, "status computation failed");
                }
            }
        }
    }
    debug!("status worker stopped");
}

async fn event_pump(
    shared: Arc<SessionShared>,
    mut events: broadcast::Receiver<StoreEvent>,
    ready_delay: Duration,
) {
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            received = events.recv() => match received {
                Ok(event) => handle_event(&shared, event, ready_delay),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "store event receiver lagged");
                    shared.request_refresh();
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
    debug!("event pump stopped");
}

fn handle_event(shared: &Arc<SessionShared>, event: StoreEvent, ready_delay: Duration) {
    debug!(event = event.name(), "store event");
    match event {
        StoreEvent::LoadProgress(progress) => {
            if let Err(e) = shared.observe_load(&progress) {
                warn!(error = %e, "failed to record load progress");
            }
        }
        StoreEvent::Ready { .. } => {
            shared.request_refresh();
            announce_ready(Arc::clone(shared), ready_delay);
        }
        StoreEvent::Replicated { .. }
        | StoreEvent::Write { .. }
        | StoreEvent::ReplicateProgress { .. } => shared.request_refresh(),
    }
}

fn announce_ready(shared: Arc<SessionShared>, delay: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = shared.cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => shared.publish(StatusUpdate::progress(READY_STATUS)),
        }
    });
}
