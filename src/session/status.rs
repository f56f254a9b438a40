//! Status snapshots and the sink they are published to.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tokio::sync::mpsc;

use super::query::QueryResult;
use crate::engine::{StoreAddress, StoreVariant};

/// Status text published once the store finished its local load.
pub const READY_STATUS: &str = "Database is ready";

/// Ratio of peers subscribed to a store's topic over all network peers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeerDensity {
    Ratio(f64),
    /// No network peers are known, so the ratio has no value.
    Undefined,
}

impl PeerDensity {
    pub fn new(store_peers: usize, network_peers: usize) -> Self {
        if network_peers == 0 {
            PeerDensity::Undefined
        } else {
            PeerDensity::Ratio(store_peers as f64 / network_peers as f64)
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PeerDensity::Ratio(r) => Some(*r),
            PeerDensity::Undefined => None,
        }
    }
}

impl Serialize for PeerDensity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PeerDensity::Ratio(r) => serializer.serialize_f64(*r),
            PeerDensity::Undefined => serializer.serialize_none(),
        }
    }
}

/// Snapshot of a store's replication state and query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Monotonic per-session sequence number, assigned when the
    /// computation starts. Sinks may drop reports older than one
    /// they already accepted.
    pub sequence: u64,
    pub store_variant: StoreVariant,
    pub store_address: StoreAddress,
    pub session_identity: String,
    pub peer_density: PeerDensity,
    /// max(replication progress, local oplog length)
    pub oplog_upper: u64,
    /// Replication target reported by the engine.
    pub oplog_lower: u64,
    /// Most recent first.
    pub query_result: QueryResult,
}

/// Message delivered to a [`StatusSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(serialize_with = "serialize_query_data")]
    pub query_data: Option<StatusReport>,
    pub status: String,
    pub new_data: bool,
}

impl StatusUpdate {
    /// Data-bearing update.
    pub fn report(report: StatusReport) -> Self {
        Self {
            query_data: Some(report),
            status: String::new(),
            new_data: true,
        }
    }

    /// Progress-only update carrying a human-readable message.
    pub fn progress(status: impl Into<String>) -> Self {
        Self {
            query_data: None,
            status: status.into(),
            new_data: false,
        }
    }
}

fn serialize_query_data<S: Serializer>(
    data: &Option<StatusReport>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match data {
        Some(report) => report.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

/// Receiver of status updates.
///
/// Publishing must not block; there is no acknowledgment or backpressure.
pub trait StatusSink: Send + Sync {
    fn publish(&self, update: StatusUpdate);
}

impl<F> StatusSink for F
where
    F: Fn(StatusUpdate) + Send + Sync,
{
    fn publish(&self, update: StatusUpdate) {
        self(update)
    }
}

impl StatusSink for mpsc::UnboundedSender<StatusUpdate> {
    fn publish(&self, update: StatusUpdate) {
        // Receiver gone means nobody is watching any more.
        let _ = self.send(update);
    }
}

/// Sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn publish(&self, _update: StatusUpdate) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn sample_report() -> StatusReport {
        StatusReport {
            sequence: 3,
            store_variant: StoreVariant::Counter,
            store_address: StoreAddress::new("abc", "clicks"),
            session_identity: "id-1".into(),
            peer_density: PeerDensity::new(2, 4),
            oplog_upper: 7,
            oplog_lower: 5,
            query_result: QueryResult::Scalar(7),
        }
    }

    #[test]
    fn test_density_ratio() {
        assert_eq!(PeerDensity::new(2, 4), PeerDensity::Ratio(0.5));
        assert_eq!(PeerDensity::new(2, 4).as_f64(), Some(0.5));
    }

    #[test]
    fn test_density_undefined_without_network_peers() {
        let density = PeerDensity::new(0, 0);
        assert_eq!(density, PeerDensity::Undefined);
        assert!(density.as_f64().is_none());
        assert_eq!(serde_json::to_string(&density).unwrap(), "null");
    }

    #[test]
    fn test_report_wire_format() {
        let update = StatusUpdate::report(sample_report());
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["newData"], true);
        assert_eq!(json["status"], "");
        assert_eq!(json["queryData"]["storeVariant"], "counter");
        assert_eq!(json["queryData"]["storeAddress"], "/orbitdb/abc/clicks");
        assert_eq!(json["queryData"]["peerDensity"], 0.5);
        assert_eq!(json["queryData"]["oplogUpper"], 7);
        assert_eq!(json["queryData"]["queryResult"], 7);
    }

    #[test]
    fn test_progress_has_empty_query_data() {
        let update = StatusUpdate::progress("Loading database... 1 / 2");
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["newData"], false);
        assert_eq!(json["queryData"], serde_json::json!({}));
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |u: StatusUpdate| seen.lock().unwrap().push(u)
        };
        sink.publish(StatusUpdate::progress(READY_STATUS));
        assert_eq!(seen.lock().unwrap()[0].status, READY_STATUS);
    }

    #[test]
    fn test_channel_sink_ignores_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.publish(StatusUpdate::progress("ignored"));
    }
}
