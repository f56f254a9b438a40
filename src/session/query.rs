//! Bounded read queries dispatched over the store variants.

use serde::Serialize;
use serde_json::Value;

use crate::engine::{Entry, Store, StoreVariant};
use crate::Result;

/// Default number of log entries returned by a status query.
pub const DEFAULT_LIMIT: usize = 5;

/// Key looked up in document stores when none is configured.
pub const DEFAULT_DOCUMENT_KEY: &str = "peer1";

/// Key looked up in key-value stores when none is configured.
pub const DEFAULT_KEYVALUE_KEY: &str = "mykey";

/// Parameters of the query run for each status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreQuery {
    /// Maximum entries returned for log-shaped stores.
    pub limit: usize,
    /// Lookup key for keyed stores; falls back to a per-variant default.
    pub key: Option<String>,
}

impl Default for StoreQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            key: None,
        }
    }
}

impl StoreQuery {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Key used for `variant`, if the variant is keyed.
    pub fn key_for(&self, variant: StoreVariant) -> Option<&str> {
        let fallback = match variant {
            StoreVariant::DocStore => DEFAULT_DOCUMENT_KEY,
            StoreVariant::KeyValue => DEFAULT_KEYVALUE_KEY,
            StoreVariant::EventLog | StoreVariant::Feed | StoreVariant::Counter => return None,
        };
        Some(self.key.as_deref().unwrap_or(fallback))
    }
}

/// Result of a store query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    /// Values ordered most recent first.
    Values(Vec<Value>),
    /// Scalar value of a counter.
    Scalar(u64),
}

impl QueryResult {
    pub fn values(&self) -> Option<&[Value]> {
        match self {
            QueryResult::Values(v) => Some(v),
            QueryResult::Scalar(_) => None,
        }
    }

    pub fn scalar(&self) -> Option<u64> {
        match self {
            QueryResult::Scalar(n) => Some(*n),
            QueryResult::Values(_) => None,
        }
    }
}

/// Run `query` against `store`.
pub fn run(store: &Store, query: &StoreQuery) -> Result<QueryResult> {
    let variant = store.variant();
    let result = match store {
        Store::EventLog(log) | Store::Feed(log) => newest_first(log.iterator(query.limit)?),
        Store::DocStore(keyed) | Store::KeyValue(keyed) => {
            let key = query.key_for(variant).unwrap_or_default();
            let mut values = keyed.get(key)?;
            values.reverse();
            QueryResult::Values(values)
        }
        Store::Counter(counter) => QueryResult::Scalar(counter.value()?),
    };
    Ok(result)
}

fn newest_first(entries: Vec<Entry>) -> QueryResult {
    QueryResult::Values(
        entries
            .into_iter()
            .rev()
            .map(|entry| entry.payload.value)
            .collect(),
    )
}
