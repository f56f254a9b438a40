//! Store variants and access policies.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Write-set entry that matches every identity.
pub const WILDCARD: &str = "*";

/// Data-structure shape of a replicated store, fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreVariant {
    /// Append-only log of immutable entries.
    EventLog,
    /// Log whose entries may be removed.
    Feed,
    /// Documents indexed by an id field.
    DocStore,
    /// Last-writer-wins key-value map.
    KeyValue,
    /// Grow-only counter.
    Counter,
}

impl StoreVariant {
    /// All supported variants.
    pub const ALL: [StoreVariant; 5] = [
        StoreVariant::EventLog,
        StoreVariant::Feed,
        StoreVariant::DocStore,
        StoreVariant::KeyValue,
        StoreVariant::Counter,
    ];

    /// Type name as recorded in store manifests.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EventLog => "eventlog",
            Self::Feed => "feed",
            Self::DocStore => "docstore",
            Self::KeyValue => "keyvalue",
            Self::Counter => "counter",
        }
    }
}

impl fmt::Display for StoreVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreVariant {
    type Err = crate::error::StoreSessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eventlog" | "append-log" | "log" => Ok(Self::EventLog),
            "feed" => Ok(Self::Feed),
            "docstore" | "document" | "docs" => Ok(Self::DocStore),
            "keyvalue" | "key-value" | "kv" => Ok(Self::KeyValue),
            "counter" => Ok(Self::Counter),
            _ => Err(crate::error::StoreSessionError::UnknownVariant(s.into())),
        }
    }
}

impl Serialize for StoreVariant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Rule deciding which identities may append to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Any identity may write.
    Public,
    /// Only the listed identities may write.
    Restricted(BTreeSet<String>),
}

impl AccessPolicy {
    /// Policy for a freshly created store owned by `identity`.
    pub fn for_creator(public: bool, identity: &str) -> Self {
        if public {
            AccessPolicy::Public
        } else {
            AccessPolicy::Restricted(BTreeSet::from([identity.to_string()]))
        }
    }

    /// Build a policy from a manifest write list; `*` means public.
    pub fn from_write_set<I, S>(write: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let write: BTreeSet<String> = write.into_iter().map(Into::into).collect();
        if write.contains(WILDCARD) {
            AccessPolicy::Public
        } else {
            AccessPolicy::Restricted(write)
        }
    }

    /// Write list as recorded in a manifest.
    pub fn write_set(&self) -> Vec<String> {
        match self {
            AccessPolicy::Public => vec![WILDCARD.to_string()],
            AccessPolicy::Restricted(ids) => ids.iter().cloned().collect(),
        }
    }

    /// Whether `identity` may append entries.
    pub fn can_write(&self, identity: &str) -> bool {
        match self {
            AccessPolicy::Public => true,
            AccessPolicy::Restricted(ids) => ids.contains(identity),
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, AccessPolicy::Public)
    }
}
