//! Store address type.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Protocol prefix of every store address.
pub const ADDRESS_PREFIX: &str = "/orbitdb/";

/// Stable identifier of a replicated store.
///
/// Addresses are assigned by the log engine and displayed as
/// `/orbitdb/<root>/<path>`, where `root` is the content hash of the store
/// manifest and `path` is the store name given at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreAddress {
    root: String,
    path: String,
}

impl StoreAddress {
    /// Create an address from a manifest hash and a store name.
    pub fn new(root: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            path: path.into(),
        }
    }

    /// Manifest hash part of the address.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Store name part of the address.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check whether a string parses as a store address.
    pub fn is_valid(s: &str) -> bool {
        s.parse::<StoreAddress>().is_ok()
    }
}

impl fmt::Display for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", ADDRESS_PREFIX, self.root, self.path)
    }
}

impl FromStr for StoreAddress {
    type Err = crate::error::StoreSessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(ADDRESS_PREFIX)
            .and_then(|rest| rest.split_once('/'))
            .filter(|(root, path)| {
                !root.is_empty()
                    && !path.is_empty()
                    && root.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(|(root, path)| StoreAddress::new(root, path))
            .ok_or_else(|| crate::error::StoreSessionError::InvalidAddress(s.into()))
    }
}

impl Serialize for StoreAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let addr = StoreAddress::new("zdpuAabc123", "counters");
        assert_eq!(addr.to_string(), "/orbitdb/zdpuAabc123/counters");
    }

    #[test]
    fn test_parse_valid() {
        let addr: StoreAddress = "/orbitdb/zdpuAabc123/my-feed".parse().unwrap();
        assert_eq!(addr.root(), "zdpuAabc123");
        assert_eq!(addr.path(), "my-feed");
    }

    #[test]
    fn test_path_may_contain_slashes() {
        let addr: StoreAddress = "/orbitdb/abc/team/notes".parse().unwrap();
        assert_eq!(addr.path(), "team/notes");
    }

    #[test]
    fn test_parse_invalid() {
        // Missing prefix
        assert!("abc/name".parse::<StoreAddress>().is_err());

        // Wrong prefix
        assert!("/ipfs/abc/name".parse::<StoreAddress>().is_err());

        // Missing name
        assert!("/orbitdb/abc".parse::<StoreAddress>().is_err());
        assert!("/orbitdb/abc/".parse::<StoreAddress>().is_err());

        // Non-alphanumeric root
        assert!("/orbitdb/a-b/name".parse::<StoreAddress>().is_err());

        // Empty
        assert!("".parse::<StoreAddress>().is_err());
    }

    #[test]
    fn test_roundtrip() {
        let original = StoreAddress::new("f00d", "docs");
        let parsed: StoreAddress = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_serializes_as_string() {
        let addr = StoreAddress::new("f00d", "docs");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"/orbitdb/f00d/docs\"");
    }
}
