//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

use store_session::cli::{parse_args_from, Args};
use store_session::config::Config;
use store_session::StoreVariant;

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("store-session")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert_eq!(result.name, "demo");
    assert_eq!(result.variant, StoreVariant::EventLog);
    assert!(!result.public);
    assert!(result.config.is_none());
    assert!(result.open.is_none());
    assert!(result.key.is_none());
    assert!(result.limit.is_none());
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-n",
        "settings",
        "-t",
        "keyvalue",
        "--public",
        "-k",
        "theme",
        "--limit",
        "10",
        "-l",
        "debug",
    ]))
    .unwrap();

    assert_eq!(result.name, "settings");
    assert_eq!(result.variant, StoreVariant::KeyValue);
    assert!(result.public);
    assert_eq!(result.key, Some("theme".to_string()));
    assert_eq!(result.limit, Some(10));
    assert_eq!(result.log_level, Some("debug".to_string()));
}

#[test]
fn test_cli_config_file() {
    let result = parse_args_from(args(&["-c", "/etc/store-session.json"])).unwrap();

    assert!(result.config.is_some());
    assert_eq!(
        result.config.unwrap().to_str().unwrap(),
        "/etc/store-session.json"
    );
}

#[test]
fn test_cli_every_variant_parses() {
    for variant in StoreVariant::ALL {
        let result = parse_args_from(args(&["-t", variant.as_str()])).unwrap();
        assert_eq!(result.variant, variant);
    }
}

#[test]
fn test_cli_invalid_type() {
    let result = parse_args_from(args(&["-t", "graph"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_invalid_limit() {
    let result = parse_args_from(args(&["--limit", "-1"]));
    assert!(result.is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let json = r#"{
        "node": {
            "repo": "/var/lib/store-session",
            "start": true,
            "preload": false,
            "pubsub": true,
            "swarm_addresses": ["/dns4/star.example.org/tcp/443/wss/p2p-webrtc-star/"]
        },
        "session": {
            "query_limit": 10,
            "query_key": "peer7",
            "ready_delay_ms": 50,
            "max_retries": 3,
            "retry_base_delay_ms": 20,
            "retry_max_delay_ms": 200
        },
        "logging": {
            "level": "debug"
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.node.repo.to_str().unwrap(), "/var/lib/store-session");
    assert_eq!(config.node.swarm_addresses.len(), 1);
    assert_eq!(config.session.query_limit, 10);
    assert_eq!(config.session.query_key.as_deref(), Some("peer7"));
    assert_eq!(config.session.ready_delay_ms, 50);
    assert_eq!(config.session.max_retries, 3);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_priority_cli_over_file() {
    let json = r#"{
        "session": {
            "query_limit": 20,
            "query_key": "from-file"
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        limit: Some(3),
        key: Some("from-cli".to_string()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert_eq!(config.session.query_limit, 3);
    assert_eq!(config.session.query_key.as_deref(), Some("from-cli"));
}

#[test]
fn test_config_missing_file() {
    let args = Args {
        config: Some("/nonexistent/store-session.json".into()),
        ..Args::default()
    };

    assert!(Config::load(&args).is_err());
}

#[test]
fn test_config_to_session_options() {
    let json = r#"{
        "session": {
            "query_limit": 7,
            "ready_delay_ms": 0,
            "max_retries": 2
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };

    let options = Config::load(&args).unwrap().to_session_options();

    assert_eq!(options.query.limit, 7);
    assert_eq!(options.ready_delay, Duration::ZERO);
    assert_eq!(options.retry.max_retries, 2);
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let original = Config::default();
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.node, loaded.node);
    assert_eq!(original.session.query_limit, loaded.session.query_limit);
}

#[test]
fn test_config_partial_deserialization() {
    // Only specify some fields, others should use defaults
    let json = r#"{"node": {"start": false}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert!(!config.node.start);
    assert!(config.node.pubsub); // Default
    assert_eq!(config.node.swarm_addresses.len(), 3); // Default
    assert_eq!(config.session.query_limit, 5); // Default
}
