//! Configuration management for store-session.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::session::{RetryConfig, SessionOptions, StoreQuery, DEFAULT_LIMIT, DEFAULT_READY_DELAY};

/// Public webrtc-star signal servers used when none are configured.
pub const DEFAULT_SWARM_ADDRESSES: [&str; 3] = [
    "/dns4/wrtc-star1.par.dwebops.pub/tcp/443/wss/p2p-webrtc-star/",
    "/dns4/wrtc-star2.sjc.dwebops.pub/tcp/443/wss/p2p-webrtc-star/",
    "/dns4/webrtc-star.discovery.libp2p.io/tcp/443/wss/p2p-webrtc-star/",
];

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network node bootstrap settings.
    pub node: NodeConfig,
    /// Session settings.
    pub session: SessionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Bootstrap settings handed to a [`NodeConnector`](crate::engine::NodeConnector).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Repository path of the node.
    pub repo: PathBuf,
    /// Start the node immediately.
    pub start: bool,
    /// Preload content through public gateways.
    pub preload: bool,
    /// Enable pubsub, required for replication.
    pub pubsub: bool,
    /// Signal-server addresses the swarm listens on.
    pub swarm_addresses: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            repo: PathBuf::from("./store-session/ipfs"),
            start: true,
            preload: false,
            pubsub: true,
            swarm_addresses: DEFAULT_SWARM_ADDRESSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Session configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Entries returned by eventlog and feed queries.
    pub query_limit: usize,
    /// Key looked up in docstore and keyvalue stores.
    pub query_key: Option<String>,
    /// Delay before the ready message, in milliseconds.
    pub ready_delay_ms: u64,
    /// Retries for transient open and load failures.
    pub max_retries: usize,
    /// Base backoff between retries, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Upper bound on the backoff, in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            query_limit: DEFAULT_LIMIT,
            query_key: None,
            ready_delay_ms: DEFAULT_READY_DELAY.as_millis() as u64,
            max_retries: retry.max_retries,
            retry_base_delay_ms: retry.base_delay_ms,
            retry_max_delay_ms: retry.max_delay_ms,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an environment lookup (for testing).
    pub fn apply_env_from<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(limit) = var("STORE_SESSION_QUERY_LIMIT") {
            self.session.query_limit = limit
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STORE_SESSION_QUERY_LIMIT", limit))?;
        }

        if let Some(key) = var("STORE_SESSION_QUERY_KEY") {
            if !key.is_empty() {
                self.session.query_key = Some(key);
            }
        }

        if let Some(delay) = var("STORE_SESSION_READY_DELAY_MS") {
            self.session.ready_delay_ms = delay
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STORE_SESSION_READY_DELAY_MS", delay))?;
        }

        if let Some(level) = var("STORE_SESSION_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(limit) = args.limit {
            self.session.query_limit = limit;
        }

        if let Some(ref key) = args.key {
            self.session.query_key = Some(key.clone());
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to the options applied to every session.
    pub fn to_session_options(&self) -> SessionOptions {
        let mut query = StoreQuery::default().with_limit(self.session.query_limit);
        if let Some(ref key) = self.session.query_key {
            query = query.with_key(key.clone());
        }

        let retry = RetryConfig::default()
            .with_max_retries(self.session.max_retries)
            .with_base_delay_ms(self.session.retry_base_delay_ms)
            .with_max_delay_ms(self.session.retry_max_delay_ms);

        SessionOptions::default()
            .with_query(query)
            .with_ready_delay(Duration::from_millis(self.session.ready_delay_ms))
            .with_retry(retry)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Environment variable with an unparsable value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::StoreSessionError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Io(io) => Self::Io(io),
            other => Self::Config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.node.start);
        assert!(!config.node.preload);
        assert!(config.node.pubsub);
        assert_eq!(config.node.swarm_addresses.len(), 3);
        assert_eq!(config.session.query_limit, 5);
        assert_eq!(config.session.ready_delay_ms, 1000);
        assert_eq!(config.session.max_retries, 0);
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "node": {
                "repo": "/tmp/node",
                "swarm_addresses": []
            },
            "session": {
                "query_limit": 20,
                "query_key": "peer2",
                "max_retries": 3
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.node.repo, PathBuf::from("/tmp/node"));
        assert!(config.node.swarm_addresses.is_empty());
        assert!(config.node.pubsub);
        assert_eq!(config.session.query_limit, 20);
        assert_eq!(config.session.query_key.as_deref(), Some("peer2"));
        assert_eq!(config.session.max_retries, 3);
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "logging": { "level": "debug" } }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.session.query_limit, 5); // Default
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_apply_env() {
        let mut config = Config::default();
        config
            .apply_env_from(env(&[
                ("STORE_SESSION_QUERY_LIMIT", "8"),
                ("STORE_SESSION_QUERY_KEY", "peer9"),
                ("STORE_SESSION_READY_DELAY_MS", "0"),
                ("RUST_LOG", "trace"),
            ]))
            .unwrap();

        assert_eq!(config.session.query_limit, 8);
        assert_eq!(config.session.query_key.as_deref(), Some("peer9"));
        assert_eq!(config.session.ready_delay_ms, 0);
        assert_eq!(config.log_filter(), "trace");
    }

    #[test]
    fn test_log_level_env_wins_over_rust_log() {
        let mut config = Config::default();
        config
            .apply_env_from(env(&[
                ("STORE_SESSION_LOG_LEVEL", "warn"),
                ("RUST_LOG", "trace"),
            ]))
            .unwrap();
        assert_eq!(config.log_filter(), "warn");
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = Config::default();
        let result = config.apply_env_from(env(&[("STORE_SESSION_QUERY_LIMIT", "lots")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_, _))));
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            limit: Some(2),
            key: Some("mykey".to_string()),
            log_level: Some("debug".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.session.query_limit, 2);
        assert_eq!(config.session.query_key.as_deref(), Some("mykey"));
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_to_session_options() {
        let mut config = Config::default();
        config.session.query_limit = 3;
        config.session.query_key = Some("peer1".to_string());
        config.session.ready_delay_ms = 250;
        config.session.max_retries = 2;

        let options = config.to_session_options();
        assert_eq!(options.query.limit, 3);
        assert_eq!(options.query.key.as_deref(), Some("peer1"));
        assert_eq!(options.ready_delay, Duration::from_millis(250));
        assert_eq!(options.retry.max_retries, 2);
    }

    #[test]
    fn test_config_error_conversion() {
        let err: crate::StoreSessionError = ConfigError::InvalidValue("X", "y".into()).into();
        assert!(matches!(err, crate::StoreSessionError::Config(_)));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"swarm_addresses\""));
        assert!(json.contains("\"query_limit\""));
    }
}
