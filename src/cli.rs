//! Command-line interface for store-session.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::engine::StoreVariant;

/// Command-line arguments.
#[derive(Debug, Clone)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Name of the store to create.
    pub name: String,
    /// Store variant to create.
    pub variant: StoreVariant,
    /// Create a store any identity may write to.
    pub public: bool,
    /// Address of an existing store to open instead of creating one.
    pub open: Option<String>,
    /// Query key for document and key-value stores.
    pub key: Option<String>,
    /// Number of entries returned by log queries.
    pub limit: Option<usize>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: None,
            log_level: None,
            name: "demo".to_string(),
            variant: StoreVariant::EventLog,
            public: false,
            open: None,
            key: None,
            limit: None,
            version: false,
            help: false,
        }
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Short('n') | Long("name") => {
                let value: String = parser.value()?.parse()?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidValue("name", value));
                }
                result.name = value;
            }
            Short('t') | Long("type") => {
                let value: String = parser.value()?.parse()?;
                result.variant = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("type", value))?;
            }
            Long("public") => {
                result.public = true;
            }
            Short('o') | Long("open") => {
                result.open = Some(parser.value()?.parse()?);
            }
            Short('k') | Long("key") => {
                result.key = Some(parser.value()?.parse()?);
            }
            Long("limit") => {
                let value: String = parser.value()?.parse()?;
                let limit = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("limit", value))?;
                result.limit = Some(limit);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"store-session {version}
Session controller for replicated peer-to-peer log stores

USAGE:
    store-session [OPTIONS]

OPTIONS:
    -n, --name <NAME>       Name of the store to create [default: demo]
    -t, --type <TYPE>       Store type (eventlog, feed, docstore, keyvalue, counter)
                            [default: eventlog]
        --public            Allow any identity to write to the new store
    -o, --open <ADDRESS>    Open an existing store instead of creating one
    -k, --key <KEY>         Query key for docstore and keyvalue stores
        --limit <N>         Entries returned by eventlog and feed queries [default: 5]
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    STORE_SESSION_LOG_LEVEL       Log level (overrides config)
    STORE_SESSION_QUERY_LIMIT     Query limit (overrides config)
    STORE_SESSION_QUERY_KEY       Query key (overrides config)
    STORE_SESSION_READY_DELAY_MS  Delay before the ready message (overrides config)
    RUST_LOG                      Alternative log level setting

EXAMPLES:
    # Create a private event log and print its status updates
    store-session

    # Create a public key-value store
    store-session -n settings -t keyvalue --public -k mykey

    # Start with config file
    store-session -c /etc/store-session/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("store-session {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("store-session")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert_eq!(result.name, "demo");
        assert_eq!(result.variant, StoreVariant::EventLog);
        assert!(!result.public);
        assert!(result.open.is_none());
    }

    #[test]
    fn test_name_and_type() {
        let result = parse_args_from(args(&["-n", "settings", "-t", "keyvalue"])).unwrap();
        assert_eq!(result.name, "settings");
        assert_eq!(result.variant, StoreVariant::KeyValue);
    }

    #[test]
    fn test_long_options() {
        let result =
            parse_args_from(args(&["--name", "docs", "--type", "docstore", "--public"])).unwrap();
        assert_eq!(result.name, "docs");
        assert_eq!(result.variant, StoreVariant::DocStore);
        assert!(result.public);
    }

    #[test]
    fn test_type_alias() {
        let result = parse_args_from(args(&["-t", "kv"])).unwrap();
        assert_eq!(result.variant, StoreVariant::KeyValue);
    }

    #[test]
    fn test_unknown_type() {
        let result = parse_args_from(args(&["-t", "graph"]));
        assert!(matches!(result, Err(ArgsError::InvalidValue("type", _))));
    }

    #[test]
    fn test_empty_name() {
        let result = parse_args_from(args(&["-n", " "]));
        assert!(result.is_err());
    }

    #[test]
    fn test_open_address() {
        let result = parse_args_from(args(&["-o", "/orbitdb/abc123/events"])).unwrap();
        assert_eq!(result.open.as_deref(), Some("/orbitdb/abc123/events"));
    }

    #[test]
    fn test_query_options() {
        let result = parse_args_from(args(&["-k", "peer2", "--limit", "10"])).unwrap();
        assert_eq!(result.key, Some("peer2".to_string()));
        assert_eq!(result.limit, Some(10));
    }

    #[test]
    fn test_invalid_limit() {
        let result = parse_args_from(args(&["--limit", "many"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file() {
        let result = parse_args_from(args(&["-c", "/etc/config.json"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/config.json")));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);

        let result = parse_args_from(args(&["--version"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_log_level() {
        let result = parse_args_from(args(&["-l", "debug"])).unwrap();
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_unexpected_positional() {
        let result = parse_args_from(args(&["extra"]));
        assert!(matches!(result, Err(ArgsError::UnexpectedArgument(_))));
    }
}
