//! Error types for store-session.

use thiserror::Error;

use crate::session::SessionState;

/// Errors surfaced by a log engine or network node implementation.
///
/// These are passed through [`StoreSessionError::Engine`] unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No store manifest exists at the given address.
    #[error("store not found at address: {0}")]
    AddressNotFound(String),

    /// The identity is not in the store's write set.
    #[error("identity {identity} is not allowed to write to {address}")]
    AccessDenied { identity: String, address: String },

    /// The store handle has already been closed.
    #[error("store is closed: {0}")]
    StoreClosed(String),

    /// A transient network or peer failure.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("engine error: {0}")]
    Backend(String),
}

impl EngineError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Unavailable(_))
    }
}

/// Main error type for store-session operations.
#[derive(Error, Debug)]
pub enum StoreSessionError {
    /// No network node or log engine is available.
    #[error("not connected to a network node and log engine")]
    NotConnected,

    /// Operation requires a store handle but none is held.
    #[error("no store is open in this session")]
    NoStore,

    /// Store type outside the supported variants.
    #[error("unknown store variant: {0}")]
    UnknownVariant(String),

    /// The session has been reset and cannot be reused.
    #[error("session is closed")]
    SessionClosed,

    /// Store names must be non-empty.
    #[error("store name must not be empty")]
    InvalidStoreName,

    /// A store address could not be parsed.
    #[error("invalid store address: {0}")]
    InvalidAddress(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition { from: SessionState, to: SessionState },

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// Error reported by the log engine or network node.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Configuration could not be loaded or applied.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for store-session operations.
pub type Result<T> = std::result::Result<T, StoreSessionError>;
