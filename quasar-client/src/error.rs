//! Error types for quasar-client

use crate::transport::TransportError;
use thiserror::Error;

/// Result type alias for quasar-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the client
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure; retrying the request may succeed
    #[error("Connectivity failure: {0}")]
    Connectivity(#[from] TransportError),

    /// Malformed relay frame
    #[error("Invalid data from relay: {0}")]
    InvalidData(String),

    /// Relay closed the subscription
    #[error("Subscription {subscription_id} closed by relay: {reason}")]
    Closed {
        subscription_id: String,
        reason: String,
    },

    /// Relay notice ending the subscription
    #[error("Relay notice: {0}")]
    Notice(String),

    /// Relay refused a published event
    #[error("Relay rejected event {event_id}: {reason}")]
    RejectedWrite { event_id: String, reason: String },

    /// Core library error (signing, conversion, ...)
    #[error(transparent)]
    Core(#[from] quasar_core::Error),

    /// Cache backend failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// SQLite error from the cache backend
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache worker is gone
    #[error("Cache store is closed")]
    StoreClosed,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
