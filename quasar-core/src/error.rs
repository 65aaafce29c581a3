//! Error types for quasar-core

use thiserror::Error;

/// Result type alias for quasar-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// JSON parsing error
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Protobuf encoding error
    #[error("Protobuf encoding failed: {0}")]
    ProtobufEncode(#[from] prost::EncodeError),

    /// Protobuf decoding error
    #[error("Protobuf decoding failed: {0}")]
    ProtobufDecode(#[from] prost::DecodeError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structurally invalid wire frame or value
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Invalid hex encoding
    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    /// Trailing bits of a 5-bit group stream do not pack into whole bytes
    #[error("Invalid padding in 5-bit group stream")]
    InvalidPadding,

    /// Event signing failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Event ID does not match the canonical hash
    #[error("Event ID mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: String, actual: String },

    /// Signature verification failed
    #[error("Signature verification failed: {0}")]
    InvalidSignature(String),

    /// Bech32 encoding or decoding error
    #[error("Bech32 error: {0}")]
    Bech32(String),

    /// Conversion error
    #[error("Conversion failed: {0}")]
    Conversion(String),
}

/// Failure signals produced when a relay frame is read as an event.
///
/// Only `EVENT` frames carry a payload; every other frame the relay sends is
/// surfaced as one of these variants with the relay's text kept verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Structurally invalid frame
    #[error("invalid relay frame: {0}")]
    InvalidData(String),

    /// Relay closed the subscription
    #[error("subscription {subscription_id} closed: {reason}")]
    Closed {
        subscription_id: String,
        reason: String,
    },

    /// End of stored events for a subscription
    #[error("end of stored events for {subscription_id}")]
    Eose { subscription_id: String },

    /// Human-readable relay notice
    #[error("relay notice: {0}")]
    Notice(String),

    /// Command result for a published event
    #[error("OK for {event_id} (accepted: {accepted}): {reason}")]
    Ok {
        event_id: String,
        accepted: bool,
        reason: String,
    },
}
