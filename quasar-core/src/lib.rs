//! Quasar Core Library
//!
//! Types and pure functions shared by every part of the Quasar Nostr client:
//! the event model, the NIP-01 wire codec, event identity and signing, key
//! encodings, and the storage projection used by the local cache.
//!
//! # Features
//!
//! - Immutable `BaseEvent`/`Event` with a fluent builder
//! - Strict tag-first decoding of relay frames, never-failing client encoding
//! - Canonical serialization, SHA-256 ids and BIP-340 signatures
//! - Hex, 5-bit regrouping and NIP-19 `npub`/`nsec` encodings
//! - Protobuf `LocalEvent` records with gzip length-delimited archive I/O
//! - Interop conversions with nostr-sdk events
//!
//! # Examples
//!
//! ## Signing an event and framing it for a relay
//!
//! ```
//! use quasar_core::{BaseEventBuilder, ClientMessage, Keys, Signer, sign};
//!
//! let keys = Keys::generate();
//! let base = BaseEventBuilder::new()
//!     .author_key(keys.public_key())
//!     .kind(1)
//!     .content("Hello, Nostr!")
//!     .build();
//! let event = sign(base, &keys)?;
//!
//! let frame = ClientMessage::Event(event).encode();
//! assert!(frame.starts_with("[\"EVENT\","));
//! # Ok::<(), quasar_core::Error>(())
//! ```
//!
//! ## Decoding relay frames
//!
//! ```
//! use quasar_core::{RelayError, decode_relay};
//!
//! let err = decode_relay(br#"["CLOSED","sub1","duplicate: already opened"]"#).unwrap_err();
//! assert!(matches!(err, RelayError::Closed { .. }));
//! ```

pub mod conversion;
pub mod error;
pub mod event;
pub mod filter;
pub mod identity;
pub mod keys;
pub mod local;
pub mod message;

pub use error::{Error, RelayError, Result};
pub use event::{BaseEvent, BaseEventBuilder, Event, EventBatch};
pub use filter::{Filter, FilterTag};
pub use identity::{Keys, Signer, SignerError, canonical_serialize, derive_id, sign, verify};
pub use local::{LocalEvent, LocalTag, read_events_delimited, write_events_delimited};
pub use message::{ClientMessage, RelayMessage, decode_relay};
