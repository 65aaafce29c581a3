//! Quasar Client
//!
//! The stateful half of the Quasar Nostr client, built on `quasar-core`:
//!
//! - [`SubscriptionLoader`] turns a relay's frame stream into EOSE-delimited
//!   batches of events
//! - [`CacheStore`] and [`CacheLoader`] persist events with strictly
//!   serialized, order-preserving operations
//! - [`ConnectionPool`] fans sends and receives out to many relays
//!
//! Sockets are not handled here. Everything that talks to a relay goes
//! through the [`Transport`] trait; [`LoopbackTransport`] is an in-memory
//! implementation.
//!
//! # Example
//!
//! ```
//! use quasar_client::{LoopbackTransport, SubscriptionLoader, Transport};
//! use quasar_core::Filter;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> quasar_client::Result<()> {
//! let relay = Arc::new(LoopbackTransport::new("wss://relay.example.com"));
//! relay.start().await?;
//!
//! let loader = SubscriptionLoader::new(relay.clone());
//! let mut batches = loader.load("feed", vec![Filter::new().kinds(vec![1])]).await?;
//!
//! relay.push_frame(r#"["EOSE","feed"]"#);
//! let batch = batches.next_batch().await.unwrap()?;
//! assert!(batch.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod loopback;
pub mod pool;
pub mod transport;

pub use backend::{ArchiveBackend, CacheBackend, SqliteBackend};
pub use cache::{CacheLoader, CacheStore, StoreMode};
pub use config::{CacheConfig, CacheKind, ClientConfig, SubscriptionConfig};
pub use error::{Error, Result};
pub use loader::{BatchAccumulator, BatchStream, Fold, SubscriptionLoader, generate_subscription_id};
pub use loopback::LoopbackTransport;
pub use pool::ConnectionPool;
pub use transport::{ConnectionState, ConnectionStateCell, Transport, TransportError};
