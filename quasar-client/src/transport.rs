//! Transport capability consumed by the loader and the pool
//!
//! The client never talks to sockets directly. Anything that can start,
//! send text frames, receive frames and disconnect can carry the protocol;
//! TLS, reconnection and timeouts are the implementation's business.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

/// Lifecycle of one transport: `Disconnected -> Connecting -> Ready -> Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Initial state
    Disconnected,
    /// Start requested, handshake in flight
    Connecting,
    /// Frames may be sent and received
    Ready,
    /// Terminal; no further sends or receives
    Cancelled,
}

impl ConnectionState {
    /// Whether `next` is reachable from `self` in one step
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Ready)
                | (Disconnected, Cancelled)
                | (Connecting, Cancelled)
                | (Ready, Cancelled)
        )
    }
}

/// Transport failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("transport cancelled")]
    Cancelled,

    #[error("invalid state transition {from:?} -> {to:?}")]
    InvalidState {
        from: ConnectionState,
        to: ConnectionState,
    },
}

/// A message-oriented connection to one relay
#[async_trait]
pub trait Transport: Send + Sync {
    /// Relay address, used to label results in the pool
    fn url(&self) -> &str;

    async fn start(&self) -> Result<(), TransportError>;

    async fn disconnect(&self);

    async fn send(&self, text: String) -> Result<(), TransportError>;

    /// Wait for the next inbound frame
    async fn receive(&self) -> Result<Vec<u8>, TransportError>;

    fn state(&self) -> ConnectionState;

    /// Notifications for every state change
    fn state_changes(&self) -> watch::Receiver<ConnectionState>;
}

/// Holds a [`ConnectionState`], enforces its transitions and publishes changes
#[derive(Debug)]
pub struct ConnectionStateCell {
    tx: watch::Sender<ConnectionState>,
}

impl ConnectionStateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Move to `next`.
    ///
    /// Re-entering the current state is a no-op; any other transition the
    /// state machine does not allow is rejected and leaves the state unchanged.
    pub fn transition(&self, next: ConnectionState) -> Result<(), TransportError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|state| {
            if *state == next {
                false
            } else if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                result = Err(TransportError::InvalidState {
                    from: *state,
                    to: next,
                });
                false
            }
        });
        result
    }
}

impl Default for ConnectionStateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once `states` reports [`ConnectionState::Cancelled`] or its sender is gone
pub async fn cancelled(mut states: watch::Receiver<ConnectionState>) {
    loop {
        if *states.borrow_and_update() == ConnectionState::Cancelled {
            return;
        }
        if states.changed().await.is_err() {
            return;
        }
    }
}
