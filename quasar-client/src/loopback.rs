//! In-memory transport
//!
//! Inbound frames are queued by the caller, outbound frames are recorded.
//! Used to drive the loader and the pool without a network, and to embed a
//! scripted relay in tests.

use crate::transport::{ConnectionState, ConnectionStateCell, Transport, TransportError, cancelled};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::debug;

type Inbound = Result<Vec<u8>, TransportError>;

pub struct LoopbackTransport {
    url: String,
    state: ConnectionStateCell,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
    sent: Mutex<Vec<String>>,
    start_failure: Mutex<Option<String>>,
    send_failure: Mutex<Option<String>>,
}

impl LoopbackTransport {
    pub fn new(url: impl Into<String>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            url: url.into(),
            state: ConnectionStateCell::new(),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            sent: Mutex::new(Vec::new()),
            start_failure: Mutex::new(None),
            send_failure: Mutex::new(None),
        }
    }

    /// Queue an inbound frame
    pub fn push_frame(&self, frame: impl Into<Vec<u8>>) {
        // The receiver lives as long as self, so the send cannot fail
        let _ = self.inbound_tx.send(Ok(frame.into()));
    }

    /// Queue an inbound transport failure
    pub fn push_error(&self, error: TransportError) {
        let _ = self.inbound_tx.send(Err(error));
    }

    /// Frames sent so far, oldest first
    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    /// Make the next `start` fail with `reason`
    pub fn fail_start(&self, reason: impl Into<String>) {
        *lock(&self.start_failure) = Some(reason.into());
    }

    /// Make every subsequent `send` fail with `reason`
    pub fn fail_sends(&self, reason: impl Into<String>) {
        *lock(&self.send_failure) = Some(reason.into());
    }

    fn ensure_ready(&self) -> Result<(), TransportError> {
        match self.state.get() {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Cancelled => Err(TransportError::Cancelled),
            other => Err(TransportError::Receive(format!(
                "{} is not ready ({:?})",
                self.url, other
            ))),
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn url(&self) -> &str {
        &self.url
    }

    async fn start(&self) -> Result<(), TransportError> {
        self.state.transition(ConnectionState::Connecting)?;

        if let Some(reason) = lock(&self.start_failure).take() {
            self.state.transition(ConnectionState::Cancelled)?;
            return Err(TransportError::Connection(reason));
        }

        self.state.transition(ConnectionState::Ready)?;
        debug!("Loopback transport {} ready", self.url);
        Ok(())
    }

    async fn disconnect(&self) {
        // Already cancelled is the only failure and that is the goal anyway
        let _ = self.state.transition(ConnectionState::Cancelled);
    }

    async fn send(&self, text: String) -> Result<(), TransportError> {
        self.ensure_ready().map_err(|e| match e {
            TransportError::Receive(msg) => TransportError::Send(msg),
            other => other,
        })?;

        if let Some(reason) = lock(&self.send_failure).clone() {
            return Err(TransportError::Send(reason));
        }

        lock(&self.sent).push(text);
        Ok(())
    }

    async fn receive(&self) -> Result<Vec<u8>, TransportError> {
        self.ensure_ready()?;

        let states = self.state.subscribe();
        let mut inbound = self.inbound_rx.lock().await;
        tokio::select! {
            frame = inbound.recv() => frame.unwrap_or(Err(TransportError::Cancelled)),
            _ = cancelled(states) => Err(TransportError::Cancelled),
        }
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
