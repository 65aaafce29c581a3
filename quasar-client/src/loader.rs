//! Subscription loader
//!
//! Turns the frame stream of one transport into EOSE-delimited batches of
//! events. EOSE marks the end of a batch, not the end of the subscription:
//! the loader keeps listening for live events until the relay closes the
//! subscription, the transport fails, or the loader is cancelled.

use crate::config::SubscriptionConfig;
use crate::error::{Error, Result};
use crate::transport::Transport;
use futures::Stream;
use quasar_core::{ClientMessage, Event, Filter, RelayMessage};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of folding one relay message into a batch
#[derive(Debug)]
pub enum Fold {
    /// Keep listening
    Continue,
    /// A complete batch; keep listening
    Batch(Vec<Event>),
    /// Terminal failure; stop listening
    Fail(Error),
}

/// Pure accumulator for one subscription's messages
#[derive(Debug)]
pub struct BatchAccumulator {
    subscription_id: String,
    pending: Vec<Event>,
}

impl BatchAccumulator {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            pending: Vec::new(),
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Events received since the last batch boundary
    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    pub fn fold(&mut self, message: RelayMessage) -> Fold {
        if let Some(id) = message.subscription_id() {
            if id != self.subscription_id {
                return Fold::Continue;
            }
        }

        match message {
            RelayMessage::Event { event, .. } => {
                self.pending.push(event);
                Fold::Continue
            }
            RelayMessage::Eose { .. } => Fold::Batch(std::mem::take(&mut self.pending)),
            RelayMessage::Closed {
                subscription_id,
                reason,
            } => Fold::Fail(Error::Closed {
                subscription_id,
                reason,
            }),
            RelayMessage::Notice { reason } => Fold::Fail(Error::Notice(reason)),
            RelayMessage::Ok { accepted: true, .. } => Fold::Continue,
            RelayMessage::Ok {
                event_id, reason, ..
            } => Fold::Fail(Error::RejectedWrite { event_id, reason }),
        }
    }
}

/// Batches produced by [`SubscriptionLoader::load`]
///
/// Yields `Ok(batch)` once per EOSE. A terminal failure is yielded once as
/// `Err`, after which the stream ends. Dropping the stream stops the loader's
/// receive loop.
#[derive(Debug)]
pub struct BatchStream {
    rx: mpsc::UnboundedReceiver<Result<Vec<Event>>>,
}

impl BatchStream {
    /// Wait for the next batch; `None` once the subscription has ended
    pub async fn next_batch(&mut self) -> Option<Result<Vec<Event>>> {
        self.rx.recv().await
    }
}

impl Stream for BatchStream {
    type Item = Result<Vec<Event>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Drives one subscription at a time over a transport
pub struct SubscriptionLoader {
    transport: Arc<dyn Transport>,
    generation: watch::Sender<u64>,
    active: Mutex<Option<String>>,
    id_prefix: String,
}

impl SubscriptionLoader {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::from_config(transport, &SubscriptionConfig::default())
    }

    /// A loader whose generated subscription ids use the configured prefix
    pub fn from_config(transport: Arc<dyn Transport>, config: &SubscriptionConfig) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            transport,
            generation,
            active: Mutex::new(None),
            id_prefix: config.id_prefix.clone(),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Subscription currently being loaded, if any
    pub fn active_subscription(&self) -> Option<String> {
        lock(&self.active).clone()
    }

    /// Open `subscription_id` with `filters` and start listening.
    ///
    /// Any previous load of this loader is cancelled first.
    pub async fn load(
        &self,
        subscription_id: impl Into<String>,
        filters: Vec<Filter>,
    ) -> Result<BatchStream> {
        let subscription_id = subscription_id.into();
        let generation = self.bump_generation();
        // The previous load is gone even if this one fails to start
        *lock(&self.active) = None;

        let frame = ClientMessage::Request {
            subscription_id: subscription_id.clone(),
            filters,
        }
        .encode();
        if frame.is_empty() {
            return Err(Error::InvalidData(format!(
                "request for {} could not be encoded",
                subscription_id
            )));
        }
        self.transport.send(frame).await?;

        *lock(&self.active) = Some(subscription_id.clone());
        info!(
            "Loading subscription {} from {}",
            subscription_id,
            self.transport.url()
        );

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(receive_loop(
            Arc::clone(&self.transport),
            self.generation.subscribe(),
            generation,
            BatchAccumulator::new(subscription_id),
            tx,
        ));

        Ok(BatchStream { rx })
    }

    /// Like [`load`](Self::load), under a freshly generated subscription id
    pub async fn subscribe(&self, filters: Vec<Filter>) -> Result<(String, BatchStream)> {
        let subscription_id = generate_subscription_id(&self.id_prefix);
        let batches = self.load(subscription_id.clone(), filters).await?;
        Ok((subscription_id, batches))
    }

    /// Stop delivering batches for the current load
    pub fn cancel(&self) {
        self.bump_generation();
        if let Some(id) = lock(&self.active).take() {
            debug!("Cancelled subscription {}", id);
        }
    }

    /// Ask the relay to close the current subscription, then cancel it
    pub async fn close(&self) -> Result<()> {
        let active = lock(&self.active).clone();
        self.cancel();

        if let Some(subscription_id) = active {
            let frame = ClientMessage::Close(subscription_id).encode();
            if !frame.is_empty() {
                self.transport.send(frame).await?;
            }
        }
        Ok(())
    }

    fn bump_generation(&self) -> u64 {
        let mut next = 0;
        self.generation.send_modify(|generation| {
            *generation += 1;
            next = *generation;
        });
        next
    }
}

impl Drop for SubscriptionLoader {
    fn drop(&mut self) {
        self.bump_generation();
    }
}

async fn receive_loop(
    transport: Arc<dyn Transport>,
    mut generations: watch::Receiver<u64>,
    generation: u64,
    mut accumulator: BatchAccumulator,
    tx: mpsc::UnboundedSender<Result<Vec<Event>>>,
) {
    let subscription_id = accumulator.subscription_id().to_string();

    loop {
        // A superseded loop must never take a frame meant for its successor
        let frame = tokio::select! {
            biased;
            _ = generations.wait_for(|current| *current != generation) => {
                debug!("Receive loop for {} superseded", subscription_id);
                return;
            }
            _ = tx.closed() => {
                debug!("Batch stream for {} dropped", subscription_id);
                return;
            }
            frame = transport.receive() => frame,
        };

        // Loader may have moved on while the frame was in flight
        if *generations.borrow() != generation {
            return;
        }

        let outcome = match frame {
            Err(e) => Fold::Fail(Error::Connectivity(e)),
            Ok(bytes) => match RelayMessage::decode(&bytes) {
                Ok(message) => accumulator.fold(message),
                Err(e) => Fold::Fail(Error::InvalidData(e.to_string())),
            },
        };

        match outcome {
            Fold::Continue => {}
            Fold::Batch(events) => {
                debug!(
                    "Delivering batch of {} events for {}",
                    events.len(),
                    subscription_id
                );
                if tx.send(Ok(events)).is_err() {
                    return;
                }
            }
            Fold::Fail(error) => {
                warn!("Subscription {} ended: {}", subscription_id, error);
                let _ = tx.send(Err(error));
                return;
            }
        }
    }
}

/// A fresh subscription id of the form `<prefix>-<32 hex digits>`
pub fn generate_subscription_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
