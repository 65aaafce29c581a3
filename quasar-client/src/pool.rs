//! Connection pool
//!
//! Fans every operation out to all member transports and reports each
//! member's outcome separately through caller-supplied handlers. Nothing is
//! merged or deduplicated: two relays delivering the same frame produce two
//! receive callbacks.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::{ConnectionState, Transport};
use futures::future::join_all;
use quasar_core::ClientMessage;
use std::sync::Arc;
use tracing::{debug, info, warn};

type ErrorHandler = Arc<dyn Fn(&str, Error) + Send + Sync>;
type ReceiveHandler = Arc<dyn Fn(&str, Result<Vec<u8>>) + Send + Sync>;

/// A set of relay transports addressed as one
pub struct ConnectionPool {
    members: Vec<Arc<dyn Transport>>,
    on_error: ErrorHandler,
    on_receive: ReceiveHandler,
}

impl ConnectionPool {
    pub fn new(members: Vec<Arc<dyn Transport>>) -> Self {
        Self {
            members,
            on_error: Arc::new(|url, error| warn!("Relay {} failed: {}", url, error)),
            on_receive: Arc::new(|url, _| debug!("Unhandled frame from {}", url)),
        }
    }

    /// One member per configured relay, built by `factory`
    pub fn from_config<F>(config: &ClientConfig, factory: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn Transport>,
    {
        Self::new(config.relays.iter().map(|url| factory(url)).collect())
    }

    /// Called once per failed member operation, tagged with the member url
    pub fn on_error<F>(&mut self, handler: F)
    where
        F: Fn(&str, Error) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(handler);
    }

    /// Called once per member receive, success or failure
    pub fn on_receive<F>(&mut self, handler: F)
    where
        F: Fn(&str, Result<Vec<u8>>) + Send + Sync + 'static,
    {
        self.on_receive = Arc::new(handler);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn urls(&self) -> Vec<String> {
        self.members.iter().map(|m| m.url().to_string()).collect()
    }

    pub fn states(&self) -> Vec<(String, ConnectionState)> {
        self.members
            .iter()
            .map(|m| (m.url().to_string(), m.state()))
            .collect()
    }

    /// Start members one after another, stopping at the first failure
    pub async fn start(&self) -> Result<()> {
        for member in &self.members {
            member.start().await?;
            info!("Connected to {}", member.url());
        }
        Ok(())
    }

    pub async fn disconnect(&self) {
        join_all(self.members.iter().map(|member| member.disconnect())).await;
        info!("Disconnected {} relays", self.members.len());
    }

    /// Send `message` to every member concurrently
    pub async fn send(&self, message: &ClientMessage) {
        let frame = message.encode();
        if frame.is_empty() {
            warn!("Nothing to send: message could not be encoded");
            return;
        }

        let sends = self.members.iter().map(|member| {
            let frame = frame.clone();
            async move { (member.url(), member.send(frame).await) }
        });

        for (url, result) in join_all(sends).await {
            if let Err(e) = result {
                (self.on_error)(url, Error::Connectivity(e));
            }
        }
    }

    /// Receive one frame from every member concurrently
    pub async fn receive(&self) {
        let receives = self
            .members
            .iter()
            .map(|member| async move { (member.url(), member.receive().await) });

        for (url, result) in join_all(receives).await {
            (self.on_receive)(url, result.map_err(Error::Connectivity));
        }
    }
}
