//! In-memory `ConnectionManager` implementation
//!
//! Tracks last-seen timestamps for connected peers and fires a disconnect
//! callback, outside the lock, once a peer has been silent longer than the
//! configured keepalive timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tracing::debug;

use crate::node_id::NodeId;
use crate::room::traits::ConnectionManager;
use crate::time_provider::SharedTimeProvider;

/// Invoked, outside the lock, when a peer's inactivity exceeds the timeout.
pub trait DisconnectCallback: Send + Sync + std::fmt::Debug {
    /// Called once per peer that has timed out.
    fn on_disconnect(&self, id: NodeId);
}

/// Mutex-guarded [`ConnectionManager`] with a background liveness sweep.
#[derive(Debug)]
pub struct InMemoryConnectionManager {
    inner: Mutex<HashMap<NodeId, std::time::Instant>>,
    timeout: Duration,
    time: SharedTimeProvider,
    on_disconnect: Arc<dyn DisconnectCallback>,
}

impl InMemoryConnectionManager {
    /// Build an empty manager with the given inactivity timeout.
    #[must_use]
    pub fn new(timeout: Duration, time: SharedTimeProvider, on_disconnect: Arc<dyn DisconnectCallback>) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            timeout,
            time,
            on_disconnect,
        }
    }

    /// Remove and notify about every peer whose last-seen instant is older
    /// than the configured timeout.
    pub async fn check_timeouts(&self) {
        let now = self.time.instant();
        let mut timed_out = Vec::new();
        {
            let mut guard = self.inner.lock().await;
            guard.retain(|id, last_seen| {
                let alive = now.duration_since(*last_seen) <= self.timeout;
                if !alive {
                    timed_out.push(*id);
                }
                alive
            });
        }
        for id in timed_out {
            debug!(peer = %id, "connection timed out");
            self.on_disconnect.on_disconnect(id);
        }
    }

    /// Spawn the periodic liveness sweep at the given cadence until `stop` fires.
    pub fn spawn_ticker(self: Arc<Self>, tick: Duration, mut stop: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = interval.tick() => self.check_timeouts().await,
                    _ = stop.changed() => break,
                }
            }
        })
    }
}

#[async_trait]
impl ConnectionManager for InMemoryConnectionManager {
    async fn register(&self, id: NodeId) {
        self.inner.lock().await.insert(id, self.time.instant());
    }

    async fn touch(&self, id: NodeId) {
        self.inner.lock().await.insert(id, self.time.instant());
    }

    async fn remove(&self, id: &NodeId) {
        self.inner.lock().await.remove(id);
    }

    async fn is_connected(&self, id: &NodeId) -> bool {
        self.inner.lock().await.contains_key(id)
    }

    async fn connected_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}
