//! Round-robin post push loop
//!
//! Runs on a fixed tick, pushes at most one eligible post to one client per
//! tick, and gates the client's sync cursor on the resulting ack rather than
//! on the send itself, so a lost push is retried instead of silently
//! advancing state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::trace;

use crate::node_id::NodeId;
use crate::room::domain_types::{MaxRetries, PostSyncDelaySecs};
use crate::room::traits::{AckCallbacks, AckTracker, ClientStore, ContactStore, Crypto, PacketRouter, PostStore};

struct PushAckCallbacks {
    client_store: Arc<dyn ClientStore>,
    router: Arc<dyn PacketRouter>,
    client_id: NodeId,
    post_timestamp: u32,
    dest: NodeId,
    path: Vec<u8>,
    payload: Vec<u8>,
    has_path: bool,
}

impl std::fmt::Debug for PushAckCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushAckCallbacks")
            .field("client_id", &self.client_id)
            .field("post_timestamp", &self.post_timestamp)
            .finish()
    }
}

impl AckCallbacks for PushAckCallbacks {
    fn on_ack(&self) {
        let client_store = Arc::clone(&self.client_store);
        let client_id = self.client_id;
        let post_timestamp = self.post_timestamp;
        tokio::spawn(async move {
            if let Some(mut client) = client_store.get(&client_id).await {
                client.push_post_timestamp = post_timestamp;
                client.push_failures = 0;
                let _ = client_store.update(client).await;
            }
        });
    }

    fn on_timeout(&self) {
        let client_store = Arc::clone(&self.client_store);
        let client_id = self.client_id;
        tokio::spawn(async move {
            if let Some(mut client) = client_store.get(&client_id).await {
                client.push_failures = client.push_failures.saturating_add(1);
                let _ = client_store.update(client).await;
            }
        });
    }

    fn resend(&self, attempt: u32) {
        let router = Arc::clone(&self.router);
        let dest = self.dest;
        let path = self.path.clone();
        let payload = self.payload.clone();
        let has_path = self.has_path;
        trace!(client = %self.client_id, attempt, "resending post push");
        tokio::spawn(async move {
            if has_path {
                router.send_direct(dest, path, payload).await;
            } else {
                router.send_flood(dest, payload).await;
            }
        });
    }
}

/// Pushes at most one eligible post to one client per tick, in round-robin order.
#[derive(Debug)]
pub struct SyncLoop {
    client_store: Arc<dyn ClientStore>,
    contact_store: Arc<dyn ContactStore>,
    post_store: Arc<dyn PostStore>,
    ack_tracker: Arc<dyn AckTracker>,
    crypto: Arc<dyn Crypto>,
    router: Arc<dyn PacketRouter>,
    post_sync_delay: PostSyncDelaySecs,
    max_retries: MaxRetries,
    max_push_failures: crate::room::domain_types::MaxPushFailures,
    cursor: AtomicU64,
}

impl SyncLoop {
    /// Build a sync loop over the given stores and collaborators.
    #[must_use]
    pub fn new(
        client_store: Arc<dyn ClientStore>,
        contact_store: Arc<dyn ContactStore>,
        post_store: Arc<dyn PostStore>,
        ack_tracker: Arc<dyn AckTracker>,
        crypto: Arc<dyn Crypto>,
        router: Arc<dyn PacketRouter>,
        post_sync_delay: PostSyncDelaySecs,
        max_retries: MaxRetries,
        max_push_failures: crate::room::domain_types::MaxPushFailures,
    ) -> Self {
        Self {
            client_store,
            contact_store,
            post_store,
            ack_tracker,
            crypto,
            router,
            post_sync_delay,
            max_retries,
            max_push_failures,
            cursor: AtomicU64::new(0),
        }
    }

    /// Run one round-robin scan, pushing at most one post to at most one client.
    pub async fn tick(&self, now: u32) {
        let mut clients = self.client_store.snapshot().await;
        if clients.is_empty() {
            return;
        }
        clients.sort_by_key(|c| c.id);

        let cursor = self.cursor.load(Ordering::Acquire) as usize % clients.len();

        for offset in 0..clients.len() {
            let idx = (cursor + offset) % clients.len();
            let client = &clients[idx];

            if client.is_push_exhausted(self.max_push_failures) {
                continue;
            }

            if client.last_activity == 0 {
                continue;
            }

            let floor = client.sync_since.max(client.push_post_timestamp);
            let candidates = self.post_store.get_since(floor).await;
            let Some(oldest) = candidates
                .into_iter()
                .filter(|p| p.sender_id != client.id)
                .min_by_key(|p| p.timestamp)
            else {
                continue;
            };

            if now.saturating_sub(oldest.timestamp) < self.post_sync_delay.into_inner().try_into().unwrap_or(u32::MAX) {
                continue;
            }

            let Ok(secret) = self.contact_store.shared_secret(&client.id).await else {
                continue;
            };
            let (mac, ciphertext) = self.crypto.aes128_seal(&secret, &oldest.content);
            let mut payload = Vec::with_capacity(2 + ciphertext.len());
            payload.extend_from_slice(&mac.to_be_bytes());
            payload.extend_from_slice(&ciphertext);

            let has_path = client.out_path_len >= 0;
            if has_path {
                self.router
                    .send_direct(client.id, client.out_path.clone(), payload.clone())
                    .await;
            } else {
                self.router.send_flood(client.id, payload.clone()).await;
            }

            let ack_hash = self.crypto.ack_hash(&oldest.content, client.id.as_bytes());
            let callbacks = Arc::new(PushAckCallbacks {
                client_store: Arc::clone(&self.client_store),
                router: Arc::clone(&self.router),
                client_id: client.id,
                post_timestamp: oldest.timestamp,
                dest: client.id,
                path: client.out_path.clone(),
                payload,
                has_path,
            });
            self.ack_tracker
                .track(ack_hash, self.max_retries.into_inner() as u32, callbacks)
                .await;

            self.cursor.store((idx as u64) + 1, Ordering::Release);
            return;
        }

        self.cursor.store((cursor as u64) + 1, Ordering::Release);
    }

    /// Spawn the periodic sync tick at the given cadence, reading `now` from
    /// `clock` each time, until `stop` fires.
    pub fn spawn_ticker(
        self: Arc<Self>,
        tick_interval: Duration,
        clock: Arc<crate::clock::UniqueClock>,
        mut stop: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => self.tick(clock.now()).await,
                    _ = stop.changed() => break,
                }
            }
        })
    }
}
