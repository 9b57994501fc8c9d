//! In-memory `AckTracker` implementation
//!
//! Holds pending acks in a single mutex-guarded map; the periodic timeout
//! sweep and all resolution paths fire callbacks outside the lock, mirroring
//! how the delivery engine elsewhere in this codebase never calls back into
//! user code while holding its queue lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tracing::trace;

use crate::room::domain_types::AckTimeoutSecs;
use crate::room::traits::{AckCallbacks, AckTracker};
use crate::time_provider::SharedTimeProvider;

struct Pending {
    deadline: std::time::Instant,
    attempts_remaining: u32,
    callbacks: Arc<dyn AckCallbacks>,
}

/// Mutex-guarded [`AckTracker`] with a background timeout sweep.
#[derive(Debug)]
pub struct InMemoryAckTracker {
    inner: Mutex<HashMap<u32, Pending>>,
    timeout: AckTimeoutSecs,
    time: SharedTimeProvider,
}

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("attempts_remaining", &self.attempts_remaining)
            .finish()
    }
}

impl InMemoryAckTracker {
    /// Build an empty tracker with the given per-entry timeout.
    #[must_use]
    pub fn new(timeout: AckTimeoutSecs, time: SharedTimeProvider) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            timeout,
            time,
        }
    }

    /// Sweep expired entries, resending or firing `on_timeout` as appropriate.
    /// Runs outside the lock for all callback invocations.
    pub async fn check_timeouts(&self) {
        let now = self.time.instant();
        let mut expired = Vec::new();
        let mut resends = Vec::new();

        {
            let mut guard = self.inner.lock().await;
            let keys: Vec<u32> = guard.keys().copied().collect();
            for key in keys {
                let Some(entry) = guard.get_mut(&key) else {
                    continue;
                };
                if entry.deadline > now {
                    continue;
                }
                if entry.attempts_remaining > 0 {
                    entry.attempts_remaining -= 1;
                    entry.deadline = now + Duration::from_secs(self.timeout.into_inner());
                    resends.push((key, Arc::clone(&entry.callbacks), entry.attempts_remaining));
                } else if let Some(removed) = guard.remove(&key) {
                    expired.push(removed.callbacks);
                }
            }
        }

        for (key, cb, attempts_remaining) in resends {
            trace!(hash = key, attempts_remaining, "resending unacknowledged payload");
            cb.resend(attempts_remaining + 1);
        }
        for cb in expired {
            cb.on_timeout();
        }
    }

    /// Spawn the periodic sweep at the given cadence until `stop` fires.
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
impl AckTracker for InMemoryAckTracker {
    async fn track(&self, hash: u32, attempts_remaining: u32, callbacks: Arc<dyn AckCallbacks>) {
        let deadline = self.time.instant() + Duration::from_secs(self.timeout.into_inner());
        self.inner.lock().await.insert(
            hash,
            Pending {
                deadline,
                attempts_remaining,
                callbacks,
            },
        );
    }

    async fn resolve(&self, hash: u32) -> bool {
        let removed = self.inner.lock().await.remove(&hash);
        match removed {
            Some(entry) => {
                entry.callbacks.on_ack();
                true
            }
            None => false,
        }
    }

    async fn cancel(&self, hash: u32) {
        self.inner.lock().await.remove(&hash);
    }

    async fn pending_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_provider::MockTimeProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Counters {
        acks: AtomicUsize,
        timeouts: AtomicUsize,
        resends: AtomicUsize,
    }

    impl AckCallbacks for Counters {
        fn on_ack(&self) {
            self.acks.fetch_add(1, Ordering::SeqCst);
        }
        fn on_timeout(&self) {
            self.timeouts.fetch_add(1, Ordering::SeqCst);
        }
        fn resend(&self, _attempt: u32) {
            self.resends.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn resolve_fires_on_ack_once() {
        let tracker = InMemoryAckTracker::new(AckTimeoutSecs::try_new(12).unwrap(), Arc::new(MockTimeProvider::new()));
        let counters = Arc::new(Counters {
            acks: AtomicUsize::new(0),
            timeouts: AtomicUsize::new(0),
            resends: AtomicUsize::new(0),
        });
        tracker.track(1, 3, counters.clone()).await;
        assert!(tracker.resolve(1).await);
        assert!(!tracker.resolve(1).await);
        assert_eq!(counters.acks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retrack_replaces_without_firing_old_callback() {
        let tracker = InMemoryAckTracker::new(AckTimeoutSecs::try_new(12).unwrap(), Arc::new(MockTimeProvider::new()));
        let old = Arc::new(Counters {
            acks: AtomicUsize::new(0),
            timeouts: AtomicUsize::new(0),
            resends: AtomicUsize::new(0),
        });
        let new = Arc::new(Counters {
            acks: AtomicUsize::new(0),
            timeouts: AtomicUsize::new(0),
            resends: AtomicUsize::new(0),
        });
        tracker.track(1, 3, old.clone()).await;
        tracker.track(1, 3, new.clone()).await;
        tracker.resolve(1).await;
        assert_eq!(old.acks.load(Ordering::SeqCst), 0);
        assert_eq!(new.acks.load(Ordering::SeqCst), 1);
    }
}
