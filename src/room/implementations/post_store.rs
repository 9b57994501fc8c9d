//! In-memory `PostStore` implementation
//!
//! A bounded ring buffer, single writer lock, ordered by insertion since
//! timestamps are strictly monotonic by construction ([`UniqueClock`]).

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::clock::UniqueClock;
use crate::node_id::NodeId;
use crate::room::domain_types::{Post, PostCapacity};
use crate::room::traits::PostStore;

/// Ring-buffered [`PostStore`] backed by an [`UniqueClock`] for timestamp assignment.
#[derive(Debug)]
pub struct InMemoryPostStore {
    inner: RwLock<VecDeque<Post>>,
    capacity: PostCapacity,
    clock: Arc<UniqueClock>,
}

impl InMemoryPostStore {
    /// Build an empty ring with the given capacity.
    #[must_use]
    pub fn new(capacity: PostCapacity, clock: Arc<UniqueClock>) -> Self {
        Self {
            inner: RwLock::new(VecDeque::with_capacity(capacity.into_inner())),
            capacity,
            clock,
        }
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn add(&self, sender_id: NodeId, content: Vec<u8>) -> u32 {
        let timestamp = self.clock.unique_now();
        let mut guard = self.inner.write().await;
        if guard.len() >= self.capacity.into_inner() {
            guard.pop_front();
        }
        guard.push_back(Post {
            timestamp,
            sender_id,
            content,
        });
        timestamp
    }

    async fn get_since(&self, since: u32) -> Vec<Post> {
        let guard = self.inner.read().await;
        guard.iter().filter(|p| p.timestamp > since).cloned().collect()
    }

    async fn count(&self) -> usize {
        self.inner.read().await.len()
    }

    async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_provider::MockTimeProvider;
    use proptest::prelude::*;

    fn store(capacity: usize) -> InMemoryPostStore {
        InMemoryPostStore::new(
            PostCapacity::try_new(capacity).unwrap(),
            UniqueClock::shared(Arc::new(MockTimeProvider::new())),
        )
    }

    #[tokio::test]
    async fn ring_overwrites_oldest() {
        let store = store(3);
        let sender = NodeId::from_bytes([1; 32]);
        for _ in 0..4 {
            store.add(sender, b"x".to_vec()).await;
        }
        assert_eq!(store.count().await, 3);
    }

    #[tokio::test]
    async fn get_since_is_ordered_and_exclusive() {
        let store = store(8);
        let sender = NodeId::from_bytes([2; 32]);
        let t1 = store.add(sender, b"a".to_vec()).await;
        let t2 = store.add(sender, b"b".to_vec()).await;
        let t3 = store.add(sender, b"c".to_vec()).await;
        let since = store.get_since(t1).await;
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].timestamp, t2);
        assert_eq!(since[1].timestamp, t3);
    }

    proptest! {
        /// ∀ posts p1, p2 added in order: `p1.ts < p2.ts`, even when the
        /// underlying wall clock never advances between adds.
        #[test]
        fn post_timestamps_are_strictly_monotonic(count in 2usize..50) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let timestamps = rt.block_on(async {
                let store = store(count);
                let sender = NodeId::from_bytes([3; 32]);
                let mut timestamps = Vec::with_capacity(count);
                for _ in 0..count {
                    timestamps.push(store.add(sender, Vec::new()).await);
                }
                timestamps
            });

            for pair in timestamps.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }
}
