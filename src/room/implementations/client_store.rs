//! In-memory `ClientStore` implementation
//!
//! Same shape as [`super::contact_store::InMemoryContactStore`] but without
//! the secret cache: eviction targets the least-recently-active non-admin
//! session rather than the lowest-`last_mod` non-favorite contact.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::node_id::NodeId;
use crate::room::domain_types::{AddOutcome, Client, ClientCapacity};
use crate::room::traits::{ClientStore, ClientStoreError};

/// Mutex-guarded [`ClientStore`].
#[derive(Debug)]
pub struct InMemoryClientStore {
    inner: Mutex<HashMap<NodeId, Client>>,
    capacity: ClientCapacity,
}

impl InMemoryClientStore {
    /// Build an empty store with the given capacity.
    #[must_use]
    pub fn new(capacity: ClientCapacity) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            capacity,
        }
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn add(&self, client: Client) -> Result<AddOutcome, ClientStoreError> {
        let mut guard = self.inner.lock().await;

        if guard.contains_key(&client.id) {
            guard.insert(client.id, client);
            return Ok(AddOutcome::Updated);
        }

        if guard.len() >= self.capacity.into_inner() {
            let victim = guard
                .values()
                .filter(|c| !c.role().is_admin())
                .min_by_key(|c| c.last_activity)
                .map(|c| c.id);
            match victim {
                Some(id) => {
                    guard.remove(&id);
                    debug!(evicted = %id, "client store evicted least-recently-active non-admin");
                }
                None => return Err(ClientStoreError::Full),
            }
        }

        let outcome = if guard.is_empty() {
            AddOutcome::Inserted
        } else {
            AddOutcome::Evicted
        };
        guard.insert(client.id, client);
        Ok(outcome)
    }

    async fn update(&self, client: Client) -> Result<(), ClientStoreError> {
        let mut guard = self.inner.lock().await;
        if !guard.contains_key(&client.id) {
            return Err(ClientStoreError::NotFound(client.id));
        }
        guard.insert(client.id, client);
        Ok(())
    }

    async fn remove(&self, id: &NodeId) -> Result<(), ClientStoreError> {
        let mut guard = self.inner.lock().await;
        guard.remove(id).ok_or(ClientStoreError::NotFound(*id))?;
        Ok(())
    }

    async fn get(&self, id: &NodeId) -> Option<Client> {
        self.inner.lock().await.get(id).cloned()
    }

    async fn count(&self) -> usize {
        self.inner.lock().await.len()
    }

    async fn snapshot(&self) -> Vec<Client> {
        self.inner.lock().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::domain_types::Role;
    use proptest::prelude::*;

    fn client(seed: u8, role: Role, last_activity: u32) -> Client {
        let mut id_bytes = [0u8; 32];
        id_bytes[0] = seed;
        Client {
            id: NodeId::from_bytes(id_bytes),
            name: String::new(),
            permissions: role.to_permissions_byte(0),
            out_path_len: -1,
            out_path: Vec::new(),
            last_timestamp: 0,
            last_activity,
            sync_since: 0,
            push_post_timestamp: 0,
            push_failures: 0,
        }
    }

    proptest! {
        /// ∀ evictions in ClientStore: the evicted client is non-admin.
        #[test]
        fn eviction_never_removes_an_admin(
            admins in proptest::collection::vec(any::<bool>(), 3),
            activities in proptest::collection::vec(0u32..10_000, 3),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (add_result, still_present) = rt.block_on(async {
                let store = InMemoryClientStore::new(ClientCapacity::try_new(3).unwrap());
                for i in 0..3u8 {
                    let role = if admins[i as usize] { Role::Admin } else { Role::ReadWrite };
                    store.add(client(i, role, activities[i as usize])).await.unwrap();
                }

                let result = store.add(client(99, Role::ReadWrite, 50_000)).await;
                let mut still_present = Vec::new();
                for i in 0..3u8 {
                    let id = client(i, Role::Admin, 0).id;
                    still_present.push(store.get(&id).await.is_some());
                }
                (result, still_present)
            });

            let has_non_admin = admins.iter().any(|a| !a);
            if has_non_admin {
                prop_assert_eq!(add_result.unwrap(), AddOutcome::Evicted);
                for (i, admin) in admins.iter().enumerate() {
                    if *admin {
                        prop_assert!(still_present[i], "an admin client was evicted");
                    }
                }
            } else {
                prop_assert!(matches!(add_result, Err(ClientStoreError::Full)));
            }
        }
    }
}
