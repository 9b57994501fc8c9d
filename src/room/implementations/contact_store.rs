//! In-memory `ContactStore` implementation
//!
//! A single mutex guards the index; each contact's cached shared secret is
//! additionally guarded by its own mutex, so one slow ECDH derivation never
//! blocks unrelated lookups. This mirrors the split this codebase uses
//! elsewhere between a registry lock and per-entry state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::node_id::NodeId;
use crate::room::domain_types::{AddOutcome, Contact, ContactCapacity, MaxSearchResults};
use crate::room::traits::{Crypto, ContactStore, ContactStoreError};

struct Slot {
    contact: Contact,
    secret_lock: Arc<Mutex<()>>,
}

/// Mutex-guarded [`ContactStore`] with lazy, per-contact ECDH secret caching.
#[derive(Debug)]
pub struct InMemoryContactStore {
    inner: Mutex<HashMap<NodeId, Slot>>,
    capacity: ContactCapacity,
    max_search_results: MaxSearchResults,
    overwrite_on_full: bool,
    our_secret_x25519: [u8; 32],
    crypto: Arc<dyn Crypto>,
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot").field("contact", &self.contact).finish()
    }
}

impl InMemoryContactStore {
    /// Build an empty store bound to this node's static X25519 secret key.
    #[must_use]
    pub fn new(
        capacity: ContactCapacity,
        max_search_results: MaxSearchResults,
        overwrite_on_full: bool,
        our_secret_x25519: [u8; 32],
        crypto: Arc<dyn Crypto>,
    ) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            capacity,
            max_search_results,
            overwrite_on_full,
            our_secret_x25519,
            crypto,
        }
    }

    /// Iterate all contacts under the store lock, stopping early if `cb` returns `false`.
    pub async fn for_each<F: FnMut(&Contact) -> bool>(&self, mut cb: F) {
        let guard = self.inner.lock().await;
        for slot in guard.values() {
            if !cb(&slot.contact) {
                break;
            }
        }
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn add(&self, mut contact: Contact) -> Result<AddOutcome, ContactStoreError> {
        let mut guard = self.inner.lock().await;

        if guard.contains_key(&contact.id) {
            contact.shared_secret = None;
            guard.insert(
                contact.id,
                Slot {
                    contact,
                    secret_lock: Arc::new(Mutex::new(())),
                },
            );
            return Ok(AddOutcome::Updated);
        }

        if guard.len() >= self.capacity.into_inner() {
            if !self.overwrite_on_full {
                return Err(ContactStoreError::Full);
            }
            let victim = guard
                .values()
                .filter(|s| !s.contact.is_favorite())
                .min_by_key(|s| s.contact.last_mod)
                .map(|s| s.contact.id);
            match victim {
                Some(id) => {
                    guard.remove(&id);
                    debug!(evicted = %id, "contact store evicted lowest last_mod non-favorite");
                }
                None => return Err(ContactStoreError::Full),
            }
        }

        let outcome = if guard.is_empty() {
            AddOutcome::Inserted
        } else {
            AddOutcome::Evicted
        };
        guard.insert(
            contact.id,
            Slot {
                contact,
                secret_lock: Arc::new(Mutex::new(())),
            },
        );
        Ok(outcome)
    }

    async fn update(&self, contact: Contact) -> Result<(), ContactStoreError> {
        let mut guard = self.inner.lock().await;
        let slot = guard
            .get_mut(&contact.id)
            .ok_or(ContactStoreError::NotFound(contact.id))?;
        let mut updated = contact;
        if updated.out_path_len == -1 {
            updated.out_path.clear();
        }
        let secret_changed = slot.contact.shared_secret.is_none() != updated.shared_secret.is_none();
        updated.shared_secret = if secret_changed { None } else { slot.contact.shared_secret };
        slot.contact = updated;
        Ok(())
    }

    async fn remove(&self, id: &NodeId) -> Result<(), ContactStoreError> {
        let mut guard = self.inner.lock().await;
        guard.remove(id).ok_or(ContactStoreError::NotFound(*id))?;
        Ok(())
    }

    async fn get_by_id(&self, id: &NodeId) -> Option<Contact> {
        let guard = self.inner.lock().await;
        guard.get(id).map(|s| s.contact.clone())
    }

    async fn search_by_hash(&self, hash_byte: u8) -> Vec<Contact> {
        let guard = self.inner.lock().await;
        guard
            .values()
            .filter(|s| s.contact.id.hash() == hash_byte)
            .take(self.max_search_results.into_inner())
            .map(|s| s.contact.clone())
            .collect()
    }

    async fn shared_secret(&self, id: &NodeId) -> Result<[u8; 32], ContactStoreError> {
        let secret_lock = {
            let guard = self.inner.lock().await;
            let slot = guard.get(id).ok_or(ContactStoreError::NotFound(*id))?;
            if let Some(secret) = slot.contact.shared_secret {
                return Ok(secret);
            }
            Arc::clone(&slot.secret_lock)
        };

        let _permit = secret_lock.lock().await;

        // Re-check under the per-contact lock: another task may have raced us.
        {
            let guard = self.inner.lock().await;
            if let Some(slot) = guard.get(id) {
                if let Some(secret) = slot.contact.shared_secret {
                    return Ok(secret);
                }
            }
        }

        let their_public = {
            let guard = self.inner.lock().await;
            let slot = guard.get(id).ok_or(ContactStoreError::NotFound(*id))?;
            *slot.contact.id.as_bytes()
        };

        let their_x25519 = self
            .crypto
            .ed25519_public_to_x25519(&their_public)
            .map_err(|_| ContactStoreError::NotFound(*id))?;
        let secret = self
            .crypto
            .derive_shared_secret(&self.our_secret_x25519, &their_x25519)
            .map_err(|_| ContactStoreError::NotFound(*id))?;

        let mut guard = self.inner.lock().await;
        if let Some(slot) = guard.get_mut(id) {
            slot.contact.shared_secret = Some(secret);
            trace!(contact = %id, "cached ECDH shared secret");
        }
        Ok(secret)
    }

    async fn count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::implementations::DefaultCrypto;
    use proptest::prelude::*;

    fn store(capacity: usize) -> InMemoryContactStore {
        InMemoryContactStore::new(
            ContactCapacity::try_new(capacity).unwrap(),
            MaxSearchResults::try_new(16).unwrap(),
            true,
            [1u8; 32],
            Arc::new(DefaultCrypto::new()),
        )
    }

    fn contact(seed: u8, favorite: bool, last_mod: u32) -> Contact {
        let mut id_bytes = [0u8; 32];
        id_bytes[0] = seed;
        let mut c = Contact::new(NodeId::from_bytes(id_bytes), format!("c{seed}"), last_mod);
        c.last_mod = last_mod;
        c.flags = u8::from(favorite);
        c
    }

    proptest! {
        /// ∀ evictions in ContactStore with overwrite-on-full: the evicted
        /// contact is non-favorite; if all are favorites, `add` returns `Full`.
        #[test]
        fn eviction_never_removes_a_favorite(
            favorites in proptest::collection::vec(any::<bool>(), 3),
            last_mods in proptest::collection::vec(0u32..10_000, 3),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (add_result, still_present) = rt.block_on(async {
                let store = store(3);
                for i in 0..3u8 {
                    store.add(contact(i, favorites[i as usize], last_mods[i as usize])).await.unwrap();
                }

                let result = store.add(contact(99, false, 50_000)).await;
                let mut still_present = Vec::new();
                for i in 0..3u8 {
                    let id = contact(i, true, 0).id;
                    still_present.push(store.get_by_id(&id).await.is_some());
                }
                (result, still_present)
            });

            let has_non_favorite = favorites.iter().any(|f| !f);
            if has_non_favorite {
                prop_assert_eq!(add_result.unwrap(), AddOutcome::Evicted);
                for (i, favorite) in favorites.iter().enumerate() {
                    if *favorite {
                        prop_assert!(still_present[i], "a favorite contact was evicted");
                    }
                }
            } else {
                prop_assert!(matches!(add_result, Err(ContactStoreError::Full)));
            }
        }
    }
}
