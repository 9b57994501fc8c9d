//! Trait definitions for room-server components
//!
//! This module defines the interfaces every store and collaborator implements,
//! mirroring the router/delivery/registry split used elsewhere in this codebase:
//! components are injected as `Arc<dyn Trait>` so the dispatcher, login handler,
//! and sync loop can be exercised against fakes in tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::node_id::NodeId;
use crate::room::domain_types::{AddOutcome, Client, Contact};

/// Errors raised by [`ContactStore`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContactStoreError {
    /// The store is at capacity and every candidate for eviction is a favorite.
    #[error("contact store is full")]
    Full,
    /// No contact exists for the given id.
    #[error("contact not found: {0}")]
    NotFound(NodeId),
}

/// Errors raised by [`ClientStore`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientStoreError {
    /// The store is at capacity and every candidate for eviction is an admin.
    #[error("client store is full")]
    Full,
    /// No client exists for the given id.
    #[error("client not found: {0}")]
    NotFound(NodeId),
}

/// Errors raised by [`Crypto`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The supplied key could not be converted or was a low-order point.
    #[error("invalid key material")]
    InvalidKey,
    /// MAC verification or block decryption failed.
    #[error("decryption failed")]
    DecryptFailed,
}

/// Errors raised while processing an `ANON_REQ` login.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoginError {
    /// The request's timestamp did not exceed the existing client's replay floor.
    #[error("replayed login")]
    Replay,
    /// No password rule matched and the room is not open.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The client store rejected the upsert because it is full of admins.
    #[error("client store full")]
    StoreFull,
}

/// A keyed mapping from [`NodeId`] to [`Contact`], with hash-prefix search and a
/// lazily-cached ECDH shared secret per contact.
#[async_trait]
pub trait ContactStore: Send + Sync + std::fmt::Debug {
    /// Insert or overwrite a contact, evicting the lowest-`last_mod` non-favorite
    /// if the store is full and overwrite-on-full is enabled.
    async fn add(&self, contact: Contact) -> Result<AddOutcome, ContactStoreError>;

    /// Replace the mutable fields of an existing contact.
    async fn update(&self, contact: Contact) -> Result<(), ContactStoreError>;

    /// Remove a contact outright.
    async fn remove(&self, id: &NodeId) -> Result<(), ContactStoreError>;

    /// Fetch a contact by exact id.
    async fn get_by_id(&self, id: &NodeId) -> Option<Contact>;

    /// Fetch all contacts whose [`NodeId::hash`] equals `hash_byte`, capped at the
    /// store's configured `MaxSearchResults`.
    async fn search_by_hash(&self, hash_byte: u8) -> Vec<Contact>;

    /// Derive (or return the cached) X25519 shared secret for this contact.
    async fn shared_secret(&self, id: &NodeId) -> Result<[u8; 32], ContactStoreError>;

    /// Number of contacts currently stored.
    async fn count(&self) -> usize;
}

/// A keyed mapping from [`NodeId`] to [`Client`], with admin-aware eviction.
#[async_trait]
pub trait ClientStore: Send + Sync + std::fmt::Debug {
    /// Insert or overwrite a client, evicting the lowest-`last_activity` non-admin
    /// if the store is full.
    async fn add(&self, client: Client) -> Result<AddOutcome, ClientStoreError>;

    /// Replace the mutable fields of an existing client.
    async fn update(&self, client: Client) -> Result<(), ClientStoreError>;

    /// Remove a client outright.
    async fn remove(&self, id: &NodeId) -> Result<(), ClientStoreError>;

    /// Fetch a client by exact id.
    async fn get(&self, id: &NodeId) -> Option<Client>;

    /// Number of clients currently stored.
    async fn count(&self) -> usize;

    /// Snapshot all clients. Used by the sync loop's round-robin scan and by
    /// `GetAccessList`.
    async fn snapshot(&self) -> Vec<Client>;
}

/// A bounded, strictly-monotonic ring buffer of [`crate::room::domain_types::Post`].
#[async_trait]
pub trait PostStore: Send + Sync + std::fmt::Debug {
    /// Append a post, overwriting the oldest slot if the ring is full.
    async fn add(&self, sender_id: NodeId, content: Vec<u8>) -> u32;

    /// All stored posts with `timestamp > since`, in ascending timestamp order.
    async fn get_since(&self, since: u32) -> Vec<crate::room::domain_types::Post>;

    /// Number of posts currently stored.
    async fn count(&self) -> usize;

    /// Drop all stored posts.
    async fn clear(&self);
}

/// Callbacks fired when a tracked ack resolves or is abandoned.
pub trait AckCallbacks: Send + Sync + std::fmt::Debug {
    /// Invoked exactly once, outside any lock, when the ack is resolved.
    fn on_ack(&self) {}

    /// Invoked when retries are exhausted without an ack, outside any lock.
    fn on_timeout(&self) {}

    /// Invoked to resend the original payload; `attempt` is 1-based.
    fn resend(&self, _attempt: u32) {}
}

/// Tracks outstanding acks by a 32-bit hash, retrying on a fixed cadence until
/// a resend budget is exhausted.
#[async_trait]
pub trait AckTracker: Send + Sync + std::fmt::Debug {
    /// Begin tracking `hash`, replacing (without firing callbacks on) any prior
    /// entry under the same key.
    async fn track(
        &self,
        hash: u32,
        attempts_remaining: u32,
        callbacks: std::sync::Arc<dyn AckCallbacks>,
    );

    /// Resolve a pending ack, firing `on_ack`. Returns whether an entry existed.
    async fn resolve(&self, hash: u32) -> bool;

    /// Remove a pending ack without firing any callback.
    async fn cancel(&self, hash: u32);

    /// Number of outstanding acks.
    async fn pending_count(&self) -> usize;
}

/// Tracks peer liveness and fires a disconnect callback on inactivity.
#[async_trait]
pub trait ConnectionManager: Send + Sync + std::fmt::Debug {
    /// Record that `id` is newly connected.
    async fn register(&self, id: NodeId);

    /// Record activity from `id`, resetting its inactivity timer.
    async fn touch(&self, id: NodeId);

    /// Forget `id` outright, without firing a disconnect callback.
    async fn remove(&self, id: &NodeId);

    /// Whether `id` is currently tracked as connected.
    async fn is_connected(&self, id: &NodeId) -> bool;

    /// Number of currently-connected peers.
    async fn connected_count(&self) -> usize;
}

/// Pluggable X25519/AES/ack-hash cryptography used by the dispatcher and login
/// handler. A `DefaultCrypto` reference implementation lives in
/// `room::implementations::crypto`.
pub trait Crypto: Send + Sync + std::fmt::Debug {
    /// Convert an Ed25519 public key to its X25519 (Montgomery) form.
    fn ed25519_public_to_x25519(&self, ed25519_public: &[u8; 32]) -> Result<[u8; 32], CryptoError>;

    /// Derive a 32-byte shared secret from our X25519 secret and their X25519 public key.
    fn derive_shared_secret(
        &self,
        our_secret_x25519: &[u8; 32],
        their_public_x25519: &[u8; 32],
    ) -> Result<[u8; 32], CryptoError>;

    /// Decrypt an AES-128-ECB addressed ciphertext under `key`, verifying its MAC.
    fn aes128_open(&self, key: &[u8; 32], mac: u16, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Encrypt `plaintext` with AES-128-ECB under `key`, returning `(mac, ciphertext)`.
    fn aes128_seal(&self, key: &[u8; 32], plaintext: &[u8]) -> (u16, Vec<u8>);

    /// Compute the 32-bit ack hash over a trimmed plaintext and the sender's public key.
    fn ack_hash(&self, trimmed_plaintext: &[u8], sender_pubkey: &[u8; 32]) -> u32;

    /// Open an anonymous hybrid-encrypted login payload using our static secret key
    /// and the sender's ephemeral public key.
    fn anon_open(
        &self,
        our_secret_x25519: &[u8; 32],
        ephemeral_public: &[u8; 32],
        mac: u16,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
}

/// Outbound routing, abstracting over direct vs. flood vs. flood-with-path delivery.
#[async_trait]
pub trait PacketRouter: Send + Sync + std::fmt::Debug {
    /// Send `payload` directly along `path`.
    async fn send_direct(&self, dest: NodeId, path: Vec<u8>, payload: Vec<u8>);

    /// Flood `payload` to all neighbours.
    async fn send_flood(&self, dest: NodeId, payload: Vec<u8>);

    /// Flood `payload` as a path-return response, carrying `path` as a routing hint.
    async fn send_flood_with_path(&self, dest: NodeId, path: Vec<u8>, payload: Vec<u8>);
}

/// Supplies the 52-byte `ServerStats` blob for `GetStatus` requests.
pub trait StatsProvider: Send + Sync + std::fmt::Debug {
    /// Snapshot current server statistics.
    fn snapshot(&self) -> crate::codec::ServerStats;

    /// Reset any accumulating counters (invoked by the `clear stats` CLI command).
    fn reset(&self) {}
}

/// Supplies a CayenneLPP telemetry blob for `GetTelemetry` requests.
pub trait TelemetryProvider: Send + Sync + std::fmt::Debug {
    /// Collect telemetry visible under `perm_mask` (Guests are forced to `0x00`).
    fn collect(&self, perm_mask: u8) -> Vec<u8>;
}

/// Errors raised while writing a setting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// The key is not recognized.
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    /// The value could not be parsed for this key's type.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// The setting key.
        key: String,
        /// The rejected value.
        value: String,
    },
}

/// Persists and retrieves free-form configuration settings reached through the
/// CLI `get`/`set` commands. Persistence itself is out of scope for this core;
/// implementations may be purely in-memory.
pub trait SettingsStore: Send + Sync + std::fmt::Debug {
    /// Read a setting's current string value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a setting's value.
    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}
