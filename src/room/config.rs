//! Room-server configuration
//!
//! Mirrors the `development()`/`production()` factory pattern used for the
//! router configuration elsewhere in this crate: tests want short timeouts
//! and small capacities, production wants the protocol defaults.

use thiserror::Error;

use crate::room::domain_types::{
    AckTimeoutSecs, ClientCapacity, ContactCapacity, KeepaliveIntervalSecs, MaxPushFailures,
    MaxRetries, MaxSearchResults, PostCapacity, PostSyncDelaySecs,
};

/// Errors raised while validating a [`RoomConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric field failed its `nutype` validation.
    #[error("invalid configuration value: {0}")]
    ValidationError(String),
}

/// Multiplier applied to the keepalive interval to derive the connection
/// inactivity timeout (default 30s x 2.5 = 75s).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeepaliveTimeoutMultiplier(pub f64);

impl Default for KeepaliveTimeoutMultiplier {
    fn default() -> Self {
        Self(2.5)
    }
}

/// Top-level configuration for a room server instance.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    // Store capacities
    /// Maximum contacts retained.
    pub contact_capacity: ContactCapacity,
    /// Maximum logged-in sessions retained.
    pub client_capacity: ClientCapacity,
    /// Ring-buffer capacity for stored posts.
    pub post_capacity: PostCapacity,
    /// Whether stores evict on overflow rather than rejecting the insert.
    pub overwrite_on_full: bool,

    // Dispatch tuning
    /// Cap on hash-prefix decryption candidates per addressed packet.
    pub max_search_results: MaxSearchResults,

    // Retry and failure handling
    /// Consecutive push failures before a client is skipped by the sync loop.
    pub max_push_failures: MaxPushFailures,
    /// Resend attempts for a pending ack before giving up.
    pub max_retries: MaxRetries,
    /// Seconds before a pending ack is considered timed out.
    pub ack_timeout: AckTimeoutSecs,

    // Sync loop
    /// Minimum post age before the sync loop will push it.
    pub post_sync_delay: PostSyncDelaySecs,

    // Connection liveness
    /// Keepalive interval.
    pub keepalive_interval: KeepaliveIntervalSecs,
    /// Multiplier applied to the keepalive interval for the inactivity timeout.
    pub keepalive_timeout_multiplier: KeepaliveTimeoutMultiplier,

    // Login / access control
    /// Admin password; an empty-password relogin preserves prior permissions.
    pub admin_password: Option<String>,
    /// Guest (read-write) password.
    pub guest_password: Option<String>,
    /// If true, an unauthenticated login with no matching password still
    /// succeeds at `ReadOnly`.
    pub allow_read_only: bool,
}

impl RoomConfig {
    /// Settings tuned for fast, deterministic tests: small capacities, short
    /// timeouts, `overwrite_on_full` enabled.
    #[must_use]
    pub fn development() -> Self {
        Self {
            contact_capacity: ContactCapacity::try_new(8).unwrap(),
            client_capacity: ClientCapacity::try_new(4).unwrap(),
            post_capacity: PostCapacity::try_new(8).unwrap(),
            overwrite_on_full: true,
            max_search_results: MaxSearchResults::try_new(16).unwrap(),
            max_push_failures: MaxPushFailures::try_new(3).unwrap(),
            max_retries: MaxRetries::try_new(3).unwrap(),
            ack_timeout: AckTimeoutSecs::try_new(12).unwrap(),
            post_sync_delay: PostSyncDelaySecs::try_new(6).unwrap(),
            keepalive_interval: KeepaliveIntervalSecs::try_new(30).unwrap(),
            keepalive_timeout_multiplier: KeepaliveTimeoutMultiplier::default(),
            admin_password: Some("admin123".to_string()),
            guest_password: Some("guest123".to_string()),
            allow_read_only: true,
        }
    }

    /// Protocol-default production settings: 100 contacts, 20 clients, 100
    /// posts, 12s ack timeout, 30s keepalive, no default passwords.
    #[must_use]
    pub fn production() -> Self {
        Self {
            contact_capacity: ContactCapacity::default(),
            client_capacity: ClientCapacity::default(),
            post_capacity: PostCapacity::default(),
            overwrite_on_full: true,
            max_search_results: MaxSearchResults::default(),
            max_push_failures: MaxPushFailures::try_new(8).unwrap(),
            max_retries: MaxRetries::try_new(3).unwrap(),
            ack_timeout: AckTimeoutSecs::default(),
            post_sync_delay: PostSyncDelaySecs::default(),
            keepalive_interval: KeepaliveIntervalSecs::default(),
            keepalive_timeout_multiplier: KeepaliveTimeoutMultiplier::default(),
            admin_password: None,
            guest_password: None,
            allow_read_only: false,
        }
    }

    /// Connection inactivity threshold derived from the keepalive interval
    /// and its timeout multiplier.
    #[must_use]
    pub fn connection_timeout_secs(&self) -> u64 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let secs = self.keepalive_interval.into_inner() as f64 * self.keepalive_timeout_multiplier.0;
        secs as u64
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self::production()
    }
}
