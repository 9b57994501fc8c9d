//! Domain types for the room-server core
//!
//! Follows the newtype-everywhere convention used throughout this codebase:
//! every bounded or validated primitive gets its own `nutype` wrapper so that,
//! for example, a `MaxPushFailures` can never be silently passed where a
//! `SyncSince` timestamp was expected.

use nutype::nutype;
use serde::{Deserialize, Serialize};

use crate::node_id::NodeId;

/// ACL role carried on every [`Client`] session.
///
/// Encoded on the wire as the low 2 bits of a permissions byte; higher bits
/// are reserved by the protocol and preserved verbatim by this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    /// No read or write access; logins default here when nothing else matches.
    Guest = 0,
    /// May read posts but not write them.
    ReadOnly = 1,
    /// May read and write posts.
    ReadWrite = 2,
    /// Full access, including the CLI and access-list queries.
    Admin = 3,
}

impl Role {
    /// Whether this role may issue CLI commands and query the access list.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Whether this role is the unauthenticated floor.
    #[must_use]
    pub const fn is_guest(self) -> bool {
        matches!(self, Self::Guest)
    }

    /// Whether this role may write (post) content.
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::ReadWrite | Self::Admin)
    }

    /// Whether this role may read posted content.
    #[must_use]
    pub const fn can_read(self) -> bool {
        !self.is_guest()
    }

    /// Decode from the low 2 bits of a permissions byte.
    #[must_use]
    pub const fn from_permissions_byte(byte: u8) -> Self {
        match byte & 0b11 {
            3 => Self::Admin,
            2 => Self::ReadWrite,
            1 => Self::ReadOnly,
            _ => Self::Guest,
        }
    }

    /// Encode into a permissions byte, preserving any high bits from `base`.
    #[must_use]
    pub const fn to_permissions_byte(self, base: u8) -> u8 {
        (base & !0b11) | (self as u8)
    }
}

/// Type of a `TXT_MSG` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxtType {
    /// A plain text post, subject to the ACL write check and stored.
    Plain,
    /// A signed plain text post (9-byte header instead of 5).
    PlainSigned,
    /// An admin CLI command/reply.
    Cli,
}

/// Type of a `REQ` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReqType {
    /// Liveness probe; answered with a bare ACK.
    Keepalive,
    /// Request for the 52-byte [`crate::codec::ServerStats`] blob.
    GetStatus,
    /// Request for a CayenneLPP telemetry blob.
    GetTelemetry,
    /// Admin-only request for the access list.
    GetAccessList,
}

#[nutype(
    validate(less_or_equal = 10_000),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, TryFrom, Into),
    default = 100
)]
/// Maximum number of contacts retained in a [`crate::room::traits::ContactStore`].
pub struct ContactCapacity(usize);

#[nutype(
    validate(less_or_equal = 1_000),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, TryFrom, Into),
    default = 20
)]
/// Maximum number of logged-in sessions retained in a [`crate::room::traits::ClientStore`].
pub struct ClientCapacity(usize);

#[nutype(
    validate(less_or_equal = 10_000),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, TryFrom, Into),
    default = 100
)]
/// Ring-buffer capacity of a [`crate::room::traits::PostStore`].
pub struct PostCapacity(usize);

#[nutype(
    validate(less_or_equal = 64),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, TryFrom, Into),
    default = 16
)]
/// Cap on hash-prefix candidates returned by `ContactStore::search_by_hash`.
pub struct MaxSearchResults(usize);

#[nutype(
    validate(less_or_equal = 32),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, TryFrom, Into),
    default = 8
)]
/// Consecutive unacknowledged pushes before a client is skipped by the sync loop.
pub struct MaxPushFailures(usize);

#[nutype(
    validate(less_or_equal = 16),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, TryFrom, Into),
    default = 3
)]
/// Number of resends attempted by the ack tracker before giving up.
pub struct MaxRetries(usize);

#[nutype(
    validate(greater = 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, TryFrom, Into),
    default = 12
)]
/// Seconds before a pending ack is considered timed out.
pub struct AckTimeoutSecs(u64);

#[nutype(
    validate(greater = 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, TryFrom, Into),
    default = 6
)]
/// Minimum age, in seconds, a post must reach before the sync loop will push it.
pub struct PostSyncDelaySecs(u64);

#[nutype(
    validate(greater = 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, TryFrom, Into),
    default = 30
)]
/// Keepalive interval in seconds.
pub struct KeepaliveIntervalSecs(u64);

/// A single contact known to this node: a peer identity plus routing and advert
/// state, with a lazily-computed shared secret cache.
#[derive(Debug, Clone)]
pub struct Contact {
    /// The peer's identity.
    pub id: NodeId,
    /// Display name, at most 32 characters.
    pub name: String,
    /// Device/node-type tag carried in adverts.
    pub node_type: u8,
    /// Bit 0 = favorite (never evicted). Other bits reserved.
    pub flags: u8,
    /// -1 = unknown/flood-only, else a direct hop count.
    pub out_path_len: i8,
    /// Relay hash sequence; length must be >= `out_path_len` when it is non-negative.
    pub out_path: Vec<u8>,
    /// The peer's self-reported clock at the time of its most recent advert.
    pub last_advert_timestamp: u32,
    /// Local clock of the most recent modification to this record.
    pub last_mod: u32,
    /// Latitude in signed micro-degrees, if advertised.
    pub lat: Option<i32>,
    /// Longitude in signed micro-degrees, if advertised.
    pub lon: Option<i32>,
    /// The peer's requested post-sync cutoff, when this contact is also logged in.
    pub sync_since: u32,
    /// Cached ECDH shared secret, computed lazily and invalidated on key change.
    pub(crate) shared_secret: Option<[u8; 32]>,
}

impl Contact {
    /// Build a freshly-seen contact with no cached secret and flood-only routing.
    #[must_use]
    pub fn new(id: NodeId, name: String, now: u32) -> Self {
        Self {
            id,
            name,
            node_type: 0,
            flags: 0,
            out_path_len: -1,
            out_path: Vec::new(),
            last_advert_timestamp: 0,
            last_mod: now,
            lat: None,
            lon: None,
            sync_since: 0,
            shared_secret: None,
        }
    }

    /// Whether bit 0 of `flags` is set.
    #[must_use]
    pub const fn is_favorite(&self) -> bool {
        self.flags & 0b1 != 0
    }
}

/// A logged-in session.
#[derive(Debug, Clone)]
pub struct Client {
    /// Session identity, equal to the ephemeral public key used at login.
    pub id: NodeId,
    /// Display name reported at login, if any.
    pub name: String,
    /// ACL role plus any reserved high bits, as received/assigned.
    pub permissions: u8,
    /// -1 = unknown/flood-only, else a direct hop count, mirroring [`Contact`].
    pub out_path_len: i8,
    /// Relay hash sequence for direct routing back to this client.
    pub out_path: Vec<u8>,
    /// Highest accepted timestamp from this client; the replay floor.
    pub last_timestamp: u32,
    /// Local clock of the most recent activity from this client.
    pub last_activity: u32,
    /// The post-sync cutoff requested at login.
    pub sync_since: u32,
    /// Local clock of the most recently pushed post to this client.
    pub push_post_timestamp: u32,
    /// Consecutive unacknowledged pushes.
    pub push_failures: u32,
}

impl Client {
    /// Resolve this client's ACL role from its permissions byte.
    #[must_use]
    pub const fn role(&self) -> Role {
        Role::from_permissions_byte(self.permissions)
    }

    /// Whether this client has exhausted its retry budget for the sync loop.
    #[must_use]
    pub fn is_push_exhausted(&self, max: MaxPushFailures) -> bool {
        self.push_failures as usize >= max.into_inner()
    }
}

/// A stored post: sender, unique timestamp, and addressed plaintext content.
#[derive(Debug, Clone)]
pub struct Post {
    /// Strictly unique, monotonically increasing local timestamp.
    pub timestamp: u32,
    /// The post's author.
    pub sender_id: NodeId,
    /// Addressed plaintext bytes, trimmed of block-cipher zero padding.
    pub content: Vec<u8>,
}

/// Outcome of a store `add` that may be rejected when full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new slot was used.
    Inserted,
    /// An existing slot was overwritten in place.
    Updated,
    /// A record was evicted to make room for this one.
    Evicted,
}
