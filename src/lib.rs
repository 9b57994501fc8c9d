//! # MeshCore Room Server
//!
//! A room-server core for a low-bandwidth, encrypted mesh messaging network:
//! anonymous-login session handling, a bounded post store, ack-gated
//! retransmission, and a fairness-scheduled sync loop, behind a small set of
//! injectable store and collaborator traits so the wire transport and
//! cryptography backend can be swapped independently of the protocol logic.
//!
//! ## Architecture
//!
//! The [`room`] module holds the state machine itself: [`room::traits`]
//! defines the component contracts (`ContactStore`, `ClientStore`,
//! `PostStore`, `AckTracker`, `ConnectionManager`, `Crypto`, `PacketRouter`,
//! and a few smaller ones), [`room::implementations`] provides the in-memory
//! reference implementations, and [`room::server::RoomServer`] wires them
//! together and owns their background loops.
//!
//! ```rust,no_run
//! use meshcore_room::room::config::RoomConfig;
//!
//! let config = RoomConfig::development();
//! ```
//!
//! ## Crate layout
//!
//! - [`node_id`] - the 32-byte peer identity type and its hex codec.
//! - [`clock`] - a strictly-monotonic clock built on [`time_provider`].
//! - [`codec`] - little-endian wire structs for the payloads this core reads
//!   and writes once a lower transport layer has parsed the packet envelope.
//! - [`error`] - the crate-level error type aggregating per-component errors
//!   at the binary boundary.
//! - [`room`] - the room-server state machine described above.

#![warn(missing_docs)]

pub mod clock;
pub mod codec;
pub mod error;
pub mod node_id;
pub mod room;
pub mod time_provider;

pub use error::RoomError;
pub use node_id::{NodeId, NodeIdError};

pub use ::tracing::{debug, error, info, instrument, warn};
pub use thiserror::Error;
