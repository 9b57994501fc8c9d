//! Room-server core
//!
//! This module holds the coupled state machine that sits behind a mesh
//! node's encrypted room: contact and client (session) bookkeeping, a
//! bounded post store, ack-gated retransmission, and the dispatch/sync loops
//! that tie them together.
//!
//! ```text
//! transport -> Dispatcher -> ContactStore (resolve sender)
//!                         -> ClientStore  (session state)
//!                         -> LoginHandler / RequestHandler / CliHandler
//!                         -> PostStore
//!
//! SyncLoop  <- PostStore, ClientStore -> PacketRouter, AckTracker
//! ConnectionManager (orthogonal liveness sweep)
//! ```
//!
//! # Performance characteristics
//!
//! - Contact/client lookups are amortized O(1) hash map access under a
//!   single mutex per store; hash-prefix candidate search is bounded by
//!   `RoomConfig::max_search_results`.
//! - The post store is a fixed-capacity ring buffer; pushes and range scans
//!   are O(capacity) at worst.
//! - The ack tracker's periodic sweep is O(pending acks) per tick.
//!
//! # Configuration
//!
//! ```rust,no_run
//! use meshcore_room::room::config::RoomConfig;
//!
//! let config = RoomConfig::development();
//! ```
//!
//! # Thread-safety
//!
//! Every store implementation is `Send + Sync` and safe to share behind an
//! `Arc`. Callbacks registered with the ack tracker and connection manager
//! always fire outside the relevant lock.

pub mod config;
pub mod domain_types;
pub mod implementations;
pub mod server;
pub mod traits;

pub use config::RoomConfig;
pub use domain_types::*;
pub use server::RoomServer;
pub use traits::*;
