//! Concrete implementations of the room-server component traits

pub mod ack_tracker;
pub mod cli_handler;
pub mod client_store;
pub mod connection_manager;
pub mod contact_store;
pub mod crypto;
pub mod dispatcher;
pub mod login_handler;
pub mod post_store;
pub mod request_handler;
pub mod router;
pub mod settings_store;
pub mod sync_loop;

pub use ack_tracker::InMemoryAckTracker;
pub use cli_handler::{CliHandler, DelegateHandler};
pub use client_store::InMemoryClientStore;
pub use connection_manager::{DisconnectCallback, InMemoryConnectionManager};
pub use contact_store::InMemoryContactStore;
pub use crypto::DefaultCrypto;
pub use dispatcher::{AddressedSubtype, Dispatcher, PacketKind};
pub use login_handler::{LoginHandler, LoginOutcome};
pub use post_store::InMemoryPostStore;
pub use request_handler::{ReplyPayload, RequestHandler};
pub use router::{RecordingRouter, SentPacket};
pub use settings_store::InMemorySettingsStore;
pub use sync_loop::SyncLoop;
