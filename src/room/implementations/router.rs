//! Test double for the out-of-scope packet router
//!
//! Records every outbound send so integration tests can assert on what the
//! dispatcher, login handler, and sync loop actually emitted, without a real
//! transport.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::node_id::NodeId;
use crate::room::traits::PacketRouter;

/// A single recorded outbound send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentPacket {
    /// A direct send along a known path.
    Direct {
        /// Destination peer.
        dest: NodeId,
        /// Relay hash path used.
        path: Vec<u8>,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
    /// A flooded send with no path hint.
    Flood {
        /// Destination peer.
        dest: NodeId,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
    /// A flooded path-return send carrying a reversed relay path.
    FloodWithPath {
        /// Destination peer.
        dest: NodeId,
        /// Reversed relay hash path.
        path: Vec<u8>,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
}

/// In-memory [`PacketRouter`] that records sends for test assertions.
#[derive(Debug, Default)]
pub struct RecordingRouter {
    sent: Mutex<Vec<SentPacket>>,
}

impl RecordingRouter {
    /// Build an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every packet sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentPacket> {
        self.sent.lock().expect("recording router mutex poisoned").clone()
    }
}

#[async_trait]
impl PacketRouter for RecordingRouter {
    async fn send_direct(&self, dest: NodeId, path: Vec<u8>, payload: Vec<u8>) {
        self.sent
            .lock()
            .expect("recording router mutex poisoned")
            .push(SentPacket::Direct { dest, path, payload });
    }

    async fn send_flood(&self, dest: NodeId, payload: Vec<u8>) {
        self.sent
            .lock()
            .expect("recording router mutex poisoned")
            .push(SentPacket::Flood { dest, payload });
    }

    async fn send_flood_with_path(&self, dest: NodeId, path: Vec<u8>, payload: Vec<u8>) {
        self.sent
            .lock()
            .expect("recording router mutex poisoned")
            .push(SentPacket::FloodWithPath { dest, path, payload });
    }
}
