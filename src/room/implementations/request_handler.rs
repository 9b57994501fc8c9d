//! `REQ` processing: keepalive, status, telemetry, and access-list queries

use std::sync::Arc;

use crate::codec::RequestContent;
use crate::room::domain_types::{Client, ReqType};
use crate::room::traits::{ClientStore, Crypto, StatsProvider, TelemetryProvider};

/// Maximum total bytes in a `GetAccessList` response (4-byte tag + up to 8 entries of 7 bytes).
const MAX_ACCESS_LIST_BYTES: usize = 60;
const ACCESS_LIST_ENTRY_BYTES: usize = 7;

/// What to send back in reply to a `REQ`, or that it should be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
    /// Send a bare ACK carrying this 32-bit hash.
    Ack(u32),
    /// Send a `RESPONSE` with this plaintext (already includes the tag).
    Response(Vec<u8>),
    /// No provider configured, or the requester lacked permission: drop silently.
    Drop,
}

/// Handles `Keepalive`/`GetStatus`/`GetTelemetry`/`GetAccessList` requests.
#[derive(Debug)]
pub struct RequestHandler {
    stats_provider: Option<Arc<dyn StatsProvider>>,
    telemetry_provider: Option<Arc<dyn TelemetryProvider>>,
    client_store: Arc<dyn ClientStore>,
    crypto: Arc<dyn Crypto>,
}

impl RequestHandler {
    /// Build a request handler with optional stats/telemetry providers.
    #[must_use]
    pub fn new(
        stats_provider: Option<Arc<dyn StatsProvider>>,
        telemetry_provider: Option<Arc<dyn TelemetryProvider>>,
        client_store: Arc<dyn ClientStore>,
        crypto: Arc<dyn Crypto>,
    ) -> Self {
        Self {
            stats_provider,
            telemetry_provider,
            client_store,
            crypto,
        }
    }

    /// Process one request from `client`, given the trimmed request plaintext
    /// and the sender's raw public key (used for keepalive's ack hash).
    pub async fn handle(
        &self,
        client: &Client,
        content: &RequestContent,
        sender_pubkey: &[u8; 32],
    ) -> ReplyPayload {
        match content.req_type {
            ReqType::Keepalive => {
                let mut trimmed = Vec::with_capacity(9);
                trimmed.extend_from_slice(&content.timestamp.to_le_bytes());
                trimmed.push(0); // req_type tag byte, fixed for keepalive
                let sync_since = content.data.first_chunk::<4>().copied().unwrap_or([0; 4]);
                trimmed.extend_from_slice(&sync_since);
                ReplyPayload::Ack(self.crypto.ack_hash(&trimmed, sender_pubkey))
            }
            ReqType::GetStatus => {
                let Some(provider) = &self.stats_provider else {
                    return ReplyPayload::Drop;
                };
                let stats = provider.snapshot().encode();
                let mut response = Vec::with_capacity(4 + stats.len());
                response.extend_from_slice(&content.timestamp.to_le_bytes());
                response.extend_from_slice(&stats);
                ReplyPayload::Response(response)
            }
            ReqType::GetTelemetry => {
                let Some(provider) = &self.telemetry_provider else {
                    return ReplyPayload::Drop;
                };
                let requested_mask = !content.data.first().copied().unwrap_or(0);
                let perm_mask = if client.role().is_guest() { 0 } else { requested_mask };
                let telemetry = provider.collect(perm_mask);
                let mut response = Vec::with_capacity(4 + telemetry.len());
                response.extend_from_slice(&content.timestamp.to_le_bytes());
                response.extend_from_slice(&telemetry);
                ReplyPayload::Response(response)
            }
            ReqType::GetAccessList => {
                if !client.role().is_admin() {
                    return ReplyPayload::Drop;
                }
                if content.data.len() < 2 || content.data[0] != 0 || content.data[1] != 0 {
                    return ReplyPayload::Drop;
                }
                let clients = self.client_store.snapshot().await;
                let mut response = Vec::with_capacity(4 + MAX_ACCESS_LIST_BYTES);
                response.extend_from_slice(&content.timestamp.to_le_bytes());
                for admin in clients.iter().filter(|c| c.role().is_admin()) {
                    if response.len() + ACCESS_LIST_ENTRY_BYTES > MAX_ACCESS_LIST_BYTES {
                        break;
                    }
                    response.extend_from_slice(&admin.id.as_bytes()[..6]);
                    response.push(admin.permissions);
                }
                ReplyPayload::Response(response)
            }
        }
    }
}
