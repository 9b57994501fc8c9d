//! Packet ingress: hash-candidate decryption, replay gating, and type demux
//!
//! The wire envelope (packet type byte, dest/src hash, outer MAC/ciphertext
//! framing) is parsed by the out-of-scope codec before reaching this
//! dispatcher; [`PacketKind`] is the cooked shape it hands us.

use std::sync::Arc;

use tracing::debug;

use crate::codec::{PathContent, RequestContent, TxtMsgContent};
use crate::node_id::NodeId;
use crate::room::domain_types::{Contact, TxtType};
use crate::room::implementations::cli_handler::CliHandler;
use crate::room::implementations::login_handler::LoginHandler;
use crate::room::implementations::request_handler::{ReplyPayload, RequestHandler};
use crate::room::traits::{AckTracker, ClientStore, ConnectionManager, ContactStore, Crypto, PacketRouter, PostStore};

/// Which addressed payload subtype was received, mirroring the wire's
/// top-level packet type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressedSubtype {
    /// Path update, optionally carrying a piggybacked ACK or RESPONSE.
    Path,
    /// A text message: a post, or an admin CLI command/reply.
    TxtMsg,
    /// A structured request (keepalive/status/telemetry/access-list).
    Req,
}

/// A cooked, envelope-parsed packet ready for dispatch.
#[derive(Debug, Clone)]
pub enum PacketKind {
    /// Periodic broadcast announcing a node's existence and public data.
    Advert {
        /// The advertising node.
        sender_id: NodeId,
        /// The peer's self-reported clock.
        timestamp: u32,
        /// Device/node-type tag.
        node_type: u8,
        /// Advert flags (bit 0 = favorite is not set by adverts; reserved here).
        flags: u8,
        /// Latitude, if advertised.
        lat: Option<i32>,
        /// Longitude, if advertised.
        lon: Option<i32>,
        /// Display name, if advertised.
        name: String,
    },
    /// Anonymous hybrid-encrypted login request.
    AnonReq {
        /// The ephemeral public key used as this session's identity.
        ephemeral_public: [u8; 32],
        /// The outer payload's MAC.
        mac: u16,
        /// The outer payload's ciphertext.
        ciphertext: Vec<u8>,
    },
    /// A bare acknowledgement.
    Ack {
        /// The 32-bit ack hash being acknowledged.
        hash: u32,
    },
    /// An addressed payload: PATH, TXT_MSG, or REQ.
    Addressed {
        /// Which addressed payload this is.
        subtype: AddressedSubtype,
        /// The sender's one-byte hash, used to look up decrypt candidates.
        src_hash: u8,
        /// The addressed payload's MAC.
        mac: u16,
        /// The addressed payload's ciphertext.
        ciphertext: Vec<u8>,
        /// Whether this packet arrived via flood (governs path-return responses).
        via_flood: bool,
    },
}

/// Demultiplexes ingress packets across the contact/client stores and the
/// login/request/CLI handlers, and applies the response-routing rule
/// (direct/flood for plain acks and posts, path-return for request/CLI
/// responses that arrived via flood).
#[derive(Debug)]
pub struct Dispatcher {
    contact_store: Arc<dyn ContactStore>,
    client_store: Arc<dyn ClientStore>,
    post_store: Arc<dyn PostStore>,
    ack_tracker: Arc<dyn AckTracker>,
    connection_manager: Arc<dyn ConnectionManager>,
    crypto: Arc<dyn Crypto>,
    router: Arc<dyn PacketRouter>,
    login_handler: Arc<LoginHandler>,
    request_handler: Arc<RequestHandler>,
    cli_handler: Arc<CliHandler>,
    max_search_results: usize,
}

impl Dispatcher {
    /// Build a dispatcher over the given stores and handlers.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        contact_store: Arc<dyn ContactStore>,
        client_store: Arc<dyn ClientStore>,
        post_store: Arc<dyn PostStore>,
        ack_tracker: Arc<dyn AckTracker>,
        connection_manager: Arc<dyn ConnectionManager>,
        crypto: Arc<dyn Crypto>,
        router: Arc<dyn PacketRouter>,
        login_handler: Arc<LoginHandler>,
        request_handler: Arc<RequestHandler>,
        cli_handler: Arc<CliHandler>,
        max_search_results: usize,
    ) -> Self {
        Self {
            contact_store,
            client_store,
            post_store,
            ack_tracker,
            connection_manager,
            crypto,
            router,
            login_handler,
            request_handler,
            cli_handler,
            max_search_results,
        }
    }

    /// Handle one ingress packet.
    pub async fn handle_packet(&self, packet: PacketKind, now: u32) {
        match packet {
            PacketKind::Advert {
                sender_id,
                timestamp,
                node_type,
                flags: _flags,
                lat,
                lon,
                name,
            } => self.handle_advert(sender_id, timestamp, node_type, lat, lon, name, now).await,
            PacketKind::AnonReq {
                ephemeral_public,
                mac,
                ciphertext,
            } => self.handle_anon_req(ephemeral_public, mac, &ciphertext, now).await,
            PacketKind::Ack { hash } => {
                self.ack_tracker.resolve(hash).await;
            }
            PacketKind::Addressed {
                subtype,
                src_hash,
                mac,
                ciphertext,
                via_flood,
            } => {
                self.handle_addressed(subtype, src_hash, mac, &ciphertext, via_flood, now)
                    .await;
            }
        }
    }

    async fn handle_advert(
        &self,
        sender_id: NodeId,
        timestamp: u32,
        node_type: u8,
        lat: Option<i32>,
        lon: Option<i32>,
        name: String,
        now: u32,
    ) {
        match self.contact_store.get_by_id(&sender_id).await {
            Some(mut existing) => {
                if timestamp <= existing.last_advert_timestamp {
                    debug!(sender = %sender_id, "dropped replayed advert");
                    return;
                }
                existing.last_advert_timestamp = timestamp;
                existing.last_mod = now;
                existing.node_type = node_type;
                existing.lat = lat;
                existing.lon = lon;
                existing.name = name;
                let _ = self.contact_store.update(existing).await;
            }
            None => {
                let mut contact = Contact::new(sender_id, name, now);
                contact.last_advert_timestamp = timestamp;
                contact.node_type = node_type;
                contact.lat = lat;
                contact.lon = lon;
                let _ = self.contact_store.add(contact).await;
            }
        }
    }

    async fn handle_anon_req(&self, ephemeral_public: [u8; 32], mac: u16, ciphertext: &[u8], now: u32) {
        let Some(outcome) = self.login_handler.handle(ephemeral_public, mac, ciphertext, now).await else {
            return;
        };

        let Some(contact) = self.contact_store.get_by_id(&outcome.client_id).await else {
            return;
        };
        let Ok(secret) = self.contact_store.shared_secret(&outcome.client_id).await else {
            return;
        };

        let (resp_mac, resp_ciphertext) = self.crypto.aes128_seal(&secret, &outcome.response.encode());
        self.send_payload(&contact, resp_mac, resp_ciphertext).await;
    }

    async fn handle_addressed(
        &self,
        subtype: AddressedSubtype,
        src_hash: u8,
        mac: u16,
        ciphertext: &[u8],
        via_flood: bool,
        now: u32,
    ) {
        let candidates = self.contact_store.search_by_hash(src_hash).await;
        if candidates.is_empty() {
            debug!(src_hash, "no contact candidates for hash prefix");
            return;
        }

        for candidate in candidates.into_iter().take(self.max_search_results) {
            let Ok(secret) = self.contact_store.shared_secret(&candidate.id).await else {
                continue;
            };
            let Ok(plaintext) = self.crypto.aes128_open(&secret, mac, ciphertext) else {
                continue;
            };

            self.connection_manager.touch(candidate.id).await;

            match subtype {
                AddressedSubtype::Path => self.handle_path(&candidate, &plaintext).await,
                AddressedSubtype::TxtMsg => {
                    self.handle_txt_msg(&candidate, &plaintext, via_flood, &secret, now).await;
                }
                AddressedSubtype::Req => {
                    self.handle_req(&candidate, &plaintext, via_flood, &secret, now).await;
                }
            }
            return;
        }

        debug!(src_hash, "no candidate decrypted this addressed payload");
    }

    async fn handle_path(&self, candidate: &Contact, plaintext: &[u8]) {
        let Some(path_content) = PathContent::parse(plaintext) else {
            return;
        };
        let mut updated = candidate.clone();
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        {
            updated.out_path_len = path_content.path.len() as i8;
        }
        updated.out_path = path_content.path;
        let _ = self.contact_store.update(updated).await;

        const EXTRA_TYPE_ACK: u8 = 1;
        if path_content.extra_type == EXTRA_TYPE_ACK && path_content.extra.len() == 4 {
            if let Ok(hash_bytes) = path_content.extra[..4].try_into() {
                let hash = u32::from_le_bytes(hash_bytes);
                self.ack_tracker.resolve(hash).await;
            }
        }
    }

    async fn handle_txt_msg(
        &self,
        candidate: &Contact,
        plaintext: &[u8],
        via_flood: bool,
        secret: &[u8; 32],
        now: u32,
    ) {
        let Some(mut client) = self.client_store.get(&candidate.id).await else {
            debug!(sender = %candidate.id, "dropped TXT_MSG from unknown client");
            return;
        };
        client.last_activity = now;

        let Some(content) = TxtMsgContent::parse(plaintext) else {
            let _ = self.client_store.update(client).await;
            return;
        };

        if content.timestamp <= client.last_timestamp {
            debug!(sender = %candidate.id, "dropped replayed text message");
            let _ = self.client_store.update(client).await;
            return;
        }
        client.last_timestamp = content.timestamp;
        client.push_failures = 0;

        let header_len = TxtMsgContent::header_len(content.txt_type);
        let trimmed = TxtMsgContent::trim_padding(plaintext, header_len).to_vec();

        match content.txt_type {
            TxtType::Plain | TxtType::PlainSigned => {
                if !client.role().can_write() {
                    debug!(sender = %candidate.id, role = ?client.role(), "dropped post: insufficient permission");
                    let _ = self.client_store.update(client).await;
                    return;
                }
                let _ = self.client_store.update(client).await;

                self.post_store.add(candidate.id, trimmed.clone()).await;
                let hash = self.crypto.ack_hash(&trimmed, candidate.id.as_bytes());
                let (mac, ciphertext) = self.crypto.aes128_seal(secret, &hash.to_le_bytes());
                self.send_payload(candidate, mac, ciphertext).await;
            }
            TxtType::Cli => {
                if !client.role().is_admin() {
                    debug!(sender = %candidate.id, "dropped CLI command: not admin");
                    let _ = self.client_store.update(client).await;
                    return;
                }
                let _ = self.client_store.update(client).await;

                let command = String::from_utf8_lossy(&content.message).into_owned();
                let reply = self.cli_handler.handle(&command).await;
                let reply_content = TxtMsgContent {
                    timestamp: now,
                    txt_type: TxtType::Cli,
                    flags: 0,
                    message: reply.into_bytes(),
                };
                let (mac, ciphertext) = self.crypto.aes128_seal(secret, &reply_content.encode());
                self.send_response(candidate, via_flood, mac, ciphertext).await;
            }
        }
    }

    async fn handle_req(&self, candidate: &Contact, plaintext: &[u8], via_flood: bool, secret: &[u8; 32], now: u32) {
        let Some(mut client) = self.client_store.get(&candidate.id).await else {
            debug!(sender = %candidate.id, "dropped REQ from unknown client");
            return;
        };
        client.last_activity = now;

        let Some(content) = RequestContent::parse(plaintext) else {
            let _ = self.client_store.update(client).await;
            return;
        };

        let reply = self
            .request_handler
            .handle(&client, &content, candidate.id.as_bytes())
            .await;
        let _ = self.client_store.update(client).await;

        match reply {
            ReplyPayload::Drop => {}
            ReplyPayload::Ack(hash) => {
                let (mac, ciphertext) = self.crypto.aes128_seal(secret, &hash.to_le_bytes());
                self.send_payload(candidate, mac, ciphertext).await;
            }
            ReplyPayload::Response(bytes) => {
                let (mac, ciphertext) = self.crypto.aes128_seal(secret, &bytes);
                self.send_response(candidate, via_flood, mac, ciphertext).await;
            }
        }
    }

    /// Bare direct/flood send based on the contact's known path (used for
    /// login responses and post ACKs, which are not path-return replies).
    async fn send_payload(&self, contact: &Contact, mac: u16, ciphertext: Vec<u8>) {
        let mut payload = Vec::with_capacity(2 + ciphertext.len());
        payload.extend_from_slice(&mac.to_be_bytes());
        payload.extend_from_slice(&ciphertext);

        if contact.out_path_len >= 0 {
            self.router
                .send_direct(contact.id, contact.out_path.clone(), payload)
                .await;
        } else {
            self.router.send_flood(contact.id, payload).await;
        }
    }

    /// Response-routing rule for request/CLI replies: a request that arrived
    /// via flood gets a path-return response carrying the reversed relay
    /// path; otherwise it follows the same direct/flood rule as a bare send.
    async fn send_response(&self, contact: &Contact, via_flood: bool, mac: u16, ciphertext: Vec<u8>) {
        let mut inner = Vec::with_capacity(2 + ciphertext.len());
        inner.extend_from_slice(&mac.to_be_bytes());
        inner.extend_from_slice(&ciphertext);

        if via_flood {
            let reversed = PathContent::reversed_path(&contact.out_path);
            let path_content = PathContent {
                path: reversed.clone(),
                extra_type: 0,
                extra: inner,
            };
            self.router
                .send_flood_with_path(contact.id, reversed, path_content.encode())
                .await;
        } else if contact.out_path_len >= 0 {
            self.router.send_direct(contact.id, contact.out_path.clone(), inner).await;
        } else {
            self.router.send_flood(contact.id, inner).await;
        }
    }
}
