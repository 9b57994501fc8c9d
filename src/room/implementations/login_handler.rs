//! `ANON_REQ` login processing
//!
//! Decrypts the anonymous request, resolves the requested role against the
//! configured admin/guest passwords (or the open-room fallback), and upserts
//! the resulting session. Silent failures (replay, bad credentials, full
//! store) are logged and produce no response, per the drop-on-anomaly error
//! policy used throughout this core.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{AnonReqPlaintext, LoginResponse, LoginCode};
use crate::node_id::NodeId;
use crate::room::domain_types::{AddOutcome, Client, Contact, Role};
use crate::room::traits::{ClientStore, ContactStore, Crypto};

/// Outcome of handling one `ANON_REQ`, used by callers (typically the
/// dispatcher) to decide how to route the response.
#[derive(Debug)]
pub struct LoginOutcome {
    /// The 13-byte plaintext to encrypt and send back to the client.
    pub response: LoginResponse,
    /// The client's resolved identity, for routing purposes.
    pub client_id: NodeId,
}

/// Password rules and collaborators needed to resolve an `ANON_REQ`.
#[derive(Debug)]
pub struct LoginHandler {
    contact_store: Arc<dyn ContactStore>,
    client_store: Arc<dyn ClientStore>,
    crypto: Arc<dyn Crypto>,
    our_secret_x25519: [u8; 32],
    admin_password: Option<String>,
    guest_password: Option<String>,
    allow_read_only: bool,
}

impl LoginHandler {
    /// Build a login handler bound to the given stores, crypto provider, and
    /// password policy.
    #[must_use]
    pub fn new(
        contact_store: Arc<dyn ContactStore>,
        client_store: Arc<dyn ClientStore>,
        crypto: Arc<dyn Crypto>,
        our_secret_x25519: [u8; 32],
        admin_password: Option<String>,
        guest_password: Option<String>,
        allow_read_only: bool,
    ) -> Self {
        Self {
            contact_store,
            client_store,
            crypto,
            our_secret_x25519,
            admin_password,
            guest_password,
            allow_read_only,
        }
    }

    fn resolve_role(&self, existing: Option<&Client>, password: &str) -> Option<Role> {
        if let Some(existing) = existing {
            if password.is_empty() {
                return Some(existing.role());
            }
        }
        if self.admin_password.as_deref() == Some(password) && !password.is_empty() {
            return Some(Role::Admin);
        }
        if self.guest_password.as_deref() == Some(password) && !password.is_empty() {
            return Some(Role::ReadWrite);
        }
        if self.allow_read_only {
            return Some(Role::ReadOnly);
        }
        None
    }

    /// Decrypt and process one `ANON_REQ`. Returns `None` on any silent drop
    /// (parse failure, replay, bad credentials, full client store).
    pub async fn handle(
        &self,
        ephemeral_public: [u8; 32],
        mac: u16,
        ciphertext: &[u8],
        now: u32,
    ) -> Option<LoginOutcome> {
        let plaintext = self
            .crypto
            .anon_open(&self.our_secret_x25519, &ephemeral_public, mac, ciphertext)
            .ok()?;
        let parsed = AnonReqPlaintext::parse(&plaintext)?;
        let client_id = NodeId::from_bytes(ephemeral_public);
        let existing = self.client_store.get(&client_id).await;

        if let Some(existing) = &existing {
            if parsed.timestamp <= existing.last_timestamp {
                debug!(client = %client_id, "dropped replayed login");
                return None;
            }
        }

        let role = self.resolve_role(existing.as_ref(), &parsed.password)?;
        let base_permissions = existing.as_ref().map_or(0, |c| c.permissions);

        let client = Client {
            id: client_id,
            name: existing.as_ref().map_or_else(String::new, |c| c.name.clone()),
            permissions: role.to_permissions_byte(base_permissions),
            out_path_len: existing.as_ref().map_or(-1, |c| c.out_path_len),
            out_path: existing.as_ref().map_or_else(Vec::new, |c| c.out_path.clone()),
            last_timestamp: parsed.timestamp,
            last_activity: now,
            sync_since: parsed.sync_since,
            push_post_timestamp: existing.as_ref().map_or(0, |c| c.push_post_timestamp),
            push_failures: 0,
        };

        match self.client_store.add(client.clone()).await {
            Ok(AddOutcome::Inserted | AddOutcome::Updated | AddOutcome::Evicted) => {}
            Err(e) => {
                warn!(client = %client_id, error = %e, "login rejected: client store unavailable");
                return None;
            }
        }

        if self.contact_store.get_by_id(&client_id).await.is_none() {
            let _ = self
                .contact_store
                .add(Contact::new(client_id, client.name.clone(), now))
                .await;
        }

        let admin_flag = match role {
            Role::Admin => 1,
            Role::Guest | Role::ReadOnly => 2,
            Role::ReadWrite => 0,
        };

        Some(LoginOutcome {
            response: LoginResponse {
                tag: now,
                code: LoginCode::Ok,
                admin_flag,
                permissions: client.permissions,
            },
            client_id,
        })
    }
}
