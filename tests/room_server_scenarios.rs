//! End-to-end scenarios over a fully-wired `RoomServer`.
//!
//! Exercises login, replay rejection, ACL-gated posting, the post-store
//! ring, and round-robin sync purely through `Dispatcher::handle_packet`
//! and `SyncLoop::tick` - no real transport, just a `RecordingRouter`.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ed25519_dalek::SigningKey;
    use meshcore_room::node_id::NodeId;
    use meshcore_room::room::config::RoomConfig;
    use meshcore_room::room::domain_types::{PostCapacity, Role};
    use meshcore_room::room::implementations::{
        DefaultCrypto, DisconnectCallback, InMemorySettingsStore, PacketKind, RecordingRouter, SentPacket,
    };
    use meshcore_room::room::server::{RoomServer, RoomServerDeps};
    use meshcore_room::room::traits::{ClientStore, ContactStore, Crypto, PostStore};
    use meshcore_room::time_provider::test_time_provider;
    use rand_core::OsRng;
    use sha2::{Digest, Sha512};
    use x25519_dalek::{PublicKey, StaticSecret};

    #[derive(Debug, Default)]
    struct NoopDisconnect;

    impl DisconnectCallback for NoopDisconnect {
        fn on_disconnect(&self, _id: NodeId) {}
    }

    /// A simulated client identity: an Ed25519 keypair whose public key
    /// doubles as the `NodeId` the room server will know it by, plus the
    /// birationally-equivalent X25519 secret used for the session ECDH
    /// (the same seed-to-scalar conversion libsodium uses to derive an
    /// X25519 key from an Ed25519 one).
    struct TestClient {
        node_id: NodeId,
        x25519_secret: StaticSecret,
    }

    fn test_client() -> TestClient {
        let signing_key = SigningKey::generate(&mut OsRng);
        let node_id = NodeId::from_bytes(signing_key.verifying_key().to_bytes());

        let mut hasher = Sha512::new();
        hasher.update(signing_key.to_bytes());
        let digest = hasher.finalize();
        let mut scalar_bytes = [0u8; 32];
        scalar_bytes.copy_from_slice(&digest[..32]);

        TestClient {
            node_id,
            x25519_secret: StaticSecret::from(scalar_bytes),
        }
    }

    fn anon_req_plaintext(timestamp: u32, sync_since: u32, password: &str) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&timestamp.to_le_bytes());
        bytes.extend_from_slice(&sync_since.to_le_bytes());
        bytes.extend_from_slice(password.as_bytes());
        bytes.push(0);
        bytes
    }

    /// Build a test harness with development-tuned capacities, a real
    /// `DefaultCrypto`, and a router/disconnect pair that just records calls.
    fn harness() -> (RoomServer, Arc<RecordingRouter>, PublicKey) {
        let our_secret = StaticSecret::from([9u8; 32]);
        let our_public = PublicKey::from(&our_secret);
        let router = Arc::new(RecordingRouter::new());

        let deps = RoomServerDeps {
            crypto: Arc::new(DefaultCrypto::new()),
            router: router.clone(),
            our_secret_x25519: our_secret.to_bytes(),
            settings: Arc::new(InMemorySettingsStore::new()),
            time: test_time_provider(),
            stats_provider: None,
            telemetry_provider: None,
            cli_delegate: None,
            version: "test".to_string(),
            on_disconnect: Arc::new(NoopDisconnect),
        };

        (RoomServer::new(RoomConfig::development(), deps), router, our_public)
    }

    /// Encrypt an `ANON_REQ` the way a real client would: derive the session
    /// secret via ECDH with the server's static public key, seal the
    /// plaintext, and hand back the packet the dispatcher expects.
    fn login_packet(client: &TestClient, server_public: &PublicKey, crypto: &DefaultCrypto, plaintext: &[u8]) -> PacketKind {
        let shared = client.x25519_secret.diffie_hellman(server_public);
        let (mac, ciphertext) = crypto.aes128_seal(shared.as_bytes(), plaintext);
        PacketKind::AnonReq {
            ephemeral_public: *client.node_id.as_bytes(),
            mac,
            ciphertext,
        }
    }

    #[tokio::test]
    async fn admin_login_creates_one_session_and_one_response() {
        let (server, router, server_public) = harness();
        let crypto = DefaultCrypto::new();
        let client = test_client();
        let now = server.clock().now();

        let packet = login_packet(
            &client,
            &server_public,
            &crypto,
            &anon_req_plaintext(100, 0, "admin123"),
        );
        server.dispatcher().handle_packet(packet, now).await;

        assert_eq!(server.client_store().count().await, 1);
        let stored = server.client_store().get(&client.node_id).await.unwrap();
        assert_eq!(stored.role(), Role::Admin);
        assert_eq!(router.sent().len(), 1);
    }

    #[tokio::test]
    async fn replayed_login_is_dropped() {
        let (server, router, server_public) = harness();
        let crypto = DefaultCrypto::new();
        let client = test_client();
        let now = server.clock().now();

        let first = login_packet(
            &client,
            &server_public,
            &crypto,
            &anon_req_plaintext(100, 0, "admin123"),
        );
        server.dispatcher().handle_packet(first, now).await;
        assert_eq!(router.sent().len(), 1);

        let replay = login_packet(
            &client,
            &server_public,
            &crypto,
            &anon_req_plaintext(100, 0, "admin123"),
        );
        server.dispatcher().handle_packet(replay, now).await;

        assert_eq!(server.client_store().count().await, 1);
        assert_eq!(router.sent().len(), 1, "replayed login must not emit a second response");
    }

    async fn log_in(server: &RoomServer, server_public: &PublicKey, crypto: &DefaultCrypto, client: &TestClient, password: &str) {
        let now = server.clock().now();
        let packet = login_packet(client, server_public, crypto, &anon_req_plaintext(now, 0, password));
        server.dispatcher().handle_packet(packet, now).await;
    }

    fn txt_msg_packet(plaintext: &[u8], crypto: &DefaultCrypto, secret: &[u8; 32], src_hash: u8) -> PacketKind {
        let (mac, ciphertext) = crypto.aes128_seal(secret, plaintext);
        PacketKind::Addressed {
            subtype: meshcore_room::room::implementations::AddressedSubtype::TxtMsg,
            src_hash,
            mac,
            ciphertext,
            via_flood: false,
        }
    }

    #[tokio::test]
    async fn read_only_post_is_dropped_without_storage() {
        let (server, router, server_public) = harness();
        let crypto = DefaultCrypto::new();
        let client = test_client();

        // `RoomConfig::development()` allows an unauthenticated login to fall
        // back to `ReadOnly` rather than being refused outright; that role
        // still can't write, which is what this scenario exercises.
        log_in(&server, &server_public, &crypto, &client, "").await;
        assert_eq!(
            server.client_store().get(&client.node_id).await.unwrap().role(),
            Role::ReadOnly
        );
        let after_login = router.sent().len();

        let shared = server.contact_store().shared_secret(&client.node_id).await.unwrap();
        let mut content = Vec::new();
        content.extend_from_slice(&200u32.to_le_bytes());
        content.push(0); // Plain
        content.extend_from_slice(b"hello room");
        let packet = txt_msg_packet(&content, &crypto, &shared, client.node_id.hash());

        server.dispatcher().handle_packet(packet, server.clock().now()).await;

        assert_eq!(server.post_store().count().await, 0);
        assert_eq!(router.sent().len(), after_login, "a read-only client's post must not be acknowledged");
    }

    #[tokio::test]
    async fn readwrite_post_is_stored_and_acked() {
        let (server, router, server_public) = harness();
        let crypto = DefaultCrypto::new();
        let client = test_client();

        log_in(&server, &server_public, &crypto, &client, "guest123").await;
        assert_eq!(
            server.client_store().get(&client.node_id).await.unwrap().role(),
            Role::ReadWrite
        );
        let after_login = router.sent().len();

        let shared = server.contact_store().shared_secret(&client.node_id).await.unwrap();
        let mut content = Vec::new();
        content.extend_from_slice(&200u32.to_le_bytes());
        content.push(0); // Plain
        content.extend_from_slice(b"hello room");
        let packet = txt_msg_packet(&content, &crypto, &shared, client.node_id.hash());

        server.dispatcher().handle_packet(packet, server.clock().now()).await;

        assert_eq!(server.post_store().count().await, 1);
        let sent = router.sent();
        assert_eq!(sent.len(), after_login + 1, "a writable post must be acknowledged exactly once");
        assert!(matches!(sent.last(), Some(SentPacket::Flood { .. })));
    }

    #[tokio::test]
    async fn post_store_ring_overwrites_oldest() {
        let clock = meshcore_room::clock::UniqueClock::shared(test_time_provider());
        let store = meshcore_room::room::implementations::InMemoryPostStore::new(
            PostCapacity::try_new(3).unwrap(),
            clock,
        );
        let sender = NodeId::from_bytes([4; 32]);
        let mut timestamps = Vec::new();
        for i in 0..5u8 {
            timestamps.push(store.add(sender, vec![i]).await);
        }

        assert_eq!(store.count().await, 3);
        let remaining = store.get_since(0).await;
        assert_eq!(remaining.len(), 3);
        assert_eq!(remaining[0].timestamp, timestamps[2]);
        assert_eq!(remaining.last().unwrap().timestamp, timestamps[4]);
    }

    /// Harness variant with a one-second post-sync delay, short enough to
    /// wait out for real without relying on a mockable wall clock.
    fn harness_with_fast_sync() -> (RoomServer, Arc<RecordingRouter>, PublicKey) {
        let our_secret = StaticSecret::from([9u8; 32]);
        let our_public = PublicKey::from(&our_secret);
        let router = Arc::new(RecordingRouter::new());

        let mut config = RoomConfig::development();
        config.post_sync_delay = meshcore_room::room::domain_types::PostSyncDelaySecs::try_new(1).unwrap();

        let deps = RoomServerDeps {
            crypto: Arc::new(DefaultCrypto::new()),
            router: router.clone(),
            our_secret_x25519: our_secret.to_bytes(),
            settings: Arc::new(InMemorySettingsStore::new()),
            time: test_time_provider(),
            stats_provider: None,
            telemetry_provider: None,
            cli_delegate: None,
            version: "test".to_string(),
            on_disconnect: Arc::new(NoopDisconnect),
        };

        (RoomServer::new(config, deps), router, our_public)
    }

    #[tokio::test]
    async fn sync_loop_pushes_one_post_to_the_other_logged_in_client() {
        let (server, router, server_public) = harness_with_fast_sync();
        let crypto = DefaultCrypto::new();
        let poster = test_client();
        let reader = test_client();

        log_in(&server, &server_public, &crypto, &poster, "guest123").await;
        log_in(&server, &server_public, &crypto, &reader, "guest123").await;

        let poster_shared = server.contact_store().shared_secret(&poster.node_id).await.unwrap();
        let mut content = Vec::new();
        content.extend_from_slice(&server.clock().now().to_le_bytes());
        content.push(0);
        content.extend_from_slice(b"hello reader");
        let packet = txt_msg_packet(&content, &crypto, &poster_shared, poster.node_id.hash());
        server.dispatcher().handle_packet(packet, server.clock().now()).await;
        assert_eq!(server.post_store().count().await, 1);

        let before_sync = router.sent().len();

        // The post store's minimum age gate means an immediate tick pushes
        // nothing; waiting out the one-second delay configured above makes
        // the post eligible.
        server.sync_loop().tick(server.clock().now()).await;
        assert_eq!(router.sent().len(), before_sync, "a fresh post must not be pushed before its sync delay elapses");

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        server.sync_loop().tick(server.clock().now()).await;

        let sent = router.sent();
        assert_eq!(sent.len(), before_sync + 1, "exactly one post push must be sent once eligible");
        match sent.last().unwrap() {
            SentPacket::Flood { dest, .. } => assert_eq!(*dest, reader.node_id),
            other => panic!("expected a flooded push to the reader, got {other:?}"),
        }
    }
}
