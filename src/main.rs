//! MeshCore room server - binary entry point
//!
//! Wires a [`RoomServer`] together from protocol defaults, starts its
//! background loops, and runs until interrupted. The transport that would
//! feed packets into [`RoomServer::dispatcher`] and carry its outbound calls
//! is out of scope for this core; this binary stands in a logging router so
//! the process is runnable and observable on its own.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use meshcore_room::node_id::NodeId;
use meshcore_room::room::config::RoomConfig;
use meshcore_room::room::implementations::{
    DefaultCrypto, DisconnectCallback, InMemorySettingsStore,
};
use meshcore_room::room::server::{RoomServer, RoomServerDeps};
use meshcore_room::room::traits::PacketRouter;
use meshcore_room::time_provider::production_time_provider;
use tracing::{info, warn};
use x25519_dalek::{PublicKey, StaticSecret};

/// Stands in for a real mesh transport: logs what would have been sent.
#[derive(Debug, Default)]
struct LoggingRouter;

#[async_trait]
impl PacketRouter for LoggingRouter {
    async fn send_direct(&self, dest: NodeId, path: Vec<u8>, payload: Vec<u8>) {
        info!(%dest, path_len = path.len(), payload_len = payload.len(), "send_direct");
    }

    async fn send_flood(&self, dest: NodeId, payload: Vec<u8>) {
        info!(%dest, payload_len = payload.len(), "send_flood");
    }

    async fn send_flood_with_path(&self, dest: NodeId, path: Vec<u8>, payload: Vec<u8>) {
        info!(%dest, path_len = path.len(), payload_len = payload.len(), "send_flood_with_path");
    }
}

#[derive(Debug, Default)]
struct LoggingDisconnect;

impl DisconnectCallback for LoggingDisconnect {
    fn on_disconnect(&self, id: NodeId) {
        info!(%id, "client connection timed out");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("meshcore_room=info".parse()?),
        )
        .init();

    info!("starting meshcore room server");

    let config = RoomConfig::production();
    info!(
        contact_capacity = config.contact_capacity.into_inner(),
        client_capacity = config.client_capacity.into_inner(),
        post_capacity = config.post_capacity.into_inner(),
        "configuration loaded"
    );

    warn!("generating an ephemeral node identity; production deployments must persist this key");
    let our_secret = StaticSecret::random_from_rng(rand_core::OsRng);
    let our_public = PublicKey::from(&our_secret);
    info!(public_key = hex::encode(our_public.as_bytes()), "node identity");

    let deps = RoomServerDeps {
        crypto: Arc::new(DefaultCrypto::default()),
        router: Arc::new(LoggingRouter),
        our_secret_x25519: our_secret.to_bytes(),
        settings: Arc::new(InMemorySettingsStore::new()),
        time: production_time_provider(),
        stats_provider: None,
        telemetry_provider: None,
        cli_delegate: None,
        version: env!("CARGO_PKG_VERSION").to_string(),
        on_disconnect: Arc::new(LoggingDisconnect),
    };

    let server = Arc::new(RoomServer::new(config, deps));

    let run_handle = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.start().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    server.stop();
    run_handle.await?;

    info!("meshcore room server shut down gracefully");
    Ok(())
}
