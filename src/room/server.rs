//! Wires the room-server components together and owns their background loops
//!
//! Mirrors the way the router implementation elsewhere in this crate
//! constructs its injected components from a single config and owns their
//! lifecycle: `RoomServer::new` builds every store and handler, `start` spawns
//! the three periodic loops (sync, ack sweep, connection sweep) and blocks
//! until `stop` is called or the returned handle is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, instrument};

use crate::clock::UniqueClock;
use crate::room::config::RoomConfig;
use crate::room::implementations::{
    CliHandler, DelegateHandler, Dispatcher, DisconnectCallback, InMemoryAckTracker, InMemoryClientStore,
    InMemoryConnectionManager, InMemoryContactStore, LoginHandler, RequestHandler, SyncLoop,
};
use crate::room::traits::{Crypto, PacketRouter, SettingsStore, StatsProvider, TelemetryProvider};
use crate::time_provider::SharedTimeProvider;

/// Everything a caller must supply that isn't derivable from [`RoomConfig`]
/// alone: the pluggable external collaborators.
pub struct RoomServerDeps {
    /// Cryptography provider.
    pub crypto: Arc<dyn Crypto>,
    /// Outbound packet router.
    pub router: Arc<dyn PacketRouter>,
    /// This node's static X25519 secret key.
    pub our_secret_x25519: [u8; 32],
    /// Free-form settings backing store for the CLI `get`/`set` commands.
    pub settings: Arc<dyn SettingsStore>,
    /// Time source driving all periodic loops and timestamps.
    pub time: SharedTimeProvider,
    /// Optional server-statistics provider for `GetStatus`.
    pub stats_provider: Option<Arc<dyn StatsProvider>>,
    /// Optional telemetry provider for `GetTelemetry`.
    pub telemetry_provider: Option<Arc<dyn TelemetryProvider>>,
    /// Optional fallback for CLI commands this core doesn't itself recognize.
    pub cli_delegate: Option<Arc<dyn DelegateHandler>>,
    /// Version string reported by the CLI `ver` command.
    pub version: String,
    /// Invoked, outside any lock, when a peer's connection times out.
    pub on_disconnect: Arc<dyn DisconnectCallback>,
}

/// The assembled room-server core, ready to dispatch packets and run its
/// background loops.
#[derive(Debug)]
pub struct RoomServer {
    config: RoomConfig,
    contact_store: Arc<InMemoryContactStore>,
    client_store: Arc<InMemoryClientStore>,
    post_store: Arc<crate::room::implementations::InMemoryPostStore>,
    ack_tracker: Arc<InMemoryAckTracker>,
    connection_manager: Arc<InMemoryConnectionManager>,
    dispatcher: Arc<Dispatcher>,
    sync_loop: Arc<SyncLoop>,
    clock: Arc<UniqueClock>,
    is_running: AtomicBool,
    stop_tx: watch::Sender<bool>,
}

impl std::fmt::Debug for RoomServerDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomServerDeps").field("version", &self.version).finish()
    }
}

impl RoomServer {
    /// Build every store and handler from `config` and `deps`. Does not
    /// start the background loops; call [`RoomServer::start`] for that.
    #[must_use]
    #[instrument(skip(deps))]
    pub fn new(config: RoomConfig, deps: RoomServerDeps) -> Self {
        let clock = UniqueClock::shared(Arc::clone(&deps.time));

        let contact_store = Arc::new(InMemoryContactStore::new(
            config.contact_capacity,
            config.max_search_results,
            config.overwrite_on_full,
            deps.our_secret_x25519,
            Arc::clone(&deps.crypto),
        ));
        let client_store = Arc::new(InMemoryClientStore::new(config.client_capacity));
        let post_store = Arc::new(crate::room::implementations::InMemoryPostStore::new(
            config.post_capacity,
            Arc::clone(&clock),
        ));
        let ack_tracker = Arc::new(InMemoryAckTracker::new(config.ack_timeout, Arc::clone(&deps.time)));
        let connection_manager = Arc::new(InMemoryConnectionManager::new(
            Duration::from_secs(config.connection_timeout_secs()),
            Arc::clone(&deps.time),
            Arc::clone(&deps.on_disconnect),
        ));

        let login_handler = Arc::new(LoginHandler::new(
            contact_store.clone() as Arc<dyn crate::room::traits::ContactStore>,
            client_store.clone() as Arc<dyn crate::room::traits::ClientStore>,
            Arc::clone(&deps.crypto),
            deps.our_secret_x25519,
            config.admin_password.clone(),
            config.guest_password.clone(),
            config.allow_read_only,
        ));
        let request_handler = Arc::new(RequestHandler::new(
            deps.stats_provider.clone(),
            deps.telemetry_provider.clone(),
            client_store.clone() as Arc<dyn crate::room::traits::ClientStore>,
            Arc::clone(&deps.crypto),
        ));
        let our_public_x25519 = x25519_dalek::PublicKey::from(&x25519_dalek::StaticSecret::from(deps.our_secret_x25519));
        let cli_handler = Arc::new(CliHandler::new(
            Arc::clone(&deps.settings),
            deps.stats_provider.clone(),
            client_store.clone() as Arc<dyn crate::room::traits::ClientStore>,
            Arc::clone(&deps.time),
            deps.version.clone(),
            deps.cli_delegate.clone(),
            hex::encode(our_public_x25519.as_bytes()),
        ));

        let dispatcher = Arc::new(Dispatcher::new(
            contact_store.clone() as Arc<dyn crate::room::traits::ContactStore>,
            client_store.clone() as Arc<dyn crate::room::traits::ClientStore>,
            post_store.clone() as Arc<dyn crate::room::traits::PostStore>,
            ack_tracker.clone() as Arc<dyn crate::room::traits::AckTracker>,
            connection_manager.clone() as Arc<dyn crate::room::traits::ConnectionManager>,
            Arc::clone(&deps.crypto),
            Arc::clone(&deps.router),
            login_handler,
            request_handler,
            cli_handler,
            config.max_search_results.into_inner(),
        ));

        let sync_loop = Arc::new(SyncLoop::new(
            client_store.clone() as Arc<dyn crate::room::traits::ClientStore>,
            contact_store.clone() as Arc<dyn crate::room::traits::ContactStore>,
            post_store.clone() as Arc<dyn crate::room::traits::PostStore>,
            ack_tracker.clone() as Arc<dyn crate::room::traits::AckTracker>,
            Arc::clone(&deps.crypto),
            Arc::clone(&deps.router),
            config.post_sync_delay,
            config.max_retries,
            config.max_push_failures,
        ));

        let (stop_tx, _stop_rx) = watch::channel(false);

        Self {
            config,
            contact_store,
            client_store,
            post_store,
            ack_tracker,
            connection_manager,
            dispatcher,
            sync_loop,
            clock,
            is_running: AtomicBool::new(false),
            stop_tx,
        }
    }

    /// The dispatcher, for handing ingress packets to.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The sync loop, for manually ticking in tests.
    #[must_use]
    pub fn sync_loop(&self) -> &Arc<SyncLoop> {
        &self.sync_loop
    }

    /// The shared monotonic clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<UniqueClock> {
        &self.clock
    }

    /// The underlying contact store, for direct inspection in tests.
    #[must_use]
    pub fn contact_store(&self) -> &Arc<InMemoryContactStore> {
        &self.contact_store
    }

    /// The underlying client store, for direct inspection in tests.
    #[must_use]
    pub fn client_store(&self) -> &Arc<InMemoryClientStore> {
        &self.client_store
    }

    /// The underlying post store, for direct inspection in tests.
    #[must_use]
    pub fn post_store(&self) -> &Arc<crate::room::implementations::InMemoryPostStore> {
        &self.post_store
    }

    /// Spawn the sync, ack-timeout, and connection-liveness background
    /// loops. Blocks until [`RoomServer::stop`] is called. Calling `start`
    /// before any call to `stop` is the normal path; calling `stop` before
    /// `start` is a documented no-op.
    pub async fn start(&self) {
        if self.is_running.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("starting room server background loops");

        let sync_handle = Arc::clone(&self.sync_loop).spawn_ticker(
            Duration::from_secs(1),
            Arc::clone(&self.clock),
            self.stop_tx.subscribe(),
        );
        let ack_handle = Arc::clone(&self.ack_tracker).spawn_ticker(Duration::from_secs(1), self.stop_tx.subscribe());
        let conn_handle =
            Arc::clone(&self.connection_manager).spawn_ticker(Duration::from_secs(1), self.stop_tx.subscribe());

        let _ = tokio::join!(sync_handle, ack_handle, conn_handle);
        self.is_running.store(false, Ordering::Release);
    }

    /// Signal all background loops to stop. A no-op if they were never started.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// The configuration this server was built with.
    #[must_use]
    pub const fn config(&self) -> &RoomConfig {
        &self.config
    }
}
