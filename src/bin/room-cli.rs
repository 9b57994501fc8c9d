//! Room server host CLI
//!
//! Argument parsing for the host binary (bind address, config file, log
//! verbosity). This is distinct from the in-protocol CLI command language
//! the room server interprets over the mesh itself; that one is text-based
//! and lives in `room::implementations::cli_handler`.

use clap::Parser;

/// Host-level arguments for running a meshcore room server.
#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Transport bind address stand-in; the real transport is out of scope
    /// for this core and is wired in by the embedding application.
    #[arg(long, default_value = "0.0.0.0:0")]
    bind: String,

    /// Path to a configuration file (unused placeholder; production config
    /// currently comes from `RoomConfig::production()`).
    #[arg(long)]
    config: Option<String>,

    /// Log verbosity, forwarded to `RUST_LOG` if that's unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    if std::env::var("RUST_LOG").is_err() {
        // SAFETY: single-threaded at this point, before any logging or async runtime starts.
        unsafe { std::env::set_var("RUST_LOG", &args.log_level) };
    }
    println!("room-cli: bind={} config={:?} log_level={}", args.bind, args.config, args.log_level);
}
