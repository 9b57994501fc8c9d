//! Admin text-CLI command interpreter
//!
//! Commands arrive as a UTF-8 string, optionally prefixed by a 3-character
//! companion tag (`"NN|"`) that correlating client software expects echoed
//! back verbatim on the reply.

use std::sync::Arc;

use crate::room::traits::{ClientStore, SettingsStore, StatsProvider};
use crate::time_provider::SharedTimeProvider;

/// Optional fallback for commands this handler doesn't recognize itself.
pub trait DelegateHandler: Send + Sync + std::fmt::Debug {
    /// Handle an unrecognized command, returning its reply text if handled.
    fn handle(&self, command: &str) -> Option<String>;
}

/// `role` always reports this node type to CLI clients; the room server
/// never presents itself as a companion or repeater node.
const ROOM_SERVER_ROLE: &str = "room_server";

/// Interprets the in-protocol CLI command language.
#[derive(Debug)]
pub struct CliHandler {
    settings: Arc<dyn SettingsStore>,
    stats_provider: Option<Arc<dyn StatsProvider>>,
    client_store: Arc<dyn ClientStore>,
    time: SharedTimeProvider,
    version: String,
    delegate: Option<Arc<dyn DelegateHandler>>,
    own_public_key_hex: String,
}

impl CliHandler {
    /// Build a CLI handler over the given settings store and collaborators.
    /// `own_public_key_hex` backs the read-only `get public.key` command.
    #[must_use]
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        stats_provider: Option<Arc<dyn StatsProvider>>,
        client_store: Arc<dyn ClientStore>,
        time: SharedTimeProvider,
        version: String,
        delegate: Option<Arc<dyn DelegateHandler>>,
        own_public_key_hex: String,
    ) -> Self {
        Self {
            settings,
            stats_provider,
            client_store,
            time,
            version,
            delegate,
            own_public_key_hex,
        }
    }

    /// Tolerate a Unicode minus (U+2212) in numeric CLI arguments.
    fn normalize_numeric(token: &str) -> String {
        token.replace('\u{2212}', "-")
    }

    /// Evaluate one command line, returning the full reply (with companion
    /// prefix restored, if one was present).
    pub async fn handle(&self, command: &str) -> String {
        let (prefix, rest) = if command.len() >= 3 && command.as_bytes()[2] == b'|' {
            (&command[..3], command[3..].trim())
        } else {
            ("", command.trim())
        };

        let reply = self.evaluate(rest).await;
        format!("{prefix}{reply}")
    }

    async fn evaluate(&self, rest: &str) -> String {
        let mut tokens = rest.split_whitespace();
        match tokens.next() {
            Some("ver") => self.version.clone(),
            Some("clock") => match tokens.next() {
                Some("sync") => "OK".to_string(),
                _ => self.format_clock(),
            },
            Some("get") => {
                let Some(key) = tokens.next() else {
                    return "??: ".to_string();
                };
                match key {
                    "public.key" => self.own_public_key_hex.clone(),
                    "role" => ROOM_SERVER_ROLE.to_string(),
                    _ => self.settings.get(key).unwrap_or_else(|| format!("??: {key}")),
                }
            }
            Some("set") => {
                let Some(key) = tokens.next() else {
                    return "Error: missing key".to_string();
                };
                if key == "public.key" || key == "role" {
                    return format!("Error: {key} is read-only");
                }
                let value: Vec<String> = tokens.map(Self::normalize_numeric).collect();
                let value = value.join(" ");
                match self.settings.set(key, &value) {
                    Ok(()) => "OK".to_string(),
                    Err(e) => format!("Error: {e}"),
                }
            }
            Some("setperm") => self.setperm(tokens.next(), tokens.next()).await,
            Some("clear") => {
                if tokens.next() == Some("stats") {
                    if let Some(provider) = &self.stats_provider {
                        provider.reset();
                    }
                    "OK".to_string()
                } else {
                    "Unknown command".to_string()
                }
            }
            Some(_) => self
                .delegate
                .as_ref()
                .and_then(|d| d.handle(rest))
                .unwrap_or_else(|| "Unknown command".to_string()),
            None => "Unknown command".to_string(),
        }
    }

    async fn setperm(&self, prefix: Option<&str>, value: Option<&str>) -> String {
        let (Some(prefix), Some(value)) = (prefix, value) else {
            return "ERR: usage: setperm <pubkey-prefix> <n>".to_string();
        };
        let Ok(n) = Self::normalize_numeric(value).parse::<u8>() else {
            return format!("ERR: invalid permission value: {value}");
        };
        let Ok(prefix_bytes) = hex::decode(prefix) else {
            return format!("ERR: invalid hex prefix: {prefix}");
        };

        let clients = self.client_store.snapshot().await;
        let Some(mut target) = clients
            .into_iter()
            .find(|c| c.id.matches_prefix(&prefix_bytes))
        else {
            return format!("ERR: no client matching {prefix}");
        };
        target.permissions = n;
        match self.client_store.update(target).await {
            Ok(()) => "OK".to_string(),
            Err(e) => format!("ERR: {e}"),
        }
    }

    fn format_clock(&self) -> String {
        use std::time::UNIX_EPOCH;
        let secs = self
            .time
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let (h, m, day, month, year) = civil_from_unix(secs);
        format!("{h:02}:{m:02} - {day:02}/{month:02}/{year:04} UTC")
    }
}

/// Break a Unix timestamp down into UTC hour/minute/day/month/year, using
/// Howard Hinnant's days-from-civil algorithm for the date portion.
fn civil_from_unix(secs: u64) -> (u64, u64, u64, u64, i64) {
    let days = (secs / 86400) as i64;
    let rem = secs % 86400;
    let (hour, minute) = (rem / 3600, (rem % 3600) / 60);

    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    (hour, minute, day, month, year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::domain_types::ClientCapacity;
    use crate::room::implementations::{InMemoryClientStore, InMemorySettingsStore};
    use crate::time_provider::test_time_provider;

    fn handler() -> CliHandler {
        CliHandler::new(
            Arc::new(InMemorySettingsStore::new()),
            None,
            Arc::new(InMemoryClientStore::new(ClientCapacity::try_new(4).unwrap())),
            test_time_provider(),
            "test".to_string(),
            None,
            "deadbeef".to_string(),
        )
    }

    #[tokio::test]
    async fn get_public_key_reports_own_identity() {
        let cli = handler();
        assert_eq!(cli.handle("get public.key").await, "deadbeef");
    }

    #[tokio::test]
    async fn get_role_reports_room_server() {
        let cli = handler();
        assert_eq!(cli.handle("get role").await, "room_server");
    }

    #[tokio::test]
    async fn set_public_key_and_role_are_rejected() {
        let cli = handler();
        assert_eq!(cli.handle("set public.key ff").await, "Error: public.key is read-only");
        assert_eq!(cli.handle("set role companion").await, "Error: role is read-only");
    }

    #[tokio::test]
    async fn known_cli_contract_keys_roundtrip_through_get_and_set() {
        let cli = handler();
        assert_eq!(cli.handle("set name lobby").await, "OK");
        assert_eq!(cli.handle("get name").await, "lobby");
        assert_eq!(cli.handle("set allow.read.only off").await, "OK");
        assert_eq!(cli.handle("get allow.read.only").await, "off");
    }

    #[tokio::test]
    async fn companion_tag_is_preserved_on_reply() {
        let cli = handler();
        assert_eq!(cli.handle("01|get role").await, "01|room_server");
    }
}
