//! An in-memory [`SettingsStore`] for the CLI `get`/`set` commands.

use dashmap::DashMap;

use crate::room::traits::{SettingsError, SettingsStore};

/// Recognized setting keys that the store itself persists. `public.key` and
/// `role` are also valid `get` targets but are derived, read-only values
/// handled by `CliHandler` directly rather than stored here.
const KNOWN_KEYS: &[&str] = &[
    "name",
    "lat",
    "lon",
    "freq",
    "bw",
    "sf",
    "cr",
    "radio",
    "guest.password",
    "allow.read.only",
];

/// A `DashMap`-backed settings store with no persistence: values reset on restart.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: DashMap<String, String>,
}

impl InMemorySettingsStore {
    /// An empty store; `get` returns `None` until a value is `set`.
    #[must_use]
    pub fn new() -> Self {
        Self { values: DashMap::new() }
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        if !KNOWN_KEYS.contains(&key) {
            return Err(SettingsError::UnknownKey(key.to_string()));
        }
        if key == "allow.read.only" && value != "on" && value != "off" {
            return Err(SettingsError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_rejected() {
        let store = InMemorySettingsStore::new();
        assert!(matches!(store.set("bogus", "x"), Err(SettingsError::UnknownKey(_))));
    }

    #[test]
    fn known_key_roundtrips() {
        let store = InMemorySettingsStore::new();
        store.set("name", "room1").unwrap();
        assert_eq!(store.get("name").as_deref(), Some("room1"));
    }

    #[test]
    fn every_cli_contract_key_is_settable() {
        let store = InMemorySettingsStore::new();
        for key in KNOWN_KEYS {
            let value = if *key == "allow.read.only" { "on" } else { "1" };
            store.set(key, value).unwrap();
            assert_eq!(store.get(key).as_deref(), Some(value));
        }
    }

    #[test]
    fn allow_read_only_rejects_non_boolean_values() {
        let store = InMemorySettingsStore::new();
        assert!(matches!(
            store.set("allow.read.only", "maybe"),
            Err(SettingsError::InvalidValue { .. })
        ));
        store.set("allow.read.only", "off").unwrap();
        assert_eq!(store.get("allow.read.only").as_deref(), Some("off"));
    }
}
