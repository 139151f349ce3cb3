//! Shared state store
//!
//! A single keyed map written by the source workers and read by the
//! compositor. Each key read and write is atomic; there is no cross-key
//! transaction, so a reader may observe `cpu_u` from one system poll and
//! `ram` from the next.
//!
//! Values are `serde_json::Value` so producers can publish scalars, lists
//! and nested records without a shared schema. Pages read through a
//! [`Snapshot`] of the keys they declare.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Key names shared between producers and pages
pub mod keys {
    // weather
    pub const TEMP: &str = "temp";
    pub const TEXT: &str = "text";
    pub const AQI: &str = "aqi";
    pub const LIFE: &str = "life";
    pub const FEELS_LIKE: &str = "feelsLike";
    pub const HUMIDITY: &str = "humidity";
    pub const WIND_SPEED: &str = "windSpeed";
    pub const WIND_DIR: &str = "windDir";
    pub const TODAY: &str = "today";
    pub const FORECAST: &str = "forecast";

    // local system
    pub const CPU_TEMP: &str = "cpu_t";
    pub const CPU_USAGE: &str = "cpu_u";
    pub const RAM: &str = "ram";
    pub const DISK: &str = "disk";
    pub const UPTIME: &str = "uptime";
    pub const IP: &str = "ip";

    // market
    pub const CRYPTO: &str = "crypto";
    pub const CRYPTO_STATUS: &str = "crypto_status";
    pub const CRYPTO_KLINES: &str = "crypto_klines";
    pub const ASSET: &str = "bybit_asset";
    pub const ASSET_VALUE: &str = "bybit_asset_value";
    pub const ASSET_HISTORY: &str = "bybit_asset_history";

    // server fleet
    pub const FLEET_CLIENTS: &str = "beszel_clients";
    pub const FLEET_STATUS: &str = "beszel_status";
    pub const FLEET_LAST_UPDATE: &str = "beszel_last_update";

    // parcel tracking
    pub const PACKAGES: &str = "tracking_packages";
    pub const TRACKING_STATUS: &str = "tracking_status";
    pub const TRACKING_LAST_UPDATE: &str = "tracking_last_update";

    // live streamers
    pub const STREAMERS: &str = "bilibili_streamers";
    pub const STREAMER_USER: &str = "bilibili_user";
    pub const STREAMERS_STATUS: &str = "bilibili_status";
    pub const STREAMERS_LAST_UPDATE: &str = "bilibili_last_update";

    // channel messages
    pub const MESSAGES: &str = "telegram_messages";
    pub const MESSAGES_STATUS: &str = "telegram_status";
    pub const MESSAGES_LAST_UPDATE: &str = "telegram_last_update";
}

/// Values present before any worker has run
pub fn default_entries() -> Vec<(&'static str, Value)> {
    use keys::*;
    vec![
        (TEMP, json!("--")),
        (TEXT, json!("...")),
        (AQI, json!("0")),
        (LIFE, json!("")),
        (FEELS_LIKE, json!("--")),
        (HUMIDITY, json!("--")),
        (WIND_SPEED, json!("--")),
        (WIND_DIR, json!("--")),
        (TODAY, json!({})),
        (FORECAST, json!([])),
        (CPU_TEMP, json!(0)),
        (CPU_USAGE, json!(0.0)),
        (RAM, json!(0)),
        (DISK, json!(0)),
        (UPTIME, json!("")),
        (IP, json!("Init...")),
        (CRYPTO, json!([])),
        (CRYPTO_STATUS, json!("Loading...")),
        (CRYPTO_KLINES, json!({})),
        (ASSET, json!("Loading...")),
        (ASSET_VALUE, json!(0.0)),
        (ASSET_HISTORY, json!([])),
        (FLEET_CLIENTS, json!([])),
        (FLEET_STATUS, json!("Loading...")),
        (FLEET_LAST_UPDATE, json!(0)),
        (PACKAGES, json!([])),
        (TRACKING_STATUS, json!("Loading...")),
        (TRACKING_LAST_UPDATE, json!(0)),
        (STREAMERS, json!([])),
        (STREAMER_USER, json!({})),
        (STREAMERS_STATUS, json!("Loading...")),
        (STREAMERS_LAST_UPDATE, json!(0)),
        (MESSAGES, json!([])),
        (MESSAGES_STATUS, json!("Loading...")),
        (MESSAGES_LAST_UPDATE, json!(0)),
    ]
}

/// Thread-safe key/value store
#[derive(Debug, Default)]
pub struct Store {
    inner: RwLock<HashMap<String, Value>>,
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with [`default_entries`]
    pub fn with_defaults() -> Self {
        let store = Self::new();
        store.update(
            default_entries()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v)),
        );
        store
    }

    // A writer that panicked mid-insert cannot leave a HashMap torn, so
    // poisoned guards are recovered.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Value for `key`, or `default` if absent
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.read().get(key).cloned().unwrap_or(default)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.write().insert(key.into(), value.into());
    }

    /// Set several keys; each key is atomic, the batch is not
    pub fn update<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in entries {
            self.write().insert(key, value);
        }
    }

    /// Numeric view of `key`; numeric strings are accepted
    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.read().get(key).and_then(value_as_f64).unwrap_or(default)
    }

    /// String view of `key`; numbers are formatted
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.read()
            .get(key)
            .and_then(value_as_string)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy the named keys into a read-only snapshot
    pub fn snapshot(&self, keys: &[&str]) -> Snapshot {
        let map = self.read();
        Snapshot {
            values: keys
                .iter()
                .filter_map(|k| map.get(*k).map(|v| (k.to_string(), v.clone())))
                .collect(),
        }
    }
}

/// Read-only copy of a subset of the store, handed to pages
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    values: HashMap<String, Value>,
}

impl Snapshot {
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn f64(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(value_as_f64).unwrap_or(default)
    }

    pub fn i64(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(value_as_f64)
            .map(|v| v.round() as i64)
            .unwrap_or(default)
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(value_as_string)
            .unwrap_or_else(|| default.to_string())
    }

    /// Deserialize `key` into `T`; malformed or absent values yield `None`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Deserialize a list, skipping elements that do not fit `T`
    pub fn list_of<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Lenient numeric coercion used across sources and pages
pub fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Lenient string coercion; lists and maps are rejected
pub fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
