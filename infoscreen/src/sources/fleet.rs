//! Fleet health feed (PocketBase/Beszel-shaped)
//!
//! Hosts report metrics under several historical field names. Each metric
//! is resolved through a priority list; the first non-zero entry wins:
//!
//! | Metric      | Priority                                                        |
//! |-------------|-----------------------------------------------------------------|
//! | cpu         | `info.cpu`, `cpu`, `cpuUsage`, `metrics.cpu`                    |
//! | memory      | `info.mp`, `memory`, `memoryUsage`, `ram`, `metrics.memory`     |
//! | disk        | `info.dp`, `disk`, `diskUsage`, `metrics.disk`                  |
//! | temperature | `info.dt`, `temperature`, `temp`, `metrics.temperature`         |
//! | load        | `info.la`, `info.l1`                                            |
//! | net up      | `info.ns`, `info.netSent`, `info.networkSent`, `info.tx`, `info.upload`, `netSent`, `networkSent`, `tx`, `network.sent`, `network.tx` |
//! | net down    | `info.nr`, `info.netRecv`, `info.networkRecv`, `info.rx`, `info.download`, `netRecv`, `networkRecv`, `rx`, `network.recv`, `network.rx` |
//!
//! When neither network rate is reported, the cumulative byte counter
//! `info.bb` is differentiated by [`NetRateEstimator`].

use std::collections::HashMap;

use log::{debug, info};
use serde_json::Value;

use super::{first_number, first_present, first_string, record_list, unix_now, Ingest};
use crate::error::SourceError;
use crate::model::FleetClient;
use crate::store::{keys, value_as_f64, Store};

/// Hosts shown on the fleet page
pub const MAX_CLIENTS: usize = 5;

const NAME_LEN: usize = 15;

const CPU: &[&str] = &["info.cpu", "cpu", "cpuUsage", "metrics.cpu"];
const MEMORY: &[&str] = &["info.mp", "memory", "memoryUsage", "ram", "metrics.memory"];
const DISK: &[&str] = &["info.dp", "disk", "diskUsage", "metrics.disk"];
const TEMPERATURE: &[&str] = &["info.dt", "temperature", "temp", "metrics.temperature"];
const LOAD: &[&str] = &["info.la", "info.l1"];
const NET_UP: &[&str] = &[
    "info.ns",
    "info.netSent",
    "info.networkSent",
    "info.tx",
    "info.upload",
    "netSent",
    "networkSent",
    "tx",
    "network.sent",
    "network.tx",
];
const NET_DOWN: &[&str] = &[
    "info.nr",
    "info.netRecv",
    "info.networkRecv",
    "info.rx",
    "info.download",
    "netRecv",
    "networkRecv",
    "rx",
    "network.recv",
    "network.rx",
];

/// Load average from a list, a single number or a whitespace-separated string
pub fn parse_load(value: Option<&Value>) -> [f64; 3] {
    let from_slice = |values: &[f64]| -> [f64; 3] {
        if values.len() < 3 {
            [0.0; 3]
        } else {
            [values[0], values[1], values[2]]
        }
    };
    match value {
        Some(Value::Array(items)) => {
            let parsed: Option<Vec<f64>> = items.iter().map(value_as_f64).collect();
            parsed.map(|v| from_slice(&v)).unwrap_or([0.0; 3])
        }
        Some(Value::Number(n)) => [n.as_f64().unwrap_or(0.0), 0.0, 0.0],
        Some(Value::String(s)) => {
            let parsed: Result<Vec<f64>, _> = s.split_whitespace().take(3).map(str::parse).collect();
            parsed.map(|v| from_slice(&v)).unwrap_or([0.0; 3])
        }
        _ => [0.0; 3],
    }
}

/// `(total, failed)` from a mapping or a bare count
pub fn parse_services(record: &Value) -> (u32, u32) {
    let count = |v: Option<f64>| v.map(|n| n.max(0.0) as u32).unwrap_or(0);
    match first_present(record, &["services", "serviceCount"]) {
        Some(services @ Value::Object(_)) => (
            count(first_number(services, &["total", "count"])),
            count(first_number(services, &["failed", "failedCount"])),
        ),
        Some(Value::Number(n)) => (
            count(n.as_f64()),
            count(first_number(record, &["servicesFailed", "failedServices"])),
        ),
        _ => (0, 0),
    }
}

fn parse_status(record: &Value) -> String {
    match record.get("status") {
        Some(Value::Object(_)) => record
            .get("status")
            .and_then(|s| first_string(s, &["status", "state"]))
            .unwrap_or_else(|| String::from("unknown")),
        Some(status) => crate::store::value_as_string(status)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| String::from("unknown")),
        None => String::from("unknown"),
    }
}

/// Derives transfer rates from a cumulative byte counter
///
/// Down is `Δbytes / Δt`; up is estimated as [`UPLINK_SHARE`] of down.
/// The first sample of a host only primes the estimator.
///
/// [`UPLINK_SHARE`]: NetRateEstimator::UPLINK_SHARE
#[derive(Debug, Default)]
pub struct NetRateEstimator {
    previous: HashMap<String, (f64, f64)>,
}

impl NetRateEstimator {
    pub const UPLINK_SHARE: f64 = 0.1;

    pub fn new() -> Self {
        Self::default()
    }

    /// Record `bytes` seen at `now` (seconds); returns `(up, down)` in bytes/s
    pub fn observe(&mut self, host: &str, bytes: f64, now: f64) -> Option<(f64, f64)> {
        let previous = self.previous.insert(host.to_string(), (bytes, now));
        let (prev_bytes, prev_time) = previous?;
        let elapsed = now - prev_time;
        let delta = bytes - prev_bytes;
        if elapsed <= 0.0 || prev_bytes <= 0.0 || delta <= 0.0 {
            return None;
        }
        let down = delta / elapsed;
        debug!("{}: {} bytes over {:.1}s -> {:.1} B/s", host, delta, elapsed, down);
        Some((down * Self::UPLINK_SHARE, down))
    }
}

/// Map one host record onto a [`FleetClient`]
pub fn parse_client(record: &Value, rates: &mut NetRateEstimator, now: f64) -> FleetClient {
    let name: String = first_string(record, &["name", "hostname"])
        .unwrap_or_else(|| String::from("Unknown"))
        .chars()
        .take(NAME_LEN)
        .collect();

    let mut network_up = first_number(record, NET_UP).unwrap_or(0.0);
    let mut network_down = first_number(record, NET_DOWN).unwrap_or(0.0);
    if network_up == 0.0 && network_down == 0.0 {
        let counter = first_number(record, &["info.bb"]).unwrap_or(0.0);
        if counter > 0.0 {
            if let Some((up, down)) = rates.observe(&name, counter, now) {
                network_up = up;
                network_down = down;
            }
        }
    }

    let (services, services_failed) = parse_services(record);
    FleetClient {
        status: parse_status(record),
        cpu: first_number(record, CPU).unwrap_or(0.0),
        memory: first_number(record, MEMORY).unwrap_or(0.0),
        disk: first_number(record, DISK).unwrap_or(0.0),
        temperature: first_number(record, TEMPERATURE).unwrap_or(0.0),
        load: parse_load(first_present(record, LOAD)),
        network_up,
        network_down,
        services,
        services_failed,
        name,
    }
}

/// `512B/s`, `1.5K`, `2.0M`
pub fn format_speed(bytes_per_sec: f64) -> String {
    const KIB: f64 = 1024.0;
    if bytes_per_sec < KIB {
        format!("{bytes_per_sec:.0}B/s")
    } else if bytes_per_sec < KIB * KIB {
        format!("{:.1}K", bytes_per_sec / KIB)
    } else {
        format!("{:.1}M", bytes_per_sec / (KIB * KIB))
    }
}

pub struct FleetIngest {
    rates: NetRateEstimator,
}

impl FleetIngest {
    pub fn new() -> Self {
        Self {
            rates: NetRateEstimator::new(),
        }
    }
}

impl Default for FleetIngest {
    fn default() -> Self {
        Self::new()
    }
}

impl Ingest for FleetIngest {
    fn status_key(&self) -> Option<&'static str> {
        Some(keys::FLEET_STATUS)
    }

    fn fetch_error_status(&self) -> &'static str {
        "API Error"
    }

    fn ingest(&mut self, store: &Store, doc: &Value) -> Result<(), SourceError> {
        let records = record_list(doc)
            .ok_or_else(|| SourceError::Malformed(String::from("expected a list of hosts")))?;
        let now = unix_now();
        let clients: Vec<FleetClient> = records
            .iter()
            .filter(|r| r.is_object())
            .take(MAX_CLIENTS)
            .map(|r| parse_client(r, &mut self.rates, now))
            .collect();

        if clients.is_empty() {
            store.set(keys::FLEET_STATUS, "No Data");
            return Ok(());
        }
        info!("Fleet updated with {} hosts", clients.len());
        store.set(keys::FLEET_CLIENTS, serde_json::to_value(&clients)?);
        store.set(keys::FLEET_STATUS, "Updated");
        store.set(keys::FLEET_LAST_UPDATE, now.floor());
        Ok(())
    }
}
