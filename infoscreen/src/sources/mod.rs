//! Data sources feeding the store
//!
//! ```text
//!   JsonSource (file | command) ──fetch──▶ Feed<I: Ingest> ──ingest──▶ Store
//!   /proc, sysfs, statvfs ─────────────────▶ SystemMonitor ───────────▶ Store
//! ```
//!
//! Remote-backed workers read one JSON document per cycle. The concrete
//! HTTP APIs stay outside the process: an external collector keeps a file
//! fresh, or a configured command (for example `curl`) prints the document.
//! Parsing is tolerant; each ingester maps loosely-shaped payloads onto the
//! typed records in [`crate::model`] through explicit priority lists.

pub mod feeds;
pub mod fleet;
pub mod market;
pub mod system;
pub mod weather;

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::Value;

use crate::config::{SourceConfig, SourceKind, SourcesConfig};
use crate::error::SourceError;
use crate::store::{value_as_f64, Store};
use crate::worker::{Scheduler, Update};

/// Producer of one JSON document per poll
pub trait JsonSource: Send {
    fn fetch(&mut self) -> Result<Value, SourceError>;

    /// Human-readable origin for log lines
    fn describe(&self) -> String;
}

/// JSON file maintained by an external collector
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl JsonSource for FileSource {
    fn fetch(&mut self) -> Result<Value, SourceError> {
        if !self.path.exists() {
            return Err(SourceError::Unavailable(format!("{} does not exist", self.path.display())));
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Command whose stdout is a JSON document
#[derive(Debug, Clone)]
pub struct CommandSource {
    argv: Vec<String>,
}

impl CommandSource {
    /// `None` for an empty argument vector
    pub fn new(argv: Vec<String>) -> Option<Self> {
        (!argv.is_empty()).then_some(Self { argv })
    }
}

impl JsonSource for CommandSource {
    fn fetch(&mut self) -> Result<Value, SourceError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| SourceError::Unavailable(String::from("empty command")))?;
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| SourceError::Command {
                command: self.describe(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Command {
                command: self.describe(),
                message: format!("{} {}", output.status, stderr.trim()),
            });
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn describe(&self) -> String {
        self.argv.join(" ")
    }
}

/// Build the configured source, if any
pub fn source_from_config(config: &SourceConfig) -> Option<Box<dyn JsonSource>> {
    if let Some(path) = &config.file {
        return Some(Box::new(FileSource::new(path)));
    }
    config
        .command
        .clone()
        .and_then(CommandSource::new)
        .map(|s| Box::new(s) as Box<dyn JsonSource>)
}

/// Turns one fetched document into store writes
pub trait Ingest: Send + 'static {
    /// Key receiving a short status text, if this feed has one
    fn status_key(&self) -> Option<&'static str> {
        None
    }

    /// Status written when the document could not be fetched
    fn fetch_error_status(&self) -> &'static str {
        "Network Err"
    }

    fn ingest(&mut self, store: &Store, doc: &Value) -> Result<(), SourceError>;
}

/// Worker pairing a [`JsonSource`] with an [`Ingest`]er
pub struct Feed<I> {
    source: Box<dyn JsonSource>,
    ingest: I,
}

impl<I: Ingest> Feed<I> {
    pub fn new(source: Box<dyn JsonSource>, ingest: I) -> Self {
        Self { source, ingest }
    }
}

impl<I: Ingest> Update for Feed<I> {
    fn update(&mut self, store: &Store) -> Result<()> {
        let origin = self.source.describe();
        let doc = match self.source.fetch() {
            Ok(doc) => doc,
            Err(e) => {
                if let Some(key) = self.ingest.status_key() {
                    store.set(key, self.ingest.fetch_error_status());
                }
                return Err(e).with_context(|| format!("fetching {origin}"));
            }
        };
        debug!("Fetched document from {}", origin);
        if let Err(e) = self.ingest.ingest(store, &doc) {
            if let Some(key) = self.ingest.status_key() {
                store.set(key, "Parse Error");
            }
            return Err(e).with_context(|| format!("parsing document from {origin}"));
        }
        Ok(())
    }
}

/// Spawn one worker per enabled source; returns how many were started
pub fn register_workers(scheduler: &mut Scheduler, config: &SourcesConfig) -> Result<usize> {
    let mut started = 0;
    for kind in SourceKind::ALL {
        let source_config = config.get(kind);
        if !source_config.enabled {
            info!("Source {} disabled", kind.name());
            continue;
        }
        let interval = config.interval(kind);

        if kind == SourceKind::System {
            scheduler.spawn(kind.name(), interval, system::SystemMonitor::new())?;
            started += 1;
            continue;
        }

        let Some(source) = source_from_config(source_config) else {
            warn!("Source {} has no file or command, skipping", kind.name());
            continue;
        };
        let name = kind.name();
        match kind {
            SourceKind::Weather => {
                scheduler.spawn(name, interval, Feed::new(source, weather::WeatherIngest))?
            }
            SourceKind::Market => {
                scheduler.spawn(name, interval, Feed::new(source, market::MarketIngest))?
            }
            SourceKind::Fleet => {
                scheduler.spawn(name, interval, Feed::new(source, fleet::FleetIngest::new()))?
            }
            SourceKind::Tracking => {
                scheduler.spawn(name, interval, Feed::new(source, feeds::TrackingIngest))?
            }
            SourceKind::Streamers => {
                scheduler.spawn(name, interval, Feed::new(source, feeds::StreamersIngest))?
            }
            SourceKind::Messages => {
                scheduler.spawn(name, interval, Feed::new(source, feeds::MessagesIngest))?
            }
            SourceKind::System => continue,
        }
        started += 1;
    }
    Ok(started)
}

/// Seconds since the Unix epoch
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Follow a dotted path such as `info.cpu`
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, segment| v.get(segment))
}

/// Null, false, zero, empty strings and empty containers
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// First non-blank value along `paths`, in priority order
pub fn first_present<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|p| lookup(value, p))
        .find(|v| !is_blank(v))
}

/// First non-zero number along `paths`; numeric strings count
pub fn first_number(value: &Value, paths: &[&str]) -> Option<f64> {
    paths
        .iter()
        .filter_map(|p| lookup(value, p))
        .filter_map(value_as_f64)
        .find(|n| *n != 0.0)
}

/// First non-empty string along `paths`; numbers are formatted
pub fn first_string(value: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|p| lookup(value, p))
        .filter_map(crate::store::value_as_string)
        .find(|s| !s.is_empty())
}

/// List of records from `{items: [...]}`, `{data: [...]}`, `{list: [...]}`
/// or a bare list; a lone object counts as a one-element list
pub fn record_list(doc: &Value) -> Option<&[Value]> {
    for key in ["items", "data", "list"] {
        if let Some(Value::Array(items)) = doc.get(key) {
            return Some(items);
        }
    }
    match doc {
        Value::Array(items) => Some(items),
        Value::Object(_) => Some(std::slice::from_ref(doc)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;

    struct Recorder;

    impl Ingest for Recorder {
        fn status_key(&self) -> Option<&'static str> {
            Some("status")
        }

        fn ingest(&mut self, store: &Store, doc: &Value) -> Result<(), SourceError> {
            let n = doc.get("n").ok_or_else(|| SourceError::Malformed("no n".into()))?;
            store.set("n", n.clone());
            store.set("status", "Updated");
            Ok(())
        }
    }

    struct Fixed(Result<Value, String>);

    impl JsonSource for Fixed {
        fn fetch(&mut self) -> Result<Value, SourceError> {
            self.0.clone().map_err(SourceError::Unavailable)
        }

        fn describe(&self) -> String {
            String::from("fixed")
        }
    }

    #[test]
    fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let mut source = FileSource::new(&path);
        assert!(matches!(source.fetch(), Err(SourceError::Unavailable(_))));

        let mut file = fs::File::create(&path).unwrap();
        write!(file, "{{\"n\": 3}}").unwrap();
        assert_eq!(source.fetch().unwrap(), json!({"n": 3}));

        fs::write(&path, "{broken").unwrap();
        assert!(matches!(source.fetch(), Err(SourceError::Json(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_source() {
        let mut ok = CommandSource::new(vec!["echo".into(), "[1, 2]".into()]).unwrap();
        assert_eq!(ok.fetch().unwrap(), json!([1, 2]));

        let mut failing = CommandSource::new(vec!["false".into()]).unwrap();
        assert!(matches!(failing.fetch(), Err(SourceError::Command { .. })));

        let mut missing = CommandSource::new(vec!["/nonexistent/collector".into()]).unwrap();
        assert!(matches!(missing.fetch(), Err(SourceError::Command { .. })));

        assert!(CommandSource::new(Vec::new()).is_none());
    }

    #[test]
    fn test_feed_statuses() {
        let store = Store::new();

        let mut feed = Feed::new(Box::new(Fixed(Ok(json!({"n": 1})))), Recorder);
        feed.update(&store).unwrap();
        assert_eq!(store.get_f64("n", 0.0), 1.0);
        assert_eq!(store.get_str("status", ""), "Updated");

        let mut broken = Feed::new(Box::new(Fixed(Ok(json!({})))), Recorder);
        assert!(broken.update(&store).is_err());
        assert_eq!(store.get_str("status", ""), "Parse Error");
        // last good value kept
        assert_eq!(store.get_f64("n", 0.0), 1.0);

        let mut offline = Feed::new(Box::new(Fixed(Err("down".into()))), Recorder);
        assert!(offline.update(&store).is_err());
        assert_eq!(store.get_str("status", ""), "Network Err");
    }

    #[test]
    fn test_priority_lookup() {
        let doc = json!({"info": {"cpu": 0, "mp": "41.5"}, "cpu": 12, "name": ""});
        assert_eq!(lookup(&doc, "info.mp"), Some(&json!("41.5")));
        assert_eq!(lookup(&doc, "info.none.deeper"), None);
        assert_eq!(first_number(&doc, &["info.cpu", "cpu"]), Some(12.0));
        assert_eq!(first_number(&doc, &["info.mp"]), Some(41.5));
        assert_eq!(first_string(&doc, &["name", "hostname"]), None);
        assert!(first_present(&doc, &["info.cpu"]).is_none());
    }

    #[test]
    fn test_record_list_shapes() {
        assert_eq!(record_list(&json!({"items": [1, 2]})).map(|r| r.len()), Some(2));
        assert_eq!(record_list(&json!({"data": [1]})).map(|r| r.len()), Some(1));
        assert_eq!(record_list(&json!([1, 2, 3])).map(|r| r.len()), Some(3));
        assert_eq!(record_list(&json!({"name": "solo"})).map(|r| r.len()), Some(1));
        assert!(record_list(&json!(7)).is_none());
    }

    #[test]
    fn test_register_workers_skips_unconfigured() {
        let store = Arc::new(Store::new());
        let mut scheduler = Scheduler::new(store);
        let mut config = SourcesConfig::default();
        config.system.enabled = false;
        config.weather.file = Some(PathBuf::from("/nonexistent/weather.json"));
        config.weather.interval_secs = Some(3600);

        assert_eq!(register_workers(&mut scheduler, &config).unwrap(), 1);
        assert_eq!(scheduler.workers().len(), 1);
        assert_eq!(scheduler.workers()[0].name(), "weather");
        scheduler.shutdown();
    }
}
