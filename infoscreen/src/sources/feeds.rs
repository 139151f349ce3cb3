//! List-shaped feeds: parcel tracking, live streamers, channel messages
//!
//! Each document is a list of records (bare, or under `items`/`data`/`list`
//! or a feed-specific key). Field names are resolved through short alias
//! lists so collectors can pass upstream payloads through unchanged.

use chrono::{Local, TimeZone};
use log::{debug, info};
use serde_json::Value;

use super::{first_number, first_string, record_list, unix_now, Ingest};
use crate::error::SourceError;
use crate::model::{ChannelMessage, Package, Streamer, StreamerUser, TrackEvent};
use crate::store::{keys, value_as_f64, Store};

/// Scans kept per parcel, newest first
pub const MAX_TRACKS: usize = 5;

/// Latest-scan phrases marking a parcel as handed over
const COMPLETED: &[&str] = &["delivered", "picked up", "signed for", "collected", "已签收", "已取件", "已领取"];

fn records<'a>(doc: &'a Value, key: &str) -> Result<&'a [Value], SourceError> {
    match doc.get(key) {
        Some(Value::Array(items)) => Ok(items),
        _ => record_list(doc).ok_or_else(|| SourceError::Malformed(format!("expected a list of {key}"))),
    }
}

fn text(record: &Value, paths: &[&str]) -> String {
    first_string(record, paths).unwrap_or_default()
}

/// `MM-DD HH:MM` in local time for epoch seconds, otherwise the text as given
fn timestamp_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| Local.timestamp_opt(secs, 0).single())
            .map(|t| t.format("%m-%d %H:%M").to_string())
            .unwrap_or_default(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

pub fn parse_package(record: &Value) -> Option<Package> {
    let tracking_number = text(record, &["tracking_number", "trackingNumber", "number"]);
    if tracking_number.is_empty() {
        return None;
    }
    let tracks = match record.get("tracks") {
        Some(Value::Array(items)) => items
            .iter()
            .take(MAX_TRACKS)
            .map(|t| TrackEvent {
                time: text(t, &["time", "ftime", "date"]),
                context: text(t, &["context", "desc", "status"]),
            })
            .collect(),
        _ => Vec::new(),
    };
    Some(Package {
        alias: text(record, &["alias", "name"]),
        carrier_name: text(record, &["carrier_name", "carrier"]),
        tracking_number,
        tracks,
    })
}

/// Latest scan says the parcel has been handed over
pub fn is_completed(package: &Package) -> bool {
    package.tracks.first().is_some_and(|latest| {
        let context = latest.context.to_lowercase();
        COMPLETED.iter().any(|phrase| context.contains(phrase))
    })
}

pub fn parse_streamer(record: &Value) -> Streamer {
    let live_status = match record.get("live_status").or_else(|| record.get("liveStatus")) {
        Some(Value::Bool(live)) => i64::from(*live),
        Some(v) => value_as_f64(v).map(|n| n as i64).unwrap_or(0),
        None => 0,
    };
    Streamer {
        alias: text(record, &["alias"]),
        uname: text(record, &["uname", "name"]),
        title: text(record, &["title"]),
        area_name: text(record, &["area_name", "area"]),
        online: first_number(record, &["online", "viewers"]).map(|n| n.max(0.0) as u64).unwrap_or(0),
        live_status,
    }
}

pub fn parse_message(record: &Value, channel: Option<&str>) -> ChannelMessage {
    ChannelMessage {
        channel: channel
            .map(str::to_string)
            .unwrap_or_else(|| text(record, &["channel", "title", "chat"])),
        username: text(record, &["username"]),
        text: text(record, &["text", "message", "caption"]),
        date: timestamp_text(record.get("date")),
        views: first_number(record, &["views"]).map(|n| n.max(0.0) as u64).unwrap_or(0),
        media_type: text(record, &["media_type", "media"]),
    }
}

pub struct TrackingIngest;

impl Ingest for TrackingIngest {
    fn status_key(&self) -> Option<&'static str> {
        Some(keys::TRACKING_STATUS)
    }

    fn ingest(&mut self, store: &Store, doc: &Value) -> Result<(), SourceError> {
        let all: Vec<Package> = records(doc, "packages")?.iter().filter_map(parse_package).collect();
        let total = all.len();
        let active: Vec<Package> = all.into_iter().filter(|p| !is_completed(p)).collect();
        if active.len() < total {
            info!("{} delivered parcels hidden", total - active.len());
        }

        let status = if active.is_empty() {
            String::from("No packages")
        } else {
            String::from("Updated")
        };
        store.set(keys::PACKAGES, serde_json::to_value(&active)?);
        store.set(keys::TRACKING_STATUS, status);
        store.set(keys::TRACKING_LAST_UPDATE, unix_now().floor());
        Ok(())
    }
}

pub struct StreamersIngest;

impl Ingest for StreamersIngest {
    fn status_key(&self) -> Option<&'static str> {
        Some(keys::STREAMERS_STATUS)
    }

    fn ingest(&mut self, store: &Store, doc: &Value) -> Result<(), SourceError> {
        let streamers: Vec<Streamer> = records(doc, "streamers")?
            .iter()
            .filter(|r| r.is_object() && r.get("streamers").is_none())
            .map(parse_streamer)
            .collect();
        if let Some(user) = doc.get("user").filter(|u| u.is_object()) {
            let user = StreamerUser {
                uname: text(user, &["uname", "name"]),
                level: first_number(user, &["level"]).map(|n| n as u32).unwrap_or(0),
            };
            store.set(keys::STREAMER_USER, serde_json::to_value(&user)?);
        }

        let live = streamers.iter().filter(|s| s.is_live()).count();
        debug!("{} streamers, {} live", streamers.len(), live);
        store.set(keys::STREAMERS_STATUS, format!("Updated {}", streamers.len()));
        store.set(keys::STREAMERS, serde_json::to_value(&streamers)?);
        store.set(keys::STREAMERS_LAST_UPDATE, unix_now().floor());
        Ok(())
    }
}

pub struct MessagesIngest;

impl Ingest for MessagesIngest {
    fn status_key(&self) -> Option<&'static str> {
        Some(keys::MESSAGES_STATUS)
    }

    fn ingest(&mut self, store: &Store, doc: &Value) -> Result<(), SourceError> {
        // grouped form: {"channels": [{"title": "...", "messages": [...]}]}
        let messages: Vec<ChannelMessage> = match doc.get("channels") {
            Some(Value::Array(channels)) => channels
                .iter()
                .flat_map(|c| {
                    let title = first_string(c, &["title", "username"]);
                    let items = c.get("messages").and_then(Value::as_array).cloned().unwrap_or_default();
                    items
                        .into_iter()
                        .map(move |m| parse_message(&m, title.as_deref()))
                })
                .collect(),
            _ => records(doc, "messages")?
                .iter()
                .filter(|r| r.is_object())
                .map(|r| parse_message(r, None))
                .collect(),
        };

        store.set(keys::MESSAGES, serde_json::to_value(&messages)?);
        store.set(keys::MESSAGES_STATUS, "Updated");
        store.set(keys::MESSAGES_LAST_UPDATE, unix_now().floor());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_package() {
        let record = json!({
            "tracking_number": "SF1234567890",
            "carrier_name": "SF Express",
            "tracks": [
                {"time": "2026-10-18 09:12", "context": "Out for delivery"},
                {"ftime": "2026-10-17 21:00", "desc": "Arrived at hub"},
                {}, {}, {}, {}
            ]
        });
        let package = parse_package(&record).unwrap();
        assert_eq!(package.display_name(), "SF Express");
        assert_eq!(package.tracks.len(), MAX_TRACKS);
        assert_eq!(package.tracks[1].context, "Arrived at hub");
        assert!(!is_completed(&package));
        assert!(parse_package(&json!({"alias": "no number"})).is_none());
    }

    #[test]
    fn test_completed_parcels_hidden() {
        let store = Store::with_defaults();
        let doc = json!({"packages": [
            {"tracking_number": "A1", "tracks": [{"context": "Delivered to front desk"}]},
            {"tracking_number": "B2", "alias": "Keyboard", "tracks": []}
        ]});
        TrackingIngest.ingest(&store, &doc).unwrap();
        let stored = store.get(keys::PACKAGES, Value::Null);
        assert_eq!(stored.as_array().map(|a| a.len()), Some(1));
        assert_eq!(stored[0]["alias"], json!("Keyboard"));
        assert_eq!(store.get_str(keys::TRACKING_STATUS, ""), "Updated");

        TrackingIngest.ingest(&store, &json!([])).unwrap();
        assert_eq!(store.get_str(keys::TRACKING_STATUS, ""), "No packages");
    }

    #[test]
    fn test_streamers_and_user() {
        let store = Store::with_defaults();
        let doc = json!({
            "user": {"uname": "viewer", "level": 21},
            "streamers": [
                {"uname": "alpha", "live_status": 1, "online": 15320, "area_name": "Music"},
                {"name": "beta", "liveStatus": false, "viewers": "12"}
            ]
        });
        StreamersIngest.ingest(&store, &doc).unwrap();
        let streamers = store.get(keys::STREAMERS, Value::Null);
        assert_eq!(streamers[0]["live_status"], json!(1));
        assert_eq!(streamers[1]["uname"], json!("beta"));
        assert_eq!(streamers[1]["online"], json!(12));
        assert_eq!(store.get(keys::STREAMER_USER, Value::Null)["level"], json!(21));
        assert_eq!(store.get_str(keys::STREAMERS_STATUS, ""), "Updated 2");
    }

    #[test]
    fn test_messages_flat_and_grouped() {
        let store = Store::with_defaults();
        MessagesIngest
            .ingest(&store, &json!([{"channel": "news", "text": "hello", "views": 1200, "date": "10-18 08:00"}]))
            .unwrap();
        let flat = store.get(keys::MESSAGES, Value::Null);
        assert_eq!(flat[0]["channel"], json!("news"));
        assert_eq!(flat[0]["views"], json!(1200));

        let grouped = json!({"channels": [
            {"title": "Leaks", "messages": [{"media_type": "photo"}, {"text": "two"}]},
            {"username": "quiet"}
        ]});
        MessagesIngest.ingest(&store, &grouped).unwrap();
        let msgs = store.get(keys::MESSAGES, Value::Null);
        assert_eq!(msgs.as_array().map(|a| a.len()), Some(2));
        assert_eq!(msgs[0]["channel"], json!("Leaks"));
        assert_eq!(store.get_str(keys::MESSAGES_STATUS, ""), "Updated");
    }

    #[test]
    fn test_epoch_dates_formatted() {
        let formatted = timestamp_text(Some(&json!(1_700_000_000)));
        assert_eq!(formatted.len(), "11-14 22:13".len());
        assert_eq!(timestamp_text(Some(&json!("yesterday"))), "yesterday");
        assert_eq!(timestamp_text(None), "");
    }
}
