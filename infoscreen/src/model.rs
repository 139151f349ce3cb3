//! Typed records carried in store values
//!
//! Sources serialize these into the store; pages read them back through
//! [`Snapshot::list_of`](crate::store::Snapshot::list_of). Every field has a
//! default so partially-shaped values still deserialize.

use serde::{Deserialize, Serialize};

/// 24h market ticker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticker {
    pub name: String,
    pub price: f64,
    /// Percent change over 24h
    pub change: f64,
}

/// One OHLC candle, timestamps in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

/// `(unix seconds, value)` sample of the account balance
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetPoint(pub f64, pub f64);

impl AssetPoint {
    pub fn value(&self) -> f64 {
        self.1
    }
}

/// Monitored host as published by the fleet worker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetClient {
    pub name: String,
    pub status: String,
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub temperature: f64,
    pub load: [f64; 3],
    /// Bytes per second
    pub network_up: f64,
    pub network_down: f64,
    pub services: u32,
    pub services_failed: u32,
}

impl FleetClient {
    pub fn is_online(&self) -> bool {
        let status = self.status.to_lowercase();
        status.contains("on") || status == "up"
    }
}

/// Latest carrier scan for a parcel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackEvent {
    pub time: String,
    pub context: String,
}

/// Tracked parcel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Package {
    pub alias: String,
    pub carrier_name: String,
    pub tracking_number: String,
    /// Newest first
    pub tracks: Vec<TrackEvent>,
}

impl Package {
    pub fn display_name(&self) -> &str {
        if !self.alias.is_empty() {
            &self.alias
        } else if !self.carrier_name.is_empty() {
            &self.carrier_name
        } else {
            "Parcel"
        }
    }
}

/// Followed live streamer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Streamer {
    pub alias: String,
    pub uname: String,
    pub title: String,
    pub area_name: String,
    /// Viewer count
    pub online: u64,
    /// 1 while live
    pub live_status: i64,
}

impl Streamer {
    pub fn is_live(&self) -> bool {
        self.live_status == 1
    }

    pub fn display_name(&self) -> &str {
        if !self.alias.is_empty() {
            &self.alias
        } else if !self.uname.is_empty() {
            &self.uname
        } else {
            "Streamer"
        }
    }
}

/// Logged-in streaming account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerUser {
    pub uname: String,
    pub level: u32,
}

/// Latest post of a followed channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMessage {
    pub channel: String,
    pub username: String,
    pub text: String,
    /// Preformatted, e.g. `01-31 18:05`
    pub date: String,
    pub views: u64,
    /// `photo`, `video`, `file` or empty
    pub media_type: String,
}

impl ChannelMessage {
    /// Text, or a placeholder naming the attachment
    pub fn body(&self) -> &str {
        if !self.text.is_empty() {
            return &self.text;
        }
        match self.media_type.as_str() {
            "photo" => "[photo]",
            "video" => "[video]",
            "file" => "[file]",
            _ => "[message]",
        }
    }
}

/// Daily forecast entry (QWeather field names)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForecastDay {
    pub fx_date: String,
    pub temp_min: String,
    pub temp_max: String,
    pub text_day: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_records_deserialize() {
        let client: FleetClient = serde_json::from_value(json!({"name": "nas", "cpu": 12.5})).unwrap();
        assert_eq!(client.name, "nas");
        assert_eq!(client.load, [0.0; 3]);

        let day: ForecastDay =
            serde_json::from_value(json!({"fxDate": "2026-01-02", "tempMax": "9"})).unwrap();
        assert_eq!(day.temp_max, "9");
        assert_eq!(day.temp_min, "");
    }

    #[test]
    fn test_asset_point_is_pair() {
        let p: AssetPoint = serde_json::from_value(json!([1700000000.0, 12.5])).unwrap();
        assert_eq!(p.value(), 12.5);
        assert_eq!(serde_json::to_value(p).unwrap(), json!([1700000000.0, 12.5]));
    }

    #[test]
    fn test_online_detection() {
        let mut client = FleetClient::default();
        for (status, online) in [("up", true), ("online", true), ("down", false), ("paused", false)] {
            client.status = status.into();
            assert_eq!(client.is_online(), online, "{status}");
        }
    }

    #[test]
    fn test_display_fallbacks() {
        assert_eq!(Package::default().display_name(), "Parcel");
        let s = Streamer {
            uname: "host".into(),
            ..Default::default()
        };
        assert_eq!(s.display_name(), "host");
        let m = ChannelMessage {
            media_type: "video".into(),
            ..Default::default()
        };
        assert_eq!(m.body(), "[video]");
    }
}
