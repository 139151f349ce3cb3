//! Weather feed (QWeather-shaped)
//!
//! The document bundles up to four API responses:
//!
//! ```json
//! {
//!   "now":      {"code": "200", "now": {"temp": "21", "text": "Cloudy", ...}},
//!   "forecast": {"code": "200", "daily": [{"fxDate": "...", "tempMin": "12", ...}]},
//!   "air":      {"code": "200", "now": {"aqi": "42"}},
//!   "life":     {"code": "200", "daily": [{"category": "Suitable"}]}
//! }
//! ```
//!
//! A section whose `code` is present and not `"200"` is ignored, as is a
//! missing one; the keys it would have written keep their last value.

use log::{debug, warn};
use serde_json::{json, Value};

use super::{first_string, Ingest};
use crate::error::SourceError;
use crate::model::ForecastDay;
use crate::store::{keys, Store};

/// Current-conditions fields copied verbatim, with their fallbacks
const NOW_FIELDS: [(&str, &str); 6] = [
    (keys::TEMP, "--"),
    (keys::TEXT, "..."),
    (keys::FEELS_LIKE, "--"),
    (keys::HUMIDITY, "--"),
    (keys::WIND_SPEED, "--"),
    (keys::WIND_DIR, "--"),
];

fn section<'a>(doc: &'a Value, name: &str) -> Option<&'a Value> {
    let section = doc.get(name)?;
    match section.get("code") {
        None => Some(section),
        Some(code) if code == "200" || code == 200 => Some(section),
        Some(code) => {
            warn!("Weather section {} returned code {}", name, code);
            None
        }
    }
}

pub struct WeatherIngest;

impl Ingest for WeatherIngest {
    fn ingest(&mut self, store: &Store, doc: &Value) -> Result<(), SourceError> {
        let mut applied = 0;

        if let Some(now) = section(doc, "now") {
            let now = now.get("now").unwrap_or(now);
            store.update(NOW_FIELDS.iter().map(|(key, fallback)| {
                let value = first_string(now, &[key]).unwrap_or_else(|| fallback.to_string());
                (key.to_string(), Value::String(value))
            }));
            applied += 1;
        }

        if let Some(forecast) = section(doc, "forecast") {
            let days: Vec<ForecastDay> = match forecast.get("daily") {
                Some(Value::Array(daily)) => daily
                    .iter()
                    .filter_map(|d| serde_json::from_value(d.clone()).ok())
                    .collect(),
                _ => Vec::new(),
            };
            if let Some(today) = days.first() {
                store.set(keys::TODAY, serde_json::to_value(today)?);
            }
            store.set(keys::FORECAST, serde_json::to_value(&days)?);
            applied += 1;
        }

        if let Some(air) = section(doc, "air") {
            let aqi = first_string(air, &["now.aqi", "aqi"]).unwrap_or_else(|| String::from("0"));
            store.set(keys::AQI, aqi);
            applied += 1;
        }

        if let Some(life) = section(doc, "life") {
            if let Some(category) = life
                .get("daily")
                .and_then(|d| d.get(0))
                .and_then(|d| first_string(d, &["category"]))
            {
                store.set(keys::LIFE, json!(category));
            }
            applied += 1;
        }

        if applied == 0 {
            return Err(SourceError::Malformed(String::from("no usable weather sections")));
        }
        debug!("Weather updated from {} sections", applied);
        Ok(())
    }
}
