//! Market feed: tickers, candles and account balance
//!
//! ```json
//! {
//!   "tickers": [{"symbol": "BTCUSDT", "lastPrice": "67000.1", "priceChangePercent": "-1.2"}],
//!   "klines":  {"BTCUSDT": [["1700000000000", "1", "2", "0.5", "1.5", "10"], ...]},
//!   "balance": 12345.67
//! }
//! ```
//!
//! Tickers accept the Binance 24h shape or `{name, price, change}`. Candles
//! accept Bybit-style arrays (numbers or strings, any order) or objects and
//! are stored ascending by timestamp. Each balance reading is appended to a
//! bounded history used by the market page's asset sparkline.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde_json::{json, Value};

use super::{first_number, first_string, unix_now, Ingest};
use crate::error::SourceError;
use crate::model::{AssetPoint, Candle, Ticker};
use crate::store::{keys, value_as_f64, Store};

/// Points kept in the balance history
pub const HISTORY_CAP: usize = 20;

/// Quote suffix stripped from exchange symbols
const QUOTE: &str = "USDT";

fn coin_name(symbol: &str) -> String {
    symbol.trim().to_uppercase().replace(QUOTE, "")
}

/// One ticker from either supported shape
pub fn parse_ticker(value: &Value) -> Option<Ticker> {
    let name = first_string(value, &["name"])
        .or_else(|| first_string(value, &["symbol"]).map(|s| coin_name(&s)))?;
    let price = first_number(value, &["price", "lastPrice"])?;
    let change = first_number(value, &["change", "priceChangePercent"]).unwrap_or(0.0);
    Some(Ticker { name, price, change })
}

pub fn parse_tickers(value: &Value) -> Vec<Ticker> {
    match value {
        Value::Array(items) => items.iter().filter_map(parse_ticker).collect(),
        _ => Vec::new(),
    }
}

/// One candle from `[ts, open, high, low, close, volume?]` or an object
pub fn parse_candle(value: &Value) -> Option<Candle> {
    let num = |v: &Value| value_as_f64(v);
    match value {
        Value::Array(fields) if fields.len() >= 5 => Some(Candle {
            timestamp: num(&fields[0])? as i64,
            open: num(&fields[1])?,
            high: num(&fields[2])?,
            low: num(&fields[3])?,
            close: num(&fields[4])?,
            volume: fields.get(5).and_then(num).unwrap_or(0.0),
        }),
        Value::Object(_) => {
            let field = |names: &[&str]| names.iter().find_map(|n| value.get(*n).and_then(num));
            Some(Candle {
                timestamp: field(&["timestamp", "start", "t"])? as i64,
                open: field(&["open", "o"])?,
                high: field(&["high", "h"])?,
                low: field(&["low", "l"])?,
                close: field(&["close", "c"])?,
                volume: field(&["volume", "v"]).unwrap_or(0.0),
            })
        }
        _ => None,
    }
}

/// Candles sorted ascending; accepts a bare list or Bybit's `{list: [...]}`
pub fn parse_candles(value: &Value) -> Vec<Candle> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        _ => match value.get("list").or_else(|| value.get("result").and_then(|r| r.get("list"))) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
    };
    let mut candles: Vec<Candle> = items.iter().filter_map(parse_candle).collect();
    candles.sort_by_key(|c| c.timestamp);
    candles
}

/// `<1` four decimals, `<10` three, otherwise two
pub fn format_crypto_price(price: f64) -> String {
    if price < 1.0 {
        format!("{price:.4}")
    } else if price < 10.0 {
        format!("{price:.3}")
    } else {
        format!("{price:.2}")
    }
}

/// `$12,345.67`
pub fn format_usd(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac}")
}

/// Append a point, dropping the oldest beyond [`HISTORY_CAP`]
pub fn push_history(history: &mut Vec<AssetPoint>, point: AssetPoint) {
    history.push(point);
    if history.len() > HISTORY_CAP {
        let excess = history.len() - HISTORY_CAP;
        history.drain(..excess);
    }
}

pub struct MarketIngest;

impl Ingest for MarketIngest {
    fn status_key(&self) -> Option<&'static str> {
        Some(keys::CRYPTO_STATUS)
    }

    fn fetch_error_status(&self) -> &'static str {
        "Market Err"
    }

    fn ingest(&mut self, store: &Store, doc: &Value) -> Result<(), SourceError> {
        if !doc.is_object() {
            return Err(SourceError::Malformed(String::from("market document is not an object")));
        }

        let tickers = doc.get("tickers").map(parse_tickers).unwrap_or_default();
        if tickers.is_empty() {
            store.set(keys::CRYPTO_STATUS, "Market Err");
        } else {
            debug!("Parsed {} tickers", tickers.len());
            store.set(keys::CRYPTO, serde_json::to_value(&tickers)?);
            store.set(keys::CRYPTO_STATUS, "Updated");
        }

        if let Some(Value::Object(klines)) = doc.get("klines") {
            let parsed: BTreeMap<String, Vec<Candle>> = klines
                .iter()
                .map(|(symbol, v)| (coin_name(symbol), parse_candles(v)))
                .filter(|(_, candles)| !candles.is_empty())
                .collect();
            if !parsed.is_empty() {
                store.set(keys::CRYPTO_KLINES, serde_json::to_value(&parsed)?);
            }
        }

        if let Some(balance) = doc.get("balance") {
            match value_as_f64(balance) {
                Some(total) => {
                    let mut history: Vec<AssetPoint> =
                        serde_json::from_value(store.get(keys::ASSET_HISTORY, json!([]))).unwrap_or_default();
                    push_history(&mut history, AssetPoint(unix_now(), total));
                    store.set(keys::ASSET, format_usd(total));
                    store.set(keys::ASSET_VALUE, total);
                    store.set(keys::ASSET_HISTORY, serde_json::to_value(&history)?);
                }
                None => {
                    warn!("Unusable balance value {}", balance);
                    store.set(keys::ASSET, "Sync Err");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Snapshot;

    #[test]
    fn test_ticker_shapes() {
        let binance = json!({"symbol": "ETHUSDT", "lastPrice": "3120.5", "priceChangePercent": "-2.25"});
        assert_eq!(
            parse_ticker(&binance),
            Some(Ticker { name: "ETH".into(), price: 3120.5, change: -2.25 })
        );
        let plain = json!({"name": "DOGE", "price": 0.12, "change": 4});
        assert_eq!(parse_ticker(&plain).map(|t| t.change), Some(4.0));
        assert!(parse_ticker(&json!({"symbol": "BTCUSDT"})).is_none());
    }

    #[test]
    fn test_candles_sorted_ascending() {
        // Bybit returns newest first, values as strings
        let raw = json!({"list": [
            ["3000", "3", "4", "2", "3.5", "1"],
            ["2000", "2", "3", "1", "3", "1"],
            ["1000", "1", "2", "0.5", "2", "1"]
        ]});
        let candles = parse_candles(&raw);
        assert_eq!(candles.iter().map(|c| c.timestamp).collect::<Vec<_>>(), vec![1000, 2000, 3000]);
        assert_eq!(candles[0].low, 0.5);

        let objects = json!([{"timestamp": 5, "open": 1, "high": 2, "low": 1, "close": 2}, {"bad": true}]);
        assert_eq!(parse_candles(&objects).len(), 1);
    }

    #[test]
    fn test_price_formats() {
        assert_eq!(format_crypto_price(0.123456), "0.1235");
        assert_eq!(format_crypto_price(3.14159), "3.142");
        assert_eq!(format_crypto_price(67000.0), "67000.00");
        assert_eq!(format_usd(12345.678), "$12,345.68");
        assert_eq!(format_usd(999.0), "$999.00");
        assert_eq!(format_usd(1234567.0), "$1,234,567.00");
        assert_eq!(format_usd(-1500.5), "-$1,500.50");
    }

    #[test]
    fn test_history_capped() {
        let mut history = Vec::new();
        for i in 0..25 {
            push_history(&mut history, AssetPoint(i as f64, i as f64));
        }
        assert_eq!(history.len(), HISTORY_CAP);
        assert_eq!(history[0].value(), 5.0);
        assert_eq!(history[HISTORY_CAP - 1].value(), 24.0);
    }

    #[test]
    fn test_ingest_document() {
        let store = Store::with_defaults();
        let doc = json!({
            "tickers": [{"symbol": "BTCUSDT", "lastPrice": "67000", "priceChangePercent": "1.5"}],
            "klines": {"BTCUSDT": [[2, 1, 2, 1, 2, 0], [1, 1, 2, 1, 2, 0]], "XRPUSDT": []},
            "balance": "2500.5"
        });
        for _ in 0..22 {
            MarketIngest.ingest(&store, &doc).unwrap();
        }

        assert_eq!(store.get_str(keys::CRYPTO_STATUS, ""), "Updated");
        assert_eq!(store.get_str(keys::ASSET, ""), "$2,500.50");
        assert_eq!(store.get_f64(keys::ASSET_VALUE, 0.0), 2500.5);

        let snap = Snapshot::from_pairs([
            (keys::CRYPTO, store.get(keys::CRYPTO, Value::Null)),
            (keys::ASSET_HISTORY, store.get(keys::ASSET_HISTORY, Value::Null)),
            (keys::CRYPTO_KLINES, store.get(keys::CRYPTO_KLINES, Value::Null)),
        ]);
        assert_eq!(snap.list_of::<Ticker>(keys::CRYPTO)[0].name, "BTC");
        assert_eq!(snap.list_of::<AssetPoint>(keys::ASSET_HISTORY).len(), HISTORY_CAP);
        let klines: BTreeMap<String, Vec<Candle>> = snap.get_as(keys::CRYPTO_KLINES).unwrap();
        assert_eq!(klines.keys().collect::<Vec<_>>(), vec!["BTC"]);
        assert_eq!(klines["BTC"][0].timestamp, 1);
    }

    #[test]
    fn test_missing_tickers_and_bad_balance() {
        let store = Store::with_defaults();
        MarketIngest.ingest(&store, &json!({"balance": "n/a"})).unwrap();
        assert_eq!(store.get_str(keys::CRYPTO_STATUS, ""), "Market Err");
        assert_eq!(store.get_str(keys::ASSET, ""), "Sync Err");
        assert!(MarketIngest.ingest(&store, &json!([1])).is_err());
    }
}
