//! Per-redraw inputs shared by all pages

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::resources::ResourceCache;
use crate::theme::ThemePalette;

/// Page content settings resolved from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PageSettings {
    pub coins: Vec<String>,
    pub countdown_name: String,
    pub countdown_date: NaiveDate,
    /// Target height of nixie digit bitmaps
    pub nixie_height: u32,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            coins: vec!["BTC".into(), "ETH".into(), "DOGE".into()],
            countdown_name: String::from("CNY 2027"),
            countdown_date: NaiveDate::from_ymd_opt(2027, 2, 6).unwrap_or_default(),
            nixie_height: 110,
        }
    }
}

impl PageSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            // tickers and klines are keyed by upper-case symbol
            coins: config
                .pages
                .coins
                .iter()
                .map(|c| c.trim().to_ascii_uppercase())
                .collect(),
            countdown_name: config.pages.countdown_name.clone(),
            countdown_date: config.pages.countdown()?,
            nixie_height: config.assets.nixie_height,
        })
    }
}

/// Everything a page may read besides its store snapshot
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub width: u32,
    pub height: u32,
    pub palette: ThemePalette,
    /// Local wall clock at the start of the redraw
    pub now: NaiveDateTime,
    pub resources: &'a ResourceCache,
    pub settings: &'a PageSettings,
}
