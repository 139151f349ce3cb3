//! Application configuration (TOML)
//!
//! Every section and field is optional; a missing file yields the built-in
//! defaults. Example:
//!
//! ```toml
//! [display]
//! spi_device = "/dev/spidev1.0"
//! dc_line = 75
//!
//! [night]
//! start = "01:30"
//! end = "08:00"
//! brightness = 0.6
//!
//! [sources.weather]
//! interval_secs = 1800
//! file = "/run/infoscreen/weather.json"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::theme::NightWindow;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub display: DisplayConfig,
    pub night: NightConfig,
    pub render: RenderConfig,
    pub control: ControlConfig,
    pub assets: AssetsConfig,
    pub pages: PagesConfig,
    pub sources: SourcesConfig,
}

/// Panel geometry and wiring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u16,
    pub height: u16,
    pub spi_device: String,
    pub speed_hz: u32,
    pub gpio_chip: String,
    pub dc_line: u32,
    pub rst_line: u32,
    pub cs_line: u32,
    pub madctl: u8,
    /// Largest single SPI transfer in bytes
    pub max_transfer: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            spi_device: String::from("/dev/spidev1.0"),
            speed_hz: 62_500_000,
            gpio_chip: String::from("/dev/gpiochip0"),
            dc_line: 75,
            rst_line: 79,
            cs_line: 233,
            madctl: 0x28,
            max_transfer: 4096,
        }
    }
}

/// Dimming window, local time `HH:MM`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NightConfig {
    pub start: String,
    pub end: String,
    pub brightness: f32,
}

impl Default for NightConfig {
    fn default() -> Self {
        Self {
            start: String::from("01:30"),
            end: String::from("08:00"),
            brightness: 0.6,
        }
    }
}

impl NightConfig {
    pub fn window(&self) -> Result<NightWindow, ConfigError> {
        Ok(NightWindow {
            start: parse_hhmm("night.start", &self.start)?,
            end: parse_hhmm("night.end", &self.end)?,
            brightness: self.brightness,
        })
    }
}

/// Compositor cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub check_interval_ms: u64,
    pub redraw_interval_ms: u64,
    pub max_consecutive_failures: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 20,
            redraw_interval_ms: 1000,
            max_consecutive_failures: 3,
        }
    }
}

impl RenderConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn redraw_interval(&self) -> Duration {
        Duration::from_millis(self.redraw_interval_ms)
    }
}

/// UDP control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub enabled: bool,
    pub bind: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: String::from("0.0.0.0:9998"),
        }
    }
}

/// Bitmap assets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub dir: PathBuf,
    /// Target height of nixie digit images
    pub nixie_height: u32,
    /// Horizontal stretch applied after scaling to height
    pub width_scale: f32,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("assets"),
            nixie_height: 110,
            width_scale: 1.45,
        }
    }
}

/// Page content settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    /// Symbols shown as candle columns on the market page
    pub coins: Vec<String>,
    pub countdown_name: String,
    /// `YYYY-MM-DD`
    pub countdown_date: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            coins: vec!["BTC".into(), "ETH".into(), "DOGE".into()],
            countdown_name: String::from("CNY 2027"),
            countdown_date: String::from("2027-02-06"),
        }
    }
}

impl PagesConfig {
    pub fn countdown(&self) -> Result<NaiveDate, ConfigError> {
        NaiveDate::parse_from_str(&self.countdown_date, "%Y-%m-%d").map_err(|e| {
            ConfigError::Invalid {
                field: "pages.countdown_date",
                message: format!("{}: {}", self.countdown_date, e),
            }
        })
    }
}

/// Where a worker gets its JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    /// Overrides the per-source default interval
    pub interval_secs: Option<u64>,
    /// JSON file refreshed by an external collector
    pub file: Option<PathBuf>,
    /// Program and arguments whose stdout is a JSON document
    pub command: Option<Vec<String>>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: None,
            file: None,
            command: None,
        }
    }
}

/// Per-worker source settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub system: SourceConfig,
    pub weather: SourceConfig,
    pub market: SourceConfig,
    pub fleet: SourceConfig,
    pub tracking: SourceConfig,
    pub streamers: SourceConfig,
    pub messages: SourceConfig,
}

/// Worker kinds with their default polling intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    System,
    Weather,
    Market,
    Fleet,
    Tracking,
    Streamers,
    Messages,
}

impl SourceKind {
    pub const ALL: [SourceKind; 7] = [
        SourceKind::System,
        SourceKind::Weather,
        SourceKind::Market,
        SourceKind::Fleet,
        SourceKind::Tracking,
        SourceKind::Streamers,
        SourceKind::Messages,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SourceKind::System => "system",
            SourceKind::Weather => "weather",
            SourceKind::Market => "market",
            SourceKind::Fleet => "fleet",
            SourceKind::Tracking => "tracking",
            SourceKind::Streamers => "streamers",
            SourceKind::Messages => "messages",
        }
    }

    pub fn default_interval(self) -> Duration {
        Duration::from_secs(match self {
            SourceKind::System => 2,
            SourceKind::Weather => 1800,
            SourceKind::Market => 15,
            _ => 60,
        })
    }
}

impl SourcesConfig {
    pub fn get(&self, kind: SourceKind) -> &SourceConfig {
        match kind {
            SourceKind::System => &self.system,
            SourceKind::Weather => &self.weather,
            SourceKind::Market => &self.market,
            SourceKind::Fleet => &self.fleet,
            SourceKind::Tracking => &self.tracking,
            SourceKind::Streamers => &self.streamers,
            SourceKind::Messages => &self.messages,
        }
    }

    pub fn interval(&self, kind: SourceKind) -> Duration {
        self.get(kind)
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| kind.default_interval())
    }
}

impl AppConfig {
    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_content(&content, path)
    }

    /// Parse and validate TOML content
    pub fn parse_content(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::Invalid {
                field: "display",
                message: format!("{}x{}", self.display.width, self.display.height),
            });
        }
        if !(self.night.brightness > 0.0 && self.night.brightness <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "night.brightness",
                message: format!("{} is outside (0, 1]", self.night.brightness),
            });
        }
        if self.render.check_interval_ms == 0 || self.render.max_consecutive_failures == 0 {
            return Err(ConfigError::Invalid {
                field: "render",
                message: String::from("intervals and failure limit must be non-zero"),
            });
        }
        self.night.window()?;
        self.pages.countdown()?;
        for kind in SourceKind::ALL {
            let source = self.sources.get(kind);
            if source.file.is_some() && source.command.is_some() {
                return Err(ConfigError::Invalid {
                    field: "sources",
                    message: format!("{} sets both file and command", kind.name()),
                });
            }
            if source.interval_secs == Some(0) {
                return Err(ConfigError::Invalid {
                    field: "sources",
                    message: format!("{} interval_secs must be non-zero", kind.name()),
                });
            }
            if matches!(&source.command, Some(argv) if argv.is_empty()) {
                return Err(ConfigError::Invalid {
                    field: "sources",
                    message: format!("{} has an empty command", kind.name()),
                });
            }
        }
        Ok(())
    }
}

fn parse_hhmm(field: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| ConfigError::Invalid {
        field,
        message: format!("{value}: {e}"),
    })
}
