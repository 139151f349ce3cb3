//! Nixie clock with weather and system cards
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ ● DAY        10/19 MON         Suitable  │  header 28px
//! │   ┌──┐ ┌──┐      ┌──┐ ┌──┐               │
//! │   │1 │ │4 │  :   │0 │ │5 │               │  nixie digits
//! │   └──┘ └──┘      └──┘ └──┘               │
//! │ ┌ weather ────────┐ ┌ system ──────────┐ │  cards at y=155
//! │ └─────────────────┘ └──────────────────┘ │
//! │ 3d 4h          BTC:67.0K          48C    │  footer 16px
//! └──────────────────────────────────────────┘
//! ```

use chrono::{Datelike, Timelike};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

use super::system::system_card;
use super::Page;
use crate::error::RenderError;
use crate::model::{ForecastDay, Streamer, Ticker};
use crate::render::canvas::{lighten, truncate};
use crate::render::widgets::{level_color, TEXT, TEXT_DIM};
use crate::render::{rgb, Canvas, FontSize, RenderContext};
use crate::store::{keys, Snapshot};

const KEYS: &[&str] = &[
    keys::TEMP,
    keys::TEXT,
    keys::AQI,
    keys::LIFE,
    keys::FORECAST,
    keys::CPU_TEMP,
    keys::CPU_USAGE,
    keys::RAM,
    keys::DISK,
    keys::UPTIME,
    keys::CRYPTO,
    keys::STREAMERS,
];

const HEADER_H: i32 = 28;
const DIGIT_SET: &str = "nixie";
const TUBE_FALLBACK_W: i32 = 75;
const COLON_W: i32 = 10;
const TUBE_GAP: i32 = 2;
const NIXIE_AMBER: Rgb888 = rgb(255, 140, 40);
const WEEKDAYS: [&str; 7] = ["MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// Air quality index color
pub fn aqi_color(aqi: f64) -> Rgb888 {
    if aqi <= 50.0 {
        rgb(50, 200, 100)
    } else if aqi <= 100.0 {
        rgb(220, 200, 50)
    } else {
        rgb(255, 80, 80)
    }
}

fn draw_header(canvas: &mut Canvas, snap: &Snapshot, ctx: &RenderContext<'_>) {
    let width = canvas.width();
    for y in 0..HEADER_H {
        let alpha = y as f32 / HEADER_H as f32;
        let mix = |a: f32, b: f32| (a * (1.0 - alpha) + b * alpha) as u8;
        canvas.fill_rect(0, y, width as u32, 1, rgb(mix(15.0, 8.0), mix(18.0, 10.0), mix(25.0, 15.0)));
    }
    canvas.hline(0, width, HEADER_H - 2, rgb(50, 80, 120));
    canvas.hline(0, width, HEADER_H - 1, rgb(25, 40, 60));

    let night = ctx.palette.night;
    let (mode, mode_color, dot) = if night {
        ("NIGHT", rgb(100, 160, 220), rgb(80, 140, 200))
    } else {
        ("DAY", rgb(220, 200, 120), rgb(200, 180, 80))
    };
    canvas.circle(Point::new(9, 13), 3, dot);
    canvas.text(16, 8, mode, FontSize::Small, mode_color);

    let weekday = ctx.now.weekday().num_days_from_monday() as usize;
    let date = format!("{:02}/{:02} {}", ctx.now.month(), ctx.now.day(), WEEKDAYS[weekday]);
    let date_color = if weekday >= 5 {
        rgb(255, 180, 120)
    } else {
        rgb(220, 225, 235)
    };
    canvas.text_centered(width / 2, 7, &date, FontSize::Body, date_color);

    let life = snap.string(keys::LIFE, "");
    if !life.is_empty() {
        let life = truncate(&life, 10);
        let w = crate::render::text_width(&life, FontSize::Small);
        let x = width - w - 8;
        canvas.fill_rounded(x - 3, 5, (w + 6) as u32, 15, 3, rgb(40, 35, 25));
        canvas.text(x, 8, &life, FontSize::Small, rgb(255, 200, 100));
    }
}

fn draw_digits(canvas: &mut Canvas, ctx: &RenderContext<'_>) {
    let height = ctx.settings.nixie_height;
    let time = format!("{:02}{:02}", ctx.now.hour(), ctx.now.minute());
    let bitmaps: Vec<_> = time
        .chars()
        .map(|d| ctx.resources.get(DIGIT_SET, &d.to_string(), height))
        .collect();
    let tube_w = bitmaps
        .iter()
        .flatten()
        .next()
        .map(|b| b.width() as i32)
        .unwrap_or(TUBE_FALLBACK_W);

    let total_w = tube_w * 4 + COLON_W + TUBE_GAP * 3;
    let mut x = (canvas.width() - total_w) / 2;
    for (i, (digit, bitmap)) in time.chars().zip(&bitmaps).enumerate() {
        match bitmap {
            Some(bitmap) => canvas.bitmap(bitmap, x, HEADER_H),
            None => canvas.text_scaled(x + 15, HEADER_H + 15, &digit.to_string(), FontSize::Large, NIXIE_AMBER, 4),
        }
        x += tube_w + TUBE_GAP;
        if i == 1 {
            if ctx.now.second() % 2 == 0 {
                let cx = x + COLON_W / 2 - TUBE_GAP / 2;
                let mid = HEADER_H + height as i32 / 2;
                canvas.circle(Point::new(cx, mid - 14), 2, NIXIE_AMBER);
                canvas.circle(Point::new(cx, mid + 14), 2, NIXIE_AMBER);
            }
            x += COLON_W;
        }
    }
}

const SUN: Rgb888 = rgb(255, 200, 80);
const SUN_RAY: Rgb888 = rgb(255, 180, 60);
const SUN_DIM: Rgb888 = rgb(200, 180, 100);
const CLOUD: Rgb888 = rgb(150, 160, 175);
const CLOUD_DARK: Rgb888 = rgb(120, 130, 145);
const RAIN_CLOUD: Rgb888 = rgb(120, 140, 160);
const RAIN: Rgb888 = rgb(100, 180, 255);
const SNOW: Rgb888 = rgb(220, 230, 255);
const FOG: Rgb888 = rgb(160, 170, 185);
const ICON_SIZE: i32 = 32;

/// Glyph drawn next to the current temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherIcon {
    Sun,
    Cloud,
    Rain,
    Snow,
    Fog,
    Unknown,
}

impl WeatherIcon {
    /// Picks the glyph from a condition description, English or Chinese
    pub fn from_condition(text: &str) -> Self {
        let text = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| text.contains(w));
        // mixed conditions take the first match: partly sunny is sun, sleet is rain
        if has(&["晴", "sun", "clear"]) {
            Self::Sun
        } else if has(&["雨", "rain", "drizzle", "shower", "sleet", "storm", "thunder"]) {
            Self::Rain
        } else if has(&["雪", "snow", "flurr"]) {
            Self::Snow
        } else if has(&["雾", "霾", "fog", "mist", "haze", "smog", "dust", "sand"]) {
            Self::Fog
        } else if has(&["云", "阴", "cloud", "overcast"]) {
            Self::Cloud
        } else {
            Self::Unknown
        }
    }
}

fn draw_cloud(canvas: &mut Canvas, cx: i32, cy: i32, light: Rgb888, dark: Rgb888) {
    canvas.circle(Point::new(cx - 5, cy + 2), 6, light);
    canvas.circle(Point::new(cx + 2, cy - 3), 8, light);
    canvas.circle(Point::new(cx + 8, cy + 3), 6, dark);
    canvas.fill_rect(cx - 5, cy + 2, 13, 7, light);
}

/// Draws `icon` inside the `size` square at (x, y)
pub fn weather_icon(canvas: &mut Canvas, x: i32, y: i32, size: i32, icon: WeatherIcon) {
    let (cx, cy) = (x + size / 2, y + size / 2);
    match icon {
        WeatherIcon::Sun => {
            let r = size / 3;
            canvas.circle(Point::new(cx, cy), (r - 2) as u32, SUN);
            for i in 0..8 {
                let angle = (i as f32 * 45.0).to_radians();
                let at = |d: i32| {
                    Point::new(
                        cx + (angle.cos() * d as f32).round() as i32,
                        cy + (angle.sin() * d as f32).round() as i32,
                    )
                };
                canvas.line(at(r + 1), at(r + 5), SUN_RAY, 2);
            }
        }
        WeatherIcon::Cloud => draw_cloud(canvas, cx, cy, CLOUD, CLOUD_DARK),
        WeatherIcon::Rain => {
            draw_cloud(canvas, cx, cy - 6, RAIN_CLOUD, RAIN_CLOUD);
            for dx in [-6, 2, 10] {
                canvas.line(Point::new(cx + dx - 2, cy + 6), Point::new(cx + dx - 4, cy + 12), RAIN, 2);
            }
        }
        WeatherIcon::Snow => {
            for i in 0..6 {
                let angle = (i as f32 * 60.0).to_radians();
                let at = |d: i32| {
                    Point::new(
                        cx + (angle.cos() * d as f32).round() as i32,
                        cy + (angle.sin() * d as f32).round() as i32,
                    )
                };
                canvas.line(at(4), at(10), SNOW, 2);
            }
            canvas.circle(Point::new(cx, cy), 2, SNOW);
        }
        WeatherIcon::Fog => {
            for (i, dx) in [-2, 2, -2].into_iter().enumerate() {
                canvas.fill_rect(cx - 11 + dx, cy - 7 + i as i32 * 6, 22, 2, FOG);
            }
        }
        WeatherIcon::Unknown => canvas.circle(Point::new(cx, cy), 6, SUN_DIM),
    }
}

/// Current conditions, AQI and tomorrow's range
pub fn weather_card(canvas: &mut Canvas, x: i32, y: i32, width: u32, height: u32, snap: &Snapshot) {
    canvas.fill_rounded(x, y, width, height, 6, rgb(18, 22, 30));
    for i in 0..4u8 {
        let alpha = 1.0 - f32::from(i) * 0.25;
        let shade = |c: u8| (f32::from(c) * alpha) as u8;
        canvas.fill_rect(x + i as i32, y + 4, 1, height.saturating_sub(8), rgb(shade(80), shade(160), shade(220)));
    }

    let forecast: Vec<ForecastDay> = snap.list_of(keys::FORECAST);
    if forecast.is_empty() {
        canvas.text(x + 20, y + 18, "Loading...", FontSize::Body, rgb(100, 110, 130));
        return;
    }

    let condition = snap.string(keys::TEXT, "...");
    weather_icon(canvas, x + 10, y + 8, ICON_SIZE, WeatherIcon::from_condition(&condition));

    let text_x = x + 12 + ICON_SIZE;
    let temp = snap.string(keys::TEMP, "--");
    canvas.text(text_x, y + 4, &format!("{temp}C"), FontSize::Large, Rgb888::WHITE);
    canvas.text(text_x, y + 26, &truncate(&condition, 13), FontSize::Small, TEXT);

    let aqi_text = snap.string(keys::AQI, "0");
    let aqi = aqi_text.parse::<f64>().unwrap_or(0.0);
    let color = aqi_color(aqi);
    let aqi_x = x + width as i32 - 38;
    let tint = rgb(color.r() / 4, color.g() / 4, color.b() / 4);
    canvas.fill_rounded(aqi_x, y + 6, 32, 16, 3, tint);
    canvas.text_centered(aqi_x + 16, y + 9, &truncate(&aqi_text, 5), FontSize::Small, color);

    if let Some(tomorrow) = forecast.get(1) {
        let range = format!("TMR {}~{}C", tomorrow.temp_min, tomorrow.temp_max);
        canvas.text_right(x + width as i32 - 6, y + height as i32 - 12, &range, FontSize::Small, TEXT_DIM);
    }
}

fn draw_footer(canvas: &mut Canvas, snap: &Snapshot, ctx: &RenderContext<'_>) {
    let width = canvas.width();
    let footer_y = canvas.height() - 16;
    canvas.fill_rect(0, footer_y, width as u32, 16, lighten(ctx.palette.bg_top, 5, 6, 8));
    canvas.hline(0, width, footer_y, lighten(ctx.palette.accent, 20, 30, 40));
    let text_y = footer_y + 4;

    canvas.text(6, text_y, &snap.string(keys::UPTIME, "0d 0h"), FontSize::Small, rgb(100, 160, 140));

    let tickers: Vec<Ticker> = snap.list_of(keys::CRYPTO);
    if let Some(btc) = tickers.iter().find(|t| t.name == "BTC").filter(|t| t.price > 0.0) {
        let text = format!("BTC:{:.1}K", btc.price / 1000.0);
        canvas.text(width / 2 - 30, text_y, &text, FontSize::Small, rgb(255, 200, 100));
    }

    let live = snap
        .list_of::<Streamer>(keys::STREAMERS)
        .iter()
        .filter(|s| s.is_live())
        .count();
    if live > 0 {
        canvas.text_right(width - 6, text_y, &format!("LIVE:{live}"), FontSize::Small, rgb(251, 114, 153));
    } else {
        let temp = snap.i64(keys::CPU_TEMP, 0);
        let color = level_color(temp as f64, 55.0, 70.0, rgb(100, 180, 150));
        canvas.text_right(width - 6, text_y, &format!("{temp}C"), FontSize::Small, color);
    }
}

pub struct ClockPage;

impl Page for ClockPage {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn description(&self) -> &'static str {
        "Nixie clock with weather, system summary and BTC price"
    }

    fn keys(&self) -> &'static [&'static str] {
        KEYS
    }

    fn draw(&self, canvas: &mut Canvas, snap: &Snapshot, ctx: &RenderContext<'_>) -> Result<(), RenderError> {
        // deep black backdrop instead of the themed gradient
        let (w, h) = (canvas.width() as u32, canvas.height() as u32);
        canvas.fill_rect(0, 0, w, h, rgb(5, 5, 8));

        draw_header(canvas, snap, ctx);
        draw_digits(canvas, ctx);

        let (card_w, card_h, gap) = (140u32, 50u32, 10i32);
        let start_x = (canvas.width() - (card_w as i32 * 2 + gap)) / 2;
        weather_card(canvas, start_x, 155, card_w, card_h, snap);
        system_card(canvas, start_x + card_w as i32 + gap, 155, card_w, card_h, snap);

        draw_footer(canvas, snap, ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::tests::{draw_page, with_context};
    use crate::render::PageSettings;
    use crate::resources::tests::bmp_bytes;
    use crate::resources::ResourceCache;
    use serde_json::json;
    use std::fs;

    fn snapshot() -> Snapshot {
        Snapshot::from_pairs([
            (keys::TEMP, json!("21")),
            (keys::TEXT, json!("Cloudy")),
            (keys::AQI, json!("42")),
            (keys::LIFE, json!("Suitable")),
            (
                keys::FORECAST,
                json!([{"tempMin": "12", "tempMax": "23"}, {"tempMin": "10", "tempMax": "18"}]),
            ),
            (keys::CPU_TEMP, json!(48)),
            (keys::UPTIME, json!("3d 4h")),
            (keys::CRYPTO, json!([{"name": "BTC", "price": 67000.0, "change": 1.0}])),
            (keys::STREAMERS, json!([{"uname": "a", "live_status": 1}])),
        ])
    }

    #[test]
    fn test_header_and_footer() {
        // 2026-10-19 14:05 is a Monday
        let canvas = draw_page(&ClockPage, &snapshot());
        for text in ["DAY", "10/19 MON", "Suitable", "3d 4h", "BTC:67.0K", "LIVE:1", "TMR 10~18C", "21C"] {
            assert!(canvas.has_text(text), "missing {text}");
        }
    }

    #[test]
    fn test_fallback_digits_when_assets_missing() {
        let canvas = draw_page(&ClockPage, &snapshot());
        let digits: Vec<_> = canvas
            .texts()
            .iter()
            .filter(|t| t.color == NIXIE_AMBER)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(digits, vec!["1", "4", "0", "5"]);
    }

    #[test]
    fn test_nixie_bitmaps_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(DIGIT_SET)).unwrap();
        for d in 0..10 {
            let pixels = vec![rgb(255, 120, 30); 4 * 10];
            fs::write(dir.path().join(format!("nixie/{d}.bmp")), bmp_bytes(4, 10, &pixels)).unwrap();
        }
        let resources = ResourceCache::new(dir.path(), 1.45);
        let settings = PageSettings::default();
        with_context(|base| {
            let ctx = RenderContext {
                resources: &resources,
                settings: &settings,
                ..*base
            };
            let mut canvas = Canvas::new(infoscreen_display::Frame::new(320, 240));
            ClockPage.draw(&mut canvas, &snapshot(), &ctx).unwrap();
            assert!(!canvas.texts().iter().any(|t| t.color == NIXIE_AMBER));
            // 4x10 scaled to height 110 with 1.45 stretch: 63 px wide
            let (tube_w, total) = (63, 63 * 4 + COLON_W + TUBE_GAP * 3);
            let first_x = (320 - total) / 2;
            assert_eq!(canvas.pixel(first_x + tube_w / 2, 80), Some(rgb(255, 120, 30)));
        });
    }

    #[test]
    fn test_weather_card_loading() {
        let mut canvas = Canvas::new(infoscreen_display::Frame::new(320, 240));
        weather_card(&mut canvas, 0, 0, 140, 50, &Snapshot::default());
        assert!(canvas.has_text("Loading..."));
    }

    fn count(canvas: &Canvas, color: Rgb888) -> usize {
        (0..60)
            .flat_map(|y| (0..60).map(move |x| (x, y)))
            .filter(|&(x, y)| canvas.pixel(x, y) == Some(color))
            .count()
    }

    fn icon(icon: WeatherIcon) -> Canvas {
        let mut canvas = Canvas::new(infoscreen_display::Frame::new(60, 60));
        weather_icon(&mut canvas, 10, 10, ICON_SIZE, icon);
        canvas
    }

    #[test]
    fn test_weather_icon_from_condition() {
        let cases = [
            ("Sunny", WeatherIcon::Sun),
            ("Clear", WeatherIcon::Sun),
            ("晴间多云", WeatherIcon::Sun),
            ("Light Rain", WeatherIcon::Rain),
            ("Thunderstorm", WeatherIcon::Rain),
            ("雨夹雪", WeatherIcon::Rain),
            ("Heavy Snow", WeatherIcon::Snow),
            ("小雪", WeatherIcon::Snow),
            ("Haze", WeatherIcon::Fog),
            ("雾", WeatherIcon::Fog),
            ("Partly Cloudy", WeatherIcon::Cloud),
            ("阴", WeatherIcon::Cloud),
            ("...", WeatherIcon::Unknown),
        ];
        for (text, expected) in cases {
            assert_eq!(WeatherIcon::from_condition(text), expected, "{text}");
        }
    }

    #[test]
    fn test_weather_icon_pixels() {
        // icon square at (10, 10), center (26, 26)
        let sun = icon(WeatherIcon::Sun);
        assert_eq!(sun.pixel(26, 26), Some(SUN));
        assert!(count(&sun, SUN_RAY) > 0);

        let cloud = icon(WeatherIcon::Cloud);
        assert_eq!(cloud.pixel(28, 23), Some(CLOUD));
        assert_eq!(cloud.pixel(37, 29), Some(CLOUD_DARK));
        assert_eq!(count(&cloud, SUN), 0);

        let rain = icon(WeatherIcon::Rain);
        assert_eq!(rain.pixel(28, 17), Some(RAIN_CLOUD));
        assert!(count(&rain, RAIN) > 0);
        assert_eq!(count(&rain, CLOUD), 0);

        let snow = icon(WeatherIcon::Snow);
        assert_eq!(snow.pixel(26, 26), Some(SNOW));
        assert!(count(&snow, SNOW) > 13);

        let fog = icon(WeatherIcon::Fog);
        for y in [19, 25, 31] {
            assert_eq!(fog.pixel(26, y), Some(FOG), "row {y}");
        }
        assert_eq!(fog.pixel(26, 22), Some(Rgb888::BLACK));

        let unknown = icon(WeatherIcon::Unknown);
        assert_eq!(unknown.pixel(26, 26), Some(SUN_DIM));
    }

    #[test]
    fn test_weather_card_draws_condition_icon() {
        let snap = Snapshot::from_pairs([
            (keys::TEMP, json!("8")),
            (keys::TEXT, json!("Light rain")),
            (keys::FORECAST, json!([{"tempMin": "5", "tempMax": "9"}])),
        ]);
        let mut canvas = Canvas::new(infoscreen_display::Frame::new(140, 50));
        weather_card(&mut canvas, 0, 0, 140, 50, &snap);
        // icon square at (10, 8)
        assert_eq!(canvas.pixel(28, 15), Some(RAIN_CLOUD));
        let temp = canvas.texts().iter().find(|t| t.text == "8C").unwrap();
        assert_eq!(temp.position.x, 12 + ICON_SIZE);
        assert!(canvas.has_text("Light rain"));
    }

    #[test]
    fn test_aqi_colors() {
        assert_eq!(aqi_color(42.0), rgb(50, 200, 100));
        assert_eq!(aqi_color(100.0), rgb(220, 200, 50));
        assert_eq!(aqi_color(151.0), rgb(255, 80, 80));
    }
}
