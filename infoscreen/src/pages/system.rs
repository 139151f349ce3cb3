//! Local system status page and the compact card reused by the clock page

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

use super::Page;
use crate::error::RenderError;
use crate::render::widgets::{self, header_bar, level_color, mini_bar, OK, TEXT, TEXT_BRIGHT, TEXT_DIM};
use crate::render::{rgb, Canvas, FontSize, RenderContext};
use crate::store::{keys, Snapshot};

const KEYS: &[&str] = &[
    keys::CPU_TEMP,
    keys::CPU_USAGE,
    keys::RAM,
    keys::DISK,
    keys::UPTIME,
    keys::IP,
];

/// `(label, value, bar color)` for the three usage meters
const METERS: [(&str, &str, (u8, u8, u8)); 3] = [
    ("CPU", keys::CPU_USAGE, (100, 180, 255)),
    ("RAM", keys::RAM, (180, 130, 255)),
    ("DSK", keys::DISK, (100, 200, 150)),
];

/// Whole-percent labels for CPU, RAM and disk, e.g. `("CPU", "42%")`
pub fn system_labels(snap: &Snapshot) -> [(&'static str, String); 3] {
    METERS.map(|(label, key, _)| (label, format!("{}%", snap.f64(key, 0.0) as i64)))
}

fn temp_color(temp: f64) -> Rgb888 {
    level_color(temp, 55.0, 70.0, OK)
}

/// Compact temperature, uptime and usage card
pub fn system_card(canvas: &mut Canvas, x: i32, y: i32, width: u32, height: u32, snap: &Snapshot) {
    canvas.fill_rounded(x, y, width, height, 6, rgb(18, 22, 30));
    for i in 0..3u8 {
        let alpha = 1.0 - f32::from(i) * 0.3;
        let shade = |c: u8| (f32::from(c) * alpha) as u8;
        canvas.fill_rect(
            x + width as i32 - 3 + i as i32,
            y + 4,
            1,
            height.saturating_sub(8),
            rgb(shade(80), shade(180), shade(130)),
        );
    }

    let temp = snap.i64(keys::CPU_TEMP, 0);
    canvas.text(x + 6, y + 4, &format!("{temp}C"), FontSize::Body, temp_color(temp as f64));
    let uptime = snap.string(keys::UPTIME, "0d 0h");
    canvas.text_right(x + width as i32 - 8, y + 6, &uptime, FontSize::Small, TEXT_DIM);

    let bar_y = y + 24;
    for (i, (label, key, color)) in METERS.iter().enumerate() {
        let value = snap.f64(key, 0.0);
        let bx = x + 6 + i as i32 * 42;
        canvas.text(bx, bar_y, &label[..1], FontSize::Small, rgb(130, 140, 160));
        let fill = level_color(value, 60.0, 80.0, rgb(color.0, color.1, color.2));
        mini_bar(canvas, bx + 12, bar_y + 1, 28, 8, value, fill);
    }

    let val_y = y + height as i32 - 13;
    for (i, (_, value)) in system_labels(snap).iter().enumerate() {
        canvas.text(x + 8 + i as i32 * 44, val_y, value, FontSize::Small, rgb(140, 150, 170));
    }
}

pub struct SystemPage;

impl Page for SystemPage {
    fn name(&self) -> &'static str {
        "system"
    }

    fn description(&self) -> &'static str {
        "CPU, memory, disk, temperature, uptime and address of this board"
    }

    fn keys(&self) -> &'static [&'static str] {
        KEYS
    }

    fn draw(&self, canvas: &mut Canvas, snap: &Snapshot, ctx: &RenderContext<'_>) -> Result<(), RenderError> {
        let width = canvas.width();
        header_bar(canvas, 28, &ctx.palette);
        canvas.text(8, 7, "SYSTEM", FontSize::Title, TEXT_BRIGHT);
        canvas.text_right(width - 8, 9, &ctx.now.format("%H:%M").to_string(), FontSize::Body, TEXT);

        let labels = system_labels(snap);
        let row_h = 40;
        for (i, ((label, key, color), (_, value_text))) in METERS.iter().zip(labels.iter()).enumerate() {
            let y = 40 + i as i32 * row_h;
            let value = snap.f64(key, 0.0);
            let fill = level_color(value, 60.0, 80.0, rgb(color.0, color.1, color.2));
            canvas.text(12, y, label, FontSize::Title, TEXT);
            mini_bar(canvas, 60, y + 2, (width - 140) as u32, 12, value, fill);
            canvas.text_right(width - 12, y, value_text, FontSize::Large, fill);
        }

        let info_y = 40 + 3 * row_h + 4;
        canvas.hline(8, width - 8, info_y - 6, widgets::grid_color(&ctx.palette));
        let temp = snap.i64(keys::CPU_TEMP, 0);
        canvas.text(12, info_y, "TEMP", FontSize::Body, TEXT_DIM);
        canvas.text(60, info_y, &format!("{temp}C"), FontSize::Body, temp_color(temp as f64));
        canvas.text(160, info_y, "UP", FontSize::Body, TEXT_DIM);
        canvas.text(190, info_y, &snap.string(keys::UPTIME, "--"), FontSize::Body, TEXT);
        canvas.text(12, info_y + 20, "IP", FontSize::Body, TEXT_DIM);
        canvas.text(60, info_y + 20, &snap.string(keys::IP, "N/A"), FontSize::Body, TEXT);

        canvas.line(
            Point::new(0, canvas.height() - 1),
            Point::new(width, canvas.height() - 1),
            ctx.palette.accent,
            1,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::tests::draw_page;
    use serde_json::json;

    fn seeded() -> Snapshot {
        Snapshot::from_pairs([
            (keys::CPU_USAGE, json!(42.0)),
            (keys::RAM, json!(55)),
            (keys::DISK, json!(71.6)),
            (keys::CPU_TEMP, json!(48)),
            (keys::UPTIME, json!("3d 4h")),
            (keys::IP, json!("192.168.1.20")),
        ])
    }

    #[test]
    fn test_labels_are_whole_percent() {
        let labels = system_labels(&seeded());
        assert_eq!(labels[0], ("CPU", String::from("42%")));
        assert_eq!(labels[1], ("RAM", String::from("55%")));
        assert_eq!(labels[2], ("DSK", String::from("71%")));
    }

    #[test]
    fn test_page_prints_metrics() {
        let canvas = draw_page(&SystemPage, &seeded());
        for text in ["42%", "55%", "48C", "3d 4h", "192.168.1.20"] {
            assert!(canvas.has_text(text), "missing {text}");
        }
    }

    #[test]
    fn test_card_prints_metrics() {
        let mut canvas = Canvas::new(infoscreen_display::Frame::new(320, 240));
        system_card(&mut canvas, 170, 155, 140, 50, &seeded());
        assert!(canvas.has_text("42%"));
        assert!(canvas.has_text("3d 4h"));
    }

    #[test]
    fn test_missing_values_show_zero() {
        let canvas = draw_page(&SystemPage, &Snapshot::default());
        assert!(canvas.has_text("0%"));
        assert!(canvas.has_text("N/A"));
    }
}
