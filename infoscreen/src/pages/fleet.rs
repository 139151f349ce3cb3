//! Host monitor grid

use chrono::Local;
use embedded_graphics::pixelcolor::Rgb888;

use super::Page;
use crate::error::RenderError;
use crate::model::FleetClient;
use crate::render::canvas::truncate;
use crate::render::widgets::{header_bar, level_color, mini_bar, OK, TEXT, TEXT_BRIGHT, TEXT_DIM};
use crate::render::{rgb, Canvas, FontSize, RenderContext};
use crate::sources::fleet::format_speed;
use crate::store::{keys, Snapshot};

const KEYS: &[&str] = &[keys::FLEET_CLIENTS, keys::FLEET_STATUS, keys::FLEET_LAST_UPDATE];

const HEADER_H: i32 = 30;
const FOOTER_H: i32 = 14;
const COLUMNS: i32 = 2;
const ROWS: i32 = 3;
const MARGIN_X: i32 = 5;
const MARGIN_Y: i32 = 34;
const GAP_X: i32 = 5;
const GAP_Y: i32 = 4;

const ONLINE: Rgb888 = rgb(60, 180, 120);
const OFFLINE: Rgb888 = rgb(180, 80, 80);

/// `(label, warn above, critical above)` for the usage bars
const THRESHOLDS: [(&str, f64, f64); 3] = [("CPU", 50.0, 80.0), ("RAM", 60.0, 85.0), ("DSK", 70.0, 90.0)];

/// `12s ago` under a minute, `3m ago` after
pub fn age_label(elapsed_secs: i64) -> String {
    let elapsed = elapsed_secs.max(0);
    if elapsed < 60 {
        format!("Updated {elapsed}s ago")
    } else {
        format!("Updated {}m ago", elapsed / 60)
    }
}

fn client_card(canvas: &mut Canvas, x: i32, y: i32, w: i32, h: i32, client: &FleetClient) {
    let online = client.is_online();
    let border = if online { ONLINE } else { OFFLINE };
    canvas.card(x, y, w as u32, h as u32, 4, rgb(18, 22, 30), border);

    let name_color = if online { TEXT_BRIGHT } else { TEXT_DIM };
    canvas.text(x + 6, y + 3, &truncate(&client.name, 10), FontSize::Body, name_color);
    if client.temperature > 0.0 {
        let temp = format!("{:.0}C", client.temperature);
        let color = level_color(client.temperature, 60.0, 75.0, OK);
        canvas.text_right(x + w - 6, y + 5, &temp, FontSize::Small, color);
    }

    let usage = [client.cpu, client.memory, client.disk];
    for (i, ((label, warn, crit), value)) in THRESHOLDS.iter().zip(usage).enumerate() {
        let row_y = y + 18 + i as i32 * 10;
        let color = level_color(value, *warn, *crit, OK);
        canvas.text(x + 6, row_y, label, FontSize::Small, TEXT_DIM);
        mini_bar(canvas, x + 28, row_y + 2, 48, 5, value, color);
        canvas.text(x + 80, row_y, &format!("{value:>5.1}%"), FontSize::Small, TEXT);
    }

    let bottom = y + h - 12;
    let load = client.load[0];
    let load_color = level_color(load, 1.0, 2.0, OK);
    let right = canvas.text(x + 6, bottom, "LD", FontSize::Small, TEXT_DIM);
    canvas.text(right + 4, bottom, &format!("{load:.2}"), FontSize::Small, load_color);
    let net = format!(
        "^{} v{}",
        format_speed(client.network_up),
        format_speed(client.network_down)
    );
    canvas.text_right(x + w - 6, bottom, &net, FontSize::Small, rgb(120, 170, 220));
}

pub struct FleetPage;

impl Page for FleetPage {
    fn name(&self) -> &'static str {
        "fleet"
    }

    fn description(&self) -> &'static str {
        "Monitored hosts with usage, load and network rates"
    }

    fn keys(&self) -> &'static [&'static str] {
        KEYS
    }

    fn draw(&self, canvas: &mut Canvas, snap: &Snapshot, ctx: &RenderContext<'_>) -> Result<(), RenderError> {
        let (width, height) = (canvas.width(), canvas.height());
        let clients: Vec<FleetClient> = snap.list_of(keys::FLEET_CLIENTS);

        header_bar(canvas, HEADER_H as u32, &ctx.palette);
        canvas.text(8, 8, "SERVER MONITOR", FontSize::Title, TEXT_BRIGHT);
        let online = clients.iter().filter(|c| c.is_online()).count();
        let count_color = if online == clients.len() { ONLINE } else { OFFLINE };
        canvas.text(150, 10, &format!("{}/{}", online, clients.len()), FontSize::Body, count_color);
        canvas.text_right(width - 8, 10, &ctx.now.format("%H:%M:%S").to_string(), FontSize::Body, TEXT);

        if clients.is_empty() {
            let status = snap.string(keys::FLEET_STATUS, "Loading...");
            canvas.text_centered(width / 2, height / 2 - 6, &status, FontSize::Title, TEXT_DIM);
            return Ok(());
        }

        let card_w = (width - 2 * MARGIN_X - (COLUMNS - 1) * GAP_X) / COLUMNS;
        let card_h = (height - MARGIN_Y - FOOTER_H - (ROWS - 1) * GAP_Y) / ROWS;
        for (i, client) in clients.iter().take((COLUMNS * ROWS) as usize).enumerate() {
            let (row, col) = (i as i32 / COLUMNS, i as i32 % COLUMNS);
            let x = MARGIN_X + col * (card_w + GAP_X);
            let y = MARGIN_Y + row * (card_h + GAP_Y);
            client_card(canvas, x, y, card_w, card_h, client);
        }

        let last_update = snap.i64(keys::FLEET_LAST_UPDATE, 0);
        if last_update > 0 {
            let now = ctx
                .now
                .and_local_timezone(Local)
                .earliest()
                .map(|t| t.timestamp())
                .unwrap_or(last_update);
            let label = age_label(now - last_update);
            canvas.text_right(width - 6, height - FOOTER_H + 2, &label, FontSize::Small, TEXT_DIM);
        }
        Ok(())
    }
}
