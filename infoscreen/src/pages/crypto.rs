//! Three-coin market overview with candle charts and account balance

use std::collections::BTreeMap;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::Point;

use super::Page;
use crate::error::RenderError;
use crate::model::{AssetPoint, Candle, Ticker};
use crate::render::widgets::{self, candle_chart, header_bar, mini_kline, DOWN, PANEL, TEXT, TEXT_BRIGHT, TEXT_DIM, UP};
use crate::render::{rgb, Canvas, FontSize, RenderContext};
use crate::sources::market::format_crypto_price;
use crate::store::{keys, Snapshot};

const KEYS: &[&str] = &[
    keys::CRYPTO,
    keys::CRYPTO_KLINES,
    keys::CRYPTO_STATUS,
    keys::ASSET,
    keys::ASSET_HISTORY,
];

const HEADER_H: i32 = 24;
const TITLE_H: i32 = 28;
const ASSET_COLOR: Rgb888 = rgb(255, 230, 100);
const KLINE_POINTS: usize = 15;

/// Price label that fits a column: whole dollars once it gets long
pub fn price_label(price: f64) -> String {
    let text = format!("${}", format_crypto_price(price));
    if text.len() > 10 {
        format!("${price:.0}")
    } else {
        text
    }
}

/// Percent change between the first and last balance sample
pub fn history_change(history: &[AssetPoint]) -> Option<f64> {
    let (first, last) = (history.first()?.value(), history.last()?.value());
    (history.len() >= 2 && first != 0.0).then(|| (last - first) / first * 100.0)
}

fn change_color(change: f64) -> Rgb888 {
    if change >= 0.0 {
        UP
    } else {
        DOWN
    }
}

fn draw_header(canvas: &mut Canvas, snap: &Snapshot, ctx: &RenderContext<'_>) {
    let width = canvas.width();
    header_bar(canvas, HEADER_H as u32, &ctx.palette);
    canvas.text(6, 7, "ASSETS", FontSize::Small, TEXT_DIM);
    let asset = snap.string(keys::ASSET, "--");
    let right = canvas.text(46, 5, &asset, FontSize::Body, ASSET_COLOR);

    let history: Vec<AssetPoint> = snap.list_of(keys::ASSET_HISTORY);
    if let Some(change) = history_change(&history) {
        canvas.text(right + 4, 7, &format!("{change:+.1}%"), FontSize::Small, change_color(change));
    }
    if history.len() >= 3 {
        let values: Vec<f64> = history
            .iter()
            .skip(history.len().saturating_sub(KLINE_POINTS))
            .map(AssetPoint::value)
            .collect();
        mini_kline(canvas, 170, 4, 80, 16, &values);
    }
    canvas.text_right(width - 6, 6, &ctx.now.format("%H:%M").to_string(), FontSize::Body, TEXT);
}

fn draw_column(
    canvas: &mut Canvas,
    x: i32,
    w: i32,
    coin: &str,
    ticker: Option<&Ticker>,
    candles: &[Candle],
    ctx: &RenderContext<'_>,
) {
    let top = HEADER_H + 2;
    canvas.fill_rect(x + 1, top, (w - 2) as u32, TITLE_H as u32, PANEL);
    canvas.text(x + 4, top + 2, coin, FontSize::Body, TEXT_BRIGHT);
    match ticker {
        Some(ticker) => {
            let color = change_color(ticker.change);
            canvas.text_right(x + w - 4, top + 3, &format!("{:+.1}%", ticker.change), FontSize::Small, color);
            canvas.text(x + 4, top + 16, &price_label(ticker.price), FontSize::Small, color);
        }
        None => {
            canvas.text(x + 4, top + 16, "--", FontSize::Small, TEXT_DIM);
        }
    }

    let chart_top = top + TITLE_H + 6;
    let chart_h = canvas.height() - chart_top - 8;
    let grid = widgets::grid_color(&ctx.palette);
    for i in 0..4 {
        canvas.dashed_hline(x + 2, x + w - 2, chart_top + i * chart_h / 3, grid, 2, 3);
    }

    match candle_chart(canvas, x + 3, chart_top, w - 6, chart_h, candles) {
        Some(scale) => {
            if let Some(last) = candles.last() {
                let y = scale.y(last.close);
                let color = if last.is_up() { UP } else { DOWN };
                canvas.dashed_hline(x + 2, x + w - 2, y, color, 3, 2);
                canvas.fill_rect(x + w - 5, y - 2, 4, 5, color);
            }
        }
        None => {
            canvas.text_centered(x + w / 2, chart_top + chart_h / 2 - 6, "...", FontSize::Body, TEXT_DIM);
        }
    }
}

pub struct CryptoPage;

impl Page for CryptoPage {
    fn name(&self) -> &'static str {
        "crypto"
    }

    fn description(&self) -> &'static str {
        "Tickers and hourly candles for the configured coins plus account balance"
    }

    fn keys(&self) -> &'static [&'static str] {
        KEYS
    }

    fn draw(&self, canvas: &mut Canvas, snap: &Snapshot, ctx: &RenderContext<'_>) -> Result<(), RenderError> {
        draw_header(canvas, snap, ctx);

        let tickers: Vec<Ticker> = snap.list_of(keys::CRYPTO);
        let klines: BTreeMap<String, Vec<Candle>> = snap.get_as(keys::CRYPTO_KLINES).unwrap_or_default();
        let coins = &ctx.settings.coins;
        if coins.is_empty() {
            let status = snap.string(keys::CRYPTO_STATUS, "No coins configured");
            canvas.text_centered(canvas.width() / 2, 110, &status, FontSize::Body, TEXT_DIM);
            return Ok(());
        }

        let col_w = canvas.width() / coins.len() as i32;
        for (i, coin) in coins.iter().enumerate() {
            let x = i as i32 * col_w;
            let ticker = tickers.iter().find(|t| t.name.eq_ignore_ascii_case(coin));
            let candles = klines.get(coin.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            draw_column(canvas, x, col_w, coin, ticker, candles, ctx);
            if i > 0 {
                canvas.line(
                    Point::new(x, HEADER_H + 2),
                    Point::new(x, canvas.height() - 4),
                    widgets::grid_color(&ctx.palette),
                    1,
                );
            }
        }
        Ok(())
    }
}
