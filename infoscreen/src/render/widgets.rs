//! Reusable page elements: palette constants, bars, candle charts

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

use super::canvas::{lighten, rgb, Canvas};
use crate::model::Candle;
use crate::theme::ThemePalette;

pub const UP: Rgb888 = rgb(38, 166, 91);
pub const DOWN: Rgb888 = rgb(234, 57, 67);
pub const TEXT_BRIGHT: Rgb888 = rgb(200, 210, 225);
pub const TEXT: Rgb888 = rgb(180, 190, 210);
pub const TEXT_DIM: Rgb888 = rgb(120, 130, 150);
pub const OK: Rgb888 = rgb(100, 200, 150);
pub const WARN: Rgb888 = rgb(255, 200, 100);
pub const CRIT: Rgb888 = rgb(255, 100, 100);
pub const BAR_BG: Rgb888 = rgb(40, 45, 55);
pub const PANEL: Rgb888 = rgb(20, 25, 32);

/// `crit` above `high`, `warn` above `low`, otherwise `normal`
pub fn level_color(value: f64, low: f64, high: f64, normal: Rgb888) -> Rgb888 {
    if value > high {
        CRIT
    } else if value > low {
        WARN
    } else {
        normal
    }
}

/// Grid line color derived from the background
pub fn grid_color(palette: &ThemePalette) -> Rgb888 {
    lighten(palette.bg_top, 15, 20, 25)
}

/// Header strip slightly brighter than the background
pub fn header_bar(canvas: &mut Canvas, height: u32, palette: &ThemePalette) {
    let width = canvas.width() as u32;
    canvas.fill_rect(0, 0, width, height, lighten(palette.bg_top, 10, 12, 16));
    canvas.hline(0, width as i32, height as i32 - 1, palette.accent);
}

/// Percentage bar; `value` is clamped to `0..=100`
pub fn mini_bar(canvas: &mut Canvas, x: i32, y: i32, width: u32, height: u32, value: f64, color: Rgb888) {
    canvas.fill_rounded(x, y, width, height, 2, BAR_BG);
    let fill = (width as f64 * value.clamp(0.0, 100.0) / 100.0) as u32;
    if fill > 2 {
        canvas.fill_rounded(x, y, fill, height, 2, color);
    }
}

/// Maps prices onto a vertical pixel span
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScale {
    min: f64,
    range: f64,
    top: i32,
    height: i32,
}

impl PriceScale {
    /// Scale covering `low..=high`, padded by `margin` of the range
    /// (or 1% of `high` when flat)
    pub fn new(low: f64, high: f64, margin: f64, top: i32, height: i32) -> Self {
        let pad = if high != low { (high - low) * margin } else { high.abs() * 0.01 };
        let (min, max) = (low - pad, high + pad);
        let range = if max != min { max - min } else { 1.0 };
        Self { min, range, top, height }
    }

    /// Pixel row for `price`, clamped to the span
    pub fn y(&self, price: f64) -> i32 {
        let y = self.top + ((1.0 - (price - self.min) / self.range) * self.height as f64) as i32;
        y.clamp(self.top, self.top + self.height)
    }
}

/// Candlestick chart of `candles` inside `(x, y, w, h)`; returns the scale
/// used, or `None` when there are fewer than three candles
pub fn candle_chart(canvas: &mut Canvas, x: i32, y: i32, w: i32, h: i32, candles: &[Candle]) -> Option<PriceScale> {
    if candles.len() < 3 {
        return None;
    }
    let low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let scale = PriceScale::new(low, high, 0.05, y, h);

    let n = candles.len() as i32;
    let bar_w = ((w - 6 - n) / n).max(3);
    let gap = 1;
    for (i, candle) in candles.iter().enumerate() {
        let bx = x + i as i32 * (bar_w + gap);
        let center = bx + bar_w / 2;
        let color = if candle.is_up() { UP } else { DOWN };

        canvas.line(
            Point::new(center, scale.y(candle.high)),
            Point::new(center, scale.y(candle.low)),
            color,
            1,
        );
        let (open_y, close_y) = (scale.y(candle.open), scale.y(candle.close));
        let top = open_y.min(close_y);
        let bottom = open_y.max(close_y).max(top + 2);
        canvas.fill_rect(bx, top, (bar_w + 1) as u32, (bottom - top + 1) as u32, color);
    }
    Some(scale)
}

/// Tiny candle strip synthesised from consecutive values
pub fn mini_kline(canvas: &mut Canvas, x: i32, y: i32, w: i32, h: i32, values: &[f64]) {
    if values.len() < 2 {
        return;
    }
    let up = rgb(100, 255, 180);
    let down = rgb(255, 100, 100);
    let n = values.len() as i32;
    let bar_w = ((w - n * 2) / n).max(3);
    let low = values.iter().copied().fold(f64::INFINITY, f64::min);
    let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let scale = PriceScale::new(low, high, 0.15, y, h);

    for (i, pair) in values.windows(2).enumerate() {
        let (open, close) = (pair[0], pair[1]);
        let wick = (close - open).abs() * 0.15;
        let bx = x + i as i32 * (bar_w + 1);
        let center = bx + bar_w / 2;
        let color = if close >= open { up } else { down };

        canvas.line(
            Point::new(center, scale.y(open.max(close) + wick)),
            Point::new(center, scale.y(open.min(close) - wick)),
            color,
            1,
        );
        let top = scale.y(open).min(scale.y(close));
        let bottom = scale.y(open).max(scale.y(close)).max(top + 1);
        canvas.fill_rect(bx, top, (bar_w + 1) as u32, (bottom - top + 1) as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infoscreen_display::Frame;

    fn candle(ts: i64, open: f64, close: f64) -> Candle {
        Candle {
            timestamp: ts,
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 0.0,
        }
    }

    #[test]
    fn test_level_color() {
        assert_eq!(level_color(90.0, 50.0, 80.0, OK), CRIT);
        assert_eq!(level_color(60.0, 50.0, 80.0, OK), WARN);
        assert_eq!(level_color(50.0, 50.0, 80.0, OK), OK);
    }

    #[test]
    fn test_price_scale_bounds() {
        let scale = PriceScale::new(100.0, 200.0, 0.0, 10, 100);
        assert_eq!(scale.y(200.0), 10);
        assert_eq!(scale.y(100.0), 110);
        assert_eq!(scale.y(150.0), 60);
        // out of range clamps
        assert_eq!(scale.y(1000.0), 10);
        assert_eq!(scale.y(0.0), 110);

        let flat = PriceScale::new(50.0, 50.0, 0.05, 0, 40);
        assert_eq!(flat.y(50.0), 20);
    }

    #[test]
    fn test_mini_bar_fill() {
        let mut canvas = Canvas::new(Frame::new(60, 10));
        mini_bar(&mut canvas, 0, 0, 50, 6, 50.0, UP);
        assert_eq!(canvas.pixel(10, 3), Some(UP));
        assert_eq!(canvas.pixel(40, 3), Some(BAR_BG));

        mini_bar(&mut canvas, 0, 0, 50, 6, 250.0, DOWN);
        assert_eq!(canvas.pixel(45, 3), Some(DOWN));
    }

    #[test]
    fn test_candle_chart_needs_three() {
        let mut canvas = Canvas::new(Frame::new(100, 100));
        assert!(candle_chart(&mut canvas, 0, 0, 100, 100, &[candle(1, 1.0, 2.0), candle(2, 2.0, 3.0)]).is_none());

        let candles = [candle(1, 10.0, 12.0), candle(2, 12.0, 11.0), candle(3, 11.0, 15.0)];
        let scale = candle_chart(&mut canvas, 0, 0, 100, 100, &candles).unwrap();
        assert!(scale.y(16.0) < scale.y(9.0));
        let up = canvas.frame().pixels().iter().filter(|p| **p == UP).count();
        let down = canvas.frame().pixels().iter().filter(|p| **p == DOWN).count();
        assert!(up > 0 && down > 0);
    }
}
