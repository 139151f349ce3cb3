//! Time-of-day theming
//!
//! | Hours   | Mood        | bg_top        | bg_bottom     | accent         |
//! |---------|-------------|---------------|---------------|----------------|
//! | 05–08   | dawn        | (22, 18, 28)  | (28, 22, 18)  | (80, 60, 40)   |
//! | 08–12   | morning     | (15, 20, 28)  | (18, 25, 32)  | (40, 70, 80)   |
//! | 12–17   | afternoon   | (16, 22, 32)  | (20, 26, 38)  | (50, 80, 100)  |
//! | 17–20   | dusk        | (25, 18, 25)  | (30, 20, 28)  | (90, 60, 70)   |
//! | 20–23   | evening     | (18, 16, 28)  | (22, 18, 35)  | (60, 50, 90)   |
//! | 23–05   | late night  | (12, 14, 22)  | (15, 16, 26)  | (40, 45, 70)   |
//!
//! Inside the night window the finished frame is dimmed channel-wise.

use chrono::{NaiveTime, Timelike};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use infoscreen_display::Frame;

/// Colors and dimming for one moment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemePalette {
    pub bg_top: Rgb888,
    pub bg_bottom: Rgb888,
    pub accent: Rgb888,
    pub night: bool,
    /// 1.0 outside the night window
    pub brightness: f32,
}

/// Local-time interval in which frames are dimmed
///
/// `start <= t < end`; a window whose end is before its start wraps
/// past midnight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NightWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub brightness: f32,
}

impl Default for NightWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(1, 30, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            brightness: 0.6,
        }
    }
}

impl NightWindow {
    pub fn contains(&self, t: NaiveTime) -> bool {
        // minute resolution
        let t = t.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(t);
        if self.start <= self.end {
            self.start <= t && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }
}

const fn rgb(r: u8, g: u8, b: u8) -> Rgb888 {
    Rgb888::new(r, g, b)
}

fn band_colors(hour: u32) -> (Rgb888, Rgb888, Rgb888) {
    match hour {
        5..=7 => (rgb(22, 18, 28), rgb(28, 22, 18), rgb(80, 60, 40)),
        8..=11 => (rgb(15, 20, 28), rgb(18, 25, 32), rgb(40, 70, 80)),
        12..=16 => (rgb(16, 22, 32), rgb(20, 26, 38), rgb(50, 80, 100)),
        17..=19 => (rgb(25, 18, 25), rgb(30, 20, 28), rgb(90, 60, 70)),
        20..=22 => (rgb(18, 16, 28), rgb(22, 18, 35), rgb(60, 50, 90)),
        _ => (rgb(12, 14, 22), rgb(15, 16, 26), rgb(40, 45, 70)),
    }
}

/// Resolve the palette for a local time
pub fn palette_at(now: NaiveTime, night: &NightWindow) -> ThemePalette {
    let (bg_top, bg_bottom, accent) = band_colors(now.hour());
    let is_night = night.contains(now);
    ThemePalette {
        bg_top,
        bg_bottom,
        accent,
        night: is_night,
        brightness: if is_night { night.brightness } else { 1.0 },
    }
}

/// Fill the frame with a vertical gradient from `top` to `bottom`
pub fn fill_gradient(frame: &mut Frame, top: Rgb888, bottom: Rgb888) {
    let height = frame.height();
    for y in 0..height {
        let ratio = y as f32 / height as f32;
        let mix = |a: u8, b: u8| (a as f32 * (1.0 - ratio) + b as f32 * ratio).round() as u8;
        let color = Rgb888::new(
            mix(top.r(), bottom.r()),
            mix(top.g(), bottom.g()),
            mix(top.b(), bottom.b()),
        );
        frame.fill_rows(y, y + 1, color);
    }
}

/// `round(c * m)` clamped to a byte
pub fn scale_channel(c: u8, m: f32) -> u8 {
    (c as f32 * m).round().clamp(0.0, 255.0) as u8
}

/// Lookup table for [`scale_channel`] at multiplier `m`
pub fn brightness_lut(m: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (c, slot) in lut.iter_mut().enumerate() {
        *slot = scale_channel(c as u8, m);
    }
    lut
}

/// Dim every channel of `frame` by `m`; `m == 1.0` leaves it untouched
pub fn apply_brightness(frame: &mut Frame, m: f32) {
    if (m - 1.0).abs() < f32::EPSILON {
        return;
    }
    frame.map_channels(&brightness_lut(m));
}

/// Blend `color` toward black by `factor` in `0.0..=1.0`
pub fn dim(color: Rgb888, factor: f32) -> Rgb888 {
    Rgb888::new(
        scale_channel(color.r(), factor),
        scale_channel(color.g(), factor),
        scale_channel(color.b(), factor),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_hour_bands() {
        let night = NightWindow::default();
        assert_eq!(palette_at(hm(5, 0), &night).bg_top, rgb(22, 18, 28));
        assert_eq!(palette_at(hm(7, 59), &night).accent, rgb(80, 60, 40));
        assert_eq!(palette_at(hm(8, 0), &night).bg_top, rgb(15, 20, 28));
        assert_eq!(palette_at(hm(12, 30), &night).accent, rgb(50, 80, 100));
        assert_eq!(palette_at(hm(19, 0), &night).bg_bottom, rgb(30, 20, 28));
        assert_eq!(palette_at(hm(22, 59), &night).bg_top, rgb(18, 16, 28));
        assert_eq!(palette_at(hm(23, 0), &night).bg_top, rgb(12, 14, 22));
        assert_eq!(palette_at(hm(3, 0), &night).bg_top, rgb(12, 14, 22));
    }

    #[test]
    fn test_night_window_bounds() {
        let night = NightWindow::default();
        assert!(!night.contains(hm(1, 29)));
        assert!(night.contains(hm(1, 30)));
        assert!(night.contains(NaiveTime::from_hms_opt(7, 59, 59).unwrap()));
        assert!(!night.contains(hm(8, 0)));

        let p = palette_at(hm(2, 0), &night);
        assert!(p.night);
        assert_eq!(p.brightness, 0.6);
        assert_eq!(palette_at(hm(12, 0), &night).brightness, 1.0);
    }

    #[test]
    fn test_night_window_wraps_midnight() {
        let night = NightWindow {
            start: hm(22, 0),
            end: hm(6, 0),
            brightness: 0.5,
        };
        assert!(night.contains(hm(23, 0)));
        assert!(night.contains(hm(0, 15)));
        assert!(!night.contains(hm(6, 0)));
        assert!(!night.contains(hm(12, 0)));
    }

    #[test]
    fn test_brightness_identity_and_scaling() {
        let mut frame = Frame::filled(2, 2, rgb(200, 101, 1));
        let before = frame.clone();
        apply_brightness(&mut frame, 1.0);
        assert_eq!(frame, before);

        apply_brightness(&mut frame, 0.6);
        // 200*0.6=120, 101*0.6=60.6, 1*0.6=0.6
        assert_eq!(frame.get_pixel(0, 0), Some(rgb(120, 61, 1)));
    }

    #[test]
    fn test_lut_matches_scale_channel() {
        let lut = brightness_lut(0.6);
        for c in 0..=255u8 {
            assert_eq!(lut[c as usize], scale_channel(c, 0.6));
        }
        assert_eq!(brightness_lut(1.0)[255], 255);
    }

    #[test]
    fn test_gradient_endpoints() {
        let mut frame = Frame::new(4, 10);
        fill_gradient(&mut frame, rgb(0, 0, 0), rgb(100, 100, 100));
        assert_eq!(frame.get_pixel(0, 0), Some(rgb(0, 0, 0)));
        assert_eq!(frame.get_pixel(3, 5), Some(rgb(50, 50, 50)));
        assert_eq!(frame.get_pixel(0, 9), Some(rgb(90, 90, 90)));
    }
}
