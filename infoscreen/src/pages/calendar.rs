//! Month grid with today highlighted and a countdown to a configured date

use chrono::{Datelike, NaiveDate};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

use super::Page;
use crate::error::RenderError;
use crate::render::{rgb, Canvas, FontSize, RenderContext};
use crate::store::Snapshot;

const MONTHS: [&str; 12] = [
    "JANUARY",
    "FEBRUARY",
    "MARCH",
    "APRIL",
    "MAY",
    "JUNE",
    "JULY",
    "AUGUST",
    "SEPTEMBER",
    "OCTOBER",
    "NOVEMBER",
    "DECEMBER",
];
const WEEK_HEADER: [&str; 7] = ["MO", "TU", "WE", "TH", "FR", "SA", "SU"];

const GRID_X: i32 = 8;
const GRID_Y: i32 = 36;
const CELL_W: i32 = 44;
const CELL_H: i32 = 22;
const COUNTDOWN_Y: i32 = 178;

const TODAY: Rgb888 = rgb(50, 130, 255);
const WEEKEND: Rgb888 = rgb(220, 130, 100);
const WEEKDAY: Rgb888 = rgb(180, 190, 210);

/// Days from `today` until `target`
pub fn days_until(today: NaiveDate, target: NaiveDate) -> i64 {
    (target - today).num_days()
}

/// Monday-first `(day, row, column)` for each day of `date`'s month
pub fn month_cells(date: NaiveDate) -> Vec<(u32, i32, i32)> {
    let Some(first) = date.with_day(1) else {
        return Vec::new();
    };
    let offset = first.weekday().num_days_from_monday() as i32;
    first
        .iter_days()
        .take_while(|d| d.month() == first.month())
        .map(|d| {
            let slot = offset + d.day0() as i32;
            (d.day(), slot / 7, slot % 7)
        })
        .collect()
}

fn countdown_color(days: i64) -> Rgb888 {
    if days <= 7 {
        rgb(255, 80, 80)
    } else if days <= 30 {
        rgb(255, 180, 80)
    } else {
        rgb(100, 200, 255)
    }
}

fn draw_countdown(canvas: &mut Canvas, ctx: &RenderContext<'_>) {
    let width = canvas.width();
    canvas.fill_rounded(8, COUNTDOWN_Y, (width - 16) as u32, 52, 6, rgb(20, 25, 35));
    canvas.text(18, COUNTDOWN_Y + 8, "COUNTDOWN", FontSize::Small, rgb(120, 130, 150));
    canvas.text(18, COUNTDOWN_Y + 24, &ctx.settings.countdown_name, FontSize::Title, rgb(200, 210, 225));

    let days = days_until(ctx.now.date(), ctx.settings.countdown_date);
    if days <= 0 {
        canvas.text_right(width - 18, COUNTDOWN_Y + 18, "expired", FontSize::Title, rgb(255, 100, 100));
        return;
    }
    canvas.text_right(width - 18, COUNTDOWN_Y + 34, "DAYS", FontSize::Small, rgb(120, 130, 150));
    canvas.text_scaled(
        width - 18 - crate::render::text_width(&days.to_string(), FontSize::Large) * 2 - 34,
        COUNTDOWN_Y + 6,
        &days.to_string(),
        FontSize::Large,
        countdown_color(days),
        2,
    );
}

pub struct CalendarPage;

impl Page for CalendarPage {
    fn name(&self) -> &'static str {
        "calendar"
    }

    fn description(&self) -> &'static str {
        "Current month with today marked and a day countdown"
    }

    fn keys(&self) -> &'static [&'static str] {
        &[]
    }

    fn draw(&self, canvas: &mut Canvas, _snap: &Snapshot, ctx: &RenderContext<'_>) -> Result<(), RenderError> {
        let today = ctx.now.date();
        let width = canvas.width();

        let month = MONTHS[today.month0() as usize];
        let right = canvas.text(15, 4, month, FontSize::Large, rgb(100, 180, 255));
        canvas.text(right + 10, 9, &today.year().to_string(), FontSize::Body, rgb(120, 130, 150));
        canvas.hline(8, width - 8, 28, rgb(40, 50, 70));

        for (col, label) in WEEK_HEADER.iter().enumerate() {
            let color = if col >= 5 { rgb(255, 140, 100) } else { rgb(100, 120, 150) };
            let cx = GRID_X + col as i32 * CELL_W + CELL_W / 2;
            canvas.text_centered(cx, GRID_Y - 4, label, FontSize::Small, color);
        }

        for (day, row, col) in month_cells(today) {
            let cx = GRID_X + col * CELL_W + CELL_W / 2;
            let cy = GRID_Y + 8 + row * CELL_H + CELL_H / 2;
            let label = day.to_string();
            let color = if day == today.day() {
                canvas.circle(Point::new(cx, cy), 11, TODAY);
                Rgb888::WHITE
            } else if col >= 5 {
                WEEKEND
            } else {
                WEEKDAY
            };
            canvas.text_centered(cx, cy - 6, &label, FontSize::Body, color);
        }

        draw_countdown(canvas, ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::tests::{draw_page, with_context};
    use crate::render::PageSettings;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_cells_monday_first() {
        // October 2026 starts on a Thursday
        let cells = month_cells(date(2026, 10, 19));
        assert_eq!(cells.len(), 31);
        assert_eq!(cells[0], (1, 0, 3));
        assert_eq!(cells[18], (19, 3, 0));
        assert_eq!(cells[30], (31, 4, 5));

        // February 2027 starts on a Monday
        let cells = month_cells(date(2027, 2, 1));
        assert_eq!(cells.len(), 28);
        assert_eq!(cells[0], (1, 0, 0));
    }

    #[test]
    fn test_days_until() {
        assert_eq!(days_until(date(2026, 10, 19), date(2027, 2, 6)), 110);
        assert_eq!(days_until(date(2027, 2, 6), date(2027, 2, 6)), 0);
    }

    #[test]
    fn test_page_draws_month_and_countdown() {
        let canvas = draw_page(&CalendarPage, &Snapshot::default());
        assert!(canvas.has_text("OCTOBER"));
        assert!(canvas.has_text("2026"));
        assert!(canvas.has_text("CNY 2027"));
        assert!(canvas.has_text("110"));
        let today = canvas.texts().iter().find(|t| t.text == "19").unwrap();
        assert_eq!(today.color, Rgb888::WHITE);
        let saturday = canvas.texts().iter().find(|t| t.text == "24").unwrap();
        assert_eq!(saturday.color, WEEKEND);
    }

    #[test]
    fn test_expired_countdown() {
        let settings = PageSettings {
            countdown_date: date(2026, 1, 1),
            ..PageSettings::default()
        };
        with_context(|base| {
            let ctx = RenderContext {
                settings: &settings,
                ..*base
            };
            let mut canvas = Canvas::new(infoscreen_display::Frame::new(320, 240));
            CalendarPage.draw(&mut canvas, &Snapshot::default(), &ctx).unwrap();
            assert!(canvas.has_text("expired"));
            assert!(!canvas.has_text("DAYS"));
        });
    }
}
