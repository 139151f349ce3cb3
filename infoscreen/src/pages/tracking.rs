//! Parcel tracking cards

use embedded_graphics::pixelcolor::Rgb888;

use super::Page;
use crate::error::RenderError;
use crate::model::Package;
use crate::render::canvas::truncate;
use crate::render::widgets::{header_bar, TEXT, TEXT_BRIGHT, TEXT_DIM};
use crate::render::{rgb, Canvas, FontSize, RenderContext};
use crate::store::{keys, Snapshot};

const KEYS: &[&str] = &[keys::PACKAGES, keys::TRACKING_STATUS];

const HEADER_H: i32 = 24;
const CARDS: usize = 2;
const CARD_H: i32 = 94;
const TRACK_LINES: usize = 3;
const HAS_TRACKS: Rgb888 = rgb(80, 200, 140);
const NO_TRACKS: Rgb888 = rgb(200, 150, 80);

/// `SF E 567890`: four carrier characters and the number's tail
pub fn short_number(package: &Package) -> String {
    let carrier: String = package.carrier_name.chars().take(4).collect();
    let digits: Vec<char> = package.tracking_number.chars().collect();
    let tail: String = digits[digits.len().saturating_sub(6)..].iter().collect();
    if carrier.is_empty() {
        tail
    } else {
        format!("{carrier} {tail}")
    }
}

fn package_card(canvas: &mut Canvas, y: i32, package: &Package) {
    let width = canvas.width();
    let strip = if package.tracks.is_empty() { NO_TRACKS } else { HAS_TRACKS };
    canvas.fill_rounded(6, y, (width - 12) as u32, CARD_H as u32, 6, rgb(22, 27, 36));
    canvas.fill_rect(6, y + 6, 3, (CARD_H - 12) as u32, strip);

    canvas.text(16, y + 6, &truncate(package.display_name(), 22), FontSize::Title, TEXT_BRIGHT);
    canvas.text_right(width - 12, y + 8, &short_number(package), FontSize::Small, TEXT_DIM);

    if package.tracks.is_empty() {
        canvas.text(16, y + 30, "Waiting for first scan", FontSize::Body, NO_TRACKS);
        return;
    }
    for (i, event) in package.tracks.iter().take(TRACK_LINES).enumerate() {
        let line_y = y + 28 + i as i32 * 22;
        let (time_color, text_color) = if i == 0 { (HAS_TRACKS, TEXT) } else { (TEXT_DIM, TEXT_DIM) };
        canvas.text(16, line_y, &truncate(&event.time, 11), FontSize::Small, time_color);
        canvas.text(16, line_y + 10, &truncate(&event.context, 46), FontSize::Small, text_color);
    }
}

pub struct TrackingPage;

impl Page for TrackingPage {
    fn name(&self) -> &'static str {
        "tracking"
    }

    fn description(&self) -> &'static str {
        "In-transit parcels with their latest scans"
    }

    fn keys(&self) -> &'static [&'static str] {
        KEYS
    }

    fn draw(&self, canvas: &mut Canvas, snap: &Snapshot, ctx: &RenderContext<'_>) -> Result<(), RenderError> {
        let width = canvas.width();
        let packages: Vec<Package> = snap.list_of(keys::PACKAGES);

        header_bar(canvas, HEADER_H as u32, &ctx.palette);
        let right = canvas.text(8, 5, "PACKAGE", FontSize::Title, TEXT_BRIGHT);
        canvas.text(right + 8, 8, &packages.len().to_string(), FontSize::Body, ctx.palette.accent);
        canvas.text_right(width - 8, 7, &ctx.now.format("%H:%M").to_string(), FontSize::Body, TEXT);

        if packages.is_empty() {
            let status = snap.string(keys::TRACKING_STATUS, "No packages");
            let message = if status == "Updated" { String::from("No packages") } else { status };
            canvas.text_centered(width / 2, canvas.height() / 2 - 6, &message, FontSize::Title, TEXT_DIM);
            return Ok(());
        }

        for (i, package) in packages.iter().take(CARDS).enumerate() {
            package_card(canvas, HEADER_H + 6 + i as i32 * (CARD_H + 6), package);
        }
        if packages.len() > CARDS {
            let more = format!("+{} more", packages.len() - CARDS);
            canvas.text_right(width - 8, canvas.height() - 12, &more, FontSize::Small, TEXT_DIM);
        }
        Ok(())
    }
}
