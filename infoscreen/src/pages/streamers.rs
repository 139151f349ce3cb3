//! Followed live streamers, live ones first

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

use super::Page;
use crate::error::RenderError;
use crate::model::{Streamer, StreamerUser};
use crate::render::canvas::truncate;
use crate::render::widgets::{header_bar, TEXT, TEXT_BRIGHT, TEXT_DIM};
use crate::render::{rgb, Canvas, FontSize, RenderContext};
use crate::store::{keys, Snapshot};

const KEYS: &[&str] = &[keys::STREAMERS, keys::STREAMER_USER, keys::STREAMERS_STATUS];

const HEADER_H: i32 = 14;
const COLUMNS: i32 = 2;
const ROWS: i32 = 4;
const MARGIN: i32 = 4;
const GAP: i32 = 4;

const LIVE: Rgb888 = rgb(251, 114, 153);
const LIVE_BG: Rgb888 = rgb(35, 25, 30);
const OFFLINE_BG: Rgb888 = rgb(22, 25, 32);

/// Viewer count, `1.2w` from ten thousand up
pub fn viewers_label(online: u64) -> String {
    if online >= 10_000 {
        format!("{:.1}w", online as f64 / 10_000.0)
    } else {
        online.to_string()
    }
}

/// Live first, then by viewers descending; stable otherwise
pub fn sort_streamers(streamers: &mut [Streamer]) {
    streamers.sort_by(|a, b| b.is_live().cmp(&a.is_live()).then(b.online.cmp(&a.online)));
}

fn streamer_card(canvas: &mut Canvas, x: i32, y: i32, w: i32, h: i32, streamer: &Streamer) {
    let live = streamer.is_live();
    canvas.fill_rounded(x, y, w as u32, h as u32, 4, if live { LIVE_BG } else { OFFLINE_BG });
    canvas.fill_rect(x, y + 4, 3, (h - 8) as u32, if live { LIVE } else { rgb(60, 65, 75) });

    let name_color = if live { TEXT_BRIGHT } else { TEXT_DIM };
    canvas.text(x + 8, y + 4, &truncate(streamer.display_name(), 12), FontSize::Body, name_color);

    if live {
        canvas.fill_rounded(x + w - 32, y + 4, 28, 12, 3, LIVE);
        canvas.text(x + w - 30, y + 5, "LIVE", FontSize::Small, Rgb888::WHITE);
        if !streamer.title.is_empty() {
            canvas.text(x + 8, y + 20, &truncate(&streamer.title, 12), FontSize::Small, TEXT);
        }
        let area: String = streamer.area_name.chars().take(4).collect();
        canvas.text(x + 8, y + h - 14, &area, FontSize::Small, TEXT_DIM);
        canvas.text_right(x + w - 6, y + h - 14, &viewers_label(streamer.online), FontSize::Small, LIVE);
    } else {
        canvas.text(x + 8, y + h - 14, "offline", FontSize::Small, rgb(90, 95, 110));
    }
}

pub struct StreamersPage;

impl Page for StreamersPage {
    fn name(&self) -> &'static str {
        "streamers"
    }

    fn description(&self) -> &'static str {
        "Followed streamers with live state and viewer counts"
    }

    fn keys(&self) -> &'static [&'static str] {
        KEYS
    }

    fn draw(&self, canvas: &mut Canvas, snap: &Snapshot, ctx: &RenderContext<'_>) -> Result<(), RenderError> {
        let (width, height) = (canvas.width(), canvas.height());
        let mut streamers: Vec<Streamer> = snap.list_of(keys::STREAMERS);
        sort_streamers(&mut streamers);
        let live = streamers.iter().filter(|s| s.is_live()).count();

        header_bar(canvas, HEADER_H as u32, &ctx.palette);
        let mut x = 6;
        if let Some(user) = snap.get_as::<StreamerUser>(keys::STREAMER_USER).filter(|u| !u.uname.is_empty()) {
            let name: String = user.uname.chars().take(5).collect();
            x = canvas.text(x, 2, &name, FontSize::Small, TEXT_BRIGHT);
            x = canvas.text(x + 4, 2, &format!("Lv{}", user.level), FontSize::Small, rgb(255, 180, 80));
        }
        canvas.text(x + 8, 2, &format!("{}/{}", live, streamers.len()), FontSize::Small, LIVE);
        canvas.text_right(width - 6, 2, &ctx.now.format("%H:%M").to_string(), FontSize::Small, TEXT);

        if streamers.is_empty() {
            let status = snap.string(keys::STREAMERS_STATUS, "Loading...");
            canvas.text_centered(width / 2, height / 2 - 6, &status, FontSize::Title, TEXT_DIM);
            return Ok(());
        }

        let top = HEADER_H + MARGIN;
        let card_w = (width - 2 * MARGIN - (COLUMNS - 1) * GAP) / COLUMNS;
        let card_h = (height - top - MARGIN - (ROWS - 1) * GAP) / ROWS;
        let slots = (COLUMNS * ROWS) as usize;
        for (i, streamer) in streamers.iter().take(slots).enumerate() {
            let (row, col) = (i as i32 / COLUMNS, i as i32 % COLUMNS);
            let x = MARGIN + col * (card_w + GAP);
            let y = top + row * (card_h + GAP);
            streamer_card(canvas, x, y, card_w, card_h, streamer);
        }
        if streamers.len() > slots {
            let more = format!("+{} more", streamers.len() - slots);
            canvas.text_right(width - 60, 2, &more, FontSize::Small, TEXT_DIM);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::tests::draw_page;
    use serde_json::json;

    fn streamer(name: &str, live: bool, online: u64) -> Streamer {
        Streamer {
            uname: name.into(),
            title: format!("{name} plays"),
            area_name: "Games".into(),
            online,
            live_status: i64::from(live),
            ..Streamer::default()
        }
    }

    #[test]
    fn test_viewers_label() {
        assert_eq!(viewers_label(9_999), "9999");
        assert_eq!(viewers_label(12_345), "1.2w");
    }

    #[test]
    fn test_sort_live_then_viewers() {
        let mut list = vec![
            streamer("a", false, 900),
            streamer("b", true, 10),
            streamer("c", true, 500),
            streamer("d", false, 0),
        ];
        sort_streamers(&mut list);
        let order: Vec<_> = list.iter().map(|s| s.uname.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn test_grid_and_header() {
        let list: Vec<_> = (0..10).map(|i| streamer(&format!("s{i}"), i == 7, i * 100)).collect();
        let snap = Snapshot::from_pairs([
            (keys::STREAMERS, serde_json::to_value(&list).unwrap()),
            (keys::STREAMER_USER, json!({"uname": "viewer_one", "level": 6})),
        ]);
        let canvas = draw_page(&StreamersPage, &snap);
        for text in ["viewe", "Lv6", "1/10", "LIVE", "s7", "700", "Game", "+2 more"] {
            assert!(canvas.has_text(text), "missing {text}");
        }
        // the live streamer takes the first card
        let first = canvas.texts().iter().find(|t| t.text.starts_with('s')).unwrap();
        assert_eq!(first.text, "s7");
        // lowest viewer counts fall off the grid
        assert!(!canvas.has_text("s0") && !canvas.has_text("s1"));
    }

    #[test]
    fn test_live_badge_text_is_white() {
        let snap = Snapshot::from_pairs([(
            keys::STREAMERS,
            serde_json::to_value(vec![streamer("solo", true, 42)]).unwrap(),
        )]);
        let canvas = draw_page(&StreamersPage, &snap);
        let badge = canvas.texts().iter().find(|t| t.text == "LIVE").unwrap();
        assert_eq!(badge.color, Rgb888::WHITE);
        // badge background just left of the text
        assert_eq!(canvas.pixel(badge.position.x - 1, badge.position.y + 5), Some(LIVE));
    }
}
