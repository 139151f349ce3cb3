//! Latest channel posts

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

use super::Page;
use crate::error::RenderError;
use crate::model::ChannelMessage;
use crate::render::canvas::{truncate, wrap};
use crate::render::widgets::{header_bar, OK, TEXT, TEXT_BRIGHT, TEXT_DIM, WARN};
use crate::render::{rgb, Canvas, FontSize, RenderContext};
use crate::store::{keys, Snapshot};

const KEYS: &[&str] = &[keys::MESSAGES, keys::MESSAGES_STATUS];

const HEADER_H: i32 = 18;
const MARGIN: i32 = 4;
const LINE_H: i32 = 11;
const MAX_LINES: usize = 3;

/// `V:850`, `V:1.2K`, `V:3.4M`
pub fn views_label(views: u64) -> String {
    let views_f = views as f64;
    if views >= 1_000_000 {
        format!("V:{:.1}M", views_f / 1_000_000.0)
    } else if views >= 1_000 {
        format!("V:{:.1}K", views_f / 1_000.0)
    } else {
        format!("V:{views}")
    }
}

/// Height of the card for `lines` lines of body text
fn card_height(lines: usize) -> i32 {
    16 + lines.max(1) as i32 * LINE_H + 4
}

fn message_card(canvas: &mut Canvas, y: i32, message: &ChannelMessage, lines: &[String], accent: Rgb888) -> i32 {
    let width = canvas.width();
    let h = card_height(lines.len());
    canvas.fill_rounded(MARGIN, y, (width - 2 * MARGIN) as u32, h as u32, 4, rgb(20, 24, 32));
    canvas.fill_rect(MARGIN, y + 3, 2, (h - 6) as u32, accent);

    let channel = if message.channel.is_empty() { &message.username } else { &message.channel };
    canvas.text(MARGIN + 8, y + 3, &truncate(channel, 22), FontSize::Small, accent);
    let meta = format!("{} {}", views_label(message.views), message.date);
    canvas.text_right(width - MARGIN - 6, y + 3, meta.trim(), FontSize::Small, TEXT_DIM);

    for (i, line) in lines.iter().enumerate() {
        canvas.text(MARGIN + 8, y + 16 + i as i32 * LINE_H, line, FontSize::Small, TEXT);
    }
    h
}

pub struct MessagesPage;

impl Page for MessagesPage {
    fn name(&self) -> &'static str {
        "messages"
    }

    fn description(&self) -> &'static str {
        "Newest posts from followed channels"
    }

    fn keys(&self) -> &'static [&'static str] {
        KEYS
    }

    fn draw(&self, canvas: &mut Canvas, snap: &Snapshot, ctx: &RenderContext<'_>) -> Result<(), RenderError> {
        let (width, height) = (canvas.width(), canvas.height());
        let messages: Vec<ChannelMessage> = snap.list_of(keys::MESSAGES);
        let status = snap.string(keys::MESSAGES_STATUS, "Loading...");

        header_bar(canvas, HEADER_H as u32, &ctx.palette);
        canvas.text(6, 3, "Messages", FontSize::Body, TEXT_BRIGHT);
        let dot = if status == "Updated" { OK } else { WARN };
        canvas.circle(Point::new(72, 9), 3, dot);
        canvas.text_right(width - 6, 4, &ctx.now.format("%H:%M").to_string(), FontSize::Small, TEXT);

        if messages.is_empty() {
            canvas.text_centered(width / 2, height / 2 - 6, &status, FontSize::Title, TEXT_DIM);
            return Ok(());
        }

        let chars = ((width - 2 * MARGIN - 14) / FontSize::Small.char_width()).max(1) as usize;
        let mut y = HEADER_H + MARGIN;
        let mut shown = 0;
        for message in &messages {
            let lines = wrap(message.body(), chars, MAX_LINES);
            if y + card_height(lines.len()) > height - MARGIN {
                break;
            }
            y += message_card(canvas, y, message, &lines, ctx.palette.accent) + MARGIN;
            shown += 1;
        }
        if shown < messages.len() {
            let more = format!("+{} more", messages.len() - shown);
            canvas.text_right(width - 50, 4, &more, FontSize::Small, TEXT_DIM);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::tests::draw_page;
    use serde_json::json;

    fn message(channel: &str, text: &str, views: u64) -> ChannelMessage {
        ChannelMessage {
            channel: channel.into(),
            text: text.into(),
            date: "10-19 13:58".into(),
            views,
            ..ChannelMessage::default()
        }
    }

    #[test]
    fn test_views_label() {
        assert_eq!(views_label(850), "V:850");
        assert_eq!(views_label(1_240), "V:1.2K");
        assert_eq!(views_label(3_400_000), "V:3.4M");
    }

    #[test]
    fn test_cards_wrap_and_placeholder() {
        let long = "word ".repeat(60);
        let list = vec![
            message("News", "Short post", 1_240),
            message("Pics", "", 10),
            message("Long", &long, 0),
        ];
        let snap = Snapshot::from_pairs([
            (keys::MESSAGES, serde_json::to_value(&list).unwrap()),
            (keys::MESSAGES_STATUS, json!("Updated")),
        ]);
        let canvas = draw_page(&MessagesPage, &snap);
        for text in ["Messages", "News", "Short post", "V:1.2K 10-19 13:58", "[message]", "Long"] {
            assert!(canvas.has_text(text), "missing {text}");
        }
        let long_lines = canvas.texts().iter().filter(|t| t.text.starts_with("word")).count();
        assert_eq!(long_lines, MAX_LINES);
        assert!(canvas.texts().iter().any(|t| t.text.ends_with("..")));
    }

    #[test]
    fn test_overflow_counts_hidden() {
        let list: Vec<_> = (0..12).map(|i| message(&format!("c{i}"), "hello", 1)).collect();
        let snap = Snapshot::from_pairs([(keys::MESSAGES, serde_json::to_value(&list).unwrap())]);
        let canvas = draw_page(&MessagesPage, &snap);
        // single-line cards after the header fit six on a 240px screen
        assert!(canvas.has_text("c5"));
        assert!(!canvas.has_text("c6"));
        assert!(canvas.has_text("+6 more"));
    }

    #[test]
    fn test_empty_shows_status() {
        let snap = Snapshot::from_pairs([(keys::MESSAGES_STATUS, json!("Network Err"))]);
        assert!(draw_page(&MessagesPage, &snap).has_text("Network Err"));
    }
}
