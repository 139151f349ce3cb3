//! Drawing surface handed to pages
//!
//! A [`Canvas`] wraps the frame being composed and keeps a log of every
//! text run drawn on it, so tests can assert on what a page printed
//! without OCR-ing pixels.

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10, FONT_7X13, FONT_9X15_BOLD};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{
    Circle, CornerRadii, Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, RoundedRectangle,
};
use embedded_graphics::text::{Baseline, Text};

use infoscreen_display::Frame;

use crate::resources::Bitmap;

/// Monospace sizes available to pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSize {
    /// 6×10
    Small,
    /// 7×13
    Body,
    /// 9×15 bold
    Title,
    /// 10×20
    Large,
}

impl FontSize {
    pub fn font(self) -> &'static MonoFont<'static> {
        match self {
            FontSize::Small => &FONT_6X10,
            FontSize::Body => &FONT_7X13,
            FontSize::Title => &FONT_9X15_BOLD,
            FontSize::Large => &FONT_10X20,
        }
    }

    pub fn char_width(self) -> i32 {
        let font = self.font();
        (font.character_size.width + font.character_spacing) as i32
    }

    pub fn height(self) -> i32 {
        self.font().character_size.height as i32
    }
}

/// Pixel width of `text` in `size`
pub fn text_width(text: &str, size: FontSize) -> i32 {
    text.chars().count() as i32 * size.char_width()
}

/// Cut to `max` characters, marking the cut with `..`
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(2);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("..");
    out
}

/// Greedy word wrap into at most `max_lines` lines of `width` characters
pub fn wrap(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_string();
        loop {
            let used = current.chars().count();
            let len = word.chars().count();
            let needed = if used == 0 { len } else { used + 1 + len };
            if needed <= width {
                if used > 0 {
                    current.push(' ');
                }
                current.push_str(&word);
                break;
            }
            if used > 0 {
                lines.push(std::mem::take(&mut current));
                continue;
            }
            // single word longer than a line
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            lines.push(head);
            if word.is_empty() {
                break;
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let kept: String = last.chars().take(width.saturating_sub(2)).collect();
            *last = format!("{kept}..");
        }
    }
    lines
}

/// A text run as drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub position: Point,
    pub color: Rgb888,
}

/// Frame plus drawing helpers
#[derive(Debug)]
pub struct Canvas {
    frame: Frame,
    texts: Vec<TextRun>,
}

impl Canvas {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            texts: Vec::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.frame.width() as i32
    }

    pub fn height(&self) -> i32 {
        self.frame.height() as i32
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }

    pub fn into_frame(self) -> Frame {
        self.frame
    }

    /// Every text run drawn so far, in order
    pub fn texts(&self) -> &[TextRun] {
        &self.texts
    }

    /// Whether some run equals `text` exactly
    pub fn has_text(&self, text: &str) -> bool {
        self.texts.iter().any(|run| run.text == text)
    }

    /// Draw `text` with its top-left corner at `(x, y)`; returns the right edge
    pub fn text(&mut self, x: i32, y: i32, text: &str, size: FontSize, color: Rgb888) -> i32 {
        if text.is_empty() {
            return x;
        }
        let style = MonoTextStyle::new(size.font(), color);
        let position = Point::new(x, y);
        let _ = Text::with_baseline(text, position, style, Baseline::Top).draw(&mut self.frame);
        self.texts.push(TextRun {
            text: text.to_string(),
            position,
            color,
        });
        x + text_width(text, size)
    }

    /// Draw `text` ending at `right`
    pub fn text_right(&mut self, right: i32, y: i32, text: &str, size: FontSize, color: Rgb888) {
        self.text(right - text_width(text, size), y, text, size, color);
    }

    /// Draw `text` centered on `cx`
    pub fn text_centered(&mut self, cx: i32, y: i32, text: &str, size: FontSize, color: Rgb888) {
        self.text(cx - text_width(text, size) / 2, y, text, size, color);
    }

    /// Draw `text` magnified `scale` times (nearest neighbour)
    pub fn text_scaled(&mut self, x: i32, y: i32, text: &str, size: FontSize, color: Rgb888, scale: u32) {
        let width = text_width(text, size).max(1) as u32;
        let height = size.height() as u32;
        let mut scratch = Canvas::new(Frame::new(width, height));
        scratch.text(0, 0, text, size, color);
        let glyphs = Bitmap::new(width, height, scratch.frame.pixels().to_vec());
        if let Some(glyphs) = glyphs {
            glyphs
                .scaled(width * scale.max(1), height * scale.max(1))
                .draw(&mut self.frame, Point::new(x, y));
        }
        self.texts.push(TextRun {
            text: text.to_string(),
            position: Point::new(x, y),
            color,
        });
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Rgb888) {
        let _ = Rectangle::new(Point::new(x, y), Size::new(w, h))
            .into_styled(PrimitiveStyle::with_fill(color))
            .draw(&mut self.frame);
    }

    pub fn fill_rounded(&mut self, x: i32, y: i32, w: u32, h: u32, radius: u32, color: Rgb888) {
        let rect = Rectangle::new(Point::new(x, y), Size::new(w, h));
        let _ = RoundedRectangle::new(rect, CornerRadii::new(Size::new(radius, radius)))
            .into_styled(PrimitiveStyle::with_fill(color))
            .draw(&mut self.frame);
    }

    /// Rounded card with a fill and a 1px border
    pub fn card(&mut self, x: i32, y: i32, w: u32, h: u32, radius: u32, fill: Rgb888, border: Rgb888) {
        let style = PrimitiveStyleBuilder::new()
            .fill_color(fill)
            .stroke_color(border)
            .stroke_width(1)
            .build();
        let rect = Rectangle::new(Point::new(x, y), Size::new(w, h));
        let _ = RoundedRectangle::new(rect, CornerRadii::new(Size::new(radius, radius)))
            .into_styled(style)
            .draw(&mut self.frame);
    }

    pub fn line(&mut self, from: Point, to: Point, color: Rgb888, width: u32) {
        let _ = Line::new(from, to)
            .into_styled(PrimitiveStyle::with_stroke(color, width))
            .draw(&mut self.frame);
    }

    pub fn hline(&mut self, x0: i32, x1: i32, y: i32, color: Rgb888) {
        self.line(Point::new(x0, y), Point::new(x1, y), color, 1);
    }

    /// Horizontal dashed line
    pub fn dashed_hline(&mut self, x0: i32, x1: i32, y: i32, color: Rgb888, dash: i32, gap: i32) {
        let step = (dash + gap).max(1);
        let mut x = x0;
        while x < x1 {
            self.hline(x, (x + dash - 1).min(x1), y, color);
            x += step;
        }
    }

    /// Filled circle centered on `center`
    pub fn circle(&mut self, center: Point, radius: u32, color: Rgb888) {
        let _ = Circle::with_center(center, radius * 2 + 1)
            .into_styled(PrimitiveStyle::with_fill(color))
            .draw(&mut self.frame);
    }

    pub fn bitmap(&mut self, bitmap: &Bitmap, x: i32, y: i32) {
        bitmap.draw(&mut self.frame, Point::new(x, y));
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb888> {
        if x < 0 || y < 0 {
            return None;
        }
        self.frame.get_pixel(x as u32, y as u32)
    }
}

/// Shorthand for an opaque color
pub const fn rgb(r: u8, g: u8, b: u8) -> Rgb888 {
    Rgb888::new(r, g, b)
}

/// Brighten each channel by a fixed offset, saturating
pub fn lighten(color: Rgb888, dr: u8, dg: u8, db: u8) -> Rgb888 {
    Rgb888::new(
        color.r().saturating_add(dr),
        color.g().saturating_add(dg),
        color.b().saturating_add(db),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_recorded_and_drawn() {
        let mut canvas = Canvas::new(Frame::new(100, 30));
        let right = canvas.text(2, 2, "CPU", FontSize::Body, Rgb888::WHITE);
        assert_eq!(right, 2 + 3 * 7);
        assert!(canvas.has_text("CPU"));
        assert_eq!(canvas.texts()[0].position, Point::new(2, 2));

        let lit = canvas.frame().pixels().iter().filter(|p| **p == Rgb888::WHITE).count();
        assert!(lit > 0);
    }

    #[test]
    fn test_alignment_helpers() {
        let mut canvas = Canvas::new(Frame::new(100, 30));
        canvas.text_right(100, 0, "ab", FontSize::Small, Rgb888::WHITE);
        canvas.text_centered(50, 10, "abcd", FontSize::Small, Rgb888::WHITE);
        assert_eq!(canvas.texts()[0].position.x, 88);
        assert_eq!(canvas.texts()[1].position.x, 38);
    }

    #[test]
    fn test_truncate_and_wrap() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("averylongname", 8), "averyl..");
        assert_eq!(wrap("the quick brown fox", 9, 3), vec!["the quick", "brown fox"]);
        assert_eq!(wrap("abcdefghij", 4, 5), vec!["abcd", "efgh", "ij"]);
        let capped = wrap("one two three four five", 5, 2);
        assert_eq!(capped.len(), 2);
        assert!(capped[1].ends_with(".."));
    }

    #[test]
    fn test_shapes_clip() {
        let mut canvas = Canvas::new(Frame::new(10, 10));
        canvas.fill_rect(-5, -5, 8, 8, Rgb888::RED);
        canvas.circle(Point::new(9, 9), 3, Rgb888::GREEN);
        assert_eq!(canvas.pixel(0, 0), Some(Rgb888::RED));
        assert_eq!(canvas.pixel(9, 9), Some(Rgb888::GREEN));
        assert_eq!(canvas.pixel(-1, 0), None);
    }

    #[test]
    fn test_scaled_text_is_larger() {
        let mut canvas = Canvas::new(Frame::new(80, 40));
        canvas.text_scaled(0, 0, "8", FontSize::Small, Rgb888::WHITE, 3);
        let lit = canvas.frame().pixels().iter().filter(|p| **p == Rgb888::WHITE).count();
        let mut plain = Canvas::new(Frame::new(80, 40));
        plain.text(0, 0, "8", FontSize::Small, Rgb888::WHITE);
        let plain_lit = plain.frame().pixels().iter().filter(|p| **p == Rgb888::WHITE).count();
        assert_eq!(lit, plain_lit * 9);
    }
}
