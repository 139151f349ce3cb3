//! Full-frame RGB888 buffer and RGB565 wire packing
//!
//! Pages draw into a [`Frame`] through `embedded-graphics`; the driver packs
//! it to big-endian RGB565 right before transfer.

use std::convert::Infallible;

use embedded_graphics_core::draw_target::DrawTarget;
use embedded_graphics_core::geometry::{OriginDimensions, Point, Size};
use embedded_graphics_core::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics_core::primitives::Rectangle;
use embedded_graphics_core::Pixel;

/// RGB565 color (16-bit: 5 red, 6 green, 5 blue)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb565(pub u16);

impl Rgb565 {
    pub const BLACK: Self = Self(0x0000);
    pub const WHITE: Self = Self(0xFFFF);
    pub const RED: Self = Self(0xF800);
    pub const GREEN: Self = Self(0x07E0);
    pub const BLUE: Self = Self(0x001F);

    /// Create RGB565 from RGB888 components
    #[inline]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self((((r & 0xF8) as u16) << 8) | (((g & 0xFC) as u16) << 3) | ((b >> 3) as u16))
    }

    /// Wire order: most significant byte first
    #[inline]
    pub const fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl From<Rgb888> for Rgb565 {
    fn from(c: Rgb888) -> Self {
        Self::from_rgb(c.r(), c.g(), c.b())
    }
}

/// Pack pixels into `out` as big-endian RGB565, reusing its allocation
pub fn pack_rgb565_be(pixels: &[Rgb888], out: &mut Vec<u8>) {
    out.clear();
    out.resize(pixels.len() * 2, 0);
    for (dst, px) in out.chunks_exact_mut(2).zip(pixels) {
        let v = (((px.r() & 0xF8) as u16) << 8) | (((px.g() & 0xFC) as u16) << 3) | ((px.b() >> 3) as u16);
        dst[0] = (v >> 8) as u8;
        dst[1] = v as u8;
    }
}

/// Owned `width × height` RGB888 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Rgb888>,
}

impl Frame {
    /// Create a frame filled with black
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Rgb888::BLACK)
    }

    pub fn filled(width: u32, height: u32, color: Rgb888) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Rgb888] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Rgb888] {
        &mut self.pixels
    }

    /// Get pixel at coordinates
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        if x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    /// Set pixel at coordinates (bounds-checked)
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb888) -> bool {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = color;
            true
        } else {
            false
        }
    }

    /// Fill a full-width row range with one color
    pub fn fill_rows(&mut self, y0: u32, y1: u32, color: Rgb888) {
        let y1 = y1.min(self.height);
        if y0 >= y1 {
            return;
        }
        let start = (y0 * self.width) as usize;
        let end = (y1 * self.width) as usize;
        self.pixels[start..end].fill(color);
    }

    /// Apply a per-channel lookup table to every pixel
    pub fn map_channels(&mut self, lut: &[u8; 256]) {
        for px in &mut self.pixels {
            *px = Rgb888::new(
                lut[px.r() as usize],
                lut[px.g() as usize],
                lut[px.b() as usize],
            );
        }
    }

    /// Pack to big-endian RGB565
    pub fn to_rgb565_be(&self, out: &mut Vec<u8>) {
        pack_rgb565_be(&self.pixels, out);
    }

    /// Binary PPM (P6) encoding, for offline previews
    pub fn to_ppm(&self) -> Vec<u8> {
        let mut out = format!("P6\n{} {}\n255\n", self.width, self.height).into_bytes();
        out.reserve(self.pixels.len() * 3);
        for px in &self.pixels {
            out.extend_from_slice(&[px.r(), px.g(), px.b()]);
        }
        out
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Frame {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if x >= 0 && y >= 0 {
                self.set_pixel(x as u32, y as u32, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&Rectangle::new(Point::zero(), self.size()));
        if area.size.width == 0 || area.size.height == 0 {
            return Ok(());
        }
        let x0 = area.top_left.x as usize;
        let x1 = x0 + area.size.width as usize;
        for y in area.top_left.y as u32..area.top_left.y as u32 + area.size.height {
            let row = (y * self.width) as usize;
            self.pixels[row + x0..row + x1].fill(color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb565_reference_colors() {
        assert_eq!(Rgb565::from_rgb(255, 255, 255), Rgb565::WHITE);
        assert_eq!(Rgb565::from_rgb(0, 0, 0), Rgb565::BLACK);
        assert_eq!(Rgb565::from_rgb(248, 0, 0), Rgb565::RED);
        assert_eq!(Rgb565::from_rgb(0, 252, 0), Rgb565::GREEN);
        assert_eq!(Rgb565::from_rgb(0, 0, 248), Rgb565::BLUE);
        // low bits are truncated
        assert_eq!(Rgb565::from_rgb(7, 3, 7), Rgb565::BLACK);
    }

    #[test]
    fn test_pack_is_big_endian() {
        let pixels = [Rgb888::new(248, 0, 0), Rgb888::new(0, 0, 248)];
        let mut out = Vec::new();
        pack_rgb565_be(&pixels, &mut out);
        assert_eq!(out, vec![0xF8, 0x00, 0x00, 0x1F]);
    }

    #[test]
    fn test_pack_reuses_buffer() {
        let mut out = vec![0xAA; 64];
        pack_rgb565_be(&[Rgb888::WHITE], &mut out);
        assert_eq!(out, vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_set_pixel_bounds() {
        let mut frame = Frame::new(4, 3);
        assert!(frame.set_pixel(3, 2, Rgb888::RED));
        assert!(!frame.set_pixel(4, 0, Rgb888::RED));
        assert_eq!(frame.get_pixel(3, 2), Some(Rgb888::RED));
        assert_eq!(frame.get_pixel(0, 3), None);
    }

    #[test]
    fn test_fill_solid_clips() {
        let mut frame = Frame::new(4, 4);
        frame
            .fill_solid(&Rectangle::new(Point::new(2, 2), Size::new(10, 10)), Rgb888::GREEN)
            .unwrap();
        assert_eq!(frame.get_pixel(1, 1), Some(Rgb888::BLACK));
        assert_eq!(frame.get_pixel(3, 3), Some(Rgb888::GREEN));
        assert_eq!(frame.pixels().iter().filter(|p| **p == Rgb888::GREEN).count(), 4);
    }

    #[test]
    fn test_ppm_header() {
        let ppm = Frame::new(2, 1).to_ppm();
        assert!(ppm.starts_with(b"P6\n2 1\n255\n"));
        assert_eq!(ppm.len(), 11 + 6);
    }
}
