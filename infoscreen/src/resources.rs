//! Lazily loaded bitmap assets
//!
//! Assets live at `<root>/<set>/<symbol>.bmp` and are decoded with
//! `tinybmp`, scaled (nearest neighbour) to the requested height and kept
//! for the life of the process. Misses are remembered too, so a missing
//! file is logged once and never re-read.
//!
//! Two threads missing the same key may both decode it; the first insert
//! wins and the duplicate is dropped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;
use log::{debug, warn};
use tinybmp::Bmp;

use infoscreen_display::Frame;

/// Decoded, scaled image
///
/// Pure black pixels are treated as transparent when drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<Rgb888>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<Rgb888>) -> Option<Self> {
        (pixels.len() == (width as usize) * (height as usize)).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        (x < self.width && y < self.height).then(|| self.pixels[(y * self.width + x) as usize])
    }

    /// Nearest-neighbour resize
    pub fn scaled(&self, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            let sy = (y as u64 * self.height as u64 / height as u64) as u32;
            for x in 0..width {
                let sx = (x as u64 * self.width as u64 / width as u64) as u32;
                pixels.push(self.pixels[(sy * self.width + sx) as usize]);
            }
        }
        Self { width, height, pixels }
    }

    /// Copy onto `frame` with its top-left corner at `origin`
    pub fn draw(&self, frame: &mut Frame, origin: Point) {
        for y in 0..self.height {
            for x in 0..self.width {
                let px = self.pixels[(y * self.width + x) as usize];
                if px == Rgb888::BLACK {
                    continue;
                }
                let (fx, fy) = (origin.x + x as i32, origin.y + y as i32);
                if fx >= 0 && fy >= 0 {
                    frame.set_pixel(fx as u32, fy as u32, px);
                }
            }
        }
    }
}

/// Decode a BMP file into a bitmap
pub fn decode_bmp(bytes: &[u8]) -> Result<Bitmap, String> {
    let bmp = Bmp::<Rgb888>::from_slice(bytes).map_err(|e| format!("{e:?}"))?;
    let size = bmp.size();
    let mut pixels = vec![Rgb888::BLACK; (size.width * size.height) as usize];
    for Pixel(point, color) in bmp.pixels() {
        if point.x >= 0 && point.y >= 0 && (point.x as u32) < size.width && (point.y as u32) < size.height {
            pixels[(point.y as u32 * size.width + point.x as u32) as usize] = color;
        }
    }
    Bitmap::new(size.width, size.height, pixels).ok_or_else(|| String::from("pixel count mismatch"))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AssetKey {
    set: String,
    symbol: String,
    height: u32,
}

/// Process-lifetime asset cache
#[derive(Debug)]
pub struct ResourceCache {
    root: PathBuf,
    width_scale: f32,
    entries: Mutex<HashMap<AssetKey, Option<Arc<Bitmap>>>>,
}

impl ResourceCache {
    pub fn new(root: impl Into<PathBuf>, width_scale: f32) -> Self {
        Self {
            root: root.into(),
            width_scale,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AssetKey, Option<Arc<Bitmap>>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Asset `symbol` from `set`, scaled to `height`; `None` if unavailable
    pub fn get(&self, set: &str, symbol: &str, height: u32) -> Option<Arc<Bitmap>> {
        let key = AssetKey {
            set: set.to_string(),
            symbol: symbol.to_string(),
            height,
        };
        if let Some(hit) = self.lock().get(&key) {
            return hit.clone();
        }

        let loaded = self.load(&key).map(Arc::new);
        self.lock().entry(key).or_insert(loaded).clone()
    }

    /// Number of remembered keys, hits and misses
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn load(&self, key: &AssetKey) -> Option<Bitmap> {
        let path = self.root.join(&key.set).join(format!("{}.bmp", key.symbol));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Asset {} unavailable: {}", path.display(), e);
                return None;
            }
        };
        match decode_bmp(&bytes) {
            Ok(bitmap) if bitmap.height() > 0 => {
                let ratio = key.height as f32 / bitmap.height() as f32;
                let width = (bitmap.width() as f32 * ratio * self.width_scale) as u32;
                debug!(
                    "Loaded {} ({}x{} -> {}x{})",
                    path.display(),
                    bitmap.width(),
                    bitmap.height(),
                    width,
                    key.height
                );
                Some(bitmap.scaled(width, key.height))
            }
            Ok(_) => {
                warn!("Asset {} is empty", path.display());
                None
            }
            Err(e) => {
                warn!("Asset {} could not be decoded: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal 24-bit BMP encoder for fixtures
    pub(crate) fn bmp_bytes(width: u32, height: u32, pixels: &[Rgb888]) -> Vec<u8> {
        let row_len = (width * 3 + 3) & !3;
        let data_len = row_len * height;
        let mut out = Vec::new();
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&(54 + data_len).to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&54u32.to_le_bytes());
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&(width as i32).to_le_bytes());
        out.extend_from_slice(&(height as i32).to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&24u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&2835i32.to_le_bytes());
        out.extend_from_slice(&2835i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        for y in (0..height).rev() {
            let start = out.len();
            for x in 0..width {
                let p = pixels[(y * width + x) as usize];
                out.extend_from_slice(&[p.b(), p.g(), p.r()]);
            }
            out.resize(start + row_len as usize, 0);
        }
        out
    }

    #[test]
    fn test_decode_bmp() {
        let pixels = vec![
            Rgb888::new(255, 0, 0),
            Rgb888::new(0, 255, 0),
            Rgb888::new(0, 0, 255),
            Rgb888::new(10, 20, 30),
        ];
        let bitmap = decode_bmp(&bmp_bytes(2, 2, &pixels)).unwrap();
        assert_eq!(bitmap.width(), 2);
        assert_eq!(bitmap.pixel(0, 0), Some(Rgb888::new(255, 0, 0)));
        assert_eq!(bitmap.pixel(1, 1), Some(Rgb888::new(10, 20, 30)));
        assert!(decode_bmp(b"not a bmp").is_err());
    }

    #[test]
    fn test_scaled_nearest() {
        let bitmap = Bitmap::new(2, 1, vec![Rgb888::RED, Rgb888::BLUE]).unwrap();
        let big = bitmap.scaled(4, 2);
        assert_eq!(big.pixel(1, 1), Some(Rgb888::RED));
        assert_eq!(big.pixel(2, 0), Some(Rgb888::BLUE));
    }

    #[test]
    fn test_cache_loads_scales_and_memoizes() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nixie")).unwrap();
        let pixels = vec![Rgb888::new(255, 140, 40); 4 * 8];
        fs::write(dir.path().join("nixie/7.bmp"), bmp_bytes(4, 8, &pixels)).unwrap();

        let cache = ResourceCache::new(dir.path(), 1.5);
        let digit = cache.get("nixie", "7", 16).unwrap();
        assert_eq!(digit.height(), 16);
        assert_eq!(digit.width(), 12);

        // second lookup served from memory even after the file is gone
        fs::remove_file(dir.path().join("nixie/7.bmp")).unwrap();
        assert!(Arc::ptr_eq(&digit, &cache.get("nixie", "7", 16).unwrap()));
    }

    #[test]
    fn test_missing_asset_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResourceCache::new(dir.path(), 1.0);
        assert!(cache.get("nixie", "3", 10).is_none());
        assert_eq!(cache.len(), 1);

        // appearing later does not matter, the miss is cached
        fs::create_dir(dir.path().join("nixie")).unwrap();
        fs::write(dir.path().join("nixie/3.bmp"), bmp_bytes(1, 1, &[Rgb888::WHITE])).unwrap();
        assert!(cache.get("nixie", "3", 10).is_none());
    }

    #[test]
    fn test_draw_skips_black() {
        let bitmap = Bitmap::new(2, 1, vec![Rgb888::BLACK, Rgb888::WHITE]).unwrap();
        let mut frame = Frame::filled(3, 1, Rgb888::RED);
        bitmap.draw(&mut frame, Point::new(1, 0));
        assert_eq!(frame.get_pixel(1, 0), Some(Rgb888::RED));
        assert_eq!(frame.get_pixel(2, 0), Some(Rgb888::WHITE));
    }
}
