//! ST7789 LCD Controller Driver
//!
//! Register-level driver for ST7789-class TFT controllers over SPI with
//! separate DC/RST/CS lines.
//!
//! # Initialization
//!
//! ```text
//! RST low ─100ms─ RST high ─100ms─ SWRESET ─100ms─ SLPOUT ─100ms─
//!     MADCTL(0x28) ─ COLMOD(0x55) ─ DISPON
//! ```
//!
//! # Frame transfer
//!
//! `CASET`/`RASET` select the full window, `RAMWR` opens memory write and the
//! packed RGB565 payload follows with DC held at data.
//!
//! # Recovery
//!
//! A transport error during a frame write drops that frame and triggers a
//! single reopen + re-initialization. If that fails too, the next frame
//! write retries initialization before sending.

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use super::framebuffer::Frame;
use super::{Panel, PanelStats};
use crate::hal::{BusError, DisplayInterface, Level, Pin};

/// ST7789 commands
#[allow(dead_code)]
pub mod cmd {
    pub const NOP: u8 = 0x00;
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const DISPOFF: u8 = 0x28;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A;    // Column address set
    pub const RASET: u8 = 0x2B;    // Row address set
    pub const RAMWR: u8 = 0x2C;    // Memory write
    pub const MADCTL: u8 = 0x36;   // Memory access control
    pub const COLMOD: u8 = 0x3A;   // Pixel format
}

/// Landscape, row/column exchange
pub const MADCTL_LANDSCAPE: u8 = 0x28;
/// 16 bits per pixel
pub const COLMOD_RGB565: u8 = 0x55;

/// Panel geometry and register values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    pub width: u16,
    pub height: u16,
    pub madctl: u8,
    /// Hold time after each reset phase and after SWRESET/SLPOUT
    pub reset_delay_ms: u32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            madctl: MADCTL_LANDSCAPE,
            reset_delay_ms: 100,
        }
    }
}

/// Rectangular target area in panel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Window {
    pub const fn full(width: u16, height: u16) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    /// CASET parameters: start and end column, big-endian
    pub fn column_bytes(&self) -> [u8; 4] {
        span_bytes(self.x, self.width)
    }

    /// RASET parameters: start and end row, big-endian
    pub fn row_bytes(&self) -> [u8; 4] {
        span_bytes(self.y, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

fn span_bytes(start: u16, len: u16) -> [u8; 4] {
    let end = start.saturating_add(len.saturating_sub(1));
    let [s0, s1] = start.to_be_bytes();
    let [e0, e1] = end.to_be_bytes();
    [s0, s1, e0, e1]
}

/// A window plus its packed payload, sent as one unit
#[derive(Debug, Clone, Copy)]
pub struct DisplayTransaction<'a> {
    pub window: Window,
    pub payload: &'a [u8],
}

/// ST7789 driver
pub struct St7789<I, D> {
    iface: I,
    delay: D,
    config: PanelConfig,
    initialized: bool,
    /// Transport was lost; reacquire it before the next init pass
    needs_reopen: bool,
    buffer: Vec<u8>,
    stats: PanelStats,
}

impl<I: DisplayInterface, D: DelayNs> St7789<I, D> {
    /// Create a driver; no bus traffic until [`Panel::initialize`]
    pub fn new(iface: I, delay: D, config: PanelConfig) -> Self {
        Self {
            iface,
            delay,
            config,
            initialized: false,
            needs_reopen: false,
            buffer: Vec::with_capacity(config.width as usize * config.height as usize * 2),
            stats: PanelStats::default(),
        }
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn interface(&self) -> &I {
        &self.iface
    }

    fn init_sequence(&mut self) -> Result<(), BusError> {
        let hold = self.config.reset_delay_ms;

        self.iface.set_pin(Pin::ChipSelect, Level::High)?;
        self.iface.set_pin(Pin::Reset, Level::Low)?;
        self.delay.delay_ms(hold);
        self.iface.set_pin(Pin::Reset, Level::High)?;
        self.delay.delay_ms(hold);

        self.iface.write_command(cmd::SWRESET)?;
        self.delay.delay_ms(hold);
        self.iface.write_command(cmd::SLPOUT)?;
        self.delay.delay_ms(hold);

        self.iface.write_command(cmd::MADCTL)?;
        self.iface.write_data(&[self.config.madctl])?;
        self.iface.write_command(cmd::COLMOD)?;
        self.iface.write_data(&[COLMOD_RGB565])?;
        self.iface.write_command(cmd::DISPON)?;
        Ok(())
    }

    /// Send one window and its payload
    pub fn send(&mut self, tx: DisplayTransaction<'_>) -> Result<(), BusError> {
        self.iface.write_command(cmd::CASET)?;
        self.iface.write_data(&tx.window.column_bytes())?;
        self.iface.write_command(cmd::RASET)?;
        self.iface.write_data(&tx.window.row_bytes())?;
        self.iface.write_command(cmd::RAMWR)?;
        self.iface.write_stream(tx.payload)
    }

    fn send_buffer(&mut self) -> Result<(), BusError> {
        let window = Window::full(self.config.width, self.config.height);
        let payload = std::mem::take(&mut self.buffer);
        let result = self.send(DisplayTransaction {
            window,
            payload: &payload,
        });
        self.buffer = payload;
        result
    }

    fn reopen(&mut self) -> bool {
        match self.iface.reopen() {
            Ok(()) => {
                self.needs_reopen = false;
                true
            }
            Err(e) => {
                self.needs_reopen = true;
                error!("Display reopen failed: {}", e);
                false
            }
        }
    }

    fn recover(&mut self) {
        self.stats.reinitializations += 1;
        self.initialized = false;
        if !self.reopen() {
            return;
        }
        match self.init_sequence() {
            Ok(()) => {
                self.initialized = true;
                info!("Display re-initialized");
            }
            Err(e) => error!("Display re-initialization failed: {}", e),
        }
    }

    fn start(&mut self) -> bool {
        if self.needs_reopen && !self.reopen() {
            self.initialized = false;
            return false;
        }
        match self.init_sequence() {
            Ok(()) => {
                self.initialized = true;
                info!(
                    "Display initialized ({}x{}, MADCTL=0x{:02X})",
                    self.config.width, self.config.height, self.config.madctl
                );
                true
            }
            Err(e) => {
                self.initialized = false;
                error!("Display initialization failed: {}", e);
                false
            }
        }
    }

    fn ensure_initialized(&mut self) -> bool {
        self.initialized || self.start()
    }
}

impl<I: DisplayInterface + Send, D: DelayNs + Send> Panel for St7789<I, D> {
    fn initialize(&mut self) -> bool {
        self.start()
    }

    fn write_frame(&mut self, frame: &Frame) -> bool {
        if frame.width() != u32::from(self.config.width)
            || frame.height() != u32::from(self.config.height)
        {
            warn!(
                "Dropping {}x{} frame for {}x{} panel",
                frame.width(),
                frame.height(),
                self.config.width,
                self.config.height
            );
            self.stats.frames_dropped += 1;
            return false;
        }
        if !self.ensure_initialized() {
            self.stats.frames_dropped += 1;
            return false;
        }

        frame.to_rgb565_be(&mut self.buffer);
        match self.send_buffer() {
            Ok(()) => {
                self.stats.frames_written += 1;
                debug!("Frame written ({} bytes)", self.buffer.len());
                true
            }
            Err(e) => {
                error!("Frame write failed: {}", e);
                self.stats.frames_dropped += 1;
                self.recover();
                false
            }
        }
    }

    fn clear(&mut self) {
        if !self.ensure_initialized() {
            return;
        }
        let len = Window::full(self.config.width, self.config.height).pixel_count() * 2;
        self.buffer.clear();
        self.buffer.resize(len, 0);
        if let Err(e) = self.send_buffer() {
            warn!("Display clear failed: {}", e);
        }
    }

    fn close(&mut self) {
        self.iface.close();
        self.initialized = false;
        self.needs_reopen = true;
        info!("Display closed");
    }

    fn stats(&self) -> PanelStats {
        self.stats
    }
}
