//! Panel drivers and the frame buffer they consume
//!
//! Provides the ST7789 controller driver and an RGB888 [`Frame`] with
//! big-endian RGB565 packing for transfer.

pub mod framebuffer;
pub mod st7789;

pub use framebuffer::{pack_rgb565_be, Frame, Rgb565};
pub use st7789::{DisplayTransaction, PanelConfig, St7789, Window};

/// Counters kept by a panel driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelStats {
    pub frames_written: u64,
    pub frames_dropped: u64,
    pub reinitializations: u64,
}

/// Capability surface of a display panel
///
/// Only one thread drives a panel; implementations need not be `Sync`.
/// Failures are reported as `false` and handled inside the driver.
pub trait Panel: Send {
    /// Run the full initialization sequence
    fn initialize(&mut self) -> bool;

    /// Transfer one full frame
    fn write_frame(&mut self, frame: &Frame) -> bool;

    /// Fill the panel with black
    fn clear(&mut self);

    /// Release the transport
    fn close(&mut self);

    fn stats(&self) -> PanelStats;
}
