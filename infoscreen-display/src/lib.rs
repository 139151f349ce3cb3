//! SPI color panel driver for Linux single-board computers
//!
//! Drives ST7789-class TFT controllers from userspace: GPIO character
//! device lines for DC/RST/CS and spidev for pixel data.
//!
//! # Architecture
//!
//! ```text
//! Renderer
//!     │  Frame (RGB888)
//!     ▼
//! ┌─────────────┐
//! │   St7789    │  init sequence, window setup, RGB565 packing, recovery
//! └──────┬──────┘
//!        │  DisplayInterface
//!        ▼
//! ┌────────────────┬───────────────┐
//! │ LinuxInterface │ MockInterface │
//! │ (spidev+cdev)  │ (recording)   │
//! └────────────────┴───────────────┘
//! ```
//!
//! The Linux backend is behind the `linux` feature.

pub mod hal;
pub mod display;

// Re-export main types
pub use display::{Frame, Panel, PanelConfig, PanelStats, Rgb565, St7789};
pub use hal::{BusError, DisplayInterface, Level, MockInterface, Pin, StdDelay};
