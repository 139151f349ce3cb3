//! Bus abstraction for SPI panels
//!
//! A panel is wired with three control lines and a clocked data line:
//!
//! | Line | Function                         | Idle  |
//! |------|----------------------------------|-------|
//! | CS   | Chip select (active low)         | High  |
//! | DC   | Data/Command (low = command)     | -     |
//! | RST  | Hardware reset (active low)      | High  |
//!
//! Backends implement [`DisplayInterface`]; the command/data framing is
//! provided on top of the two primitive operations.

pub mod mock;
#[cfg(feature = "linux")]
pub mod linux;

pub use mock::{MockInterface, Op};
#[cfg(feature = "linux")]
pub use linux::{LinuxConfig, LinuxInterface};

use std::time::Duration;

use embedded_hal::delay::DelayNs;
use thiserror::Error;

/// Control lines driven by the panel driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pin {
    /// Hardware reset
    Reset,
    /// Data/Command select
    DataCommand,
    /// Chip select
    ChipSelect,
}

/// Output level of a control line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Transport errors
#[derive(Debug, Error)]
pub enum BusError {
    #[error("SPI transfer failed: {0}")]
    Spi(String),

    #[error("GPIO {pin:?} failed: {message}")]
    Gpio { pin: Pin, message: String },

    #[error("failed to open {device}: {message}")]
    Open { device: String, message: String },

    #[error("bus is closed")]
    Closed,
}

/// Register-level access to a panel
pub trait DisplayInterface {
    /// Drive a control line
    fn set_pin(&mut self, pin: Pin, level: Level) -> Result<(), BusError>;

    /// Clock raw bytes out on the data line
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BusError>;

    /// Release and reacquire the transport after a failure
    fn reopen(&mut self) -> Result<(), BusError>;

    /// Release the transport
    fn close(&mut self);

    /// Largest single transfer the transport accepts
    fn max_transfer(&self) -> usize {
        4096
    }

    /// Send one command byte (CS low, DC low, byte, CS high)
    fn write_command(&mut self, cmd: u8) -> Result<(), BusError> {
        self.set_pin(Pin::ChipSelect, Level::Low)?;
        self.set_pin(Pin::DataCommand, Level::Low)?;
        let result = self.write_bytes(&[cmd]);
        self.set_pin(Pin::ChipSelect, Level::High)?;
        result
    }

    /// Send parameter bytes (CS low, DC high, bytes, CS high)
    fn write_data(&mut self, data: &[u8]) -> Result<(), BusError> {
        self.set_pin(Pin::ChipSelect, Level::Low)?;
        self.set_pin(Pin::DataCommand, Level::High)?;
        let result = self.write_bytes(data);
        self.set_pin(Pin::ChipSelect, Level::High)?;
        result
    }

    /// Stream a large payload with DC held at data, in transfer-sized chunks
    fn write_stream(&mut self, payload: &[u8]) -> Result<(), BusError> {
        let chunk = self.max_transfer().max(1);
        self.set_pin(Pin::ChipSelect, Level::Low)?;
        self.set_pin(Pin::DataCommand, Level::High)?;
        let result = payload
            .chunks(chunk)
            .try_for_each(|part| self.write_bytes(part));
        self.set_pin(Pin::ChipSelect, Level::High)?;
        result
    }
}

/// Blocking delay backed by `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
