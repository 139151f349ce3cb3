//! spidev + gpio-cdev backend
//!
//! Opens `/dev/spidevB.D` through `linux-embedded-hal` and requests the
//! control lines from a GPIO character device. Chip select is driven as a
//! plain GPIO line because the panel's CS is not wired to the SPI CE pins.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{CdevPin, SpidevDevice};
use log::{debug, warn};

use super::{BusError, DisplayInterface, Level, Pin};

/// Device paths and line offsets
#[derive(Debug, Clone)]
pub struct LinuxConfig {
    pub spi_device: String,
    pub speed_hz: u32,
    pub gpio_chip: String,
    pub dc_line: u32,
    pub rst_line: u32,
    pub cs_line: u32,
    pub max_transfer: usize,
}

impl Default for LinuxConfig {
    fn default() -> Self {
        Self {
            spi_device: String::from("/dev/spidev1.0"),
            speed_hz: 62_500_000,
            gpio_chip: String::from("/dev/gpiochip0"),
            dc_line: 75,
            rst_line: 79,
            cs_line: 233,
            max_transfer: 4096,
        }
    }
}

struct Lines {
    dc: CdevPin,
    rst: CdevPin,
    cs: CdevPin,
}

/// Live hardware connection; `None` fields mean the transport is closed
pub struct LinuxInterface {
    config: LinuxConfig,
    spi: Option<SpidevDevice>,
    lines: Option<Lines>,
}

impl LinuxInterface {
    /// Open the SPI device and request all three control lines
    pub fn open(config: LinuxConfig) -> Result<Self, BusError> {
        let mut iface = Self {
            config,
            spi: None,
            lines: None,
        };
        iface.connect()?;
        Ok(iface)
    }

    fn connect(&mut self) -> Result<(), BusError> {
        let open_err = |device: &str, e: &dyn std::fmt::Display| BusError::Open {
            device: device.to_string(),
            message: e.to_string(),
        };

        let mut spi = SpidevDevice::open(&self.config.spi_device)
            .map_err(|e| open_err(&self.config.spi_device, &e))?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(self.config.speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)
            .map_err(|e| open_err(&self.config.spi_device, &e))?;

        let mut chip = Chip::new(&self.config.gpio_chip)
            .map_err(|e| open_err(&self.config.gpio_chip, &e))?;
        let mut request = |offset: u32, initial: u8, consumer: &str| -> Result<CdevPin, BusError> {
            let line = chip
                .get_line(offset)
                .map_err(|e| open_err(&self.config.gpio_chip, &e))?;
            let handle = line
                .request(LineRequestFlags::OUTPUT, initial, consumer)
                .map_err(|e| open_err(&self.config.gpio_chip, &e))?;
            CdevPin::new(handle).map_err(|e| open_err(&self.config.gpio_chip, &e))
        };

        let lines = Lines {
            dc: request(self.config.dc_line, 0, "infoscreen-dc")?,
            rst: request(self.config.rst_line, 1, "infoscreen-rst")?,
            cs: request(self.config.cs_line, 1, "infoscreen-cs")?,
        };

        debug!(
            "Opened {} at {} Hz (dc={}, rst={}, cs={})",
            self.config.spi_device,
            self.config.speed_hz,
            self.config.dc_line,
            self.config.rst_line,
            self.config.cs_line
        );
        self.spi = Some(spi);
        self.lines = Some(lines);
        Ok(())
    }
}

impl DisplayInterface for LinuxInterface {
    fn set_pin(&mut self, pin: Pin, level: Level) -> Result<(), BusError> {
        let lines = self.lines.as_mut().ok_or(BusError::Closed)?;
        let line = match pin {
            Pin::Reset => &mut lines.rst,
            Pin::DataCommand => &mut lines.dc,
            Pin::ChipSelect => &mut lines.cs,
        };
        let result = match level {
            Level::Low => line.set_low(),
            Level::High => line.set_high(),
        };
        result.map_err(|e| BusError::Gpio {
            pin,
            message: format!("{e:?}"),
        })
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        let spi = self.spi.as_mut().ok_or(BusError::Closed)?;
        SpiDevice::write(spi, bytes).map_err(|e| BusError::Spi(format!("{e:?}")))
    }

    fn reopen(&mut self) -> Result<(), BusError> {
        self.close();
        self.connect().map_err(|e| {
            warn!("Reopen of {} failed: {}", self.config.spi_device, e);
            e
        })
    }

    fn close(&mut self) {
        self.spi = None;
        self.lines = None;
    }

    fn max_transfer(&self) -> usize {
        self.config.max_transfer
    }
}
