/*
 *  display/drivers/spidev.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *  (c) 2020-26 Stuart Hunter
 *
 *  Linux spidev byte transport
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use embedded_hal::spi::SpiDevice;
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::SpidevDevice;
use log::info;

use crate::display::error::DisplayError;
use crate::display::traits::ByteTransport;

/// PT6315 tolerates up to 1 MHz serial clock
pub const DEFAULT_SPI_SPEED_HZ: u32 = 500_000;

/// SPI transport over `/dev/spidevX.Y`
///
/// Chip select is driven by the kernel per transfer, so one `send` lands as
/// one strobe window on the controller.
pub struct SpidevTransport {
    path: String,
    speed_hz: u32,
    device: Option<SpidevDevice>,
}

impl SpidevTransport {
    /// # Arguments
    ///
    /// * `path` - spidev node, e.g. "/dev/spidev0.0"
    /// * `speed_hz` - SPI clock
    pub fn new(path: &str, speed_hz: u32) -> Self {
        Self {
            path: path.to_string(),
            speed_hz,
            device: None,
        }
    }
}

impl ByteTransport for SpidevTransport {
    fn name(&self) -> &str {
        &self.path
    }

    fn open(&mut self) -> Result<(), DisplayError> {
        if self.device.is_some() {
            return Ok(());
        }
        info!("Opening {} at {} Hz", self.path, self.speed_hz);

        let mut device = SpidevDevice::open(&self.path).map_err(|e| {
            DisplayError::InitializationFailed(format!("{}: {:?}", self.path, e))
        })?;

        // clock idles high, data sampled on the rising edge
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(self.speed_hz)
            .mode(SpiModeFlags::SPI_MODE_3)
            .build();
        device.0.configure(&options).map_err(|e| {
            DisplayError::InitializationFailed(format!("{}: configure failed: {}", self.path, e))
        })?;

        self.device = Some(device);
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), DisplayError> {
        let device = self.device.as_mut().ok_or(DisplayError::NotOpen)?;
        SpiDevice::write(device, bytes)?;
        Ok(())
    }

    fn close(&mut self) {
        // dropping the handle closes the file descriptor
        self.device = None;
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_fails_to_open() {
        let mut spi = SpidevTransport::new("/dev/spidev-does-not-exist", DEFAULT_SPI_SPEED_HZ);
        assert!(matches!(spi.open(), Err(DisplayError::InitializationFailed(_))));
        assert!(!spi.is_open());
    }

    #[test]
    fn test_send_without_open() {
        let mut spi = SpidevTransport::new("/dev/spidev0.0", DEFAULT_SPI_SPEED_HZ);
        assert!(matches!(spi.send(&[0x06]), Err(DisplayError::NotOpen)));
    }
}
