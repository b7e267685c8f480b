/*
 *  display/error.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unified error types for display subsystem
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

use std::fmt;
use std::error::Error;

/// Unified error type for all display operations
#[derive(Debug)]
pub enum DisplayError {
    /// Transport could not be opened or configured
    InitializationFailed(String),

    /// SPI communication error
    SpiError(String),

    /// Send attempted before open() or after close()
    NotOpen,

    /// Grid index outside the controller's range
    InvalidGrid(usize),

    /// Frame larger than the controller's display memory
    BufferSizeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::InitializationFailed(msg) =>
                write!(f, "Display initialization failed: {}", msg),
            DisplayError::SpiError(msg) =>
                write!(f, "SPI communication error: {}", msg),
            DisplayError::NotOpen =>
                write!(f, "Display transport is not open"),
            DisplayError::InvalidGrid(grid) =>
                write!(f, "Invalid grid index: {} (must be 0..=9)", grid),
            DisplayError::BufferSizeMismatch { expected, actual } =>
                write!(f, "Buffer size mismatch: expected at most {} bytes, got {}", expected, actual),
        }
    }
}

impl Error for DisplayError {}

// Conversion from Linux spidev errors
impl From<linux_embedded_hal::SPIError> for DisplayError {
    fn from(err: linux_embedded_hal::SPIError) -> Self {
        DisplayError::SpiError(format!("{:?}", err))
    }
}

impl From<std::io::Error> for DisplayError {
    fn from(err: std::io::Error) -> Self {
        DisplayError::SpiError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            DisplayError::InvalidGrid(12).to_string(),
            "Invalid grid index: 12 (must be 0..=9)"
        );
        assert_eq!(DisplayError::NotOpen.to_string(), "Display transport is not open");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: DisplayError = io.into();
        assert!(matches!(err, DisplayError::SpiError(ref m) if m == "gone"));
    }
}
