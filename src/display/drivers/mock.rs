/*
 *  display/drivers/mock.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock byte transport for testing and dry runs without hardware
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

use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::display::error::DisplayError;
use crate::display::traits::ByteTransport;
use crate::display::transport::reverse_bits;

/// Mock transport
///
/// Records every frame exactly as it would hit the wire. Useful for:
/// - Unit tests
/// - Integration tests
/// - `--dry-run` sessions on a machine without the display attached
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
    /// Log each frame at debug level
    echo: bool,
}

/// Internal state for the mock transport (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockTransportState {
    /// Number of times open() succeeded
    pub open_count: usize,

    /// Number of times close() released an open device
    pub close_count: usize,

    /// Whether the transport is currently open
    pub is_open: bool,

    /// Wire bytes of every successful send, in order
    pub frames: Vec<Vec<u8>>,

    /// Sends rejected by simulated failure
    pub failed_sends: usize,

    /// Simulate failures (for error testing)
    pub simulate_open_failure: bool,
    pub simulate_send_failure: bool,
}

impl MockTransportState {
    /// Frames with the bit reversal undone, i.e. as the encoder produced them
    pub fn logical_frames(&self) -> Vec<Vec<u8>> {
        self.frames
            .iter()
            .map(|f| f.iter().copied().map(reverse_bits).collect())
            .collect()
    }

    /// Last logical frame of exactly `len` bytes
    pub fn last_logical_of_len(&self, len: usize) -> Option<Vec<u8>> {
        self.logical_frames().into_iter().rev().find(|f| f.len() == len)
    }

    /// All single-byte logical commands, in order
    pub fn commands(&self) -> Vec<u8> {
        self.logical_frames()
            .into_iter()
            .filter(|f| f.len() == 1)
            .map(|f| f[0])
            .collect()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that logs each frame, for running without hardware
    pub fn echoing() -> Self {
        Self { echo: true, ..Self::default() }
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockTransportState>> {
        Arc::clone(&self.state)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockTransportState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

impl ByteTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(&mut self) -> Result<(), DisplayError> {
        self.with_state(|state| {
            if state.simulate_open_failure {
                return Err(DisplayError::InitializationFailed("Simulated open failure".to_string()));
            }
            state.open_count += 1;
            state.is_open = true;
            Ok(())
        })
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), DisplayError> {
        let echo = self.echo;
        self.with_state(|state| {
            if !state.is_open {
                return Err(DisplayError::NotOpen);
            }
            if state.simulate_send_failure {
                state.failed_sends += 1;
                return Err(DisplayError::SpiError("Simulated send failure".to_string()));
            }
            if echo {
                debug!("mock wire {:02X?}", bytes);
            }
            state.frames.push(bytes.to_vec());
            Ok(())
        })
    }

    fn close(&mut self) {
        self.with_state(|state| {
            if state.is_open {
                state.is_open = false;
                state.close_count += 1;
            }
        })
    }

    fn is_open(&self) -> bool {
        self.with_state(|state| state.is_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_open_and_send() {
        let mut mock = MockTransport::new();
        let state = mock.state();

        assert!(mock.send(&[1]).is_err());
        mock.open().unwrap();
        mock.send(&[1, 2, 3]).unwrap();

        let state = state.lock().unwrap();
        assert_eq!(state.open_count, 1);
        assert_eq!(state.frames, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_mock_simulated_failure() {
        let mut mock = MockTransport::new();
        mock.open().unwrap();

        mock.state().lock().unwrap().simulate_send_failure = true;
        assert!(mock.send(&[0x40]).is_err());
        assert_eq!(mock.state().lock().unwrap().failed_sends, 1);

        mock.state().lock().unwrap().simulate_send_failure = false;
        assert!(mock.send(&[0x40]).is_ok());
    }

    #[test]
    fn test_mock_open_failure() {
        let mut mock = MockTransport::new();
        mock.state().lock().unwrap().simulate_open_failure = true;
        assert!(matches!(mock.open(), Err(DisplayError::InitializationFailed(_))));
        assert!(!mock.is_open());
    }

    #[test]
    fn test_logical_frames_undo_reversal() {
        let mut mock = MockTransport::new();
        mock.open().unwrap();
        mock.send(&[0x03, 0xF1]).unwrap();
        mock.send(&[0x60]).unwrap();
        let state = mock.state();
        let state = state.lock().unwrap();
        assert_eq!(state.logical_frames(), vec![vec![0xC0, 0x8F], vec![0x06]]);
        assert_eq!(state.commands(), vec![0x06]);
    }
}
