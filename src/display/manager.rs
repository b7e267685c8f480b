/*
 *  display/manager.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *  (c) 2020-26 Stuart Hunter
 *
 *  Encoder plus shared transport: the handle every mode draws through
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

use std::sync::Arc;

use log::debug;

use crate::display::encoder::{StatusFlags, Symbols, VfdEncoder, CMD_WRITE_AUTO_INCREMENT, CMD_WRITE_FIXED_ADDRESS};
use crate::display::error::DisplayError;
use crate::display::layout::GridLayout;
use crate::display::traits::BoxedTransport;
use crate::display::transport::TransportAdapter;
use crate::glyphs::GlyphValue;

/// Cheap to clone; clones share the one transport.
#[derive(Clone)]
pub struct VfdDisplay {
    encoder: VfdEncoder,
    transport: Arc<TransportAdapter>,
}

impl VfdDisplay {
    pub fn new(transport: BoxedTransport) -> Self {
        Self {
            encoder: VfdEncoder::new(),
            transport: Arc::new(TransportAdapter::new(transport)),
        }
    }

    pub fn encoder(&self) -> &VfdEncoder {
        &self.encoder
    }

    pub fn open(&self) -> Result<(), DisplayError> {
        self.transport.open()
    }

    pub fn close(&self) {
        self.transport.close()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// 10-grid mode, auto-increment writes, display on at full brightness
    pub fn init(&self) -> Result<(), DisplayError> {
        for cmd in self.encoder.init_commands() {
            self.transport.send(&[cmd])?;
        }
        debug!("controller initialised");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), DisplayError> {
        self.transport.send(&self.encoder.clear_frame())
    }

    pub fn set_brightness(&self, level: u8) -> Result<(), DisplayError> {
        let cmd = self.encoder.brightness_command(level);
        debug!("brightness {} -> {:#04X}", level, cmd);
        self.transport.send(&[cmd])
    }

    /// Render and send one whole frame
    pub fn draw(&self, layout: &GridLayout, symbols: &Symbols<'_>, flags: StatusFlags) -> Result<(), DisplayError> {
        let frame = self.encoder.render(layout, symbols, flags);
        self.transport.send(&frame)
    }

    pub fn set_fixed_address_mode(&self, fixed: bool) -> Result<(), DisplayError> {
        let cmd = if fixed { CMD_WRITE_FIXED_ADDRESS } else { CMD_WRITE_AUTO_INCREMENT };
        self.transport.send(&[cmd])
    }

    /// Rewrites one grid byte by byte; the controller must be in fixed-address mode.
    pub fn write_grid_fixed(&self, grid: usize, bytes: GlyphValue) -> Result<(), DisplayError> {
        for write in self.encoder.fixed_writes(grid, bytes)? {
            self.transport.send(&write)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::mock::MockTransport;
    use crate::display::encoder::FRAME_LEN;
    use crate::display::layout::SPECTRUM_LAYOUT;

    fn open_mock() -> (VfdDisplay, std::sync::Arc<std::sync::Mutex<crate::display::drivers::mock::MockTransportState>>) {
        let mock = MockTransport::new();
        let state = mock.state();
        let display = VfdDisplay::new(Box::new(mock));
        display.open().unwrap();
        (display, state)
    }

    #[test]
    fn test_init_sends_three_singletons() {
        let (display, state) = open_mock();
        display.init().unwrap();
        let state = state.lock().unwrap();
        assert_eq!(state.logical_frames(), vec![vec![0x06], vec![0x40], vec![0x8F]]);
    }

    #[test]
    fn test_draw_is_one_send() {
        let (display, state) = open_mock();
        display.draw(&SPECTRUM_LAYOUT, &Symbols::levels(&[1, 2, 3, 4, 5, 6]), StatusFlags::default()).unwrap();
        let state = state.lock().unwrap();
        assert_eq!(state.frames.len(), 1);
        assert_eq!(state.frames[0].len(), FRAME_LEN);
    }

    #[test]
    fn test_clones_share_transport() {
        let (display, state) = open_mock();
        let other = display.clone();
        other.set_brightness(1).unwrap();
        display.clear().unwrap();
        let state = state.lock().unwrap();
        assert_eq!(state.commands(), vec![0x88]);
        assert_eq!(state.frames.len(), 2);
    }

    #[test]
    fn test_send_failure_surfaces() {
        let (display, state) = open_mock();
        state.lock().unwrap().simulate_send_failure = true;
        assert!(display.set_brightness(8).is_err());
    }
}
