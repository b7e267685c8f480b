/*
 *  display/transport.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared, bit-order correcting front end for the byte transport
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

use std::sync::{Mutex, MutexGuard, PoisonError};

use arrayvec::ArrayVec;
use log::{debug, info, trace};

use crate::display::error::DisplayError;
use crate::display::traits::{BoxedTransport, ByteTransport};

/// Largest frame the controller accepts: address byte plus 48 bytes of display memory.
pub const MAX_WIRE_FRAME: usize = 49;

/// The PT6315 clocks data LSB first, the SPI master shifts MSB first.
#[inline]
pub fn reverse_bits(b: u8) -> u8 {
    b.reverse_bits()
}

/// Owns the transport; every send is serialized by one mutex.
pub struct TransportAdapter {
    inner: Mutex<BoxedTransport>,
}

impl TransportAdapter {
    pub fn new(transport: BoxedTransport) -> Self {
        Self { inner: Mutex::new(transport) }
    }

    // a panic on another thread must not stop cleanup from reaching the device
    fn lock(&self) -> MutexGuard<'_, BoxedTransport> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open(&self) -> Result<(), DisplayError> {
        let mut transport = self.lock();
        transport.open()?;
        info!("transport {} open", transport.name());
        Ok(())
    }

    /// Bit-reverse `logical` and send it as one frame.
    pub fn send(&self, logical: &[u8]) -> Result<(), DisplayError> {
        if logical.len() > MAX_WIRE_FRAME {
            return Err(DisplayError::BufferSizeMismatch {
                expected: MAX_WIRE_FRAME,
                actual: logical.len(),
            });
        }
        let wire: ArrayVec<u8, MAX_WIRE_FRAME> = logical.iter().copied().map(reverse_bits).collect();
        trace!("send {:02X?}", logical);

        let mut transport = self.lock();
        if !transport.is_open() {
            return Err(DisplayError::NotOpen);
        }
        transport.send(&wire)
    }

    pub fn close(&self) {
        let mut transport = self.lock();
        if transport.is_open() {
            transport.close();
            debug!("transport {} closed", transport.name());
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_open()
    }
}
