/*
 *  display/traits.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definitions for the byte transport abstraction
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

use crate::display::error::DisplayError;

/// Physical link to the display controller.
///
/// Implementations move bytes exactly as given; bit ordering and framing are
/// handled by [`TransportAdapter`](crate::display::transport::TransportAdapter).
/// Each `send` is one chip-select cycle, so the controller sees a whole
/// command or frame at a time.
pub trait ByteTransport: Send {
    /// Short human readable name for logs
    fn name(&self) -> &str;

    /// Acquire and configure the device
    fn open(&mut self) -> Result<(), DisplayError>;

    /// Stream one frame to the device
    fn send(&mut self, bytes: &[u8]) -> Result<(), DisplayError>;

    /// Release the device. Safe to call more than once.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Boxed transport for runtime selection
pub type BoxedTransport = Box<dyn ByteTransport>;
