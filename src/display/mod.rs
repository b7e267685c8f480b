/*
 *  display/mod.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem: transport, encoding, layouts
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

// Core trait definitions
pub mod traits;
pub mod error;
pub mod transport;

// Byte transports
pub mod drivers;

// Frame building
pub mod encoder;
pub mod layout;

// Shared display handle
pub mod manager;

// Re-exports for convenience
pub use traits::{ByteTransport, BoxedTransport};
pub use error::DisplayError;
pub use transport::TransportAdapter;
pub use encoder::{FramePayload, StatusFlags, Symbols, VfdEncoder};
pub use layout::{GridLayout, Role, KEYBOARD_LAYOUT, METRICS_LAYOUT, SPECTRUM_LAYOUT};
pub use manager::VfdDisplay;
pub use drivers::mock::MockTransport;
pub use drivers::spidev::SpidevTransport;

/// Display mode - controls what content is shown on the display
#[derive(Debug, PartialEq, Eq, Clone, Copy, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Spectrum,   // live audio bars
    Metrics,    // system health carousel
    Keyboard,   // keystroke echo with idle dimming
    Scan,       // segment mapping diagnostic
}
