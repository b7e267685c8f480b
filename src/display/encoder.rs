/*
 *  display/encoder.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *  (c) 2020-26 Stuart Hunter
 *
 *  PT6315 command and frame encoding
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

use arrayvec::ArrayVec;

use crate::display::error::DisplayError;
use crate::display::layout::{GridLayout, Role, GRID_COUNT};
use crate::glyphs::{GlyphKey, GlyphTable, GlyphValue, GLYPH_BLANK, GLYPH_FULL};

pub const BYTES_PER_GRID: usize = 3;
/// Display RAM of the controller, 0xC0..=0xEF
pub const DISPLAY_MEMORY_BYTES: usize = 48;

/// Address byte plus 10 grids
pub const FRAME_LEN: usize = 1 + GRID_COUNT * BYTES_PER_GRID;
/// Address byte plus the whole display RAM
pub const CLEAR_FRAME_LEN: usize = 1 + DISPLAY_MEMORY_BYTES;

// Command 1: display mode
pub const CMD_MODE_10_GRIDS: u8 = 0x06;
// Command 2: data setting
pub const CMD_WRITE_AUTO_INCREMENT: u8 = 0x40;
pub const CMD_WRITE_FIXED_ADDRESS: u8 = 0x44;
// Command 3: address setting
pub const ADDR_START: u8 = 0xC0;
// Command 4: display control, low three bits are the dimming step
pub const CMD_DISPLAY_OFF: u8 = 0x80;
pub const CMD_DISPLAY_ON: u8 = 0x88;

pub const BRIGHTNESS_OFF: u8 = 0;
pub const BRIGHTNESS_MIN: u8 = 1;
pub const BRIGHTNESS_MAX: u8 = 8;

/// One frame or command as handed to the transport
pub type FramePayload = ArrayVec<u8, CLEAR_FRAME_LEN>;

/// What the roles of a layout should show this frame.
///
/// Bands beyond `levels` and text beyond `text` render dark.
#[derive(Debug, Clone, Copy, Default)]
pub struct Symbols<'a> {
    pub levels: &'a [u8],
    pub text: &'a [char],
}

impl<'a> Symbols<'a> {
    pub fn levels(levels: &'a [u8]) -> Self {
        Self { levels, text: &[] }
    }

    pub fn text(text: &'a [char]) -> Self {
        Self { levels: &[], text }
    }
}

/// Icon cell state for the roles that are not glyphs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub status: bool,
    pub cursor: bool,
}

/// Builds PT6315 frames and commands. Pure; sending is the caller's business.
#[derive(Debug, Clone, Copy)]
pub struct VfdEncoder {
    glyphs: &'static GlyphTable,
}

impl Default for VfdEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VfdEncoder {
    pub fn new() -> Self {
        Self { glyphs: GlyphTable::global() }
    }

    fn role_bytes(&self, role: Role, symbols: &Symbols<'_>, flags: StatusFlags) -> GlyphValue {
        match role {
            Role::Band(i) => symbols
                .levels
                .get(i as usize)
                .map_or(GLYPH_BLANK, |&l| self.glyphs.lookup(GlyphKey::Level(l))),
            Role::Text(i) => symbols
                .text
                .get(i as usize)
                .map_or(GLYPH_BLANK, |&c| self.glyphs.lookup(GlyphKey::Char(c))),
            Role::Status => if flags.status { GLYPH_FULL } else { GLYPH_BLANK },
            Role::Cursor => if flags.cursor { GLYPH_FULL } else { GLYPH_BLANK },
        }
    }

    /// Whole-screen frame: start address then 3 bytes for each of the 10 grids.
    pub fn render(&self, layout: &GridLayout, symbols: &Symbols<'_>, flags: StatusFlags) -> FramePayload {
        let mut frame = FramePayload::new();
        frame.push(ADDR_START);
        for grid in 0..GRID_COUNT {
            let bytes = match layout.role(grid) {
                Some(role) => self.role_bytes(role, symbols, flags),
                None => GLYPH_BLANK,
            };
            frame.extend(bytes);
        }
        frame
    }

    /// Power-up sequence, each byte sent on its own
    pub fn init_commands(&self) -> [u8; 3] {
        [CMD_MODE_10_GRIDS, CMD_WRITE_AUTO_INCREMENT, CMD_DISPLAY_ON | 0x07]
    }

    /// 0 turns the display off, 1..=8 select the dimming steps; higher values clamp to 8
    pub fn brightness_command(&self, level: u8) -> u8 {
        match level.min(BRIGHTNESS_MAX) {
            BRIGHTNESS_OFF => CMD_DISPLAY_OFF,
            l => CMD_DISPLAY_ON + (l - 1),
        }
    }

    /// Zeroes the whole display RAM, not just the 30 bytes in use
    pub fn clear_frame(&self) -> FramePayload {
        let mut frame = FramePayload::new();
        frame.push(ADDR_START);
        frame.extend([0u8; DISPLAY_MEMORY_BYTES]);
        frame
    }

    /// Single-grid update for fixed-address data mode (0x44), where the
    /// controller does not advance the address: one `[address, byte]` write
    /// per segment byte.
    pub fn fixed_writes(&self, grid: usize, bytes: GlyphValue) -> Result<[[u8; 2]; BYTES_PER_GRID], DisplayError> {
        if grid >= GRID_COUNT {
            return Err(DisplayError::InvalidGrid(grid));
        }
        let base = ADDR_START + (grid * BYTES_PER_GRID) as u8;
        Ok([[base, bytes[0]], [base + 1, bytes[1]], [base + 2, bytes[2]]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::layout::{KEYBOARD_LAYOUT, METRICS_LAYOUT, SPECTRUM_LAYOUT, GRID_SPECIAL};

    fn grid(frame: &[u8], g: usize) -> &[u8] {
        &frame[1 + g * 3..1 + g * 3 + 3]
    }

    #[test]
    fn test_frame_lengths() {
        let enc = VfdEncoder::new();
        let frame = enc.render(&SPECTRUM_LAYOUT, &Symbols::default(), StatusFlags::default());
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(FRAME_LEN, 31);
        assert_eq!(enc.clear_frame().len(), 49);
        assert_eq!(frame[0], ADDR_START);
    }

    #[test]
    fn test_clear_frame_all_zero_after_address() {
        let enc = VfdEncoder::new();
        let frame = enc.clear_frame();
        assert_eq!(frame[0], 0xC0);
        assert!(frame[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_spectrum_frame() {
        let enc = VfdEncoder::new();
        let levels = [0u8, 1, 2, 3, 10, 5];
        let flags = StatusFlags { status: true, cursor: false };
        let frame = enc.render(&SPECTRUM_LAYOUT, &Symbols::levels(&levels), flags);

        let table = GlyphTable::global();
        for (band, &level) in levels.iter().enumerate() {
            assert_eq!(grid(&frame, band), table.lookup(GlyphKey::Level(level)));
        }
        assert_eq!(grid(&frame, GRID_SPECIAL), GLYPH_FULL);
        for g in 7..GRID_COUNT {
            assert_eq!(grid(&frame, g), GLYPH_BLANK);
        }
    }

    #[test]
    fn test_short_level_vector_renders_dark() {
        let enc = VfdEncoder::new();
        let frame = enc.render(&SPECTRUM_LAYOUT, &Symbols::levels(&[10, 10]), StatusFlags::default());
        assert_ne!(grid(&frame, 1), GLYPH_BLANK);
        assert_eq!(grid(&frame, 2), GLYPH_BLANK);
        assert_eq!(grid(&frame, GRID_SPECIAL), GLYPH_BLANK);
    }

    #[test]
    fn test_keyboard_frame_newest_rightmost() {
        let enc = VfdEncoder::new();
        let text = ['C', 'B', 'A', ' ', ' ', ' '];
        let flags = StatusFlags { status: false, cursor: true };
        let frame = enc.render(&KEYBOARD_LAYOUT, &Symbols::text(&text), flags);

        let table = GlyphTable::global();
        assert_eq!(grid(&frame, 5), table.lookup('C'.into()));
        assert_eq!(grid(&frame, 4), table.lookup('B'.into()));
        assert_eq!(grid(&frame, 3), table.lookup('A'.into()));
        assert_eq!(grid(&frame, 0), GLYPH_BLANK);
        assert_eq!(grid(&frame, GRID_SPECIAL), GLYPH_FULL);
    }

    #[test]
    fn test_metrics_frame() {
        let enc = VfdEncoder::new();
        let text = ['C', 'T', '4', '5', ' ', 'C', ' '];
        let frame = enc.render(&METRICS_LAYOUT, &Symbols::text(&text), StatusFlags::default());
        let table = GlyphTable::global();
        assert_eq!(grid(&frame, 0), table.lookup('C'.into()));
        assert_eq!(grid(&frame, 2), table.lookup('4'.into()));
        assert_eq!(grid(&frame, 6), GLYPH_BLANK);
    }

    #[test]
    fn test_brightness_commands() {
        let enc = VfdEncoder::new();
        assert_eq!(enc.brightness_command(0), 0x80);
        assert_eq!(enc.brightness_command(1), 0x88);
        assert_eq!(enc.brightness_command(8), 0x8F);
        assert_eq!(enc.brightness_command(200), 0x8F);
        let distinct: std::collections::HashSet<u8> = (1..=8).map(|l| enc.brightness_command(l)).collect();
        assert_eq!(distinct.len(), 8);
    }

    #[test]
    fn test_init_sequence() {
        assert_eq!(VfdEncoder::new().init_commands(), [0x06, 0x40, 0x8F]);
    }

    #[test]
    fn test_fixed_writes_one_address_per_byte() {
        let enc = VfdEncoder::new();
        let writes = enc.fixed_writes(6, [0x01, 0x02, 0x04]).unwrap();
        assert_eq!(writes, [[0xD2, 0x01], [0xD3, 0x02], [0xD4, 0x04]]);
        let last = enc.fixed_writes(9, GLYPH_FULL).unwrap();
        assert_eq!(last[2], [0xDD, 0xFF]);
        assert!(matches!(enc.fixed_writes(10, GLYPH_BLANK), Err(DisplayError::InvalidGrid(10))));
    }
}
