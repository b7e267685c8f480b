/*
 *  glyphs.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	Segment patterns for the 14-segment grids and the spectrum bar levels
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use std::collections::HashMap;
use std::sync::OnceLock;

/// Three bytes of segment memory for one grid, most significant byte first.
pub type GlyphValue = [u8; 3];

pub const GLYPH_BLANK: GlyphValue = [0x00, 0x00, 0x00];
pub const GLYPH_FULL: GlyphValue = [0xFF, 0xFF, 0xFF];

/// Highest spectrum bar level.
pub const LEVEL_MAX: u8 = 10;

/// What a grid should show: a character or a bar level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlyphKey {
    Char(char),
    Level(u8),
}

impl From<char> for GlyphKey {
    fn from(c: char) -> Self {
        GlyphKey::Char(c)
    }
}

impl From<u8> for GlyphKey {
    fn from(level: u8) -> Self {
        GlyphKey::Level(level)
    }
}

// 24-bit patterns as mapped by scanning the panel segment by segment
#[rustfmt::skip]
const FONT: &[(char, u32)] = &[
    (' ', 0x000000), ('!', 0x202204), ('"', 0x300000), ('#', 0x505700),
    ('$', 0x2fa70f), ('%', 0x451209), ('&', 0x1bca0f), ('\'', 0x100000),
    ('(', 0x090807), (')', 0x84800e), ('*', 0x707700), ('+', 0x202700),
    (',', 0x008000), ('-', 0x000700), ('.', 0x000008), ('/', 0x441201),
    ('0', 0xcf980f), ('1', 0x848008), ('2', 0x870f0f), ('3', 0x47870f),
    ('4', 0x8d8708), ('5', 0x0f870f), ('6', 0x0f8f0f), ('7', 0x8f8008),
    ('8', 0x8f8f0f), ('9', 0x8f870f), (':', 0x202000), (';', 0x202001),
    ('<', 0x404100), ('=', 0x07000f), ('>', 0x101200), ('?', 0x472204),
    ('@', 0x8f1f07),
    ('A', 0x8f8f09), ('B', 0xa7a60f), ('C', 0x0f080f), ('D', 0xa7a20f),
    ('E', 0x0f0f0f), ('F', 0x0f0f01), ('G', 0x0f8c0f), ('H', 0x8d8f09),
    ('I', 0x27220f), ('J', 0x222a05), ('K', 0x4d4b09), ('L', 0x09080f),
    ('M', 0xdd8a09), ('N', 0x9dca09), ('O', 0x8f880f), ('P', 0x8f0f01),
    ('Q', 0x8fc80f), ('R', 0x8f4f09), ('S', 0x0f870f), ('T', 0x272204),
    ('U', 0x8d880f), ('V', 0x552200), ('W', 0x8dda09), ('X', 0x555209),
    ('Y', 0x552204), ('Z', 0x47120f),
    ('[', 0x0f080f), ('\\', 0x114208), (']', 0x87800f), ('^', 0x205000),
    ('_', 0x00000f), ('`', 0x100000),
];

/// Bar segments, bottom to top. Level n lights the first n of these.
#[rustfmt::skip]
const LEVEL_SEGMENTS: [u32; LEVEL_MAX as usize] = [
    0x000800, 0x001000, 0x002000, 0x004000, 0x008000,
    0x080000, 0x100000, 0x200000, 0x400000, 0x800000,
];

#[inline]
fn split(pattern: u32) -> GlyphValue {
    [(pattern >> 16) as u8, (pattern >> 8) as u8, pattern as u8]
}

/// Immutable lookup from [`GlyphKey`] to segment bytes.
#[derive(Debug, Clone)]
pub struct GlyphTable {
    chars: HashMap<char, u32>,
    levels: [u32; LEVEL_MAX as usize + 1],
}

impl Default for GlyphTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphTable {
    pub fn new() -> Self {
        let chars = FONT.iter().copied().collect::<HashMap<_, _>>();

        // each level is the previous one plus one more segment
        let mut levels = [0u32; LEVEL_MAX as usize + 1];
        let mut acc = 0u32;
        for (i, seg) in LEVEL_SEGMENTS.iter().enumerate() {
            acc |= seg;
            levels[i + 1] = acc;
        }

        Self { chars, levels }
    }

    /// Process-wide table, built on first use.
    pub fn global() -> &'static GlyphTable {
        static TABLE: OnceLock<GlyphTable> = OnceLock::new();
        TABLE.get_or_init(GlyphTable::new)
    }

    /// Segment bytes for `key`. Unknown characters and out of range levels are blank.
    pub fn lookup(&self, key: GlyphKey) -> GlyphValue {
        split(self.pattern(key))
    }

    /// Raw 24-bit pattern for `key`.
    pub fn pattern(&self, key: GlyphKey) -> u32 {
        match key {
            GlyphKey::Char(c) => {
                let c = c.to_ascii_uppercase();
                self.chars.get(&c).copied().unwrap_or(0)
            }
            GlyphKey::Level(level) => self.levels.get(level as usize).copied().unwrap_or(0),
        }
    }

    pub fn contains(&self, c: char) -> bool {
        self.chars.contains_key(&c.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_fill_monotonically() {
        let table = GlyphTable::new();
        for level in 1..=LEVEL_MAX {
            let lower = table.pattern(GlyphKey::Level(level - 1));
            let upper = table.pattern(GlyphKey::Level(level));
            assert_eq!(upper & lower, lower, "level {level} lost bits of {}", level - 1);
            assert_ne!(upper, lower, "level {level} added no bits");
        }
    }

    #[test]
    fn level_zero_blank_and_top_full_bar() {
        let table = GlyphTable::new();
        assert_eq!(table.lookup(GlyphKey::Level(0)), GLYPH_BLANK);
        assert_eq!(table.lookup(GlyphKey::Level(10)), [0xF8, 0xF8, 0x00]);
        assert_eq!(table.lookup(GlyphKey::Level(11)), GLYPH_BLANK);
    }

    #[test]
    fn lowercase_folds_to_uppercase() {
        let table = GlyphTable::new();
        assert_eq!(table.lookup('a'.into()), table.lookup('A'.into()));
        assert_eq!(table.lookup('z'.into()), [0x47, 0x12, 0x0f]);
    }

    #[test]
    fn unknown_char_is_blank() {
        let table = GlyphTable::new();
        assert_eq!(table.lookup(GlyphKey::Char('~')), GLYPH_BLANK);
        assert_eq!(table.lookup(GlyphKey::Char('é')), GLYPH_BLANK);
        assert!(!table.contains('~'));
    }

    #[test]
    fn digit_bytes_split_msb_first() {
        let table = GlyphTable::global();
        assert_eq!(table.lookup('8'.into()), [0x8f, 0x8f, 0x0f]);
        assert_eq!(table.lookup('%'.into()), [0x45, 0x12, 0x09]);
        assert_eq!(table.lookup(' '.into()), GLYPH_BLANK);
    }

    #[test]
    fn level_and_char_keys_do_not_collide() {
        let table = GlyphTable::new();
        // '1' the character is not bar level 1
        assert_ne!(table.lookup(GlyphKey::Char('1')), table.lookup(GlyphKey::Level(1)));
    }
}
