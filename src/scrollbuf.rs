/*
 *  scrollbuf.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	Newest-first character buffer for the key echo
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
use std::collections::VecDeque;

/// Text grids available in keyboard mode
pub const SCROLL_CAPACITY: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollBuffer {
    chars: VecDeque<char>,
}

impl ScrollBuffer {
    pub fn new() -> Self {
        Self { chars: VecDeque::with_capacity(SCROLL_CAPACITY) }
    }

    /// Newest goes in front; the oldest falls off once full.
    pub fn push_front(&mut self, c: char) {
        if self.chars.len() == SCROLL_CAPACITY {
            self.chars.pop_back();
        }
        self.chars.push_front(c);
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn clear(&mut self) {
        self.chars.clear();
    }

    /// Newest first, padded with spaces to the full width
    pub fn snapshot(&self) -> [char; SCROLL_CAPACITY] {
        let mut out = [' '; SCROLL_CAPACITY];
        for (slot, &c) in out.iter_mut().zip(&self.chars) {
            *slot = c;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_padded() {
        let mut buf = ScrollBuffer::new();
        assert_eq!(buf.snapshot(), [' '; 6]);
        for c in ['A', 'B', 'C'] {
            buf.push_front(c);
        }
        assert_eq!(buf.snapshot(), ['C', 'B', 'A', ' ', ' ', ' ']);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut buf = ScrollBuffer::new();
        for c in "ABCDEFG".chars() {
            buf.push_front(c);
        }
        assert_eq!(buf.len(), SCROLL_CAPACITY);
        assert_eq!(buf.snapshot(), ['G', 'F', 'E', 'D', 'C', 'B']);
        buf.push_front('H');
        assert_eq!(buf.len(), SCROLL_CAPACITY);
        assert_eq!(buf.snapshot()[5], 'C');
    }
}
