/*
 *  display/layout.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *  (c) 2020-26 Stuart Hunter
 *
 *  Fixed role to grid assignments for each display mode
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

/// Number of physical grids driven in 10-grid mode
pub const GRID_COUNT: usize = 10;

/// Grid 6 is the panel's leftmost cell: disc/MP3/ring icons rather than a character
pub const GRID_SPECIAL: usize = 6;

/// What a grid is used for in a given layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Spectrum bar for band n
    Band(u8),
    /// n-th character of the text line
    Text(u8),
    /// Icon cell lit while the mode is running
    Status,
    /// Icon cell used as a typing cursor
    Cursor,
}

/// Constant map from physical grid to role. Unassigned grids stay dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    name: &'static str,
    slots: [Option<Role>; GRID_COUNT],
}

impl GridLayout {
    pub const fn new(name: &'static str, slots: [Option<Role>; GRID_COUNT]) -> Self {
        Self { name, slots }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Role of `grid`, None when the grid is unused or out of range
    pub fn role(&self, grid: usize) -> Option<Role> {
        self.slots.get(grid).copied().flatten()
    }

    /// Physical grid carrying `role`
    pub fn grid_of(&self, role: Role) -> Option<usize> {
        self.slots.iter().position(|r| *r == Some(role))
    }

    /// Number of grids assigned a `Text` role
    pub fn text_width(&self) -> usize {
        self.slots.iter().filter(|r| matches!(r, Some(Role::Text(_)))).count()
    }

    /// Number of grids assigned a `Band` role
    pub fn band_count(&self) -> usize {
        self.slots.iter().filter(|r| matches!(r, Some(Role::Band(_)))).count()
    }
}

/// Six bars on grids 0..5, icon cell lit
#[rustfmt::skip]
pub const SPECTRUM_LAYOUT: GridLayout = GridLayout::new(
    "spectrum",
    [
        Some(Role::Band(0)), Some(Role::Band(1)), Some(Role::Band(2)),
        Some(Role::Band(3)), Some(Role::Band(4)), Some(Role::Band(5)),
        Some(Role::Status), None, None, None,
    ],
);

/// Label, value, unit packed to the left; the icon cell is used as a blank
#[rustfmt::skip]
pub const METRICS_LAYOUT: GridLayout = GridLayout::new(
    "metrics",
    [
        Some(Role::Text(0)), Some(Role::Text(1)), Some(Role::Text(2)),
        Some(Role::Text(3)), Some(Role::Text(4)), Some(Role::Text(5)),
        Some(Role::Text(6)), None, None, None,
    ],
);

/// Newest character on grid 5 (rightmost), older ones shift left
#[rustfmt::skip]
pub const KEYBOARD_LAYOUT: GridLayout = GridLayout::new(
    "keyboard",
    [
        Some(Role::Text(5)), Some(Role::Text(4)), Some(Role::Text(3)),
        Some(Role::Text(2)), Some(Role::Text(1)), Some(Role::Text(0)),
        Some(Role::Cursor), None, None, None,
    ],
);
