/*
 *  carousel.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	Round-robin label/value/unit frames for the metrics mode
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
use arrayvec::ArrayString;

use crate::metrics::{MetricKey, MetricsSource};

pub const LABEL_WIDTH: usize = 2;
pub const VALUE_WIDTH: usize = 3;
/// Label, value, unit and the trailing dark grid
pub const FRAME_GLYPHS: usize = LABEL_WIDTH + VALUE_WIDTH + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarouselEntry {
    pub label: &'static str,
    pub key: MetricKey,
    pub unit: char,
}

pub const DEFAULT_ENTRIES: [CarouselEntry; 5] = [
    CarouselEntry { label: "CT", key: MetricKey::CpuTemp, unit: 'C' },
    CarouselEntry { label: "GT", key: MetricKey::GpuTemp, unit: 'C' },
    CarouselEntry { label: "MU", key: MetricKey::MemoryPct, unit: '%' },
    CarouselEntry { label: "GU", key: MetricKey::GpuPct, unit: '%' },
    CarouselEntry { label: "CU", key: MetricKey::CpuPct, unit: '%' },
];

/// Fixed-width fields ready to split across grids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsFrame {
    pub label: ArrayString<LABEL_WIDTH>,
    pub value: ArrayString<VALUE_WIDTH>,
    pub unit: char,
}

/// Left-justify into exactly `N` ASCII chars, truncating the tail
fn fixed<const N: usize>(s: &str) -> ArrayString<N> {
    let mut out = ArrayString::<N>::new();
    for c in s.chars().filter(char::is_ascii).take(N) {
        out.push(c);
    }
    while out.len() < N {
        out.push(' ');
    }
    out
}

impl MetricsFrame {
    pub fn new(label: &str, value: i64, unit: char) -> Self {
        Self {
            label: fixed(label),
            value: fixed(&value.to_string()),
            unit,
        }
    }

    /// Grid order of the metrics layout
    pub fn glyphs(&self) -> [char; FRAME_GLYPHS] {
        let mut out = [' '; FRAME_GLYPHS];
        let chars = self.label.chars().chain(self.value.chars()).chain([self.unit]);
        for (slot, c) in out.iter_mut().zip(chars) {
            *slot = c;
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct MetricsCarousel {
    entries: Vec<CarouselEntry>,
    cursor: usize,
}

impl Default for MetricsCarousel {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRIES.to_vec())
    }
}

impl MetricsCarousel {
    pub fn new(entries: Vec<CarouselEntry>) -> Self {
        Self { entries, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Next entry, read fresh from `source`. None only when there are no entries.
    pub fn next(&mut self, source: &mut dyn MetricsSource) -> Option<MetricsFrame> {
        let entry = *self.entries.get(self.cursor)?;
        self.cursor = (self.cursor + 1) % self.entries.len();
        let value = source.read_all().get(entry.key);
        Some(MetricsFrame::new(entry.label, value, entry.unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsReading;

    struct Counting {
        reads: usize,
    }

    impl MetricsSource for Counting {
        fn read_all(&mut self) -> MetricsReading {
            self.reads += 1;
            MetricsReading::new()
                .with(MetricKey::CpuTemp, 45)
                .with(MetricKey::GpuTemp, self.reads as i64)
                .with(MetricKey::MemoryPct, 100)
                .with(MetricKey::CpuPct, 7)
        }
    }

    #[test]
    fn test_round_robin_order() {
        let mut c = MetricsCarousel::default();
        let mut src = Counting { reads: 0 };
        let labels: Vec<String> = (0..7)
            .map(|_| c.next(&mut src).unwrap().label.to_string())
            .collect();
        assert_eq!(labels, ["CT", "GT", "MU", "GU", "CU", "CT", "GT"]);
    }

    #[test]
    fn test_reads_fresh_each_step() {
        let mut c = MetricsCarousel::default();
        let mut src = Counting { reads: 0 };
        c.next(&mut src);
        let gt = c.next(&mut src).unwrap();
        assert_eq!(src.reads, 2);
        assert_eq!(gt.value.as_str(), "2  ");
    }

    #[test]
    fn test_frame_glyphs() {
        let f = MetricsFrame::new("CT", 45, 'C');
        assert_eq!(f.glyphs(), ['C', 'T', '4', '5', ' ', 'C', ' ']);
        let f = MetricsFrame::new("MU", 100, '%');
        assert_eq!(f.glyphs(), ['M', 'U', '1', '0', '0', '%', ' ']);
    }

    #[test]
    fn test_overlong_value_truncates() {
        let f = MetricsFrame::new("X", 12345, '%');
        assert_eq!(f.label.as_str(), "X ");
        assert_eq!(f.value.as_str(), "123");
    }

    #[test]
    fn test_missing_metric_reads_zero() {
        let mut c = MetricsCarousel::new(vec![DEFAULT_ENTRIES[3]]);
        let f = c.next(&mut Counting { reads: 0 }).unwrap();
        assert_eq!(f.glyphs(), ['G', 'U', '0', ' ', ' ', '%', ' ']);
    }

    #[test]
    fn test_empty_carousel() {
        let mut c = MetricsCarousel::new(Vec::new());
        assert!(c.next(&mut Counting { reads: 0 }).is_none());
    }
}
