/*
 *  spectrum.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	Audio block to per-band bar levels
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
use std::ops::Range;
use std::sync::Arc;

use log::debug;
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{AudioBlock, AudioError, AudioSource};
use crate::glyphs::LEVEL_MAX;

/// Weighted peaks below this read as silence
pub const LINEAR_FLOOR: f32 = 10.0;
pub const DEFAULT_GAIN: f32 = 3.0;
pub const DEFAULT_THRESHOLD: f32 = 4.0;

/// One bar level per band, 0..=10
pub type LevelVector = Vec<u8>;

/// Outcome of one read-and-analyze step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLevels {
    Block(LevelVector),
    /// The read failed; zeros stand in for this frame
    Dropped(LevelVector),
    /// End of stream
    Ended,
}

#[derive(Debug, Error, PartialEq)]
pub enum BandSpecError {
    #[error("at least one band is required")]
    Empty,
    #[error("band {0} upper bound must be above the previous band's")]
    NotIncreasing(usize),
    #[error("band {0} gain must be finite and non-negative")]
    InvalidGain(usize),
}

/// A band reaches up to `upper_hz` from the previous band's bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub upper_hz: f32,
    pub gain: f32,
}

/// Ordered, strictly increasing band bounds with per-band gain.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSpec {
    bands: Vec<Band>,
}

// treble is boosted, there is far less energy up there
const DEFAULT_BANDS: [(f32, f32); 6] = [
    (150.0, 1.0),
    (400.0, 1.2),
    (1000.0, 1.5),
    (2500.0, 2.0),
    (6000.0, 3.0),
    (20000.0, 4.0),
];

impl Default for BandSpec {
    fn default() -> Self {
        Self {
            bands: DEFAULT_BANDS
                .iter()
                .map(|&(upper_hz, gain)| Band { upper_hz, gain })
                .collect(),
        }
    }
}

impl BandSpec {
    pub fn new(bands: Vec<Band>) -> Result<Self, BandSpecError> {
        if bands.is_empty() {
            return Err(BandSpecError::Empty);
        }
        let mut prev = 0.0f32;
        for (i, band) in bands.iter().enumerate() {
            if !(band.upper_hz > prev) {
                return Err(BandSpecError::NotIncreasing(i));
            }
            if !band.gain.is_finite() || band.gain < 0.0 {
                return Err(BandSpecError::InvalidGain(i));
            }
            prev = band.upper_hz;
        }
        Ok(Self { bands })
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Bin ranges per band over `bins` magnitude bins (DC already dropped).
    ///
    /// A running cursor means consecutive ranges touch and never overlap;
    /// bounds past the last bin clamp and yield empty ranges.
    pub fn bin_ranges(&self, resolution_hz: f32, bins: usize) -> Vec<Range<usize>> {
        let mut cursor = 0usize;
        self.bands
            .iter()
            .map(|band| {
                let end = if resolution_hz > 0.0 {
                    ((band.upper_hz / resolution_hz).floor() as usize).min(bins)
                } else {
                    bins
                };
                let range = cursor..end.max(cursor);
                cursor = range.end;
                range
            })
            .collect()
    }
}

/// Log compression of a weighted band peak into a bar level.
#[inline]
pub fn compress_level(weighted: f32, gain: f32, threshold: f32) -> u8 {
    // negated so NaN lands here too
    if !(weighted >= LINEAR_FLOOR) {
        return 0;
    }
    let log = weighted.log10();
    if log <= threshold {
        return 0;
    }
    ((log - threshold) * gain).floor().clamp(0.0, LEVEL_MAX as f32) as u8
}

/// Symmetric Hann (endpoints zero), the classic numpy shape
fn hann(n: usize) -> Vec<f32> {
    if n == 1 {
        return vec![1.0];
    }
    let denom = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
        .collect()
}

/// FFT front end. Plans and scratch are kept between blocks of equal length.
pub struct SpectrumAnalyzer {
    len: usize,
    fft: Option<Arc<dyn rustfft::Fft<f32> + Send + Sync>>,
    window: Vec<f32>,
    mono: Vec<f32>,
    buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    mags: Vec<f32>,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            len: 0,
            fft: None,
            window: Vec::new(),
            mono: Vec::new(),
            buf: Vec::new(),
            scratch: Vec::new(),
            mags: Vec::new(),
        }
    }

    fn ensure(&mut self, len: usize) {
        if self.len == len && self.fft.is_some() && self.mags.len() == len / 2 {
            return;
        }
        let mut planner = rustfft::FftPlanner::<f32>::new();
        let fft: Arc<dyn rustfft::Fft<f32> + Send + Sync> = planner.plan_fft_forward(len);
        self.scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        self.buf = vec![Complex::new(0.0, 0.0); len];
        self.window = hann(len);
        self.mags = vec![0.0; len / 2];
        self.fft = Some(fft);
        self.len = len;
        debug!("spectrum: planned {}-point FFT", len);
    }

    fn downmix(&mut self, block: &AudioBlock) {
        self.mono.clear();
        let channels = block.channels() as usize;
        if channels <= 1 {
            self.mono.extend(block.samples().iter().map(|&s| s as f32));
        } else {
            self.mono.extend(
                block
                    .samples()
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().map(|&s| s as f32).sum::<f32>() / channels as f32),
            );
        }
    }

    /// Magnitudes of bins 1..=N/2 of the windowed mono signal
    pub fn magnitudes(&mut self, block: &AudioBlock) -> &[f32] {
        self.downmix(block);
        let n = self.mono.len();
        if n < 2 {
            // forces a rebuild on the next usable block
            self.len = 0;
            self.mags.clear();
            return &self.mags;
        }
        self.ensure(n);

        for ((slot, &s), &w) in self.buf.iter_mut().zip(&self.mono).zip(&self.window) {
            *slot = Complex::new(s * w, 0.0);
        }
        if let Some(fft) = &self.fft {
            fft.process_with_scratch(&mut self.buf, &mut self.scratch);
        }

        // real input: the upper half mirrors the lower, DC carries no band
        for (k, mag) in self.mags.iter_mut().enumerate() {
            *mag = self.buf[k + 1].norm();
        }
        &self.mags
    }

    /// Bar levels for one block; empty or malformed blocks give all zeros.
    pub fn analyze(&mut self, block: &AudioBlock, bands: &BandSpec, gain: f32, threshold: f32) -> LevelVector {
        let sample_rate = block.sample_rate();
        let mags = self.magnitudes(block);
        if mags.is_empty() || sample_rate == 0 {
            return vec![0; bands.len()];
        }

        let resolution = sample_rate as f32 / self.len as f32;
        let ranges = bands.bin_ranges(resolution, self.mags.len());

        ranges
            .into_iter()
            .zip(bands.bands())
            .map(|(range, band)| {
                let peak = self.mags[range].iter().copied().fold(0.0f32, f32::max);
                compress_level(peak * band.gain, gain, threshold)
            })
            .collect()
    }

    /// Read one block and analyze it. A failed read shows as silence for that frame.
    pub fn analyze_source(
        &mut self,
        source: &mut dyn AudioSource,
        bands: &BandSpec,
        gain: f32,
        threshold: f32,
    ) -> SourceLevels {
        match source.read() {
            Ok(block) => SourceLevels::Block(self.analyze(&block, bands, gain, threshold)),
            Err(AudioError::EndOfStream) => SourceLevels::Ended,
            Err(e) => {
                debug!("spectrum: audio read failed: {}", e);
                SourceLevels::Dropped(vec![0; bands.len()])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44_100;
    const N: usize = 1024;

    fn tone(freq: f32, amplitude: f32, n: usize) -> Vec<i16> {
        (0..n)
            .map(|i| (amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin()) as i16)
            .collect()
    }

    #[test]
    fn test_silence_is_all_zero() {
        let mut an = SpectrumAnalyzer::new();
        let block = AudioBlock::mono(vec![0; N], SR);
        for (gain, threshold) in [(1.0, 0.0), (10.0, -5.0), (3.0, 4.0)] {
            assert_eq!(an.analyze(&block, &BandSpec::default(), gain, threshold), vec![0; 6]);
        }
    }

    #[test]
    fn test_tone_lights_only_its_band() {
        // exactly on bin 41, ~1766 Hz, inside the 1000..2500 band
        let freq = 41.0 * SR as f32 / N as f32;
        let block = AudioBlock::mono(tone(freq, 8000.0, N), SR);
        let mut an = SpectrumAnalyzer::new();
        let levels = an.analyze(&block, &BandSpec::default(), 3.0, 5.0);

        assert_eq!(levels.len(), 6);
        assert!(levels[3] > 0, "levels {:?}", levels);
        for (i, &l) in levels.iter().enumerate() {
            if i != 3 {
                assert_eq!(l, 0, "band {} leaked: {:?}", i, levels);
            }
        }
    }

    #[test]
    fn test_stereo_is_downmixed() {
        let freq = 41.0 * SR as f32 / N as f32;
        let mono = tone(freq, 8000.0, N);
        let stereo: Vec<i16> = mono.iter().flat_map(|&s| [s, s]).collect();
        let mut an = SpectrumAnalyzer::new();
        let a = an.analyze(&AudioBlock::mono(mono, SR), &BandSpec::default(), 3.0, 5.0);
        let b = an.analyze(&AudioBlock::new(stereo, SR, 2), &BandSpec::default(), 3.0, 5.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_ranges_partition_bins() {
        let bands = BandSpec::new(vec![
            Band { upper_hz: 300.0, gain: 1.0 },
            Band { upper_hz: 3000.0, gain: 1.0 },
            Band { upper_hz: 22_050.0, gain: 1.0 },
        ])
        .unwrap();
        let bins = N / 2;
        let ranges = bands.bin_ranges(SR as f32 / N as f32, bins);

        assert_eq!(ranges[0].start, 0);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(ranges.last().unwrap().end, bins);
        assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), bins);
    }

    #[test]
    fn test_default_ranges() {
        let ranges = BandSpec::default().bin_ranges(SR as f32 / N as f32, N / 2);
        assert_eq!(ranges, vec![0..3, 3..9, 9..23, 23..58, 58..139, 139..464]);
    }

    #[test]
    fn test_bounds_beyond_nyquist_clamp() {
        // 8 kHz sample rate: the top two bands have no bins left
        let ranges = BandSpec::default().bin_ranges(8000.0 / 256.0, 128);
        assert_eq!(ranges[4], 80..128);
        assert!(ranges[5].is_empty());
        assert_eq!(ranges[5].start, 128);
    }

    #[test]
    fn test_compress_level() {
        assert_eq!(compress_level(9.99, 3.0, 0.0), 0);
        assert_eq!(compress_level(f32::NAN, 3.0, 0.0), 0);
        // log10(2e5) = 5.30, (5.30 - 4) * 3 = 3.9
        assert_eq!(compress_level(2.0e5, 3.0, 4.0), 3);
        // at threshold
        assert_eq!(compress_level(1.0e4, 3.0, 4.0), 0);
        // clamps at 10
        assert_eq!(compress_level(1.0e12, 3.0, 4.0), 10);
    }

    #[test]
    fn test_band_spec_validation() {
        assert_eq!(BandSpec::new(vec![]), Err(BandSpecError::Empty));
        assert_eq!(
            BandSpec::new(vec![
                Band { upper_hz: 500.0, gain: 1.0 },
                Band { upper_hz: 500.0, gain: 1.0 },
            ]),
            Err(BandSpecError::NotIncreasing(1))
        );
        assert_eq!(
            BandSpec::new(vec![Band { upper_hz: 500.0, gain: -1.0 }]),
            Err(BandSpecError::InvalidGain(0))
        );
    }

    #[test]
    fn test_empty_block_yields_zeros() {
        let mut an = SpectrumAnalyzer::new();
        let levels = an.analyze(&AudioBlock::mono(Vec::new(), SR), &BandSpec::default(), 3.0, 4.0);
        assert_eq!(levels, vec![0; 6]);
    }

    #[test]
    fn test_short_block_does_not_stick() {
        let freq = 41.0 * SR as f32 / N as f32;
        let block = AudioBlock::mono(tone(freq, 8000.0, N), SR);
        let mut an = SpectrumAnalyzer::new();

        let before = an.analyze(&block, &BandSpec::default(), 3.0, 5.0);
        assert!(before[3] > 0);
        for short in [Vec::new(), vec![100i16]] {
            let levels = an.analyze(&AudioBlock::mono(short, SR), &BandSpec::default(), 3.0, 5.0);
            assert_eq!(levels, vec![0; 6]);
            assert_eq!(an.analyze(&block, &BandSpec::default(), 3.0, 5.0), before);
        }
    }

    /// Fails `failures` times, then reports the end of the stream
    struct Broken {
        failures: usize,
    }

    impl AudioSource for Broken {
        fn read(&mut self) -> Result<AudioBlock, AudioError> {
            if self.failures == 0 {
                return Err(AudioError::EndOfStream);
            }
            self.failures -= 1;
            Err(AudioError::Io(std::io::Error::other("overrun")))
        }
        fn block_duration(&self) -> std::time::Duration {
            std::time::Duration::ZERO
        }
    }

    #[test]
    fn test_failed_read_is_silence() {
        let mut an = SpectrumAnalyzer::new();
        let mut src = Broken { failures: 1 };
        assert_eq!(
            an.analyze_source(&mut src, &BandSpec::default(), 3.0, 4.0),
            SourceLevels::Dropped(vec![0; 6])
        );
        assert_eq!(an.analyze_source(&mut src, &BandSpec::default(), 3.0, 4.0), SourceLevels::Ended);
    }
}
