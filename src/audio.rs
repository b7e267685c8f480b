/*
 *  audio.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	PCM block sources feeding the spectrum analyzer
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
//! Capture itself is someone else's job: anything that can hand over raw
//! interleaved s16le (arecord, parec, a FIFO from a player) works.
//!
//! ```text
//! arecord -f S16_LE -c 2 -r 44100 -t raw | vfdmon --mode spectrum --audio-source -
//! ```

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_CHANNELS: u16 = 2;
/// Frames per block, matches the capture device chunk
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("audio stream ended")]
    EndOfStream,
    #[error("unsupported channel count {0}")]
    Channels(u16),
}

fn frames_to_duration(frames: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(frames as u64 * 1_000_000 / sample_rate as u64)
}

/// One capture chunk of interleaved samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBlock {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self { samples, sample_rate, channels: channels.max(1) }
    }

    pub fn mono(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Wall time covered by the block
    pub fn duration(&self) -> Duration {
        frames_to_duration(self.frames(), self.sample_rate)
    }
}

/// Capture collaborator: hands out fixed-size blocks, blocking at most one chunk.
pub trait AudioSource: Send {
    fn read(&mut self) -> Result<AudioBlock, AudioError>;

    /// Nominal duration of one block, used to pace retries after a failed read
    fn block_duration(&self) -> Duration;
}

/// Raw little-endian s16 interleaved PCM from any reader.
pub struct PcmReader<R> {
    reader: R,
    sample_rate: u32,
    channels: u16,
    chunk_frames: usize,
    buf: Vec<u8>,
}

impl<R: Read + Send> PcmReader<R> {
    pub fn new(reader: R, sample_rate: u32, channels: u16, chunk_frames: usize) -> Result<Self, AudioError> {
        if !(1..=2).contains(&channels) {
            return Err(AudioError::Channels(channels));
        }
        let bytes = chunk_frames * channels as usize * 2;
        Ok(Self { reader, sample_rate, channels, chunk_frames, buf: vec![0; bytes] })
    }
}

impl<R: Read + Send> AudioSource for PcmReader<R> {
    fn read(&mut self) -> Result<AudioBlock, AudioError> {
        self.reader.read_exact(&mut self.buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => AudioError::EndOfStream,
            _ => AudioError::Io(e),
        })?;
        let samples = self
            .buf
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        Ok(AudioBlock::new(samples, self.sample_rate, self.channels))
    }

    fn block_duration(&self) -> Duration {
        frames_to_duration(self.chunk_frames, self.sample_rate)
    }
}

/// All-zero blocks at capture pace, for running without a capture device.
#[derive(Debug, Clone)]
pub struct SilentSource {
    sample_rate: u32,
    channels: u16,
    chunk_frames: usize,
}

impl SilentSource {
    pub fn new(sample_rate: u32, channels: u16, chunk_frames: usize) -> Self {
        Self { sample_rate, channels: channels.max(1), chunk_frames }
    }
}

impl AudioSource for SilentSource {
    fn read(&mut self) -> Result<AudioBlock, AudioError> {
        std::thread::sleep(self.block_duration());
        let samples = vec![0; self.chunk_frames * self.channels as usize];
        Ok(AudioBlock::new(samples, self.sample_rate, self.channels))
    }

    fn block_duration(&self) -> Duration {
        frames_to_duration(self.chunk_frames, self.sample_rate)
    }
}

/// Source named by `path`: "none" is silence, "-" reads stdin, anything else is a PCM file or FIFO.
pub fn open_source(
    path: &str,
    sample_rate: u32,
    channels: u16,
    chunk_frames: usize,
) -> Result<Box<dyn AudioSource>, AudioError> {
    if path == "none" {
        return Ok(Box::new(SilentSource::new(sample_rate, channels, chunk_frames)));
    }
    Ok(Box::new(open_pcm(path, sample_rate, channels, chunk_frames)?))
}

/// Open `path` as a PCM stream; "-" reads stdin.
pub fn open_pcm(
    path: &str,
    sample_rate: u32,
    channels: u16,
    chunk_frames: usize,
) -> Result<PcmReader<Box<dyn Read + Send>>, AudioError> {
    let reader: Box<dyn Read + Send> = if path == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(BufReader::new(File::open(Path::new(path))?))
    };
    PcmReader::new(reader, sample_rate, channels, chunk_frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_reads_fixed_blocks() {
        let samples: Vec<i16> = (0..16).map(|i| i * 100 - 800).collect();
        let mut src = PcmReader::new(Cursor::new(pcm_bytes(&samples)), 8000, 2, 4).unwrap();

        let a = src.read().unwrap();
        assert_eq!(a.samples(), &samples[..8]);
        assert_eq!(a.frames(), 4);
        assert_eq!(a.channels(), 2);
        let b = src.read().unwrap();
        assert_eq!(b.samples(), &samples[8..]);
        assert!(matches!(src.read(), Err(AudioError::EndOfStream)));
    }

    #[test]
    fn test_partial_block_is_end_of_stream() {
        let mut src = PcmReader::new(Cursor::new(pcm_bytes(&[1, 2, 3])), 8000, 1, 4).unwrap();
        assert!(matches!(src.read(), Err(AudioError::EndOfStream)));
    }

    #[test]
    fn test_rejects_surround() {
        assert!(matches!(
            PcmReader::new(Cursor::new(Vec::new()), 48_000, 6, 1024),
            Err(AudioError::Channels(6))
        ));
    }

    #[test]
    fn test_silent_source() {
        let mut src = SilentSource::new(8000, 2, 80);
        let block = src.read().unwrap();
        assert_eq!(block.frames(), 80);
        assert!(block.samples().iter().all(|&s| s == 0));
        assert_eq!(src.block_duration(), Duration::from_millis(10));
    }

    #[test]
    fn test_open_source_none_is_silence() {
        let mut src = open_source("none", 8000, 1, 8).unwrap();
        assert_eq!(src.read().unwrap().samples(), &[0i16; 8]);
    }

    #[test]
    fn test_block_duration() {
        let src = PcmReader::new(Cursor::new(Vec::new()), 44_100, 2, 441).unwrap();
        assert_eq!(src.block_duration(), Duration::from_millis(10));
        let block = AudioBlock::new(vec![0; 882], 44_100, 2);
        assert_eq!(block.duration(), Duration::from_millis(10));
    }
}
