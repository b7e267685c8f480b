/*
 *  modes.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	Worker loops, one per display mode
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
//! Every loop runs on the calling thread until `stop` is raised (or its
//! input runs dry), checking the flag at least every 50 ms. Frame write
//! failures are logged and the frame dropped; the loop carries on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::mpsc::error::TryRecvError;

use crate::audio::AudioSource;
use crate::carousel::MetricsCarousel;
use crate::dimmer::{run_decay_loop, BrightnessDimmer, DimmerConfig};
use crate::display::encoder::BRIGHTNESS_MIN;
use crate::display::layout::GRID_COUNT;
use crate::display::{
    DisplayError, StatusFlags, Symbols, VfdDisplay, KEYBOARD_LAYOUT, METRICS_LAYOUT, SPECTRUM_LAYOUT,
};
use crate::glyphs::{GlyphValue, GLYPH_BLANK};
use crate::keyboard::{KeyEvent, KeyReceiver};
use crate::metrics::MetricsSource;
use crate::pacer::{nap, Pacer, SLEEP_SLICE};
use crate::scrollbuf::ScrollBuffer;
use crate::spectrum::{BandSpec, SourceLevels, SpectrumAnalyzer, DEFAULT_GAIN, DEFAULT_THRESHOLD};

/// Cursor dark time after each key
pub const BLINK_DURATION: Duration = Duration::from_millis(100);
const KEY_POLL: Duration = Duration::from_millis(10);
/// Bits in one grid's segment memory
pub const SCAN_BITS: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSettings {
    pub bands: BandSpec,
    pub gain: f32,
    pub threshold: f32,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self { bands: BandSpec::default(), gain: DEFAULT_GAIN, threshold: DEFAULT_THRESHOLD }
    }
}

/// Logs the first failure of a run at warn, repeats at debug, and notes recovery.
#[derive(Debug, Default)]
struct WriteHealth {
    failing: bool,
}

impl WriteHealth {
    fn record(&mut self, what: &str, result: Result<(), DisplayError>) {
        match result {
            Ok(()) => {
                if self.failing {
                    info!("{}: display writes recovered", what);
                    self.failing = false;
                }
            }
            Err(e) if !self.failing => {
                warn!("{}: frame dropped: {}", what, e);
                self.failing = true;
            }
            Err(e) => debug!("{}: frame dropped: {}", what, e),
        }
    }
}

/// Capture, analyze and draw as fast as the audio source delivers blocks.
///
/// A failed read shows silence for one block time; the end of the stream ends the loop.
pub fn run_spectrum(
    display: &VfdDisplay,
    source: &mut dyn AudioSource,
    settings: &SpectrumSettings,
    stop: &AtomicBool,
) {
    info!("spectrum: {} bands", settings.bands.len());
    let mut analyzer = SpectrumAnalyzer::new();
    let mut health = WriteHealth::default();
    let flags = StatusFlags { status: true, cursor: false };

    while !stop.load(Ordering::Relaxed) {
        match analyzer.analyze_source(source, &settings.bands, settings.gain, settings.threshold) {
            SourceLevels::Block(levels) => {
                health.record("spectrum", display.draw(&SPECTRUM_LAYOUT, &Symbols::levels(&levels), flags));
            }
            SourceLevels::Dropped(silence) => {
                health.record("spectrum", display.draw(&SPECTRUM_LAYOUT, &Symbols::levels(&silence), flags));
                nap(source.block_duration(), stop);
            }
            SourceLevels::Ended => {
                info!("spectrum: audio stream ended");
                break;
            }
        }
    }
}

/// Step the carousel every `interval`, reading fresh values each step.
pub fn run_metrics(display: &VfdDisplay, source: &mut dyn MetricsSource, interval: Duration, stop: &AtomicBool) {
    info!("metrics: rotating every {:?}", interval);
    let mut carousel = MetricsCarousel::default();
    let mut pacer = Pacer::new(interval);
    let mut health = WriteHealth::default();

    while !stop.load(Ordering::Relaxed) {
        if pacer.should_step() {
            let Some(frame) = carousel.next(source) else {
                warn!("metrics: nothing to show");
                return;
            };
            debug!("metrics: {}{}{}", frame.label, frame.value, frame.unit);
            let glyphs = frame.glyphs();
            health.record("metrics", display.draw(&METRICS_LAYOUT, &Symbols::text(&glyphs), StatusFlags::default()));
        }
        std::thread::sleep(pacer.remaining().min(SLEEP_SLICE));
    }
}

fn draw_keys(display: &VfdDisplay, buffer: &ScrollBuffer, cursor: bool) -> Result<(), DisplayError> {
    let text = buffer.snapshot();
    display.draw(&KEYBOARD_LAYOUT, &Symbols::text(&text), StatusFlags { status: false, cursor })
}

/// Key echo with idle dimming.
///
/// Keys arrive through the mailbox and are drained here; the decay loop
/// runs on a scoped thread alongside. Starts at MIN brightness so the first
/// key visibly wakes the panel.
pub fn run_keyboard(display: &VfdDisplay, mut keys: KeyReceiver, config: DimmerConfig, stop: &AtomicBool) {
    let mut buffer = ScrollBuffer::new();
    let mut health = WriteHealth::default();
    let dimmer = Mutex::new(BrightnessDimmer::new(config, BRIGHTNESS_MIN, Instant::now()));

    health.record("keyboard", draw_keys(display, &buffer, true));
    health.record("keyboard", display.set_brightness(BRIGHTNESS_MIN));
    info!("keyboard: echo started, idle dim after {:?}", config.idle_timeout);

    std::thread::scope(|s| {
        let spawned = std::thread::Builder::new()
            .name("vfd-dimmer".into())
            .spawn_scoped(s, || run_decay_loop(&dimmer, display, stop));
        if let Err(e) = spawned {
            warn!("keyboard: dimmer thread not started: {}", e);
        }

        let mut source_done = false;
        while !stop.load(Ordering::Relaxed) {
            let event = match keys.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => {
                    std::thread::sleep(KEY_POLL);
                    continue;
                }
                Err(TryRecvError::Disconnected) => {
                    if !source_done {
                        info!("keyboard: key source ended");
                        source_done = true;
                    }
                    std::thread::sleep(SLEEP_SLICE);
                    continue;
                }
            };

            let c = match event {
                KeyEvent::Char(c) => c,
                KeyEvent::Cancel => {
                    info!("keyboard: cancel key");
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
                KeyEvent::Enter => continue,
            };

            {
                let mut d = dimmer.lock().unwrap_or_else(PoisonError::into_inner);
                d.begin_animation();
                if let Some(level) = d.on_activity(Instant::now()) {
                    health.record("keyboard", display.set_brightness(level));
                }
            }

            buffer.push_front(c);
            health.record("keyboard", draw_keys(display, &buffer, false));
            std::thread::sleep(BLINK_DURATION);
            health.record("keyboard", draw_keys(display, &buffer, true));

            dimmer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .end_animation(Instant::now());
        }
    });
    debug!("keyboard: echo stopped");
}

/// Segment pattern with only bit `bit` (0 = LSB of the last byte) lit
pub fn scan_pattern(bit: usize) -> GlyphValue {
    let v = 1u32 << (bit % SCAN_BITS);
    [(v >> 16) as u8, (v >> 8) as u8, v as u8]
}

/// Segment mapping aid: lights one bit of `grid` at a time through
/// fixed-address writes. Enter or space steps, `q` or cancel quits.
pub fn run_scan(display: &VfdDisplay, mut keys: KeyReceiver, grid: usize, stop: &AtomicBool) -> Result<(), DisplayError> {
    if grid >= GRID_COUNT {
        return Err(DisplayError::InvalidGrid(grid));
    }
    display.set_fixed_address_mode(true)?;
    let mut bit = 0usize;
    let show = |bit: usize| -> Result<(), DisplayError> {
        let pattern = scan_pattern(bit);
        info!("scan: grid {} bit {:2} -> {:02X?}", grid, bit, pattern);
        display.write_grid_fixed(grid, pattern)
    };
    show(bit)?;

    while !stop.load(Ordering::Relaxed) {
        match keys.try_recv() {
            Ok(KeyEvent::Enter) | Ok(KeyEvent::Char(' ')) => {
                bit = (bit + 1) % SCAN_BITS;
                show(bit)?;
            }
            Ok(KeyEvent::Char('q')) | Ok(KeyEvent::Char('Q')) | Ok(KeyEvent::Cancel) => break,
            Ok(KeyEvent::Char(_)) => {}
            Err(TryRecvError::Empty) => std::thread::sleep(KEY_POLL),
            Err(TryRecvError::Disconnected) => break,
        }
    }

    display.write_grid_fixed(grid, GLYPH_BLANK)?;
    display.set_fixed_address_mode(false)
}
