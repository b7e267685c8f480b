/*
 *  dimmer.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	Idle auto-dimming: snap to full on activity, step down when quiet
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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::display::encoder::{BRIGHTNESS_MAX, BRIGHTNESS_MIN, BRIGHTNESS_OFF};
use crate::display::VfdDisplay;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(200);
/// Decay loop poll period, keeps shutdown latency low
pub const DECAY_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimmerConfig {
    pub idle_timeout: Duration,
    pub step_delay: Duration,
}

impl Default for DimmerConfig {
    fn default() -> Self {
        Self { idle_timeout: DEFAULT_IDLE_TIMEOUT, step_delay: DEFAULT_STEP_DELAY }
    }
}

/// Brightness ladder state.
///
/// Pure: callers pass `now` and send whatever level comes back. Activity
/// only ever raises the level, `tick` only ever lowers it, and it never
/// lowers below MIN on its own; OFF is reached through `force_off` alone.
#[derive(Debug, Clone)]
pub struct BrightnessDimmer {
    level: u8,
    last_activity: Instant,
    next_step: Option<Instant>,
    animating: bool,
    config: DimmerConfig,
}

impl BrightnessDimmer {
    pub fn new(config: DimmerConfig, level: u8, now: Instant) -> Self {
        Self {
            level: level.min(BRIGHTNESS_MAX),
            last_activity: now,
            next_step: None,
            animating: false,
            config,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn config(&self) -> &DimmerConfig {
        &self.config
    }

    /// Key press or similar. Returns the level to send if it changed.
    pub fn on_activity(&mut self, now: Instant) -> Option<u8> {
        self.last_activity = now;
        self.next_step = None;
        if self.level < BRIGHTNESS_MAX {
            self.level = BRIGHTNESS_MAX;
            Some(self.level)
        } else {
            None
        }
    }

    /// Decay is held off until `end_animation`
    pub fn begin_animation(&mut self) {
        self.animating = true;
    }

    /// Restarts the idle timer from the end of the animation
    pub fn end_animation(&mut self, now: Instant) {
        self.animating = false;
        self.last_activity = now;
        self.next_step = None;
    }

    pub fn force_off(&mut self) -> u8 {
        self.level = BRIGHTNESS_OFF;
        self.next_step = None;
        self.level
    }

    pub fn force_level(&mut self, level: u8) -> u8 {
        self.level = level.min(BRIGHTNESS_MAX);
        self.next_step = None;
        self.level
    }

    /// One decay step if one is due. Returns the new level to send.
    pub fn tick(&mut self, now: Instant) -> Option<u8> {
        if self.animating || self.level <= BRIGHTNESS_MIN {
            return None;
        }
        if now.saturating_duration_since(self.last_activity) <= self.config.idle_timeout {
            return None;
        }
        if let Some(next) = self.next_step {
            if now < next {
                return None;
            }
        }
        self.level -= 1;
        self.next_step = Some(now + self.config.step_delay);
        Some(self.level)
    }
}

/// Drives `tick` until `stop` is raised. The dimmer lock is held across the
/// send so brightness commands reach the wire in the order they were decided.
pub fn run_decay_loop(dimmer: &Mutex<BrightnessDimmer>, display: &VfdDisplay, stop: &AtomicBool) {
    debug!("dimmer: decay loop started");
    while !stop.load(Ordering::Relaxed) {
        {
            let mut guard = dimmer.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(level) = guard.tick(Instant::now()) {
                if let Err(e) = display.set_brightness(level) {
                    warn!("dimmer: brightness {} not sent: {}", level, e);
                }
            }
        }
        std::thread::sleep(DECAY_POLL);
    }
    debug!("dimmer: decay loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::mock::MockTransport;
    use std::sync::Arc;

    const MS: Duration = Duration::from_millis(1);

    fn fresh(now: Instant) -> BrightnessDimmer {
        BrightnessDimmer::new(DimmerConfig::default(), BRIGHTNESS_MAX, now)
    }

    #[test]
    fn test_no_decay_before_idle_timeout() {
        let t0 = Instant::now();
        let mut d = fresh(t0);
        assert_eq!(d.tick(t0 + 100 * MS), None);
        assert_eq!(d.tick(t0 + 500 * MS), None);
        assert_eq!(d.level(), 8);
    }

    #[test]
    fn test_converges_to_min() {
        let t0 = Instant::now();
        let mut d = fresh(t0);
        let mut t = t0 + 501 * MS;
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(d.tick(t).unwrap());
            // too soon for another step
            assert_eq!(d.tick(t + 100 * MS), None);
            t += 200 * MS;
        }
        assert_eq!(seen, vec![7, 6, 5, 4, 3, 2, 1]);
        // holds at MIN forever
        assert_eq!(d.tick(t + Duration::from_secs(60)), None);
        assert_eq!(d.level(), BRIGHTNESS_MIN);
    }

    #[test]
    fn test_activity_snaps_to_max() {
        let t0 = Instant::now();
        let mut d = BrightnessDimmer::new(DimmerConfig::default(), BRIGHTNESS_MIN, t0);
        assert_eq!(d.on_activity(t0), Some(8));
        // already at max, nothing to send
        assert_eq!(d.on_activity(t0 + MS), None);
        assert_eq!(d.level(), 8);
        // idle clock restarted
        assert_eq!(d.tick(t0 + 400 * MS), None);
    }

    #[test]
    fn test_animation_suspends_decay() {
        let t0 = Instant::now();
        let mut d = fresh(t0);
        d.begin_animation();
        assert_eq!(d.tick(t0 + Duration::from_secs(5)), None);
        d.end_animation(t0 + Duration::from_secs(5));
        assert_eq!(d.tick(t0 + Duration::from_millis(5400)), None);
        assert_eq!(d.tick(t0 + Duration::from_millis(5600)), Some(7));
    }

    #[test]
    fn test_off_only_by_command() {
        let t0 = Instant::now();
        let mut d = fresh(t0);
        assert_eq!(d.force_off(), 0);
        assert_eq!(d.tick(t0 + Duration::from_secs(10)), None);
        assert_eq!(d.level(), 0);
        assert_eq!(d.on_activity(t0 + Duration::from_secs(11)), Some(8));
        assert_eq!(d.force_level(20), 8);
    }

    #[test]
    fn test_decay_loop_emits_ladder() {
        let mock = MockTransport::new();
        let state = mock.state();
        let display = VfdDisplay::new(Box::new(mock));
        display.open().unwrap();

        let config = DimmerConfig { idle_timeout: 10 * MS, step_delay: MS };
        let dimmer = Arc::new(Mutex::new(BrightnessDimmer::new(config, BRIGHTNESS_MAX, Instant::now())));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let (dimmer, display, stop) = (dimmer.clone(), display.clone(), stop.clone());
            std::thread::spawn(move || run_decay_loop(&dimmer, &display, &stop))
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while dimmer.lock().unwrap().level() > BRIGHTNESS_MIN && Instant::now() < deadline {
            std::thread::sleep(10 * MS);
        }
        stop.store(true, Ordering::Relaxed);
        worker.join().unwrap();

        let cmds = state.lock().unwrap().commands();
        assert_eq!(cmds, vec![0x8E, 0x8D, 0x8C, 0x8B, 0x8A, 0x89, 0x88]);
    }
}
