/*
 *  pacer.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	Step deadlines and stop-aware sleeping for the worker loops
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
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep; bounds shutdown latency
pub const SLEEP_SLICE: Duration = Duration::from_millis(50);

pub struct Pacer {
    next_deadline: Instant,
    period: Duration,
}

impl Pacer {
    /// First step is due immediately
    pub fn new(period: Duration) -> Self {
        Self { next_deadline: Instant::now(), period }
    }

    /// Returns true if a step is due; if true, it also schedules the next deadline.
    #[inline]
    pub fn should_step(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.next_deadline {
            self.next_deadline = now + self.period;
            true
        } else {
            false
        }
    }

    /// Time left until the next step is due
    #[inline]
    pub fn remaining(&self) -> Duration {
        self.next_deadline.saturating_duration_since(Instant::now())
    }
}

/// Sleep for `total` in slices, giving up early once `stop` is raised.
/// Returns false if woken by the stop flag.
pub fn nap(total: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        std::thread::sleep(left.min(SLEEP_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_step_immediate_then_waits() {
        let mut p = Pacer::new(Duration::from_secs(60));
        assert!(p.should_step());
        assert!(!p.should_step());
        assert!(p.remaining() > Duration::from_secs(59));
    }

    #[test]
    fn test_zero_period_always_due() {
        let mut p = Pacer::new(Duration::ZERO);
        assert!(p.should_step());
        assert!(p.should_step());
    }

    #[test]
    fn test_nap_returns_early_on_stop() {
        let stop = AtomicBool::new(true);
        let t0 = Instant::now();
        assert!(!nap(Duration::from_secs(10), &stop));
        assert!(t0.elapsed() < Duration::from_secs(1));

        let go = AtomicBool::new(false);
        assert!(nap(Duration::from_millis(20), &go));
    }
}
