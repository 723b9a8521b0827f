//! Frame timing for the simulation loop.

use std::time::{Duration, Instant};

/// Upper bound on fixed steps drained per frame, so a long stall does not
/// turn into an ever-growing backlog.
const MAX_STEPS_PER_FRAME: u32 = 8;

/// Tracks frame deltas and hands out fixed simulation ticks.
#[derive(Debug)]
pub struct Time {
    /// Time of the last wall-clock frame.
    last_frame: Instant,
    /// Duration of the last frame.
    delta: Duration,
    /// Total simulated time fed in so far.
    elapsed: Duration,
    /// Frame count since start.
    frame_count: u64,
    /// Fixed timestep for physics (default 60 Hz).
    fixed_timestep: Duration,
    /// Accumulated time for fixed updates.
    accumulator: Duration,
    /// Fixed steps handed out during the current frame.
    steps_this_frame: u32,
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Time {
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
            fixed_timestep: Duration::from_secs_f64(1.0 / 60.0),
            accumulator: Duration::ZERO,
            steps_this_frame: 0,
        }
    }

    /// Start a new frame using the wall clock.
    pub fn update(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;
        self.advance(delta);
    }

    /// Start a new frame with an explicit delta. Used by headless loops and
    /// tests where the wall clock is irrelevant.
    pub fn advance(&mut self, delta: Duration) {
        self.delta = delta;
        self.elapsed += delta;
        self.frame_count += 1;
        self.accumulator += delta;
        self.steps_this_frame = 0;
    }

    pub fn delta_seconds(&self) -> f64 {
        self.delta.as_secs_f64()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fixed_timestep_seconds(&self) -> f64 {
        self.fixed_timestep.as_secs_f64()
    }

    /// Check if a fixed update should run and consume the time.
    ///
    /// Once the per-frame cap is hit the remaining backlog is dropped.
    pub fn should_fixed_update(&mut self) -> bool {
        if self.accumulator < self.fixed_timestep {
            return false;
        }
        if self.steps_this_frame >= MAX_STEPS_PER_FRAME {
            log::debug!(
                "dropping {:.3}s of simulation backlog",
                self.accumulator.as_secs_f64()
            );
            self.accumulator = Duration::ZERO;
            return false;
        }
        self.accumulator -= self.fixed_timestep;
        self.steps_this_frame += 1;
        true
    }

    /// Set the fixed timestep rate in Hz. Rates that don't give a positive,
    /// finite timestep are ignored with a warning.
    pub fn set_fixed_rate(&mut self, hz: f64) {
        match Duration::try_from_secs_f64(1.0 / hz) {
            Ok(step) if !step.is_zero() => self.fixed_timestep = step,
            _ => log::warn!(
                "ignoring fixed rate {hz} Hz, keeping {:.4}s timestep",
                self.fixed_timestep.as_secs_f64()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_frame_at_rate_yields_one_step() {
        let mut time = Time::new();
        time.set_fixed_rate(50.0);
        time.advance(Duration::from_millis(20));
        assert!(time.should_fixed_update());
        assert!(!time.should_fixed_update());
        assert_eq!(time.frame_count(), 1);
    }

    #[test]
    fn stall_is_capped() {
        let mut time = Time::new();
        time.set_fixed_rate(100.0);
        time.advance(Duration::from_secs(1));
        let mut steps = 0;
        while time.should_fixed_update() {
            steps += 1;
        }
        assert_eq!(steps, MAX_STEPS_PER_FRAME);
        // Backlog was dropped, a short frame starts fresh.
        time.advance(Duration::from_millis(10));
        assert!(time.should_fixed_update());
        assert!(!time.should_fixed_update());
    }

    #[test]
    fn bad_fixed_rates_keep_the_old_step() {
        let mut time = Time::new();
        time.set_fixed_rate(50.0);
        for hz in [0.0, -30.0, f64::NAN, f64::INFINITY] {
            time.set_fixed_rate(hz);
            assert!((time.fixed_timestep_seconds() - 0.02).abs() < 1e-12, "rate {hz}");
        }
    }
}
