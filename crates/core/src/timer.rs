//! Frame timing.

use std::time::{Duration, Instant};

/// Measures the time between consecutive frames.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Total time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time since the previous call to `tick()` (or since creation).
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }

    /// [`tick`](Self::tick) in seconds.
    pub fn delta_secs(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_measures_since_previous_tick() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(5));
        let first = timer.tick();
        let second = timer.tick();

        assert!(first >= Duration::from_millis(5));
        assert!(second < first);
        assert!(timer.elapsed() >= first);
    }

    #[test]
    fn test_delta_secs_is_non_negative() {
        let mut timer = Timer::default();
        assert!(timer.delta_secs() >= 0.0);
    }
}
