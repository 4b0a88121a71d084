//! Time utilities for the tick loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Interval between ticks for a given rate, `None` when free running
pub fn tick_interval(tick_rate_hz: f64) -> Option<Duration> {
    if tick_rate_hz > 0.0 {
        Some(Duration::from_secs_f64(1.0 / tick_rate_hz))
    } else {
        None
    }
}

/// Measures the wall time handed to the engine between consecutive steps.
///
/// With a fixed step configured, `lap` always reports that value instead.
#[derive(Debug, Clone)]
pub struct TickClock {
    last: Instant,
    fixed_step: Option<f64>,
}

impl TickClock {
    pub fn new(fixed_step: Option<f64>) -> Self {
        Self {
            last: Instant::now(),
            fixed_step,
        }
    }

    /// Seconds since the previous lap (or since construction/reset)
    pub fn lap(&mut self) -> f64 {
        let now = Instant::now();
        let measured = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        self.fixed_step.unwrap_or(measured)
    }

    pub fn reset(&mut self) {
        self.last = Instant::now();
    }
}

/// Paces a loop at a target rate without accumulating drift.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Option<Duration>,
    next_deadline: Instant,
}

impl Pacer {
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            next_deadline: Instant::now(),
        }
    }

    /// Block until the next deadline. Missed deadlines are skipped, not replayed.
    pub fn wait(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };

        self.next_deadline += interval;
        let now = Instant::now();
        if self.next_deadline > now {
            std::thread::sleep(self.next_deadline - now);
        } else {
            self.next_deadline = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_step_overrides_measurement() {
        let mut clock = TickClock::new(Some(0.01));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.lap(), 0.01);
        assert_eq!(clock.lap(), 0.01);
    }

    #[test]
    fn test_measured_step_is_positive() {
        let mut clock = TickClock::new(None);
        std::thread::sleep(Duration::from_millis(2));
        let elapsed = clock.lap();
        assert!(elapsed >= 0.002);
    }

    #[test]
    fn test_tick_interval() {
        assert_eq!(tick_interval(0.0), None);
        let interval = tick_interval(50.0).unwrap();
        assert!((interval.as_secs_f64() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_uptime_after_init() {
        init_server_time();
        assert!(uptime_secs() < 60);
    }
}
