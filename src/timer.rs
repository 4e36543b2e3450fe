//! Elapsed-time measurement for the benchmark loop.
//!
//! A [`Stopwatch`] wraps the platform's monotonic clock and counts elapsed
//! ticks at a fixed [`TICKS_PER_SECOND`] rate. Whether tick-level readings
//! are trustworthy is decided once at startup via [`Resolution::detect`],
//! and that choice is threaded through the loop and the statistics
//! reducer so a single run never mixes units.

use std::time::{Duration, Instant};

/// Tick rate of [`Stopwatch`]: one tick per nanosecond.
pub const TICKS_PER_SECOND: u64 = 1_000_000_000;

/// Convert a tick count to fractional milliseconds.
pub fn ticks_to_millis(ticks: u64, frequency: u64) -> f64 {
    1000.0 * ticks as f64 / frequency as f64
}

/// A restartable elapsed-time window.
///
/// Contract: calls are strictly sequential per instance. `restart` opens a
/// new window and discards the previous one; `stop` closes it; the
/// `elapsed_*` readings are only meaningful after `stop`. One instance is
/// reused across loop iterations and must never carry two overlapping
/// windows.
pub trait Timer {
    /// Begin a new measurement window, discarding any previous one.
    fn restart(&mut self);

    /// End the current window; elapsed readings are frozen afterwards.
    fn stop(&mut self);

    /// Elapsed ticks of the last stopped window.
    fn elapsed_ticks(&self) -> u64;

    /// Elapsed whole milliseconds of the last stopped window.
    fn elapsed_millis(&self) -> u64;
}

/// Monotonic-clock stopwatch.
#[derive(Debug)]
pub struct Stopwatch {
    started: Instant,
    elapsed: Duration,
}

impl Stopwatch {
    /// Create a stopwatch with its window already running.
    pub fn start_new() -> Self {
        Self {
            started: Instant::now(),
            elapsed: Duration::ZERO,
        }
    }

    /// Ticks-per-second of this stopwatch, constant for the process.
    pub fn frequency() -> u64 {
        TICKS_PER_SECOND
    }

    /// Elapsed time of the last stopped window.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Timer for Stopwatch {
    fn restart(&mut self) {
        self.started = Instant::now();
        self.elapsed = Duration::ZERO;
    }

    fn stop(&mut self) {
        self.elapsed = self.started.elapsed();
    }

    fn elapsed_ticks(&self) -> u64 {
        self.elapsed.as_nanos() as u64
    }

    fn elapsed_millis(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// The latency unit for a whole run, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Sub-millisecond ticks at the given ticks-per-second rate.
    Ticks { frequency: u64 },
    /// Whole milliseconds only.
    Millis,
}

impl Resolution {
    /// Probe the clock and pick the unit for this run.
    ///
    /// Spins on the monotonic clock a few times and takes the finest
    /// nonzero step it observes. Anything under a millisecond means
    /// tick readings are meaningful.
    pub fn detect() -> Self {
        let mut finest = Duration::from_secs(1);
        for _ in 0..16 {
            let start = Instant::now();
            let mut step = start.elapsed();
            while step.is_zero() {
                step = start.elapsed();
            }
            if step < finest {
                finest = step;
            }
        }
        if finest < Duration::from_millis(1) {
            Resolution::Ticks {
                frequency: TICKS_PER_SECOND,
            }
        } else {
            Resolution::Millis
        }
    }

    pub fn is_high_resolution(&self) -> bool {
        matches!(self, Resolution::Ticks { .. })
    }

    /// Read the elapsed value of a stopped timer in this run's unit.
    pub fn read<T: Timer + ?Sized>(&self, timer: &T) -> u64 {
        match self {
            Resolution::Ticks { .. } => timer.elapsed_ticks(),
            Resolution::Millis => timer.elapsed_millis(),
        }
    }

    /// Convert a value in this run's unit to fractional milliseconds.
    pub fn to_millis(&self, value: u64) -> f64 {
        match self {
            Resolution::Ticks { frequency } => ticks_to_millis(value, *frequency),
            Resolution::Millis => value as f64,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_conversion() {
        // 25_000 ticks at 10MHz is exactly 2.5ms
        assert_eq!(ticks_to_millis(25_000, 10_000_000), 2.5);
        assert_eq!(ticks_to_millis(0, 10_000_000), 0.0);
        assert_eq!(ticks_to_millis(TICKS_PER_SECOND, TICKS_PER_SECOND), 1000.0);
    }

    #[test]
    fn test_stop_freezes_reading() {
        let mut sw = Stopwatch::start_new();
        sw.stop();
        let first = sw.elapsed_ticks();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(sw.elapsed_ticks(), first);
    }

    #[test]
    fn test_restart_discards_previous_window() {
        let mut sw = Stopwatch::start_new();
        std::thread::sleep(Duration::from_millis(20));
        sw.stop();
        let long_window = sw.elapsed_ticks();

        sw.restart();
        sw.stop();
        assert!(sw.elapsed_ticks() < long_window);
    }

    #[test]
    fn test_millis_and_ticks_agree() {
        let mut sw = Stopwatch::start_new();
        std::thread::sleep(Duration::from_millis(10));
        sw.stop();
        let from_ticks = ticks_to_millis(sw.elapsed_ticks(), Stopwatch::frequency());
        let millis = sw.elapsed_millis() as f64;
        assert!((from_ticks - millis).abs() <= 1.0);
    }

    #[test]
    fn test_detect_reports_tick_frequency() {
        let resolution = Resolution::detect();
        if let Resolution::Ticks { frequency } = resolution {
            assert_eq!(frequency, TICKS_PER_SECOND);
            assert!(resolution.is_high_resolution());
        } else {
            assert!(!resolution.is_high_resolution());
        }
    }

    #[test]
    fn test_resolution_read_picks_unit() {
        let mut scripted = testing::ScriptedTimer::new([2_000_000]);
        scripted.restart();
        scripted.stop();

        let ticks = Resolution::Ticks {
            frequency: TICKS_PER_SECOND,
        };
        assert_eq!(ticks.read(&scripted), 2_000_000);
        assert_eq!(ticks.to_millis(2_000_000), 2.0);
        assert_eq!(Resolution::Millis.to_millis(7), 7.0);
    }
}
