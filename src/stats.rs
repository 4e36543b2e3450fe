//! Steady-state latency reduction and report formatting.

use crate::timer::Resolution;

/// Reduced latency figures for one batch of timed searches.
///
/// Values are in the run's unit (ticks or milliseconds); conversion to
/// human-readable milliseconds happens only at print time.
#[derive(Debug, Clone, PartialEq)]
pub struct SteadyStateStats {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub median: u64,
}

impl SteadyStateStats {
    /// Reduce a batch of samples, with min/max already tracked by the loop.
    ///
    /// Median is nearest-rank: the element at ascending-sorted index
    /// `N/2`. For even N this picks the upper middle element rather than
    /// interpolating; downstream comparisons rely on this exact estimator.
    pub fn reduce(samples: &[u64], min: u64, max: u64) -> Self {
        debug_assert!(!samples.is_empty());
        let n = samples.len();
        let mean = samples.iter().sum::<u64>() as f64 / n as f64;

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let median = sorted[n / 2];

        Self {
            min,
            max,
            mean,
            median,
        }
    }

    /// Print the four steady-state report lines.
    ///
    /// Tick values convert to milliseconds with two decimals; plain
    /// millisecond values print as integers, mean truncated.
    pub fn print(&self, resolution: Resolution) {
        match resolution {
            Resolution::Ticks { frequency } => {
                let to_ms = |value: u64| crate::timer::ticks_to_millis(value, frequency);
                println!("Steadystate min search time: {:.2}ms", to_ms(self.min));
                println!("Steadystate max search time: {:.2}ms", to_ms(self.max));
                println!(
                    "Steadystate average search time: {:.2}ms",
                    1000.0 * self.mean / frequency as f64
                );
                println!("Steadystate median search time: {:.2}ms", to_ms(self.median));
            }
            Resolution::Millis => {
                println!("Steadystate min search time: {}ms", self.min);
                println!("Steadystate max search time: {}ms", self.max);
                println!("Steadystate average search time: {}ms", self.mean as u64);
                println!("Steadystate median search time: {}ms", self.median);
            }
        }
    }
}
