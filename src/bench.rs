//! Warm-up pass and steady-state benchmark loop.
//!
//! The loop owns the measurement discipline: one reusable timer, strictly
//! sequential restart/stop around each distance+analogy pair, and one
//! report per (outer batch, phrase). Search backends plug in through
//! [`PhraseSearcher`], which is all the loop knows about them.

use anyhow::Result;
use std::time::Duration;

use crate::config::BenchOptions;
use crate::stats::SteadyStateStats;
use crate::timer::{Resolution, Stopwatch, Timer};

/// One ranked search result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub word: String,
    pub distance: f32,
}

/// A read-only phrase query service.
///
/// Implementations must be deterministic for identical model and phrase,
/// safe to call repeatedly without state drift, and blocking. Any error
/// is fatal to the benchmark run.
pub trait PhraseSearcher {
    fn search(&self, phrase: &str) -> Result<Vec<Neighbor>>;
}

/// Reduced statistics for one (outer batch, phrase) pair.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outer: usize,
    pub phrase: String,
    pub stats: SteadyStateStats,
}

/// Run the untimed warm-up pass: `reps` rounds over every phrase, one
/// distance and one analogy call each, results and per-call timings
/// discarded. Returns the total wall-clock spent, for the one-line
/// phase report.
pub fn warm_up(
    distance: &dyn PhraseSearcher,
    analogy: &dyn PhraseSearcher,
    phrases: &[String],
    reps: usize,
) -> Result<Duration> {
    let mut sw = Stopwatch::start_new();
    for _ in 0..reps {
        for phrase in phrases {
            distance.search(phrase)?;
            analogy.search(phrase)?;
        }
    }
    sw.stop();
    Ok(sw.elapsed())
}

/// Run the timed batches and print one report per (outer, phrase) pair.
///
/// Each inner repetition times one distance+analogy pair inside a single
/// restart/stop window on the shared timer. The first failing query call
/// aborts the whole run.
pub fn run_steady_state<T: Timer>(
    timer: &mut T,
    resolution: Resolution,
    distance: &dyn PhraseSearcher,
    analogy: &dyn PhraseSearcher,
    phrases: &[String],
    opts: &BenchOptions,
) -> Result<Vec<BatchReport>> {
    let mut reports = Vec::with_capacity(opts.outer_batches * phrases.len());

    for outer in 0..opts.outer_batches {
        for phrase in phrases {
            let n = opts.inner_reps;
            let mut min_sample = u64::MAX;
            let mut max_sample = u64::MIN;
            let mut samples = Vec::with_capacity(n);

            println!("Batch {}, searching {}: running {} searches", outer, phrase, n);

            for _ in 0..n {
                timer.restart();
                distance.search(phrase)?;
                analogy.search(phrase)?;
                timer.stop();

                let interval = resolution.read(timer);
                samples.push(interval);
                min_sample = min_sample.min(interval);
                max_sample = max_sample.max(interval);
            }

            let stats = SteadyStateStats::reduce(&samples, min_sample, max_sample);
            stats.print(resolution);
            println!();

            reports.push(BatchReport {
                outer,
                phrase: phrase.clone(),
                stats,
            });
        }
    }

    Ok(reports)
}
