//! Process resource tracking around the training phase.
//!
//! Tracks baseline, model-delta, and sampled-peak process memory plus
//! word throughput for the one blocking training call. The query loop is
//! never sampled; its cost model is wall-clock only.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Sampling interval for peak memory tracking
const SAMPLE_INTERVAL_MS: u64 = 50;

/// Monitor for the resources consumed by one training run
pub struct TrainingMonitor {
    system: System,
    pid: Pid,
    baseline_memory_mb: f64,
    peak_memory_mb: Arc<AtomicU64>,
    sampling_active: Arc<AtomicBool>,
}

impl TrainingMonitor {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();

        let pid = Pid::from_u32(std::process::id());

        Self {
            system,
            pid,
            baseline_memory_mb: 0.0,
            peak_memory_mb: Arc::new(AtomicU64::new(0)),
            sampling_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current process memory in MB (RSS)
    fn process_memory_mb(&mut self) -> f64 {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        if let Some(process) = self.system.process(self.pid) {
            process.memory() as f64 / (1024.0 * 1024.0)
        } else {
            0.0
        }
    }

    /// Snapshot baseline memory before training starts
    pub fn snapshot_baseline(&mut self) {
        self.baseline_memory_mb = self.process_memory_mb();
        self.peak_memory_mb
            .store(self.baseline_memory_mb.to_bits(), Ordering::SeqCst);
        tracing::debug!("Baseline memory: {:.1} MB", self.baseline_memory_mb);
    }

    fn update_peak(&self, current_mb: f64) {
        update_peak_cell(&self.peak_memory_mb, current_mb);
    }

    /// Start background memory sampling for the duration of training.
    ///
    /// Returns a handle that must be kept alive while training runs.
    pub fn start_sampling(&self) -> SamplingHandle {
        self.sampling_active.store(true, Ordering::SeqCst);

        let peak_memory = Arc::clone(&self.peak_memory_mb);
        let sampling_active = Arc::clone(&self.sampling_active);
        let pid = self.pid;

        let handle = std::thread::spawn(move || {
            let mut system = System::new();

            while sampling_active.load(Ordering::SeqCst) {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                if let Some(process) = system.process(pid) {
                    let current_mb = process.memory() as f64 / (1024.0 * 1024.0);
                    update_peak_cell(&peak_memory, current_mb);
                }

                std::thread::sleep(Duration::from_millis(SAMPLE_INTERVAL_MS));
            }
        });

        SamplingHandle {
            sampling_active: Arc::clone(&self.sampling_active),
            _thread: Some(handle),
        }
    }

    /// Finalize metrics after the training call returns
    pub fn finalize(mut self, train_duration: Duration, words_trained: u64) -> TrainingResources {
        self.sampling_active.store(false, Ordering::SeqCst);

        let final_memory = self.process_memory_mb();
        self.update_peak(final_memory);

        let peak_mb = f64::from_bits(self.peak_memory_mb.load(Ordering::SeqCst));
        let train_secs = train_duration.as_secs_f64();
        let words_per_sec = if train_secs > 0.0 {
            words_trained as f64 / train_secs
        } else {
            0.0
        };

        TrainingResources {
            baseline_memory_mb: self.baseline_memory_mb,
            model_memory_mb: final_memory - self.baseline_memory_mb,
            peak_memory_mb: peak_mb,
            train_time_secs: train_secs,
            words_per_sec,
        }
    }
}

impl Default for TrainingMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-free max update on an f64 stored as bits.
fn update_peak_cell(peak: &AtomicU64, current_mb: f64) {
    let current_bits = current_mb.to_bits();
    loop {
        let peak_bits = peak.load(Ordering::SeqCst);
        let peak_mb = f64::from_bits(peak_bits);
        if current_mb <= peak_mb {
            break;
        }
        if peak
            .compare_exchange(peak_bits, current_bits, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
}

/// Resource summary for one training run
#[derive(Debug, Clone)]
pub struct TrainingResources {
    pub baseline_memory_mb: f64,
    pub model_memory_mb: f64,
    pub peak_memory_mb: f64,
    pub train_time_secs: f64,
    pub words_per_sec: f64,
}

impl TrainingResources {
    /// Format a summary line for display
    pub fn format_summary(&self) -> String {
        format!(
            "Train: {:.1}s | Throughput: {:.0} words/s | Peak RAM: {:.0}MB (model: {:.0}MB)",
            self.train_time_secs, self.words_per_sec, self.peak_memory_mb, self.model_memory_mb
        )
    }
}

/// Handle for background memory sampling
///
/// Sampling continues while this handle is held. Drop to stop sampling.
pub struct SamplingHandle {
    sampling_active: Arc<AtomicBool>,
    _thread: Option<std::thread::JoinHandle<()>>,
}

impl Drop for SamplingHandle {
    fn drop(&mut self) {
        self.sampling_active.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_basic() {
        let mut monitor = TrainingMonitor::new();
        monitor.snapshot_baseline();
        assert!(monitor.baseline_memory_mb > 0.0);

        let handle = monitor.start_sampling();
        std::thread::sleep(Duration::from_millis(120));
        drop(handle);

        let resources = monitor.finalize(Duration::from_secs(2), 1000);
        assert!(resources.baseline_memory_mb > 0.0);
        assert!(resources.peak_memory_mb >= resources.baseline_memory_mb);
        assert_eq!(resources.words_per_sec, 500.0);
    }

    #[test]
    fn test_peak_cell_only_rises() {
        let cell = AtomicU64::new(10.0f64.to_bits());
        update_peak_cell(&cell, 5.0);
        assert_eq!(f64::from_bits(cell.load(Ordering::SeqCst)), 10.0);
        update_peak_cell(&cell, 25.0);
        assert_eq!(f64::from_bits(cell.load(Ordering::SeqCst)), 25.0);
    }
}
