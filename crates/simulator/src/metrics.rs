//! Per-experiment reporting.
//!
//! Builds a human-readable report from an experiment's result record and
//! run counters: publish-interval quantiles, pending depth, and the
//! normal/forced publish split.

use gossipsim_simulation::{ExperimentResult, ProgressSample, RunStats};
use hdrhistogram::Histogram;

/// Detailed report for one experiment.
pub struct ExperimentReport {
    /// The result record.
    pub result: ExperimentResult,
    /// Normal (quorum) publishes.
    pub normal_publish_count: u64,
    /// Largest pending depth observed at a sample point.
    pub peak_pending: u64,
    /// Throttled progress samples from the run.
    pub samples: Vec<ProgressSample>,
    /// Official-time gaps between successive publishes (ms).
    interval_histogram: Histogram<u64>,
}

impl ExperimentReport {
    /// Assemble a report from a finished run.
    pub fn from_run(result: ExperimentResult, stats: &RunStats) -> Self {
        let mut interval_histogram =
            Histogram::new(3).expect("histogram creation should succeed");
        for interval in &stats.publish_intervals_ms {
            // Zero-length intervals (back-to-back forced publishes) are
            // clamped to the histogram's smallest trackable value.
            let _ = interval_histogram.record((*interval).max(1));
        }
        Self {
            result,
            normal_publish_count: stats.normal_publish_count,
            peak_pending: stats.peak_pending,
            samples: stats.samples.clone(),
            interval_histogram,
        }
    }

    /// Median publish interval in official milliseconds.
    pub fn p50_publish_interval_ms(&self) -> u64 {
        self.interval_histogram.value_at_quantile(0.50)
    }

    /// P90 publish interval in official milliseconds.
    pub fn p90_publish_interval_ms(&self) -> u64 {
        self.interval_histogram.value_at_quantile(0.90)
    }

    /// P99 publish interval in official milliseconds.
    pub fn p99_publish_interval_ms(&self) -> u64 {
        self.interval_histogram.value_at_quantile(0.99)
    }

    /// Largest publish interval in official milliseconds.
    pub fn max_publish_interval_ms(&self) -> u64 {
        self.interval_histogram.max()
    }

    /// Number of publishes (normal plus forced).
    pub fn publish_count(&self) -> u64 {
        self.interval_histogram.len()
    }

    /// Fraction of publishes that were forced.
    pub fn forced_ratio(&self) -> f64 {
        let total = self.publish_count();
        if total > 0 {
            self.result.forced_publish_count as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Print a summary of the report.
    pub fn print_summary(&self) {
        println!("\n═══════════════════════════════════════════");
        println!("           EXPERIMENT REPORT                ");
        println!("═══════════════════════════════════════════");
        println!();
        println!("Throughput:");
        println!("  Published:  {} txs", self.result.total_published_global);
        println!("  TPS:        {:.2}", self.result.tps);
        println!("  Published:  {:.2} MB", self.result.published_mb);
        println!("  MB/sec:     {:.2}", self.result.mb_per_sec);
        println!();
        println!("Publishing:");
        println!("  Normal:     {}", self.normal_publish_count);
        println!("  Forced:     {}", self.result.forced_publish_count);
        println!("  Forced %:   {:.1}", self.forced_ratio() * 100.0);
        println!();
        println!("Publish interval (official time):");
        println!("  P50:  {} ms", self.p50_publish_interval_ms());
        println!("  P90:  {} ms", self.p90_publish_interval_ms());
        println!("  P99:  {} ms", self.p99_publish_interval_ms());
        println!("  Max:  {} ms", self.max_publish_interval_ms());
        println!();
        println!("Pending:");
        println!("  Final: {}", self.result.final_pending_count);
        println!("  Peak:  {}", self.peak_pending);
        println!();
        println!(
            "Simulated time: {} ms",
            self.result.total_simulated_time_ms
        );
        println!("═══════════════════════════════════════════\n");
    }
}
