//! Experiment driver.
//!
//! Runs the outer simulation loop with dual time accounting:
//! `sim_time_ms` is the raw clock every phase advances, including the
//! penalty charged by forced publishes; `official_time_ms` excludes
//! those penalties and is the denominator for throughput. Given the same
//! configuration and seed, a run produces identical results every time.

use crate::config::{ConfigError, SimConfig};
use crate::network::Network;
use crate::publisher::PublishOutcome;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

/// How often progress is logged and sampled, in simulated milliseconds.
const PROGRESS_INTERVAL_MS: u64 = 5000;

/// Final result of one experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentResult {
    /// Raw simulated time consumed, penalties included.
    pub total_simulated_time_ms: i64,
    /// Transactions published, normally or forcibly.
    pub total_published_global: i64,
    /// Published transactions per raw simulated second.
    pub tps: f64,
    /// Megabytes published.
    pub published_mb: f64,
    /// Megabytes published per raw simulated second.
    pub mb_per_sec: f64,
    /// Number of forced publishes.
    pub forced_publish_count: i64,
    /// Transactions still pending at the end of the run.
    pub final_pending_count: i64,
}

/// A throttled point-in-time sample of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// Raw simulated time at this sample.
    pub sim_time_ms: u64,
    /// Official simulated time at this sample.
    pub official_time_ms: u64,
    /// Pending transactions.
    pub pending: u64,
    /// Cumulative published transactions.
    pub published: u64,
    /// Cumulative forced publishes.
    pub forced: u64,
}

/// Counters collected while a run executes, for reporting.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Official-time gaps between successive publishes (normal or
    /// forced).
    pub publish_intervals_ms: Vec<u64>,
    /// Number of normal (quorum) publishes.
    pub normal_publish_count: u64,
    /// Largest pending depth observed at a sample point.
    pub peak_pending: u64,
    /// Throttled progress samples.
    pub samples: Vec<ProgressSample>,
}

/// Drives one experiment over a [`Network`].
#[derive(Debug)]
pub struct ExperimentRunner {
    config: SimConfig,
    network: Network,
    rng: ChaCha8Rng,
    sim_time_ms: u64,
    official_time_ms: u64,
    block_cycle_ms: u64,
    forced_count: u64,
    stats: RunStats,
    last_publish_official_ms: u64,
    last_progress_ms: u64,
}

impl ExperimentRunner {
    /// Validate the configuration and build the network.
    ///
    /// Topology construction draws from a generator seeded with
    /// `config.seed`; run-time draws (injection, proposer selection,
    /// shuffling) use an independent generator seeded with
    /// `config.seed + 1` so a cleared network can replay a run without
    /// rebuilding the topology.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut setup_rng = ChaCha8Rng::seed_from_u64(config.seed);
        let network = Network::new(config.clone(), &mut setup_rng)
            .expect("validated configuration must yield a topology");
        let rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1));
        Ok(Self {
            config,
            network,
            rng,
            sim_time_ms: 0,
            official_time_ms: 0,
            block_cycle_ms: 0,
            forced_count: 0,
            stats: RunStats::default(),
            last_publish_official_ms: 0,
            last_progress_ms: 0,
        })
    }

    /// Run the experiment to completion and return its result record.
    pub fn run(&mut self) -> ExperimentResult {
        let total_ms = self.config.total_simulation_ms;
        let blocktime = self.config.blocktime_ms as u64;
        let step_ms = self.config.simulation_step_ms as u64;
        let bandwidth = self.config.bandwidth_kb_per_ms;

        info!(
            peers = self.config.num_peers,
            validators = self.config.num_validators,
            total_ms,
            blocktime_ms = blocktime,
            injection_count = self.config.injection_count,
            seed = self.config.seed,
            "experiment starting"
        );

        while self.sim_time_ms < total_ms {
            // Block cycle: inject and propagate until the current
            // proposal's horizon is reached. Failed publish attempts
            // extend the horizon by the time they have accumulated.
            loop {
                let horizon = blocktime + self.network.publish_attempt_ms() as u64;
                if self.block_cycle_ms >= horizon || self.sim_time_ms >= total_ms {
                    break;
                }
                let step = step_ms.min(horizon - self.block_cycle_ms) as u32;
                self.network
                    .inject_transactions(self.config.injection_count, &mut self.rng);
                self.network.broadcast(step, bandwidth);
                self.block_cycle_ms += step as u64;
                self.sim_time_ms += step as u64;
                self.official_time_ms += step as u64;
                self.maybe_log_progress();
            }

            if !self.network.has_proposed_block() {
                self.network.prepare_request(&mut self.rng);
            }

            match self.network.publish_proposed() {
                PublishOutcome::Published { count, size_kb } => {
                    self.stats.normal_publish_count += 1;
                    self.record_publish_interval();
                    self.block_cycle_ms = 0;
                    debug!(
                        count,
                        size_kb,
                        sim_time_ms = self.sim_time_ms,
                        "block published"
                    );
                }
                PublishOutcome::Forced { count, size_kb } => {
                    let penalty =
                        self.config.forced_penalty_factor as u64 * blocktime;
                    self.sim_time_ms += penalty;
                    self.forced_count += 1;
                    self.record_publish_interval();
                    if self.config.reset_cycle_on_forced {
                        self.block_cycle_ms = 0;
                    }
                    debug!(
                        count,
                        size_kb,
                        penalty_ms = penalty,
                        sim_time_ms = self.sim_time_ms,
                        "forced publish"
                    );
                }
                PublishOutcome::QuorumNotMet { met } => {
                    debug!(
                        met,
                        attempt_ms = self.network.publish_attempt_ms(),
                        "publish attempt failed"
                    );
                }
                PublishOutcome::NoProposal => {
                    // Nothing could be proposed (no validators). Restart
                    // the cycle so simulated time keeps advancing toward
                    // the run's end instead of spinning on the horizon.
                    self.block_cycle_ms = 0;
                }
            }
        }

        let result = self.result();
        info!(
            published = result.total_published_global,
            tps = format!("{:.2}", result.tps),
            mb_per_sec = format!("{:.2}", result.mb_per_sec),
            forced = result.forced_publish_count,
            pending = result.final_pending_count,
            "experiment complete"
        );
        result
    }

    /// Assemble the result record from the current counters.
    fn result(&self) -> ExperimentResult {
        let seconds = self.sim_time_ms as f64 / 1000.0;
        let published = self.network.total_published();
        let published_mb = self.network.total_published_kb() as f64 / 1024.0;
        let (tps, mb_per_sec) = if seconds > 0.0 {
            (published as f64 / seconds, published_mb / seconds)
        } else {
            (0.0, 0.0)
        };
        ExperimentResult {
            total_simulated_time_ms: self.sim_time_ms as i64,
            total_published_global: published as i64,
            tps,
            published_mb,
            mb_per_sec,
            forced_publish_count: self.forced_count as i64,
            final_pending_count: self.network.pending_count() as i64,
        }
    }

    fn record_publish_interval(&mut self) {
        let interval = self.official_time_ms - self.last_publish_official_ms;
        self.stats.publish_intervals_ms.push(interval);
        self.last_publish_official_ms = self.official_time_ms;
    }

    fn maybe_log_progress(&mut self) {
        if self.sim_time_ms - self.last_progress_ms < PROGRESS_INTERVAL_MS {
            return;
        }
        self.last_progress_ms = self.sim_time_ms;

        let pending = self.network.pending_count();
        self.stats.peak_pending = self.stats.peak_pending.max(pending);
        self.stats.samples.push(ProgressSample {
            sim_time_ms: self.sim_time_ms,
            official_time_ms: self.official_time_ms,
            pending,
            published: self.network.total_published(),
            forced: self.forced_count,
        });

        let seconds = self.sim_time_ms as f64 / 1000.0;
        let published = self.network.total_published();
        let tps = if seconds > 0.0 {
            published as f64 / seconds
        } else {
            0.0
        };
        info!(
            sim_secs = format!("{:.1}", seconds),
            published,
            tps = format!("{:.0}", tps),
            pending,
            published_mb = format!("{:.2}", self.network.total_published_kb() as f64 / 1024.0),
            forced = self.forced_count,
            "progress"
        );
    }

    /// Reset the runner to its initial state: transactions cleared, the
    /// run-time generator re-seeded, all clocks zeroed. The topology is
    /// kept, so a reset run replays a fresh run exactly.
    pub fn reset(&mut self) {
        self.network.clear_transactions();
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(1));
        self.sim_time_ms = 0;
        self.official_time_ms = 0;
        self.block_cycle_ms = 0;
        self.forced_count = 0;
        self.stats = RunStats::default();
        self.last_publish_official_ms = 0;
        self.last_progress_ms = 0;
    }

    // ─── Accessors ───

    /// Raw simulated time consumed so far (penalties included).
    pub fn sim_time_ms(&self) -> u64 {
        self.sim_time_ms
    }

    /// Official simulated time (penalties excluded).
    pub fn official_time_ms(&self) -> u64 {
        self.official_time_ms
    }

    /// Time into the current block cycle.
    pub fn block_cycle_ms(&self) -> u64 {
        self.block_cycle_ms
    }

    /// Forced publishes so far.
    pub fn forced_publish_count(&self) -> u64 {
        self.forced_count
    }

    /// The underlying network.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Counters collected during the run.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// The configuration this runner was built from.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke_run() {
        let config = SimConfig::new(6, 2)
            .with_full_mesh()
            .with_delays(10, 10, 1)
            .with_tx_sizes(1, 2)
            .with_injection_count(5)
            .with_step_ms(100)
            .with_blocktime_ms(500)
            .with_total_simulation_ms(3000)
            .with_bandwidth_kb_per_ms(100.0)
            .with_known_shape(10_000, 20)
            .with_seed(3);

        let mut runner = ExperimentRunner::new(config).unwrap();
        let result = runner.run();

        assert!(result.total_simulated_time_ms >= 3000);
        assert_eq!(
            result.final_pending_count,
            runner.network().total_injected() as i64 - result.total_published_global
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SimConfig::default();
        config.simulation_step_ms = 0;
        assert!(ExperimentRunner::new(config).is_err());
    }

    #[test]
    fn test_zero_validators_still_terminates() {
        let config = SimConfig::new(4, 0)
            .with_full_mesh()
            .with_delays(10, 10, 1)
            .with_injection_count(1)
            .with_step_ms(100)
            .with_blocktime_ms(200)
            .with_total_simulation_ms(500)
            .with_known_shape(1000, 20)
            .with_seed(8);

        let mut runner = ExperimentRunner::new(config).unwrap();
        let result = runner.run();

        // Nothing can ever publish, but the run must still end.
        assert_eq!(result.total_published_global, 0);
        assert_eq!(result.forced_publish_count, 0);
        assert!(result.total_simulated_time_ms >= 500);
    }
}
