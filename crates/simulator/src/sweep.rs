//! Parallel experiment sweep.
//!
//! Each experiment is an independent single-threaded simulation, so a
//! sweep parallelizes across experiments with rayon. Rows come back in
//! experiment order regardless of completion order.

use crate::report::ExperimentRow;
use gossipsim_simulation::{ConfigError, ExperimentRunner, RunStats, SimConfig};
use rayon::prelude::*;
use tracing::info;

/// Errors from sweep execution.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// An experiment configuration failed validation.
    #[error("experiment {experiment_id}: {source}")]
    Config {
        /// Position of the offending experiment.
        experiment_id: usize,
        /// The validation failure.
        #[source]
        source: ConfigError,
    },
}

/// Run every experiment and collect one row per experiment, in order.
///
/// Also returns each run's counters so callers can build detailed
/// reports.
pub fn run_sweep(
    experiments: Vec<SimConfig>,
) -> Result<Vec<(ExperimentRow, RunStats)>, SweepError> {
    let total = experiments.len();
    experiments
        .into_par_iter()
        .enumerate()
        .map(|(experiment_id, config)| {
            let mut runner = ExperimentRunner::new(config.clone())
                .map_err(|source| SweepError::Config {
                    experiment_id,
                    source,
                })?;
            let result = runner.run();
            info!(
                experiment_id,
                total,
                published = result.total_published_global,
                tps = format!("{:.2}", result.tps),
                "experiment finished"
            );
            Ok((
                ExperimentRow {
                    experiment_id,
                    config,
                    result,
                },
                runner.stats().clone(),
            ))
        })
        .collect()
}
