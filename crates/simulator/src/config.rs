//! Sweep configuration.

use gossipsim_simulation::SimConfig;
use std::path::PathBuf;

/// A list of experiments to run plus the result file they write to.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Experiments, in result-row order.
    pub experiments: Vec<SimConfig>,
    /// Path of the CSV result file.
    pub output_path: PathBuf,
}

impl SweepConfig {
    /// Sweep with a single experiment.
    pub fn single(config: SimConfig, output_path: impl Into<PathBuf>) -> Self {
        Self {
            experiments: vec![config],
            output_path: output_path.into(),
        }
    }

    /// Sweep over an explicit experiment list.
    pub fn new(experiments: Vec<SimConfig>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            experiments,
            output_path: output_path.into(),
        }
    }
}

/// Repeat a base configuration `runs` times with consecutive seeds.
pub fn seed_variations(base: SimConfig, runs: u32) -> Vec<SimConfig> {
    (0..runs)
        .map(|i| base.clone().with_seed(base.seed.wrapping_add(i as u64)))
        .collect()
}
