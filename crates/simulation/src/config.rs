//! Simulation configuration.

/// Configuration for one experiment.
///
/// Defaults follow the reference setup: a 30-peer sparse network with 7
/// validators, 1 s ticks, a 3 s blocktime, and a 1 MB/ms per-sender
/// bandwidth budget.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Total number of peers (validators + seeds).
    pub num_peers: u32,
    /// Connect every pair of peers instead of sampling a sparse graph.
    pub full_mesh: bool,
    /// Minimum target degree per peer (sparse mode only).
    pub min_conn: u32,
    /// Maximum degree per peer.
    pub max_conn: u32,
    /// Lower clamp on sampled edge delays (ms).
    pub delay_min_ms: u32,
    /// Upper clamp on sampled edge delays (ms).
    pub delay_max_ms: u32,
    /// Scale factor applied to clamped edge delays.
    pub delay_multiplier: u32,
    /// Number of validator peers.
    pub num_validators: u32,
    /// Smallest injected transaction size (kB).
    pub tx_size_min_kb: u16,
    /// Largest injected transaction size (kB).
    pub tx_size_max_kb: u16,
    /// Run length in simulated milliseconds (raw time, including forced
    /// publish penalties).
    pub total_simulation_ms: u64,
    /// Transactions injected per inner tick.
    pub injection_count: u32,
    /// Inner tick length in milliseconds.
    pub simulation_step_ms: u32,
    /// Coverage (%) a validator must have of the proposed block for its
    /// quorum vote to count.
    pub publish_threshold_pct: f64,
    /// Forced-publish horizon: once a proposal has been stuck for this
    /// long, it is published regardless of coverage.
    pub blocktime_ms: u32,
    /// Per-sender bandwidth budget in kB per simulated millisecond.
    pub bandwidth_kb_per_ms: f64,
    /// Cap on the number of transactions per proposed block.
    pub max_transactions: usize,
    /// Cap on the cumulative size of a proposed block (kB).
    pub max_block_size_kb: u64,
    /// Rows of the known/published bitmaps.
    pub known_rows: usize,
    /// Columns of the known/published bitmaps.
    pub known_cols: usize,
    /// Seed for the run's random generator.
    pub seed: u64,
    /// Raw simulated time charged per forced publish, as a multiple of
    /// `blocktime_ms`. A modeling choice, not a physical quantity.
    pub forced_penalty_factor: u32,
    /// Whether a forced publish resets the block cycle clock the way a
    /// normal publish does.
    pub reset_cycle_on_forced: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_peers: 30,
            full_mesh: false,
            min_conn: 3,
            max_conn: 12,
            delay_min_ms: 10,
            delay_max_ms: 500,
            delay_multiplier: 1,
            num_validators: 7,
            tx_size_min_kb: 1,
            tx_size_max_kb: 5,
            total_simulation_ms: 60_000,
            injection_count: 150_000,
            simulation_step_ms: 1000,
            publish_threshold_pct: 95.0,
            blocktime_ms: 3000,
            bandwidth_kb_per_ms: 1000.0,
            max_transactions: 500_000,
            max_block_size_kb: 1_000_000,
            known_rows: 1_000_000,
            known_cols: 20,
            seed: 42,
            forced_penalty_factor: 2,
            reset_cycle_on_forced: false,
        }
    }
}

impl SimConfig {
    /// Create a configuration with the given network size.
    pub fn new(num_peers: u32, num_validators: u32) -> Self {
        Self {
            num_peers,
            num_validators,
            ..Default::default()
        }
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Use a fully connected topology.
    pub fn with_full_mesh(mut self) -> Self {
        self.full_mesh = true;
        self
    }

    /// Set the degree bounds for sparse topologies.
    pub fn with_degree_bounds(mut self, min_conn: u32, max_conn: u32) -> Self {
        self.min_conn = min_conn;
        self.max_conn = max_conn;
        self
    }

    /// Set the edge-delay clamp range and multiplier.
    pub fn with_delays(mut self, min_ms: u32, max_ms: u32, multiplier: u32) -> Self {
        self.delay_min_ms = min_ms;
        self.delay_max_ms = max_ms;
        self.delay_multiplier = multiplier;
        self
    }

    /// Set the injected transaction size range in kilobytes.
    pub fn with_tx_sizes(mut self, min_kb: u16, max_kb: u16) -> Self {
        self.tx_size_min_kb = min_kb;
        self.tx_size_max_kb = max_kb;
        self
    }

    /// Set the run length in simulated milliseconds.
    pub fn with_total_simulation_ms(mut self, total_ms: u64) -> Self {
        self.total_simulation_ms = total_ms;
        self
    }

    /// Set the number of transactions injected per inner tick.
    pub fn with_injection_count(mut self, count: u32) -> Self {
        self.injection_count = count;
        self
    }

    /// Set the inner tick length in milliseconds.
    pub fn with_step_ms(mut self, step_ms: u32) -> Self {
        self.simulation_step_ms = step_ms;
        self
    }

    /// Set the publish coverage threshold in percent.
    pub fn with_publish_threshold(mut self, pct: f64) -> Self {
        self.publish_threshold_pct = pct;
        self
    }

    /// Set the forced-publish horizon in milliseconds.
    pub fn with_blocktime_ms(mut self, blocktime_ms: u32) -> Self {
        self.blocktime_ms = blocktime_ms;
        self
    }

    /// Set the per-sender bandwidth budget in kB/ms.
    pub fn with_bandwidth_kb_per_ms(mut self, bandwidth: f64) -> Self {
        self.bandwidth_kb_per_ms = bandwidth;
        self
    }

    /// Set the block caps: maximum transaction count and cumulative kB.
    pub fn with_block_caps(mut self, max_transactions: usize, max_block_size_kb: u64) -> Self {
        self.max_transactions = max_transactions;
        self.max_block_size_kb = max_block_size_kb;
        self
    }

    /// Set the known/published bitmap shape.
    pub fn with_known_shape(mut self, rows: usize, cols: usize) -> Self {
        self.known_rows = rows;
        self.known_cols = cols;
        self
    }

    /// Set the forced-publish penalty factor.
    pub fn with_forced_penalty_factor(mut self, factor: u32) -> Self {
        self.forced_penalty_factor = factor;
        self
    }

    /// Make forced publishes reset the block cycle clock.
    pub fn with_reset_cycle_on_forced(mut self) -> Self {
        self.reset_cycle_on_forced = true;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_peers == 0 {
            return Err(ConfigError::NoPeers);
        }
        if self.simulation_step_ms == 0 {
            return Err(ConfigError::ZeroStep);
        }
        if self.tx_size_min_kb > self.tx_size_max_kb {
            return Err(ConfigError::InvalidTxSizeRange {
                min: self.tx_size_min_kb,
                max: self.tx_size_max_kb,
            });
        }
        if self.known_rows == 0 || self.known_cols == 0 {
            return Err(ConfigError::EmptyKnownShape);
        }
        if self.min_conn > self.max_conn {
            return Err(ConfigError::InvalidDegreeBounds {
                min: self.min_conn,
                max: self.max_conn,
            });
        }
        if self.num_validators > self.num_peers {
            return Err(ConfigError::TooManyValidators {
                validators: self.num_validators,
                peers: self.num_peers,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The network needs at least one peer.
    #[error("num_peers must be nonzero")]
    NoPeers,

    /// The tick length must be positive.
    #[error("simulation_step_ms must be nonzero")]
    ZeroStep,

    /// The transaction size range is inverted.
    #[error("tx size range inverted: min {min} kB > max {max} kB")]
    InvalidTxSizeRange {
        /// Configured minimum size.
        min: u16,
        /// Configured maximum size.
        max: u16,
    },

    /// The bitmap shape has a zero dimension.
    #[error("known bitmap shape must have nonzero rows and cols")]
    EmptyKnownShape,

    /// Degree bounds are inverted.
    #[error("min_conn {min} exceeds max_conn {max}")]
    InvalidDegreeBounds {
        /// Configured minimum degree.
        min: u32,
        /// Configured maximum degree.
        max: u32,
    },

    /// More validators requested than peers exist.
    #[error("{validators} validators requested but only {peers} peers exist")]
    TooManyValidators {
        /// Requested validator count.
        validators: u32,
        /// Total peer count.
        peers: u32,
    },
}
