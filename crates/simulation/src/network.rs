//! Simulated peer-to-peer network state.
//!
//! [`Network`] owns every piece of per-run state (topology, known
//! bitmaps, transaction pool, in-flight set, publisher, and the global
//! counters) and exposes the four operations the experiment loop
//! interleaves: inject, broadcast, prepare, publish.

use crate::config::SimConfig;
use crate::known::KnownStore;
use crate::pool::TxPool;
use crate::propagation::{BroadcastStats, PropagationEngine};
use crate::publisher::{ProposedBlock, PublishOutcome, Publisher};
use gossipsim_types::{DelayModel, PeerId, Topology, TopologyError, Transaction, TxId};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

/// All mutable state of one simulated network.
#[derive(Debug)]
pub struct Network {
    config: SimConfig,
    topology: Topology,
    known: KnownStore,
    pool: TxPool,
    engine: PropagationEngine,
    publisher: Publisher,
    next_tx_id: u32,
    total_injected: u64,
    total_published: u64,
    total_published_kb: u64,
}

impl Network {
    /// Build a network from a configuration, drawing the topology and
    /// validator set from `rng`.
    pub fn new(config: SimConfig, rng: &mut ChaCha8Rng) -> Result<Self, TopologyError> {
        let delays = DelayModel {
            min_ms: config.delay_min_ms,
            max_ms: config.delay_max_ms,
            multiplier: config.delay_multiplier,
            ..DelayModel::default()
        };
        let mut topology = if config.full_mesh {
            Topology::full_mesh(config.num_peers, &delays, rng)?
        } else {
            Topology::random(
                config.num_peers,
                config.min_conn,
                config.max_conn,
                &delays,
                rng,
            )?
        };
        topology.select_validators(config.num_validators, rng);

        debug!(
            peers = config.num_peers,
            validators = topology.validators().len(),
            edges = topology.edge_count(),
            quorum = topology.quorum_threshold(),
            "network constructed"
        );

        let known = KnownStore::new(config.known_rows, config.known_cols, config.num_peers);
        Ok(Self {
            config,
            topology,
            known,
            pool: TxPool::new(),
            engine: PropagationEngine::new(),
            publisher: Publisher::new(),
            next_tx_id: 0,
            total_injected: 0,
            total_published: 0,
            total_published_kb: 0,
        })
    }

    /// Inject `count` transactions at uniformly chosen seed peers.
    ///
    /// Sizes are uniform in the configured range. Each transaction enters
    /// the pool, the origin's known bitmap, and the in-flight set with
    /// one attempt per origin neighbor. With zero seeds (every peer is a
    /// validator) nothing is mutated.
    pub fn inject_transactions(&mut self, count: u32, rng: &mut ChaCha8Rng) {
        if count == 0 {
            return;
        }
        let seeds = self.topology.seeds();
        if seeds.is_empty() {
            debug!("no seed peers; injection skipped");
            return;
        }

        for _ in 0..count {
            let size_kb = rng.gen_range(self.config.tx_size_min_kb..=self.config.tx_size_max_kb);
            let tx = Transaction::new(TxId(self.next_tx_id), size_kb);
            self.next_tx_id += 1;

            let origin = seeds[rng.gen_range(0..seeds.len())];
            self.pool.insert(tx);
            self.known.mark(origin, tx.id);
            self.engine.inject(tx, origin, &self.topology);
        }
        self.total_injected += count as u64;
        trace!(count, total_injected = self.total_injected, "injected transactions");
    }

    /// Advance propagation by one step.
    pub fn broadcast(&mut self, step_ms: u32, bandwidth_kb_per_ms: f64) -> BroadcastStats {
        self.engine
            .broadcast(step_ms, bandwidth_kb_per_ms, &self.topology, &mut self.known)
    }

    /// Prepare a block proposal under the configured caps.
    pub fn prepare_request(&mut self, rng: &mut ChaCha8Rng) {
        self.publisher.prepare_request(
            self.config.max_transactions,
            self.config.max_block_size_kb,
            &self.topology,
            &self.known,
            &self.pool,
            rng,
        );
    }

    /// Evaluate the publish quorum, updating the published counters on a
    /// normal or forced publish.
    pub fn publish_proposed(&mut self) -> PublishOutcome {
        let outcome = self.publisher.publish_proposed(
            self.config.publish_threshold_pct,
            self.config.blocktime_ms,
            self.config.simulation_step_ms,
            &self.topology,
            &mut self.known,
            &mut self.pool,
            &mut self.engine,
        );
        if let PublishOutcome::Published { count, size_kb }
        | PublishOutcome::Forced { count, size_kb } = outcome
        {
            self.total_published += count;
            self.total_published_kb += size_kb;
        }
        outcome
    }

    /// Reset all transaction state, leaving the topology and validator
    /// set in place. A cleared network behaves exactly like a freshly
    /// constructed one given the same configuration and seed.
    pub fn clear_transactions(&mut self) {
        self.next_tx_id = 0;
        self.total_injected = 0;
        self.total_published = 0;
        self.total_published_kb = 0;
        self.pool.clear();
        self.engine.clear();
        self.publisher.clear();
        self.known.clear_all();
        debug!("network transactions cleared");
    }

    /// Transactions injected but not yet published.
    pub fn pending_count(&self) -> u64 {
        self.total_injected - self.total_published
    }

    // ─── Accessors ───

    /// The network configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The topology.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The known/published bitmaps.
    pub fn known(&self) -> &KnownStore {
        &self.known
    }

    /// The transaction pool.
    pub fn pool(&self) -> &TxPool {
        &self.pool
    }

    /// The live proposal, if any.
    pub fn proposed_block(&self) -> Option<&ProposedBlock> {
        self.publisher.proposed()
    }

    /// Whether a proposal is live.
    pub fn has_proposed_block(&self) -> bool {
        self.publisher.has_proposal()
    }

    /// Accumulated failed-attempt time for the live proposal (ms).
    pub fn publish_attempt_ms(&self) -> u32 {
        self.publisher.attempt_counter_ms()
    }

    /// Per-validator coverage of the live proposal, in percent.
    pub fn coverage_summary(&self) -> Vec<(PeerId, f64)> {
        self.publisher.coverage_summary(&self.topology, &self.known)
    }

    /// Transactions still traversing the network.
    pub fn in_flight_count(&self) -> usize {
        self.engine.in_flight_count()
    }

    /// The in-flight set, for inspection.
    pub fn in_flight(&self) -> &[crate::propagation::InFlightTx] {
        self.engine.in_flight()
    }

    /// Total transactions injected this run.
    pub fn total_injected(&self) -> u64 {
        self.total_injected
    }

    /// Total transactions published this run.
    pub fn total_published(&self) -> u64 {
        self.total_published
    }

    /// Total kilobytes published this run.
    pub fn total_published_kb(&self) -> u64 {
        self.total_published_kb
    }
}
