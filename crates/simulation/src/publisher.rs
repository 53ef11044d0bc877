//! Quorum-based block publisher.
//!
//! A proposer validator assembles a block from the pending transactions
//! it knows, capped by count and cumulative size. The block publishes
//! once enough validators each cover a threshold fraction of it; a
//! watchdog forces publication after `blocktime_ms` of failed attempts
//! so a bandwidth-starved network can never wedge a proposal forever.

use crate::known::KnownStore;
use crate::pool::TxPool;
use crate::propagation::PropagationEngine;
use gossipsim_types::{PeerId, Topology, Transaction, TxId};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// A block proposal: an ordered transaction list and its cumulative size.
#[derive(Debug, Clone, Default)]
pub struct ProposedBlock {
    /// Selected transactions, in selection order.
    pub transactions: Vec<Transaction>,
    /// Cumulative size of the selection in kilobytes.
    pub size_kb: u64,
}

impl ProposedBlock {
    /// Number of transactions in the proposal.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the proposal holds no transactions.
    ///
    /// An empty proposal is still live: it ages toward a forced publish
    /// like any other, it just clears nothing when it goes.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Result of one publish evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Quorum was met; the block left the pending world.
    Published {
        /// Transactions published.
        count: u64,
        /// Kilobytes published.
        size_kb: u64,
    },
    /// The watchdog fired; the block was published without quorum.
    Forced {
        /// Transactions published.
        count: u64,
        /// Kilobytes published.
        size_kb: u64,
    },
    /// Quorum not met and the watchdog has not fired; state unchanged
    /// apart from the attempt counter.
    QuorumNotMet {
        /// Validators whose coverage met the threshold.
        met: usize,
    },
    /// No live proposal; nothing to do.
    NoProposal,
}

/// Owns the live proposal and the publish-attempt watchdog, and drives
/// all removals from the pool and the in-flight set at publish time.
#[derive(Debug, Default)]
pub struct Publisher {
    proposed: Option<ProposedBlock>,
    attempt_counter_ms: u32,
}

impl Publisher {
    /// Create a publisher with no live proposal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a proposal is live.
    pub fn has_proposal(&self) -> bool {
        self.proposed.is_some()
    }

    /// The live proposal, if any.
    pub fn proposed(&self) -> Option<&ProposedBlock> {
        self.proposed.as_ref()
    }

    /// Accumulated failed-attempt time for the live proposal (ms).
    pub fn attempt_counter_ms(&self) -> u32 {
        self.attempt_counter_ms
    }

    /// Build a new proposal from the pending transactions a randomly
    /// chosen validator knows.
    ///
    /// Candidates are shuffled, then added greedily until adding the next
    /// transaction would exceed either cap. With zero validators this
    /// returns without mutating anything.
    pub fn prepare_request(
        &mut self,
        max_transactions: usize,
        max_block_size_kb: u64,
        topology: &Topology,
        known: &KnownStore,
        pool: &TxPool,
        rng: &mut ChaCha8Rng,
    ) {
        let validators = topology.validators();
        if validators.is_empty() {
            debug!("no validators available; proposal not prepared");
            return;
        }
        let proposer = validators[rng.gen_range(0..validators.len())];

        let mut candidates: Vec<Transaction> = pool
            .pending_ids()
            .filter(|id| known.knows(proposer, *id) && !known.is_published(*id))
            .filter_map(|id| pool.get(id).copied())
            .collect();
        candidates.shuffle(rng);

        let mut selected = Vec::new();
        let mut size_kb = 0u64;
        for tx in candidates {
            if selected.len() >= max_transactions {
                break;
            }
            if size_kb + tx.size_kb as u64 > max_block_size_kb {
                break;
            }
            size_kb += tx.size_kb as u64;
            selected.push(tx);
        }

        debug!(
            %proposer,
            transactions = selected.len(),
            size_kb,
            "prepared block proposal"
        );
        self.proposed = Some(ProposedBlock {
            transactions: selected,
            size_kb,
        });
    }

    /// Per-validator coverage of the live proposal, in percent, together
    /// with each validator's id. Empty when no proposal is live.
    ///
    /// An empty proposal counts as 0 % coverage for everyone.
    pub fn coverage_summary(&self, topology: &Topology, known: &KnownStore) -> Vec<(PeerId, f64)> {
        let Some(block) = &self.proposed else {
            return Vec::new();
        };
        topology
            .validators()
            .iter()
            .map(|v| (*v, Self::coverage_pct(block, *v, known)))
            .collect()
    }

    fn coverage_pct(block: &ProposedBlock, validator: PeerId, known: &KnownStore) -> f64 {
        if block.is_empty() {
            return 0.0;
        }
        let count = block
            .transactions
            .iter()
            .filter(|tx| known.knows(validator, tx.id))
            .count();
        count as f64 * 100.0 / block.len() as f64
    }

    /// Evaluate the quorum and publish, retry, or force.
    ///
    /// On a normal or forced publish every block transaction is marked
    /// globally published and removed from the pool and the in-flight
    /// set atomically. On a failed attempt only the watchdog counter
    /// moves, by `step_ms`.
    pub fn publish_proposed(
        &mut self,
        threshold_pct: f64,
        blocktime_ms: u32,
        step_ms: u32,
        topology: &Topology,
        known: &mut KnownStore,
        pool: &mut TxPool,
        engine: &mut PropagationEngine,
    ) -> PublishOutcome {
        let Some(block) = &self.proposed else {
            return PublishOutcome::NoProposal;
        };

        let coverages = self.coverage_summary(topology, known);
        let met = coverages
            .iter()
            .filter(|(_, pct)| *pct >= threshold_pct)
            .count();
        if !coverages.is_empty() {
            let average =
                coverages.iter().map(|(_, pct)| pct).sum::<f64>() / coverages.len() as f64;
            trace!(
                met,
                required = topology.quorum_threshold(),
                average_coverage_pct = format!("{:.2}", average),
                block_len = block.len(),
                "publish evaluation"
            );
        }

        if met >= topology.quorum_threshold() {
            self.attempt_counter_ms = 0;
            let block = self.proposed.take().expect("proposal checked above");
            let (count, size_kb) = Self::commit(&block, known, pool, engine);
            debug!(count, size_kb, "published block");
            return PublishOutcome::Published { count, size_kb };
        }

        self.attempt_counter_ms += step_ms;
        if self.attempt_counter_ms >= blocktime_ms {
            self.attempt_counter_ms = 0;
            let block = self.proposed.take().expect("proposal checked above");
            let (count, size_kb) = Self::commit(&block, known, pool, engine);
            debug!(count, size_kb, met, "forced publish");
            return PublishOutcome::Forced { count, size_kb };
        }

        PublishOutcome::QuorumNotMet { met }
    }

    /// Mark every block transaction published and remove it from the
    /// pending world.
    fn commit(
        block: &ProposedBlock,
        known: &mut KnownStore,
        pool: &mut TxPool,
        engine: &mut PropagationEngine,
    ) -> (u64, u64) {
        let ids: BTreeSet<TxId> = block.transactions.iter().map(|tx| tx.id).collect();
        for id in &ids {
            known.mark_published(*id);
            pool.remove(*id);
        }
        engine.remove_published(&ids);
        (block.transactions.len() as u64, block.size_kb)
    }

    /// Drop the live proposal and reset the watchdog.
    pub fn clear(&mut self) {
        self.proposed = None;
        self.attempt_counter_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossipsim_types::DelayModel;
    use rand::SeedableRng;

    struct Fixture {
        topology: Topology,
        known: KnownStore,
        pool: TxPool,
        engine: PropagationEngine,
        publisher: Publisher,
        rng: ChaCha8Rng,
    }

    /// Full mesh with one validator; every injected tx known to everyone.
    fn fixture(num_peers: u32, num_validators: u32) -> Fixture {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let delays = DelayModel {
            mean_ms: 10.0,
            stddev_ms: 0.0,
            min_ms: 10,
            max_ms: 10,
            multiplier: 1,
        };
        let mut topology = Topology::full_mesh(num_peers, &delays, &mut rng).unwrap();
        topology.select_validators(num_validators, &mut rng);
        Fixture {
            topology,
            known: KnownStore::new(1000, 20, num_peers),
            pool: TxPool::new(),
            engine: PropagationEngine::new(),
            publisher: Publisher::new(),
            rng,
        }
    }

    fn seed_tx(f: &mut Fixture, id: u32, size_kb: u16, known_to_all: bool) {
        let tx = Transaction::new(TxId(id), size_kb);
        f.pool.insert(tx);
        if known_to_all {
            for p in 1..=f.topology.num_peers() {
                f.known.mark(PeerId(p), tx.id);
            }
        }
    }

    #[test]
    fn test_no_proposal_is_noop() {
        let mut f = fixture(4, 1);
        let outcome = f.publisher.publish_proposed(
            100.0,
            100,
            20,
            &f.topology,
            &mut f.known,
            &mut f.pool,
            &mut f.engine,
        );
        assert_eq!(outcome, PublishOutcome::NoProposal);
        assert_eq!(f.publisher.attempt_counter_ms(), 0);
    }

    #[test]
    fn test_publish_with_full_coverage() {
        let mut f = fixture(4, 1);
        for id in 0..5 {
            seed_tx(&mut f, id, 2, true);
        }
        f.publisher
            .prepare_request(100, 1000, &f.topology, &f.known, &f.pool, &mut f.rng);
        assert_eq!(f.publisher.proposed().unwrap().len(), 5);

        let outcome = f.publisher.publish_proposed(
            100.0,
            100,
            20,
            &f.topology,
            &mut f.known,
            &mut f.pool,
            &mut f.engine,
        );
        assert_eq!(
            outcome,
            PublishOutcome::Published {
                count: 5,
                size_kb: 10
            }
        );
        assert_eq!(f.pool.pending_count(), 0);
        assert!(f.known.is_published(TxId(0)));
        assert!(!f.publisher.has_proposal());
    }

    #[test]
    fn test_block_caps() {
        let mut f = fixture(4, 1);
        // 100 pending transactions of 1..=2 kB, all known to the proposer.
        for id in 0..100 {
            seed_tx(&mut f, id, 1 + (id % 2) as u16, true);
        }
        f.publisher
            .prepare_request(500_000, 3, &f.topology, &f.known, &f.pool, &mut f.rng);

        let block = f.publisher.proposed().unwrap();
        assert!(block.size_kb <= 3);
        assert!(block.len() <= 3);
        assert!(!block.is_empty());
    }

    #[test]
    fn test_count_cap() {
        let mut f = fixture(4, 1);
        for id in 0..50 {
            seed_tx(&mut f, id, 1, true);
        }
        f.publisher
            .prepare_request(10, 1_000_000, &f.topology, &f.known, &f.pool, &mut f.rng);
        assert_eq!(f.publisher.proposed().unwrap().len(), 10);
    }

    #[test]
    fn test_quorum_not_met_advances_watchdog_only() {
        let mut f = fixture(4, 1);
        // Known only to the origin seed: the proposer knows nothing, so
        // the proposal is empty and ages with zero coverage.
        seed_tx(&mut f, 0, 1, false);
        f.known.mark(f.topology.seeds()[0], TxId(0));
        f.publisher
            .prepare_request(100, 1000, &f.topology, &f.known, &f.pool, &mut f.rng);
        assert!(f.publisher.proposed().unwrap().is_empty());

        let outcome = f.publisher.publish_proposed(
            100.0,
            200,
            50,
            &f.topology,
            &mut f.known,
            &mut f.pool,
            &mut f.engine,
        );
        assert_eq!(outcome, PublishOutcome::QuorumNotMet { met: 0 });
        assert_eq!(f.publisher.attempt_counter_ms(), 50);
        assert_eq!(f.pool.pending_count(), 1);
    }

    #[test]
    fn test_forced_publish_after_watchdog() {
        let mut f = fixture(4, 1);
        seed_tx(&mut f, 0, 1, false);
        f.known.mark(f.topology.seeds()[0], TxId(0));
        f.publisher
            .prepare_request(100, 1000, &f.topology, &f.known, &f.pool, &mut f.rng);

        // Four failed attempts at 50 ms reach the 200 ms horizon.
        for _ in 0..3 {
            let outcome = f.publisher.publish_proposed(
                100.0,
                200,
                50,
                &f.topology,
                &mut f.known,
                &mut f.pool,
                &mut f.engine,
            );
            assert!(matches!(outcome, PublishOutcome::QuorumNotMet { .. }));
        }
        let outcome = f.publisher.publish_proposed(
            100.0,
            200,
            50,
            &f.topology,
            &mut f.known,
            &mut f.pool,
            &mut f.engine,
        );
        // The empty block clears without touching the pool.
        assert_eq!(
            outcome,
            PublishOutcome::Forced {
                count: 0,
                size_kb: 0
            }
        );
        assert_eq!(f.publisher.attempt_counter_ms(), 0);
        assert!(!f.publisher.has_proposal());
        assert_eq!(f.pool.pending_count(), 1);
    }

    #[test]
    fn test_republish_prevention() {
        let mut f = fixture(4, 1);
        for id in 0..3 {
            seed_tx(&mut f, id, 1, true);
        }
        f.publisher
            .prepare_request(100, 1000, &f.topology, &f.known, &f.pool, &mut f.rng);
        f.publisher.publish_proposed(
            100.0,
            100,
            20,
            &f.topology,
            &mut f.known,
            &mut f.pool,
            &mut f.engine,
        );

        // Re-inject a pending tx with every knows-bit still set for the
        // published ids; none of them may be proposed again.
        seed_tx(&mut f, 3, 1, true);
        f.publisher
            .prepare_request(100, 1000, &f.topology, &f.known, &f.pool, &mut f.rng);
        let block = f.publisher.proposed().unwrap();
        assert_eq!(block.len(), 1);
        assert_eq!(block.transactions[0].id, TxId(3));
    }

    #[test]
    fn test_zero_validators_prepare_is_noop() {
        let mut f = fixture(4, 0);
        seed_tx(&mut f, 0, 1, true);
        f.publisher
            .prepare_request(100, 1000, &f.topology, &f.known, &f.pool, &mut f.rng);
        assert!(!f.publisher.has_proposal());
    }
}
