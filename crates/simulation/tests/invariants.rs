//! Invariant checks over a manually driven network.
//!
//! Drives injection, propagation, and publishing phase by phase and
//! asserts the bookkeeping that must hold after every phase: knows-bits
//! only ever appear, the pending index matches the counters, in-flight
//! state never outgrows the pending set, attempts only span real edges,
//! and deliveries happen at most once per (transaction, receiver).

use gossipsim_simulation::{Network, SimConfig};
use gossipsim_types::{PeerId, TxId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use tracing_test::traced_test;

fn test_config() -> SimConfig {
    SimConfig::new(15, 3)
        .with_degree_bounds(2, 5)
        .with_delays(10, 100, 1)
        .with_tx_sizes(1, 3)
        .with_step_ms(50)
        .with_publish_threshold(90.0)
        .with_blocktime_ms(500)
        .with_bandwidth_kb_per_ms(5.0)
        .with_known_shape(10_000, 20)
        .with_seed(31)
}

/// Snapshot of every set (peer, tx) knows-bit.
fn known_pairs(network: &Network, max_tx: u32) -> HashSet<(u32, u32)> {
    let mut pairs = HashSet::new();
    for p in 1..=network.config().num_peers {
        for t in 0..max_tx {
            if network.known().knows(PeerId(p), TxId(t)) {
                pairs.insert((p, t));
            }
        }
    }
    pairs
}

fn assert_phase_invariants(network: &Network) {
    // Counters and the pending index agree.
    assert_eq!(
        network.pending_count(),
        network.total_injected() - network.total_published()
    );
    assert_eq!(network.pool().pending_count() as u64, network.pending_count());

    // In-flight transactions are a subset of pending ones.
    assert!(network.in_flight_count() <= network.pool().pending_count());

    // Every outstanding attempt spans a real edge, and no in-flight
    // entry duplicates a (sender, receiver) pair.
    for entry in network.in_flight() {
        let mut links = HashSet::new();
        for attempt in &entry.attempts {
            assert!(
                network
                    .topology()
                    .edge_delay(attempt.sender, attempt.receiver)
                    .is_some(),
                "attempt between nonadjacent peers {} and {}",
                attempt.sender,
                attempt.receiver
            );
            assert!(
                links.insert((attempt.sender, attempt.receiver)),
                "duplicate attempt on link {} -> {}",
                attempt.sender,
                attempt.receiver
            );
        }
    }
}

#[test]
#[traced_test]
fn test_invariants_hold_across_phases() {
    let config = test_config();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1));
    let mut network = Network::new(config, &mut rng).unwrap();

    let mut previous_known: HashSet<(u32, u32)> = HashSet::new();
    let mut total_delivered = 0u64;

    for round in 0..40 {
        network.inject_transactions(5, &mut rng);
        assert_phase_invariants(&network);

        let stats = network.broadcast(50, 5.0);
        total_delivered += stats.delivered;
        assert_phase_invariants(&network);

        let max_tx = network.total_injected() as u32;
        let current_known = known_pairs(&network, max_tx);

        // Knows-bits are monotone: once set, a bit stays set (publishing
        // removes transactions from pending, never bits from peers).
        assert!(
            current_known.is_superset(&previous_known),
            "a knows-bit was cleared mid-run"
        );

        // Each delivery sets exactly one new bit, and each injection sets
        // the origin's bit, so the bit count bounds delivery count: this
        // is at-most-once delivery over the whole run.
        assert_eq!(
            current_known.len() as u64,
            total_delivered + network.total_injected(),
            "every (peer, tx) bit must come from one injection or one delivery"
        );

        previous_known = current_known;

        if round % 8 == 7 {
            if !network.has_proposed_block() {
                network.prepare_request(&mut rng);
            }
            network.publish_proposed();
            assert_phase_invariants(&network);

            // Published ids never linger in the pending index.
            for id in 0..network.total_injected() as u32 {
                if network.known().is_published(TxId(id)) {
                    assert!(
                        !network.pool().contains(TxId(id)),
                        "published {} still pending",
                        TxId(id)
                    );
                }
            }
        }
    }

    assert!(network.total_injected() > 0);
}

/// A published transaction never reappears in a later proposal, even
/// though peers keep their knows-bits.
#[test]
#[traced_test]
fn test_published_ids_never_reproposed() {
    let config = test_config().with_full_mesh().with_delays(10, 10, 1);
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut network = Network::new(config, &mut rng).unwrap();

    network.inject_transactions(20, &mut rng);
    // Two generous steps spread everything across the mesh.
    network.broadcast(50, 1000.0);
    network.broadcast(50, 1000.0);

    network.prepare_request(&mut rng);
    let first_block: HashSet<u32> = network
        .proposed_block()
        .unwrap()
        .transactions
        .iter()
        .map(|tx| tx.id.0)
        .collect();
    assert!(!first_block.is_empty());
    network.publish_proposed();

    // The knows-bits for published ids survive publication.
    let sample = *first_block.iter().next().unwrap();
    let knowers = (1..=network.config().num_peers)
        .filter(|p| network.known().knows(PeerId(*p), TxId(sample)))
        .count();
    assert!(knowers > 0, "publication must not clear knows-bits");

    network.inject_transactions(5, &mut rng);
    network.broadcast(50, 1000.0);
    network.prepare_request(&mut rng);
    let second_block: HashSet<u32> = network
        .proposed_block()
        .unwrap()
        .transactions
        .iter()
        .map(|tx| tx.id.0)
        .collect();

    assert!(
        first_block.is_disjoint(&second_block),
        "published ids must never be proposed again"
    );
}
