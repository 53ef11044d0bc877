//! Propagation engine: advances in-flight transactions hop by hop.
//!
//! Every in-flight transaction carries a list of outstanding delivery
//! attempts, one per (sender, receiver) link it is currently traversing.
//! A call to [`PropagationEngine::broadcast`] advances every attempt by
//! one step: timers grow by `step_ms`, an attempt whose timer has
//! reached its edge delay delivers if the sender still has bandwidth
//! budget this step, and a successful delivery fans out fresh attempts
//! from the receiver to its other neighbors.
//!
//! Guarantees upheld here:
//!
//! - **At-most-once delivery** per (transaction, receiver): the known
//!   bitmap is checked before an attempt delivers, and attempts whose
//!   receiver already knows are discarded.
//! - **Monotone timers**: a retained attempt's timer is strictly larger
//!   after the call than before.
//! - **Bandwidth budget**: the sum of delivered sizes per sender never
//!   exceeds `bandwidth_kb_per_ms * step_ms` within one call; blocked
//!   deliveries are deferred, never dropped.
//! - **No back-echo**: fan-out never targets the hop's own sender.

use crate::known::KnownStore;
use gossipsim_types::{PeerId, Topology, Transaction, TxId};
use std::collections::BTreeSet;
use tracing::trace;

/// One attempt to carry a transaction across one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    /// The peer transmitting.
    pub sender: PeerId,
    /// The peer being delivered to.
    pub receiver: PeerId,
    /// Elapsed time on this link in milliseconds.
    pub timer_ms: u32,
}

impl DeliveryAttempt {
    fn new(sender: PeerId, receiver: PeerId) -> Self {
        Self {
            sender,
            receiver,
            timer_ms: 0,
        }
    }
}

/// A transaction still traversing the network.
#[derive(Debug, Clone)]
pub struct InFlightTx {
    /// The propagating transaction.
    pub tx: Transaction,
    /// Peer the transaction was injected at.
    pub origin: PeerId,
    /// Outstanding delivery attempts, all for `tx`.
    pub attempts: Vec<DeliveryAttempt>,
}

/// Counters for a single broadcast call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Attempts that delivered this call.
    pub delivered: u64,
    /// Attempts past their delay that were retained for lack of sender
    /// bandwidth.
    pub deferred: u64,
    /// Attempts discarded because the receiver already knew.
    pub dropped_known: u64,
}

/// Owns the in-flight set and all attempt timers.
#[derive(Debug, Default)]
pub struct PropagationEngine {
    in_flight: Vec<InFlightTx>,
}

impl PropagationEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly injected transaction: one attempt from the
    /// origin to each of its neighbors.
    pub fn inject(&mut self, tx: Transaction, origin: PeerId, topology: &Topology) {
        let attempts = topology
            .neighbors(origin)
            .map(|(neighbor, _)| DeliveryAttempt::new(origin, neighbor))
            .collect();
        self.in_flight.push(InFlightTx {
            tx,
            origin,
            attempts,
        });
    }

    /// Advance every attempt by `step_ms` and deliver where delay and
    /// bandwidth permit.
    pub fn broadcast(
        &mut self,
        step_ms: u32,
        bandwidth_kb_per_ms: f64,
        topology: &Topology,
        known: &mut KnownStore,
    ) -> BroadcastStats {
        assert!(step_ms > 0, "broadcast step must be positive");

        let max_per_sender_kb = bandwidth_kb_per_ms * step_ms as f64;
        let mut transmitted = vec![0.0f64; topology.num_peers() as usize + 1];
        let mut stats = BroadcastStats::default();

        for entry in &mut self.in_flight {
            let tx = entry.tx;
            let attempts = std::mem::take(&mut entry.attempts);
            let mut next = Vec::with_capacity(attempts.len());

            for mut attempt in attempts {
                attempt.timer_ms += step_ms;

                if known.knows(attempt.receiver, tx.id) {
                    stats.dropped_known += 1;
                    continue;
                }

                let delay = topology
                    .edge_delay(attempt.sender, attempt.receiver)
                    .unwrap_or_else(|| {
                        panic!(
                            "delivery attempt between nonadjacent peers {} and {}",
                            attempt.sender, attempt.receiver
                        )
                    });

                if attempt.timer_ms < delay {
                    next.push(attempt);
                    continue;
                }

                // The link is ready; check the sender's budget for this step.
                if transmitted[attempt.sender.index()] + tx.size_kb as f64 > max_per_sender_kb {
                    stats.deferred += 1;
                    next.push(attempt);
                    continue;
                }

                transmitted[attempt.sender.index()] += tx.size_kb as f64;
                known.mark(attempt.receiver, tx.id);
                stats.delivered += 1;

                // Fan out from the receiver, skipping the hop's sender and
                // anyone who already knows. Fresh attempts are appended to
                // the retained list and start their timers next call.
                for (neighbor, _) in topology.neighbors(attempt.receiver) {
                    if neighbor == attempt.sender {
                        continue;
                    }
                    if !known.knows(neighbor, tx.id) {
                        next.push(DeliveryAttempt::new(attempt.receiver, neighbor));
                    }
                }
            }

            entry.attempts = next;
        }

        self.in_flight.retain(|entry| !entry.attempts.is_empty());

        trace!(
            step_ms,
            delivered = stats.delivered,
            deferred = stats.deferred,
            dropped_known = stats.dropped_known,
            in_flight = self.in_flight.len(),
            "broadcast step"
        );
        stats
    }

    /// Drop all in-flight state for the given published ids.
    pub fn remove_published(&mut self, ids: &BTreeSet<TxId>) {
        self.in_flight.retain(|entry| !ids.contains(&entry.tx.id));
    }

    /// Number of transactions still in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// The in-flight set, for inspection.
    pub fn in_flight(&self) -> &[InFlightTx] {
        &self.in_flight
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.in_flight.clear();
    }
}
