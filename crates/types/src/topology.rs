//! Weighted peer-to-peer topology.
//!
//! An undirected graph over peers `1..=N`. Every edge carries a fixed
//! integer delay in milliseconds, drawn from a normal distribution and
//! clamped to a configured range. A subset of peers is flagged as
//! validators; the rest are seeds where transactions originate.
//!
//! Adjacency is stored as an ordered map per peer so that neighbor
//! iteration is deterministic under a fixed seed.

use crate::PeerId;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;
use tracing::debug;

/// How many candidate draws the random generator tolerates per peer
/// before giving up on reaching its target degree.
const MAX_CANDIDATE_REJECTIONS: u32 = 1000;

/// Edge-delay sampling parameters.
///
/// Raw delays are sampled from `Normal(mean_ms, stddev_ms)`, clamped to
/// `[min_ms, max_ms]`, then scaled by `multiplier`.
#[derive(Debug, Clone)]
pub struct DelayModel {
    /// Mean of the underlying normal distribution.
    pub mean_ms: f64,
    /// Standard deviation of the underlying normal distribution.
    pub stddev_ms: f64,
    /// Lower clamp applied to raw samples.
    pub min_ms: u32,
    /// Upper clamp applied to raw samples.
    pub max_ms: u32,
    /// Scale factor applied after clamping.
    pub multiplier: u32,
}

impl Default for DelayModel {
    fn default() -> Self {
        Self {
            mean_ms: 100.0,
            stddev_ms: 50.0,
            min_ms: 10,
            max_ms: 500,
            multiplier: 1,
        }
    }
}

impl DelayModel {
    /// Sample one edge delay.
    pub fn sample(&self, rng: &mut ChaCha8Rng) -> u32 {
        let raw = if self.stddev_ms > 0.0 {
            let normal = Normal::new(self.mean_ms, self.stddev_ms)
                .expect("delay distribution parameters must be finite");
            normal.sample(rng)
        } else {
            self.mean_ms
        };
        // Negative samples collapse to the lower clamp.
        let clamped = (raw.max(0.0) as u32).clamp(self.min_ms, self.max_ms);
        clamped * self.multiplier
    }
}

/// Errors from topology construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// A topology needs at least one peer.
    #[error("topology must contain at least one peer")]
    NoPeers,

    /// Degree bounds are inverted.
    #[error("min_conn {min} exceeds max_conn {max}")]
    InvalidDegreeBounds {
        /// Requested minimum degree.
        min: u32,
        /// Requested maximum degree.
        max: u32,
    },
}

/// Undirected weighted graph over peers `1..=N` with validator flags.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Per-peer neighbor map: `adjacency[p][q]` is the delay of edge
    /// `{p, q}` in milliseconds. Slot 0 is unused; peers are 1-based.
    adjacency: Vec<BTreeMap<PeerId, u32>>,
    /// Validator flag per peer, frozen once selected.
    is_validator: Vec<bool>,
    /// Sorted validator ids.
    validators: Vec<PeerId>,
    /// Quorum threshold `M = max(1, 2⌊(|V|-1)/3⌋ + 1)`.
    quorum: usize,
}

impl Topology {
    fn with_peers(num_peers: u32) -> Self {
        let slots = num_peers as usize + 1;
        Self {
            adjacency: vec![BTreeMap::new(); slots],
            is_validator: vec![false; slots],
            validators: Vec::new(),
            quorum: 1,
        }
    }

    /// Build a fully connected topology over `n` peers.
    pub fn full_mesh(
        n: u32,
        delays: &DelayModel,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self, TopologyError> {
        if n == 0 {
            return Err(TopologyError::NoPeers);
        }
        let mut topology = Self::with_peers(n);
        for i in 1..=n {
            for j in (i + 1)..=n {
                let delay = delays.sample(rng);
                topology.add_edge(PeerId(i), PeerId(j), delay, n);
            }
        }
        Ok(topology)
    }

    /// Build a sparse random topology over `n` peers.
    ///
    /// For each peer in order, a target degree is drawn from
    /// `[min_conn, max_conn]` and candidates are sampled uniformly until
    /// the target is met or [`MAX_CANDIDATE_REJECTIONS`] draws have been
    /// spent. The result is not necessarily regular and connectivity is
    /// not guaranteed.
    pub fn random(
        n: u32,
        min_conn: u32,
        max_conn: u32,
        delays: &DelayModel,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self, TopologyError> {
        if n == 0 {
            return Err(TopologyError::NoPeers);
        }
        if min_conn > max_conn {
            return Err(TopologyError::InvalidDegreeBounds {
                min: min_conn,
                max: max_conn,
            });
        }

        let mut topology = Self::with_peers(n);
        for i in 1..=n {
            let peer = PeerId(i);
            let target = rng.gen_range(min_conn..=max_conn).min(max_conn) as usize;
            let mut chosen: Vec<PeerId> = Vec::new();
            let mut attempts = 0;
            while chosen.len() < target
                && topology.degree(peer) < max_conn as usize
                && attempts < MAX_CANDIDATE_REJECTIONS
            {
                let candidate = PeerId(rng.gen_range(1..=n));
                if candidate != peer
                    && !chosen.contains(&candidate)
                    && !topology.has_edge(peer, candidate)
                    && topology.degree(candidate) < max_conn as usize
                {
                    let delay = delays.sample(rng);
                    if topology.add_edge(peer, candidate, delay, max_conn) {
                        chosen.push(candidate);
                    }
                }
                attempts += 1;
            }
            if attempts >= MAX_CANDIDATE_REJECTIONS {
                // Recorded but not surfaced; the peer keeps whatever
                // degree it reached.
                debug!(%peer, reached = chosen.len(), target, "gave up on target degree");
            }
        }
        Ok(topology)
    }

    /// Insert edge `{a, b}` with the given delay.
    ///
    /// Idempotent: returns false if the edge already exists or either
    /// endpoint is at its degree cap.
    pub fn add_edge(&mut self, a: PeerId, b: PeerId, delay_ms: u32, max_connections: u32) -> bool {
        if a == b || self.has_edge(a, b) {
            return false;
        }
        let cap = max_connections as usize;
        if self.degree(a) >= cap || self.degree(b) >= cap {
            return false;
        }
        self.adjacency[a.index()].insert(b, delay_ms);
        self.adjacency[b.index()].insert(a, delay_ms);
        true
    }

    /// Flag `k` distinct peers, sampled uniformly without replacement, as
    /// validators. The selection is frozen for the run and fixes the
    /// quorum threshold.
    pub fn select_validators(&mut self, k: u32, rng: &mut ChaCha8Rng) {
        use rand::seq::SliceRandom;

        let mut all: Vec<PeerId> = (1..self.adjacency.len() as u32).map(PeerId).collect();
        all.shuffle(rng);
        for peer in all.into_iter().take(k as usize) {
            self.is_validator[peer.index()] = true;
        }

        self.validators = (1..self.adjacency.len() as u32)
            .map(PeerId)
            .filter(|p| self.is_validator[p.index()])
            .collect();

        let total = self.validators.len();
        let f = total.saturating_sub(1) / 3;
        self.quorum = (2 * f + 1).max(1);
    }

    /// Number of peers in the topology.
    pub fn num_peers(&self) -> u32 {
        self.adjacency.len() as u32 - 1
    }

    /// Current degree of a peer.
    pub fn degree(&self, peer: PeerId) -> usize {
        self.adjacency[peer.index()].len()
    }

    /// Whether edge `{a, b}` exists.
    pub fn has_edge(&self, a: PeerId, b: PeerId) -> bool {
        self.adjacency[a.index()].contains_key(&b)
    }

    /// Delay of edge `{a, b}` in milliseconds, if the edge exists.
    pub fn edge_delay(&self, a: PeerId, b: PeerId) -> Option<u32> {
        self.adjacency[a.index()].get(&b).copied()
    }

    /// Neighbors of a peer with their edge delays, in ascending peer order.
    pub fn neighbors(&self, peer: PeerId) -> impl Iterator<Item = (PeerId, u32)> + '_ {
        self.adjacency[peer.index()].iter().map(|(p, d)| (*p, *d))
    }

    /// Whether a peer participates in the publish quorum.
    pub fn is_validator(&self, peer: PeerId) -> bool {
        self.is_validator[peer.index()]
    }

    /// Sorted validator ids.
    pub fn validators(&self) -> &[PeerId] {
        &self.validators
    }

    /// Sorted non-validator (seed) ids.
    pub fn seeds(&self) -> Vec<PeerId> {
        (1..self.adjacency.len() as u32)
            .map(PeerId)
            .filter(|p| !self.is_validator[p.index()])
            .collect()
    }

    /// Quorum threshold `M`: the number of validators whose coverage must
    /// meet the publish threshold before a block may be published.
    pub fn quorum_threshold(&self) -> usize {
        self.quorum
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(|m| m.len()).sum::<usize>() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn fixed_delays(ms: u32) -> DelayModel {
        DelayModel {
            mean_ms: ms as f64,
            stddev_ms: 0.0,
            min_ms: ms,
            max_ms: ms,
            multiplier: 1,
        }
    }

    #[test]
    fn test_full_mesh_degrees() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let topology = Topology::full_mesh(5, &DelayModel::default(), &mut rng).unwrap();

        for i in 1..=5 {
            assert_eq!(topology.degree(PeerId(i)), 4);
        }
        assert_eq!(topology.edge_count(), 10);
    }

    #[test]
    fn test_random_degree_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let topology =
            Topology::random(30, 3, 12, &DelayModel::default(), &mut rng).unwrap();

        for i in 1..=30 {
            assert!(topology.degree(PeerId(i)) <= 12);
        }
        // Edges are symmetric.
        for i in 1..=30u32 {
            for (neighbor, delay) in topology.neighbors(PeerId(i)) {
                assert_eq!(topology.edge_delay(neighbor, PeerId(i)), Some(delay));
            }
        }
    }

    #[test]
    fn test_delay_clamp_and_multiplier() {
        let model = DelayModel {
            mean_ms: 100.0,
            stddev_ms: 50.0,
            min_ms: 20,
            max_ms: 60,
            multiplier: 3,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1000 {
            let delay = model.sample(&mut rng);
            assert!((60..=180).contains(&delay), "delay {} out of range", delay);
            assert_eq!(delay % 3, 0);
        }
    }

    #[test]
    fn test_add_edge_idempotent_and_capped() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut topology = Topology::full_mesh(2, &fixed_delays(10), &mut rng).unwrap();
        assert!(topology.has_edge(PeerId(1), PeerId(2)));

        // Re-adding the same edge is refused.
        assert!(!topology.add_edge(PeerId(1), PeerId(2), 99, 10));
        assert_eq!(topology.edge_delay(PeerId(1), PeerId(2)), Some(10));

        // Self-edges are refused.
        assert!(!topology.add_edge(PeerId(1), PeerId(1), 5, 10));
    }

    #[test]
    fn test_degree_cap_respected() {
        let mut topology = Topology::with_peers(4);
        assert!(topology.add_edge(PeerId(1), PeerId(2), 10, 1));
        // Both endpoints are now at cap 1.
        assert!(!topology.add_edge(PeerId(1), PeerId(3), 10, 1));
        assert!(!topology.add_edge(PeerId(4), PeerId(2), 10, 1));
    }

    #[test]
    fn test_validator_selection_and_quorum() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut topology = Topology::full_mesh(30, &DelayModel::default(), &mut rng).unwrap();
        topology.select_validators(7, &mut rng);

        assert_eq!(topology.validators().len(), 7);
        assert_eq!(topology.seeds().len(), 23);
        // |V| = 7: f = 2, M = 5.
        assert_eq!(topology.quorum_threshold(), 5);

        // Validator list is sorted and consistent with the flags.
        let validators = topology.validators().to_vec();
        let mut sorted = validators.clone();
        sorted.sort();
        assert_eq!(validators, sorted);
        for v in &validators {
            assert!(topology.is_validator(*v));
        }
    }

    #[test]
    fn test_single_validator_quorum() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut topology = Topology::full_mesh(4, &DelayModel::default(), &mut rng).unwrap();
        topology.select_validators(1, &mut rng);
        assert_eq!(topology.quorum_threshold(), 1);
    }

    #[test]
    fn test_deterministic_construction() {
        let mut rng1 = ChaCha8Rng::seed_from_u64(99);
        let mut rng2 = ChaCha8Rng::seed_from_u64(99);
        let a = Topology::random(20, 2, 6, &DelayModel::default(), &mut rng1).unwrap();
        let b = Topology::random(20, 2, 6, &DelayModel::default(), &mut rng2).unwrap();

        for i in 1..=20u32 {
            let na: Vec<_> = a.neighbors(PeerId(i)).collect();
            let nb: Vec<_> = b.neighbors(PeerId(i)).collect();
            assert_eq!(na, nb);
        }
    }
}
