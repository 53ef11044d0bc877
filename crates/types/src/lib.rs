//! Core types for the gossip simulator.
//!
//! This crate provides the foundational types used throughout the
//! simulation:
//!
//! - **Identifiers**: `PeerId`, `TxId`
//! - **Transaction metadata**: `Transaction`
//! - **Network shape**: `Topology`, `DelayModel`
//!
//! Identifiers are opaque integers: peers are numbered `1..=N` at network
//! construction and transaction ids are handed out from a monotonically
//! increasing counter starting at 0. Neither is ever reused within a run.
//! This crate does not depend on any other workspace crates, making it the
//! foundation layer.

mod topology;

pub use topology::{DelayModel, Topology, TopologyError};

/// Identifier of a simulated peer. Valid peers are numbered `1..=N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u32);

impl PeerId {
    /// Index into per-peer arrays (slot 0 is unused).
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Identifier of a transaction, assigned densely from 0 within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(pub u32);

impl TxId {
    /// Dense index used by the known/published bitmaps.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// A unit of propagated data: an opaque payload of `size_kb` kilobytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    /// Dense identifier, unique within a run.
    pub id: TxId,
    /// Payload size in kilobytes. Charged against sender bandwidth on
    /// every delivery and against the block size cap at proposal time.
    pub size_kb: u16,
}

impl Transaction {
    /// Create a new transaction.
    pub fn new(id: TxId, size_kb: u16) -> Self {
        Self { id, size_kb }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(PeerId(3).to_string(), "peer-3");
        assert_eq!(TxId(0).to_string(), "tx-0");
    }

    #[test]
    fn test_indexing() {
        assert_eq!(PeerId(7).index(), 7);
        assert_eq!(TxId(41).index(), 41);
    }
}
