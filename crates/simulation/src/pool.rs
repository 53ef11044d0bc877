//! Live transaction pool.

use gossipsim_types::{Transaction, TxId};
use std::collections::{BTreeSet, HashMap};

/// Metadata for live transactions plus the pending-id index.
///
/// A transaction enters at injection and leaves atomically at publish.
/// Pending ids are kept ordered so enumeration is deterministic under a
/// fixed seed.
#[derive(Debug, Default)]
pub struct TxPool {
    lookup: HashMap<TxId, Transaction>,
    pending: BTreeSet<TxId>,
}

impl TxPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly injected transaction.
    pub fn insert(&mut self, tx: Transaction) {
        self.lookup.insert(tx.id, tx);
        self.pending.insert(tx.id);
    }

    /// Look up a live transaction.
    pub fn get(&self, id: TxId) -> Option<&Transaction> {
        self.lookup.get(&id)
    }

    /// Whether the id is still live.
    pub fn contains(&self, id: TxId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// Remove a transaction (at publish time).
    pub fn remove(&mut self, id: TxId) {
        self.lookup.remove(&id);
        self.pending.remove(&id);
    }

    /// Pending ids in ascending order.
    pub fn pending_ids(&self) -> impl Iterator<Item = TxId> + '_ {
        self.pending.iter().copied()
    }

    /// Number of pending transactions.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.lookup.clear();
        self.pending.clear();
    }
}
