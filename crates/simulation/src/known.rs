//! Known-set and published-set bitmaps.
//!
//! Transaction ids are dense, so membership is a constant-time bit test
//! instead of a per-peer hash set. Every bitmap shares one coordinate
//! scheme: `row = id / cols`, `col = id % cols`. The tiling keeps rows
//! small; `cols` is configurable to trade memory granularity for lookup
//! locality.
//!
//! An out-of-range coordinate means the caller injected more
//! transactions than the configured shape can address. That is a bug in
//! the configuration, not a recoverable condition, so it aborts with a
//! diagnostic naming the peer and coordinate.

use gossipsim_types::{PeerId, TxId};

/// Flat bit array addressed through the shared row/column scheme.
#[derive(Debug, Clone)]
struct Bitmap {
    words: Vec<u64>,
}

impl Bitmap {
    fn new(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(64)],
        }
    }

    fn set(&mut self, bit: usize) {
        self.words[bit / 64] |= 1 << (bit % 64);
    }

    fn get(&self, bit: usize) -> bool {
        self.words[bit / 64] & (1 << (bit % 64)) != 0
    }

    fn clear(&mut self) {
        self.words.fill(0);
    }
}

/// Per-peer known bitmaps plus the global published bitmap.
///
/// A peer's bit for a transaction is set exactly once: at injection for
/// the origin, or at the moment of successful delivery for everyone
/// else. The published bit is set when a transaction leaves the pending
/// world, normally or forcibly, and is never cleared within a run.
#[derive(Debug)]
pub struct KnownStore {
    rows: usize,
    cols: usize,
    /// One bitmap per peer; slot 0 is unused (peers are 1-based).
    peers: Vec<Bitmap>,
    /// Global published flags, same coordinate scheme.
    published: Bitmap,
}

impl KnownStore {
    /// Create a store for `num_peers` peers with a `rows × cols` bitmap
    /// shape.
    pub fn new(rows: usize, cols: usize, num_peers: u32) -> Self {
        let bits = rows * cols;
        Self {
            rows,
            cols,
            peers: (0..=num_peers).map(|_| Bitmap::new(bits)).collect(),
            published: Bitmap::new(bits),
        }
    }

    /// Row/column coordinate of a transaction id.
    pub fn position(&self, id: TxId) -> (usize, usize) {
        (id.index() / self.cols, id.index() % self.cols)
    }

    /// Translate an id to a bit offset, aborting on out-of-range
    /// coordinates.
    fn checked_bit(&self, peer: Option<PeerId>, id: TxId) -> usize {
        let (row, col) = self.position(id);
        if row >= self.rows {
            match peer {
                Some(peer) => panic!(
                    "known bitmap out of range for {peer}: ({row}, {col}) exceeds {} x {}",
                    self.rows, self.cols
                ),
                None => panic!(
                    "published bitmap out of range: ({row}, {col}) exceeds {} x {}",
                    self.rows, self.cols
                ),
            }
        }
        row * self.cols + col
    }

    /// Mark a transaction as known to a peer.
    pub fn mark(&mut self, peer: PeerId, id: TxId) {
        let bit = self.checked_bit(Some(peer), id);
        self.peers[peer.index()].set(bit);
    }

    /// Whether a peer knows a transaction.
    pub fn knows(&self, peer: PeerId, id: TxId) -> bool {
        let bit = self.checked_bit(Some(peer), id);
        self.peers[peer.index()].get(bit)
    }

    /// Mark a transaction as globally published.
    pub fn mark_published(&mut self, id: TxId) {
        let bit = self.checked_bit(None, id);
        self.published.set(bit);
    }

    /// Whether a transaction has been published.
    pub fn is_published(&self, id: TxId) -> bool {
        let bit = self.checked_bit(None, id);
        self.published.get(bit)
    }

    /// Clear every bit in every bitmap.
    pub fn clear_all(&mut self) {
        for bitmap in &mut self.peers {
            bitmap.clear();
        }
        self.published.clear();
    }

    /// Number of ids the configured shape can address.
    pub fn capacity(&self) -> usize {
        self.rows * self.cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_query() {
        let mut store = KnownStore::new(100, 20, 4);
        let peer = PeerId(2);
        let id = TxId(37);

        assert!(!store.knows(peer, id));
        store.mark(peer, id);
        assert!(store.knows(peer, id));
        // Other peers are unaffected.
        assert!(!store.knows(PeerId(1), id));
        // Other ids are unaffected.
        assert!(!store.knows(peer, TxId(38)));
    }

    #[test]
    fn test_position_tiling() {
        let store = KnownStore::new(100, 20, 1);
        assert_eq!(store.position(TxId(0)), (0, 0));
        assert_eq!(store.position(TxId(19)), (0, 19));
        assert_eq!(store.position(TxId(20)), (1, 0));
        assert_eq!(store.position(TxId(45)), (2, 5));
    }

    #[test]
    fn test_published_flags() {
        let mut store = KnownStore::new(10, 20, 2);
        assert!(!store.is_published(TxId(5)));
        store.mark_published(TxId(5));
        assert!(store.is_published(TxId(5)));
        assert!(!store.is_published(TxId(6)));
    }

    #[test]
    fn test_clear_all() {
        let mut store = KnownStore::new(10, 20, 2);
        store.mark(PeerId(1), TxId(3));
        store.mark_published(TxId(3));
        store.clear_all();
        assert!(!store.knows(PeerId(1), TxId(3)));
        assert!(!store.is_published(TxId(3)));
    }

    #[test]
    #[should_panic(expected = "known bitmap out of range")]
    fn test_out_of_range_aborts() {
        let mut store = KnownStore::new(2, 20, 1);
        // Capacity is 40 ids; id 40 maps to row 2.
        store.mark(PeerId(1), TxId(40));
    }

    #[test]
    fn test_boundary_id_is_in_range() {
        let mut store = KnownStore::new(2, 20, 1);
        store.mark(PeerId(1), TxId(39));
        assert!(store.knows(PeerId(1), TxId(39)));
    }
}
