//! Hash-chained events: each event commits to its predecessor's hash and
//! a strictly greater timestamp, forming a tamper-evident DAG edge.

use seraph_primitives::absence::Sentinel;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// One node in the event chain/DAG. `source_id`/`sequence` identify which
/// clock emitted the event and its position in that clock's own stream,
/// so two events with the same timestamp (from different sources) still
/// hash to different values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: u64,
    pub source_id: u16,
    pub sequence: u64,
    pub predecessor_hash: u64,
    pub payload_hash: u64,
    pub hash: u64,
}

impl Event {
    /// True iff this event failed to form (its hash collides with the
    /// absence sentinel — the causality check below rejected it).
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.hash == u64::ABSENT
    }

    fn sealed_absent() -> Self {
        Self {
            timestamp: u64::ABSENT,
            source_id: u16::ABSENT,
            sequence: u64::ABSENT,
            predecessor_hash: u64::ABSENT,
            payload_hash: u64::ABSENT,
            hash: u64::ABSENT,
        }
    }

    /// FNV-1a over the event's fixed fields — timestamp, source, sequence,
    /// payload hash — chained with the predecessor's hash.
    fn compute_hash(timestamp: u64, source_id: u16, sequence: u64, payload_hash: u64, predecessor_hash: u64) -> u64 {
        let mut buf = [0u8; 34];
        buf[0..8].copy_from_slice(&timestamp.to_le_bytes());
        buf[8..10].copy_from_slice(&source_id.to_le_bytes());
        buf[10..18].copy_from_slice(&sequence.to_le_bytes());
        buf[18..26].copy_from_slice(&payload_hash.to_le_bytes());
        buf[26..34].copy_from_slice(&predecessor_hash.to_le_bytes());
        fnv1a(&buf)
    }

    /// The first event in a chain: predecessor hash is zero.
    #[must_use]
    pub fn genesis(timestamp: u64, source_id: u16, sequence: u64, payload: &[u8]) -> Self {
        let payload_hash = fnv1a(payload);
        let hash = Self::compute_hash(timestamp, source_id, sequence, payload_hash, 0);
        Self { timestamp, source_id, sequence, predecessor_hash: 0, payload_hash, hash }
    }

    /// Extend the chain. Rejected (absent) unless `timestamp` is strictly
    /// greater than `predecessor`'s — the chain must advance in time, not
    /// just in hash.
    #[must_use]
    pub fn chain(predecessor: &Event, timestamp: u64, source_id: u16, sequence: u64, payload: &[u8]) -> Self {
        if predecessor.is_absent() || timestamp <= predecessor.timestamp || timestamp == u64::ABSENT {
            return Self::sealed_absent();
        }
        let payload_hash = fnv1a(payload);
        let hash = Self::compute_hash(timestamp, source_id, sequence, payload_hash, predecessor.hash);
        Self { timestamp, source_id, sequence, predecessor_hash: predecessor.hash, payload_hash, hash }
    }

    /// Verify that `self` legitimately follows `predecessor`: the hash
    /// recomputes and the timestamp strictly advanced.
    #[must_use]
    pub fn verify_link(&self, predecessor: &Event) -> bool {
        if self.is_absent() || predecessor.is_absent() {
            return false;
        }
        self.predecessor_hash == predecessor.hash
            && self.timestamp > predecessor.timestamp
            && self.hash == Self::compute_hash(self.timestamp, self.source_id, self.sequence, self.payload_hash, self.predecessor_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_has_zero_predecessor_hash() {
        let e = Event::genesis(1, 0, 0, b"hello");
        assert_eq!(e.predecessor_hash, 0);
        assert!(!e.is_absent());
    }

    #[test]
    fn chain_requires_strictly_advancing_timestamp() {
        let genesis = Event::genesis(5, 0, 0, b"a");
        let next = Event::chain(&genesis, 6, 0, 1, b"b");
        assert!(!next.is_absent());
        assert!(next.verify_link(&genesis));

        let stale = Event::chain(&genesis, 5, 0, 1, b"c");
        assert!(stale.is_absent());
        let backwards = Event::chain(&genesis, 1, 0, 1, b"d");
        assert!(backwards.is_absent());
    }

    #[test]
    fn tampering_with_payload_breaks_verification() {
        let genesis = Event::genesis(1, 0, 0, b"a");
        let mut next = Event::chain(&genesis, 2, 0, 1, b"b");
        next.payload_hash ^= 1;
        assert!(!next.verify_link(&genesis));
    }

    #[test]
    fn different_sources_at_the_same_timestamp_hash_differently() {
        let genesis = Event::genesis(1, 0, 0, b"a");
        let from_a = Event::chain(&genesis, 2, 1, 0, b"b");
        let from_b = Event::chain(&genesis, 2, 2, 0, b"b");
        assert_ne!(from_a.hash, from_b.hash);
    }

    #[test]
    fn fnv1a_is_deterministic() {
        assert_eq!(fnv1a(b"abc"), fnv1a(b"abc"));
        assert_ne!(fnv1a(b"abc"), fnv1a(b"abd"));
    }
}
