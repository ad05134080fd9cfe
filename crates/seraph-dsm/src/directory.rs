//! Directory-based coherence, MESI-lite: every page is `Invalid`
//! (nobody has a copy), `Shared` (one or more readers), or `Exclusive`
//! (exactly one writer). There is no separate `Modified` state — an
//! `Exclusive` holder is always dirty relative to the directory's view,
//! so a write-back happens on every downgrade or invalidation.

use crate::page::PageId;
use seraph_clock::{Order, VectorClock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CoherenceState {
    #[default]
    Invalid = 0,
    Shared = 1,
    Exclusive = 2,
}

#[derive(Debug, Clone)]
struct DirectoryEntry {
    state: CoherenceState,
    owner: Option<u16>,
    sharers: Vec<u16>,
    generation: u64,
    vclock: VectorClock,
}

impl Default for DirectoryEntry {
    fn default() -> Self {
        Self { state: CoherenceState::default(), owner: None, sharers: Vec::new(), generation: 0, vclock: VectorClock::new() }
    }
}

/// What the requesting node's coherence layer must do to satisfy a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadGrant {
    /// A node to fetch fresh data from, if the directory itself holds no
    /// authoritative copy (first reader of a page with no owner).
    pub fetch_from: Option<u16>,
    /// The previous exclusive owner, downgraded to `Shared` as a side
    /// effect of this grant; its coherence layer must be told to stop
    /// treating the page as writable.
    pub downgraded_owner: Option<u16>,
    /// `true` if the requester's vclock was concurrent with the
    /// directory's own recorded history for this page.
    pub conflict: bool,
    pub generation: u64,
    pub vclock: VectorClock,
}

/// What the requesting node's coherence layer must do to satisfy a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteGrant {
    /// Every other node whose copy is now stale and must be invalidated.
    pub invalidate: Vec<u16>,
    pub conflict: bool,
    pub generation: u64,
    pub vclock: VectorClock,
}

/// Per-directory atomic counters, advisory only.
#[derive(Debug, Default)]
pub struct DirectoryMetrics {
    pub reads_granted: AtomicU64,
    pub writes_granted: AtomicU64,
    pub downgrades: AtomicU64,
    pub invalidations: AtomicU64,
    pub conflicts: AtomicU64,
}

impl DirectoryMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reads_granted: AtomicU64::new(0),
            writes_granted: AtomicU64::new(0),
            downgrades: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
        }
    }
}

/// The authoritative coherence state for every page a node space covers.
/// Requests serialize through `&mut self`. A "conflict" here is a real
/// causality conflict: the requester's vclock is concurrent with (not
/// descended from) the directory's recorded vclock for the page. The
/// owner-wins policy means a concurrent incoming vclock is flagged but
/// never overwrites the directory's own record — only a causally later
/// (or equal) vclock gets merged in.
pub struct Directory {
    entries: HashMap<PageId, DirectoryEntry>,
    pub metrics: DirectoryMetrics,
}

impl Directory {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: HashMap::new(), metrics: DirectoryMetrics::new() }
    }

    #[must_use]
    pub fn state(&self, page: PageId) -> CoherenceState {
        self.entries.get(&page).map_or(CoherenceState::Invalid, |e| e.state)
    }

    #[must_use]
    pub fn owner(&self, page: PageId) -> Option<u16> {
        self.entries.get(&page).and_then(|e| e.owner)
    }

    #[must_use]
    pub fn generation(&self, page: PageId) -> u64 {
        self.entries.get(&page).map_or(0, |e| e.generation)
    }

    #[must_use]
    pub fn vclock(&self, page: PageId) -> VectorClock {
        self.entries.get(&page).map_or_else(VectorClock::new, |e| e.vclock.clone())
    }

    /// Compare `incoming` against the directory's own record and fold it
    /// in. A concurrent incoming vclock is flagged but does not
    /// overwrite the directory's record; anything else (before, after,
    /// or equal) is merged in, and the generation always advances to
    /// the max of the two.
    fn reconcile_vclock(entry: &mut DirectoryEntry, incoming_generation: u64, incoming: &VectorClock) -> bool {
        let conflict = matches!(entry.vclock.compare(incoming), Order::Concurrent);
        if !conflict {
            entry.vclock.merge(incoming);
        }
        entry.generation = entry.generation.max(incoming_generation);
        conflict
    }

    /// Grant `node` read access to `page`, downgrading an exclusive
    /// owner to `Shared` if one exists.
    pub fn request_read(&mut self, page: PageId, node: u16, incoming_generation: u64, incoming_vclock: &VectorClock) -> ReadGrant {
        let entry = self.entries.entry(page).or_default();
        self.metrics.reads_granted.fetch_add(1, Ordering::Relaxed);
        let conflict = Self::reconcile_vclock(entry, incoming_generation, incoming_vclock);
        if conflict {
            self.metrics.conflicts.fetch_add(1, Ordering::Relaxed);
        }

        let (fetch_from, downgraded_owner) = match entry.state {
            CoherenceState::Invalid => {
                entry.state = CoherenceState::Shared;
                entry.sharers = vec![node];
                (None, None)
            }
            CoherenceState::Shared => {
                let fetch_from = entry.sharers.first().copied().filter(|&s| s != node);
                if !entry.sharers.contains(&node) {
                    entry.sharers.push(node);
                }
                (fetch_from, None)
            }
            CoherenceState::Exclusive => {
                let owner = entry.owner;
                if owner == Some(node) {
                    (None, None)
                } else {
                    self.metrics.downgrades.fetch_add(1, Ordering::Relaxed);
                    entry.state = CoherenceState::Shared;
                    entry.sharers = owner.into_iter().chain(std::iter::once(node)).collect();
                    entry.owner = None;
                    (owner, owner)
                }
            }
        };

        ReadGrant { fetch_from, downgraded_owner, conflict, generation: entry.generation, vclock: entry.vclock.clone() }
    }

    /// Grant `node` exclusive (write) access to `page`, invalidating
    /// every other copy.
    pub fn request_write(&mut self, page: PageId, node: u16, incoming_generation: u64, incoming_vclock: &VectorClock) -> WriteGrant {
        let entry = self.entries.entry(page).or_default();
        self.metrics.writes_granted.fetch_add(1, Ordering::Relaxed);
        let conflict = Self::reconcile_vclock(entry, incoming_generation, incoming_vclock);
        if conflict {
            self.metrics.conflicts.fetch_add(1, Ordering::Relaxed);
        }

        let invalidate: Vec<u16> = match entry.state {
            CoherenceState::Invalid => Vec::new(),
            CoherenceState::Shared => entry.sharers.iter().copied().filter(|&s| s != node).collect(),
            CoherenceState::Exclusive => entry.owner.into_iter().filter(|&o| o != node).collect(),
        };
        if !invalidate.is_empty() {
            self.metrics.invalidations.fetch_add(invalidate.len() as u64, Ordering::Relaxed);
        }
        entry.state = CoherenceState::Exclusive;
        entry.owner = Some(node);
        entry.sharers.clear();

        WriteGrant { invalidate, conflict, generation: entry.generation, vclock: entry.vclock.clone() }
    }

    /// Drop all directory state for a page, as after an explicit
    /// revocation or a reset, and bump its generation so a holder that
    /// missed the invalidate message is still caught on its next request.
    pub fn invalidate_all(&mut self, page: PageId) -> Vec<u16> {
        let Some(entry) = self.entries.get_mut(&page) else { return Vec::new() };
        let holders: Vec<u16> = match entry.state {
            CoherenceState::Invalid => Vec::new(),
            CoherenceState::Shared => std::mem::take(&mut entry.sharers),
            CoherenceState::Exclusive => entry.owner.take().into_iter().collect(),
        };
        entry.state = CoherenceState::Invalid;
        entry.generation = entry.generation.wrapping_add(1);
        if !holders.is_empty() {
            self.metrics.invalidations.fetch_add(holders.len() as u64, Ordering::Relaxed);
        }
        holders
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AetherAddr;

    fn page(n: u16) -> PageId {
        AetherAddr::new(n, 0).unwrap()
    }

    fn clock(node: u16, ts: u64) -> VectorClock {
        let mut vc = VectorClock::new();
        if ts > 0 {
            vc.set(node, ts);
        }
        vc
    }

    #[test]
    fn first_reader_gets_shared_with_no_fetch() {
        let mut dir = Directory::new();
        let grant = dir.request_read(page(1), 10, 0, &VectorClock::new());
        assert_eq!(grant.fetch_from, None);
        assert_eq!(dir.state(page(1)), CoherenceState::Shared);
    }

    #[test]
    fn write_invalidates_existing_sharers() {
        let mut dir = Directory::new();
        dir.request_read(page(1), 10, 0, &VectorClock::new());
        dir.request_read(page(1), 11, 0, &VectorClock::new());
        let grant = dir.request_write(page(1), 12, 0, &VectorClock::new());
        assert_eq!(grant.invalidate.len(), 2);
        assert_eq!(dir.state(page(1)), CoherenceState::Exclusive);
        assert_eq!(dir.owner(page(1)), Some(12));
    }

    #[test]
    fn read_downgrades_exclusive_owner() {
        let mut dir = Directory::new();
        dir.request_write(page(1), 5, 0, &VectorClock::new());
        let grant = dir.request_read(page(1), 6, 0, &VectorClock::new());
        assert_eq!(grant.downgraded_owner, Some(5));
        assert_eq!(dir.state(page(1)), CoherenceState::Shared);
    }

    #[test]
    fn same_node_write_then_write_has_no_invalidation() {
        let mut dir = Directory::new();
        dir.request_write(page(1), 5, 0, &VectorClock::new());
        let grant = dir.request_write(page(1), 5, 0, &VectorClock::new());
        assert!(grant.invalidate.is_empty());
    }

    #[test]
    fn invalidate_all_clears_state_and_returns_holders() {
        let mut dir = Directory::new();
        dir.request_read(page(1), 1, 0, &VectorClock::new());
        dir.request_read(page(1), 2, 0, &VectorClock::new());
        let holders = dir.invalidate_all(page(1));
        assert_eq!(holders.len(), 2);
        assert_eq!(dir.state(page(1)), CoherenceState::Invalid);
    }

    #[test]
    fn invalidate_all_bumps_generation() {
        let mut dir = Directory::new();
        dir.request_write(page(1), 1, 0, &VectorClock::new());
        let before = dir.generation(page(1));
        dir.invalidate_all(page(1));
        assert_eq!(dir.generation(page(1)), before + 1);
    }

    #[test]
    fn concurrent_vclock_is_flagged_as_conflict() {
        let mut dir = Directory::new();
        let mut vc1 = VectorClock::new();
        vc1.set(1, 1);
        dir.request_write(page(1), 1, 0, &vc1);

        // Node 2 writes with a vclock that never observed node 1's
        // write — {2: 1} is concurrent with {1: 1}.
        let vc2 = clock(2, 1);
        let grant = dir.request_write(page(1), 2, 0, &vc2);
        assert!(grant.conflict);
        assert_eq!(dir.metrics.conflicts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn causally_descended_vclock_is_not_a_conflict() {
        let mut dir = Directory::new();
        let mut vc1 = VectorClock::new();
        vc1.set(1, 1);
        dir.request_write(page(1), 1, 0, &vc1);

        let mut vc2 = vc1.clone();
        vc2.set(2, 1);
        let grant = dir.request_write(page(1), 2, 0, &vc2);
        assert!(!grant.conflict);
        assert_eq!(dir.metrics.conflicts.load(Ordering::Relaxed), 0);
    }
}
