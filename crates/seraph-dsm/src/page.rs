//! Page cache with LRU eviction. The recency list is intrusive: `prev`
//! and `next` live on the slot itself rather than in a separate
//! `std::collections::LinkedList`, so a touch or an eviction is an O(1)
//! pointer splice instead of a traversal.

use crate::address::AetherAddr;
use seraph_clock::VectorClock;
use std::collections::HashMap;

pub type PageId = AetherAddr;

/// Default page size when a caller has no reason to pick another.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

struct Slot {
    page_id: PageId,
    data: Vec<u8>,
    owner_node: u16,
    generation: u64,
    fetch_time: u64,
    vclock: VectorClock,
    /// Written to locally since the last fetch/invalidate; must be
    /// flushed to the owner before the entry is invalidated.
    dirty: bool,
    /// `false` once invalidated by the directory; the bytes are kept
    /// around (for a pending write-back) but must not be served to a
    /// reader.
    valid: bool,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A fixed-capacity page cache keyed by [`PageId`], evicting the least
/// recently touched page when full.
pub struct PageCache {
    page_size: usize,
    capacity: usize,
    slots: Vec<Option<Slot>>,
    index: HashMap<PageId, usize>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl PageCache {
    #[must_use]
    pub fn new(capacity: usize, page_size: usize) -> Self {
        Self {
            page_size,
            capacity,
            slots: (0..capacity).map(|_| None).collect(),
            index: HashMap::with_capacity(capacity),
            free: (0..capacity).collect(),
            head: None,
            tail: None,
        }
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// `true` iff the page is resident AND valid (not pending
    /// invalidation).
    #[must_use]
    pub fn contains(&self, page_id: PageId) -> bool {
        self.index.get(&page_id).is_some_and(|&idx| self.slots[idx].as_ref().is_some_and(|s| s.valid))
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.slots[idx].as_ref().expect("detach on empty slot");
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(slot) = self.slots[idx].as_mut() {
            slot.prev = None;
            slot.next = old_head;
        }
        if let Some(h) = old_head {
            self.slots[h].as_mut().unwrap().prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.push_front(idx);
    }

    /// Read-through access that marks the page most-recently-used.
    /// Returns `None` for a page that is absent or invalidated.
    #[must_use]
    pub fn get(&mut self, page_id: PageId) -> Option<&[u8]> {
        let idx = *self.index.get(&page_id)?;
        if !self.slots[idx].as_ref().unwrap().valid {
            return None;
        }
        self.touch(idx);
        Some(&self.slots[idx].as_ref().unwrap().data)
    }

    /// Mutable read-through access; marks the entry dirty, since the only
    /// reason to hand out a mutable slice is to write through it.
    pub fn get_mut(&mut self, page_id: PageId) -> Option<&mut [u8]> {
        let idx = *self.index.get(&page_id)?;
        if !self.slots[idx].as_ref().unwrap().valid {
            return None;
        }
        self.touch(idx);
        let slot = self.slots[idx].as_mut().unwrap();
        slot.dirty = true;
        Some(&mut slot.data)
    }

    fn insert_slot(&mut self, page_id: PageId, slot_data: Slot) -> Option<(PageId, Vec<u8>)> {
        if let Some(&idx) = self.index.get(&page_id) {
            self.slots[idx] = Some(slot_data);
            self.touch(idx);
            return None;
        }

        let (idx, evicted) = if let Some(idx) = self.free.pop() {
            (idx, None)
        } else {
            let victim = self.tail.expect("cache at capacity must have a tail");
            self.detach(victim);
            let old = self.slots[victim].take().unwrap();
            self.index.remove(&old.page_id);
            (victim, Some((old.page_id, old.data)))
        };

        self.slots[idx] = Some(slot_data);
        self.index.insert(page_id, idx);
        self.push_front(idx);
        evicted
    }

    /// Insert a page with no protocol metadata (generation 0, empty
    /// vclock, clean, valid) — fine for tests and benchmarks that only
    /// care about the LRU/eviction behavior.
    pub fn insert(&mut self, page_id: PageId, data: Vec<u8>) -> Option<(PageId, Vec<u8>)> {
        self.insert_slot(
            page_id,
            Slot { page_id, data, owner_node: 0, generation: 0, fetch_time: 0, vclock: VectorClock::new(), dirty: false, valid: true },
        )
    }

    /// Insert a page fetched through the coherence protocol, carrying the
    /// owner, generation, fetch timestamp, and vclock the grant came with.
    pub fn insert_meta(&mut self, page_id: PageId, data: Vec<u8>, owner_node: u16, generation: u64, fetch_time: u64, vclock: VectorClock) {
        self.insert_slot(page_id, Slot { page_id, data, owner_node, generation, fetch_time, vclock, dirty: false, valid: true });
    }

    #[must_use]
    pub fn generation(&self, page_id: PageId) -> Option<u64> {
        self.index.get(&page_id).and_then(|&idx| self.slots[idx].as_ref()).map(|s| s.generation)
    }

    #[must_use]
    pub fn owner_node(&self, page_id: PageId) -> Option<u16> {
        self.index.get(&page_id).and_then(|&idx| self.slots[idx].as_ref()).map(|s| s.owner_node)
    }

    #[must_use]
    pub fn vclock(&self, page_id: PageId) -> Option<VectorClock> {
        self.index.get(&page_id).and_then(|&idx| self.slots[idx].as_ref()).map(|s| s.vclock.clone())
    }

    #[must_use]
    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.index.get(&page_id).and_then(|&idx| self.slots[idx].as_ref()).is_some_and(|s| s.dirty)
    }

    /// The bytes to write back if [`is_dirty`](Self::is_dirty) is true,
    /// without requiring a valid entry (an invalidated-but-dirty page
    /// still has data worth flushing).
    #[must_use]
    pub fn dirty_data(&self, page_id: PageId) -> Option<&[u8]> {
        let idx = *self.index.get(&page_id)?;
        let slot = self.slots[idx].as_ref()?;
        slot.dirty.then_some(slot.data.as_slice())
    }

    /// Mark an entry invalid without evicting its slot — the directory
    /// protocol requires a dirty page to be written back to its owner
    /// before the local copy actually disappears; `mark_invalid` is the
    /// soft half of that, `remove` the hard half once the flush is done.
    pub fn mark_invalid(&mut self, page_id: PageId) {
        if let Some(&idx) = self.index.get(&page_id) {
            self.slots[idx].as_mut().unwrap().valid = false;
        }
    }

    /// Remove a page outright (used once a write-back has completed, or
    /// for an unconditional revocation).
    pub fn remove(&mut self, page_id: PageId) -> Option<Vec<u8>> {
        let idx = self.index.remove(&page_id)?;
        self.detach(idx);
        let slot = self.slots[idx].take().unwrap();
        self.free.push(idx);
        Some(slot.data)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u16) -> PageId {
        AetherAddr::new(n, 0).unwrap()
    }

    #[test]
    fn insert_and_get_roundtrips() {
        let mut cache = PageCache::new(2, 64);
        cache.insert(addr(1), vec![1u8; 64]);
        assert!(cache.contains(addr(1)));
        assert_eq!(cache.get(addr(1)).unwrap(), vec![1u8; 64].as_slice());
    }

    #[test]
    fn eviction_removes_least_recently_used() {
        let mut cache = PageCache::new(2, 8);
        cache.insert(addr(1), vec![0u8; 8]);
        cache.insert(addr(2), vec![0u8; 8]);
        // Touch page 1 so page 2 becomes the LRU victim.
        cache.get(addr(1));
        let evicted = cache.insert(addr(3), vec![0u8; 8]);
        assert_eq!(evicted.unwrap().0, addr(2));
        assert!(cache.contains(addr(1)));
        assert!(cache.contains(addr(3)));
        assert!(!cache.contains(addr(2)));
    }

    #[test]
    fn remove_frees_the_slot_for_reuse() {
        let mut cache = PageCache::new(1, 8);
        cache.insert(addr(1), vec![0u8; 8]);
        cache.remove(addr(1));
        assert!(!cache.contains(addr(1)));
        assert!(cache.insert(addr(2), vec![0u8; 8]).is_none());
    }

    #[test]
    fn insert_meta_records_protocol_fields() {
        let mut cache = PageCache::new(2, 8);
        let mut vclock = VectorClock::new();
        vclock.set(5, 2);
        cache.insert_meta(addr(1), vec![0u8; 8], 5, 3, 100, vclock.clone());
        assert_eq!(cache.owner_node(addr(1)), Some(5));
        assert_eq!(cache.generation(addr(1)), Some(3));
        assert_eq!(cache.vclock(addr(1)).unwrap().entries(), vclock.entries());
        assert!(!cache.is_dirty(addr(1)));
    }

    #[test]
    fn get_mut_marks_the_entry_dirty() {
        let mut cache = PageCache::new(1, 8);
        cache.insert(addr(1), vec![0u8; 8]);
        cache.get_mut(addr(1)).unwrap()[0] = 9;
        assert!(cache.is_dirty(addr(1)));
        assert_eq!(cache.dirty_data(addr(1)), Some(vec![9u8, 0, 0, 0, 0, 0, 0, 0].as_slice()));
    }

    #[test]
    fn mark_invalid_hides_the_entry_without_evicting_it() {
        let mut cache = PageCache::new(1, 8);
        cache.insert(addr(1), vec![0u8; 8]);
        cache.get_mut(addr(1)).unwrap()[0] = 9;
        cache.mark_invalid(addr(1));
        assert!(!cache.contains(addr(1)));
        assert!(cache.get(addr(1)).is_none());
        // The dirty bytes are still retrievable for a write-back.
        assert_eq!(cache.dirty_data(addr(1)), Some(vec![9u8, 0, 0, 0, 0, 0, 0, 0].as_slice()));
    }
}
