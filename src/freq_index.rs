//! Frequency-ordered entry storage.
//!
//! The O(1) approximate-LFU core. Entries live directly in this structure:
//! a slab of slots addressed by stable [`EntryId`] handles, threaded into a
//! doubly linked list of frequency buckets. A hash map from frequency value
//! to bucket gives O(1) bucket lookup, and `min_freq` tracks the lowest
//! occupied bucket so the eviction candidate is always one hop away.
//!
//! ## Architecture
//!
//! ```text
//!   slots (stable EntryId handles)          buckets (ascending frequency)
//!
//!   0: Occupied ◄──────────────┐            min_freq = 1
//!   1: Vacant ──┐ (free chain) │                │
//!   2: Occupied │◄─────────┐   │                ▼
//!   3: Vacant ◄─┘          │   │            ┌─────────┐      ┌─────────┐
//!      │                   │   └─ head ──── │ freq: 1 │ ───► │ freq: 3 │
//!      ▼                   └────── tail ─── │         │ ◄─── │         │
//!   free_head = 3                           └─────────┘      └─────────┘
//! ```
//!
//! Vacant slots form an intrusive free list: each one stores the index of
//! the next, so insertion never allocates while a hole exists and a handle
//! stays valid until its entry is removed (after which the slot, and the
//! numeric id, may be recycled).
//!
//! Within a bucket, entries are ordered by the time of the operation that
//! last moved them into that bucket: inserts and promotions append at the
//! tail, so the head is the oldest resident and is the one evicted on
//! `pop_min`. A bucket that empties is unlinked immediately; no empty
//! bucket survives any operation.
//!
//! Frequencies start at 1 and saturate at `u64::MAX`: touching a saturated
//! entry succeeds without relinking it, so unbounded access counts cannot
//! corrupt the structure.

use rustc_hash::FxHashMap;

/// Stable handle to a resident entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u32);

impl EntryId {
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Node<T> {
    data: T,
    freq: u64,
    prev: Option<EntryId>,
    next: Option<EntryId>,
}

#[derive(Debug)]
enum Slot<T> {
    Occupied(Node<T>),
    Vacant { next_free: Option<u32> },
}

#[derive(Debug, Default)]
struct Bucket {
    /// Oldest entry in this bucket; evicted first.
    head: Option<EntryId>,
    /// Most recently inserted/promoted entry.
    tail: Option<EntryId>,
    prev: Option<u64>,
    next: Option<u64>,
}

/// Frequency-bucketed storage for payloads of type `T`.
///
/// Callers keep the [`EntryId`] returned from [`insert`] (typically in an
/// external key index) and reach payloads with [`get`]/[`get_mut`].
///
/// [`insert`]: FreqIndex::insert
/// [`get`]: FreqIndex::get
/// [`get_mut`]: FreqIndex::get_mut
#[derive(Debug)]
pub struct FreqIndex<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
    buckets: FxHashMap<u64, Bucket>,
    min_freq: u64,
}

impl<T> FreqIndex<T> {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
            buckets: FxHashMap::default(),
            min_freq: 0,
        }
    }

    /// Creates an empty index with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
            buckets: FxHashMap::default(),
            min_freq: 0,
        }
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The smallest occupied frequency, or `None` when empty.
    pub fn min_freq(&self) -> Option<u64> {
        (self.min_freq != 0).then_some(self.min_freq)
    }

    /// Shared access to an entry's payload.
    pub fn get(&self, id: EntryId) -> Option<&T> {
        self.node(id).map(|node| &node.data)
    }

    /// Mutable access to an entry's payload.
    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut T> {
        self.node_mut(id).map(|node| &mut node.data)
    }

    /// An entry's current frequency.
    pub fn freq(&self, id: EntryId) -> Option<u64> {
        self.node(id).map(|node| node.freq)
    }

    /// Stores a fresh entry with frequency 1 at the tail of bucket 1.
    pub fn insert(&mut self, data: T) -> EntryId {
        let id = self.alloc(Node {
            data,
            freq: 1,
            prev: None,
            next: None,
        });

        if !self.buckets.contains_key(&1) {
            let next = (self.min_freq != 0).then_some(self.min_freq);
            self.link_bucket(1, None, next);
        }
        self.push_tail(1, id);
        self.min_freq = 1;
        id
    }

    /// Bumps an entry's frequency by one (saturating) and moves it to the
    /// tail of the next bucket. Returns the new frequency.
    ///
    /// An entry already at `u64::MAX` keeps its frequency and its position.
    pub fn touch(&mut self, id: EntryId) -> Option<u64> {
        let freq = self.node(id)?.freq;
        if freq == u64::MAX {
            return Some(freq);
        }
        let next_freq = freq + 1;

        let (bucket_prev, bucket_next) = {
            let bucket = self.buckets.get(&freq)?;
            (bucket.prev, bucket.next)
        };

        self.unlink(freq, id)?;
        let emptied = self.bucket_is_empty(freq);
        if emptied {
            self.unlink_bucket(freq, bucket_prev, bucket_next);
            if self.min_freq == freq {
                self.min_freq = bucket_next.unwrap_or(0);
            }
        }

        if !self.buckets.contains_key(&next_freq) {
            let prev = if emptied { bucket_prev } else { Some(freq) };
            self.link_bucket(next_freq, prev, bucket_next);
        }

        if let Some(node) = self.node_mut(id) {
            node.freq = next_freq;
        }
        self.push_tail(next_freq, id);
        if self.min_freq == 0 || next_freq < self.min_freq {
            self.min_freq = next_freq;
        }

        Some(next_freq)
    }

    /// Unlinks an entry and returns its payload, collapsing its bucket if
    /// it was the last resident.
    pub fn remove(&mut self, id: EntryId) -> Option<T> {
        let freq = self.node(id)?.freq;
        let (bucket_prev, bucket_next) = {
            let bucket = self.buckets.get(&freq)?;
            (bucket.prev, bucket.next)
        };

        self.unlink(freq, id)?;
        if self.bucket_is_empty(freq) {
            self.unlink_bucket(freq, bucket_prev, bucket_next);
            if self.min_freq == freq {
                self.min_freq = bucket_next.unwrap_or(0);
            }
        }

        self.dealloc(id).map(|node| node.data)
    }

    /// Handle of the eviction candidate: the oldest entry in the
    /// lowest-frequency bucket.
    pub fn peek_min(&self) -> Option<EntryId> {
        if self.min_freq == 0 {
            return None;
        }
        self.buckets.get(&self.min_freq)?.head
    }

    /// Removes and returns the eviction candidate's payload.
    pub fn pop_min(&mut self) -> Option<T> {
        let id = self.peek_min()?;
        self.remove(id)
    }

    /// Drops every entry and bucket.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.len = 0;
        self.buckets.clear();
        self.min_freq = 0;
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        // Slab accounting: the free chain visits every vacant slot exactly
        // once and never touches an occupied one.
        let mut vacant_seen = 0usize;
        let mut cursor = self.free_head;
        while let Some(idx) = cursor {
            assert!(vacant_seen < self.slots.len(), "free chain cycles");
            match &self.slots[idx as usize] {
                Slot::Vacant { next_free } => cursor = *next_free,
                Slot::Occupied(_) => panic!("free chain points at an occupied slot"),
            }
            vacant_seen += 1;
        }
        let occupied = self
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Occupied(_)))
            .count();
        assert_eq!(occupied, self.len);
        assert_eq!(self.slots.len(), occupied + vacant_seen);

        if self.is_empty() {
            assert!(self.buckets.is_empty());
            assert_eq!(self.min_freq, 0);
            return;
        }

        assert!(self.min_freq > 0);
        assert!(self.buckets.contains_key(&self.min_freq));

        let mut total = 0usize;
        for (&freq, bucket) in &self.buckets {
            assert!(freq >= self.min_freq);
            assert!(bucket.head.is_some());
            assert!(bucket.tail.is_some());

            if let Some(prev) = bucket.prev {
                assert!(prev < freq);
                assert_eq!(self.buckets[&prev].next, Some(freq));
            } else {
                assert_eq!(self.min_freq, freq);
            }
            if let Some(next) = bucket.next {
                assert!(next > freq);
                assert_eq!(self.buckets[&next].prev, Some(freq));
            }

            let mut current = bucket.head;
            let mut last = None;
            while let Some(id) = current {
                let node = self.node(id).expect("bucket references a vacant slot");
                assert_eq!(node.freq, freq);
                assert_eq!(node.prev, last);
                last = Some(id);
                current = node.next;
                total += 1;
            }
            assert_eq!(bucket.tail, last);
        }
        assert_eq!(total, self.len);
    }

    fn node(&self, id: EntryId) -> Option<&Node<T>> {
        match self.slots.get(id.idx())? {
            Slot::Occupied(node) => Some(node),
            Slot::Vacant { .. } => None,
        }
    }

    fn node_mut(&mut self, id: EntryId) -> Option<&mut Node<T>> {
        match self.slots.get_mut(id.idx())? {
            Slot::Occupied(node) => Some(node),
            Slot::Vacant { .. } => None,
        }
    }

    fn alloc(&mut self, node: Node<T>) -> EntryId {
        self.len += 1;
        match self.free_head {
            Some(idx) => {
                let slot = &mut self.slots[idx as usize];
                self.free_head = match slot {
                    Slot::Vacant { next_free } => *next_free,
                    Slot::Occupied(_) => panic!("free chain points at an occupied slot"),
                };
                *slot = Slot::Occupied(node);
                EntryId(idx)
            }
            None => {
                self.slots.push(Slot::Occupied(node));
                EntryId((self.slots.len() - 1) as u32)
            }
        }
    }

    fn dealloc(&mut self, id: EntryId) -> Option<Node<T>> {
        let slot = self.slots.get_mut(id.idx())?;
        match std::mem::replace(slot, Slot::Vacant { next_free: self.free_head }) {
            Slot::Occupied(node) => {
                self.free_head = Some(id.0);
                self.len -= 1;
                Some(node)
            }
            Slot::Vacant { next_free } => {
                // Already vacant; restore its original chain link.
                *slot = Slot::Vacant { next_free };
                None
            }
        }
    }

    fn bucket_is_empty(&self, freq: u64) -> bool {
        self.buckets
            .get(&freq)
            .is_none_or(|bucket| bucket.head.is_none())
    }

    fn link_bucket(&mut self, freq: u64, prev: Option<u64>, next: Option<u64>) {
        self.buckets.insert(
            freq,
            Bucket {
                head: None,
                tail: None,
                prev,
                next,
            },
        );
        if let Some(prev) = prev
            && let Some(bucket) = self.buckets.get_mut(&prev)
        {
            bucket.next = Some(freq);
        }
        if let Some(next) = next
            && let Some(bucket) = self.buckets.get_mut(&next)
        {
            bucket.prev = Some(freq);
        }
    }

    fn unlink_bucket(&mut self, freq: u64, prev: Option<u64>, next: Option<u64>) {
        if let Some(prev) = prev
            && let Some(bucket) = self.buckets.get_mut(&prev)
        {
            bucket.next = next;
        }
        if let Some(next) = next
            && let Some(bucket) = self.buckets.get_mut(&next)
        {
            bucket.prev = prev;
        }
        self.buckets.remove(&freq);
    }

    fn push_tail(&mut self, freq: u64, id: EntryId) {
        let bucket = self.buckets.get_mut(&freq).expect("bucket missing");
        let old_tail = bucket.tail;
        if let Some(node) = self.node_mut(id) {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail {
            Some(old_tail) => {
                if let Some(node) = self.node_mut(old_tail) {
                    node.next = Some(id);
                }
                let bucket = self.buckets.get_mut(&freq).expect("bucket missing");
                bucket.tail = Some(id);
            }
            None => {
                let bucket = self.buckets.get_mut(&freq).expect("bucket missing");
                bucket.head = Some(id);
                bucket.tail = Some(id);
            }
        }
    }

    fn unlink(&mut self, freq: u64, id: EntryId) -> Option<()> {
        let (prev, next) = {
            let node = self.node(id)?;
            (node.prev, node.next)
        };

        match prev {
            Some(prev) => {
                if let Some(node) = self.node_mut(prev) {
                    node.next = next;
                }
            }
            None => {
                if let Some(bucket) = self.buckets.get_mut(&freq) {
                    bucket.head = next;
                }
            }
        }
        match next {
            Some(next) => {
                if let Some(node) = self.node_mut(next) {
                    node.prev = prev;
                }
            }
            None => {
                if let Some(bucket) = self.buckets.get_mut(&freq) {
                    bucket.tail = prev;
                }
            }
        }

        if let Some(node) = self.node_mut(id) {
            node.prev = None;
            node.next = None;
        }
        Some(())
    }
}

impl<T> Default for FreqIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
