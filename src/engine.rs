//! # Frequency-ordered cache engine
//!
//! Capacity-bounded key/value cache with approximate-LFU eviction, lazy
//! per-entry TTL, and synchronous lifecycle events.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │                         FreqCache<V>                              │
//!   │                                                                   │
//!   │   Mutex<State> ──┬── index: FxHashMap<Box<str>, EntryId>          │
//!   │                  ├── freq:  FreqIndex<Entry<V>>                   │
//!   │                  │          (buckets ascending by access count;   │
//!   │                  │           oldest-first inside each bucket)     │
//!   │                  └── counters                                     │
//!   │                                                                   │
//!   │   clock: Arc<dyn Clock>     (monotonic; injectable for tests)     │
//!   │   events: EventBus<V>       (delivered under the state lock)      │
//!   └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Method      | Complexity | Eviction | Events                          |
//! |-------------|------------|----------|---------------------------------|
//! | `create`    | O(1)       | may pop the min-freq bucket head | Evicted then Added |
//! | `read`      | O(1)       | -        | Expired (on dead entry) only    |
//! | `update`    | O(1)       | -        | Updated, or Expired on dead entry |
//! | `delete`    | O(1)       | -        | Removed (even for dead entries) |
//!
//! ## Semantics
//!
//! - A fresh entry has frequency 1; every successful `read` adds one
//!   (saturating at `u64::MAX`, where further reads stop relinking).
//!   `update` never changes frequency or bucket position.
//! - Eviction takes the oldest entry of the lowest-frequency bucket: LFU
//!   with insertion age as the tie-break.
//! - Expiration is lazy. Nothing sweeps in the background; the first
//!   `read`/`update` past the deadline removes the entry and emits
//!   `Expired`. An explicit `delete` of a dead entry emits `Removed`
//!   because the caller asked for removal.
//! - `ttl_seconds = 0` means "expires now": the entry is dead to any
//!   subsequent access.
//! - Keys must be non-empty and not whitespace-only; invalid keys are
//!   rejected silently (no event, `false`/`None` return).
//!
//! ## Thread Safety
//!
//! All state sits behind one `parking_lot::Mutex`. Every operation takes it
//! for its full duration, event delivery included; reads take it too since
//! they relink frequency buckets. Operations are therefore linearizable
//! and events for a key appear in exactly the order the operations
//! serialized. Subscribers run under that lock: they must be quick and must
//! not re-enter the cache on the same thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::error::CacheError;
use crate::event::{CacheEvent, EventBus};
use crate::freq_index::{EntryId, FreqIndex};

/// Reason string attached to every eviction event.
pub const EVICTION_REASON: &str = "LFU: lowest frequency bucket, oldest entry";

/// One cached item. Frequency and bucket linkage live in the surrounding
/// [`FreqIndex`] node.
#[derive(Debug)]
struct Entry<V> {
    key: Box<str>,
    value: Arc<V>,
    created_at: Instant,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    inserts: u64,
    updates: u64,
    removes: u64,
    evictions: u64,
    expirations: u64,
}

/// Point-in-time snapshot of the engine's operation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub updates: u64,
    pub removes: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub len: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of validated reads that found a live entry. 0.0 when no
    /// reads have happened.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct State<V> {
    index: FxHashMap<Box<str>, EntryId>,
    freq: FreqIndex<Entry<V>>,
    counters: Counters,
}

/// Thread-safe LFU cache with per-entry TTL and lifecycle events.
///
/// # Example
///
/// ```
/// use freqcache::engine::FreqCache;
///
/// let cache = FreqCache::new(2).unwrap();
/// assert!(cache.create("a", 1, None));
/// assert!(cache.create("b", 2, None));
/// assert_eq!(cache.read("a").as_deref(), Some(&1));
///
/// // "b" is the least frequently used entry and gives way to "c".
/// assert!(cache.create("c", 3, None));
/// assert_eq!(cache.read("b"), None);
/// assert_eq!(cache.read("a").as_deref(), Some(&1));
/// ```
pub struct FreqCache<V> {
    state: Mutex<State<V>>,
    events: EventBus<V>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

impl<V> FreqCache<V> {
    /// Creates a cache bounded to `capacity` entries, using the system
    /// monotonic clock for TTL arithmetic.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Creates a cache with an injected [`Clock`], for deterministic
    /// expiration in tests.
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        if capacity < 1 {
            return Err(CacheError::InvalidCapacity {
                requested: capacity,
            });
        }
        Ok(Self {
            state: Mutex::new(State {
                index: FxHashMap::default(),
                freq: FreqIndex::with_capacity(capacity),
                counters: Counters::default(),
            }),
            events: EventBus::new(),
            clock,
            capacity,
        })
    }

    /// Stores a new entry. Returns `false` for an invalid key or a key that
    /// already exists (no event in either case).
    ///
    /// When the cache is full, the oldest entry of the lowest-frequency
    /// bucket is evicted first; its `Evicted` event precedes the `Added`
    /// event of the new entry.
    ///
    /// `ttl_seconds`: `None` never expires, `Some(0)` expires immediately,
    /// `Some(n)` expires `n` seconds from now.
    pub fn create(&self, key: &str, value: V, ttl_seconds: Option<u64>) -> bool {
        if !is_valid_key(key) {
            return false;
        }
        let mut state = self.state.lock();
        if state.index.contains_key(key) {
            return false;
        }

        if state.index.len() >= self.capacity
            && let Some(victim) = state.freq.pop_min()
        {
            state.index.remove(victim.key.as_ref());
            state.counters.evictions += 1;
            debug!(key = %victim.key, "evicted lowest-frequency entry");
            self.events
                .publish(&CacheEvent::evicted(victim.key.into(), EVICTION_REASON));
        }

        let now = self.clock.now();
        let expires_at = ttl_seconds.and_then(|secs| now.checked_add(Duration::from_secs(secs)));
        let value = Arc::new(value);
        let id = state.freq.insert(Entry {
            key: Box::from(key),
            value: Arc::clone(&value),
            created_at: now,
            expires_at,
        });
        state.index.insert(Box::from(key), id);
        state.counters.inserts += 1;
        self.events.publish(&CacheEvent::added(key.to_owned(), value));
        true
    }

    /// Fetches an entry's value, bumping its frequency.
    ///
    /// Returns `None` for invalid or missing keys. An entry past its
    /// deadline is removed here, emits `Expired`, and reads as `None`.
    pub fn read(&self, key: &str) -> Option<Arc<V>> {
        if !is_valid_key(key) {
            return None;
        }
        let mut state = self.state.lock();
        let Some(&id) = state.index.get(key) else {
            state.counters.misses += 1;
            return None;
        };

        let now = self.clock.now();
        if state.freq.get(id).is_some_and(|entry| entry.is_expired(now)) {
            state.counters.misses += 1;
            self.expire_entry(&mut state, id);
            return None;
        }

        state.freq.touch(id);
        state.counters.hits += 1;
        state.freq.get(id).map(|entry| Arc::clone(&entry.value))
    }

    /// Replaces an entry's value and, when `ttl_seconds` is given, its
    /// expiry (`Some(0)` expires now, `None` preserves the current expiry).
    ///
    /// Frequency and bucket position never change on update. Returns
    /// `false` for invalid, missing, or expired keys; an expired entry is
    /// removed and emits `Expired`.
    pub fn update(&self, key: &str, value: V, ttl_seconds: Option<u64>) -> bool {
        if !is_valid_key(key) {
            return false;
        }
        let mut state = self.state.lock();
        let Some(&id) = state.index.get(key) else {
            return false;
        };

        let now = self.clock.now();
        if state.freq.get(id).is_some_and(|entry| entry.is_expired(now)) {
            self.expire_entry(&mut state, id);
            return false;
        }

        let value = Arc::new(value);
        if let Some(entry) = state.freq.get_mut(id) {
            entry.value = Arc::clone(&value);
            if let Some(secs) = ttl_seconds {
                entry.expires_at = now.checked_add(Duration::from_secs(secs));
            }
        }
        state.counters.updates += 1;
        self.events
            .publish(&CacheEvent::updated(key.to_owned(), value));
        true
    }

    /// Removes an entry. Returns `false` for invalid or missing keys.
    ///
    /// Deleting an entry that happens to be expired still succeeds and
    /// emits `Removed`, not `Expired`: the caller's intent is removal.
    pub fn delete(&self, key: &str) -> bool {
        if !is_valid_key(key) {
            return false;
        }
        let mut state = self.state.lock();
        let Some(id) = state.index.remove(key) else {
            return false;
        };
        let Some(entry) = state.freq.remove(id) else {
            return false;
        };
        state.counters.removes += 1;
        self.events.publish(&CacheEvent::removed(entry.key.into()));
        true
    }

    /// Subscription access to the lifecycle event stream.
    pub fn events(&self) -> &EventBus<V> {
        &self.events
    }

    /// Current access count of a live entry, without bumping it.
    ///
    /// This is a peek: an expired entry reads as `None` but is left for the
    /// next `read`/`update` to reap.
    pub fn frequency(&self, key: &str) -> Option<u64> {
        if !is_valid_key(key) {
            return None;
        }
        let state = self.state.lock();
        let &id = state.index.get(key)?;
        let now = self.clock.now();
        if state.freq.get(id).is_some_and(|entry| entry.is_expired(now)) {
            return None;
        }
        state.freq.freq(id)
    }

    /// Time since an entry was created. A peek; expired entries still
    /// report their age until something reaps them.
    pub fn age(&self, key: &str) -> Option<Duration> {
        if !is_valid_key(key) {
            return None;
        }
        let state = self.state.lock();
        let &id = state.index.get(key)?;
        let entry = state.freq.get(id)?;
        Some(self.clock.now().saturating_duration_since(entry.created_at))
    }

    /// Remaining lifetime of an entry: `None` for missing keys and for
    /// entries without a deadline, `Duration::ZERO` once the deadline has
    /// passed.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        if !is_valid_key(key) {
            return None;
        }
        let state = self.state.lock();
        let &id = state.index.get(key)?;
        let entry = state.freq.get(id)?;
        entry
            .expires_at
            .map(|deadline| deadline.saturating_duration_since(self.clock.now()))
    }

    /// Number of resident entries (expired-but-unreaped entries included).
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Returns `true` if no entries are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every entry and resets nothing else. Emits no events; a bulk
    /// reset is not a per-item lifecycle transition.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.index.clear();
        state.freq.clear();
    }

    /// Snapshot of the operation counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.counters.hits,
            misses: state.counters.misses,
            inserts: state.counters.inserts,
            updates: state.counters.updates,
            removes: state.counters.removes,
            evictions: state.counters.evictions,
            expirations: state.counters.expirations,
            len: state.index.len(),
            capacity: self.capacity,
        }
    }

    fn expire_entry(&self, state: &mut State<V>, id: EntryId) {
        if let Some(entry) = state.freq.remove(id) {
            state.index.remove(entry.key.as_ref());
            state.counters.expirations += 1;
            trace!(key = %entry.key, "dropped expired entry on access");
            self.events.publish(&CacheEvent::expired(entry.key.into()));
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let state = self.state.lock();
        assert!(state.index.len() <= self.capacity);
        assert_eq!(state.index.len(), state.freq.len());
        for (key, &id) in &state.index {
            let entry = state.freq.get(id).expect("index points at dead slot");
            assert_eq!(entry.key.as_ref(), key.as_ref());
            assert!(state.freq.freq(id).is_some_and(|f| f >= 1));
        }
        state.freq.debug_validate_invariants();
    }
}

impl<V> std::fmt::Debug for FreqCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreqCache")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
