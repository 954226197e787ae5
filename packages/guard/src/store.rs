//! Expiring keyed state
//!
//! [`KeyedStore`] maps a `(namespace, HashedKey)` pair to a small record. It
//! is backed by a [`DashMap`], which shards entries across independently
//! locked segments: callers on unrelated keys do not contend, while every
//! read-check-write on one key runs under that key's shard lock through
//! [`KeyedStore::mutate`]. Sweeps go through `retain`, which takes the same
//! shard locks, so eviction never races a concurrent increment.
//!
//! Rate-limit counters are exposed through the [`CounterStore`] trait so an
//! external shared store can stand in for the in-memory one.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use crate::clock::saturating_add;
use crate::hasher::HashedKey;

/// Storage key: the namespace keeps buckets apart even when two callers hash
/// to the same key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    namespace: String,
    key: HashedKey,
}

impl StoreKey {
    pub fn new(namespace: impl Into<String>, key: HashedKey) -> Self {
        Self {
            namespace: namespace.into(),
            key,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self) -> &HashedKey {
        &self.key
    }
}

/// Records that can be evicted by a sweep
pub trait Expiring {
    /// Whether the record may be dropped at `now`, given a staleness horizon
    fn is_stale(&self, now: DateTime<Utc>, horizon: Duration) -> bool;
}

/// Sharded map of expiring records
#[derive(Debug)]
pub struct KeyedStore<V> {
    entries: DashMap<StoreKey, V>,
}

impl<V> Default for KeyedStore<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V: Clone> KeyedStore<V> {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the slot for `key` while holding the key's shard lock
    ///
    /// The slot is `None` when no record exists. Whatever `f` leaves in the
    /// slot is written back: `Some` stores it, `None` deletes the entry.
    pub fn mutate<R>(&self, key: StoreKey, f: impl FnOnce(&mut Option<V>) -> R) -> R {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let mut slot = Some(occupied.get().clone());
                let result = f(&mut slot);
                match slot {
                    Some(value) => {
                        occupied.insert(value);
                    }
                    None => {
                        occupied.remove();
                    }
                }
                result
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                let result = f(&mut slot);
                if let Some(value) = slot {
                    vacant.insert(value);
                }
                result
            }
        }
    }

    /// Snapshot of the record for `key`
    pub fn get(&self, key: &StoreKey) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Delete the record for `key`, returning it
    pub fn remove(&self, key: &StoreKey) -> Option<V> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    /// Number of records, including logically expired ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Expiring> KeyedStore<V> {
    /// Drop every record that is stale at `now`, returning how many went
    pub fn sweep_stale(&self, now: DateTime<Utc>, horizon: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, value| !value.is_stale(now, horizon));
        before.saturating_sub(self.entries.len())
    }
}

/// Fixed-window counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterEntry {
    /// Events counted in the current window
    pub count: u32,
    /// When the window closes
    pub reset_at: DateTime<Utc>,
}

impl CounterEntry {
    fn open(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: saturating_add(now, window),
        }
    }

    /// A window is over once `now` reaches `reset_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.reset_at
    }
}

impl Expiring for CounterEntry {
    fn is_stale(&self, now: DateTime<Utc>, horizon: Duration) -> bool {
        now >= saturating_add(self.reset_at, horizon)
    }
}

/// Errors raised by a counter store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not be reached
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Backend for rate-limit counters
pub trait CounterStore: Send + Sync + 'static {
    /// Atomically open a fresh window (`count = 1`) when no live entry exists
    /// for `(namespace, key)`, or increment the live one, returning the result
    fn increment_or_create(
        &self,
        namespace: &str,
        key: &HashedKey,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<CounterEntry, StoreError>;

    /// Remove entries whose window closed more than `max_age` before `now`
    fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> Result<usize, StoreError>;

    /// Number of tracked entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process counter store
pub type InMemoryCounterStore = KeyedStore<CounterEntry>;

impl CounterStore for KeyedStore<CounterEntry> {
    fn increment_or_create(
        &self,
        namespace: &str,
        key: &HashedKey,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<CounterEntry, StoreError> {
        let entry = self.mutate(StoreKey::new(namespace, key.clone()), |slot| {
            if let Some(live) = slot.as_mut().filter(|entry| !entry.is_expired(now)) {
                live.count = live.count.saturating_add(1);
                return *live;
            }
            let fresh = CounterEntry::open(now, window);
            *slot = Some(fresh);
            fresh
        });
        Ok(entry)
    }

    fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> Result<usize, StoreError> {
        Ok(self.sweep_stale(now, max_age))
    }

    fn len(&self) -> usize {
        KeyedStore::len(self)
    }
}
