//! Object pooling for nodes and entries
//!
//! Live objects sit in a generational slot map, so a key that outlived its
//! object never resolves to whatever reuses the slot. Released objects that
//! implement [`Recycle`] keep their heap buffers on a free list and are
//! handed back out by [`ObjectPool::acquire`].

use std::ops::{Index, IndexMut};

use slotmap::{Key, SlotMap};

/// Spare objects kept around when no capacity hint is given
const DEFAULT_SPARE_LIMIT: usize = 64;

/// Reset hook for pooled objects
pub trait Recycle {
    /// Clear the object for reuse, keeping any allocations
    fn recycle(&mut self);
}

/// Usage counters for a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects currently handed out
    pub live: usize,
    /// Recycled objects waiting on the free list
    pub spare: usize,
    /// Total objects handed out
    pub acquired: u64,
    /// Objects handed out from the free list instead of freshly built
    pub reused: u64,
    /// Total objects returned
    pub released: u64,
}

/// Free-list recycler backed by a generational arena
#[derive(Debug, Clone)]
pub struct ObjectPool<K: Key, V> {
    live: SlotMap<K, V>,
    spare: Vec<V>,
    spare_limit: usize,
    acquired: u64,
    reused: u64,
    released: u64,
}

impl<K: Key, V> ObjectPool<K, V> {
    /// Create a pool with room for `capacity` live objects
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            live: SlotMap::with_capacity_and_key(capacity),
            spare: Vec::new(),
            spare_limit: capacity.max(DEFAULT_SPARE_LIMIT),
            acquired: 0,
            reused: 0,
            released: 0,
        }
    }

    /// Store a new object and return its key
    pub fn insert(&mut self, value: V) -> K {
        self.acquired += 1;
        self.live.insert(value)
    }

    /// Remove an object and hand it back to the caller
    ///
    /// Returns `None` for a key that was already released.
    pub fn take(&mut self, key: K) -> Option<V> {
        let value = self.live.remove(key)?;
        self.released += 1;
        Some(value)
    }

    /// Get an object by key
    pub fn get(&self, key: K) -> Option<&V> {
        self.live.get(key)
    }

    /// Get a mutable reference to an object by key
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.live.get_mut(key)
    }

    /// Check whether a key still refers to a live object
    pub fn contains_key(&self, key: K) -> bool {
        self.live.contains_key(key)
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Check if no objects are live
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Iterate over live objects
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.live.iter()
    }

    /// Remove every live object, yielding them
    pub fn drain(&mut self) -> impl Iterator<Item = (K, V)> + '_ {
        self.released += self.live.len() as u64;
        self.live.drain()
    }

    /// Current usage counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            live: self.live.len(),
            spare: self.spare.len(),
            acquired: self.acquired,
            reused: self.reused,
            released: self.released,
        }
    }
}

impl<K: Key, V: Recycle + Default> ObjectPool<K, V> {
    /// Hand out an object, reusing a recycled one when available
    pub fn acquire(&mut self, init: impl FnOnce(&mut V)) -> K {
        let mut value = if let Some(value) = self.spare.pop() {
            self.reused += 1;
            value
        } else {
            V::default()
        };
        init(&mut value);
        self.insert(value)
    }

    /// Return an object to the pool
    ///
    /// Returns `false` if the key was already released.
    pub fn release(&mut self, key: K) -> bool {
        let Some(mut value) = self.take(key) else {
            return false;
        };
        value.recycle();
        if self.spare.len() < self.spare_limit {
            self.spare.push(value);
        }
        true
    }
}

impl<K: Key, V> Index<K> for ObjectPool<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &V {
        &self.live[key]
    }
}

impl<K: Key, V> IndexMut<K> for ObjectPool<K, V> {
    fn index_mut(&mut self, key: K) -> &mut V {
        &mut self.live[key]
    }
}
