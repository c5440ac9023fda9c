//! Bounded document cache with LRU eviction.
//!
//! # Structure
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         LruCache                              │
//! │                                                               │
//! │  buckets: Vec<Vec<*Node>>        RecencyList                  │
//! │  ┌───────────────────┐          ┌────────────────────────┐    │
//! │  │ hash(k) % C ──────┼────────▶ │ MRU ◀──▶ ... ◀──▶ LRU  │    │
//! │  │ chain per bucket  │          │ front            back  │    │
//! │  └───────────────────┘          └────────────────────────┘    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The recency list owns every `(key, value)` entry; each bucket chain holds
//! a raw pointer into the list for the keys that hash to it. An entry is
//! therefore reachable through exactly one bucket chain and exactly one list
//! node, and the two must stay in bijection under every mutation.
//!
//! Bucket selection is `hash(key) mod capacity` with an injected hash; the
//! capacity is an arbitrary positive count (not required to be prime or a
//! power of two) and doubles as the bucket count.
//!
//! # Operations
//!
//! | Operation | Action | Time |
//! |-----------|--------|------|
//! | `get`     | promote to MRU on hit | O(chain) |
//! | `put`     | update-and-promote, or insert at MRU evicting the LRU entry when full | O(chain) |
//! | `remove`  | unlink from chain and list | O(chain) |
//!
//! A `put` that updates an existing key never evicts; a `put` that inserts
//! into a full cache evicts exactly once, and the evicted key is handed back
//! to the caller.

use core::borrow::Borrow;
use core::num::NonZeroUsize;
use std::fmt;

use crate::config::LruCacheConfig;
use crate::list::{Node, RecencyList};
use crate::metrics::CacheStats;

/// A cached `(key, value)` pair, owned by its recency-list node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> CacheEntry<K, V> {
    fn new(key: K, value: V) -> Self {
        CacheEntry { key, value }
    }
}

/// Outcome of [`LruCache::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult<K> {
    /// True if a new entry was inserted; false if an existing key was
    /// updated in place.
    pub inserted: bool,
    /// Key evicted to make room. The caller owns it from here on. Always
    /// `None` on update.
    pub evicted: Option<K>,
}

/// Fixed-capacity key-value cache evicting the least recently used entry.
///
/// # Safety
///
/// The bucket chains store raw pointers into `order`. A pointer is valid
/// exactly as long as its node is linked; every path that removes a node
/// (eviction, `remove`) drops the chain entry in the same call.
pub struct LruCache<K, V> {
    config: LruCacheConfig,
    buckets: Vec<Vec<*mut Node<CacheEntry<K, V>>>>,
    order: RecencyList<CacheEntry<K, V>>,
    stats: CacheStats,
}

// SAFETY: the cache owns all nodes the bucket pointers refer to, and every
// mutation requires `&mut self`; there is no shared-state aliasing to race
// on when the whole cache moves to another thread.
unsafe impl<K: Send, V: Send> Send for LruCache<K, V> {}

impl<K, V> LruCache<K, V>
where
    K: Eq + AsRef<[u8]>,
{
    /// Creates a cache from its configuration.
    pub fn init(config: LruCacheConfig) -> Self {
        let capacity = config.capacity.get();
        LruCache {
            config,
            buckets: (0..capacity).map(|_| Vec::new()).collect(),
            order: RecencyList::new(),
            stats: CacheStats::default(),
        }
    }

    /// Maximum number of resident entries.
    #[inline]
    pub fn cap(&self) -> NonZeroUsize {
        self.config.capacity
    }

    /// Current number of resident entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// True when the next insert of a new key will evict.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.cap().get()
    }

    /// Access counters for this cache.
    #[inline]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn bucket_of(&self, key_bytes: &[u8]) -> usize {
        (self.config.key_hash)(key_bytes) as usize % self.buckets.len()
    }

    /// Position of `key`'s node within its bucket chain.
    fn chain_position<Q>(&self, bucket: usize, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.buckets[bucket]
            .iter()
            // SAFETY: chain pointers are linked nodes by the struct
            // invariant.
            .position(|&node| unsafe { (*node).value() }.key.borrow() == key)
    }

    /// Looks up `key`, promoting it to most-recently-used on a hit.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq + AsRef<[u8]>,
    {
        let bucket = self.bucket_of(key.as_ref());
        match self.chain_position(bucket, key) {
            Some(pos) => {
                let node = self.buckets[bucket][pos];
                self.stats.record_hit();
                // SAFETY: node came out of a bucket chain, so it is linked
                // into `order`; the returned borrow is tied to `&mut self`.
                unsafe {
                    self.order.move_to_front(node);
                    Some(&(*node).value().value)
                }
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Inserts or updates `key`.
    ///
    /// Updating an existing key replaces its value, promotes it, and never
    /// evicts. Inserting into a full cache first evicts the LRU entry and
    /// returns its key to the caller.
    pub fn put(&mut self, key: K, value: V) -> PutResult<K> {
        let bucket = self.bucket_of(key.as_ref());

        if let Some(pos) = self.chain_position(bucket, &key) {
            let node = self.buckets[bucket][pos];
            // SAFETY: node is linked (it came out of a bucket chain).
            unsafe {
                (*node).value_mut().value = value;
                self.order.move_to_front(node);
            }
            return PutResult {
                inserted: false,
                evicted: None,
            };
        }

        let mut evicted = None;
        if self.is_full() {
            // Drop the chain reference before freeing the node so no
            // dangling pointer is ever dereferenced.
            let victim = self.order.back_node().expect("full cache has an LRU entry");
            // SAFETY: victim is the linked LRU node.
            let victim_bucket = self.bucket_of(unsafe { (*victim).value() }.key.as_ref());
            let chain = &mut self.buckets[victim_bucket];
            let pos = chain
                .iter()
                .position(|&node| node == victim)
                .expect("LRU entry is chained in its bucket");
            chain.swap_remove(pos);
            let entry = self.order.pop_back().expect("full cache has an LRU entry");
            self.stats.record_eviction();
            evicted = Some(entry.key);
        }

        let node = self.order.push_front(CacheEntry::new(key, value));
        self.buckets[bucket].push(node);
        self.stats.record_insertion();
        PutResult {
            inserted: true,
            evicted,
        }
    }

    /// Removes `key`, returning its value. No-op when absent.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq + AsRef<[u8]>,
    {
        let bucket = self.bucket_of(key.as_ref());
        let pos = self.chain_position(bucket, key)?;
        let node = self.buckets[bucket].swap_remove(pos);
        // SAFETY: node was chained, so it is linked into `order`, and its
        // chain reference is gone.
        let entry = unsafe { self.order.unlink(node) };
        Some(entry.value)
    }

    /// Resident keys from most- to least-recently-used.
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> {
        self.order.iter().map(|entry| &entry.key)
    }
}

impl<K, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.config.capacity)
            .field("len", &self.order.len())
            .finish()
    }
}
