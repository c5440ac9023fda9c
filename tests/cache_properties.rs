//! Property tests for the cache tier.
//!
//! Drives the cache with random operation sequences against a naive
//! reference model (a vector ordered most- to least-recently-used) and
//! checks that every observable outcome and the full recency order agree.
//! This is the test that guards the bucket-chain / recency-list bijection:
//! any lost or doubled back-reference shows up as a divergence from the
//! model.

use std::num::NonZeroUsize;

use proptest::prelude::*;

use docstore_rs::config::LruCacheConfig;
use docstore_rs::LruCache;

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u8),
    Get(u8),
    Remove(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, any::<u8>()).prop_map(|(k, v)| Op::Put(k, v)),
        (0u8..8).prop_map(Op::Get),
        (0u8..8).prop_map(Op::Remove),
    ]
}

/// MRU-first reference model of an LRU cache.
#[derive(Debug, Default)]
struct Model {
    entries: Vec<(String, String)>,
    capacity: usize,
}

impl Model {
    fn new(capacity: usize) -> Self {
        Model {
            entries: Vec::new(),
            capacity,
        }
    }

    fn get(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        let entry = self.entries.remove(pos);
        let value = entry.1.clone();
        self.entries.insert(0, entry);
        Some(value)
    }

    /// Returns (inserted, evicted_key).
    fn put(&mut self, key: String, value: String) -> (bool, Option<String>) {
        if let Some(pos) = self.entries.iter().position(|(k, _)| *k == key) {
            self.entries.remove(pos);
            self.entries.insert(0, (key, value));
            return (false, None);
        }
        let mut evicted = None;
        if self.entries.len() == self.capacity {
            evicted = self.entries.pop().map(|(k, _)| k);
        }
        self.entries.insert(0, (key, value));
        (true, evicted)
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }
}

proptest! {
    #[test]
    fn test_cache_matches_reference_model(
        capacity in 1usize..5,
        ops in proptest::collection::vec(op_strategy(), 1..200),
    ) {
        let mut cache: LruCache<String, String> =
            LruCache::init(LruCacheConfig::new(NonZeroUsize::new(capacity).unwrap()));
        let mut model = Model::new(capacity);

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    let key = format!("doc-{k}");
                    let value = format!("v{v}");
                    let result = cache.put(key.clone(), value.clone());
                    let (inserted, evicted) = model.put(key, value);
                    prop_assert_eq!(result.inserted, inserted);
                    prop_assert_eq!(result.evicted, evicted);
                }
                Op::Get(k) => {
                    let key = format!("doc-{k}");
                    let got = cache.get(key.as_str()).cloned();
                    prop_assert_eq!(got, model.get(&key));
                }
                Op::Remove(k) => {
                    let key = format!("doc-{k}");
                    let removed = cache.remove(key.as_str());
                    prop_assert_eq!(removed, model.remove(&key));
                }
            }

            // Size bound and full recency agreement after every step.
            prop_assert!(cache.len() <= capacity);
            prop_assert_eq!(cache.len(), model.entries.len());
            let order: Vec<&str> = cache.keys_by_recency().map(String::as_str).collect();
            prop_assert_eq!(order, model.keys());
        }
    }
}
