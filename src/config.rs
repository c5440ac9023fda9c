//! Configuration structs for the store components.
//!
//! Each component is constructed from its config struct as the single entry
//! point: `LruCache::init(config)`, `Server::init(id, &config)`,
//! `LoadBalancer::init(config)`. Defaults wire in the hash primitives from
//! [`crate::hash`]; callers that inject their own hash functions must use the
//! same functions for every component of one balancer.

use core::num::NonZeroUsize;

use crate::hash::{self, DocHash, ServerHash};

/// Pending-edit queue depth; enqueueing onto a full queue drops the edit.
pub const TASK_QUEUE_DEPTH: usize = 1000;

/// Configuration for a single [`crate::lru::LruCache`].
#[derive(Debug, Clone, Copy)]
pub struct LruCacheConfig {
    /// Maximum number of resident entries. Also the bucket count; it does
    /// not need to be prime or a power of two.
    pub capacity: NonZeroUsize,
    /// Hash used for bucket selection.
    pub key_hash: DocHash,
}

impl LruCacheConfig {
    pub fn new(capacity: NonZeroUsize) -> Self {
        LruCacheConfig {
            capacity,
            key_hash: hash::hash_doc_name,
        }
    }
}

/// Configuration for a [`crate::server::Server`].
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Capacity of the document cache tier.
    pub cache_capacity: NonZeroUsize,
    /// Depth of the deferred-edit queue.
    pub queue_depth: usize,
    /// Hash shared by the cache tier and the routing layer.
    pub doc_hash: DocHash,
}

impl ServerConfig {
    pub fn new(cache_capacity: NonZeroUsize) -> Self {
        ServerConfig {
            cache_capacity,
            queue_depth: TASK_QUEUE_DEPTH,
            doc_hash: hash::hash_doc_name,
        }
    }
}

/// Configuration for a [`crate::balancer::LoadBalancer`].
#[derive(Debug, Clone, Copy)]
pub struct BalancerConfig {
    /// Place two extra ring positions per server to smooth the key
    /// distribution.
    pub enable_vnodes: bool,
    /// Hash over document names, shared with every server's cache.
    pub doc_hash: DocHash,
    /// Hash over server ids, fixing ring positions.
    pub server_hash: ServerHash,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        BalancerConfig {
            enable_vnodes: false,
            doc_hash: hash::hash_doc_name,
            server_hash: hash::hash_server_id,
        }
    }
}

impl BalancerConfig {
    pub fn with_vnodes() -> Self {
        BalancerConfig {
            enable_vnodes: true,
            ..Default::default()
        }
    }
}
