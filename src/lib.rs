//! # docstore-rs
//!
//! A distributed document store: a consistent-hashing load balancer routing
//! edit/retrieve requests over a set of servers, each owning a two-tier
//! store (bounded LRU cache over an unbounded local database) and a
//! deferred-edit queue drained lazily by reads.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        LoadBalancer                            │
//! │                                                                │
//! │   Ring (sorted positions)        stores: primary id → Server   │
//! │   ┌──────────────────────┐       ┌──────────────────────────┐  │
//! │   │ (hash, id) ... ──────┼─────▶ │ cache (LRU)              │  │
//! │   │ owner = first pos    │       │ db (unbounded map)       │  │
//! │   │ with hash > key hash │       │ task queue (FIFO, 1000)  │  │
//! │   └──────────────────────┘       └──────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Piece | Responsibility |
//! |-------|----------------|
//! | [`lru::LruCache`] | Bounded key-value store with recency eviction |
//! | [`server::Server`] | Two-tier store + EDIT/GET state machine |
//! | [`balancer::LoadBalancer`] | Ring maintenance, routing, key migration |
//!
//! ## Semantics in one paragraph
//!
//! An EDIT is enqueued on the owning server and acknowledged immediately; a
//! GET first applies every queued edit in arrival order (emitting each
//! edit's response through the injected [`protocol::ResponseSink`]) and then
//! reads, so a read always observes every edit that reached its server
//! before it. Adding or removing a server migrates exactly the documents
//! whose ring owner changed, flushing donor queues first; recipient caches
//! are warmed lazily.
//!
//! ## Example
//!
//! ```
//! use core::num::NonZeroUsize;
//! use docstore_rs::balancer::LoadBalancer;
//! use docstore_rs::config::BalancerConfig;
//! use docstore_rs::protocol::{Request, Response};
//!
//! let mut balancer = LoadBalancer::init(BalancerConfig::default());
//! let mut sink: Vec<Response> = Vec::new();
//! balancer.add_server(1, NonZeroUsize::new(16).unwrap(), &mut sink);
//!
//! let _ = balancer.forward(
//!     Request::Edit { name: "readme".into(), content: "hello".into() },
//!     &mut sink,
//! );
//! let response = balancer
//!     .forward(Request::Get { name: "readme".into() }, &mut sink)
//!     .unwrap();
//! assert_eq!(response.body.as_deref(), Some("hello"));
//! ```
//!
//! Everything is single-threaded and synchronous: requests are processed in
//! arrival order, no operation blocks, and topology changes complete before
//! their call returns.

/// Doubly linked recency list with sentinel nodes.
///
/// Internal infrastructure for the cache; exposes raw pointer handles that
/// require careful invariant maintenance.
pub(crate) mod list;

/// Bounded LRU cache: chained bucket table plus global recency index.
pub mod lru;

/// Cache access counters.
pub mod metrics;

/// Configuration structs for caches, servers, and the balancer.
pub mod config;

/// Injectable 32-bit hash primitives for document names and server ids.
pub mod hash;

/// Requests, responses, log/body templates, and the response sink.
pub mod protocol;

/// A single document server: cache tier, database, deferred-edit queue.
pub mod server;

/// Ring positions and owner resolution for consistent hashing.
pub mod ring;

/// The load balancer: routing, topology changes, key migration.
pub mod balancer;

pub use balancer::LoadBalancer;
pub use config::{BalancerConfig, LruCacheConfig, ServerConfig};
pub use lru::{LruCache, PutResult};
pub use protocol::{Request, Response, ResponseSink, ServerLog, StdoutSink};
pub use ring::{RingSlot, REPLICA_STRIDE};
pub use server::Server;
