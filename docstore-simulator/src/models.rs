// Data models for script replay

use std::path::PathBuf;

use docstore_rs::protocol::Request;
use serde::Serialize;

/// One parsed script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bring a server with the given id and cache capacity into the ring.
    AddServer { id: u32, cache_capacity: usize },
    /// Remove a server (and its virtual nodes) from the ring.
    RemoveServer { id: u32 },
    /// Forward a document request.
    Request(Request),
}

/// Configuration for a replay run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Script file, or a directory of script files replayed in name order.
    pub script: PathBuf,
    /// Place virtual nodes for every server.
    pub enable_vnodes: bool,
    /// Suppress response printing (summary and CSV export still happen).
    pub quiet: bool,
}

/// Tallies collected over a replay run.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    /// Commands executed.
    pub commands: usize,
    /// Edit requests forwarded.
    pub edits: usize,
    /// Get requests forwarded.
    pub gets: usize,
    /// Get requests answered with a fault.
    pub faults: usize,
    /// Servers added.
    pub joins: usize,
    /// Servers removed.
    pub leaves: usize,
    /// Requests dropped because no server was in the ring.
    pub unroutable: usize,
}

/// CSV export row for one server's statistics.
#[derive(Debug, Serialize)]
pub struct ServerStatsRow {
    pub server_id: u32,
    pub documents: usize,
    pub cached_entries: usize,
    pub cache_capacity: usize,
    pub pending_edits: usize,
    pub cache_lookups: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
    pub cache_hit_rate: f64,
}
