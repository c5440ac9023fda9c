//! Request and response model.
//!
//! Requests arrive in-process from the driver; responses carry a formatted
//! log line, an optional body, and the id of the ring position that answered.
//! Nothing in the library prints: every response that must reach the user
//! goes through a [`ResponseSink`], so tests can capture output
//! deterministically.

use std::fmt;

/// A client request against a logical document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Replace the document's content wholesale. Deferred onto the owning
    /// server's task queue.
    Edit { name: String, content: String },
    /// Read the document's current content. Forces all pending edits on the
    /// owning server first.
    Get { name: String },
}

impl Request {
    /// The document name this request targets.
    pub fn doc_name(&self) -> &str {
        match self {
            Request::Edit { name, .. } | Request::Get { name } => name,
        }
    }
}

/// Outcome class recorded in a response's log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLog {
    /// The document was resident in the cache tier.
    Hit,
    /// The document was not cached; no eviction was needed to admit it.
    Miss,
    /// Admitting the document evicted the named LRU entry.
    Evict { evicted: String },
    /// The document exists nowhere on the server.
    Fault,
    /// An edit was deferred; `depth` is the queue depth after the enqueue
    /// attempt.
    LazyExec { depth: usize },
}

impl fmt::Display for ServerLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerLog::Hit => write!(f, "cache hit"),
            ServerLog::Miss => write!(f, "cache miss"),
            ServerLog::Evict { evicted } => write!(f, "cache miss; evicted {evicted}"),
            ServerLog::Fault => write!(f, "document not found"),
            ServerLog::LazyExec { depth } => write!(f, "queued; depth={depth}"),
        }
    }
}

/// Body returned when an edit is accepted onto the queue.
pub fn queued_body(name: &str) -> String {
    format!("EDIT {name}")
}

/// Body returned when an applied edit updated an existing document.
pub fn updated_body(name: &str) -> String {
    format!("document {name}")
}

/// Body returned when an applied edit created a new document.
pub fn created_body(name: &str) -> String {
    format!("new document {name}")
}

/// The unit of user-visible output.
///
/// Formats as the two-line host template:
///
/// ```text
/// Server <id> has received <body>
/// Server <id> <log>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Id of the ring position that answered (a replica id under virtual
    /// nodes).
    pub server_id: u32,
    /// Response body; absent on faults.
    pub body: Option<String>,
    /// Outcome log line.
    pub log: ServerLog,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Server {} has received {}",
            self.server_id,
            self.body.as_deref().unwrap_or_default()
        )?;
        writeln!(f, "Server {} {}", self.server_id, self.log)
    }
}

/// Destination for responses produced as side effects (queued edits applied
/// during a read, and during topology changes).
pub trait ResponseSink {
    fn emit(&mut self, response: &Response);
}

/// Sink that prints each response with the host template.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ResponseSink for StdoutSink {
    fn emit(&mut self, response: &Response) {
        print!("{response}");
    }
}

/// Collecting sink for tests.
impl ResponseSink for Vec<Response> {
    fn emit(&mut self, response: &Response) {
        self.push(response.clone());
    }
}
