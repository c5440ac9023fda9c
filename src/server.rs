//! A single document server: cache tier, local database, deferred edits.
//!
//! Each server owns a bounded [`LruCache`] in front of an unbounded local
//! database and a bounded FIFO queue of pending edits. Edits are not applied
//! on arrival: they are queued, and the next read against the server forces
//! every queued edit to run first (in arrival order), so a read always
//! observes all edits that reached its server before it.
//!
//! Servers know nothing about the ring. Responses are stamped with whatever
//! id the routing layer hands in, which under virtual nodes is the replica
//! position that received the request.

use core::num::NonZeroUsize;
use std::fmt;

use hashbrown::HashMap;

use crate::config::ServerConfig;
use crate::lru::LruCache;
use crate::protocol::{
    created_body, queued_body, updated_body, Request, Response, ResponseSink, ServerLog,
};

/// A deferred edit, owning its buffers until it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EditTask {
    name: String,
    content: String,
}

/// Bounded FIFO of pending edits.
///
/// Enqueueing onto a full queue drops the edit on the floor; well-formed
/// workloads never reach the bound.
#[derive(Debug)]
struct TaskQueue {
    items: std::collections::VecDeque<EditTask>,
    max: usize,
}

impl TaskQueue {
    fn new(max: usize) -> Self {
        TaskQueue {
            items: std::collections::VecDeque::with_capacity(max.min(64)),
            max,
        }
    }

    fn push(&mut self, task: EditTask) -> bool {
        if self.items.len() >= self.max {
            return false;
        }
        self.items.push_back(task);
        true
    }

    fn pop(&mut self) -> Option<EditTask> {
        self.items.pop_front()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// One server's storage and request state machine.
pub struct Server {
    id: u32,
    cache: LruCache<String, String>,
    db: HashMap<String, String>,
    tasks: TaskQueue,
}

impl Server {
    /// Creates an empty server with the given primary id.
    pub fn init(id: u32, config: &ServerConfig) -> Self {
        Server {
            id,
            cache: LruCache::init(crate::config::LruCacheConfig {
                capacity: config.cache_capacity,
                key_hash: config.doc_hash,
            }),
            db: HashMap::new(),
            tasks: TaskQueue::new(config.queue_depth),
        }
    }

    /// Primary id of this server.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Number of documents in the local database.
    pub fn document_count(&self) -> usize {
        self.db.len()
    }

    /// Number of edits waiting on the task queue.
    pub fn pending_edits(&self) -> usize {
        self.tasks.len()
    }

    /// Cache capacity of this server.
    pub fn cache_capacity(&self) -> NonZeroUsize {
        self.cache.cap()
    }

    /// The cache tier, for statistics reporting.
    pub fn cache(&self) -> &LruCache<String, String> {
        &self.cache
    }

    /// Runs the request state machine.
    ///
    /// EDIT enqueues and answers immediately with the queue depth; GET
    /// flushes the queue (emitting each applied edit's response through
    /// `sink`) and then reads. `reply_id` stamps every produced response.
    pub fn handle(
        &mut self,
        request: Request,
        reply_id: u32,
        sink: &mut dyn ResponseSink,
    ) -> Response {
        match request {
            Request::Edit { name, content } => {
                let body = queued_body(&name);
                if !self.tasks.push(EditTask { name, content }) {
                    log::warn!("server {}: task queue full, edit dropped", self.id);
                }
                Response {
                    server_id: reply_id,
                    body: Some(body),
                    log: ServerLog::LazyExec {
                        depth: self.tasks.len(),
                    },
                }
            }
            Request::Get { name } => {
                self.flush_tasks(reply_id, sink);
                self.get_document(&name, reply_id)
            }
        }
    }

    /// Applies every queued edit in FIFO order, emitting each response.
    pub fn flush_tasks(&mut self, reply_id: u32, sink: &mut dyn ResponseSink) {
        while let Some(task) = self.tasks.pop() {
            let response = self.apply_edit(task.name, task.content, reply_id);
            sink.emit(&response);
        }
    }

    /// Installs `content` as the new content of `name` in both tiers.
    ///
    /// The log distinguishes where the document was found (cache hit, cache
    /// miss, miss-with-eviction) and the body distinguishes update from
    /// creation.
    pub fn apply_edit(&mut self, name: String, content: String, reply_id: u32) -> Response {
        if self.cache.get(&name).is_some() {
            // Resident: refresh both tiers; an update never evicts.
            self.cache.put(name.clone(), content.clone());
            self.db.insert(name.clone(), content);
            return Response {
                server_id: reply_id,
                body: Some(updated_body(&name)),
                log: ServerLog::Hit,
            };
        }

        let existed = self.db.contains_key(&name);
        let put = self.cache.put(name.clone(), content.clone());
        self.db.insert(name.clone(), content);
        let body = if existed {
            updated_body(&name)
        } else {
            created_body(&name)
        };
        Response {
            server_id: reply_id,
            body: Some(body),
            log: match put.evicted {
                Some(evicted) => ServerLog::Evict { evicted },
                None => ServerLog::Miss,
            },
        }
    }

    /// Reads `name`, installing it into the cache on a database hit.
    pub fn get_document(&mut self, name: &str, reply_id: u32) -> Response {
        if let Some(content) = self.cache.get(name) {
            let content = content.clone();
            return Response {
                server_id: reply_id,
                body: Some(content),
                log: ServerLog::Hit,
            };
        }

        match self.db.get(name).cloned() {
            Some(content) => {
                let put = self.cache.put(name.to_owned(), content.clone());
                Response {
                    server_id: reply_id,
                    body: Some(content),
                    log: match put.evicted {
                        Some(evicted) => ServerLog::Evict { evicted },
                        None => ServerLog::Miss,
                    },
                }
            }
            None => {
                log::debug!("server {}: fault on document {name:?}", self.id);
                Response {
                    server_id: reply_id,
                    body: None,
                    log: ServerLog::Fault,
                }
            }
        }
    }

    /// All document names currently in the local database.
    ///
    /// The returned sequence is sized by actual iteration, never by a
    /// counter that could disagree with the map.
    pub fn document_names(&self) -> Vec<String> {
        self.db.keys().cloned().collect()
    }

    /// Hands a document over to another server: removes it from the
    /// database and invalidates the cache entry.
    pub fn take_document(&mut self, name: &str) -> Option<String> {
        let content = self.db.remove(name)?;
        let _ = self.cache.remove(name);
        Some(content)
    }

    /// Accepts a migrated document into the database only; the cache warms
    /// up lazily on first access.
    pub fn store_document(&mut self, name: String, content: String) {
        self.db.insert(name, content);
    }

    /// Consumes the server, yielding its remaining documents.
    pub fn into_documents(self) -> HashMap<String, String> {
        self.db
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("id", &self.id)
            .field("documents", &self.db.len())
            .field("cached", &self.cache.len())
            .field("pending_edits", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_server(id: u32, cache_capacity: usize) -> Server {
        let config = ServerConfig::new(NonZeroUsize::new(cache_capacity).unwrap());
        Server::init(id, &config)
    }

    fn edit(name: &str, content: &str) -> Request {
        Request::Edit {
            name: name.to_owned(),
            content: content.to_owned(),
        }
    }

    fn get(name: &str) -> Request {
        Request::Get {
            name: name.to_owned(),
        }
    }

    #[test]
    fn test_edit_is_deferred() {
        let mut server = make_server(1, 2);
        let mut sink: Vec<Response> = Vec::new();

        let response = server.handle(edit("doc", "hi"), 1, &mut sink);
        assert_eq!(response.body.as_deref(), Some("EDIT doc"));
        assert_eq!(response.log, ServerLog::LazyExec { depth: 1 });
        // Nothing was applied and nothing was emitted.
        assert!(sink.is_empty());
        assert_eq!(server.document_count(), 0);
        assert_eq!(server.pending_edits(), 1);
    }

    #[test]
    fn test_get_flushes_queue_in_fifo_order() {
        let mut server = make_server(1, 2);
        let mut sink: Vec<Response> = Vec::new();

        server.handle(edit("doc", "hi"), 1, &mut sink);
        server.handle(edit("doc", "bye"), 1, &mut sink);
        let response = server.handle(get("doc"), 1, &mut sink);

        // First edit creates the document, second updates it via a cache hit.
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0].body.as_deref(), Some("new document doc"));
        assert_eq!(sink[0].log, ServerLog::Miss);
        assert_eq!(sink[1].body.as_deref(), Some("document doc"));
        assert_eq!(sink[1].log, ServerLog::Hit);

        // The read observes the last edit, served from cache.
        assert_eq!(response.body.as_deref(), Some("bye"));
        assert_eq!(response.log, ServerLog::Hit);
        assert_eq!(server.pending_edits(), 0);
    }

    #[test]
    fn test_interleaved_documents_flush_in_arrival_order() {
        let mut server = make_server(1, 4);
        let mut sink: Vec<Response> = Vec::new();

        server.handle(edit("a", "1"), 1, &mut sink);
        server.handle(edit("b", "2"), 1, &mut sink);
        let response = server.handle(get("a"), 1, &mut sink);

        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0].body.as_deref(), Some("new document a"));
        assert_eq!(sink[1].body.as_deref(), Some("new document b"));
        assert_eq!(response.body.as_deref(), Some("1"));
        assert_eq!(server.document_count(), 2);
    }

    #[test]
    fn test_get_absent_document_faults() {
        let mut server = make_server(1, 2);
        let mut sink: Vec<Response> = Vec::new();
        let response = server.handle(get("ghost"), 7, &mut sink);
        assert_eq!(response.server_id, 7);
        assert_eq!(response.body, None);
        assert_eq!(response.log, ServerLog::Fault);
    }

    #[test]
    fn test_db_hit_installs_into_cache_with_eviction_log() {
        let mut server = make_server(1, 1);
        let mut sink: Vec<Response> = Vec::new();
        server.handle(edit("a", "1"), 1, &mut sink);
        server.handle(get("a"), 1, &mut sink);
        // "a" occupies the single cache slot; editing and reading "b"
        // evicts it.
        server.handle(edit("b", "2"), 1, &mut sink);
        let response = server.handle(get("b"), 1, &mut sink);
        assert_eq!(response.body.as_deref(), Some("2"));
        // The flushed edit of "b" evicted "a" when it was installed.
        let flushed = sink.last().unwrap();
        assert_eq!(
            flushed.log,
            ServerLog::Evict {
                evicted: "a".to_owned()
            }
        );

        // Reading "a" again: cache miss, database hit, evicts "b".
        let response = server.get_document("a", 1);
        assert_eq!(response.body.as_deref(), Some("1"));
        assert_eq!(
            response.log,
            ServerLog::Evict {
                evicted: "b".to_owned()
            }
        );
    }

    #[test]
    fn test_queue_overflow_drops_silently() {
        let config = ServerConfig {
            cache_capacity: NonZeroUsize::new(2).unwrap(),
            queue_depth: 2,
            doc_hash: crate::hash::hash_doc_name,
        };
        let mut server = Server::init(1, &config);
        let mut sink: Vec<Response> = Vec::new();

        server.handle(edit("a", "1"), 1, &mut sink);
        server.handle(edit("b", "2"), 1, &mut sink);
        let response = server.handle(edit("c", "3"), 1, &mut sink);
        // Dropped on the floor: depth unchanged, response still well-formed.
        assert_eq!(response.log, ServerLog::LazyExec { depth: 2 });

        server.handle(get("a"), 1, &mut sink);
        assert_eq!(server.document_count(), 2);
        let faulted = server.get_document("c", 1);
        assert_eq!(faulted.log, ServerLog::Fault);
    }

    #[test]
    fn test_migration_handoff_invalidates_cache() {
        let mut server = make_server(1, 2);
        let mut sink: Vec<Response> = Vec::new();
        server.handle(edit("a", "1"), 1, &mut sink);
        server.handle(get("a"), 1, &mut sink);

        let content = server.take_document("a");
        assert_eq!(content.as_deref(), Some("1"));
        assert_eq!(server.document_count(), 0);
        // The cache entry went with it.
        assert_eq!(server.get_document("a", 1).log, ServerLog::Fault);
        assert_eq!(server.take_document("a"), None);
    }

    #[test]
    fn test_store_document_does_not_warm_cache() {
        let mut server = make_server(1, 2);
        server.store_document("a".into(), "1".into());
        assert_eq!(server.document_count(), 1);
        assert_eq!(server.cache().len(), 0);
        // First read warms it.
        let response = server.get_document("a", 1);
        assert_eq!(response.log, ServerLog::Miss);
        assert_eq!(server.cache().len(), 1);
    }
}
