//! Consistent-hash load balancer: routing, topology changes, migration.
//!
//! The balancer owns the [`Ring`] of positions and a side table mapping each
//! primary family to its [`Server`] store. Requests are forwarded to the
//! position owning the document's hash; joins and leaves trigger the key
//! migration that keeps every document on the server that owns its hash
//! under the current ring.
//!
//! Migration never pre-populates a recipient's cache: documents land in the
//! database and warm up lazily on first read. Donor caches are invalidated
//! for every key that moves away.
//!
//! All topology operations complete before returning, so any subsequent
//! request observes the new ring, and donor queues are flushed before their
//! documents move, so no deferred edit is lost.

use core::num::NonZeroUsize;
use std::fmt;

use hashbrown::HashMap;

use crate::config::{BalancerConfig, ServerConfig, TASK_QUEUE_DEPTH};
use crate::protocol::{Request, Response, ResponseSink};
use crate::ring::{Ring, RingSlot, REPLICA_STRIDE};
use crate::server::Server;

/// Front door of the store: routes every request to the owning server.
pub struct LoadBalancer {
    ring: Ring,
    stores: HashMap<u32, Server>,
    config: BalancerConfig,
}

impl LoadBalancer {
    /// Creates an empty balancer.
    pub fn init(config: BalancerConfig) -> Self {
        LoadBalancer {
            ring: Ring::new(),
            stores: HashMap::new(),
            config,
        }
    }

    /// Number of physical servers.
    pub fn server_count(&self) -> usize {
        self.stores.len()
    }

    /// The physical servers, in no particular order.
    pub fn servers(&self) -> impl Iterator<Item = &Server> {
        self.stores.values()
    }

    /// The ring positions.
    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    /// Adds a server and migrates the keys it now owns.
    ///
    /// Under virtual nodes the server also claims positions at
    /// `id + 100000` and `id + 200000`. Positions join one at a time, each
    /// pulling its keys from the clockwise neighbor outside the family;
    /// that neighbor's queue is flushed (responses going to `sink`) before
    /// any key moves.
    pub fn add_server(
        &mut self,
        id: u32,
        cache_capacity: NonZeroUsize,
        sink: &mut dyn ResponseSink,
    ) {
        debug_assert!(id < REPLICA_STRIDE, "primary ids must be below the replica stride");
        let primary = id % REPLICA_STRIDE;
        let server_config = ServerConfig {
            cache_capacity,
            queue_depth: TASK_QUEUE_DEPTH,
            doc_hash: self.config.doc_hash,
        };
        self.stores.insert(primary, Server::init(primary, &server_config));

        self.ring.reserve_for_join();
        let mut position_ids = vec![primary];
        if self.config.enable_vnodes {
            position_ids.push(primary + REPLICA_STRIDE);
            position_ids.push(primary + 2 * REPLICA_STRIDE);
        }
        for position_id in position_ids {
            let slot = RingSlot {
                server_id: position_id,
                hash: (self.config.server_hash)(position_id),
            };
            self.join_slot(slot, sink);
        }
        log::debug!(
            "server {primary} joined; ring has {} positions over {} servers",
            self.ring.len(),
            self.stores.len()
        );
    }

    /// Inserts one ring position and pulls over the keys it now owns.
    fn join_slot(&mut self, slot: RingSlot, sink: &mut dyn ResponseSink) {
        let pos = self.ring.insert(slot);

        // The donor is the clockwise neighbor outside the joining family;
        // everything between belongs to the family and holds no other keys.
        let Some(donor_slot) = self.ring.successor_outside_family(pos) else {
            return;
        };
        let donor_id = donor_slot.primary_id();

        let donor = self
            .stores
            .get_mut(&donor_id)
            .expect("every ring position has a store");
        donor.flush_tasks(donor_id, sink);
        let names = donor.document_names();

        // A key moves iff the updated ring hands it to the joining position.
        let doc_hash = self.config.doc_hash;
        let claimed: Vec<String> = names
            .into_iter()
            .filter(|name| {
                self.ring
                    .owner(doc_hash(name.as_bytes()))
                    .is_some_and(|owner| owner.server_id == slot.server_id)
            })
            .collect();
        if claimed.is_empty() {
            return;
        }

        let donor = self.stores.get_mut(&donor_id).expect("donor store exists");
        let documents: Vec<(String, String)> = claimed
            .into_iter()
            .filter_map(|name| {
                donor
                    .take_document(&name)
                    .map(|content| (name, content))
            })
            .collect();
        log::debug!(
            "position {}: {} documents migrate from server {donor_id}",
            slot.server_id,
            documents.len()
        );

        let recipient = self
            .stores
            .get_mut(&slot.primary_id())
            .expect("joining position has a store");
        for (name, content) in documents {
            recipient.store_document(name, content);
        }
    }

    /// Removes a server family and re-homes its documents.
    ///
    /// The departing server's queue is flushed first so no deferred edit is
    /// lost; each document then lands on whatever position owns it under
    /// the updated ring. Removing an unknown id is a no-op.
    pub fn remove_server(&mut self, id: u32, sink: &mut dyn ResponseSink) {
        let family = id % REPLICA_STRIDE;
        let Some(mut departing) = self.stores.remove(&family) else {
            log::debug!("remove of unknown server {id} ignored");
            return;
        };
        departing.flush_tasks(family, sink);
        self.ring.remove_family(family);

        if self.ring.is_empty() {
            if departing.document_count() > 0 {
                log::warn!(
                    "last server {family} removed; {} documents dropped",
                    departing.document_count()
                );
            }
            return;
        }

        let doc_hash = self.config.doc_hash;
        let mut moved = 0usize;
        for (name, content) in departing.into_documents() {
            let owner = self
                .ring
                .owner(doc_hash(name.as_bytes()))
                .copied()
                .expect("ring is non-empty");
            if let Some(store) = self.stores.get_mut(&owner.primary_id()) {
                store.store_document(name, content);
                moved += 1;
            }
        }
        log::debug!("server {family} left; {moved} documents re-homed");
    }

    /// Routes a request to the owning ring position.
    ///
    /// Returns `None` when no server exists. GETs under virtual nodes are
    /// further resolved to the family position whose hash strictly exceeds
    /// the document hash, keeping reads replica-local.
    pub fn forward(
        &mut self,
        request: Request,
        sink: &mut dyn ResponseSink,
    ) -> Option<Response> {
        let hash = (self.config.doc_hash)(request.doc_name().as_bytes());
        let mut slot = *self.ring.owner(hash)?;
        if self.config.enable_vnodes && matches!(request, Request::Get { .. }) {
            if let Some(replica) = self.ring.family_slot_above(slot.primary_id(), hash) {
                slot = replica;
            }
        }
        let store = self
            .stores
            .get_mut(&slot.primary_id())
            .expect("every ring position has a store");
        Some(store.handle(request, slot.server_id, sink))
    }
}

impl fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("positions", &self.ring.len())
            .field("servers", &self.stores.len())
            .field("vnodes", &self.config.enable_vnodes)
            .finish()
    }
}
