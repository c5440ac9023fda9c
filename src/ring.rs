//! Ring positions for consistent-hash routing.
//!
//! The ring is an ordered vector of `(hash, server_id)` positions, sorted by
//! hash and, on ties, by id. A key belongs to the first position whose hash
//! strictly exceeds the key's hash, wrapping to the first position when none
//! does. Virtual nodes are just extra positions: a primary with id `k` may
//! also appear as `k + 100000` and `k + 200000`, and `id mod 100000` names
//! the family that shares one physical store.
//!
//! Positions carry no storage; the balancer maps a family to its store.

use std::fmt;

/// Offset separating a primary id from its replica ids. Primary ids must be
/// below this stride.
pub const REPLICA_STRIDE: u32 = 100_000;

/// Number of extra ring positions per server when virtual nodes are enabled.
pub const REPLICAS_PER_SERVER: u32 = 2;

/// Ring capacity before the first growth.
const INITIAL_RING_CAPACITY: usize = 8;

/// One position on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSlot {
    /// Position id: a primary id, or primary plus one or two strides.
    pub server_id: u32,
    /// Ring coordinate, derived from `server_id` by the injected id hash.
    pub hash: u32,
}

impl RingSlot {
    /// Id of the primary family this position belongs to.
    pub fn primary_id(&self) -> u32 {
        self.server_id % REPLICA_STRIDE
    }

    fn sort_key(&self) -> (u32, u32) {
        (self.hash, self.server_id)
    }
}

/// Sorted vector of ring positions.
pub struct Ring {
    slots: Vec<RingSlot>,
}

impl Ring {
    pub fn new() -> Self {
        Ring {
            slots: Vec::with_capacity(INITIAL_RING_CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[RingSlot] {
        &self.slots
    }

    /// Grows the backing vector ahead of a join, doubling when the join's
    /// worst case (three positions) would overflow it.
    pub fn reserve_for_join(&mut self) {
        let needed = self.slots.len() + 1 + REPLICAS_PER_SERVER as usize;
        if needed > self.slots.capacity() {
            self.slots.reserve(self.slots.capacity().max(INITIAL_RING_CAPACITY));
        }
    }

    /// Inserts a position, keeping the `(hash, id)` order, and returns its
    /// index.
    pub fn insert(&mut self, slot: RingSlot) -> usize {
        let pos = self
            .slots
            .iter()
            .position(|s| s.sort_key() > slot.sort_key())
            .unwrap_or(self.slots.len());
        self.slots.insert(pos, slot);
        pos
    }

    /// The position owning `hash`: the first slot whose hash strictly
    /// exceeds it, wrapping to the first slot.
    pub fn owner(&self, hash: u32) -> Option<&RingSlot> {
        if self.slots.is_empty() {
            return None;
        }
        Some(
            self.slots
                .iter()
                .find(|s| s.hash > hash)
                .unwrap_or(&self.slots[0]),
        )
    }

    /// First position clockwise from `index` (exclusive) that belongs to a
    /// different family.
    pub fn successor_outside_family(&self, index: usize) -> Option<RingSlot> {
        let family = self.slots[index].primary_id();
        let n = self.slots.len();
        (1..n)
            .map(|step| self.slots[(index + step) % n])
            .find(|s| s.primary_id() != family)
    }

    /// The position in `family` whose hash strictly exceeds `hash`, if any.
    ///
    /// Used to keep reads replica-local under virtual nodes.
    pub fn family_slot_above(&self, family: u32, hash: u32) -> Option<RingSlot> {
        self.slots
            .iter()
            .copied()
            .find(|s| s.primary_id() == family && s.hash > hash)
    }

    /// Removes every position of `family`, compacting the vector and
    /// shrinking it when it drops below half capacity.
    pub fn remove_family(&mut self, family: u32) {
        self.slots.retain(|s| s.primary_id() != family);
        let capacity = self.slots.capacity();
        if capacity > INITIAL_RING_CAPACITY && self.slots.len() < capacity / 2 {
            self.slots.shrink_to(capacity / 2);
        }
    }
}

impl Default for Ring {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring").field("slots", &self.slots).finish()
    }
}
