//! # Entity — Generational Handles
//!
//! An [`Entity`] is an opaque handle. It carries no data of its own; the
//! [`World`](super::world::World) maps entities to their components. Keeping
//! identity separate from data is the core move of the ECS pattern.
//!
//! ## Design: Generational Indices
//!
//! A plain incrementing counter breaks down once ids are recycled:
//!
//! ```text
//! 1. Spawn entity #5
//! 2. Store a handle: saved = Entity(5)
//! 3. Despawn entity #5
//! 4. Spawn a new entity, which reuses id #5
//! 5. Use `saved`: it now silently addresses the wrong entity
//! ```
//!
//! The fix is to pair each id with a **generation** counter. When a slot is
//! recycled its generation increments, so any stale handle carrying the old
//! generation fails liveness checks instead of aliasing the new entity.
//!
//! ```text
//! Entity { id: 5, generation: 0 }   <- original
//! Entity { id: 5, generation: 1 }   <- after recycle
//! ```
//!
//! Identity therefore requires BOTH fields to match; an id alone is never
//! enough to address an entity.

use std::fmt;

/// A lightweight handle to an entity in the [`World`](super::world::World).
///
/// Entities are created via [`World::spawn`](super::world::World::spawn) and
/// destroyed via [`World::despawn`](super::world::World::despawn). A handle is
/// only valid for the `World` that created it, and only while its generation
/// matches the allocator's record for that id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    /// Slot id in the allocator. Recycled when the entity is despawned.
    pub(crate) id: u32,
    /// Generation counter, incremented each time the slot is reused.
    pub(crate) generation: u32,
}

impl Entity {
    /// Returns the raw id. Useful for diagnostics, not for addressing.
    pub fn id(self) -> u32 {
        self.id
    }

    /// Returns the generation.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.id, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id, self.generation)
    }
}

/// Issues and recycles entity ids.
///
/// ## Memory Layout
///
/// ```text
/// generations: [0, 1, 0, 2, 0]   <- one generation per slot ever allocated
/// free_list:   [1, 3]            <- slots available for reuse
/// len:         5                 <- next fresh id (if free_list is empty)
/// ```
///
/// Allocation pops the free list if possible, otherwise mints a fresh id at
/// generation 0. Deallocation bumps the slot's generation and pushes the id
/// onto the free list; the generation record itself is never erased, which is
/// what lets stale handles be detected long after despawn. Every operation is
/// O(1).
pub(crate) struct EntityAllocator {
    /// Generation counter for each slot, indexed by `Entity::id`.
    generations: Vec<u32>,
    /// Ids of despawned entities, available for reuse.
    free_list: Vec<u32>,
    /// Total number of slots ever allocated. Also the next fresh id.
    len: u32,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Allocate a new [`Entity`]. Reuses a freed slot if one is available,
    /// keeping the generation already stored for it; otherwise mints a fresh
    /// id at generation 0.
    pub fn allocate(&mut self) -> Entity {
        if let Some(id) = self.free_list.pop() {
            // The generation was already bumped on deallocate.
            let generation = self.generations[id as usize];
            Entity { id, generation }
        } else {
            let id = self.len;
            self.len += 1;
            self.generations.push(0);
            Entity { id, generation: 0 }
        }
    }

    /// Deallocate an entity, making its slot available for reuse.
    ///
    /// Returns `false` without touching anything if the stored generation does
    /// not match the handle (already despawned, or stale). Otherwise bumps the
    /// generation and returns `true`.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        let idx = entity.id as usize;
        if idx < self.generations.len() && self.generations[idx] == entity.generation {
            // Bump so existing handles become stale.
            self.generations[idx] += 1;
            self.free_list.push(entity.id);
            true
        } else {
            false
        }
    }

    /// Check whether a handle is still valid (not despawned or stale).
    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.id as usize;
        idx < self.generations.len() && self.generations[idx] == entity.generation
    }

    /// Number of currently alive entities.
    pub fn alive_count(&self) -> usize {
        (self.len as usize) - self.free_list.len()
    }
}
