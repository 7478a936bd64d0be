//! # World — The Central Container
//!
//! The [`World`] owns all entities, components, and resources. It is the
//! single mutable root of the runtime.
//!
//! ## Architecture
//!
//! ```text
//! +----------------------------------------------------------+
//! | World                                                    |
//! |                                                          |
//! |  EntityAllocator: id + generation lifecycle              |
//! |                                                          |
//! |  Components: TypeId -> ComponentId, storage kind         |
//! |  Archetypes: signature -> { table, entities, edges }     |
//! |  SparseSets: ComponentId -> sparse storage               |
//! |                                                          |
//! |  locations: entity id -> (archetype, row)                |
//! |                                                          |
//! |  resources: TypeId -> Box<dyn Any>   (singletons)        |
//! |  observers: (TypeId, Trigger) -> callbacks               |
//! |  command_queue: deferred structural mutations            |
//! |  change_tick: monotonic frame counter                    |
//! +----------------------------------------------------------+
//! ```
//!
//! ## Structural mutation
//!
//! Adding or removing a component moves the entity between archetypes: its
//! table row is taken out of the old archetype's table and pushed onto the
//! new one's, and the location map is updated (including for whichever
//! entity got swapped into the vacated row). Sparse-set components never
//! move; only the signature changes.
//!
//! Direct calls (`insert`, `remove`, `despawn`) apply immediately and are
//! only safe from straight-line code. From inside query iteration, use the
//! [`Commands`] handle instead; the queue is flushed by
//! [`apply_commands`](World::apply_commands) at stage boundaries.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use super::archetype::{ArchetypeId, Archetypes};
use super::bundle::Bundle;
use super::change_detection::{ComponentTicks, Mut, Tick};
use super::commands::{Command, CommandQueue, Commands};
use super::component::{BoxedComponent, ComponentId, Components, StorageKind};
use super::entity::{Entity, EntityAllocator};
use super::observer::{ObserverRegistry, Trigger};
use super::query::{Query, QueryParam};
use super::storage::{table::TakenRow, SparseSets};

/// Where an entity's data lives: which archetype, and which table row.
#[derive(Clone, Copy)]
struct EntityLocation {
    archetype: ArchetypeId,
    row: usize,
}

/// The central container for all runtime state.
pub struct World {
    entities: EntityAllocator,
    components: Components,
    archetypes: Archetypes,
    sparse_sets: SparseSets,
    /// Entity id to its archetype and row. Entries exist only for live
    /// entities; stale handles are caught by the allocator's generations.
    locations: HashMap<u32, EntityLocation>,
    /// Global singletons, keyed by type.
    resources: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    observers: ObserverRegistry,
    command_queue: CommandQueue,
    change_tick: Tick,
}

impl World {
    pub fn new() -> Self {
        let components = Components::new();
        let archetypes = Archetypes::new(&components);
        Self {
            entities: EntityAllocator::new(),
            components,
            archetypes,
            sparse_sets: SparseSets::new(),
            locations: HashMap::new(),
            resources: HashMap::new(),
            observers: ObserverRegistry::new(),
            command_queue: CommandQueue::new(),
            // Tick 0 is the "before anything ran" sentinel fresh queries
            // compare against, so the world starts at 1: values inserted
            // before the first frame still count as added.
            change_tick: Tick(1),
        }
    }

    // ── Change tick ─────────────────────────────────────────────────

    /// The current change tick.
    pub fn change_tick(&self) -> Tick {
        self.change_tick
    }

    /// Advance the change tick. Called once per frame by the
    /// [`App`](crate::app::App); call it directly for explicit flush points
    /// in tests or custom drivers.
    pub fn increment_change_tick(&mut self) {
        self.change_tick.advance();
    }

    // ── Component registration ──────────────────────────────────────

    /// Register a component type with an explicit storage kind. Idempotent;
    /// see [`Components::register`].
    pub fn register_component<T: 'static + Send + Sync>(&mut self, storage: StorageKind) -> ComponentId {
        self.components.register::<T>(storage)
    }

    /// The component registry.
    pub fn components(&self) -> &Components {
        &self.components
    }

    /// The archetype registry.
    pub fn archetypes(&self) -> &Archetypes {
        &self.archetypes
    }

    pub(crate) fn sparse_sets(&self) -> &SparseSets {
        &self.sparse_sets
    }

    /// Disjoint borrows of the storage layers, for query extraction.
    pub(crate) fn split_storage_mut(
        &mut self,
    ) -> (&Components, &mut Archetypes, &mut SparseSets) {
        (&self.components, &mut self.archetypes, &mut self.sparse_sets)
    }

    // ── Spawn / Despawn ─────────────────────────────────────────────

    /// Spawn an entity with no components and return a builder for adding
    /// some.
    ///
    /// ```ignore
    /// let player = world.spawn()
    ///     .insert(Position { x: 0.0, y: 0.0 })
    ///     .insert(Health(100))
    ///     .id();
    /// ```
    pub fn spawn(&mut self) -> EntityBuilder<'_> {
        let entity = self.spawn_empty();
        EntityBuilder {
            world: self,
            entity,
        }
    }

    /// Spawn an entity with no components.
    pub fn spawn_empty(&mut self) -> Entity {
        let entity = self.entities.allocate();
        let archetype = self.archetypes.get_mut(ArchetypeId::EMPTY);
        let row = archetype.table.push_row(entity, TakenRow::new());
        self.locations.insert(
            entity.id,
            EntityLocation {
                archetype: ArchetypeId::EMPTY,
                row,
            },
        );
        entity
    }

    /// Spawn an entity from a [`Bundle`]: allocate, then insert each of the
    /// bundle's components individually.
    pub fn spawn_bundle<B: Bundle>(&mut self, bundle: B) -> Entity {
        let entity = self.spawn_empty();
        for component in bundle.components() {
            self.insert_boxed(entity, component);
        }
        entity
    }

    /// Despawn an entity, dropping all its components and freeing its id for
    /// reuse under a new generation.
    ///
    /// Returns `false` (without touching anything) if the entity is already
    /// dead or the handle is stale.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        if let Some(location) = self.locations.remove(&entity.id) {
            let archetype = self.archetypes.get_mut(location.archetype);
            // Sparse values are not in the table; drop them explicitly.
            for &component in archetype.sparse_components() {
                if let Some(set) = self.sparse_sets.get_mut(component) {
                    set.remove(entity.id);
                }
            }
            if let Some(moved) = archetype.table.swap_remove(entity.id).flatten() {
                if let Some(moved_location) = self.locations.get_mut(&moved.id) {
                    moved_location.row = location.row;
                }
            }
        }
        self.entities.deallocate(entity);
        true
    }

    /// Whether the handle refers to a live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Number of archetypes (empty ones included; they persist as caches).
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    // ── Per-entity component access ─────────────────────────────────

    /// Add a component to a live entity, migrating it to the matching
    /// archetype. Replaces the value in place (with fresh ticks) if the
    /// entity already has the type.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead; mutating through a stale handle is
    /// programmer error. Deferred [`Commands`] drop such inserts instead.
    pub fn insert<T: 'static + Send + Sync>(&mut self, entity: Entity, component: T) {
        assert!(
            self.entities.is_alive(entity),
            "Cannot insert component `{}` on dead entity {:?}",
            std::any::type_name::<T>(),
            entity
        );
        self.insert_boxed(entity, BoxedComponent::new(component));
    }

    /// Type-erased insert. Caller has verified liveness.
    pub(crate) fn insert_boxed(&mut self, entity: Entity, component: BoxedComponent) {
        let id = self
            .components
            .get_or_register_raw(component.type_id, component.type_name);
        let ticks = ComponentTicks::new(self.change_tick);
        let location = *self
            .locations
            .get(&entity.id)
            .unwrap_or_else(|| panic!("Live entity {entity:?} has no location: world corrupted"));

        let archetype = self.archetypes.get(location.archetype);
        if archetype.contains(id) {
            // Same signature; replace the value where it sits.
            match self.components.info(id).storage {
                StorageKind::Table => {
                    let table = &mut self.archetypes.get_mut(location.archetype).table;
                    let column = table.column_mut(id).unwrap_or_else(|| {
                        panic!("Archetype signature/table mismatch for {id:?}: world corrupted")
                    });
                    column.replace(location.row, component.value, ticks);
                }
                StorageKind::SparseSet => {
                    self.sparse_sets
                        .get_or_insert(id)
                        .insert(entity.id, component.value, ticks);
                }
            }
            return;
        }

        let target = self
            .archetypes
            .archetype_for_add(location.archetype, id, &self.components);
        self.move_entity(entity, location, target, Some((id, component.value, ticks)), None);
    }

    /// Remove component `T` from a live entity. Returns `true` if it was
    /// present; its value and ticks are dropped.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead (see [`insert`](World::insert)).
    pub fn remove<T: 'static + Send + Sync>(&mut self, entity: Entity) -> bool {
        assert!(
            self.entities.is_alive(entity),
            "Cannot remove component `{}` from dead entity {:?}",
            std::any::type_name::<T>(),
            entity
        );
        self.remove_by_type_id(entity, TypeId::of::<T>())
    }

    /// Type-erased removal. Caller has verified liveness.
    pub(crate) fn remove_by_type_id(&mut self, entity: Entity, type_id: TypeId) -> bool {
        let Some(id) = self.components.get_id(type_id) else {
            return false;
        };
        let location = *self
            .locations
            .get(&entity.id)
            .unwrap_or_else(|| panic!("Live entity {entity:?} has no location: world corrupted"));
        if !self.archetypes.get(location.archetype).contains(id) {
            return false;
        }

        if self.components.info(id).storage == StorageKind::SparseSet {
            if let Some(set) = self.sparse_sets.get_mut(id) {
                set.remove(entity.id);
            }
        }
        let target = self
            .archetypes
            .archetype_for_remove(location.archetype, id, &self.components);
        // For a Table component the taken row still holds the removed value;
        // dropping it happens when the leftover is discarded below.
        self.move_entity(entity, location, target, None, Some(id));
        true
    }

    /// Move an entity's table row from its current archetype to `target`,
    /// optionally adding one freshly inserted value or dropping one removed
    /// column on the way. Updates the location map for the entity and for
    /// whichever entity was swapped into the vacated row.
    fn move_entity(
        &mut self,
        entity: Entity,
        location: EntityLocation,
        target: ArchetypeId,
        insert: Option<(ComponentId, Box<dyn Any + Send + Sync>, ComponentTicks)>,
        drop_column: Option<ComponentId>,
    ) {
        let source = self.archetypes.get_mut(location.archetype);
        let (mut taken, moved) = source
            .table
            .take_row(entity.id)
            .unwrap_or_else(|| panic!("Entity {entity:?} missing from its table: world corrupted"));
        if let Some(moved) = moved {
            if let Some(moved_location) = self.locations.get_mut(&moved.id) {
                moved_location.row = location.row;
            }
        }

        if let Some(dropped) = drop_column {
            taken.remove(&dropped);
        }
        if let Some((id, value, ticks)) = insert {
            match self.components.info(id).storage {
                StorageKind::Table => {
                    taken.insert(id, (value, ticks));
                }
                StorageKind::SparseSet => {
                    self.sparse_sets.get_or_insert(id).insert(entity.id, value, ticks);
                }
            }
        }

        let row = self.archetypes.get_mut(target).table.push_row(entity, taken);
        self.locations.insert(
            entity.id,
            EntityLocation {
                archetype: target,
                row,
            },
        );
    }

    /// Shared reference to a component. `None` if the entity is dead or does
    /// not have the type.
    pub fn get<T: 'static + Send + Sync>(&self, entity: Entity) -> Option<&T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        let location = self.locations.get(&entity.id)?;
        let id = self.components.get_id(TypeId::of::<T>())?;
        match self.components.info(id).storage {
            StorageKind::Table => {
                let table = &self.archetypes.get(location.archetype).table;
                Some(table.column(id)?.get::<T>(location.row))
            }
            StorageKind::SparseSet => self.sparse_sets.get(id)?.get::<T>(entity.id),
        }
    }

    /// Mutable access to a component through the change-stamping [`Mut`]
    /// wrapper. `None` if the entity is dead or does not have the type.
    pub fn get_mut<T: 'static + Send + Sync>(&mut self, entity: Entity) -> Option<Mut<'_, T>> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        let current = self.change_tick;
        let location = *self.locations.get(&entity.id)?;
        let id = self.components.get_id(TypeId::of::<T>())?;
        let (value, ticks) = match self.components.info(id).storage {
            StorageKind::Table => {
                let table = &mut self.archetypes.get_mut(location.archetype).table;
                table.column_mut(id)?.get_any_mut(location.row)
            }
            StorageKind::SparseSet => self.sparse_sets.get_mut(id)?.get_any_mut(entity.id)?,
        };
        let value = value.downcast_mut::<T>()?;
        Some(Mut {
            value,
            ticks,
            current,
        })
    }

    /// Whether a live entity has component `T`.
    pub fn has<T: 'static + Send + Sync>(&self, entity: Entity) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        let Some(location) = self.locations.get(&entity.id) else {
            return false;
        };
        let Some(id) = self.components.get_id(TypeId::of::<T>()) else {
            return false;
        };
        self.archetypes.get(location.archetype).contains(id)
    }

    /// The tick stamps for a component on an entity.
    pub fn ticks<T: 'static + Send + Sync>(&self, entity: Entity) -> Option<ComponentTicks> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        let location = self.locations.get(&entity.id)?;
        let id = self.components.get_id(TypeId::of::<T>())?;
        let archetype = self.archetypes.get(location.archetype);
        self.component_ticks(archetype, location.row, entity, id)
    }

    /// Type-erased read of a component value, for observer dispatch.
    pub(crate) fn component_value_any(&self, entity: Entity, type_id: TypeId) -> Option<&dyn Any> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        let location = self.locations.get(&entity.id)?;
        let id = self.components.get_id(type_id)?;
        match self.components.info(id).storage {
            StorageKind::Table => {
                let table = &self.archetypes.get(location.archetype).table;
                Some(table.column(id)?.get_any(location.row))
            }
            StorageKind::SparseSet => self.sparse_sets.get(id)?.get_any(entity.id),
        }
    }

    // ── Resources ───────────────────────────────────────────────────

    /// Insert a resource (one instance per type). Replaces any existing one.
    pub fn insert_resource<T: 'static + Send + Sync>(&mut self, value: T) {
        self.resources.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Shared reference to a resource the caller declared mandatory.
    ///
    /// # Panics
    ///
    /// Panics if the resource was never inserted.
    pub fn resource<T: 'static + Send + Sync>(&self) -> &T {
        self.get_resource::<T>().unwrap_or_else(|| {
            panic!(
                "Resource `{}` not found. Did you forget to insert it?",
                std::any::type_name::<T>()
            )
        })
    }

    /// Mutable reference to a mandatory resource.
    ///
    /// # Panics
    ///
    /// Panics if the resource was never inserted.
    pub fn resource_mut<T: 'static + Send + Sync>(&mut self) -> &mut T {
        self.get_resource_mut::<T>().unwrap_or_else(|| {
            panic!(
                "Resource `{}` not found. Did you forget to insert it?",
                std::any::type_name::<T>()
            )
        })
    }

    /// Shared reference to a resource, `None` if absent.
    pub fn get_resource<T: 'static + Send + Sync>(&self) -> Option<&T> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|r| r.downcast_ref::<T>())
    }

    /// Mutable reference to a resource, `None` if absent.
    pub fn get_resource_mut<T: 'static + Send + Sync>(&mut self) -> Option<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|r| r.downcast_mut::<T>())
    }

    pub fn has_resource<T: 'static + Send + Sync>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    /// Remove a resource, taking ownership. `None` if absent. Useful for the
    /// extract/reinsert pattern when a resource and the world must be
    /// borrowed together.
    pub fn remove_resource<T: 'static + Send + Sync>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|r| r.downcast::<T>().ok())
            .map(|b| *b)
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Create a [`Query`] over the fetch tuple `Q`. Attach filters with the
    /// builder methods, then iterate with
    /// [`Query::for_each`](super::query::Query::for_each).
    pub fn query<Q: QueryParam>(&self) -> Query<Q> {
        Query::new()
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Handle for queueing deferred mutations onto this world's queue.
    pub fn commands(&mut self) -> Commands<'_> {
        Commands::new(&mut self.command_queue)
    }

    pub(crate) fn take_command_queue(&mut self) -> CommandQueue {
        std::mem::take(&mut self.command_queue)
    }

    pub(crate) fn restore_command_queue(&mut self, mut queue: CommandQueue) {
        // Anything enqueued while the queue was out (it should not happen,
        // but stay safe) lands after the restored batch.
        queue.append(&mut self.command_queue);
        self.command_queue = queue;
    }

    /// Apply every queued command in FIFO order and leave the queue empty.
    ///
    /// Per-entity commands whose target died earlier (in the batch or
    /// before it) are skipped silently; a despawn racing a stale mutation in
    /// the same batch is a harmless, expected interleaving. Commands queued
    /// *during* application (by on-spawn callbacks) join the next batch.
    pub fn apply_commands(&mut self) {
        let mut queue = std::mem::take(&mut self.command_queue);
        if queue.is_empty() {
            return;
        }
        log::trace!("Applying {} deferred command(s)", queue.len());
        for command in queue.drain() {
            match command {
                Command::Spawn(pending) => {
                    let entity = self.spawn_empty();
                    for component in pending.components {
                        self.insert_boxed(entity, component);
                    }
                    if let Some(callback) = pending.on_spawn {
                        callback(self, entity);
                    }
                }
                Command::Despawn(entity) => {
                    if !self.despawn(entity) {
                        log::trace!("Dropped despawn of dead entity {entity:?}");
                    }
                }
                Command::Insert { entity, component } => {
                    if self.is_alive(entity) {
                        self.insert_boxed(entity, component);
                    } else {
                        log::trace!(
                            "Dropped insert of `{}` on dead entity {entity:?}",
                            component.type_name
                        );
                    }
                }
                Command::Remove {
                    entity,
                    type_id,
                    type_name,
                } => {
                    if self.is_alive(entity) {
                        self.remove_by_type_id(entity, type_id);
                    } else {
                        log::trace!("Dropped remove of `{type_name}` on dead entity {entity:?}");
                    }
                }
                Command::InsertResource { type_id, value } => {
                    self.resources.insert(type_id, value);
                }
                Command::RemoveResource { type_id } => {
                    self.resources.remove(&type_id);
                }
            }
        }
    }

    // ── Observers ───────────────────────────────────────────────────

    /// The observer registry (register with
    /// [`observers_mut`](World::observers_mut)).
    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut ObserverRegistry {
        &mut self.observers
    }

    /// Fire the observers registered for `(T, trigger)` on `entity`, passing
    /// the live component value if the entity currently has one.
    ///
    /// Triggering is always explicit; the runtime never calls this from
    /// `insert`/`remove`. Commands queued by the callbacks land on the
    /// world's queue for the next flush. Callback panics propagate.
    pub fn trigger<T: 'static + Send + Sync>(&mut self, trigger: Trigger, entity: Entity) {
        let type_id = TypeId::of::<T>();
        let mut list = self.observers.take_list(type_id, trigger);
        if list.is_empty() {
            return;
        }
        let mut queue = CommandQueue::new();
        {
            let value = self.component_value_any(entity, type_id);
            let mut commands = Commands::new(&mut queue);
            for observer in &mut list {
                observer.invoke(&mut commands, entity, value);
            }
        }
        self.observers.restore_list(type_id, trigger, list);
        self.command_queue.append(&mut queue);
    }

    // ── Clearing ────────────────────────────────────────────────────

    /// Despawn every entity and drop pending commands. Registered component
    /// types, archetypes (now empty), resources, and observers survive; they
    /// are configuration, not frame state.
    pub fn clear(&mut self) {
        let all: Vec<Entity> = self
            .archetypes
            .iter()
            .flat_map(|a| a.entities().iter().copied())
            .collect();
        // Despawning (rather than wiping the allocator) bumps generations,
        // so handles from before the clear stay detectably stale.
        for entity in all {
            self.despawn(entity);
        }
        self.command_queue = CommandQueue::new();
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ── EntityBuilder ───────────────────────────────────────────────────────

/// Builder for adding components to a freshly spawned entity.
///
/// Returned by [`World::spawn`]. Chain `.insert()` calls, then `.id()` to
/// keep the handle.
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    entity: Entity,
}

impl EntityBuilder<'_> {
    /// Add a component to this entity.
    pub fn insert<T: 'static + Send + Sync>(self, component: T) -> Self {
        self.world.insert(self.entity, component);
        self
    }

    /// The spawned entity's handle.
    pub fn id(&self) -> Entity {
        self.entity
    }
}
