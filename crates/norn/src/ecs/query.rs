//! # Query — Filtered, Change-Aware Iteration
//!
//! A query names the component types it fetches (a tuple of `&T` / `&mut T`)
//! plus optional filters, and iterates every entity that matches all of it.
//!
//! ## How matching works
//!
//! ```text
//! let mut q = world.query::<(&Position, &mut Velocity)>().without::<Frozen>();
//! q.for_each(&mut world, |commands, entity, (pos, vel)| { ... });
//!
//! 1. Resolve ComponentIds for the fetch tuple and the filters.
//! 2. Visit only archetypes whose signature is a superset of the required
//!    set and disjoint from the `without` set. Entities never get scanned
//!    one by one against the filters; presence checks are archetype-level.
//! 3. Within each candidate archetype, apply the tick filters
//!    (`added`/`changed`) per row, then fetch and call the closure.
//! ```
//!
//! ## Change awareness
//!
//! `added::<T>()` matches entities whose `T` was inserted after this query's
//! last full iteration; `changed::<T>()` matches entities whose `T` was
//! written since then (and no later than the current tick). The query stores
//! its own `last_run` tick and bumps it at the end of every full iteration,
//! so two iterations without an intervening tick advance observe nothing new.
//!
//! ## Borrow discipline
//!
//! The closure receives a [`Commands`] handle for structural mutation; the
//! world itself is not reachable from inside the loop, which is what makes
//! mid-iteration spawns/despawns impossible rather than merely discouraged.
//! Column and sparse-set borrows use the extract/restore pattern: storage is
//! temporarily taken out of the world, iterated, and put back, with no
//! unsafe code anywhere.

use std::any::TypeId;
use std::marker::PhantomData;

use super::archetype::ArchetypeId;
use super::change_detection::{ComponentTicks, Mut, Tick};
use super::commands::Commands;
use super::component::{ComponentId, Components, StorageKind};
use super::entity::Entity;
use super::storage::table::Column;
use super::storage::{SparseSet, SparseSets, Table};
use super::world::World;

/// Storage borrowed for one fetch parameter while one archetype is iterated.
pub enum FetchSource {
    /// A column taken out of the archetype's table, indexed by row.
    Column(ComponentId, Column),
    /// A whole sparse set taken out of the world, indexed by entity id.
    Sparse(ComponentId, SparseSet),
    /// The component type is unregistered or its storage does not exist yet;
    /// nothing can be fetched, but extraction stays balanced.
    Missing,
}

/// A fetch parameter: `&T` for reads, `&mut T` for writes (yielded as
/// [`Mut<T>`]). Tuples of parameters are themselves parameters.
pub trait QueryParam {
    /// What the closure receives per entity.
    type Item<'w>;

    /// Owned storage extracted while an archetype is iterated.
    type Source;

    /// The component types this parameter requires on matching entities.
    fn type_ids() -> Vec<TypeId>;

    /// Take the needed storage out of the archetype's table / the sparse
    /// sets.
    fn extract(components: &Components, table: &mut Table, sparse_sets: &mut SparseSets)
    -> Self::Source;

    /// Put extracted storage back where it came from.
    fn restore(source: Self::Source, table: &mut Table, sparse_sets: &mut SparseSets);

    /// Fetch the item for one entity. `None` silently excludes the entity
    /// (it lost the component, or the source is missing).
    fn fetch<'s>(
        source: &'s mut Self::Source,
        row: usize,
        entity: Entity,
        current: Tick,
    ) -> Option<Self::Item<'s>>;
}

fn extract_one<T: 'static>(
    components: &Components,
    table: &mut Table,
    sparse_sets: &mut SparseSets,
) -> FetchSource {
    let Some(id) = components.get_id(TypeId::of::<T>()) else {
        return FetchSource::Missing;
    };
    match components.info(id).storage {
        StorageKind::Table => match table.take_column(id) {
            Some(column) => FetchSource::Column(id, column),
            None => FetchSource::Missing,
        },
        StorageKind::SparseSet => match sparse_sets.take_set(id) {
            Some(set) => FetchSource::Sparse(id, set),
            None => FetchSource::Missing,
        },
    }
}

fn restore_one(source: FetchSource, table: &mut Table, sparse_sets: &mut SparseSets) {
    match source {
        FetchSource::Column(id, column) => table.restore_column(id, column),
        FetchSource::Sparse(id, set) => sparse_sets.restore_set(id, set),
        FetchSource::Missing => {}
    }
}

/// Shared read access.
impl<T: 'static + Send + Sync> QueryParam for &T {
    type Item<'w> = &'w T;
    type Source = FetchSource;

    fn type_ids() -> Vec<TypeId> {
        vec![TypeId::of::<T>()]
    }

    fn extract(
        components: &Components,
        table: &mut Table,
        sparse_sets: &mut SparseSets,
    ) -> Self::Source {
        extract_one::<T>(components, table, sparse_sets)
    }

    fn restore(source: Self::Source, table: &mut Table, sparse_sets: &mut SparseSets) {
        restore_one(source, table, sparse_sets);
    }

    fn fetch<'s>(
        source: &'s mut Self::Source,
        row: usize,
        entity: Entity,
        _current: Tick,
    ) -> Option<Self::Item<'s>> {
        match source {
            FetchSource::Column(_, column) if row < column.len() => Some(column.get::<T>(row)),
            FetchSource::Sparse(_, set) => set.get::<T>(entity.id),
            _ => None,
        }
    }
}

/// Exclusive write access, with change stamping via [`Mut`].
impl<T: 'static + Send + Sync> QueryParam for &mut T {
    type Item<'w> = Mut<'w, T>;
    type Source = FetchSource;

    fn type_ids() -> Vec<TypeId> {
        vec![TypeId::of::<T>()]
    }

    fn extract(
        components: &Components,
        table: &mut Table,
        sparse_sets: &mut SparseSets,
    ) -> Self::Source {
        extract_one::<T>(components, table, sparse_sets)
    }

    fn restore(source: Self::Source, table: &mut Table, sparse_sets: &mut SparseSets) {
        restore_one(source, table, sparse_sets);
    }

    fn fetch<'s>(
        source: &'s mut Self::Source,
        row: usize,
        entity: Entity,
        current: Tick,
    ) -> Option<Self::Item<'s>> {
        let (value, ticks) = match source {
            FetchSource::Column(_, column) if row < column.len() => column.get_any_mut(row),
            FetchSource::Sparse(_, set) => set.get_any_mut(entity.id)?,
            _ => return None,
        };
        let value = value.downcast_mut::<T>().unwrap_or_else(|| {
            panic!(
                "Query fetch type mismatch: expected `{}`",
                std::any::type_name::<T>()
            )
        });
        Some(Mut {
            value,
            ticks,
            current,
        })
    }
}

macro_rules! impl_query_param_tuple {
    ($($P:ident),+) => {
        impl<$($P: QueryParam),+> QueryParam for ($($P,)+) {
            type Item<'w> = ($($P::Item<'w>,)+);
            type Source = ($($P::Source,)+);

            fn type_ids() -> Vec<TypeId> {
                let mut ids = Vec::new();
                $(ids.extend($P::type_ids());)+
                ids
            }

            fn extract(
                components: &Components,
                table: &mut Table,
                sparse_sets: &mut SparseSets,
            ) -> Self::Source {
                ($($P::extract(components, table, sparse_sets),)+)
            }

            #[allow(non_snake_case)]
            fn restore(source: Self::Source, table: &mut Table, sparse_sets: &mut SparseSets) {
                let ($($P,)+) = source;
                $($P::restore($P, table, sparse_sets);)+
            }

            #[allow(non_snake_case)]
            fn fetch<'s>(
                source: &'s mut Self::Source,
                row: usize,
                entity: Entity,
                current: Tick,
            ) -> Option<Self::Item<'s>> {
                let ($($P,)+) = source;
                Some(($($P::fetch($P, row, entity, current)?,)+))
            }
        }
    };
}

impl_query_param_tuple!(A);
impl_query_param_tuple!(A, B);
impl_query_param_tuple!(A, B, C);
impl_query_param_tuple!(A, B, C, D);
impl_query_param_tuple!(A, B, C, D, E);
impl_query_param_tuple!(A, B, C, D, E, F);
impl_query_param_tuple!(A, B, C, D, E, F, G);
impl_query_param_tuple!(A, B, C, D, E, F, G, H);

/// A reusable query: a fetch tuple plus runtime filters and a `last_run`
/// tick for change detection.
///
/// Create one with [`World::query`] (or [`Query::new`]) and keep it across
/// frames; `added`/`changed` filters are relative to the query's own last
/// full iteration.
pub struct Query<Q: QueryParam> {
    with: Vec<TypeId>,
    without: Vec<TypeId>,
    added: Vec<TypeId>,
    changed: Vec<TypeId>,
    last_run: Tick,
    _marker: PhantomData<fn() -> Q>,
}

impl<Q: QueryParam> Default for Query<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: QueryParam> Query<Q> {
    pub fn new() -> Self {
        Self {
            with: Vec::new(),
            without: Vec::new(),
            added: Vec::new(),
            changed: Vec::new(),
            last_run: Tick::ZERO,
            _marker: PhantomData,
        }
    }

    /// Require presence of `T` without fetching it.
    pub fn with<T: 'static>(mut self) -> Self {
        self.with.push(TypeId::of::<T>());
        self
    }

    /// Require absence of `T`.
    pub fn without<T: 'static>(mut self) -> Self {
        self.without.push(TypeId::of::<T>());
        self
    }

    /// Require that `T` was inserted since this query's last iteration.
    /// Implies presence of `T`.
    pub fn added<T: 'static>(mut self) -> Self {
        self.added.push(TypeId::of::<T>());
        self
    }

    /// Require that `T` was written since this query's last iteration.
    /// Implies presence of `T`.
    pub fn changed<T: 'static>(mut self) -> Self {
        self.changed.push(TypeId::of::<T>());
        self
    }

    /// The tick this query last fully iterated at.
    pub fn last_run(&self) -> Tick {
        self.last_run
    }

    // ── Iteration ────────────────────────────────────────────────────

    /// Run `f` for every matching entity.
    ///
    /// The closure receives a [`Commands`] handle (structural mutation stays
    /// deferred until the next flush), the entity, and the fetched item.
    /// At the end of the pass the query's `last_run` advances to the current
    /// tick.
    pub fn for_each(&mut self, world: &mut World, mut f: impl FnMut(&mut Commands, Entity, Q::Item<'_>)) {
        let current = world.change_tick();
        let plan = self.plan(world, current, None);

        // Commands issued by the closure accumulate in the world's own queue;
        // it is taken out for the duration of the pass so the closure cannot
        // reach the world through it.
        let mut queue = world.take_command_queue();
        for (archetype_id, rows) in plan {
            let (components, archetypes, sparse_sets) = world.split_storage_mut();
            let table = &mut archetypes.get_mut(archetype_id).table;
            let mut source = Q::extract(components, table, sparse_sets);

            {
                let mut commands = Commands::new(&mut queue);
                for (row, entity) in rows {
                    if let Some(item) = Q::fetch(&mut source, row, entity, current) {
                        f(&mut commands, entity, item);
                    }
                }
            }

            let (_, archetypes, sparse_sets) = world.split_storage_mut();
            let table = &mut archetypes.get_mut(archetype_id).table;
            Q::restore(source, table, sparse_sets);
        }
        world.restore_command_queue(queue);

        self.last_run = current;
    }

    /// Matching entities, in archetype order. Advances `last_run` like a
    /// full iteration.
    pub fn entities(&mut self, world: &World) -> Vec<Entity> {
        let current = world.change_tick();
        let result: Vec<Entity> = self
            .plan(world, current, None)
            .into_iter()
            .flat_map(|(_, rows)| rows.into_iter().map(|(_, entity)| entity))
            .collect();
        self.last_run = current;
        result
    }

    /// Number of matching entities. Advances `last_run`.
    pub fn count(&mut self, world: &World) -> usize {
        let current = world.change_tick();
        let count = self
            .plan(world, current, None)
            .into_iter()
            .map(|(_, rows)| rows.len())
            .sum();
        self.last_run = current;
        count
    }

    /// Whether no entity matches. Advances `last_run`.
    pub fn is_empty(&mut self, world: &World) -> bool {
        self.count(world) == 0
    }

    /// The first matching entity, or `None`. Does not advance `last_run`
    /// (this is a peek, not a full iteration).
    pub fn single(&self, world: &World) -> Option<Entity> {
        let current = world.change_tick();
        self.plan(world, current, Some(1))
            .into_iter()
            .flat_map(|(_, rows)| rows.into_iter().map(|(_, entity)| entity))
            .next()
    }

    // ── Matching ─────────────────────────────────────────────────────

    /// Collect matching `(archetype, rows)` before any storage is borrowed
    /// mutably. Rows stay valid for the whole pass because structural
    /// mutation is deferred. `limit` short-circuits after that many matches.
    fn plan(
        &self,
        world: &World,
        current: Tick,
        limit: Option<usize>,
    ) -> Vec<(ArchetypeId, Vec<(usize, Entity)>)> {
        let components = world.components();

        // Every fetched or `with`/`added`/`changed` type must be present on a
        // matching entity. An unregistered required type means nothing ever
        // had it, so nothing can match.
        let mut required: Vec<ComponentId> = Vec::new();
        for type_id in Q::type_ids()
            .iter()
            .chain(&self.with)
            .chain(&self.added)
            .chain(&self.changed)
        {
            match components.get_id(*type_id) {
                Some(id) => required.push(id),
                None => return Vec::new(),
            }
        }
        required.sort();
        required.dedup();

        // An unregistered `without` type excludes nothing.
        let without: Vec<ComponentId> = self
            .without
            .iter()
            .filter_map(|t| components.get_id(*t))
            .collect();

        let added: Vec<ComponentId> = self
            .added
            .iter()
            .filter_map(|t| components.get_id(*t))
            .collect();
        let changed: Vec<ComponentId> = self
            .changed
            .iter()
            .filter_map(|t| components.get_id(*t))
            .collect();

        let mut plan = Vec::new();
        let mut matched = 0usize;
        for archetype in world.archetypes().iter() {
            if archetype.is_empty()
                || !archetype.contains_all(&required)
                || !archetype.contains_none(&without)
            {
                continue;
            }

            let mut rows = Vec::new();
            for (row, &entity) in archetype.entities().iter().enumerate() {
                let added_ok = added.iter().all(|&id| {
                    world
                        .component_ticks(archetype, row, entity, id)
                        .is_some_and(|t| t.is_added(self.last_run))
                });
                let changed_ok = changed.iter().all(|&id| {
                    world
                        .component_ticks(archetype, row, entity, id)
                        .is_some_and(|t| t.is_changed(self.last_run, current))
                });
                if added_ok && changed_ok {
                    rows.push((row, entity));
                    matched += 1;
                    if limit.is_some_and(|l| matched >= l) {
                        plan.push((archetype.id(), rows));
                        return plan;
                    }
                }
            }
            if !rows.is_empty() {
                plan.push((archetype.id(), rows));
            }
        }
        plan
    }
}

/// Ticks lookup used by the tick filters; lives on `World` because it spans
/// both storage backends.
impl World {
    pub(crate) fn component_ticks(
        &self,
        archetype: &super::archetype::Archetype,
        row: usize,
        entity: Entity,
        component: ComponentId,
    ) -> Option<ComponentTicks> {
        match self.components().info(component).storage {
            StorageKind::Table => archetype.table.column(component).map(|c| *c.ticks(row)),
            StorageKind::SparseSet => self
                .sparse_sets()
                .get(component)
                .and_then(|set| set.ticks(entity.id).copied()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    #[derive(Debug, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }
    struct Frozen;
    struct Marker;

    #[test]
    fn and_semantics_over_tuple() {
        let mut world = World::new();
        world.spawn_bundle((Position { x: 1.0, y: 0.0 }, Velocity { dx: 0.5, dy: 0.0 }));
        world.spawn_bundle((Position { x: 2.0, y: 0.0 }, Velocity { dx: 1.0, dy: 0.0 }));
        world.spawn_bundle((Position { x: 3.0, y: 0.0 },)); // no velocity

        let mut q = world.query::<(&Position, &Velocity)>();
        let mut seen = Vec::new();
        q.for_each(&mut world, |_, _, (pos, vel)| {
            seen.push((pos.x, vel.dx));
        });
        seen.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        assert_eq!(seen, vec![(1.0, 0.5), (2.0, 1.0)]);
    }

    #[test]
    fn without_excludes() {
        let mut world = World::new();
        let frozen = world.spawn().insert(Position { x: 0.0, y: 0.0 }).insert(Frozen).id();
        let free = world.spawn().insert(Position { x: 1.0, y: 0.0 }).id();

        let mut q = world.query::<(&Position,)>().without::<Frozen>();
        let matched = q.entities(&world);
        assert_eq!(matched, vec![free]);
        assert!(!matched.contains(&frozen));
    }

    #[test]
    fn with_requires_presence_without_fetching() {
        let mut world = World::new();
        world.spawn().insert(Position { x: 0.0, y: 0.0 }).id();
        let marked = world
            .spawn()
            .insert(Position { x: 5.0, y: 0.0 })
            .insert(Marker)
            .id();

        let mut q = world.query::<(&Position,)>().with::<Marker>();
        assert_eq!(q.entities(&world), vec![marked]);
    }

    #[test]
    fn mutation_through_query_writes_back() {
        let mut world = World::new();
        world.spawn_bundle((Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: 2.0 }));

        let mut q = world.query::<(&mut Position, &Velocity)>();
        q.for_each(&mut world, |_, _, (mut pos, vel)| {
            pos.x += vel.dx;
            pos.y += vel.dy;
        });

        let mut read = world.query::<(&Position,)>();
        let mut result = Vec::new();
        read.for_each(&mut world, |_, _, (pos,)| result.push((pos.x, pos.y)));
        assert_eq!(result, vec![(1.0, 2.0)]);
    }

    #[test]
    fn added_matches_once_per_tick_window() {
        let mut world = World::new();
        world.spawn().insert(Marker).id();

        let mut q = world.query::<(&Marker,)>().added::<Marker>();
        assert_eq!(q.count(&world), 1);
        // last_run advanced; without a tick advance nothing is newly added.
        assert_eq!(q.count(&world), 0);

        world.increment_change_tick();
        world.spawn().insert(Marker).id();
        assert_eq!(q.count(&world), 1);
    }

    #[test]
    fn changed_matches_writes_not_reads() {
        let mut world = World::new();
        let entity = world.spawn().insert(Position { x: 0.0, y: 0.0 }).id();

        let mut q = world.query::<(&Position,)>().changed::<Position>();
        // The insert itself counts as a change.
        assert_eq!(q.count(&world), 1);
        assert_eq!(q.count(&world), 0);

        // A read does not re-trigger.
        world.increment_change_tick();
        let _ = world.get::<Position>(entity);
        assert_eq!(q.count(&world), 0);

        // A write does.
        world.increment_change_tick();
        world.get_mut::<Position>(entity).unwrap().x = 9.0;
        assert_eq!(q.count(&world), 1);
        assert_eq!(q.count(&world), 0);
    }

    #[test]
    fn single_and_reductions() {
        let mut world = World::new();
        let only = world.spawn().insert(Marker).id();

        let mut q = world.query::<(&Marker,)>();
        assert_eq!(q.single(&world), Some(only));
        assert_eq!(q.count(&world), 1);
        assert!(!q.is_empty(&world));

        let mut none = world.query::<(&Position,)>();
        assert_eq!(none.single(&world), None);
        assert!(none.is_empty(&world));
    }

    #[test]
    fn unregistered_type_matches_nothing() {
        let mut world = World::new();
        world.spawn().insert(Marker).id();
        struct NeverUsed;
        let mut q = world.query::<(&NeverUsed,)>();
        assert!(q.is_empty(&world));
    }

    #[test]
    fn commands_from_closure_apply_at_flush() {
        let mut world = World::new();
        world.spawn().insert(Marker).id();
        world.spawn().insert(Marker).id();

        let mut q = world.query::<(&Marker,)>();
        q.for_each(&mut world, |commands, entity, _| {
            commands.despawn(entity);
        });

        // Nothing applied yet.
        let mut check = world.query::<(&Marker,)>();
        assert_eq!(check.count(&world), 2);

        world.apply_commands();
        assert_eq!(check.count(&world), 0);
    }

    #[test]
    fn sparse_components_fetch_through_queries() {
        use crate::ecs::component::StorageKind;

        let mut world = World::new();
        world.register_component::<Frozen>(StorageKind::SparseSet);
        let entity = world
            .spawn()
            .insert(Position { x: 4.0, y: 0.0 })
            .insert(Frozen)
            .id();

        let mut q = world.query::<(&Position, &Frozen)>();
        assert_eq!(q.entities(&world), vec![entity]);

        let mut write = world.query::<(&mut Position,)>().with::<Frozen>();
        write.for_each(&mut world, |_, _, (mut pos,)| pos.x *= 2.0);
        assert_eq!(world.get::<Position>(entity).unwrap().x, 8.0);
    }
}
