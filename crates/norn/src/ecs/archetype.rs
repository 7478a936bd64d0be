//! # Archetype — Grouping Entities by Component Signature
//!
//! An archetype is the set of entities that carry exactly the same component
//! types. Grouping entities this way is what makes queries fast: a query
//! visits only the archetypes whose signature is a superset of its own, and
//! inside one archetype every entity is a plain row.
//!
//! ## Signature
//!
//! A signature is the sorted, deduplicated list of [`ComponentId`]s an entity
//! carries, covering BOTH storage kinds. Sorting means `{A, B}` and `{B, A}`
//! resolve to the same archetype no matter the insertion order. Two
//! archetypes never share a signature, and every live entity belongs to
//! exactly one archetype at a time.
//!
//! ## Transition edges
//!
//! Adding or removing one component moves an entity to a neighboring
//! archetype. Those neighbors are cached per component as [`ArchetypeEdges`]:
//! the first `A + Position` transition computes the target signature
//! directly, creates the archetype if needed, and stores the edge in both
//! directions, so entity churn after the first transition never recomputes
//! signatures. Creating an archetype costs only the signature copy; there is
//! no scan over existing archetypes.
//!
//! Archetypes are never destroyed. An archetype left empty stays registered
//! as a cache for future entities with the same signature.

use std::collections::HashMap;

use super::component::{ComponentId, Components, StorageKind};
use super::entity::Entity;
use super::storage::Table;

/// Index of an archetype in the [`Archetypes`] registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ArchetypeId(pub(crate) u32);

impl ArchetypeId {
    /// The archetype of entities with no components.
    pub const EMPTY: ArchetypeId = ArchetypeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Cached add/remove transitions for one component, from one archetype.
#[derive(Clone, Copy, Default)]
pub struct ArchetypeEdges {
    pub add: Option<ArchetypeId>,
    pub remove: Option<ArchetypeId>,
}

/// One archetype: a signature, the table holding its rows, and the cached
/// transition edges.
pub struct Archetype {
    id: ArchetypeId,
    /// Sorted component ids, both storage kinds.
    key: Box<[ComponentId]>,
    /// The subset of `key` with sparse-set storage (values live outside the
    /// table and stay put on transitions).
    sparse_components: Box<[ComponentId]>,
    /// Columnar rows for the Table-kind subset of `key`, plus the entity
    /// list and row map.
    pub(crate) table: Table,
    edges: HashMap<ComponentId, ArchetypeEdges>,
}

impl Archetype {
    fn new(id: ArchetypeId, key: Box<[ComponentId]>, components: &Components) -> Self {
        let table_components: Vec<ComponentId> = key
            .iter()
            .copied()
            .filter(|&c| components.info(c).storage == StorageKind::Table)
            .collect();
        let sparse_components: Box<[ComponentId]> = key
            .iter()
            .copied()
            .filter(|&c| components.info(c).storage == StorageKind::SparseSet)
            .collect();
        Self {
            id,
            key,
            sparse_components,
            table: Table::new(table_components),
            edges: HashMap::new(),
        }
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// The sorted signature.
    pub fn key(&self) -> &[ComponentId] {
        &self.key
    }

    /// Signature components whose values live in sparse sets.
    pub(crate) fn sparse_components(&self) -> &[ComponentId] {
        &self.sparse_components
    }

    /// Whether the signature contains `component` (either storage kind).
    pub fn contains(&self, component: ComponentId) -> bool {
        self.key.binary_search(&component).is_ok()
    }

    /// Whether the signature contains every id in `required`.
    pub fn contains_all(&self, required: &[ComponentId]) -> bool {
        required.iter().all(|&c| self.contains(c))
    }

    /// Whether the signature contains none of the ids in `excluded`.
    pub fn contains_none(&self, excluded: &[ComponentId]) -> bool {
        !excluded.iter().any(|&c| self.contains(c))
    }

    pub fn entities(&self) -> &[Entity] {
        self.table.entities()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn edges_for(&self, component: ComponentId) -> ArchetypeEdges {
        self.edges.get(&component).copied().unwrap_or_default()
    }
}

/// Registry of all archetypes, keyed by signature.
///
/// The empty archetype exists from construction at [`ArchetypeId::EMPTY`].
pub struct Archetypes {
    archetypes: Vec<Archetype>,
    by_key: HashMap<Box<[ComponentId]>, ArchetypeId>,
}

impl Archetypes {
    pub fn new(components: &Components) -> Self {
        let empty_key: Box<[ComponentId]> = Box::new([]);
        let empty = Archetype::new(ArchetypeId::EMPTY, empty_key.clone(), components);
        Self {
            archetypes: vec![empty],
            by_key: HashMap::from([(empty_key, ArchetypeId::EMPTY)]),
        }
    }

    /// The archetype for a signature, created on first sight. `types` need
    /// not be sorted or deduplicated.
    pub fn get_or_create(
        &mut self,
        mut types: Vec<ComponentId>,
        components: &Components,
    ) -> ArchetypeId {
        types.sort();
        types.dedup();
        let key: Box<[ComponentId]> = types.into_boxed_slice();
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }
        let id = ArchetypeId(self.archetypes.len() as u32);
        log::debug!(
            "New archetype {:?} with {} component type(s)",
            id,
            key.len()
        );
        self.archetypes.push(Archetype::new(id, key.clone(), components));
        self.by_key.insert(key, id);
        id
    }

    /// The archetype an entity in `from` moves to when `component` is added.
    /// Cached after the first computation, in both directions.
    pub fn archetype_for_add(
        &mut self,
        from: ArchetypeId,
        component: ComponentId,
        components: &Components,
    ) -> ArchetypeId {
        if let Some(target) = self.get(from).edges_for(component).add {
            return target;
        }
        let mut types: Vec<ComponentId> = self.get(from).key.to_vec();
        types.push(component);
        let target = self.get_or_create(types, components);
        self.archetypes[from.index()]
            .edges
            .entry(component)
            .or_default()
            .add = Some(target);
        self.archetypes[target.index()]
            .edges
            .entry(component)
            .or_default()
            .remove = Some(from);
        target
    }

    /// The archetype an entity in `from` moves to when `component` is
    /// removed. Cached after the first computation, in both directions.
    pub fn archetype_for_remove(
        &mut self,
        from: ArchetypeId,
        component: ComponentId,
        components: &Components,
    ) -> ArchetypeId {
        if let Some(target) = self.get(from).edges_for(component).remove {
            return target;
        }
        let types: Vec<ComponentId> = self
            .get(from)
            .key
            .iter()
            .copied()
            .filter(|&c| c != component)
            .collect();
        let target = self.get_or_create(types, components);
        self.archetypes[from.index()]
            .edges
            .entry(component)
            .or_default()
            .remove = Some(target);
        self.archetypes[target.index()]
            .edges
            .entry(component)
            .or_default()
            .add = Some(from);
        target
    }

    /// Access an archetype by id.
    ///
    /// # Panics
    ///
    /// Panics on an id this registry never issued; that is a corrupted
    /// internal invariant, not user error.
    pub fn get(&self, id: ArchetypeId) -> &Archetype {
        self.archetypes
            .get(id.index())
            .unwrap_or_else(|| panic!("Unknown {:?}: archetype registry corrupted", id))
    }

    pub(crate) fn get_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        self.archetypes
            .get_mut(id.index())
            .unwrap_or_else(|| panic!("Unknown {:?}: archetype registry corrupted", id))
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    /// Drop every entity row from every archetype. The archetypes themselves
    /// and their edge caches survive, ready for reuse.
    pub fn clear_entities(&mut self) {
        for archetype in &mut self.archetypes {
            archetype.table.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::StorageKind;

    struct A;
    struct B;
    struct C;

    fn setup() -> (Components, Archetypes) {
        let mut components = Components::new();
        components.register::<A>(StorageKind::Table);
        components.register::<B>(StorageKind::Table);
        components.register::<C>(StorageKind::SparseSet);
        let archetypes = Archetypes::new(&components);
        (components, archetypes)
    }

    #[test]
    fn signature_order_does_not_matter() {
        let (components, mut archetypes) = setup();
        let ab = archetypes.get_or_create(vec![ComponentId(0), ComponentId(1)], &components);
        let ba = archetypes.get_or_create(vec![ComponentId(1), ComponentId(0)], &components);
        assert_eq!(ab, ba);
        assert_eq!(archetypes.len(), 2); // empty + {A,B}
    }

    #[test]
    fn duplicate_ids_collapse() {
        let (components, mut archetypes) = setup();
        let a = archetypes.get_or_create(vec![ComponentId(0), ComponentId(0)], &components);
        assert_eq!(archetypes.get(a).key(), &[ComponentId(0)]);
    }

    #[test]
    fn add_edge_is_cached_both_ways() {
        let (components, mut archetypes) = setup();
        let from = ArchetypeId::EMPTY;
        let to = archetypes.archetype_for_add(from, ComponentId(0), &components);
        assert_ne!(from, to);

        // Forward edge cached.
        assert_eq!(archetypes.get(from).edges_for(ComponentId(0)).add, Some(to));
        // Reverse edge cached without ever calling archetype_for_remove.
        assert_eq!(
            archetypes.get(to).edges_for(ComponentId(0)).remove,
            Some(from)
        );
        // A second lookup hits the cache and returns the same archetype.
        assert_eq!(
            archetypes.archetype_for_add(from, ComponentId(0), &components),
            to
        );
    }

    #[test]
    fn add_then_remove_round_trips() {
        let (components, mut archetypes) = setup();
        let a = archetypes.archetype_for_add(ArchetypeId::EMPTY, ComponentId(0), &components);
        let ab = archetypes.archetype_for_add(a, ComponentId(1), &components);
        let back = archetypes.archetype_for_remove(ab, ComponentId(1), &components);
        assert_eq!(back, a);
    }

    #[test]
    fn sparse_components_are_in_signature_but_not_table() {
        let (components, mut archetypes) = setup();
        let id = archetypes.get_or_create(vec![ComponentId(0), ComponentId(2)], &components);
        let archetype = archetypes.get(id);
        assert!(archetype.contains(ComponentId(2)));
        assert_eq!(archetype.sparse_components(), &[ComponentId(2)]);
        assert!(archetype.table.has_column(ComponentId(0)));
        assert!(!archetype.table.has_column(ComponentId(2)));
    }

    #[test]
    fn superset_and_exclusion_checks() {
        let (components, mut archetypes) = setup();
        let ab = archetypes.get_or_create(vec![ComponentId(0), ComponentId(1)], &components);
        let archetype = archetypes.get(ab);
        assert!(archetype.contains_all(&[ComponentId(0)]));
        assert!(archetype.contains_all(&[ComponentId(0), ComponentId(1)]));
        assert!(!archetype.contains_all(&[ComponentId(0), ComponentId(2)]));
        assert!(archetype.contains_none(&[ComponentId(2)]));
        assert!(!archetype.contains_none(&[ComponentId(1)]));
    }

    #[test]
    #[should_panic(expected = "archetype registry corrupted")]
    fn unknown_archetype_id_panics() {
        let (_, archetypes) = setup();
        archetypes.get(ArchetypeId(99));
    }
}
