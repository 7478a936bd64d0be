//! # Storage — The Two Component Backends
//!
//! Component values live in one of two places, fixed per component type at
//! registration:
//!
//! - [`Table`]: columnar storage owned by each archetype. One column per
//!   Table-kind component in the archetype's signature; all columns share row
//!   indices with the archetype's entity list. Iteration is a linear scan.
//!   Values move between tables when an entity changes archetype.
//! - [`SparseSet`]: one set per component type for the whole world, held in
//!   [`SparseSets`]. Lookup is by entity id; values never move on archetype
//!   transitions, so adding/removing *other* components around a sparse one
//!   is cheap.
//!
//! Both backends remove by **swap-remove**: the last element is moved into
//! the freed slot and the identity map entry for the entity that used to be
//! last is updated. Removal is O(1), but one surviving entity's storage index
//! changes every time. Callers must re-derive positions through the identity
//! maps and never cache raw rows across mutations.

pub mod sparse_set;
pub mod table;

pub use sparse_set::SparseSet;
pub use table::{Column, Table};

use std::collections::HashMap;

use super::component::ComponentId;

/// All sparse-set storages, keyed by component id.
#[derive(Default)]
pub struct SparseSets {
    sets: HashMap<ComponentId, SparseSet>,
}

impl SparseSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set for `component`, created empty on first use.
    pub fn get_or_insert(&mut self, component: ComponentId) -> &mut SparseSet {
        self.sets.entry(component).or_default()
    }

    pub fn get(&self, component: ComponentId) -> Option<&SparseSet> {
        self.sets.get(&component)
    }

    pub fn get_mut(&mut self, component: ComponentId) -> Option<&mut SparseSet> {
        self.sets.get_mut(&component)
    }

    /// Temporarily remove a whole set, for the query extract/restore pattern.
    pub(crate) fn take_set(&mut self, component: ComponentId) -> Option<SparseSet> {
        self.sets.remove(&component)
    }

    pub(crate) fn restore_set(&mut self, component: ComponentId, set: SparseSet) {
        self.sets.insert(component, set);
    }

    /// Drop every stored value. Set capacity and registration survive.
    pub fn clear(&mut self) {
        for set in self.sets.values_mut() {
            set.clear();
        }
    }
}
