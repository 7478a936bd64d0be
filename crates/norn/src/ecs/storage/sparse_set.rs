//! # SparseSet — Per-Type Storage with O(1) Membership
//!
//! A sparse set pairs a sparse index (entity id to dense slot) with dense,
//! tightly packed arrays of values, tick stamps, and owning entity ids.
//!
//! ## Memory Layout
//!
//! ```text
//! sparse:         { 4 -> 0, 9 -> 1, 2 -> 2 }
//! dense:          [ v4,  v9,  v2 ]
//! dense_entities: [ 4,   9,   2  ]
//! ticks:          [ t4,  t9,  t2 ]
//! ```
//!
//! Invariant: `sparse[dense_entities[i]] == i` for every valid `i`. Every
//! mutation below preserves it; `debug_assert_invariant` checks it in tests.
//!
//! Values are boxed trait objects, same as table columns: no `unsafe`, type
//! correctness enforced by `downcast` at the access sites.

use std::any::Any;
use std::collections::HashMap;

use crate::ecs::change_detection::ComponentTicks;

/// Sparse-index storage for one component type.
#[derive(Default)]
pub struct SparseSet {
    /// Entity id to dense slot.
    sparse: HashMap<u32, usize>,
    dense: Vec<Box<dyn Any + Send + Sync>>,
    /// Owning entity id per dense slot, parallel to `dense`.
    dense_entities: Vec<u32>,
    ticks: Vec<ComponentTicks>,
}

impl SparseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `entity`. Returns `true` if a previous
    /// value was replaced. Either way the slot gets the given (fresh) ticks.
    pub fn insert(
        &mut self,
        entity: u32,
        value: Box<dyn Any + Send + Sync>,
        ticks: ComponentTicks,
    ) -> bool {
        if let Some(&slot) = self.sparse.get(&entity) {
            self.dense[slot] = value;
            self.ticks[slot] = ticks;
            true
        } else {
            let slot = self.dense.len();
            self.sparse.insert(entity, slot);
            self.dense.push(value);
            self.dense_entities.push(entity);
            self.ticks.push(ticks);
            false
        }
    }

    pub fn has(&self, entity: u32) -> bool {
        self.sparse.contains_key(&entity)
    }

    /// Type-erased read access.
    pub fn get_any(&self, entity: u32) -> Option<&dyn Any> {
        let &slot = self.sparse.get(&entity)?;
        Some(&*self.dense[slot])
    }

    /// Typed read access.
    ///
    /// # Panics
    ///
    /// Panics if the stored value is not a `T`, which indicates a runtime
    /// bug (the set is keyed by component id, one type per set).
    pub fn get<T: 'static>(&self, entity: u32) -> Option<&T> {
        self.get_any(entity).map(|v| {
            v.downcast_ref().unwrap_or_else(|| {
                panic!(
                    "SparseSet type mismatch: expected `{}`",
                    std::any::type_name::<T>()
                )
            })
        })
    }

    /// Mutable access to the raw value and its ticks, for `Mut` wrapping.
    pub fn get_any_mut(
        &mut self,
        entity: u32,
    ) -> Option<(&mut (dyn Any + Send + Sync), &mut ComponentTicks)> {
        let &slot = self.sparse.get(&entity)?;
        Some((&mut *self.dense[slot], &mut self.ticks[slot]))
    }

    pub fn ticks(&self, entity: u32) -> Option<&ComponentTicks> {
        let &slot = self.sparse.get(&entity)?;
        Some(&self.ticks[slot])
    }

    /// Remove the value for `entity` via swap-remove. Returns `false` if the
    /// entity had no value here. The value (and its ticks) are dropped.
    pub fn remove(&mut self, entity: u32) -> bool {
        let Some(slot) = self.sparse.remove(&entity) else {
            return false;
        };
        self.dense.swap_remove(slot);
        self.dense_entities.swap_remove(slot);
        self.ticks.swap_remove(slot);
        // If a survivor was swapped into the freed slot, repoint its sparse
        // entry; this is what keeps the invariant alive.
        if slot < self.dense_entities.len() {
            let moved = self.dense_entities[slot];
            self.sparse.insert(moved, slot);
        }
        true
    }

    /// Remove and return the boxed value with its ticks, instead of dropping.
    pub fn take(&mut self, entity: u32) -> Option<(Box<dyn Any + Send + Sync>, ComponentTicks)> {
        let slot = self.sparse.remove(&entity)?;
        let value = self.dense.swap_remove(slot);
        self.dense_entities.swap_remove(slot);
        let ticks = self.ticks.swap_remove(slot);
        if slot < self.dense_entities.len() {
            let moved = self.dense_entities[slot];
            self.sparse.insert(moved, slot);
        }
        Some((value, ticks))
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    pub fn clear(&mut self) {
        self.sparse.clear();
        self.dense.clear();
        self.dense_entities.clear();
        self.ticks.clear();
    }

    /// Entity ids with a value in this set, in dense order.
    pub fn entities(&self) -> &[u32] {
        &self.dense_entities
    }

    #[cfg(test)]
    fn debug_assert_invariant(&self) {
        for (i, &entity) in self.dense_entities.iter().enumerate() {
            assert_eq!(self.sparse[&entity], i);
        }
        assert_eq!(self.dense.len(), self.dense_entities.len());
        assert_eq!(self.dense.len(), self.ticks.len());
    }
}
