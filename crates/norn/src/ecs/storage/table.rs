//! # Table — Columnar Storage for One Archetype
//!
//! Each archetype owns a `Table`: one [`Column`] per Table-kind component in
//! its signature, plus the entity list and the entity-to-row map. All columns
//! and the entity list share row indices.
//!
//! ## Memory Layout
//!
//! ```text
//! columns:
//!   Position: [pos0, pos1, pos2]     <- one boxed value per row
//!   Velocity: [vel0, vel1, vel2]
//! ticks (inside each column, parallel to the values)
//! entities:   [e0,   e1,   e2  ]     <- parallel array
//! entity_to_row: { e0.id -> 0, e1.id -> 1, e2.id -> 2 }
//! ```
//!
//! Removing an entity swap-removes its row from *every* column, the entity
//! list, and the row map in one operation; the entity that used to occupy the
//! last row is reported back so the caller can repoint its stored location.
//!
//! Values are `Box<dyn Any + Send + Sync>`. The classic alternative is raw
//! byte columns with manual layout management, which is faster but demands
//! `unsafe` throughout; boxed values keep the whole storage layer auditable
//! with zero unsafe code.

use std::any::Any;
use std::collections::HashMap;

use crate::ecs::change_detection::ComponentTicks;
use crate::ecs::component::ComponentId;
use crate::ecs::entity::Entity;

/// One row's worth of values taken out of a table during archetype migration.
pub(crate) type TakenRow = HashMap<ComponentId, (Box<dyn Any + Send + Sync>, ComponentTicks)>;

/// A type-erased column of component values with parallel tick stamps.
#[derive(Default)]
pub struct Column {
    data: Vec<Box<dyn Any + Send + Sync>>,
    ticks: Vec<ComponentTicks>,
}

impl Column {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Box<dyn Any + Send + Sync>, ticks: ComponentTicks) {
        self.data.push(value);
        self.ticks.push(ticks);
    }

    /// Typed read access to the value at `row`.
    ///
    /// # Panics
    ///
    /// Panics if the row is out of bounds or the stored value is not a `T`
    /// (a runtime bug: columns hold exactly one type).
    pub fn get<T: 'static>(&self, row: usize) -> &T {
        self.data[row].downcast_ref().unwrap_or_else(|| {
            panic!(
                "Column type mismatch: expected `{}`",
                std::any::type_name::<T>()
            )
        })
    }

    pub fn get_any(&self, row: usize) -> &dyn Any {
        &*self.data[row]
    }

    /// Mutable access to the raw value and its ticks, for `Mut` wrapping.
    pub fn get_any_mut(&mut self, row: usize) -> (&mut (dyn Any + Send + Sync), &mut ComponentTicks) {
        (&mut *self.data[row], &mut self.ticks[row])
    }

    pub fn ticks(&self, row: usize) -> &ComponentTicks {
        &self.ticks[row]
    }

    /// Replace the value at `row` in place, stamping fresh ticks.
    pub fn replace(&mut self, row: usize, value: Box<dyn Any + Send + Sync>, ticks: ComponentTicks) {
        self.data[row] = value;
        self.ticks[row] = ticks;
    }

    fn swap_remove(&mut self, row: usize) {
        self.data.swap_remove(row);
        self.ticks.swap_remove(row);
    }

    fn take(&mut self, row: usize) -> (Box<dyn Any + Send + Sync>, ComponentTicks) {
        (self.data.swap_remove(row), self.ticks.swap_remove(row))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Columnar storage for one archetype: columns plus the row-identity maps.
pub struct Table {
    columns: HashMap<ComponentId, Column>,
    entities: Vec<Entity>,
    /// Entity id to row. Rows are NOT stable across removals; always re-derive
    /// through this map.
    entity_to_row: HashMap<u32, usize>,
}

impl Table {
    /// Create an empty table with a column for each given component.
    pub fn new(components: impl IntoIterator<Item = ComponentId>) -> Self {
        Self {
            columns: components
                .into_iter()
                .map(|id| (id, Column::new()))
                .collect(),
            entities: Vec::new(),
            entity_to_row: HashMap::new(),
        }
    }

    pub fn has_column(&self, component: ComponentId) -> bool {
        self.columns.contains_key(&component)
    }

    pub fn column(&self, component: ComponentId) -> Option<&Column> {
        self.columns.get(&component)
    }

    pub fn column_mut(&mut self, component: ComponentId) -> Option<&mut Column> {
        self.columns.get_mut(&component)
    }

    /// Temporarily remove a whole column, for the query extract/restore
    /// pattern.
    pub(crate) fn take_column(&mut self, component: ComponentId) -> Option<Column> {
        self.columns.remove(&component)
    }

    pub(crate) fn restore_column(&mut self, component: ComponentId, column: Column) {
        self.columns.insert(component, column);
    }

    /// Append a row for `entity`. `values` must hold exactly one entry per
    /// column; anything else means the caller broke the signature contract.
    ///
    /// Returns the new row index.
    pub fn push_row(&mut self, entity: Entity, mut values: TakenRow) -> usize {
        let row = self.entities.len();
        for (&component, column) in self.columns.iter_mut() {
            let (value, ticks) = values.remove(&component).unwrap_or_else(|| {
                panic!("Table push_row: missing value for ComponentId({})", component.0)
            });
            column.push(value, ticks);
        }
        assert!(
            values.is_empty(),
            "Table push_row: {} value(s) had no matching column",
            values.len()
        );
        self.entities.push(entity);
        self.entity_to_row.insert(entity.id, row);
        row
    }

    pub fn row_of(&self, entity_id: u32) -> Option<usize> {
        self.entity_to_row.get(&entity_id).copied()
    }

    pub fn has(&self, entity_id: u32) -> bool {
        self.entity_to_row.contains_key(&entity_id)
    }

    pub fn entity_at(&self, row: usize) -> Entity {
        self.entities[row]
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Remove `entity`'s row, dropping its values. Every column, the entity
    /// list, and the row map are updated together. Returns the entity that
    /// was swapped into the freed row, if any, so the caller can repoint its
    /// stored location.
    pub fn swap_remove(&mut self, entity_id: u32) -> Option<Option<Entity>> {
        let row = self.entity_to_row.remove(&entity_id)?;
        for column in self.columns.values_mut() {
            column.swap_remove(row);
        }
        self.entities.swap_remove(row);
        Some(self.fix_moved(row))
    }

    /// Remove `entity`'s row, returning its values for re-insertion into
    /// another table. Same swap-remove bookkeeping as [`swap_remove`].
    pub fn take_row(&mut self, entity_id: u32) -> Option<(TakenRow, Option<Entity>)> {
        let row = self.entity_to_row.remove(&entity_id)?;
        let mut taken: TakenRow = HashMap::with_capacity(self.columns.len());
        for (&component, column) in self.columns.iter_mut() {
            taken.insert(component, column.take(row));
        }
        self.entities.swap_remove(row);
        let moved = self.fix_moved(row);
        Some((taken, moved))
    }

    /// After a swap-remove at `row`, update the row map for whichever entity
    /// now occupies it.
    fn fix_moved(&mut self, row: usize) -> Option<Entity> {
        if row < self.entities.len() {
            let moved = self.entities[row];
            self.entity_to_row.insert(moved.id, row);
            Some(moved)
        } else {
            None
        }
    }

    /// Drop every row. Columns survive empty.
    pub fn clear(&mut self) {
        for column in self.columns.values_mut() {
            column.data.clear();
            column.ticks.clear();
        }
        self.entities.clear();
        self.entity_to_row.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::change_detection::Tick;

    const POS: ComponentId = ComponentId(0);
    const VEL: ComponentId = ComponentId(1);

    fn entity(id: u32) -> Entity {
        Entity { id, generation: 0 }
    }

    fn row(values: &[(ComponentId, u32)]) -> TakenRow {
        values
            .iter()
            .map(|&(id, v)| {
                (
                    id,
                    (
                        Box::new(v) as Box<dyn Any + Send + Sync>,
                        ComponentTicks::new(Tick(1)),
                    ),
                )
            })
            .collect()
    }

    #[test]
    fn push_and_read_rows() {
        let mut table = Table::new([POS, VEL]);
        table.push_row(entity(0), row(&[(POS, 10), (VEL, 100)]));
        table.push_row(entity(1), row(&[(POS, 11), (VEL, 101)]));

        assert_eq!(table.len(), 2);
        let r = table.row_of(1).unwrap();
        assert_eq!(*table.column(POS).unwrap().get::<u32>(r), 11);
        assert_eq!(*table.column(VEL).unwrap().get::<u32>(r), 101);
    }

    #[test]
    fn swap_remove_updates_every_column_and_the_map() {
        let mut table = Table::new([POS, VEL]);
        table.push_row(entity(0), row(&[(POS, 10), (VEL, 100)]));
        table.push_row(entity(1), row(&[(POS, 11), (VEL, 101)]));
        table.push_row(entity(2), row(&[(POS, 12), (VEL, 102)]));

        let moved = table.swap_remove(0).unwrap();
        assert_eq!(moved, Some(entity(2))); // last row filled the hole

        assert!(!table.has(0));
        assert_eq!(table.len(), 2);
        // The survivor is addressable at its new row, in both columns.
        let r = table.row_of(2).unwrap();
        assert_eq!(r, 0);
        assert_eq!(*table.column(POS).unwrap().get::<u32>(r), 12);
        assert_eq!(*table.column(VEL).unwrap().get::<u32>(r), 102);
    }

    #[test]
    fn swap_remove_last_row_reports_no_move() {
        let mut table = Table::new([POS]);
        table.push_row(entity(0), row(&[(POS, 1)]));
        let moved = table.swap_remove(0).unwrap();
        assert_eq!(moved, None);
        assert!(table.is_empty());
    }

    #[test]
    fn swap_remove_unknown_entity_is_none() {
        let mut table = Table::new([POS]);
        assert!(table.swap_remove(42).is_none());
    }

    #[test]
    fn take_row_moves_values_and_ticks() {
        let mut table = Table::new([POS]);
        table.push_row(entity(0), row(&[(POS, 7)]));

        let (taken, moved) = table.take_row(0).unwrap();
        assert!(moved.is_none());
        let (value, ticks) = &taken[&POS];
        assert_eq!(*value.downcast_ref::<u32>().unwrap(), 7);
        assert_eq!(ticks.added, Tick(1));
    }

    #[test]
    #[should_panic(expected = "missing value")]
    fn push_row_with_missing_column_panics() {
        let mut table = Table::new([POS, VEL]);
        table.push_row(entity(0), row(&[(POS, 1)]));
    }

    #[test]
    fn zero_column_table_still_tracks_entities() {
        // Archetypes whose components are all sparse still occupy a table row
        // for entity bookkeeping.
        let mut table = Table::new([]);
        table.push_row(entity(3), TakenRow::new());
        assert!(table.has(3));
        assert_eq!(table.swap_remove(3).unwrap(), None);
    }
}
