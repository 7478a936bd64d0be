//! # Component Registry — Stable Integer Identity for Component Types
//!
//! Components are plain `'static + Send + Sync` values; the runtime stores
//! them without compile-time enumeration. To do that it needs a way to talk
//! about component *types* at runtime.
//!
//! ## Identity
//!
//! Deriving identity from a type's name string is fragile (name collisions,
//! symbol mangling). Instead, [`Components`] assigns each type a dense
//! [`ComponentId`] the first time it is registered and keeps the
//! `TypeId -> ComponentId` mapping for the life of the world. Everything
//! downstream (storage, archetype signatures, transition edges) keys on the
//! integer id, never on a name. Names are recorded purely for log and panic
//! messages.
//!
//! ## Storage choice
//!
//! Registration also fixes the type's [`StorageKind`]: `Table` rows live in
//! the owning archetype's columnar table and move on archetype transitions;
//! `SparseSet` values live in one per-type set and stay put. Register
//! explicitly at startup (via
//! [`App::register_component`](crate::app::App::register_component)) to pick
//! a kind; types first seen mid-run are registered on demand as `Table`.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Dense integer identity for a registered component type.
///
/// Ids are assigned in registration order, starting at 0, and never change
/// for the life of the [`World`](super::world::World).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    /// Returns the raw index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which backend stores values of a component type.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum StorageKind {
    /// Columnar storage inside the owning archetype's table. Iteration-
    /// friendly; values move when the entity changes archetype.
    #[default]
    Table,
    /// One sparse set for the whole world. Values never move on archetype
    /// transitions, which makes frequent add/remove of the type cheap.
    SparseSet,
}

/// Metadata recorded for one registered component type.
#[derive(Clone, Copy, Debug)]
pub struct ComponentInfo {
    pub id: ComponentId,
    pub type_id: TypeId,
    /// Diagnostic name only. Never used for identity.
    pub name: &'static str,
    pub storage: StorageKind,
}

/// The component registry: one [`ComponentInfo`] per registered type.
#[derive(Default)]
pub struct Components {
    infos: Vec<ComponentInfo>,
    by_type: HashMap<TypeId, ComponentId>,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` with the given storage kind, returning its id.
    ///
    /// Registering the same type twice is idempotent; the first registration
    /// wins, and a conflicting storage kind on a later call is ignored with a
    /// warning (storage cannot be migrated once values exist).
    pub fn register<T: 'static + Send + Sync>(&mut self, storage: StorageKind) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.by_type.get(&type_id) {
            let info = &self.infos[id.index()];
            if info.storage != storage {
                log::warn!(
                    "Component `{}` already registered with {:?} storage; ignoring {:?}",
                    info.name,
                    info.storage,
                    storage
                );
            }
            return id;
        }
        let id = ComponentId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            type_id,
            name: std::any::type_name::<T>(),
            storage,
        });
        self.by_type.insert(type_id, id);
        id
    }

    /// Look up `T`'s id, registering it on demand with `Table` storage.
    pub fn get_or_register<T: 'static + Send + Sync>(&mut self) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.by_type.get(&type_id) {
            return id;
        }
        log::debug!(
            "Component `{}` registered on demand (Table storage)",
            std::any::type_name::<T>()
        );
        self.register::<T>(StorageKind::Table)
    }

    /// Same as [`get_or_register`](Self::get_or_register) but keyed by a
    /// type-erased `TypeId` plus its diagnostic name. Used when applying
    /// boxed commands.
    pub(crate) fn get_or_register_raw(
        &mut self,
        type_id: TypeId,
        name: &'static str,
    ) -> ComponentId {
        if let Some(&id) = self.by_type.get(&type_id) {
            return id;
        }
        let id = ComponentId(self.infos.len() as u32);
        log::debug!("Component `{name}` registered on demand (Table storage)");
        self.infos.push(ComponentInfo {
            id,
            type_id,
            name,
            storage: StorageKind::Table,
        });
        self.by_type.insert(type_id, id);
        id
    }

    /// Look up an already-registered type. `None` if never registered.
    pub fn get_id(&self, type_id: TypeId) -> Option<ComponentId> {
        self.by_type.get(&type_id).copied()
    }

    /// Metadata for a registered id.
    ///
    /// # Panics
    ///
    /// Panics on an id this registry never issued; that indicates a corrupted
    /// internal invariant, not user error.
    pub fn info(&self, id: ComponentId) -> &ComponentInfo {
        self.infos
            .get(id.index())
            .unwrap_or_else(|| panic!("Unknown ComponentId({}): registry corrupted", id.0))
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

/// A type-erased component value paired with its type identity.
///
/// This is the currency of deferred commands and bundles: components travel
/// as `BoxedComponent`s until they land in storage.
pub struct BoxedComponent {
    pub(crate) type_id: TypeId,
    /// Diagnostic name only.
    pub(crate) type_name: &'static str,
    pub(crate) value: Box<dyn Any + Send + Sync>,
}

impl BoxedComponent {
    pub fn new<T: 'static + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position;
    struct Velocity;

    #[test]
    fn ids_are_dense_and_stable() {
        let mut components = Components::new();
        let a = components.register::<Position>(StorageKind::Table);
        let b = components.register::<Velocity>(StorageKind::SparseSet);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        // Re-registration returns the original id.
        assert_eq!(components.register::<Position>(StorageKind::Table), a);
        assert_eq!(components.get_or_register::<Velocity>(), b);
        assert_eq!(components.len(), 2);
    }

    #[test]
    fn conflicting_storage_kind_keeps_first() {
        let mut components = Components::new();
        let id = components.register::<Position>(StorageKind::SparseSet);
        components.register::<Position>(StorageKind::Table);
        assert_eq!(components.info(id).storage, StorageKind::SparseSet);
    }

    #[test]
    fn on_demand_registration_defaults_to_table() {
        let mut components = Components::new();
        let id = components.get_or_register::<Position>();
        assert_eq!(components.info(id).storage, StorageKind::Table);
    }

    #[test]
    fn lookup_unregistered_is_none() {
        let components = Components::new();
        assert!(components.get_id(TypeId::of::<Position>()).is_none());
    }

    #[test]
    #[should_panic(expected = "registry corrupted")]
    fn unknown_id_panics() {
        let components = Components::new();
        components.info(ComponentId(7));
    }

    #[test]
    fn boxed_component_carries_identity() {
        let boxed = BoxedComponent::new(Position);
        assert_eq!(boxed.type_id(), TypeId::of::<Position>());
        assert!(boxed.type_name().contains("Position"));
    }
}
