//! # Observers — Lifecycle Callbacks per Component Type
//!
//! An observer is a callback registered for a `(component type, trigger)`
//! pair: `OnAdd`, `OnChange`, or `OnRemove`. Firing a trigger invokes every
//! observer registered under that key, highest priority first.
//!
//! ## Explicit triggering
//!
//! The runtime does NOT fire observers from `insert`/`remove`/mutation
//! accessors. Observers are an opt-in notification layer; the code that
//! performs a lifecycle transition decides whether to announce it, via
//! [`World::trigger`](super::world::World::trigger) (which fetches the live
//! value) or [`ObserverRegistry::trigger`] directly. Automatic firing from
//! inside storage mutation would hand callbacks a world that is mid-change,
//! which is the aliasing the command queue exists to prevent.
//!
//! Callbacks receive a [`Commands`] handle instead of the world itself, so a
//! reaction that needs structural changes queues them for the next flush:
//!
//! ```ignore
//! world.observers_mut().register(ObserverDescriptor::new::<Enemy>(
//!     Trigger::OnAdd,
//!     |commands, entity, _value| {
//!         commands.insert(entity, Healthbar::default());
//!     },
//! ));
//! ```
//!
//! A callback that panics is not caught here; the panic propagates to the
//! trigger call site.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use super::commands::Commands;
use super::entity::Entity;

/// Lifecycle moments observers can hook.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Trigger {
    OnAdd,
    OnChange,
    OnRemove,
}

/// Observer callback. Receives a commands handle for deferred reactions, the
/// entity the trigger concerns, and the component value when the caller had
/// one to give (removals usually fire after the value is gone).
pub type ObserverFn = Box<dyn FnMut(&mut Commands, Entity, Option<&dyn Any>) + Send + Sync>;

/// A registered observer.
pub struct Observer {
    priority: i32,
    callback: ObserverFn,
}

impl Observer {
    /// Higher runs earlier. Ties run in registration order.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn invoke(
        &mut self,
        commands: &mut Commands,
        entity: Entity,
        value: Option<&dyn Any>,
    ) {
        (self.callback)(commands, entity, value);
    }
}

/// Everything needed to register one observer.
pub struct ObserverDescriptor {
    pub type_id: TypeId,
    pub trigger: Trigger,
    pub priority: i32,
    pub callback: ObserverFn,
}

impl ObserverDescriptor {
    /// Observer for component type `T` at priority 0.
    pub fn new<T: 'static>(
        trigger: Trigger,
        callback: impl FnMut(&mut Commands, Entity, Option<&dyn Any>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            trigger,
            priority: 0,
            callback: Box::new(callback),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Callback registry keyed by `(component type, trigger)`.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: HashMap<(TypeId, Trigger), Vec<Observer>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. The list for its key stays sorted by descending
    /// priority; equal priorities keep registration order.
    pub fn register(&mut self, descriptor: ObserverDescriptor) {
        let list = self
            .observers
            .entry((descriptor.type_id, descriptor.trigger))
            .or_default();
        list.push(Observer {
            priority: descriptor.priority,
            callback: descriptor.callback,
        });
        // Stable sort: ties keep their insertion order.
        list.sort_by_key(|o| std::cmp::Reverse(o.priority));
    }

    /// Invoke every observer registered for `(type_id, trigger)`, in priority
    /// order. `value` is the component value if the caller has one.
    pub fn trigger(
        &mut self,
        trigger: Trigger,
        entity: Entity,
        type_id: TypeId,
        value: Option<&dyn Any>,
        commands: &mut Commands,
    ) {
        if let Some(list) = self.observers.get_mut(&(type_id, trigger)) {
            for observer in list.iter_mut() {
                (observer.callback)(commands, entity, value);
            }
        }
    }

    /// The observers registered for a key, in dispatch order.
    pub fn get_observers(&self, type_id: TypeId, trigger: Trigger) -> &[Observer] {
        self.observers
            .get(&(type_id, trigger))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Move a key's observer list out, for callers that must release the
    /// registry borrow while dispatching. Pair with [`restore_list`].
    pub(crate) fn take_list(&mut self, type_id: TypeId, trigger: Trigger) -> Vec<Observer> {
        self.observers
            .remove(&(type_id, trigger))
            .unwrap_or_default()
    }

    pub(crate) fn restore_list(
        &mut self,
        type_id: TypeId,
        trigger: Trigger,
        mut list: Vec<Observer>,
    ) {
        if list.is_empty() {
            return;
        }
        // Observers registered during dispatch land in the map; merge and
        // re-sort so they are not lost.
        if let Some(registered_meanwhile) = self.observers.remove(&(type_id, trigger)) {
            list.extend(registered_meanwhile);
            list.sort_by_key(|o| std::cmp::Reverse(o.priority));
        }
        self.observers.insert((type_id, trigger), list);
    }

    /// Drop every registered observer.
    pub fn clear(&mut self) {
        self.observers.clear();
    }
}
