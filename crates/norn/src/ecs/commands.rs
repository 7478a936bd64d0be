//! # Commands — Deferred Structural Mutation
//!
//! A system iterating a query must not spawn, despawn, or move entities
//! mid-loop: structural mutation reshuffles table rows underneath the
//! iterator. Instead, systems record what they want as [`Command`] values and
//! the world applies the whole batch at a defined flush point
//! ([`World::apply_commands`](super::world::World::apply_commands), called
//! once per schedule stage).
//!
//! ## Ordering and liveness
//!
//! Commands are pure data until applied, and they apply strictly FIFO: a
//! spawn queued before a despawn of the same entity really does spawn first,
//! so the entity is observed as "existed, then removed", never "never
//! existed". A command targeting an entity that died earlier in the batch is
//! skipped silently (with a trace log); a despawn racing a stale mutation in
//! the same batch is common and harmless.
//!
//! ## Building commands
//!
//! [`Commands`] is a short-lived handle over the world's queue:
//!
//! ```ignore
//! let mut commands = world.commands();
//! commands
//!     .spawn()
//!     .insert(Position { x: 0.0, y: 0.0 })
//!     .insert(Enemy)
//!     .on_spawn(|_world, entity| log::info!("spawned {entity}"));
//! commands.despawn(old);
//! ```
//!
//! The spawned entity does not exist until the flush; the `on_spawn` callback
//! is how code gets hold of the freshly minted [`Entity`].

use std::any::{Any, TypeId};

use super::bundle::Bundle;
use super::component::BoxedComponent;
use super::entity::Entity;
use super::world::World;

/// Callback invoked right after a deferred spawn materializes.
pub type OnSpawn = Box<dyn FnOnce(&mut World, Entity) + Send + Sync>;

/// A spawn that has been queued but not yet applied.
pub struct PendingSpawn {
    pub(crate) components: Vec<BoxedComponent>,
    pub(crate) on_spawn: Option<OnSpawn>,
}

/// One deferred mutation. Pure data (plus the opaque on-spawn callback)
/// until [`World::apply_commands`](super::world::World::apply_commands)
/// executes it.
pub enum Command {
    /// Mint a new entity and insert the accumulated components one by one.
    Spawn(PendingSpawn),
    /// Remove an entity and all its components.
    Despawn(Entity),
    /// Insert (or replace) one component on an existing entity.
    Insert {
        entity: Entity,
        component: BoxedComponent,
    },
    /// Remove one component from an existing entity.
    Remove {
        entity: Entity,
        type_id: TypeId,
        type_name: &'static str,
    },
    /// Insert (or replace) a world resource.
    InsertResource {
        type_id: TypeId,
        value: Box<dyn Any + Send + Sync>,
    },
    /// Remove a world resource.
    RemoveResource { type_id: TypeId },
}

/// FIFO buffer of deferred commands.
#[derive(Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Move every command out of `other` onto the end of this queue.
    pub(crate) fn append(&mut self, other: &mut CommandQueue) {
        self.commands.append(&mut other.commands);
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Command> + '_ {
        self.commands.drain(..)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Handle for recording deferred mutations into a [`CommandQueue`].
///
/// Obtained from [`World::commands`](super::world::World::commands), or
/// handed to query closures by
/// [`Query::for_each`](super::query::Query::for_each) so that structural
/// changes discovered during iteration stay deferred.
pub struct Commands<'a> {
    queue: &'a mut CommandQueue,
}

impl<'a> Commands<'a> {
    pub(crate) fn new(queue: &'a mut CommandQueue) -> Self {
        Self { queue }
    }

    /// Queue an entity spawn. Returns a builder for its components.
    pub fn spawn(&mut self) -> EntityCommands<'_> {
        let index = self.queue.len();
        self.queue.push(Command::Spawn(PendingSpawn {
            components: Vec::new(),
            on_spawn: None,
        }));
        EntityCommands {
            queue: &mut *self.queue,
            index,
        }
    }

    /// Queue an entity spawn from a [`Bundle`]. Further components can still
    /// be chained on the returned builder.
    pub fn spawn_bundle<B: Bundle>(&mut self, bundle: B) -> EntityCommands<'_> {
        let index = self.queue.len();
        self.queue.push(Command::Spawn(PendingSpawn {
            components: bundle.components(),
            on_spawn: None,
        }));
        EntityCommands {
            queue: &mut *self.queue,
            index,
        }
    }

    /// Queue an entity despawn.
    pub fn despawn(&mut self, entity: Entity) {
        self.queue.push(Command::Despawn(entity));
    }

    /// Queue a component insert on an existing entity.
    pub fn insert<T: 'static + Send + Sync>(&mut self, entity: Entity, component: T) {
        self.queue.push(Command::Insert {
            entity,
            component: BoxedComponent::new(component),
        });
    }

    /// Queue a component removal.
    pub fn remove<T: 'static + Send + Sync>(&mut self, entity: Entity) {
        self.queue.push(Command::Remove {
            entity,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        });
    }

    /// Queue a resource insert.
    pub fn insert_resource<T: 'static + Send + Sync>(&mut self, value: T) {
        self.queue.push(Command::InsertResource {
            type_id: TypeId::of::<T>(),
            value: Box::new(value),
        });
    }

    /// Queue a resource removal.
    pub fn remove_resource<T: 'static + Send + Sync>(&mut self) {
        self.queue.push(Command::RemoveResource {
            type_id: TypeId::of::<T>(),
        });
    }

    /// Number of commands queued so far (across all handles to this queue).
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Builder for a queued spawn: accumulates components and an optional
/// on-spawn callback on the pending command.
pub struct EntityCommands<'a> {
    queue: &'a mut CommandQueue,
    index: usize,
}

impl EntityCommands<'_> {
    fn pending(&mut self) -> &mut PendingSpawn {
        match &mut self.queue.commands[self.index] {
            Command::Spawn(pending) => pending,
            _ => panic!("EntityCommands no longer points at a Spawn command"),
        }
    }

    /// Add a component to the pending entity.
    pub fn insert<T: 'static + Send + Sync>(mut self, component: T) -> Self {
        self.pending().components.push(BoxedComponent::new(component));
        self
    }

    /// Register a callback that receives the freshly minted [`Entity`] when
    /// the spawn is applied. A later call replaces an earlier one.
    pub fn on_spawn(
        mut self,
        callback: impl FnOnce(&mut World, Entity) + Send + Sync + 'static,
    ) -> Self {
        self.pending().on_spawn = Some(Box::new(callback));
        self
    }
}
