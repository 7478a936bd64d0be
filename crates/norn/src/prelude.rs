//! Convenience re-exports for application code.

pub use crate::app::{App, AppExit, DefaultPlugins, Plugin};
pub use crate::ecs::bundle::Bundle;
pub use crate::ecs::change_detection::{ComponentTicks, Mut, Tick};
pub use crate::ecs::commands::Commands;
pub use crate::ecs::component::StorageKind;
pub use crate::ecs::entity::Entity;
pub use crate::ecs::events::{EventReader, Events};
pub use crate::ecs::observer::{ObserverDescriptor, Trigger};
pub use crate::ecs::query::Query;
pub use crate::ecs::schedule::{CoreStage, Schedule, SystemDescriptor};
pub use crate::ecs::world::{EntityBuilder, World};
pub use crate::time::Time;
