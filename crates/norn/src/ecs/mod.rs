//! # Archetype-Based ECS Runtime
//!
//! The core of the crate: entities, component storage, queries, deferred
//! commands, events, observers, and the staged schedule. The design follows
//! the archetype pattern of [hecs](https://github.com/Ralith/hecs) and
//! [bevy_ecs](https://github.com/bevyengine/bevy), with tick-based change
//! detection and a hybrid table/sparse-set storage split.
//!
//! ## Module Overview
//!
//! - [`entity`] — Generational entity ids
//! - [`component`] — Component registry (dense integer type tags)
//! - [`storage`] — Table and sparse-set backends
//! - [`archetype`] — Signature grouping and the transition-edge graph
//! - [`change_detection`] — Ticks, tick stamps, and the `Mut` accessor
//! - [`query`] — Filtered, change-aware iteration
//! - [`bundle`] — Component groups for spawning
//! - [`commands`] — Deferred structural mutation
//! - [`events`] — Double-buffered message queues
//! - [`observer`] — Lifecycle callback registry
//! - [`schedule`] — Staged system execution
//! - [`world`] — The central container

pub mod archetype;
pub mod bundle;
pub mod change_detection;
pub mod commands;
pub mod component;
pub mod entity;
pub mod events;
pub mod observer;
pub mod query;
pub mod schedule;
pub mod storage;
pub mod world;

pub use change_detection::{ComponentTicks, Mut, Tick};
pub use commands::Commands;
pub use entity::Entity;
pub use events::{EventReader, Events};
pub use observer::{ObserverDescriptor, ObserverRegistry, Trigger};
pub use query::Query;
pub use schedule::{CoreStage, Schedule, ScheduleError, System, SystemDescriptor};
pub use world::World;
