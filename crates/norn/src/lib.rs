//! # Norn — Archetype-Based ECS Runtime
//!
//! A single-threaded, frame-driven Entity-Component-System runtime: entity
//! lifecycle with generational ids, archetype storage with a cached
//! transition graph, tick-based change detection, a filtering query engine,
//! deferred commands, double-buffered events, reactive observers, and a
//! staged scheduler.
//!
//! Gameplay, rendering, audio, and input are consumers of this crate, not
//! part of it. Start with `use norn::prelude::*` and build an
//! [`App`](app::App).

pub mod app;
pub mod ecs;
pub mod prelude;
pub mod time;
