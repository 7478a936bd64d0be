//! App builder and frame driver.
//!
//! The [`App`] owns a [`World`] and two [`Schedule`]s (startup and per-frame)
//! and drives the frame loop. Configure with the builder methods, then either
//! hand control over with [`App::run`] or, when a host environment owns the
//! frame callback, call [`App::update`] once per host frame.
//!
//! ## Example
//!
//! ```ignore
//! use norn::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugin(DefaultPlugins)
//!         .add_event::<Collision>()
//!         .add_startup_system(setup)
//!         .add_system(SystemDescriptor::new(movement).label("movement"))
//!         .run();
//! }
//! ```
//!
//! Each frame: the [`Time`] resource is refreshed, the world's change tick
//! advances, and the schedule runs its five stages (flushing commands at
//! every stage boundary). Startup systems run exactly once, before the first
//! frame, followed by a command flush.

use crate::ecs::events::Events;
use crate::ecs::schedule::{CoreStage, IntoSystemDescriptor, Schedule, SystemDescriptor};
use crate::ecs::world::World;
use crate::time::Time;

/// A plugin bundles related configuration: resources, systems, events.
pub trait Plugin {
    fn build(&self, app: &mut App);
}

/// Marker resource that stops [`App::run`] at the end of the current frame.
pub struct AppExit;

/// Owns the world and schedules; drives the frame loop.
pub struct App {
    pub world: World,
    /// Systems that run exactly once before the first frame.
    pub startup: Schedule,
    /// Systems that run every frame, staged.
    pub schedule: Schedule,
    started: bool,
}

impl App {
    /// An empty app: no systems, no resources beyond what startup seeds.
    pub fn new() -> Self {
        Self {
            world: World::new(),
            startup: Schedule::new(),
            schedule: Schedule::new(),
            started: false,
        }
    }

    // ── Configuration (builder style) ───────────────────────────────

    /// Insert a resource into the world.
    pub fn insert_resource<T: 'static + Send + Sync>(mut self, value: T) -> Self {
        self.world.insert_resource(value);
        self
    }

    /// Register a component type with an explicit storage kind.
    pub fn register_component<T: 'static + Send + Sync>(
        mut self,
        storage: crate::ecs::component::StorageKind,
    ) -> Self {
        self.world.register_component::<T>(storage);
        self
    }

    /// Add a system that runs once at startup.
    pub fn add_startup_system<M>(mut self, system: impl IntoSystemDescriptor<M>) -> Self {
        self.startup.add_system(system);
        self
    }

    /// Add a per-frame system (bare function/closure, or a configured
    /// [`SystemDescriptor`]).
    pub fn add_system<M>(mut self, system: impl IntoSystemDescriptor<M>) -> Self {
        self.schedule.add_system(system);
        self
    }

    /// Apply a plugin.
    pub fn add_plugin<P: Plugin>(mut self, plugin: P) -> Self {
        plugin.build(&mut self);
        self
    }

    /// Register an event type: inserts the [`Events<T>`] resource and a
    /// First-stage system that swaps its buffers once per frame. Events sent
    /// during frame N become readable in frame N+1, for exactly one frame.
    pub fn add_event<T: 'static + Send + Sync>(mut self) -> Self {
        if self.world.has_resource::<Events<T>>() {
            return self;
        }
        self.world.insert_resource(Events::<T>::new());
        self.schedule.add_system(
            SystemDescriptor::new(|world: &mut World| {
                let tick = world.change_tick();
                if let Some(events) = world.get_resource_mut::<Events<T>>() {
                    events.update(tick);
                }
            })
            .label(format!("events::{}", std::any::type_name::<T>()))
            .in_stage(CoreStage::First),
        );
        self
    }

    // ── Driving ─────────────────────────────────────────────────────

    /// Run startup systems if they have not run yet, flushing commands after.
    fn ensure_started(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        if !self.world.has_resource::<Time>() {
            self.world.insert_resource(Time::new());
        }
        log::info!(
            "Startup: {} system(s), {} per-frame system(s)",
            self.startup.len(),
            self.schedule.len()
        );
        self.startup.run(&mut self.world);
    }

    /// Run a single frame: refresh [`Time`], advance the change tick, run
    /// every stage. Runs startup first if it has not happened. This is the
    /// entry point for hosts that own the frame callback, and for tests.
    pub fn update(&mut self) {
        self.ensure_started();
        self.world.resource_mut::<Time>().update();
        self.world.increment_change_tick();
        self.schedule.run(&mut self.world);
    }

    /// Drive frames until [`stop`](App::stop) is called (or an [`AppExit`]
    /// resource is inserted by a system).
    pub fn run(mut self) {
        // A leftover exit marker (from a previous run or reset) must not
        // stop the loop before it starts.
        let _ = self.world.remove_resource::<AppExit>();
        self.ensure_started();
        log::info!("App loop starting");
        loop {
            self.update();
            if self.world.has_resource::<AppExit>() {
                break;
            }
        }
        log::info!("App loop stopped");
    }

    /// Request the loop to stop at the end of the current frame.
    pub fn stop(&mut self) {
        self.world.insert_resource(AppExit);
    }

    /// Clear the world's entities, re-seed [`Time`], and run the startup
    /// systems again. Resources and registered events survive the reset.
    pub fn reset(&mut self) {
        log::info!("App reset");
        self.world.clear();
        self.world.insert_resource(Time::new());
        self.startup.run(&mut self.world);
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

// ── Default plugins ─────────────────────────────────────────────────────

/// Baseline configuration: the logger and the [`Time`] resource.
pub struct DefaultPlugins;

impl Plugin for DefaultPlugins {
    fn build(&self, app: &mut App) {
        init_logger();
        app.world.insert_resource(Time::new());
    }
}

/// Initialize `env_logger` once; safe to call repeatedly (later calls are
/// no-ops). Controlled by `RUST_LOG` as usual.
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env().try_init();
}
