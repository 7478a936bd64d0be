//! # Schedule — Staged, Ordered System Execution
//!
//! A system is a function over `&mut World`. The schedule arranges systems
//! into five fixed stages and runs them once per frame:
//!
//! ```text
//! First -> PreUpdate -> Update -> PostUpdate -> Last
//! ```
//!
//! After each stage completes, the world's command queue is flushed once.
//! Commands issued by a system are therefore visible to systems in LATER
//! stages the same frame, but to systems in the SAME stage only on the next
//! frame's pass.
//!
//! ## Ordering within a stage
//!
//! Systems run in insertion order unless `before`/`after` hints (by label)
//! say otherwise. Hints are resolved by a topological pass that keeps
//! insertion order among unconstrained systems. Two configuration mistakes
//! are handled differently:
//!
//! - A hint naming a label that does not exist in the stage is dropped with
//!   a warning; it cannot constrain anything.
//! - A cycle among hints is a hard configuration error
//!   ([`ScheduleError::OrderingCycle`]). Check for it up front with
//!   [`Schedule::validate`]; an unvalidated cycle panics on the first
//!   [`Schedule::run`]. Silently degrading to insertion order would make
//!   ordering guarantees unreliable precisely when the configuration got
//!   complicated enough to need them.
//!
//! Systems can also carry a `run_criteria` predicate (checked against the
//! world each frame; the system is skipped when it returns false) and an
//! `enabled` flag for static on/off wiring.

use thiserror::Error;

use super::world::World;

/// A system that can be executed on a [`World`].
///
/// Any `FnMut(&mut World)` implements this, so closures and function
/// pointers work directly.
pub trait System {
    fn run(&mut self, world: &mut World);
}

impl<F: FnMut(&mut World)> System for F {
    fn run(&mut self, world: &mut World) {
        (self)(world);
    }
}

/// The five fixed stages a frame's systems run through, in order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CoreStage {
    First,
    PreUpdate,
    Update,
    PostUpdate,
    Last,
}

impl CoreStage {
    /// All stages in execution order.
    pub const ALL: [CoreStage; 5] = [
        CoreStage::First,
        CoreStage::PreUpdate,
        CoreStage::Update,
        CoreStage::PostUpdate,
        CoreStage::Last,
    ];

    fn index(self) -> usize {
        match self {
            CoreStage::First => 0,
            CoreStage::PreUpdate => 1,
            CoreStage::Update => 2,
            CoreStage::PostUpdate => 3,
            CoreStage::Last => 4,
        }
    }
}

/// Predicate deciding each frame whether a system runs.
pub type RunCriteria = Box<dyn Fn(&World) -> bool + Send + Sync>;

/// A system plus its scheduling configuration.
///
/// ```ignore
/// app.add_system(
///     SystemDescriptor::new(apply_damage)
///         .label("damage")
///         .in_stage(CoreStage::PostUpdate)
///         .after("collisions")
///         .with_run_criteria(|world| world.has_resource::<Combat>()),
/// );
/// ```
pub struct SystemDescriptor {
    pub(crate) label: Option<String>,
    pub(crate) stage: CoreStage,
    pub(crate) before: Vec<String>,
    pub(crate) after: Vec<String>,
    pub(crate) enabled: bool,
    pub(crate) run_criteria: Option<RunCriteria>,
    pub(crate) system: Box<dyn System>,
}

impl SystemDescriptor {
    /// Wrap a system with default configuration: Update stage, no label, no
    /// ordering hints, enabled.
    pub fn new<S: System + 'static>(system: S) -> Self {
        Self {
            label: None,
            stage: CoreStage::Update,
            before: Vec::new(),
            after: Vec::new(),
            enabled: true,
            run_criteria: None,
            system: Box::new(system),
        }
    }

    /// Name this system so others can order against it.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn in_stage(mut self, stage: CoreStage) -> Self {
        self.stage = stage;
        self
    }

    /// Run before the system labeled `label` (same stage only).
    pub fn before(mut self, label: impl Into<String>) -> Self {
        self.before.push(label.into());
        self
    }

    /// Run after the system labeled `label` (same stage only).
    pub fn after(mut self, label: impl Into<String>) -> Self {
        self.after.push(label.into());
        self
    }

    /// Skip this system on frames where the predicate returns false.
    pub fn with_run_criteria(mut self, criteria: impl Fn(&World) -> bool + Send + Sync + 'static) -> Self {
        self.run_criteria = Some(Box::new(criteria));
        self
    }

    /// Register the system disabled; it stays in the schedule but never runs
    /// until [`Schedule::set_enabled`] turns it on.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Conversion into a [`SystemDescriptor`], so `add_system` accepts both bare
/// systems and configured descriptors. The `Marker` parameter exists only to
/// keep the two blanket impls coherent.
pub trait IntoSystemDescriptor<Marker> {
    fn into_descriptor(self) -> SystemDescriptor;
}

impl IntoSystemDescriptor<()> for SystemDescriptor {
    fn into_descriptor(self) -> SystemDescriptor {
        self
    }
}

impl<S: System + 'static> IntoSystemDescriptor<fn(&mut World)> for S {
    fn into_descriptor(self) -> SystemDescriptor {
        SystemDescriptor::new(self)
    }
}

/// Configuration errors detected while resolving a stage's ordering.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// `before`/`after` hints form a cycle; no order satisfies them.
    #[error("ordering cycle in {stage:?} among systems [{labels}]")]
    OrderingCycle { stage: CoreStage, labels: String },
    /// Two systems in one stage share a label, making hints ambiguous.
    #[error("duplicate system label `{label}` in {stage:?}")]
    DuplicateLabel { stage: CoreStage, label: String },
}

/// One stage's systems plus the resolved execution order (cached until the
/// system set changes).
#[derive(Default)]
struct StageSystems {
    systems: Vec<SystemDescriptor>,
    order: Option<Vec<usize>>,
}

/// Systems arranged into the five [`CoreStage`]s.
pub struct Schedule {
    stages: [StageSystems; 5],
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            stages: Default::default(),
        }
    }

    /// Add a system (bare or as a configured [`SystemDescriptor`]).
    pub fn add_system<M>(&mut self, system: impl IntoSystemDescriptor<M>) {
        let descriptor = system.into_descriptor();
        let stage = &mut self.stages[descriptor.stage.index()];
        stage.systems.push(descriptor);
        stage.order = None;
    }

    /// Enable or disable a labeled system. Returns `false` if no system in
    /// any stage carries the label.
    pub fn set_enabled(&mut self, label: &str, enabled: bool) -> bool {
        for stage in &mut self.stages {
            for system in &mut stage.systems {
                if system.label.as_deref() == Some(label) {
                    system.enabled = enabled;
                    return true;
                }
            }
        }
        false
    }

    /// Resolve every stage's ordering, reporting the first configuration
    /// error. Safe to call repeatedly; results are cached.
    pub fn validate(&mut self) -> Result<(), ScheduleError> {
        for stage_kind in CoreStage::ALL {
            let stage = &mut self.stages[stage_kind.index()];
            if stage.order.is_none() {
                stage.order = Some(resolve_order(stage_kind, &stage.systems)?);
            }
        }
        Ok(())
    }

    /// Run every stage in order, flushing the world's command queue once
    /// after each stage.
    ///
    /// # Panics
    ///
    /// Panics on an unresolved ordering error; call [`validate`](Self::validate)
    /// first to handle it gracefully.
    pub fn run(&mut self, world: &mut World) {
        for stage_kind in CoreStage::ALL {
            let stage = &mut self.stages[stage_kind.index()];
            if stage.order.is_none() {
                match resolve_order(stage_kind, &stage.systems) {
                    Ok(order) => stage.order = Some(order),
                    Err(e) => panic!("Schedule configuration error: {e}"),
                }
            }
            let order = stage.order.as_ref().unwrap_or_else(|| {
                panic!("Schedule stage {stage_kind:?} has no resolved order")
            });
            for &index in order {
                let system = &mut stage.systems[index];
                if !system.enabled {
                    continue;
                }
                if let Some(criteria) = &system.run_criteria {
                    if !criteria(world) {
                        continue;
                    }
                }
                system.system.run(world);
            }
            world.apply_commands();
        }
    }

    /// Total number of systems across all stages.
    pub fn len(&self) -> usize {
        self.stages.iter().map(|s| s.systems.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Topologically order one stage's systems.
///
/// `before` hints are folded into `after` edges on the target, then a Kahn
/// pass repeatedly takes the first (insertion order) system whose
/// dependencies are all placed. Unknown labels are warned about and dropped;
/// leftover systems mean a cycle.
fn resolve_order(stage: CoreStage, systems: &[SystemDescriptor]) -> Result<Vec<usize>, ScheduleError> {
    let index_of_label = |label: &str| -> Option<usize> {
        systems
            .iter()
            .position(|s| s.label.as_deref() == Some(label))
    };

    // Reject ambiguous labels up front.
    for (i, system) in systems.iter().enumerate() {
        if let Some(label) = &system.label {
            let first = index_of_label(label);
            if first != Some(i) {
                return Err(ScheduleError::DuplicateLabel {
                    stage,
                    label: label.clone(),
                });
            }
        }
    }

    // deps[i] = indices that must run before system i.
    let mut deps: Vec<Vec<usize>> = vec![Vec::new(); systems.len()];
    for (i, system) in systems.iter().enumerate() {
        for label in &system.after {
            match index_of_label(label) {
                Some(j) => deps[i].push(j),
                None => log::warn!(
                    "System in {stage:?} is `after(\"{label}\")` but no system has that label; hint dropped"
                ),
            }
        }
        for label in &system.before {
            match index_of_label(label) {
                Some(j) => deps[j].push(i),
                None => log::warn!(
                    "System in {stage:?} is `before(\"{label}\")` but no system has that label; hint dropped"
                ),
            }
        }
    }

    let mut order = Vec::with_capacity(systems.len());
    let mut placed = vec![false; systems.len()];
    while order.len() < systems.len() {
        let next = (0..systems.len())
            .find(|&i| !placed[i] && deps[i].iter().all(|&j| placed[j]));
        match next {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => {
                let stuck: Vec<String> = (0..systems.len())
                    .filter(|&i| !placed[i])
                    .map(|i| {
                        systems[i]
                            .label
                            .clone()
                            .unwrap_or_else(|| format!("#{i}"))
                    })
                    .collect();
                return Err(ScheduleError::OrderingCycle {
                    stage,
                    labels: stuck.join(", "),
                });
            }
        }
    }
    log::debug!(
        "Resolved {stage:?} order for {} system(s)",
        systems.len()
    );
    Ok(order)
}
