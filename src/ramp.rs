//! Ramp engine
//!
//! Gradual transitions of a single control value (rod insertion, pump flow,
//! system pressure). Each ramp is a tokio task that sleeps one interval, then
//! moves the value one step toward its target, until it snaps onto the target.
//!
//! At most one ramp per target is active. Starting a ramp on a target that
//! already has one supersedes it: the old task notices on its next step and
//! stops without writing. The supersession check and the write happen under the
//! registry lock, so a superseded ramp can never write after its successor
//! has been registered.
//!
//! Lock order: the registry lock may be held while the surface is written.
//! Callers must never query the engine while holding the surface's own lock.

use log::{debug, trace};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::lattice::ElementId;
use crate::state::PumpId;

/// Distance at which a ramp snaps onto its target
pub const RAMP_TOLERANCE: f64 = 0.01;

/// Control value a ramp drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RampTarget {
    Rod(ElementId),
    Pump(PumpId),
    Pressure,
}

impl fmt::Display for RampTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RampTarget::Rod(id) => write!(f, "rod {id}"),
            RampTarget::Pump(id) => write!(f, "pump {id}"),
            RampTarget::Pressure => f.write_str("pressure"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampSpec {
    pub target: RampTarget,
    pub value: f64,
    /// Change per interval, sign ignored
    pub step: f64,
    pub interval: Duration,
}

impl RampSpec {
    pub fn new(target: RampTarget, value: f64, step: f64, interval: Duration) -> Self {
        Self {
            target,
            value,
            step,
            interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampOutcome {
    /// Value reached the target
    Completed,
    /// Superseded by a newer ramp or cancelled explicitly
    Cancelled,
    /// Target vanished or the task died
    Aborted,
}

/// Where ramps read and write their values
pub trait RampSurface: Send + Sync + 'static {
    fn read(&self, target: RampTarget) -> Option<f64>;
    fn write(&self, target: RampTarget, value: f64);
}

/// Completion signal of a started ramp
#[derive(Debug)]
pub struct RampHandle {
    target: RampTarget,
    join: JoinHandle<RampOutcome>,
}

impl RampHandle {
    pub fn target(&self) -> RampTarget {
        self.target
    }

    pub async fn wait(self) -> RampOutcome {
        self.join.await.unwrap_or(RampOutcome::Aborted)
    }
}

#[derive(Debug, Default)]
struct Registry {
    next_generation: u64,
    active: HashMap<RampTarget, u64>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of running ramps, one per target
#[derive(Debug, Clone, Default)]
pub struct RampEngine {
    registry: Arc<Mutex<Registry>>,
}

impl RampEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a ramp, superseding any ramp already driving the same target.
    /// Must be called from within a tokio runtime.
    pub fn start<S: RampSurface>(&self, surface: Arc<S>, spec: RampSpec) -> RampHandle {
        let generation = register(&mut lock(&self.registry), spec.target);
        self.spawn_steps(surface, spec, generation)
    }

    /// Like [`RampEngine::start`], but only if `admit` holds. `admit` runs
    /// under the registry lock, so a `cancel_all` issued after a state change
    /// that `admit` observes can never miss the new ramp.
    pub fn start_if<S, F>(&self, surface: Arc<S>, spec: RampSpec, admit: F) -> Option<RampHandle>
    where
        S: RampSurface,
        F: FnOnce() -> bool,
    {
        let generation = {
            let mut reg = lock(&self.registry);
            if !admit() {
                debug!("Ramp on {} refused", spec.target);
                return None;
            }
            register(&mut reg, spec.target)
        };
        Some(self.spawn_steps(surface, spec, generation))
    }

    fn spawn_steps<S: RampSurface>(&self, surface: Arc<S>, spec: RampSpec, generation: u64) -> RampHandle {
        debug!(
            "Ramp on {} -> {:.2} (step {:.2} every {:?})",
            spec.target, spec.value, spec.step, spec.interval
        );

        let registry = Arc::clone(&self.registry);
        let join = tokio::spawn(async move {
            loop {
                tokio::time::sleep(spec.interval).await;
                if let Some(outcome) = advance(&registry, surface.as_ref(), &spec, generation) {
                    return outcome;
                }
            }
        });

        RampHandle {
            target: spec.target,
            join,
        }
    }

    pub fn is_active(&self, target: RampTarget) -> bool {
        lock(&self.registry).active.contains_key(&target)
    }

    pub fn active_targets(&self) -> Vec<RampTarget> {
        let mut targets: Vec<_> = lock(&self.registry).active.keys().copied().collect();
        targets.sort();
        targets
    }

    /// Cancel every ramp whose target matches; takes effect at each ramp's
    /// next step. Returns how many were cancelled.
    pub fn cancel_where<F: Fn(RampTarget) -> bool>(&self, pred: F) -> usize {
        let mut reg = lock(&self.registry);
        let before = reg.active.len();
        reg.active.retain(|&target, _| !pred(target));
        before - reg.active.len()
    }

    pub fn cancel_all(&self) -> usize {
        self.cancel_where(|_| true)
    }
}

/// Record a new generation for `target`, superseding any older one
fn register(reg: &mut Registry, target: RampTarget) -> u64 {
    reg.next_generation += 1;
    let generation = reg.next_generation;
    if reg.active.insert(target, generation).is_some() {
        debug!("Ramp on {target} superseded");
    }
    generation
}

/// One ramp step. Returns `Some` once the ramp is finished.
fn advance<S: RampSurface + ?Sized>(
    registry: &Mutex<Registry>,
    surface: &S,
    spec: &RampSpec,
    generation: u64,
) -> Option<RampOutcome> {
    let mut reg = lock(registry);
    if reg.active.get(&spec.target) != Some(&generation) {
        trace!("Ramp on {} stopped after supersession", spec.target);
        return Some(RampOutcome::Cancelled);
    }

    let Some(current) = surface.read(spec.target) else {
        reg.active.remove(&spec.target);
        return Some(RampOutcome::Aborted);
    };

    let step = spec.step.abs().max(RAMP_TOLERANCE);
    let remaining = spec.value - current;
    let next = if remaining.abs() <= step {
        spec.value
    } else {
        current + step * remaining.signum()
    };

    if (spec.value - next).abs() <= RAMP_TOLERANCE {
        surface.write(spec.target, spec.value);
        reg.active.remove(&spec.target);
        return Some(RampOutcome::Completed);
    }

    surface.write(spec.target, next);
    None
}
