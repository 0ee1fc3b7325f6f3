//! Automatic Reactor Core Control System (ARCCS)
//!
//! Supervisory loop evaluated once per tick while the reactor is running.
//! Power and temperature deviations are corrected directly by nudging the
//! auto rods. Everything else becomes a recommendation batch of operator
//! commands that only runs after `arccs accept`.
//!
//! Messages and recommendations of the same class are rate limited by a
//! per-class cooldown; the auto-rod nudges themselves are not.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

use crate::flux::flux_tilt;
use crate::lattice::{ElementId, ElementKind, Lattice};

/// Power band held by the auto rods [%]
pub const POWER_BAND: (f64, f64) = (85.0, 95.0);
pub const POWER_STEP: f64 = 1.0;

/// Coolant temperature above which the auto rods are driven in [K]
pub const TEMP_LIMIT: f64 = 600.0;
pub const TEMP_STEP: f64 = 2.0;

/// Automation never drives auto rods past these insertions [%]
pub const AUTO_ROD_BOUNDS: (f64, f64) = (5.0, 95.0);

pub const TILT_LIMIT: f64 = 1.5;
pub const TILT_RADIUS: f64 = 2.5;
pub const TILT_STEP: f64 = 10.0;

/// Fuel channels below this are considered depleted [%]
pub const FUEL_LIMIT: f64 = 10.0;
pub const FUEL_RADIUS: f64 = 2.0;

/// Minimum total pump flow while running
pub const FLOW_LIMIT: f64 = 300.0;

/// Class of controller finding, used for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Advisory {
    PowerHigh,
    PowerLow,
    TempHigh,
    FluxTilt,
    FuelDepleted,
    FlowLow,
}

impl Advisory {
    pub fn cooldown(self) -> Duration {
        match self {
            Advisory::PowerHigh | Advisory::PowerLow => Duration::from_secs(10),
            Advisory::TempHigh => Duration::from_secs(15),
            Advisory::FlowLow => Duration::from_secs(20),
            Advisory::FluxTilt => Duration::from_secs(30),
            Advisory::FuelDepleted => Duration::from_secs(60),
        }
    }
}

/// Plant values the controller looks at
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub power: f64,
    pub coolant_temp: f64,
    pub total_flow: f64,
    pub flux: &'a BTreeMap<ElementId, f64>,
    pub fuel: &'a BTreeMap<ElementId, f64>,
    pub rods: &'a BTreeMap<ElementId, f64>,
}

/// Result of one evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    /// Insertion change for every auto rod, positive inserts
    pub auto_rod_delta: f64,
    /// Log lines that passed the cooldown
    pub messages: Vec<String>,
}

/// Move an auto rod by `delta` without automation crossing the bounds.
/// A rod already outside the bounds is left where the operator put it.
pub fn nudge(current: f64, delta: f64) -> f64 {
    let (lo, hi) = AUTO_ROD_BOUNDS;
    if delta > 0.0 {
        if current >= hi {
            current
        } else {
            (current + delta).min(hi)
        }
    } else if delta < 0.0 {
        if current <= lo {
            current
        } else {
            (current + delta).max(lo)
        }
    } else {
        current
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arccs {
    enabled: bool,
    last_emitted: HashMap<Advisory, Instant>,
    pending: Vec<String>,
}

impl Arccs {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last_emitted: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Recommendation batch awaiting operator approval
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// True (and the cooldown restarted) if `class` may emit now
    fn may_emit(&mut self, class: Advisory, now: Instant) -> bool {
        match self.last_emitted.get(&class) {
            Some(&last) if now.saturating_duration_since(last) < class.cooldown() => false,
            _ => {
                self.last_emitted.insert(class, now);
                true
            }
        }
    }

    fn recommend(&mut self, commands: Vec<String>) {
        for cmd in commands {
            if !self.pending.contains(&cmd) {
                self.pending.push(cmd);
            }
        }
    }

    pub fn evaluate(&mut self, lattice: &Lattice, obs: &Observation<'_>, now: Instant) -> Decision {
        let mut decision = Decision::default();
        if !self.enabled {
            return decision;
        }

        let (low, high) = POWER_BAND;
        let correction = if obs.coolant_temp > TEMP_LIMIT {
            Some((
                Advisory::TempHigh,
                TEMP_STEP,
                format!("ARCCS: coolant {:.0} K above {TEMP_LIMIT:.0} K, inserting auto rods", obs.coolant_temp),
            ))
        } else if obs.power > high {
            Some((
                Advisory::PowerHigh,
                POWER_STEP,
                format!("ARCCS: power {:.1}% above band, inserting auto rods", obs.power),
            ))
        } else if obs.power < low {
            Some((
                Advisory::PowerLow,
                -POWER_STEP,
                format!("ARCCS: power {:.1}% below band, withdrawing auto rods", obs.power),
            ))
        } else {
            None
        };

        if let Some((class, delta, message)) = correction {
            decision.auto_rod_delta = delta;
            if self.may_emit(class, now) {
                decision.messages.push(message);
            }
        }

        if let Some(tilt) = flux_tilt(obs.flux).filter(|&t| t > TILT_LIMIT) {
            if self.may_emit(Advisory::FluxTilt, now) {
                let commands = tilt_recommendations(lattice, obs);
                decision.messages.push(format!(
                    "ARCCS: flux tilt {tilt:.2}, {} command(s) recommended (arccs accept)",
                    commands.len()
                ));
                self.recommend(commands);
            }
        }

        let depleted: Vec<ElementId> = obs
            .fuel
            .iter()
            .filter(|(_, f)| **f < FUEL_LIMIT)
            .map(|(&id, _)| id)
            .collect();
        if !depleted.is_empty() && self.may_emit(Advisory::FuelDepleted, now) {
            let commands = depletion_recommendations(lattice, &depleted);
            decision.messages.push(format!(
                "ARCCS: {} depleted fuel channel(s), {} command(s) recommended (arccs accept)",
                depleted.len(),
                commands.len()
            ));
            self.recommend(commands);
        }

        if obs.total_flow < FLOW_LIMIT && self.may_emit(Advisory::FlowLow, now) {
            decision.messages.push(format!(
                "ARCCS: coolant flow {:.0} below {FLOW_LIMIT:.0}, pump restart recommended (arccs accept)",
                obs.total_flow
            ));
            self.recommend(vec!["pump * on".to_string()]);
        }

        decision
    }
}

/// Deepen manual rods around the hottest channel
fn tilt_recommendations(lattice: &Lattice, obs: &Observation<'_>) -> Vec<String> {
    let Some((&hottest, _)) = obs.flux.iter().max_by(|a, b| a.1.total_cmp(b.1)) else {
        return Vec::new();
    };
    lattice
        .neighbors_within(hottest, TILT_RADIUS)
        .into_iter()
        .filter(|(e, _)| e.kind == ElementKind::ControlRod)
        .filter_map(|(e, _)| {
            let current = obs.rods.get(&e.id).copied()?;
            (current < 100.0).then(|| format!("set {} {:.0}", e.id, (current + TILT_STEP).min(100.0)))
        })
        .collect()
}

/// Fully insert every rod adjacent to a depleted channel
fn depletion_recommendations(lattice: &Lattice, depleted: &[ElementId]) -> Vec<String> {
    let mut commands: Vec<String> = Vec::new();
    for &fuel in depleted {
        for (e, _) in lattice.neighbors_within(fuel, FUEL_RADIUS) {
            let cmd = match e.kind {
                ElementKind::ControlRod => format!("set {} 100", e.id),
                ElementKind::AutoRod => format!("set {} 100 /override", e.id),
                _ => continue,
            };
            if !commands.contains(&cmd) {
                commands.push(cmd);
            }
        }
    }
    commands
}
