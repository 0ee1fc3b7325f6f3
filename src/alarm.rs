//! Per-element alarm state machine
//!
//! Every numbered element carries an alarm that is `off`, `yellow` or `red`.
//! Entering a mode starts flashing; acknowledging freezes the flash without
//! changing the mode. The flash phase is toggled by its own timer and has no
//! effect on alarm semantics.
//!
//! Transitions driven by plant conditions:
//!
//! ```text
//! off    -> yellow | red
//! yellow -> red | off
//! red    -> off          (only once the condition has fully cleared)
//! ```
//!
//! Alarms raised from the external feed are latched: condition evaluation
//! leaves them alone until they are cleared explicitly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::lattice::{ElementId, Lattice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlarmMode {
    Off,
    Yellow,
    Red,
}

impl AlarmMode {
    pub fn label(self) -> &'static str {
        match self {
            AlarmMode::Off => "off",
            AlarmMode::Yellow => "yellow",
            AlarmMode::Red => "red",
        }
    }
}

/// Condition of an element against its thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

/// Alarm of a single element. Fields are private so that `flashing` can only
/// be set while the mode is not `Off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlarmState {
    mode: AlarmMode,
    flashing: bool,
    phase: bool,
    latched: bool,
}

impl Default for AlarmState {
    fn default() -> Self {
        Self {
            mode: AlarmMode::Off,
            flashing: false,
            phase: false,
            latched: false,
        }
    }
}

impl AlarmState {
    pub fn mode(&self) -> AlarmMode {
        self.mode
    }

    pub fn is_flashing(&self) -> bool {
        self.flashing
    }

    pub fn phase(&self) -> bool {
        self.phase
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    fn raise(&mut self, mode: AlarmMode) {
        if mode == AlarmMode::Off {
            self.clear();
            return;
        }
        self.mode = mode;
        self.flashing = true;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn acknowledge(&mut self) {
        if self.mode != AlarmMode::Off {
            self.flashing = false;
        }
    }

    fn toggle_phase(&mut self) {
        if self.flashing {
            self.phase = !self.phase;
        }
    }

    /// Apply one evaluated condition. Returns the new mode if it changed.
    fn apply(&mut self, severity: Severity) -> Option<AlarmMode> {
        let next = match (self.mode, severity) {
            (AlarmMode::Red, Severity::Critical | Severity::Warning) => AlarmMode::Red,
            (_, Severity::Critical) => AlarmMode::Red,
            (_, Severity::Warning) => AlarmMode::Yellow,
            (_, Severity::Normal) => AlarmMode::Off,
        };
        if next == self.mode {
            return None;
        }
        self.raise(next);
        Some(next)
    }
}

/// Yellow and red limits for per-element conditions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmThresholds {
    /// Local temperature [K]
    pub temp_yellow: f64,
    pub temp_red: f64,
    /// System pressure [bar]
    pub pressure_yellow: f64,
    pub pressure_red: f64,
    /// Channel flux relative to the core mean
    pub deviation_yellow: f64,
    pub deviation_red: f64,
    /// Remaining fuel [%], alarms below these
    pub fuel_yellow: f64,
    pub fuel_red: f64,
}

impl Default for AlarmThresholds {
    fn default() -> Self {
        Self {
            temp_yellow: 600.0,
            temp_red: 700.0,
            pressure_yellow: 80.0,
            pressure_red: 90.0,
            deviation_yellow: 1.25,
            deviation_red: 1.5,
            fuel_yellow: 20.0,
            fuel_red: 5.0,
        }
    }
}

impl AlarmThresholds {
    /// Red limits must be strictly beyond yellow limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("temp_red", self.temp_red > self.temp_yellow),
            ("pressure_red", self.pressure_red > self.pressure_yellow),
            ("deviation_red", self.deviation_red > self.deviation_yellow),
            ("fuel_red", self.fuel_red < self.fuel_yellow),
        ];
        for (field, ok) in checks {
            if !ok {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "red threshold must be tighter than yellow".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Readings an element's alarm is evaluated against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementReading {
    pub local_temp: f64,
    pub pressure: f64,
    /// Local flux divided by mean fuel flux, when there is flux to compare
    pub flux_deviation: Option<f64>,
    /// Fuel elements only
    pub fuel: Option<f64>,
}

/// Red checks run first so the tighter limit always wins
pub fn classify(r: &ElementReading, t: &AlarmThresholds) -> Severity {
    let deviation = r.flux_deviation.unwrap_or(0.0);
    let fuel = r.fuel.unwrap_or(100.0);

    if r.local_temp >= t.temp_red
        || r.pressure >= t.pressure_red
        || deviation >= t.deviation_red
        || fuel < t.fuel_red
    {
        Severity::Critical
    } else if r.local_temp >= t.temp_yellow
        || r.pressure >= t.pressure_yellow
        || deviation >= t.deviation_yellow
        || fuel < t.fuel_yellow
    {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// Alarm states and operator text for every element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmBoard {
    states: BTreeMap<ElementId, AlarmState>,
    texts: BTreeMap<ElementId, String>,
}

impl AlarmBoard {
    pub fn new(lattice: &Lattice) -> Self {
        Self {
            states: lattice
                .elements()
                .iter()
                .map(|e| (e.id, AlarmState::default()))
                .collect(),
            texts: BTreeMap::new(),
        }
    }

    pub fn state(&self, id: ElementId) -> Option<&AlarmState> {
        self.states.get(&id)
    }

    pub fn states(&self) -> impl Iterator<Item = (ElementId, &AlarmState)> {
        self.states.iter().map(|(&id, s)| (id, s))
    }

    /// Elements whose alarm is not off
    pub fn active(&self) -> impl Iterator<Item = (ElementId, &AlarmState)> {
        self.states().filter(|(_, s)| s.mode != AlarmMode::Off)
    }

    /// Apply evaluated conditions; latched alarms are skipped.
    /// Returns the elements whose mode changed.
    pub fn evaluate<I>(&mut self, conditions: I) -> Vec<(ElementId, AlarmMode)>
    where
        I: IntoIterator<Item = (ElementId, Severity)>,
    {
        let mut changed = Vec::new();
        for (id, severity) in conditions {
            let Some(state) = self.states.get_mut(&id) else {
                continue;
            };
            if state.latched {
                continue;
            }
            if let Some(mode) = state.apply(severity) {
                changed.push((id, mode));
            }
        }
        changed
    }

    /// Reactor not running: clear every condition-driven alarm
    pub fn force_conditions_off(&mut self) {
        for state in self.states.values_mut().filter(|s| !s.latched) {
            state.clear();
        }
    }

    pub fn acknowledge(&mut self) {
        for state in self.states.values_mut() {
            state.acknowledge();
        }
    }

    /// Manual override: every element off, latches included
    pub fn all_off(&mut self) {
        for state in self.states.values_mut() {
            state.clear();
        }
    }

    pub fn toggle_phase(&mut self) {
        for state in self.states.values_mut() {
            state.toggle_phase();
        }
    }

    /// Latch an alarm from the external feed. Returns false for unknown ids.
    pub fn trigger(&mut self, id: ElementId, mode: AlarmMode) -> bool {
        let Some(state) = self.states.get_mut(&id) else {
            return false;
        };
        if mode == AlarmMode::Off {
            state.clear();
        } else {
            state.raise(mode);
            state.latched = true;
        }
        true
    }

    pub fn turn_off(&mut self, id: ElementId) -> bool {
        self.trigger(id, AlarmMode::Off)
    }

    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) -> bool {
        if !self.states.contains_key(&id) {
            return false;
        }
        self.texts.insert(id, text.into());
        true
    }

    pub fn clear_text(&mut self, id: ElementId) -> bool {
        self.texts.remove(&id).is_some()
    }

    pub fn text(&self, id: ElementId) -> Option<&str> {
        self.texts.get(&id).map(String::as_str)
    }
}
