//! RBMK Reactor Simulation State
//!
//! This module contains the reactor state and the simulation tick.
//!
//! All mutable plant state lives in a single [`PlantState`] behind one mutex,
//! owned by the [`Reactor`]. The tick, ramp tasks, procedures and the command
//! interpreter all go through [`Reactor::read`] / [`Reactor::update`]; there is
//! no other shared state.
//!
//! Lock order: ramp registry before plant state. Nothing may query the ramp
//! engine while holding the plant lock, because ramp steps write the plant
//! while holding the registry.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use crate::alarm::{classify, AlarmBoard, AlarmMode, ElementReading, Severity};
use crate::alerts::{AlertInputs, AlertSet};
use crate::arccs::{nudge, Arccs, Observation};
use crate::config::SimConfig;
use crate::error::ConfigError;
use crate::flux::{aggregate_power, decay_power, flux_tilt, FluxGeometry};
use crate::fuel;
use crate::lattice::{ElementId, ElementKind, Lattice};
use crate::ramp::{RampEngine, RampHandle, RampSpec, RampSurface, RampTarget};
use crate::state::{ControlSurface, DerivedState, Pump, PumpId, AMBIENT_PRESSURE_BAR, MAX_PRESSURE_BAR};
use crate::thermal;

/// Lines kept in the in-memory event log
pub const EVENT_LOG_CAPACITY: usize = 200;

/// Radius for attributing fuel flux to non-fuel elements
pub const LOCAL_FLUX_RADIUS: f64 = 2.0;

/// Standard deviation of the per-element temperature offset [K]
pub const ELEMENT_OFFSET_STD_K: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lifecycle {
    Offline,
    StartupInProgress,
    Running,
    /// Offline after an emergency shutdown
    Scrammed,
}

impl Lifecycle {
    pub fn is_running(self) -> bool {
        self == Lifecycle::Running
    }

    /// States in which the chain reaction is computed from rod geometry
    pub fn is_critical_capable(self) -> bool {
        matches!(self, Lifecycle::StartupInProgress | Lifecycle::Running)
    }

    pub fn label(self) -> &'static str {
        match self {
            Lifecycle::Offline => "Offline",
            Lifecycle::StartupInProgress => "Startup in progress",
            Lifecycle::Running => "Running",
            Lifecycle::Scrammed => "Offline (SCRAM)",
        }
    }
}

/// Bounded log of operator-visible events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLog {
    lines: VecDeque<String>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            lines: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
        }
    }
}

impl EventLog {
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == EVENT_LOG_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Last `n` lines, oldest first
    pub fn recent(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Every piece of mutable simulation state
#[derive(Debug, Clone)]
pub struct PlantState {
    pub lifecycle: Lifecycle,
    pub surface: ControlSurface,
    pub derived: DerivedState,
    pub alarms: AlarmBoard,
    pub alerts: AlertSet,
    pub arccs: Arccs,
    /// Sensor readings pinned by the operator
    pub sensor_overrides: BTreeMap<ElementId, f64>,
    pub events: EventLog,
    pub tick_count: u64,
    rng: StdRng,
}

impl PlantState {
    fn new(lattice: &Lattice, config: &SimConfig, seed: u64) -> Self {
        Self {
            lifecycle: Lifecycle::Offline,
            surface: ControlSurface::new(lattice, config.pump_count),
            derived: DerivedState::new(lattice),
            alarms: AlarmBoard::new(lattice),
            alerts: AlertSet::default(),
            arccs: Arccs::new(config.arccs_enabled),
            sensor_overrides: BTreeMap::new(),
            events: EventLog::default(),
            tick_count: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Record an operator-visible event and mirror it to the logger
    pub fn log_event(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!("{line}");
        self.events.push(line);
    }
}

/// Alarm entry of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmEntry {
    pub id: ElementId,
    pub mode: AlarmMode,
    pub flashing: bool,
    pub latched: bool,
}

/// Read-only view for status reports and external observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub lifecycle: Lifecycle,
    pub running: bool,
    pub power: f64,
    pub coolant_temp: f64,
    pub pressure: f64,
    pub radiation: f64,
    pub avg_fuel: f64,
    pub flux_tilt: Option<f64>,
    pub turbine_rpm: f64,
    pub electrical_mw: f64,
    pub total_flow: f64,
    pub rods: BTreeMap<ElementId, f64>,
    pub pumps: BTreeMap<PumpId, Pump>,
    pub alerts: Vec<&'static str>,
    pub alarms: Vec<AlarmEntry>,
    pub arccs_enabled: bool,
    pub recommendations: Vec<String>,
}

/// Reactor simulation engine
pub struct Reactor {
    lattice: Lattice,
    geometry: FluxGeometry,
    config: SimConfig,
    seed: u64,
    /// Fixed per-element temperature offsets, drawn once
    offsets: BTreeMap<ElementId, f64>,
    /// Fuel channels near each element, for local flux
    local_fuel: BTreeMap<ElementId, Vec<ElementId>>,
    state: Mutex<PlantState>,
    ramps: RampEngine,
    startup_latch: AtomicBool,
}

impl Reactor {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let lattice = config.build_lattice()?;
        let seed = config.seed.unwrap_or_else(rand::random);

        let mut rng = StdRng::seed_from_u64(seed ^ 0x5EED_0FF5);
        let normal = Normal::new(0.0, ELEMENT_OFFSET_STD_K).map_err(|e| ConfigError::InvalidValue {
            field: "element offsets",
            reason: e.to_string(),
        })?;
        let offsets = lattice
            .elements()
            .iter()
            .map(|e| (e.id, normal.sample(&mut rng)))
            .collect();

        let local_fuel = lattice
            .elements()
            .iter()
            .map(|e| {
                let near = if e.kind == ElementKind::Fuel {
                    vec![e.id]
                } else {
                    lattice
                        .neighbors_within(e.id, LOCAL_FLUX_RADIUS)
                        .into_iter()
                        .filter(|(n, _)| n.kind == ElementKind::Fuel)
                        .map(|(n, _)| n.id)
                        .collect()
                };
                (e.id, near)
            })
            .collect();

        info!(
            "Reactor core: {} elements on a {}x{} lattice, {} pumps, seed {}",
            lattice.len(),
            lattice.size(),
            lattice.size(),
            config.pump_count,
            seed
        );

        Ok(Self {
            geometry: FluxGeometry::new(&lattice),
            state: Mutex::new(PlantState::new(&lattice, &config, seed)),
            lattice,
            config,
            seed,
            offsets,
            local_fuel,
            ramps: RampEngine::new(),
            startup_latch: AtomicBool::new(false),
        })
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn ramps(&self) -> &RampEngine {
        &self.ramps
    }

    fn lock(&self) -> MutexGuard<'_, PlantState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&PlantState) -> R) -> R {
        f(&self.lock())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut PlantState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.read(|st| st.lifecycle)
    }

    pub fn log_event(&self, line: impl Into<String>) {
        self.update(|st| st.log_event(line));
    }

    /// Start a ramp with the configured step interval
    pub fn ramp(self: &Arc<Self>, target: RampTarget, value: f64, step: f64) -> RampHandle {
        if target == RampTarget::Pressure {
            self.update(|st| st.surface.pressure_setpoint = value.clamp(AMBIENT_PRESSURE_BAR, MAX_PRESSURE_BAR));
        }
        let spec = RampSpec::new(target, value, step, self.config.ramp_interval());
        self.ramps.start(Arc::clone(self), spec)
    }

    /// Start a ramp for the startup procedure. Refused once the lifecycle has
    /// left `StartupInProgress`; the check and the registration are atomic
    /// with respect to SCRAM and reset.
    pub fn ramp_while_starting(self: &Arc<Self>, target: RampTarget, value: f64, step: f64) -> Option<RampHandle> {
        let spec = RampSpec::new(target, value, step, self.config.ramp_interval());
        let handle = self.ramps.start_if(Arc::clone(self), spec, || {
            let mut st = self.lock();
            if st.lifecycle != Lifecycle::StartupInProgress {
                return false;
            }
            if target == RampTarget::Pressure {
                st.surface.pressure_setpoint = value.clamp(AMBIENT_PRESSURE_BAR, MAX_PRESSURE_BAR);
            }
            true
        });
        if handle.is_none() {
            warn!("Startup ramp on {target} refused: reactor no longer starting up");
        }
        handle
    }

    /// Claim the single startup slot
    pub fn try_claim_startup(&self) -> bool {
        self.startup_latch
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release_startup(&self) {
        self.startup_latch.store(false, Ordering::Release);
    }

    pub fn startup_claimed(&self) -> bool {
        self.startup_latch.load(Ordering::Acquire)
    }

    /// Cancel every ramp and restore defaults; the reactor ends up Offline.
    /// Per-element offsets and the seed survive, so repeated resets are
    /// indistinguishable from a single one.
    pub fn reset(&self) {
        // Leave StartupInProgress before cancelling, so startup cannot
        // register ramps that outlive the cancel.
        self.update(|st| st.lifecycle = Lifecycle::Offline);
        let cancelled = self.ramps.cancel_all();
        let mut st = self.lock();
        *st = PlantState::new(&self.lattice, &self.config, self.seed);
        if cancelled > 0 {
            warn!("Reset cancelled {cancelled} active ramp(s)");
        }
        info!("Reactor reset to defaults");
    }

    /// Advance the simulation by one tick.
    ///
    /// Stage order: flux, power, thermal, fuel/radiation, alerts and alarms,
    /// then the supervisory controller. Each stage only reads values already
    /// final for this tick.
    pub fn tick(&self) {
        let ramping: HashSet<RampTarget> = self.ramps.active_targets().into_iter().collect();
        let now = Instant::now();

        let mut guard = self.lock();
        let st = &mut *guard;
        st.tick_count += 1;

        let lifecycle = st.lifecycle;
        let running = lifecycle.is_running();

        // Flux
        if lifecycle.is_critical_capable() {
            st.derived.flux = self.geometry.compute(&st.surface, &st.derived.fuel, &mut st.rng);
        } else {
            st.derived.flux.values_mut().for_each(|f| *f = 0.0);
        }

        // Power
        st.derived.power = if lifecycle.is_critical_capable() {
            aggregate_power(&st.derived.flux)
        } else {
            decay_power(st.derived.power)
        };

        // Thermal-hydraulics
        let total_flow = st.surface.total_flow();
        st.derived.coolant_temp =
            thermal::step_coolant(st.derived.coolant_temp, st.derived.power, total_flow, &mut st.rng);
        if !ramping.contains(&RampTarget::Pressure) {
            st.derived.pressure =
                thermal::drift_pressure(st.derived.pressure, st.surface.pressure_setpoint, &mut st.rng);
        }
        self.sample_sensors(st);
        self.update_local_temperatures(st);
        let turbine = thermal::step_turbine(st.derived.turbine_rpm, st.derived.power, running);
        st.derived.turbine_rpm = turbine.rpm;
        st.derived.electrical_mw = turbine.electrical_mw;

        // Fuel and radiation
        fuel::deplete(&mut st.derived.fuel, &st.derived.flux, st.derived.power);
        let avg_fuel = st.derived.average_fuel();
        st.derived.radiation = fuel::radiation(st.derived.power, avg_fuel, &mut st.rng);

        // Alerts and alarms
        st.alerts = AlertSet::evaluate(&AlertInputs {
            running,
            scrammed: lifecycle == Lifecycle::Scrammed,
            power: st.derived.power,
            coolant_temp: st.derived.coolant_temp,
            pressure: st.derived.pressure,
            flux_tilt: flux_tilt(&st.derived.flux),
            avg_fuel,
            radiation: st.derived.radiation,
            total_flow,
        });

        if running {
            let conditions = self.element_conditions(st);
            for (id, mode) in st.alarms.evaluate(conditions) {
                if mode == AlarmMode::Red {
                    let kind = self.lattice.element(id).map_or("element", |e| e.kind.label());
                    warn!("Alarm RED on {kind} {id}");
                    st.events.push(format!("Alarm RED on {kind} {id}"));
                }
            }
        } else {
            st.alarms.force_conditions_off();
        }

        // Supervisory controller
        if running {
            let decision = st.arccs.evaluate(
                &self.lattice,
                &Observation {
                    power: st.derived.power,
                    coolant_temp: st.derived.coolant_temp,
                    total_flow,
                    flux: &st.derived.flux,
                    fuel: &st.derived.fuel,
                    rods: &st.surface.rods,
                },
                now,
            );
            if decision.auto_rod_delta != 0.0 {
                for id in self.lattice.ids_of_type(ElementKind::AutoRod) {
                    if ramping.contains(&RampTarget::Rod(id)) {
                        continue;
                    }
                    if let Some(current) = st.surface.insertion(id) {
                        st.surface.set_insertion(id, nudge(current, decision.auto_rod_delta));
                    }
                }
            }
            for message in decision.messages {
                st.log_event(message);
            }
        }
    }

    fn sample_sensors(&self, st: &mut PlantState) {
        for id in self.lattice.ids_of_type(ElementKind::TemperatureSensor) {
            let reading = match st.sensor_overrides.get(&id) {
                Some(&pinned) => pinned,
                None => {
                    let offset = self.offsets.get(&id).copied().unwrap_or(0.0);
                    thermal::sample_sensor(st.derived.coolant_temp, offset, &mut st.rng)
                }
            };
            st.derived.sensor_readings.insert(id, reading);
        }
    }

    fn update_local_temperatures(&self, st: &mut PlantState) {
        let coolant = st.derived.coolant_temp;
        for element in self.lattice.elements() {
            let mut readings: Vec<(f64, f64)> = st
                .derived
                .sensor_readings
                .iter()
                .filter_map(|(&sensor, &reading)| {
                    Some((self.lattice.distance(element.id, sensor)?, reading))
                })
                .collect();
            let mut local = thermal::interpolate(&mut readings, coolant);
            if element.kind != ElementKind::TemperatureSensor {
                local += self.offsets.get(&element.id).copied().unwrap_or(0.0);
            }
            st.derived.local_temp.insert(element.id, local);
        }
    }

    fn element_conditions(&self, st: &PlantState) -> Vec<(ElementId, Severity)> {
        let mean = st.derived.mean_flux();
        self.lattice
            .elements()
            .iter()
            .map(|e| {
                let deviation = self.local_flux(st, e.id).filter(|_| mean > 0.0).map(|f| f / mean);
                let reading = ElementReading {
                    local_temp: st
                        .derived
                        .local_temp
                        .get(&e.id)
                        .copied()
                        .unwrap_or(st.derived.coolant_temp),
                    pressure: st.derived.pressure,
                    flux_deviation: deviation,
                    fuel: st.derived.fuel.get(&e.id).copied(),
                };
                (e.id, classify(&reading, &self.config.thresholds))
            })
            .collect()
    }

    /// Flux seen by an element: its own for fuel, the mean of nearby fuel
    /// channels otherwise
    pub fn local_flux(&self, st: &PlantState, id: ElementId) -> Option<f64> {
        let near = self.local_fuel.get(&id)?;
        if near.is_empty() {
            return None;
        }
        let sum: f64 = near.iter().filter_map(|f| st.derived.flux.get(f)).sum();
        Some(sum / near.len() as f64)
    }

    /// Flash-phase timer hook; visual only
    pub fn toggle_flash_phase(&self) {
        self.update(|st| st.alarms.toggle_phase());
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read(|st| Snapshot {
            tick: st.tick_count,
            lifecycle: st.lifecycle,
            running: st.lifecycle.is_running(),
            power: st.derived.power,
            coolant_temp: st.derived.coolant_temp,
            pressure: st.derived.pressure,
            radiation: st.derived.radiation,
            avg_fuel: st.derived.average_fuel(),
            flux_tilt: flux_tilt(&st.derived.flux),
            turbine_rpm: st.derived.turbine_rpm,
            electrical_mw: st.derived.electrical_mw,
            total_flow: st.surface.total_flow(),
            rods: st.surface.rods.clone(),
            pumps: st.surface.pumps.clone(),
            alerts: st.alerts.names(),
            alarms: st
                .alarms
                .active()
                .map(|(id, s)| AlarmEntry {
                    id,
                    mode: s.mode(),
                    flashing: s.is_flashing(),
                    latched: s.is_latched(),
                })
                .collect(),
            arccs_enabled: st.arccs.is_enabled(),
            recommendations: st.arccs.pending().to_vec(),
        })
    }
}

impl RampSurface for Reactor {
    fn read(&self, target: RampTarget) -> Option<f64> {
        let st = self.lock();
        match target {
            RampTarget::Rod(id) => st.surface.insertion(id),
            RampTarget::Pump(id) => st.surface.flow(id),
            RampTarget::Pressure => Some(st.derived.pressure),
        }
    }

    fn write(&self, target: RampTarget, value: f64) {
        let mut st = self.lock();
        match target {
            RampTarget::Rod(id) => {
                st.surface.set_insertion(id, value);
            }
            RampTarget::Pump(id) => {
                st.surface.set_flow(id, value);
            }
            RampTarget::Pressure => {
                st.derived.pressure = value.clamp(AMBIENT_PRESSURE_BAR, MAX_PRESSURE_BAR);
            }
        }
    }
}
