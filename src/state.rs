//! Control surface and derived plant state
//!
//! The control surface is what operators, ramps and the controller write:
//! rod insertions and pump flows. Derived state is recomputed by the tick and
//! is never set directly by commands.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::lattice::{ElementId, ElementKind, Lattice};

/// Pump identifier (1-based)
pub type PumpId = u32;

/// Ambient / cold-shutdown coolant temperature [K]
pub const AMBIENT_TEMP_K: f64 = 293.0;

/// Coolant temperature upper clamp [K]
pub const MAX_TEMP_K: f64 = 800.0;

/// Unpressurized loop pressure [bar]
pub const AMBIENT_PRESSURE_BAR: f64 = 1.0;

/// Upper clamp for system pressure [bar]
pub const MAX_PRESSURE_BAR: f64 = 200.0;

/// Main circulation pump
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pump {
    pub flow: f64,
    pub on: bool,
}

/// Operator-controlled values read every tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlSurface {
    /// Rod id -> insertion [%], 100 = fully inserted
    pub rods: BTreeMap<ElementId, f64>,
    pub pumps: BTreeMap<PumpId, Pump>,
    /// Pressure the loop relaxes toward between ramps [bar]
    pub pressure_setpoint: f64,
}

impl ControlSurface {
    /// Cold-shutdown surface: every rod fully inserted, every pump stopped
    pub fn new(lattice: &Lattice, pump_count: u32) -> Self {
        let rods = lattice
            .elements()
            .iter()
            .filter(|e| e.kind.is_rod())
            .map(|e| (e.id, 100.0))
            .collect();
        let pumps = (1..=pump_count)
            .map(|id| (id, Pump { flow: 0.0, on: false }))
            .collect();
        Self {
            rods,
            pumps,
            pressure_setpoint: AMBIENT_PRESSURE_BAR,
        }
    }

    pub fn insertion(&self, rod: ElementId) -> Option<f64> {
        self.rods.get(&rod).copied()
    }

    /// Returns false if `rod` is not a rod
    pub fn set_insertion(&mut self, rod: ElementId, percent: f64) -> bool {
        match self.rods.get_mut(&rod) {
            Some(v) => {
                *v = percent.clamp(0.0, 100.0);
                true
            }
            None => false,
        }
    }

    pub fn flow(&self, pump: PumpId) -> Option<f64> {
        self.pumps.get(&pump).map(|p| p.flow)
    }

    pub fn set_flow(&mut self, pump: PumpId, flow: f64) -> bool {
        match self.pumps.get_mut(&pump) {
            Some(p) => {
                p.flow = flow.max(0.0);
                true
            }
            None => false,
        }
    }

    pub fn total_flow(&self) -> f64 {
        self.pumps.values().map(|p| p.flow).sum()
    }
}

/// Quantities recomputed by the simulation tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedState {
    /// Fuel id -> relative neutron flux
    pub flux: BTreeMap<ElementId, f64>,
    /// Core power [% nominal]
    pub power: f64,
    /// Average coolant temperature [K]
    pub coolant_temp: f64,
    /// System pressure [bar]
    pub pressure: f64,
    /// Fuel id -> remaining fuel [%]
    pub fuel: BTreeMap<ElementId, f64>,
    /// Radiation level [mSv/h]
    pub radiation: f64,
    pub turbine_rpm: f64,
    pub electrical_mw: f64,
    /// Sensor id -> reading [K]
    pub sensor_readings: BTreeMap<ElementId, f64>,
    /// Element id -> local temperature [K]
    pub local_temp: BTreeMap<ElementId, f64>,
}

impl DerivedState {
    pub fn new(lattice: &Lattice) -> Self {
        let fuel_ids = lattice.ids_of_type(ElementKind::Fuel);
        Self {
            flux: fuel_ids.iter().map(|&id| (id, 0.0)).collect(),
            power: 0.0,
            coolant_temp: AMBIENT_TEMP_K,
            pressure: AMBIENT_PRESSURE_BAR,
            fuel: fuel_ids.iter().map(|&id| (id, 100.0)).collect(),
            radiation: 0.1,
            turbine_rpm: 0.0,
            electrical_mw: 0.0,
            sensor_readings: BTreeMap::new(),
            local_temp: BTreeMap::new(),
        }
    }

    pub fn average_fuel(&self) -> f64 {
        if self.fuel.is_empty() {
            return 0.0;
        }
        self.fuel.values().sum::<f64>() / self.fuel.len() as f64
    }

    pub fn mean_flux(&self) -> f64 {
        if self.flux.is_empty() {
            return 0.0;
        }
        self.flux.values().sum::<f64>() / self.flux.len() as f64
    }
}
