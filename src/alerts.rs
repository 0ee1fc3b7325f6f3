//! Global alert catalog
//!
//! A fixed set of named flags recomputed every tick from derived state.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Alert {
    PowerHigh,
    PowerLow,
    TempHigh,
    PressureHigh,
    PressureLow,
    FluxTilt,
    FuelLow,
    RadiationHigh,
    CoolantFlowLow,
    Scram,
}

impl Alert {
    pub const ALL: [Alert; 10] = [
        Alert::PowerHigh,
        Alert::PowerLow,
        Alert::TempHigh,
        Alert::PressureHigh,
        Alert::PressureLow,
        Alert::FluxTilt,
        Alert::FuelLow,
        Alert::RadiationHigh,
        Alert::CoolantFlowLow,
        Alert::Scram,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Alert::PowerHigh => "Power High",
            Alert::PowerLow => "Power Low",
            Alert::TempHigh => "Temp High",
            Alert::PressureHigh => "Pressure High",
            Alert::PressureLow => "Pressure Low",
            Alert::FluxTilt => "Flux Tilt",
            Alert::FuelLow => "Fuel Low",
            Alert::RadiationHigh => "Radiation High",
            Alert::CoolantFlowLow => "Coolant Flow Low",
            Alert::Scram => "SCRAM",
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const POWER_HIGH: f64 = 110.0;
pub const POWER_LOW: f64 = 5.0;
pub const TEMP_HIGH: f64 = 650.0;
pub const PRESSURE_HIGH: f64 = 85.0;
pub const PRESSURE_LOW: f64 = 40.0;
pub const FLUX_TILT: f64 = 1.5;
pub const FUEL_LOW: f64 = 20.0;
pub const RADIATION_HIGH: f64 = 2.0;
pub const COOLANT_FLOW_LOW: f64 = 300.0;

/// Values the alert catalog is evaluated against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertInputs {
    pub running: bool,
    pub scrammed: bool,
    pub power: f64,
    pub coolant_temp: f64,
    pub pressure: f64,
    pub flux_tilt: Option<f64>,
    pub avg_fuel: f64,
    pub radiation: f64,
    pub total_flow: f64,
}

/// Currently raised alerts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSet(BTreeSet<Alert>);

impl AlertSet {
    /// Operating-point alerts only apply while running; temperature,
    /// radiation and SCRAM apply in every state.
    pub fn evaluate(x: &AlertInputs) -> Self {
        let mut set = BTreeSet::new();
        let mut raise = |alert: Alert, cond: bool| {
            if cond {
                set.insert(alert);
            }
        };

        raise(Alert::TempHigh, x.coolant_temp > TEMP_HIGH);
        raise(Alert::PressureHigh, x.pressure > PRESSURE_HIGH);
        raise(Alert::RadiationHigh, x.radiation > RADIATION_HIGH);
        raise(Alert::Scram, x.scrammed);
        raise(Alert::FuelLow, x.avg_fuel < FUEL_LOW);

        if x.running {
            raise(Alert::PowerHigh, x.power > POWER_HIGH);
            raise(Alert::PowerLow, x.power < POWER_LOW);
            raise(Alert::PressureLow, x.pressure < PRESSURE_LOW);
            raise(Alert::FluxTilt, x.flux_tilt.is_some_and(|t| t > FLUX_TILT));
            raise(Alert::CoolantFlowLow, x.total_flow < COOLANT_FLOW_LOW);
        }

        Self(set)
    }

    pub fn is_raised(&self, alert: Alert) -> bool {
        self.0.contains(&alert)
    }

    pub fn iter(&self) -> impl Iterator<Item = Alert> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(Alert::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nominal() -> AlertInputs {
        AlertInputs {
            running: true,
            scrammed: false,
            power: 90.0,
            coolant_temp: 350.0,
            pressure: 70.0,
            flux_tilt: Some(1.05),
            avg_fuel: 99.0,
            radiation: 0.6,
            total_flow: 720.0,
        }
    }

    #[test]
    fn test_nominal_raises_nothing() {
        assert!(AlertSet::evaluate(&nominal()).is_empty());
    }

    #[test]
    fn test_running_only_alerts() {
        let mut x = nominal();
        x.total_flow = 0.0;
        x.power = 1.0;
        let set = AlertSet::evaluate(&x);
        assert!(set.is_raised(Alert::CoolantFlowLow));
        assert!(set.is_raised(Alert::PowerLow));

        x.running = false;
        let set = AlertSet::evaluate(&x);
        assert!(!set.is_raised(Alert::CoolantFlowLow));
        assert!(!set.is_raised(Alert::PowerLow));
    }

    #[test]
    fn test_temp_and_scram_in_any_state() {
        let mut x = nominal();
        x.running = false;
        x.scrammed = true;
        x.coolant_temp = 700.0;
        let set = AlertSet::evaluate(&x);
        assert_eq!(set.names(), vec!["Temp High", "SCRAM"]);
    }
}
