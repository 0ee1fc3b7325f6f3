//! Thermal-hydraulic model
//!
//! Coolant temperature follows a lumped heat balance between fission heat,
//! forced circulation and natural losses. Local channel temperatures are
//! interpolated from the temperature sensors.

use rand::Rng;

use crate::state::{AMBIENT_PRESSURE_BAR, AMBIENT_TEMP_K, MAX_PRESSURE_BAR, MAX_TEMP_K};

/// Heat added per percent of power
pub const HEAT_PER_POWER: f64 = 2.5;

/// Heat removed per unit of pump flow
pub const FLOW_COOLING: f64 = 0.3;

/// Natural loss coefficient above ambient
pub const NATURAL_COOLING: f64 = 0.15;

/// Fraction of the imbalance applied per tick
pub const RESPONSE: f64 = 0.15;

/// Coolant temperature noise [K]
pub const TEMP_JITTER: f64 = 0.5;

/// Pressure drift per tick without an active ramp [bar]
pub const PRESSURE_JITTER: f64 = 0.5;

/// Pull back toward the pressure set-point per tick
pub const PRESSURE_RELAXATION: f64 = 0.1;

/// Sensors used for local interpolation
pub const INTERPOLATION_SENSORS: usize = 3;

pub const TURBINE_NOMINAL_RPM: f64 = 3000.0;
pub const TURBINE_NOMINAL_MW: f64 = 1000.0;
pub const TURBINE_LAG: f64 = 0.1;

/// Temperature change for one tick, before jitter
pub fn heat_balance(temp: f64, power: f64, total_flow: f64) -> f64 {
    let heat = power * HEAT_PER_POWER;
    let flow_cooling = total_flow * FLOW_COOLING;
    let natural_cooling = (temp - AMBIENT_TEMP_K).max(0.0) * NATURAL_COOLING;
    (heat - flow_cooling - natural_cooling) * RESPONSE
}

/// Advance the average coolant temperature by one tick
pub fn step_coolant<R: Rng>(temp: f64, power: f64, total_flow: f64, rng: &mut R) -> f64 {
    let net = heat_balance(temp, power, total_flow);
    let noise = rng.gen_range(-TEMP_JITTER..=TEMP_JITTER);
    (temp + net + noise).clamp(AMBIENT_TEMP_K, MAX_TEMP_K)
}

/// Random pressure drift for a tick with no pressure ramp running,
/// bounded by relaxation toward the last set-point
pub fn drift_pressure<R: Rng>(pressure: f64, setpoint: f64, rng: &mut R) -> f64 {
    let drift = rng.gen_range(-PRESSURE_JITTER..=PRESSURE_JITTER);
    let pull = (setpoint - pressure) * PRESSURE_RELAXATION;
    (pressure + pull + drift).clamp(AMBIENT_PRESSURE_BAR, MAX_PRESSURE_BAR)
}

/// Sensor sample: coolant temperature seen through the sensor's own bias
pub fn sample_sensor<R: Rng>(coolant_temp: f64, offset: f64, rng: &mut R) -> f64 {
    coolant_temp + offset + rng.gen_range(-TEMP_JITTER..=TEMP_JITTER)
}

/// Inverse-distance weighted mean of the nearest sensor readings.
///
/// `readings` holds `(distance, reading)` pairs for every sensor with a
/// reading. A sensor at zero distance returns its own reading. Falls back to
/// `fallback` when there is no reading at all.
pub fn interpolate(readings: &mut [(f64, f64)], fallback: f64) -> f64 {
    if readings.is_empty() {
        return fallback;
    }
    readings.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut weighted = 0.0;
    let mut weights = 0.0;
    for &(d, reading) in readings.iter().take(INTERPOLATION_SENSORS) {
        if d <= f64::EPSILON {
            return reading;
        }
        let w = 1.0 / d;
        weighted += w * reading;
        weights += w;
    }
    weighted / weights
}

/// Turbine speed and electrical output after one tick of lag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurbineOutput {
    pub rpm: f64,
    pub electrical_mw: f64,
}

pub fn step_turbine(rpm: f64, power: f64, running: bool) -> TurbineOutput {
    let target = if running {
        TURBINE_NOMINAL_RPM * power.clamp(0.0, 100.0) / 100.0
    } else {
        0.0
    };
    let mut rpm = rpm + (target - rpm) * TURBINE_LAG;
    if rpm < 1.0 && target == 0.0 {
        rpm = 0.0;
    }
    TurbineOutput {
        rpm,
        electrical_mw: rpm / TURBINE_NOMINAL_RPM * TURBINE_NOMINAL_MW,
    }
}
