//! Simulator configuration
//!
//! Loaded from JSON; every field has a default so a partial file is enough.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::alarm::AlarmThresholds;
use crate::error::ConfigError;
use crate::lattice::{Lattice, DEFAULT_GRID};

/// Locations tried when no explicit config file is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/reactor.json", "../config/reactor.json"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation tick period [ms]
    pub tick_ms: u64,
    /// Alarm flash-phase period [ms]
    pub flash_ms: u64,
    /// External alarm feed poll period [ms]
    pub feed_poll_ms: u64,
    /// Interval between ramp steps [ms]
    pub ramp_interval_ms: u64,
    /// RNG seed; random when absent
    pub seed: Option<u64>,
    pub pump_count: u32,
    /// Rows of lattice symbols (R G T A F C P)
    pub lattice: Vec<String>,
    pub thresholds: AlarmThresholds,
    /// Supervisory controller active at start
    pub arccs_enabled: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_ms: 500,
            flash_ms: 400,
            feed_poll_ms: 50,
            ramp_interval_ms: 100,
            seed: None,
            pump_count: 6,
            lattice: DEFAULT_GRID.iter().map(|r| r.to_string()).collect(),
            thresholds: AlarmThresholds::default(),
            arccs_enabled: true,
        }
    }
}

impl SimConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Try the default locations, falling back to built-in defaults.
    /// A file that exists but is malformed is still an error.
    pub fn discover() -> Result<Self, ConfigError> {
        for path in DEFAULT_CONFIG_PATHS {
            if Path::new(path).exists() {
                info!("Loading configuration from {path}");
                return Self::from_file(path);
            }
        }
        warn!("No configuration file found, using built-in defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("tick_ms", self.tick_ms),
            ("flash_ms", self.flash_ms),
            ("feed_poll_ms", self.feed_poll_ms),
            ("ramp_interval_ms", self.ramp_interval_ms),
        ];
        for (field, value) in periods {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "period must be greater than zero".to_string(),
                });
            }
        }
        if self.pump_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pump_count",
                reason: "at least one pump is required".to_string(),
            });
        }
        self.thresholds.validate()?;
        self.build_lattice().map(|_| ())
    }

    pub fn build_lattice(&self) -> Result<Lattice, ConfigError> {
        Lattice::from_rows(&self.lattice)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn flash_period(&self) -> Duration {
        Duration::from_millis(self.flash_ms)
    }

    pub fn feed_poll_period(&self) -> Duration {
        Duration::from_millis(self.feed_poll_ms)
    }

    pub fn ramp_interval(&self) -> Duration {
        Duration::from_millis(self.ramp_interval_ms)
    }
}
