//! RBMK Core Simulation Library
//!
//! Simulation and control core for an RBMK-style channel reactor: lattice
//! geometry, flux and power, thermal-hydraulics, fuel burn-up, per-element
//! alarms, ramped control changes, scripted startup/SCRAM, the ARCCS
//! supervisory controller and the operator command protocol.

pub mod alarm;
pub mod alerts;
pub mod arccs;
pub mod commands;
pub mod config;
pub mod error;
pub mod feed;
pub mod flux;
pub mod fuel;
pub mod lattice;
pub mod procedures;
pub mod ramp;
pub mod reactor;
pub mod scheduler;
pub mod state;
pub mod thermal;

pub use commands::{Interpreter, StartAuthorizer};
pub use config::SimConfig;
pub use error::{CommandError, ConfigError};
pub use lattice::{ElementId, ElementKind, Lattice};
pub use reactor::{Lifecycle, Reactor, Snapshot};
pub use scheduler::Scheduler;
