//! Error types for the RBMK core
//!
//! Command failures are local to a single invocation and never leave the
//! plant state half-applied. Configuration failures are fatal at construction.
//! Ramp supersession is not an error and has no variant here.

use thiserror::Error;

/// Rejection of a single operator or external command
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// Bad argument count, type or range
    #[error("{0}")]
    Validation(String),

    /// Nonexistent element, or element of the wrong kind
    #[error("{0}")]
    Domain(String),

    /// Well-formed command that the current reactor state does not allow
    #[error("{0}")]
    Rejected(String),
}

impl CommandError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

/// Malformed lattice definition or configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown lattice symbol '{symbol}' at row {row}, column {col}")]
    UnknownSymbol { row: usize, col: usize, symbol: char },

    #[error("Lattice must be square: row {row} has {len} cells, expected {expected}")]
    NotSquare { row: usize, len: usize, expected: usize },

    #[error("Lattice definition is empty")]
    EmptyGrid,

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Could not read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Malformed line on the external alarm feed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("empty line")]
    Empty,

    #[error("unknown feed command '{0}'")]
    UnknownCommand(String),

    #[error("missing element id")]
    MissingId,

    #[error("bad element id '{0}'")]
    BadId(String),
}

pub type CommandResult<T> = Result<T, CommandError>;
