//! Error types for engine construction and calculation.

use lf_core::{EntityKey, MethodRef};
use lf_registry::RegistryError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("Calculation setup not found: {name}")]
    SetupNotFound { name: String },

    #[error("Activity not found: {key}")]
    ActivityNotFound { key: EntityKey },

    #[error("Activity {key} is not a process")]
    NotAProcess { key: EntityKey },

    #[error("Method not found: {method}")]
    MethodNotFound { method: MethodRef },

    #[error("Empty demand in calculation setup: {name}")]
    EmptyDemand { name: String },

    /// The superstructure validator rejected the scenario dataset.
    #[error("Superstructure assertion failed: {what}")]
    SuperstructureAssertion { what: String },

    /// None of the superstructure rows names an exchange in the matrices.
    #[error("Matrix has no overlap with superstructure exchanges")]
    NoOverlap,

    #[error("Scenario exchange not found: {input} -> {output}")]
    ScenarioExchangeNotFound { input: EntityKey, output: EntityKey },

    /// Internal state the engine cannot recover from.
    #[error("Critical calculation error: {what}")]
    CriticalCalculation { what: String },

    #[error("Technosphere matrix is singular: {what}")]
    Singular { what: String },

    #[error("Results requested before calculate()")]
    NotCalculated,

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },
}

pub type CalcResult<T> = Result<T, CalcError>;

impl CalcError {
    /// Lookup failures: something the setup references does not exist.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            CalcError::SetupNotFound { .. }
                | CalcError::ActivityNotFound { .. }
                | CalcError::NotAProcess { .. }
                | CalcError::MethodNotFound { .. }
                | CalcError::EmptyDemand { .. }
        )
    }
}

impl From<RegistryError> for CalcError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::ActivityNotFound { key } => CalcError::ActivityNotFound { key },
            RegistryError::MethodNotFound { method } => CalcError::MethodNotFound { method },
            RegistryError::ExchangeNotFound { key } => CalcError::CriticalCalculation {
                what: format!("exchange {key} vanished during matrix construction"),
            },
            other => CalcError::InvalidArg {
                what: other.to_string(),
            },
        }
    }
}
