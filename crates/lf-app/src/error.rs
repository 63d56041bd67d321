//! Error types for the lf-app service layer.

use std::path::PathBuf;

use lf_core::EntityKey;

/// Application error type shared by the projections, the orchestrator and
/// the CLI.
///
/// The calculation variants are the orchestrator's whole failure contract:
/// no engine error type escapes above it.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Calculation setup not found: {name}")]
    SetupNotFound { name: String },

    #[error("No calculation setup loaded")]
    NotLoaded,

    #[error("Row {row} out of range (rows={len})")]
    RowOutOfRange { row: usize, len: usize },

    /// A functional unit that does not name a process. Logged and dropped by
    /// the projection; never returned from a public projection call.
    #[error("Could not resolve {key}: {reason}")]
    ResolutionFailure { key: EntityKey, reason: String },

    #[error("Calculation failed: {message}")]
    CalculationFailure { message: String },

    #[error("Scenario calculation failed: {message}")]
    ScenarioValidationFailure { message: String },

    #[error("Critical calculation failure: {message}")]
    CriticalFailure { message: String },

    #[error("Invalid calculation mode: {mode}")]
    InvalidMode { mode: String },

    #[error("Scenario dataset not found: {0}")]
    ScenarioNotFound(String),

    #[error("Unsupported workspace format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for lf-app operations.
pub type AppResult<T> = Result<T, AppError>;

// Conversions from backend error types
impl From<lf_setup::SetupError> for AppError {
    fn from(err: lf_setup::SetupError) -> Self {
        match err {
            lf_setup::SetupError::SetupNotFound { name } => AppError::SetupNotFound { name },
            other => AppError::Workspace(other.to_string()),
        }
    }
}

impl From<lf_registry::RegistryError> for AppError {
    fn from(err: lf_registry::RegistryError) -> Self {
        AppError::Registry(err.to_string())
    }
}

impl From<lf_core::LfError> for AppError {
    fn from(err: lf_core::LfError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Result accessors on a finished calculation (index checks, results read
/// before calculate). Construction failures go through the orchestrator's
/// own mapping instead.
impl From<lf_calc::CalcError> for AppError {
    fn from(err: lf_calc::CalcError) -> Self {
        AppError::CalculationFailure {
            message: err.to_string(),
        }
    }
}
