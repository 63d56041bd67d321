//! Shared application layer for lcaflow.
//!
//! Keeps calculation-setup projections in step with the live entity
//! registry and method catalog, writes edits back into the setup store and
//! dispatches setups through the matrix engine behind one error contract.

pub mod calculation;
pub mod error;
pub mod functional_units;
pub mod methods;
pub mod project_service;
pub mod projection;
pub mod query;
pub mod session;

// Re-export key types for convenience
pub use calculation::{
    BusyIndicator, CalculationMode, CalculationOutput, ContributionOutcome, LcaBackend,
    LcaOutcome, MatrixBackend, NO_OVERLAP_MESSAGE, NoBusyIndicator, Orchestrator,
    OrchestratorOptions,
};
pub use error::{AppError, AppResult};
pub use functional_units::{FunctionalUnitProjection, FunctionalUnitRow};
pub use methods::{MethodProjection, MethodRow};
pub use project_service::{
    SetupSummary, list_setups, load_workspace, open_session, save_workspace, store_setups,
    validate_workspace,
};
pub use projection::{ProjectionEvents, SetupChanged, SetupPart};
pub use query::{
    MonteCarloSummary, ScoreRow, ScoreTable, score_table, summarize_monte_carlo,
    top_contributions,
};
pub use session::Session;
