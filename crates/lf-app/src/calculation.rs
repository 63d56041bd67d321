//! Calculation orchestration.
//!
//! Turns a setup name and a mode into the deterministic result, its
//! contribution analysis and an (unrun) Monte-Carlo companion, and maps
//! every engine failure onto `AppError`.

use std::rc::Rc;

use lf_calc::{
    CalcError, CalcResult, Contributions, MonteCarloLca, MonteCarloResult, MultiLca,
    SuperstructureContributions, SuperstructureMlca,
};
use lf_core::MethodRef;
use lf_registry::{EntityRegistry, MethodCatalog};
use lf_setup::{FunctionalUnit, ScenarioData, SetupStore};
use tracing::{error, info};

use crate::error::{AppError, AppResult};

/// Message for a superstructure dataset that shares no exchange with the
/// setup's supply chain.
pub const NO_OVERLAP_MESSAGE: &str =
    "Constructed LCA matrix does not contain any exchanges from the superstructure";

/// Presentation-side busy state, released on every failure.
pub trait BusyIndicator {
    fn set_busy(&self);
    fn clear_busy(&self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoBusyIndicator;

impl BusyIndicator for NoBusyIndicator {
    fn set_busy(&self) {}
    fn clear_busy(&self) {}
}

/// Engine construction seam. The default is the in-tree matrix engine.
pub trait LcaBackend {
    fn multi_lca(&self, setup: &str) -> CalcResult<MultiLca>;

    fn superstructure(&self, setup: &str, data: &ScenarioData) -> CalcResult<SuperstructureMlca>;

    fn monte_carlo(
        &self,
        demand: FunctionalUnit,
        methods: &[MethodRef],
    ) -> CalcResult<MonteCarloLca>;
}

pub struct MatrixBackend {
    registry: Rc<EntityRegistry>,
    catalog: Rc<MethodCatalog>,
    store: Rc<SetupStore>,
}

impl MatrixBackend {
    pub fn new(
        registry: Rc<EntityRegistry>,
        catalog: Rc<MethodCatalog>,
        store: Rc<SetupStore>,
    ) -> Self {
        Self {
            registry,
            catalog,
            store,
        }
    }
}

impl LcaBackend for MatrixBackend {
    fn multi_lca(&self, setup: &str) -> CalcResult<MultiLca> {
        MultiLca::new(&self.store, &self.registry, &self.catalog, setup)
    }

    fn superstructure(&self, setup: &str, data: &ScenarioData) -> CalcResult<SuperstructureMlca> {
        SuperstructureMlca::new(&self.store, &self.registry, &self.catalog, setup, data)
    }

    fn monte_carlo(
        &self,
        demand: FunctionalUnit,
        methods: &[MethodRef],
    ) -> CalcResult<MonteCarloLca> {
        MonteCarloLca::new(&self.registry, &self.catalog, demand, methods)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalculationMode {
    Simple,
    Scenario(ScenarioData),
    /// A mode name nothing recognised; rejected by `run`.
    Unknown(String),
}

impl CalculationMode {
    /// Parse a user-supplied mode name. `"scenario"` needs its dataset.
    pub fn from_name(name: &str, scenario: Option<ScenarioData>) -> AppResult<Self> {
        match (name.to_ascii_lowercase().as_str(), scenario) {
            ("simple", _) => Ok(CalculationMode::Simple),
            ("scenario", Some(data)) => Ok(CalculationMode::Scenario(data)),
            ("scenario", None) => Err(AppError::InvalidInput(
                "scenario mode requires a scenario dataset".to_string(),
            )),
            _ => Ok(CalculationMode::Unknown(name.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CalculationMode::Simple => "simple",
            CalculationMode::Scenario(_) => "scenario",
            CalculationMode::Unknown(name) => name,
        }
    }
}

/// Options for orchestrated calculations.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub monte_carlo_iterations: usize,
    pub seed: u64,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            monte_carlo_iterations: 100,
            seed: 0,
        }
    }
}

pub enum LcaOutcome {
    Simple(MultiLca),
    Scenario(SuperstructureMlca),
}

impl LcaOutcome {
    pub fn setup_name(&self) -> &str {
        match self {
            LcaOutcome::Simple(mlca) => mlca.setup_name(),
            LcaOutcome::Scenario(mlca) => mlca.setup_name(),
        }
    }

    pub fn func_units(&self) -> &[FunctionalUnit] {
        match self {
            LcaOutcome::Simple(mlca) => mlca.func_units(),
            LcaOutcome::Scenario(mlca) => mlca.func_units(),
        }
    }

    pub fn func_unit_count(&self) -> usize {
        self.func_units().len()
    }

    pub fn methods(&self) -> &[MethodRef] {
        match self {
            LcaOutcome::Simple(mlca) => mlca.methods(),
            LcaOutcome::Scenario(mlca) => mlca.methods(),
        }
    }

    /// Scenario names; empty for a simple calculation.
    pub fn scenario_names(&self) -> &[String] {
        match self {
            LcaOutcome::Simple(_) => &[],
            LcaOutcome::Scenario(mlca) => mlca.scenario_names(),
        }
    }
}

pub enum ContributionOutcome {
    Simple(Contributions),
    Scenario(SuperstructureContributions),
}

/// `(multi-LCA, contributions, Monte-Carlo companion)` of one run.
pub struct CalculationOutput {
    pub mlca: LcaOutcome,
    pub contributions: ContributionOutcome,
    pub monte_carlo: MonteCarloLca,
}

pub struct Orchestrator<B: LcaBackend> {
    backend: B,
    busy: Rc<dyn BusyIndicator>,
    options: OrchestratorOptions,
}

impl Orchestrator<MatrixBackend> {
    pub fn matrix(
        registry: Rc<EntityRegistry>,
        catalog: Rc<MethodCatalog>,
        store: Rc<SetupStore>,
    ) -> Self {
        Self::new(MatrixBackend::new(registry, catalog, store))
    }
}

impl<B: LcaBackend> Orchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            busy: Rc::new(NoBusyIndicator),
            options: OrchestratorOptions::default(),
        }
    }

    pub fn with_busy_indicator(mut self, busy: Rc<dyn BusyIndicator>) -> Self {
        self.busy = busy;
        self
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Build and calculate `setup` in `mode`.
    ///
    /// The busy indicator is set once a valid mode starts and cleared exactly
    /// once before `run` returns, whatever the outcome. The Monte-Carlo
    /// companion is built from the first functional unit only and is not run.
    pub fn run(&self, setup: &str, mode: &CalculationMode) -> AppResult<CalculationOutput> {
        if let CalculationMode::Unknown(name) = mode {
            error!(setup, mode = %name, "invalid calculation mode");
            return Err(AppError::InvalidMode { mode: name.clone() });
        }
        self.busy.set_busy();
        let outcome = self.calculate(setup, mode);
        self.busy.clear_busy();
        if let Err(err) = &outcome {
            error!(setup, mode = mode.name(), error = %err, "calculation failed");
        }
        outcome
    }

    /// Run a Monte-Carlo companion with the configured iterations and seed.
    pub fn run_monte_carlo(&self, monte_carlo: &MonteCarloLca) -> AppResult<MonteCarloResult> {
        monte_carlo
            .run(self.options.monte_carlo_iterations, self.options.seed)
            .map_err(simple_failure)
    }

    fn calculate(&self, setup: &str, mode: &CalculationMode) -> AppResult<CalculationOutput> {
        let (mlca, contributions) = match mode {
            CalculationMode::Simple => {
                let mut mlca = self.backend.multi_lca(setup).map_err(simple_failure)?;
                let contributions = Contributions::new(&mlca);
                mlca.calculate().map_err(simple_failure)?;
                (
                    LcaOutcome::Simple(mlca),
                    ContributionOutcome::Simple(contributions),
                )
            }
            CalculationMode::Scenario(data) => {
                let mut mlca = self
                    .backend
                    .superstructure(setup, data)
                    .map_err(scenario_failure)?;
                let contributions = SuperstructureContributions::new(&mlca);
                mlca.calculate().map_err(scenario_failure)?;
                (
                    LcaOutcome::Scenario(mlca),
                    ContributionOutcome::Scenario(contributions),
                )
            }
            CalculationMode::Unknown(name) => {
                return Err(AppError::InvalidMode { mode: name.clone() });
            }
        };

        let demand = mlca
            .func_units()
            .first()
            .cloned()
            .ok_or_else(|| AppError::CalculationFailure {
                message: format!("Empty demand in calculation setup: {setup}"),
            })?;
        let monte_carlo = self
            .backend
            .monte_carlo(demand, mlca.methods())
            .map_err(simple_failure)?;

        info!(
            setup,
            mode = mode.name(),
            func_units = mlca.func_unit_count(),
            methods = mlca.methods().len(),
            "calculation finished"
        );
        Ok(CalculationOutput {
            mlca,
            contributions,
            monte_carlo,
        })
    }
}

fn simple_failure(err: CalcError) -> AppError {
    match err {
        CalcError::CriticalCalculation { what } => AppError::CriticalFailure { message: what },
        other => AppError::CalculationFailure {
            message: other.to_string(),
        },
    }
}

fn scenario_failure(err: CalcError) -> AppError {
    match err {
        CalcError::SuperstructureAssertion { what } => {
            AppError::ScenarioValidationFailure { message: what }
        }
        CalcError::NoOverlap => AppError::ScenarioValidationFailure {
            message: NO_OVERLAP_MESSAGE.to_string(),
        },
        err @ CalcError::ScenarioExchangeNotFound { .. } => AppError::CriticalFailure {
            message: err.to_string(),
        },
        other => simple_failure(other),
    }
}
