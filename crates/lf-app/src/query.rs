//! Query helpers for reading calculation outputs.

use lf_calc::{MonteCarloResult, ProcessContribution};
use lf_core::{EntityKey, MethodRef};

use crate::calculation::{CalculationOutput, ContributionOutcome, LcaOutcome};
use crate::error::{AppError, AppResult};

/// One functional unit's scores, per method, in one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRow {
    pub scenario: Option<String>,
    pub key: EntityKey,
    pub amount: f64,
    pub scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    pub methods: Vec<MethodRef>,
    pub rows: Vec<ScoreRow>,
}

/// Flatten a calculation into rows: functional units, then scenarios.
pub fn score_table(output: &CalculationOutput) -> AppResult<ScoreTable> {
    let mlca = &output.mlca;
    let methods = mlca.methods().to_vec();
    let mut rows = Vec::new();

    match mlca {
        LcaOutcome::Simple(engine) => {
            for (i, fu) in engine.func_units().iter().enumerate() {
                let scores = (0..methods.len())
                    .map(|m| engine.score(i, m))
                    .collect::<Result<Vec<_>, _>>()?;
                rows.push(ScoreRow {
                    scenario: None,
                    key: fu.key.clone(),
                    amount: fu.amount,
                    scores,
                });
            }
        }
        LcaOutcome::Scenario(engine) => {
            for (s, scenario) in engine.scenario_names().iter().enumerate() {
                for (i, fu) in engine.func_units().iter().enumerate() {
                    let scores = (0..methods.len())
                        .map(|m| engine.score(s, i, m))
                        .collect::<Result<Vec<_>, _>>()?;
                    rows.push(ScoreRow {
                        scenario: Some(scenario.clone()),
                        key: fu.key.clone(),
                        amount: fu.amount,
                        scores,
                    });
                }
            }
        }
    }
    Ok(ScoreTable { methods, rows })
}

/// Largest process contributions for one functional unit and method.
/// `scenario` is ignored for simple calculations.
pub fn top_contributions(
    output: &CalculationOutput,
    scenario: usize,
    func_unit: usize,
    method: usize,
    n: usize,
) -> AppResult<Vec<ProcessContribution>> {
    let rows = match (&output.mlca, &output.contributions) {
        (LcaOutcome::Simple(mlca), ContributionOutcome::Simple(c)) => {
            c.top_processes(mlca, func_unit, method, n)?
        }
        (LcaOutcome::Scenario(mlca), ContributionOutcome::Scenario(c)) => {
            c.top_processes(mlca, scenario, func_unit, method, n)?
        }
        _ => {
            return Err(AppError::InvalidInput(
                "contributions do not belong to this calculation".to_string(),
            ));
        }
    };
    Ok(rows)
}

/// Summary statistics of a Monte-Carlo run, per method.
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloSummary {
    pub method: MethodRef,
    pub mean: f64,
    pub std_dev: f64,
    pub p2_5: f64,
    pub p97_5: f64,
}

pub fn summarize_monte_carlo(result: &MonteCarloResult) -> Vec<MonteCarloSummary> {
    result
        .methods
        .iter()
        .map(|s| MonteCarloSummary {
            method: s.method.clone(),
            mean: s.mean(),
            std_dev: s.std_dev(),
            p2_5: s.percentile(2.5).unwrap_or(f64::NAN),
            p97_5: s.percentile(97.5).unwrap_or(f64::NAN),
        })
        .collect()
}
