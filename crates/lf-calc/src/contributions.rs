//! Contribution analysis: which processes and flows drive a score.

use lf_core::{EntityKey, share};
use nalgebra::DVector;

use crate::error::CalcResult;
use crate::matrix::LcaMatrices;
use crate::mlca::{MultiLca, check_index};
use crate::superstructure::SuperstructureMlca;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessContribution {
    pub key: EntityKey,
    pub score: f64,
    /// Fraction of the total score, 0.0 when the total is zero.
    pub share: f64,
}

/// Process contributions `s_j * (c . B[:, j])`, largest magnitude first.
fn process_breakdown(
    matrices: &LcaMatrices,
    supply: &DVector<f64>,
    characterization: &DVector<f64>,
) -> Vec<ProcessContribution> {
    let characterized = characterization.transpose() * matrices.biosphere();
    let total: f64 = (0..supply.len()).map(|j| characterized[j] * supply[j]).sum();
    let mut rows: Vec<ProcessContribution> = matrices
        .activities()
        .keys()
        .iter()
        .enumerate()
        .map(|(j, key)| {
            let score = characterized[j] * supply[j];
            ProcessContribution {
                key: key.clone(),
                score,
                share: share(score, total),
            }
        })
        .collect();
    sort_by_magnitude(&mut rows);
    rows
}

/// Elementary flow contributions `c_i * g_i`, largest magnitude first.
fn flow_breakdown(
    matrices: &LcaMatrices,
    supply: &DVector<f64>,
    characterization: &DVector<f64>,
) -> Vec<ProcessContribution> {
    let g = matrices.inventory(supply);
    let total = characterization.dot(&g);
    let mut rows: Vec<ProcessContribution> = matrices
        .flows()
        .keys()
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let score = characterization[i] * g[i];
            ProcessContribution {
                key: key.clone(),
                score,
                share: share(score, total),
            }
        })
        .collect();
    sort_by_magnitude(&mut rows);
    rows
}

fn sort_by_magnitude(rows: &mut [ProcessContribution]) {
    rows.sort_by(|a, b| b.score.abs().total_cmp(&a.score.abs()));
}

/// Contribution analysis over a deterministic multi-LCA.
///
/// Built from the engine's shape; the breakdowns read the engine's results,
/// so they require `MultiLca::calculate` to have run.
#[derive(Debug, Clone)]
pub struct Contributions {
    func_units: usize,
    methods: usize,
}

impl Contributions {
    pub fn new(mlca: &MultiLca) -> Self {
        Self {
            func_units: mlca.func_unit_count(),
            methods: mlca.methods().len(),
        }
    }

    pub fn func_unit_count(&self) -> usize {
        self.func_units
    }

    pub fn method_count(&self) -> usize {
        self.methods
    }

    pub fn processes(
        &self,
        mlca: &MultiLca,
        func_unit: usize,
        method: usize,
    ) -> CalcResult<Vec<ProcessContribution>> {
        check_index("functional unit", func_unit, self.func_units)?;
        check_index("method", method, self.methods)?;
        let supply = mlca.supply(func_unit)?;
        Ok(process_breakdown(
            mlca.matrices(),
            supply,
            mlca.characterization(method)?,
        ))
    }

    pub fn flows(
        &self,
        mlca: &MultiLca,
        func_unit: usize,
        method: usize,
    ) -> CalcResult<Vec<ProcessContribution>> {
        check_index("functional unit", func_unit, self.func_units)?;
        check_index("method", method, self.methods)?;
        let supply = mlca.supply(func_unit)?;
        Ok(flow_breakdown(
            mlca.matrices(),
            supply,
            mlca.characterization(method)?,
        ))
    }

    pub fn top_processes(
        &self,
        mlca: &MultiLca,
        func_unit: usize,
        method: usize,
        n: usize,
    ) -> CalcResult<Vec<ProcessContribution>> {
        let mut rows = self.processes(mlca, func_unit, method)?;
        rows.truncate(n);
        Ok(rows)
    }
}

/// Contribution analysis per scenario of a superstructure calculation.
#[derive(Debug, Clone)]
pub struct SuperstructureContributions {
    scenarios: usize,
    func_units: usize,
    methods: usize,
}

impl SuperstructureContributions {
    pub fn new(mlca: &SuperstructureMlca) -> Self {
        Self {
            scenarios: mlca.scenario_names().len(),
            func_units: mlca.func_unit_count(),
            methods: mlca.methods().len(),
        }
    }

    pub fn scenario_count(&self) -> usize {
        self.scenarios
    }

    pub fn processes(
        &self,
        mlca: &SuperstructureMlca,
        scenario: usize,
        func_unit: usize,
        method: usize,
    ) -> CalcResult<Vec<ProcessContribution>> {
        check_index("scenario", scenario, self.scenarios)?;
        check_index("functional unit", func_unit, self.func_units)?;
        check_index("method", method, self.methods)?;
        let (matrices, supply) = mlca.scenario_state(scenario, func_unit)?;
        Ok(process_breakdown(
            matrices,
            supply,
            mlca.characterization(method)?,
        ))
    }

    pub fn top_processes(
        &self,
        mlca: &SuperstructureMlca,
        scenario: usize,
        func_unit: usize,
        method: usize,
        n: usize,
    ) -> CalcResult<Vec<ProcessContribution>> {
        let mut rows = self.processes(mlca, scenario, func_unit, method)?;
        rows.truncate(n);
        Ok(rows)
    }
}
