//! Scenario-aware multi-LCA over superstructure data.

use std::collections::HashSet;

use lf_core::MethodRef;
use lf_registry::{EntityRegistry, MethodCatalog};
use lf_setup::{FunctionalUnit, ScenarioData, SetupStore};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::error::{CalcError, CalcResult};
use crate::matrix::LcaMatrices;
use crate::mlca::{MultiLca, check_index, solve_all};

/// Matrix slots overridden by one superstructure row.
#[derive(Debug, Clone)]
struct Override {
    slots: Vec<usize>,
    values: Vec<f64>,
}

#[derive(Debug, Clone)]
struct ScenarioResult {
    matrices: LcaMatrices,
    supply: Vec<DVector<f64>>,
    scores: DMatrix<f64>,
}

pub struct SuperstructureMlca {
    base: MultiLca,
    scenario_names: Vec<String>,
    overrides: Vec<Override>,
    results: Option<Vec<ScenarioResult>>,
}

/// Structural checks on the dataset itself, before any matrix work.
fn validate(data: &ScenarioData) -> CalcResult<()> {
    let n = data.scenario_names.len();
    if n == 0 {
        return Err(CalcError::SuperstructureAssertion {
            what: format!("dataset '{}' defines no scenarios", data.name),
        });
    }
    let mut seen = HashSet::new();
    for row in &data.rows {
        if row.values.len() != n {
            return Err(CalcError::SuperstructureAssertion {
                what: format!(
                    "row {} -> {} has {} values for {} scenarios",
                    row.input,
                    row.output,
                    row.values.len(),
                    n
                ),
            });
        }
        if let Some(v) = row.values.iter().find(|v| !v.is_finite()) {
            return Err(CalcError::SuperstructureAssertion {
                what: format!("row {} -> {} has non-finite value {v}", row.input, row.output),
            });
        }
        if !seen.insert((&row.input, &row.output, row.kind)) {
            return Err(CalcError::SuperstructureAssertion {
                what: format!("duplicate row {} -> {}", row.input, row.output),
            });
        }
    }
    Ok(())
}

impl SuperstructureMlca {
    pub fn new(
        store: &SetupStore,
        registry: &EntityRegistry,
        catalog: &MethodCatalog,
        setup_name: &str,
        data: &ScenarioData,
    ) -> CalcResult<Self> {
        validate(data)?;
        let base = MultiLca::new(store, registry, catalog, setup_name)?;
        let matrices = base.matrices();

        let mut overrides = Vec::new();
        let mut unmatched = Vec::new();
        for row in &data.rows {
            let slots = matrices.find_slots(&row.input, &row.output, row.kind);
            if slots.is_empty() {
                unmatched.push(row);
            } else {
                overrides.push(Override {
                    slots,
                    values: row.values.clone(),
                });
            }
        }

        if overrides.is_empty() {
            return Err(CalcError::NoOverlap);
        }
        // Rows for activities outside this supply chain are fine; a row for an
        // activity we did index must name one of its exchanges.
        if let Some(row) = unmatched
            .iter()
            .find(|row| matrices.activities().get(&row.output).is_some())
        {
            return Err(CalcError::ScenarioExchangeNotFound {
                input: row.input.clone(),
                output: row.output.clone(),
            });
        }
        if !unmatched.is_empty() {
            warn!(
                dataset = %data.name,
                ignored = unmatched.len(),
                "superstructure rows outside the supply chain ignored"
            );
        }

        Ok(Self {
            base,
            scenario_names: data.scenario_names.clone(),
            overrides,
            results: None,
        })
    }

    /// Solve every scenario.
    pub fn calculate(&mut self) -> CalcResult<()> {
        let mut results = Vec::with_capacity(self.scenario_names.len());
        for (k, name) in self.scenario_names.iter().enumerate() {
            let mut matrices = self.base.matrices().clone();
            for ov in &self.overrides {
                let value = ov.values[k];
                for (i, &slot) in ov.slots.iter().enumerate() {
                    matrices.set_slot_amount(slot, if i == 0 { value } else { 0.0 })?;
                }
            }
            let characterization: Vec<DVector<f64>> = (0..self.base.methods().len())
                .map(|m| self.base.characterization(m).cloned())
                .collect::<CalcResult<_>>()?;
            let (supply, scores) = solve_all(&matrices, self.base.func_units(), &characterization)?;
            debug!(scenario = %name, "scenario calculated");
            results.push(ScenarioResult {
                matrices,
                supply,
                scores,
            });
        }
        self.results = Some(results);
        Ok(())
    }

    pub fn setup_name(&self) -> &str {
        self.base.setup_name()
    }

    pub fn scenario_names(&self) -> &[String] {
        &self.scenario_names
    }

    pub fn func_units(&self) -> &[FunctionalUnit] {
        self.base.func_units()
    }

    pub fn func_unit_count(&self) -> usize {
        self.base.func_unit_count()
    }

    pub fn methods(&self) -> &[MethodRef] {
        self.base.methods()
    }

    pub fn characterization(&self, method: usize) -> CalcResult<&DVector<f64>> {
        self.base.characterization(method)
    }

    /// Number of superstructure rows that override matrix entries.
    pub fn overridden_rows(&self) -> usize {
        self.overrides.len()
    }

    fn result(&self, scenario: usize) -> CalcResult<&ScenarioResult> {
        let results = self.results.as_ref().ok_or(CalcError::NotCalculated)?;
        check_index("scenario", scenario, results.len())?;
        Ok(&results[scenario])
    }

    pub fn scores(&self, scenario: usize) -> CalcResult<&DMatrix<f64>> {
        Ok(&self.result(scenario)?.scores)
    }

    pub fn score(&self, scenario: usize, func_unit: usize, method: usize) -> CalcResult<f64> {
        let scores = self.scores(scenario)?;
        check_index("functional unit", func_unit, scores.nrows())?;
        check_index("method", method, scores.ncols())?;
        Ok(scores[(func_unit, method)])
    }

    pub(crate) fn scenario_state(
        &self,
        scenario: usize,
        func_unit: usize,
    ) -> CalcResult<(&LcaMatrices, &DVector<f64>)> {
        let result = self.result(scenario)?;
        check_index("functional unit", func_unit, result.supply.len())?;
        Ok((&result.matrices, &result.supply[func_unit]))
    }
}
