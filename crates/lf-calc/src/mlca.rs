//! Deterministic multi-LCA: every functional unit against every method.

use lf_core::MethodRef;
use lf_registry::{EntityRegistry, MethodCatalog};
use lf_setup::{FunctionalUnit, SetupStore};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{CalcError, CalcResult};
use crate::matrix::LcaMatrices;

pub struct MultiLca {
    setup_name: String,
    func_units: Vec<FunctionalUnit>,
    methods: Vec<MethodRef>,
    matrices: LcaMatrices,
    characterization: Vec<DVector<f64>>,
    supply: Vec<DVector<f64>>,
    scores: Option<DMatrix<f64>>,
}

impl MultiLca {
    /// Build the engine for a stored setup. Lookup failures (setup, demanded
    /// activities, methods) surface as key errors.
    pub fn new(
        store: &SetupStore,
        registry: &EntityRegistry,
        catalog: &MethodCatalog,
        setup_name: &str,
    ) -> CalcResult<Self> {
        let setup = store.get(setup_name).ok_or_else(|| CalcError::SetupNotFound {
            name: setup_name.to_string(),
        })?;
        if setup.inv.is_empty() {
            return Err(CalcError::EmptyDemand {
                name: setup_name.to_string(),
            });
        }

        let demand: Vec<_> = setup.inv.iter().map(|fu| fu.key.clone()).collect();
        let matrices = LcaMatrices::build(registry, &demand)?;

        let mut characterization = Vec::with_capacity(setup.ia.len());
        for method in &setup.ia {
            let meta = catalog.get(method)?;
            characterization.push(matrices.characterization(&meta));
        }

        Ok(Self {
            setup_name: setup.name,
            func_units: setup.inv,
            methods: setup.ia,
            matrices,
            characterization,
            supply: Vec::new(),
            scores: None,
        })
    }

    /// Solve every functional unit and fill the score matrix.
    pub fn calculate(&mut self) -> CalcResult<()> {
        let (supply, scores) =
            solve_all(&self.matrices, &self.func_units, &self.characterization)?;
        debug!(
            setup = %self.setup_name,
            func_units = self.func_units.len(),
            methods = self.methods.len(),
            "multi-LCA calculated"
        );
        self.supply = supply;
        self.scores = Some(scores);
        Ok(())
    }

    pub fn setup_name(&self) -> &str {
        &self.setup_name
    }

    pub fn func_units(&self) -> &[FunctionalUnit] {
        &self.func_units
    }

    pub fn func_unit_count(&self) -> usize {
        self.func_units.len()
    }

    pub fn methods(&self) -> &[MethodRef] {
        &self.methods
    }

    pub fn matrices(&self) -> &LcaMatrices {
        &self.matrices
    }

    pub fn characterization(&self, method: usize) -> CalcResult<&DVector<f64>> {
        let len = self.characterization.len();
        self.characterization.get(method).ok_or(CalcError::IndexOob {
            what: "method",
            index: method,
            len,
        })
    }

    pub fn is_calculated(&self) -> bool {
        self.scores.is_some()
    }

    /// Scores as a `[functional unit x method]` matrix.
    pub fn scores(&self) -> CalcResult<&DMatrix<f64>> {
        self.scores.as_ref().ok_or(CalcError::NotCalculated)
    }

    pub fn score(&self, func_unit: usize, method: usize) -> CalcResult<f64> {
        let scores = self.scores()?;
        check_index("functional unit", func_unit, scores.nrows())?;
        check_index("method", method, scores.ncols())?;
        Ok(scores[(func_unit, method)])
    }

    pub fn supply(&self, func_unit: usize) -> CalcResult<&DVector<f64>> {
        if self.scores.is_none() {
            return Err(CalcError::NotCalculated);
        }
        let len = self.supply.len();
        self.supply.get(func_unit).ok_or(CalcError::IndexOob {
            what: "functional unit",
            index: func_unit,
            len,
        })
    }

    pub fn inventory(&self, func_unit: usize) -> CalcResult<DVector<f64>> {
        Ok(self.matrices.inventory(self.supply(func_unit)?))
    }
}

pub(crate) fn check_index(what: &'static str, index: usize, len: usize) -> CalcResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(CalcError::IndexOob { what, index, len })
    }
}

/// Supply vectors per functional unit and the score matrix.
pub(crate) fn solve_all(
    matrices: &LcaMatrices,
    func_units: &[FunctionalUnit],
    characterization: &[DVector<f64>],
) -> CalcResult<(Vec<DVector<f64>>, DMatrix<f64>)> {
    let lu = matrices.technosphere().clone().lu();
    let mut supply = Vec::with_capacity(func_units.len());
    let mut scores = DMatrix::zeros(func_units.len(), characterization.len());

    for (i, fu) in func_units.iter().enumerate() {
        let f = matrices.demand_vector(&fu.key, fu.amount)?;
        let s = lu.solve(&f).ok_or_else(|| CalcError::Singular {
            what: format!("demand {}", fu.key),
        })?;
        let g = matrices.inventory(&s);
        for (j, c) in characterization.iter().enumerate() {
            scores[(i, j)] = c.dot(&g);
        }
        supply.push(s);
    }
    Ok((supply, scores))
}
