//! Technosphere and biosphere matrix assembly.

use std::collections::{HashSet, VecDeque};

use lf_core::EntityKey;
use lf_registry::{ActivityKind, EntityRegistry, ExchangeKind, MethodMeta, Uncertainty};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{CalcError, CalcResult};
use crate::indexing::KeyIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKind {
    Technosphere,
    Biosphere,
}

/// Where an exchange lands: `matrix[(row, col)] += sign * amount`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixEntry {
    pub kind: MatrixKind,
    pub row: usize,
    pub col: usize,
    pub sign: f64,
}

/// One registry exchange placed in the matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeSlot {
    pub key: EntityKey,
    pub input: EntityKey,
    pub output: EntityKey,
    pub exchange_kind: ExchangeKind,
    pub entry: MatrixEntry,
    pub amount: f64,
    pub uncertainty: Option<Uncertainty>,
}

/// Dense matrices for the supply chain reachable from a demand.
///
/// Columns of `A` and `B` are activities; rows of `A` are the same
/// activities (their reference products), rows of `B` are elementary flows.
#[derive(Debug, Clone)]
pub struct LcaMatrices {
    activities: KeyIndex,
    flows: KeyIndex,
    technosphere: DMatrix<f64>,
    biosphere: DMatrix<f64>,
    slots: Vec<ExchangeSlot>,
}

impl LcaMatrices {
    /// Walk the technosphere from `demand` and assemble `A` and `B`.
    ///
    /// Every demanded key must be a process. Upstream inputs that do not
    /// exist fail with `ActivityNotFound`.
    pub fn build(registry: &EntityRegistry, demand: &[EntityKey]) -> CalcResult<Self> {
        let mut activities = KeyIndex::new();
        let mut flows = KeyIndex::new();
        let mut slots = Vec::new();
        let mut with_production = HashSet::new();
        let mut queue = VecDeque::new();

        for key in demand {
            let act = registry.get_activity(key)?;
            if act.kind != ActivityKind::Process {
                return Err(CalcError::NotAProcess { key: key.clone() });
            }
            if activities.insert(key).1 {
                queue.push_back(key.clone());
            }
        }

        while let Some(key) = queue.pop_front() {
            // Demanded keys were checked above; upstream ones are checked here.
            registry.get_activity(&key)?;
            let col = activities.get(&key).ok_or_else(|| CalcError::CriticalCalculation {
                what: format!("queued activity {key} has no column"),
            })?;

            for exc in registry.exchanges_of(&key) {
                let entry = match exc.kind {
                    ExchangeKind::Production => {
                        with_production.insert(col);
                        MatrixEntry {
                            kind: MatrixKind::Technosphere,
                            row: col,
                            col,
                            sign: 1.0,
                        }
                    }
                    ExchangeKind::Technosphere => {
                        let (row, new) = activities.insert(&exc.input);
                        if new {
                            queue.push_back(exc.input.clone());
                        }
                        MatrixEntry {
                            kind: MatrixKind::Technosphere,
                            row,
                            col,
                            sign: -1.0,
                        }
                    }
                    ExchangeKind::Biosphere => MatrixEntry {
                        kind: MatrixKind::Biosphere,
                        row: flows.insert(&exc.input).0,
                        col,
                        sign: 1.0,
                    },
                };
                slots.push(ExchangeSlot {
                    key: exc.key,
                    input: exc.input,
                    output: exc.output,
                    exchange_kind: exc.kind,
                    entry,
                    amount: exc.amount,
                    uncertainty: exc.uncertainty,
                });
            }
        }

        let n = activities.len();
        let mut technosphere = DMatrix::zeros(n, n);
        let mut biosphere = DMatrix::zeros(flows.len(), n);
        for i in 0..n {
            if !with_production.contains(&i) {
                technosphere[(i, i)] = 1.0;
            }
        }
        for slot in &slots {
            let e = slot.entry;
            match e.kind {
                MatrixKind::Technosphere => technosphere[(e.row, e.col)] += e.sign * slot.amount,
                MatrixKind::Biosphere => biosphere[(e.row, e.col)] += e.sign * slot.amount,
            }
        }

        debug!(
            activities = n,
            flows = flows.len(),
            exchanges = slots.len(),
            "matrices built"
        );

        Ok(Self {
            activities,
            flows,
            technosphere,
            biosphere,
            slots,
        })
    }

    pub fn activities(&self) -> &KeyIndex {
        &self.activities
    }

    pub fn flows(&self) -> &KeyIndex {
        &self.flows
    }

    pub fn technosphere(&self) -> &DMatrix<f64> {
        &self.technosphere
    }

    pub fn biosphere(&self) -> &DMatrix<f64> {
        &self.biosphere
    }

    pub fn slots(&self) -> &[ExchangeSlot] {
        &self.slots
    }

    /// Slots matching an exchange's endpoints and kind.
    pub fn find_slots(
        &self,
        input: &EntityKey,
        output: &EntityKey,
        kind: ExchangeKind,
    ) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| &s.input == input && &s.output == output && s.exchange_kind == kind)
            .map(|(i, _)| i)
            .collect()
    }

    /// Replace the amount carried by one slot, keeping the matrices in step.
    pub fn set_slot_amount(&mut self, slot: usize, amount: f64) -> CalcResult<()> {
        let len = self.slots.len();
        let s = self.slots.get_mut(slot).ok_or(CalcError::IndexOob {
            what: "exchange slot",
            index: slot,
            len,
        })?;
        let delta = s.entry.sign * (amount - s.amount);
        s.amount = amount;
        let e = s.entry;
        match e.kind {
            MatrixKind::Technosphere => self.technosphere[(e.row, e.col)] += delta,
            MatrixKind::Biosphere => self.biosphere[(e.row, e.col)] += delta,
        }
        Ok(())
    }

    /// Demand vector with `amount` at the activity's row.
    pub fn demand_vector(&self, key: &EntityKey, amount: f64) -> CalcResult<DVector<f64>> {
        let idx = self
            .activities
            .get(key)
            .ok_or_else(|| CalcError::ActivityNotFound { key: key.clone() })?;
        let mut f = DVector::zeros(self.activities.len());
        f[idx] = amount;
        Ok(f)
    }

    /// Solve `A s = f` for the supply vector.
    pub fn solve(&self, demand: &DVector<f64>) -> CalcResult<DVector<f64>> {
        self.technosphere
            .clone()
            .lu()
            .solve(demand)
            .ok_or_else(|| CalcError::Singular {
                what: format!("{} activities", self.activities.len()),
            })
    }

    /// Life-cycle inventory `g = B s`.
    pub fn inventory(&self, supply: &DVector<f64>) -> DVector<f64> {
        &self.biosphere * supply
    }

    /// Characterization vector aligned with the biosphere rows. Factors for
    /// flows outside this supply chain are ignored.
    pub fn characterization(&self, meta: &MethodMeta) -> DVector<f64> {
        let mut c = DVector::zeros(self.flows.len());
        for cf in &meta.factors {
            if let Some(idx) = self.flows.get(&cf.flow) {
                c[idx] += cf.amount;
            }
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lf_registry::{Activity, Exchange};

    fn key(code: &str) -> EntityKey {
        EntityKey::new("db", code)
    }

    /// steel <- 0.5 coal; coal emits 3 co2, steel emits 2 co2.
    fn registry() -> EntityRegistry {
        EntityRegistry::from_entities(
            [
                Activity::process(key("steel"), "steel"),
                Activity::process(key("coal"), "coal"),
                Activity::process(EntityKey::new("bio", "co2"), "co2")
                    .with_kind(ActivityKind::Emission),
            ],
            [
                Exchange::new(key("p"), key("steel"), key("steel"), 1.0, ExchangeKind::Production),
                Exchange::new(key("t"), key("coal"), key("steel"), 0.5, ExchangeKind::Technosphere),
                Exchange::new(
                    key("b1"),
                    EntityKey::new("bio", "co2"),
                    key("steel"),
                    2.0,
                    ExchangeKind::Biosphere,
                ),
                Exchange::new(
                    key("b2"),
                    EntityKey::new("bio", "co2"),
                    key("coal"),
                    3.0,
                    ExchangeKind::Biosphere,
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn builds_reachable_supply_chain() {
        let reg = registry();
        let m = LcaMatrices::build(&reg, &[key("steel")]).unwrap();
        assert_eq!(m.activities().len(), 2);
        assert_eq!(m.flows().len(), 1);

        let coal = m.activities().get(&key("coal")).unwrap();
        let steel = m.activities().get(&key("steel")).unwrap();
        assert_eq!(m.technosphere()[(coal, steel)], -0.5);
        // coal has no production exchange: implicit unit output
        assert_eq!(m.technosphere()[(coal, coal)], 1.0);
    }

    #[test]
    fn solve_gives_inventory() {
        let reg = registry();
        let m = LcaMatrices::build(&reg, &[key("steel")]).unwrap();
        let f = m.demand_vector(&key("steel"), 2.0).unwrap();
        let s = m.solve(&f).unwrap();
        let g = m.inventory(&s);
        // 2 * (2 + 0.5 * 3)
        assert!((g[0] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn set_slot_amount_updates_matrix() {
        let reg = registry();
        let mut m = LcaMatrices::build(&reg, &[key("steel")]).unwrap();
        let slot = m.find_slots(&key("coal"), &key("steel"), ExchangeKind::Technosphere)[0];
        m.set_slot_amount(slot, 1.0).unwrap();
        let coal = m.activities().get(&key("coal")).unwrap();
        let steel = m.activities().get(&key("steel")).unwrap();
        assert_eq!(m.technosphere()[(coal, steel)], -1.0);
    }

    #[test]
    fn missing_upstream_is_key_error() {
        let reg = registry();
        reg.delete_activity(&key("coal")).unwrap();
        let err = LcaMatrices::build(&reg, &[key("steel")]).unwrap_err();
        assert_eq!(err, CalcError::ActivityNotFound { key: key("coal") });
        assert!(err.is_key_error());
    }

    #[test]
    fn demanding_an_emission_is_rejected() {
        let reg = registry();
        let err = LcaMatrices::build(&reg, &[EntityKey::new("bio", "co2")]).unwrap_err();
        assert!(matches!(err, CalcError::NotAProcess { .. }));
    }
}
