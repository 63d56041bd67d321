//! Monte-Carlo companion: resampled scores for a single functional unit.

use lf_core::MethodRef;
use lf_registry::{Distribution, EntityRegistry, MethodCatalog, Uncertainty};
use lf_setup::FunctionalUnit;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{CalcError, CalcResult};
use crate::matrix::LcaMatrices;

/// Samples for one method, in iteration order.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSamples {
    pub method: MethodRef,
    pub samples: Vec<f64>,
}

impl MethodSamples {
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Sample standard deviation (n - 1).
    pub fn std_dev(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt()
    }

    /// Nearest-rank percentile, `p` in `[0, 100]`.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.samples.is_empty() || !(0.0..=100.0).contains(&p) {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(f64::total_cmp);
        let rank = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted.get(rank).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloResult {
    pub iterations: usize,
    pub methods: Vec<MethodSamples>,
}

/// Built from one demand and a method list; nothing is sampled until `run`.
pub struct MonteCarloLca {
    demand: FunctionalUnit,
    methods: Vec<MethodRef>,
    matrices: LcaMatrices,
    characterization: Vec<DVector<f64>>,
    uncertain: Vec<usize>,
}

impl MonteCarloLca {
    pub fn new(
        registry: &EntityRegistry,
        catalog: &MethodCatalog,
        demand: FunctionalUnit,
        methods: &[MethodRef],
    ) -> CalcResult<Self> {
        let matrices = LcaMatrices::build(registry, std::slice::from_ref(&demand.key))?;
        let mut characterization = Vec::with_capacity(methods.len());
        for method in methods {
            characterization.push(matrices.characterization(&catalog.get(method)?));
        }
        let uncertain = matrices
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.uncertainty
                    .as_ref()
                    .is_some_and(|u| u.distribution != Distribution::None)
            })
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            demand,
            methods: methods.to_vec(),
            matrices,
            characterization,
            uncertain,
        })
    }

    pub fn demand(&self) -> &FunctionalUnit {
        &self.demand
    }

    pub fn methods(&self) -> &[MethodRef] {
        &self.methods
    }

    /// Number of exchanges that carry a sampling distribution.
    pub fn uncertain_exchanges(&self) -> usize {
        self.uncertain.len()
    }

    /// Draw `iterations` samples with a seeded generator.
    pub fn run(&self, iterations: usize, seed: u64) -> CalcResult<MonteCarloResult> {
        if iterations == 0 {
            return Err(CalcError::InvalidArg {
                what: "Monte-Carlo iterations must be positive".to_string(),
            });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut samples = vec![Vec::with_capacity(iterations); self.methods.len()];
        let f = self
            .matrices
            .demand_vector(&self.demand.key, self.demand.amount)?;

        for _ in 0..iterations {
            let mut matrices = self.matrices.clone();
            for &slot in &self.uncertain {
                let s = &self.matrices.slots()[slot];
                if let Some(u) = &s.uncertainty {
                    let value = sample(&mut rng, s.amount, u)?;
                    matrices.set_slot_amount(slot, value)?;
                }
            }
            let supply = matrices.solve(&f)?;
            let g = matrices.inventory(&supply);
            for (m, c) in self.characterization.iter().enumerate() {
                samples[m].push(c.dot(&g));
            }
        }
        debug!(
            key = %self.demand.key,
            iterations,
            uncertain = self.uncertain.len(),
            "Monte-Carlo run finished"
        );

        Ok(MonteCarloResult {
            iterations,
            methods: self
                .methods
                .iter()
                .cloned()
                .zip(samples)
                .map(|(method, samples)| MethodSamples { method, samples })
                .collect(),
        })
    }
}

fn standard_normal(rng: &mut StdRng) -> f64 {
    // Box-Muller; u1 in (0, 1] keeps ln finite.
    let u1 = 1.0 - rng.gen_range(0.0..1.0_f64);
    let u2 = rng.gen_range(0.0..1.0_f64);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn sample(rng: &mut StdRng, amount: f64, u: &Uncertainty) -> CalcResult<f64> {
    let value = match u.distribution {
        Distribution::None => amount,
        Distribution::Normal => {
            let v = u.loc + u.scale.max(0.0) * standard_normal(rng);
            clamp(v, u)
        }
        Distribution::Lognormal => {
            let v = (u.loc + u.scale.max(0.0) * standard_normal(rng)).exp();
            if amount < 0.0 { -v } else { v }
        }
        Distribution::Uniform => {
            let lo = u.minimum.unwrap_or(amount);
            let hi = u.maximum.unwrap_or(amount);
            if lo > hi {
                return Err(CalcError::InvalidArg {
                    what: format!("uniform bounds reversed: [{lo}, {hi}]"),
                });
            }
            if lo == hi { lo } else { rng.gen_range(lo..=hi) }
        }
    };
    Ok(value)
}

fn clamp(v: f64, u: &Uncertainty) -> f64 {
    let v = u.minimum.map_or(v, |lo| v.max(lo));
    u.maximum.map_or(v, |hi| v.min(hi))
}
