//! End-to-end tests for the reference matrix engine.

use lf_calc::{
    CalcError, Contributions, MonteCarloLca, MultiLca, SuperstructureContributions,
    SuperstructureMlca,
};
use lf_core::{EntityKey, MethodRef};
use lf_registry::{
    Activity, ActivityKind, Distribution, EntityRegistry, Exchange, ExchangeKind, MethodCatalog,
    MethodMeta, Uncertainty,
};
use lf_setup::{CalculationSetup, FunctionalUnit, ScenarioData, SetupStore};
use proptest::prelude::*;

fn key(code: &str) -> EntityKey {
    EntityKey::new("db", code)
}

fn co2() -> EntityKey {
    EntityKey::new("bio", "co2")
}

fn gwp() -> MethodRef {
    MethodRef::new(["IPCC", "GWP100"])
}

/// steel <- 0.5 coal. Steel emits 2 co2, coal emits 3 co2.
fn registry(coal_uncertainty: Option<Uncertainty>) -> EntityRegistry {
    let mut coal_input =
        Exchange::new(key("t1"), key("coal"), key("steel"), 0.5, ExchangeKind::Technosphere);
    if let Some(u) = coal_uncertainty {
        coal_input = coal_input.with_uncertainty(u);
    }
    EntityRegistry::from_entities(
        [
            Activity::process(key("steel"), "steel production").with_product("steel", "kg"),
            Activity::process(key("coal"), "coal mining").with_product("coal", "kg"),
            Activity::process(key("farm"), "farming").with_product("wheat", "kg"),
            Activity::process(co2(), "carbon dioxide").with_kind(ActivityKind::Emission),
        ],
        [
            Exchange::new(key("p1"), key("steel"), key("steel"), 1.0, ExchangeKind::Production),
            coal_input,
            Exchange::new(key("b1"), co2(), key("steel"), 2.0, ExchangeKind::Biosphere),
            Exchange::new(key("b2"), co2(), key("coal"), 3.0, ExchangeKind::Biosphere),
            Exchange::new(key("b3"), co2(), key("farm"), 1.0, ExchangeKind::Biosphere),
        ],
    )
    .unwrap()
}

fn catalog() -> MethodCatalog {
    MethodCatalog::from_methods([(gwp(), MethodMeta::new("kg CO2-eq").with_factor(co2(), 1.0))])
}

fn store() -> SetupStore {
    SetupStore::from_setups([CalculationSetup::new("steel")
        .with_unit(key("steel"), 2.0)
        .with_unit(key("coal"), 1.0)
        .with_method(gwp())])
    .unwrap()
}

#[test]
fn multi_lca_scores_every_functional_unit() {
    let reg = registry(None);
    let mut mlca = MultiLca::new(&store(), &reg, &catalog(), "steel").unwrap();
    assert!(!mlca.is_calculated());
    assert_eq!(mlca.score(0, 0), Err(CalcError::NotCalculated));

    mlca.calculate().unwrap();
    assert_eq!(mlca.func_unit_count(), 2);
    assert!((mlca.score(0, 0).unwrap() - 7.0).abs() < 1e-12);
    assert!((mlca.score(1, 0).unwrap() - 3.0).abs() < 1e-12);
    assert!(matches!(mlca.score(2, 0), Err(CalcError::IndexOob { .. })));
}

#[test]
fn multi_lca_lookup_failures_are_key_errors() {
    let reg = registry(None);
    let err = MultiLca::new(&store(), &reg, &catalog(), "missing").err().unwrap();
    assert!(err.is_key_error());

    let empty = SetupStore::from_setups([CalculationSetup::new("empty")]).unwrap();
    let err = MultiLca::new(&empty, &reg, &catalog(), "empty").err().unwrap();
    assert_eq!(err, CalcError::EmptyDemand { name: "empty".into() });

    let no_method = MethodCatalog::new();
    let err = MultiLca::new(&store(), &reg, &no_method, "steel").err().unwrap();
    assert_eq!(err, CalcError::MethodNotFound { method: gwp() });
}

#[test]
fn contributions_rank_processes() {
    let reg = registry(None);
    let mut mlca = MultiLca::new(&store(), &reg, &catalog(), "steel").unwrap();
    mlca.calculate().unwrap();
    let contributions = Contributions::new(&mlca);

    let top = contributions.top_processes(&mlca, 0, 0, 1).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].key, key("steel"));
    assert!((top[0].score - 4.0).abs() < 1e-12);
    assert!((top[0].share - 4.0 / 7.0).abs() < 1e-12);

    let all = contributions.processes(&mlca, 0, 0).unwrap();
    let total: f64 = all.iter().map(|c| c.share).sum();
    assert!((total - 1.0).abs() < 1e-12);

    let flows = contributions.flows(&mlca, 0, 0).unwrap();
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].key, co2());
}

fn coal_scenarios() -> ScenarioData {
    ScenarioData::new("coal intensity", ["baseline", "coal heavy"]).with_row(
        key("coal"),
        key("steel"),
        ExchangeKind::Technosphere,
        vec![0.5, 1.0],
    )
}

#[test]
fn superstructure_scores_per_scenario() {
    let reg = registry(None);
    let mut smlca =
        SuperstructureMlca::new(&store(), &reg, &catalog(), "steel", &coal_scenarios()).unwrap();
    assert_eq!(smlca.overridden_rows(), 1);
    smlca.calculate().unwrap();

    assert!((smlca.score(0, 0, 0).unwrap() - 7.0).abs() < 1e-12);
    // 2 * (2 + 1.0 * 3)
    assert!((smlca.score(1, 0, 0).unwrap() - 10.0).abs() < 1e-12);

    let contributions = SuperstructureContributions::new(&smlca);
    assert_eq!(contributions.scenario_count(), 2);
    let top = contributions.top_processes(&smlca, 1, 0, 0, 1).unwrap();
    assert_eq!(top[0].key, key("coal"));
    assert!((top[0].score - 6.0).abs() < 1e-12);
}

#[test]
fn superstructure_without_overlap_is_rejected() {
    let reg = registry(None);
    let data = ScenarioData::new("unrelated", ["a", "b"]).with_row(
        key("farm"),
        key("mill"),
        ExchangeKind::Technosphere,
        vec![1.0, 2.0],
    );
    let err = SuperstructureMlca::new(&store(), &reg, &catalog(), "steel", &data)
        .err()
        .unwrap();
    assert_eq!(err, CalcError::NoOverlap);
}

#[test]
fn superstructure_row_for_indexed_activity_must_match_an_exchange() {
    let reg = registry(None);
    let data = coal_scenarios().with_row(
        key("farm"),
        key("steel"),
        ExchangeKind::Technosphere,
        vec![0.0, 0.2],
    );
    let err = SuperstructureMlca::new(&store(), &reg, &catalog(), "steel", &data)
        .err()
        .unwrap();
    assert_eq!(
        err,
        CalcError::ScenarioExchangeNotFound {
            input: key("farm"),
            output: key("steel"),
        }
    );
}

#[test]
fn malformed_superstructure_fails_validation() {
    let reg = registry(None);
    let data = ScenarioData::new("short", ["a", "b"]).with_row(
        key("coal"),
        key("steel"),
        ExchangeKind::Technosphere,
        vec![1.0],
    );
    let err = SuperstructureMlca::new(&store(), &reg, &catalog(), "steel", &data)
        .err()
        .unwrap();
    assert!(matches!(err, CalcError::SuperstructureAssertion { .. }));

    let none = ScenarioData::new("none", Vec::<String>::new());
    let err = SuperstructureMlca::new(&store(), &reg, &catalog(), "steel", &none)
        .err()
        .unwrap();
    assert!(matches!(err, CalcError::SuperstructureAssertion { .. }));
}

#[test]
fn monte_carlo_without_uncertainty_is_deterministic() {
    let reg = registry(None);
    let mc = MonteCarloLca::new(&reg, &catalog(), FunctionalUnit::new(key("steel"), 2.0), &[gwp()])
        .unwrap();
    assert_eq!(mc.uncertain_exchanges(), 0);
    let result = mc.run(10, 42).unwrap();
    assert_eq!(result.iterations, 10);
    assert!(result.methods[0].samples.iter().all(|s| (s - 7.0).abs() < 1e-12));
    assert!(mc.run(0, 42).is_err());
}

#[test]
fn monte_carlo_samples_around_the_deterministic_score() {
    let reg = registry(Some(Uncertainty {
        distribution: Distribution::Normal,
        loc: 0.5,
        scale: 0.05,
        ..Uncertainty::default()
    }));
    let mc = MonteCarloLca::new(&reg, &catalog(), FunctionalUnit::new(key("steel"), 2.0), &[gwp()])
        .unwrap();
    assert_eq!(mc.uncertain_exchanges(), 1);

    let a = mc.run(2000, 7).unwrap();
    let b = mc.run(2000, 7).unwrap();
    assert_eq!(a, b);

    let samples = &a.methods[0];
    // score = 4 + 6 * coal_input, so sd ~ 0.3
    assert!((samples.mean() - 7.0).abs() < 0.05);
    assert!(samples.std_dev() > 0.2 && samples.std_dev() < 0.4);
}

proptest! {
    #[test]
    fn score_scales_with_demand(amount in 0.01f64..1000.0) {
        let reg = registry(None);
        let store = SetupStore::from_setups([CalculationSetup::new("s")
            .with_unit(key("steel"), amount)
            .with_method(gwp())])
        .unwrap();
        let mut mlca = MultiLca::new(&store, &reg, &catalog(), "s").unwrap();
        mlca.calculate().unwrap();
        let score = mlca.score(0, 0).unwrap();
        prop_assert!((score - 3.5 * amount).abs() <= 1e-9 * amount.max(1.0));
    }
}
