//! Workspace and calculation-setup definitions.

use lf_core::{EntityKey, MethodRef};
use lf_registry::{Activity, Exchange, ExchangeKind, MethodMeta};
use serde::{Deserialize, Serialize};

/// Everything the CLI and tests need to stand up a session: the entity
/// database, the method catalog, the durable setups and any scenario
/// datasets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workspace {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub database: DatabaseDef,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    #[serde(default)]
    pub setups: Vec<CalculationSetup>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioData>,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: crate::migrate::LATEST_VERSION,
            name: name.into(),
            database: DatabaseDef::default(),
            methods: Vec::new(),
            setups: Vec::new(),
            scenarios: Vec::new(),
        }
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioData> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DatabaseDef {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MethodDef {
    pub method: MethodRef,
    #[serde(flatten)]
    pub meta: MethodMeta,
}

/// One demanded activity and its amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionalUnit {
    pub key: EntityKey,
    pub amount: f64,
}

impl FunctionalUnit {
    pub fn new(key: EntityKey, amount: f64) -> Self {
        Self { key, amount }
    }
}

/// A named bundle of functional units (`inv`) and impact methods (`ia`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalculationSetup {
    pub name: String,
    #[serde(default)]
    pub inv: Vec<FunctionalUnit>,
    #[serde(default)]
    pub ia: Vec<MethodRef>,
}

impl CalculationSetup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inv: Vec::new(),
            ia: Vec::new(),
        }
    }

    pub fn with_unit(mut self, key: EntityKey, amount: f64) -> Self {
        self.inv.push(FunctionalUnit::new(key, amount));
        self
    }

    pub fn with_method(mut self, method: MethodRef) -> Self {
        self.ia.push(method);
        self
    }
}

/// Superstructure data: per-exchange overrides across named scenarios.
///
/// Each row carries one value per entry of `scenario_names`, in that order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioData {
    pub name: String,
    pub scenario_names: Vec<String>,
    #[serde(default)]
    pub rows: Vec<ScenarioRow>,
}

impl ScenarioData {
    pub fn new<I, S>(name: impl Into<String>, scenarios: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            scenario_names: scenarios.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(
        mut self,
        input: EntityKey,
        output: EntityKey,
        kind: ExchangeKind,
        values: Vec<f64>,
    ) -> Self {
        self.rows.push(ScenarioRow {
            input,
            output,
            kind,
            values,
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioRow {
    pub input: EntityKey,
    pub output: EntityKey,
    #[serde(rename = "type")]
    pub kind: ExchangeKind,
    pub values: Vec<f64>,
}
