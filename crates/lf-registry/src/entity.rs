//! Activity and exchange records.

use lf_core::EntityKey;
use serde::{Deserialize, Serialize};

/// Activity classification. Only `Process` activities can be demanded by a
/// functional unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    #[default]
    Process,
    Product,
    Emission,
    NaturalResource,
    #[serde(other)]
    Other,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Process => "process",
            ActivityKind::Product => "product",
            ActivityKind::Emission => "emission",
            ActivityKind::NaturalResource => "natural_resource",
            ActivityKind::Other => "other",
        }
    }

    /// Elementary flows live in the biosphere matrix.
    pub fn is_elementary(self) -> bool {
        matches!(self, ActivityKind::Emission | ActivityKind::NaturalResource)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub key: EntityKey,
    pub name: String,
    #[serde(default)]
    pub reference_product: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, rename = "type")]
    pub kind: ActivityKind,
}

impl Activity {
    pub fn process(key: EntityKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            reference_product: String::new(),
            unit: String::new(),
            location: String::new(),
            kind: ActivityKind::Process,
        }
    }

    pub fn with_product(mut self, product: impl Into<String>, unit: impl Into<String>) -> Self {
        self.reference_product = product.into();
        self.unit = unit.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_kind(mut self, kind: ActivityKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeKind {
    /// Output of the reference product.
    Production,
    /// Input from another process.
    Technosphere,
    /// Elementary flow to or from the environment.
    Biosphere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    #[default]
    None,
    Normal,
    Lognormal,
    Uniform,
}

/// Uncertainty attached to an exchange amount.
///
/// For `Normal`, `loc` is the mean and `scale` the standard deviation. For
/// `Lognormal`, `loc`/`scale` are the parameters of the underlying normal.
/// `Uniform` draws from `[minimum, maximum]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Uncertainty {
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default)]
    pub loc: f64,
    #[serde(default)]
    pub scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub key: EntityKey,
    pub input: EntityKey,
    pub output: EntityKey,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: ExchangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<Uncertainty>,
}

impl Exchange {
    pub fn new(
        key: EntityKey,
        input: EntityKey,
        output: EntityKey,
        amount: f64,
        kind: ExchangeKind,
    ) -> Self {
        Self {
            key,
            input,
            output,
            amount,
            kind,
            uncertainty: None,
        }
    }

    pub fn with_uncertainty(mut self, uncertainty: Uncertainty) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }
}

/// Field edit applied by `EntityRegistry::modify_activity`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityChange {
    Name(String),
    ReferenceProduct(String),
    Unit(String),
    Location(String),
    Kind(ActivityKind),
}

impl ActivityChange {
    pub(crate) fn apply(self, activity: &mut Activity) {
        match self {
            ActivityChange::Name(v) => activity.name = v,
            ActivityChange::ReferenceProduct(v) => activity.reference_product = v,
            ActivityChange::Unit(v) => activity.unit = v,
            ActivityChange::Location(v) => activity.location = v,
            ActivityChange::Kind(k) => activity.kind = k,
        }
    }
}

/// Field edit applied by `EntityRegistry::modify_exchange`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeChange {
    Amount(f64),
    Input(EntityKey),
    Kind(ExchangeKind),
    Uncertainty(Option<Uncertainty>),
}

impl ExchangeChange {
    pub(crate) fn apply(self, exchange: &mut Exchange) {
        match self {
            ExchangeChange::Amount(v) => exchange.amount = v,
            ExchangeChange::Input(k) => exchange.input = k,
            ExchangeChange::Kind(k) => exchange.kind = k,
            ExchangeChange::Uncertainty(u) => exchange.uncertainty = u,
        }
    }
}
