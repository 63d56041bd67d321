//! lf-registry: live activity/exchange store and method catalog.
//!
//! Provides:
//! - Activities and exchanges keyed by `EntityKey`
//! - Mutation with persistence and per-entity change/deletion channels
//! - The impact method catalog with a catalog-wide "method deleted" channel

pub mod catalog;
pub mod entity;
pub mod error;
pub mod registry;

pub use catalog::{CharacterizationFactor, MethodCatalog, MethodMeta};
pub use entity::{
    Activity, ActivityChange, ActivityKind, Distribution, Exchange, ExchangeChange, ExchangeKind,
    Uncertainty,
};
pub use error::{RegistryError, RegistryResult};
pub use registry::{ActivityField, EntityRegistry};
