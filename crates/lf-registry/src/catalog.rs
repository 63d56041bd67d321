//! Impact assessment method catalog.

use std::cell::RefCell;
use std::collections::BTreeMap;

use lf_core::{EntityKey, MethodRef, Signal, SubscriptionId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RegistryError, RegistryResult};

/// One characterization factor: impact per unit of an elementary flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterizationFactor {
    pub flow: EntityKey,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MethodMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_cfs: Option<usize>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub factors: Vec<CharacterizationFactor>,
}

impl MethodMeta {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: Some(unit.into()),
            ..Self::default()
        }
    }

    pub fn with_factor(mut self, flow: EntityKey, amount: f64) -> Self {
        self.factors.push(CharacterizationFactor { flow, amount });
        self
    }

    pub fn unit_or_unknown(&self) -> &str {
        self.unit.as_deref().unwrap_or("Unknown")
    }

    /// Declared factor count, else the number of factors carried.
    pub fn cf_count(&self) -> usize {
        self.num_cfs.unwrap_or(self.factors.len())
    }
}

/// Catalog of methods available in the current environment.
///
/// Removal announces itself on the catalog-wide "method deleted" channel;
/// listeners are expected to re-check every reference they hold.
#[derive(Default)]
pub struct MethodCatalog {
    methods: RefCell<BTreeMap<MethodRef, MethodMeta>>,
    deleted: Signal<MethodRef>,
}

impl MethodCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_methods(methods: impl IntoIterator<Item = (MethodRef, MethodMeta)>) -> Self {
        let catalog = Self::new();
        catalog.methods.borrow_mut().extend(methods);
        catalog
    }

    pub fn get(&self, method: &MethodRef) -> RegistryResult<MethodMeta> {
        self.methods
            .borrow()
            .get(method)
            .cloned()
            .ok_or_else(|| RegistryError::MethodNotFound {
                method: method.clone(),
            })
    }

    pub fn contains(&self, method: &MethodRef) -> bool {
        self.methods.borrow().contains_key(method)
    }

    pub fn insert(&self, method: MethodRef, meta: MethodMeta) {
        self.methods.borrow_mut().insert(method, meta);
    }

    /// Remove a method and announce the deletion.
    pub fn remove(&self, method: &MethodRef) -> RegistryResult<MethodMeta> {
        let removed = self.methods.borrow_mut().remove(method);
        let meta = removed.ok_or_else(|| RegistryError::MethodNotFound {
            method: method.clone(),
        })?;
        info!(method = %method, "method deleted");
        self.deleted.emit(method);
        Ok(meta)
    }

    pub fn methods(&self) -> Vec<MethodRef> {
        self.methods.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.methods.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.borrow().is_empty()
    }

    pub fn on_method_deleted(&self, f: impl Fn(&MethodRef) + 'static) -> SubscriptionId {
        self.deleted.connect(f)
    }

    pub fn disconnect(&self, id: SubscriptionId) -> bool {
        self.deleted.disconnect(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn gwp() -> MethodRef {
        MethodRef::new(["IPCC", "GWP100"])
    }

    #[test]
    fn meta_defaults() {
        let meta = MethodMeta::default();
        assert_eq!(meta.unit_or_unknown(), "Unknown");
        assert_eq!(meta.cf_count(), 0);

        let meta = MethodMeta::new("kg CO2-Eq").with_factor(EntityKey::new("bio", "co2"), 1.0);
        assert_eq!(meta.cf_count(), 1);
    }

    #[test]
    fn remove_announces_deletion() {
        let catalog = MethodCatalog::from_methods([(gwp(), MethodMeta::new("kg"))]);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        catalog.on_method_deleted(move |_| h.set(h.get() + 1));

        catalog.remove(&gwp()).unwrap();
        assert_eq!(hits.get(), 1);
        assert!(!catalog.contains(&gwp()));

        assert!(catalog.remove(&gwp()).is_err());
        assert_eq!(hits.get(), 1);
    }
}
