//! Live entity store with per-entity change channels.
//!
//! All mutators take `&self`: the registry is shared behind an `Rc` by
//! projections and engines. Storage borrows are always released before a
//! notification goes out, so subscribers may read the registry (or
//! resubscribe) from inside their callback.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use lf_core::{EntityKey, KeyedSignal, SubscriptionId};
use tracing::debug;

use crate::entity::{Activity, ActivityChange, Exchange, ExchangeChange, ExchangeKind};
use crate::error::{RegistryError, RegistryResult};

/// Semantic field names accepted by `EntityRegistry::attribute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityField {
    Name,
    ReferenceProduct,
    Unit,
    Location,
    Database,
    Code,
    Kind,
}

impl FromStr for ActivityField {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" | "activity" => Ok(ActivityField::Name),
            "reference product" | "reference_product" | "product" => {
                Ok(ActivityField::ReferenceProduct)
            }
            "unit" => Ok(ActivityField::Unit),
            "location" => Ok(ActivityField::Location),
            "database" => Ok(ActivityField::Database),
            "code" => Ok(ActivityField::Code),
            "type" | "kind" => Ok(ActivityField::Kind),
            _ => Err(RegistryError::UnknownField {
                field: s.to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct EntityRegistry {
    activities: RefCell<BTreeMap<EntityKey, Activity>>,
    exchanges: RefCell<BTreeMap<EntityKey, Exchange>>,
    changed: KeyedSignal<EntityKey, EntityKey>,
    deleted: KeyedSignal<EntityKey, EntityKey>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry without firing any notifications.
    pub fn from_entities(
        activities: impl IntoIterator<Item = Activity>,
        exchanges: impl IntoIterator<Item = Exchange>,
    ) -> RegistryResult<Self> {
        let registry = Self::new();
        {
            let mut acts = registry.activities.borrow_mut();
            for act in activities {
                if acts.contains_key(&act.key) {
                    return Err(RegistryError::DuplicateKey { key: act.key });
                }
                acts.insert(act.key.clone(), act);
            }
            let mut excs = registry.exchanges.borrow_mut();
            for exc in exchanges {
                if excs.contains_key(&exc.key) {
                    return Err(RegistryError::DuplicateKey { key: exc.key });
                }
                excs.insert(exc.key.clone(), exc);
            }
        }
        Ok(registry)
    }

    pub fn get_activity(&self, key: &EntityKey) -> RegistryResult<Activity> {
        self.activities
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::ActivityNotFound { key: key.clone() })
    }

    pub fn get_exchange(&self, key: &EntityKey) -> RegistryResult<Exchange> {
        self.exchanges
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::ExchangeNotFound { key: key.clone() })
    }

    pub fn contains_activity(&self, key: &EntityKey) -> bool {
        self.activities.borrow().contains_key(key)
    }

    /// Look up one activity attribute by its semantic field name.
    pub fn attribute(&self, key: &EntityKey, field: &str) -> RegistryResult<String> {
        let field: ActivityField = field.parse()?;
        let acts = self.activities.borrow();
        let act = acts
            .get(key)
            .ok_or_else(|| RegistryError::ActivityNotFound { key: key.clone() })?;
        Ok(match field {
            ActivityField::Name => act.name.clone(),
            ActivityField::ReferenceProduct => act.reference_product.clone(),
            ActivityField::Unit => act.unit.clone(),
            ActivityField::Location => act.location.clone(),
            ActivityField::Database => act.key.database().to_string(),
            ActivityField::Code => act.key.code().to_string(),
            ActivityField::Kind => act.kind.as_str().to_string(),
        })
    }

    /// Exchanges whose output is `key`, in key order.
    pub fn exchanges_of(&self, key: &EntityKey) -> Vec<Exchange> {
        self.exchanges
            .borrow()
            .values()
            .filter(|e| &e.output == key)
            .cloned()
            .collect()
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.activities.borrow().values().cloned().collect()
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.exchanges.borrow().values().cloned().collect()
    }

    pub fn databases(&self) -> BTreeSet<String> {
        self.activities
            .borrow()
            .keys()
            .map(|k| k.database().to_string())
            .collect()
    }

    pub fn activity_count(&self) -> usize {
        self.activities.borrow().len()
    }

    /// Persist an activity (insert or replace) and notify its subscribers.
    pub fn save_activity(&self, activity: Activity) {
        let key = activity.key.clone();
        self.activities.borrow_mut().insert(key.clone(), activity);
        debug!(key = %key, "activity saved");
        self.changed.emit(&key, &key);
    }

    /// Persist an exchange and notify both the exchange's and its output
    /// activity's subscribers.
    pub fn save_exchange(&self, exchange: Exchange) -> RegistryResult<()> {
        if !exchange.amount.is_finite() {
            return Err(RegistryError::InvalidValue {
                what: "exchange amount",
                reason: format!("{} is not finite", exchange.amount),
            });
        }
        let key = exchange.key.clone();
        let output = exchange.output.clone();
        self.exchanges.borrow_mut().insert(key.clone(), exchange);
        debug!(key = %key, output = %output, "exchange saved");
        self.changed.emit(&key, &key);
        self.changed.emit(&output, &output);
        Ok(())
    }

    pub fn modify_activity(
        &self,
        key: &EntityKey,
        changes: impl IntoIterator<Item = ActivityChange>,
    ) -> RegistryResult<()> {
        let mut act = self.get_activity(key)?;
        for change in changes {
            change.apply(&mut act);
        }
        self.save_activity(act);
        Ok(())
    }

    /// Apply field edits to an exchange and save it.
    pub fn modify_exchange(
        &self,
        key: &EntityKey,
        changes: impl IntoIterator<Item = ExchangeChange>,
    ) -> RegistryResult<()> {
        let mut exc = self.get_exchange(key)?;
        for change in changes {
            change.apply(&mut exc);
        }
        self.save_exchange(exc)
    }

    /// Remove an activity together with the exchanges it owns.
    pub fn delete_activity(&self, key: &EntityKey) -> RegistryResult<()> {
        if self.activities.borrow_mut().remove(key).is_none() {
            return Err(RegistryError::ActivityNotFound { key: key.clone() });
        }
        let owned: Vec<EntityKey> = {
            let mut excs = self.exchanges.borrow_mut();
            let owned: Vec<EntityKey> = excs
                .values()
                .filter(|e| &e.output == key)
                .map(|e| e.key.clone())
                .collect();
            for k in &owned {
                excs.remove(k);
            }
            owned
        };
        debug!(key = %key, exchanges = owned.len(), "activity deleted");

        self.changed.emit(key, key);
        self.deleted.emit(key, key);
        for k in &owned {
            self.changed.emit(k, k);
            self.deleted.emit(k, k);
        }
        Ok(())
    }

    /// Remove a whole database. Exchanges touching it from either side are
    /// removed as well. Affected subscribers are told "changed" first, then
    /// "deleted", activities before exchanges.
    pub fn delete_database(&self, name: &str) -> usize {
        let acts: Vec<EntityKey> = {
            let mut store = self.activities.borrow_mut();
            let keys: Vec<EntityKey> = store
                .keys()
                .filter(|k| k.database() == name)
                .cloned()
                .collect();
            for k in &keys {
                store.remove(k);
            }
            keys
        };
        let excs: Vec<EntityKey> = {
            let mut store = self.exchanges.borrow_mut();
            let keys: Vec<EntityKey> = store
                .values()
                .filter(|e| e.input.database() == name || e.output.database() == name)
                .map(|e| e.key.clone())
                .collect();
            for k in &keys {
                store.remove(k);
            }
            keys
        };
        debug!(
            database = name,
            activities = acts.len(),
            exchanges = excs.len(),
            "database deleted"
        );

        for k in &acts {
            self.changed.emit(k, k);
        }
        for k in &acts {
            self.deleted.emit(k, k);
        }
        for k in &excs {
            self.changed.emit(k, k);
        }
        for k in &excs {
            self.deleted.emit(k, k);
        }
        acts.len()
    }

    pub fn on_changed(
        &self,
        key: &EntityKey,
        f: impl Fn(&EntityKey) + 'static,
    ) -> SubscriptionId {
        self.changed.connect(key, f)
    }

    pub fn on_deleted(
        &self,
        key: &EntityKey,
        f: impl Fn(&EntityKey) + 'static,
    ) -> SubscriptionId {
        self.deleted.connect(key, f)
    }

    pub fn disconnect_changed(&self, key: &EntityKey, id: SubscriptionId) -> bool {
        self.changed.disconnect(key, id)
    }

    pub fn disconnect_deleted(&self, key: &EntityKey, id: SubscriptionId) -> bool {
        self.deleted.disconnect(key, id)
    }

    /// Number of live change subscriptions for `key`.
    pub fn change_subscribers(&self, key: &EntityKey) -> usize {
        self.changed.subscriber_count(key)
    }

    pub fn total_change_subscribers(&self) -> usize {
        self.changed.total_subscribers()
    }

    /// The production exchange amount of an activity, 1.0 if it declares none.
    pub fn production_amount(&self, key: &EntityKey) -> f64 {
        self.exchanges
            .borrow()
            .values()
            .filter(|e| &e.output == key && e.kind == ExchangeKind::Production)
            .map(|e| e.amount)
            .reduce(|a, b| a + b)
            .unwrap_or(1.0)
    }
}
