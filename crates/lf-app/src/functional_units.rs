//! Functional-unit projection.
//!
//! An ordered, editable view over one setup's `inv`, resolved against the
//! live entity registry. Each rendered entity is subscribed to; a change
//! notification re-runs `sync`. Keys that do not resolve to a process are
//! dropped from the rows (and logged) but stay in the durable setup.
//!
//! Edits never touch the store directly. They announce "setup changed" and
//! the write-back path (see `Session`) persists `activities()` plus the
//! unresolved entries.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use lf_core::{EntityKey, SubscriptionId, ensure_amount};
use lf_registry::{ActivityKind, EntityRegistry};
use lf_setup::{FunctionalUnit, SetupStore};
use tracing::{debug, error, warn};

use crate::error::{AppError, AppResult};
use crate::projection::{self, ProjectionEvents, SetupPart, check_row};

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionalUnitRow {
    pub amount: f64,
    pub unit: String,
    pub product: String,
    pub activity: String,
    pub location: String,
    pub database: String,
    pub key: EntityKey,
}

pub struct FunctionalUnitProjection {
    registry: Rc<EntityRegistry>,
    store: Rc<SetupStore>,
    current: RefCell<Option<String>>,
    rows: RefCell<Vec<FunctionalUnitRow>>,
    unresolved: RefCell<Vec<FunctionalUnit>>,
    /// Entity change subscriptions, held only so they can be released.
    subscriptions: RefCell<Vec<(EntityKey, SubscriptionId)>>,
    events: ProjectionEvents,
    this: Weak<FunctionalUnitProjection>,
}

impl FunctionalUnitProjection {
    pub fn new(registry: Rc<EntityRegistry>, store: Rc<SetupStore>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            registry,
            store,
            current: RefCell::new(None),
            rows: RefCell::new(Vec::new()),
            unresolved: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(Vec::new()),
            events: ProjectionEvents::default(),
            this: this.clone(),
        })
    }

    pub fn events(&self) -> &ProjectionEvents {
        &self.events
    }

    pub fn current_setup(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    /// Switch to `name` and rebuild from scratch.
    pub fn load(&self, name: &str) -> AppResult<()> {
        if !self.store.contains(name) {
            return Err(AppError::SetupNotFound {
                name: name.to_string(),
            });
        }
        self.release_subscriptions();
        self.rows.borrow_mut().clear();
        self.unresolved.borrow_mut().clear();
        *self.current.borrow_mut() = Some(name.to_string());
        self.sync()
    }

    /// Rebuild the rows from the durable setup, in setup order.
    pub fn sync(&self) -> AppResult<()> {
        let name = self.current_setup().ok_or(AppError::NotLoaded)?;
        let setup = self.store.require(&name)?;

        self.release_subscriptions();
        let mut rows = Vec::with_capacity(setup.inv.len());
        let mut unresolved = Vec::new();
        let mut subscriptions: Vec<(EntityKey, SubscriptionId)> = Vec::new();
        for fu in setup.inv {
            match self.resolve(&fu) {
                Ok(row) => {
                    if !subscriptions.iter().any(|(k, _)| k == &fu.key) {
                        subscriptions.push(self.subscribe(&fu.key));
                    }
                    rows.push(row);
                }
                Err(err) => {
                    error!(key = %fu.key, setup = %name, error = %err, "functional unit dropped");
                    unresolved.push(fu);
                }
            }
        }
        debug!(setup = %name, rows = rows.len(), dropped = unresolved.len(), "functional units synced");

        *self.subscriptions.borrow_mut() = subscriptions;
        *self.rows.borrow_mut() = rows;
        *self.unresolved.borrow_mut() = unresolved;
        self.events.updated.emit(&());
        Ok(())
    }

    /// Move one row; see `projection::relocate` for the boundary rule.
    pub fn relocate(&self, source: usize, target: usize) -> AppResult<()> {
        let name = self.current_setup().ok_or(AppError::NotLoaded)?;
        let mut rows = self.rows.borrow().clone();
        projection::relocate(&mut rows, source, target)?;
        *self.rows.borrow_mut() = rows;
        self.events.edited(&name, SetupPart::Inventory);
        Ok(())
    }

    pub fn delete(&self, indices: &[usize]) -> AppResult<()> {
        let name = self.current_setup().ok_or(AppError::NotLoaded)?;
        let mut rows = self.rows.borrow().clone();
        let removed = projection::remove_rows(&mut rows, indices)?;

        let remaining: HashSet<&EntityKey> = rows.iter().map(|r| &r.key).collect();
        let gone: HashSet<&EntityKey> = removed
            .iter()
            .map(|r| &r.key)
            .filter(|k| !remaining.contains(k))
            .collect();
        let released: Vec<(EntityKey, SubscriptionId)> = {
            let mut subs = self.subscriptions.borrow_mut();
            let (released, kept): (Vec<_>, Vec<_>) =
                subs.drain(..).partition(|(k, _)| gone.contains(k));
            *subs = kept;
            released
        };
        for (key, id) in released {
            self.registry.disconnect_changed(&key, id);
        }

        *self.rows.borrow_mut() = rows;
        self.events.edited(&name, SetupPart::Inventory);
        Ok(())
    }

    /// Append the units whose key is not already shown and that resolve.
    /// Returns the number of rows added; nothing is announced if zero.
    pub fn include(&self, units: &[FunctionalUnit]) -> AppResult<usize> {
        let name = self.current_setup().ok_or(AppError::NotLoaded)?;
        let mut rows = self.rows.borrow().clone();
        let mut present: HashSet<EntityKey> = rows.iter().map(|r| r.key.clone()).collect();
        for fu in units {
            ensure_amount(fu.amount, "functional unit amount")?;
        }

        let mut added = 0;
        for fu in units {
            if present.contains(&fu.key) {
                continue;
            }
            match self.resolve(fu) {
                Ok(row) => {
                    present.insert(fu.key.clone());
                    let subscribed = self
                        .subscriptions
                        .borrow()
                        .iter()
                        .any(|(k, _)| k == &fu.key);
                    if !subscribed {
                        let sub = self.subscribe(&fu.key);
                        self.subscriptions.borrow_mut().push(sub);
                    }
                    rows.push(row);
                    added += 1;
                }
                Err(err) => {
                    error!(key = %fu.key, setup = %name, error = %err, "functional unit not included");
                }
            }
        }

        if added > 0 {
            *self.rows.borrow_mut() = rows;
            self.events.edited(&name, SetupPart::Inventory);
        }
        Ok(added)
    }

    pub fn set_amount(&self, row: usize, amount: f64) -> AppResult<()> {
        let name = self.current_setup().ok_or(AppError::NotLoaded)?;
        let amount = ensure_amount(amount, "functional unit amount")?;
        {
            let mut rows = self.rows.borrow_mut();
            check_row(row, rows.len())?;
            rows[row].amount = amount;
        }
        self.events.edited(&name, SetupPart::Inventory);
        Ok(())
    }

    /// Functional units in row order.
    pub fn activities(&self) -> Vec<FunctionalUnit> {
        self.rows
            .borrow()
            .iter()
            .map(|r| FunctionalUnit::new(r.key.clone(), r.amount))
            .collect()
    }

    pub fn get_key(&self, row: usize) -> AppResult<EntityKey> {
        let rows = self.rows.borrow();
        check_row(row, rows.len())?;
        Ok(rows[row].key.clone())
    }

    pub fn rows(&self) -> Vec<FunctionalUnitRow> {
        self.rows.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }

    /// Durable entries the last sync could not resolve, in store order.
    pub fn unresolved(&self) -> Vec<FunctionalUnit> {
        self.unresolved.borrow().clone()
    }

    /// Keys that currently hold a change subscription.
    pub fn subscribed_keys(&self) -> Vec<EntityKey> {
        self.subscriptions
            .borrow()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn resolve(&self, fu: &FunctionalUnit) -> AppResult<FunctionalUnitRow> {
        let act = self
            .registry
            .get_activity(&fu.key)
            .map_err(|e| AppError::ResolutionFailure {
                key: fu.key.clone(),
                reason: e.to_string(),
            })?;
        if act.kind != ActivityKind::Process {
            return Err(AppError::ResolutionFailure {
                key: fu.key.clone(),
                reason: format!("type is '{}', not 'process'", act.kind.as_str()),
            });
        }
        Ok(FunctionalUnitRow {
            amount: fu.amount,
            unit: act.unit,
            product: act.reference_product,
            activity: act.name,
            location: act.location,
            database: fu.key.database().to_string(),
            key: fu.key.clone(),
        })
    }

    fn subscribe(&self, key: &EntityKey) -> (EntityKey, SubscriptionId) {
        let this = self.this.clone();
        let id = self.registry.on_changed(key, move |changed| {
            let Some(projection) = this.upgrade() else {
                return;
            };
            if let Err(err) = projection.sync() {
                warn!(key = %changed, error = %err, "resync after entity change failed");
            }
        });
        (key.clone(), id)
    }

    fn release_subscriptions(&self) {
        let subs = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for (key, id) in subs {
            self.registry.disconnect_changed(&key, id);
        }
    }
}

impl Drop for FunctionalUnitProjection {
    fn drop(&mut self) {
        self.release_subscriptions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lf_registry::{Activity, ActivityChange};
    use lf_setup::CalculationSetup;
    use std::cell::Cell;

    fn key(code: &str) -> EntityKey {
        EntityKey::new("db", code)
    }

    fn fixture() -> (Rc<EntityRegistry>, Rc<SetupStore>) {
        let registry = EntityRegistry::from_entities(
            [
                Activity::process(key("steel"), "steel production").with_product("steel", "kg"),
                Activity::process(key("coal"), "coal mining").with_product("coal", "kg"),
                Activity::process(key("co2"), "carbon dioxide").with_kind(ActivityKind::Emission),
            ],
            Vec::new(),
        )
        .unwrap();
        let store = SetupStore::from_setups([CalculationSetup::new("s")
            .with_unit(key("steel"), 2.0)
            .with_unit(key("missing"), 1.0)
            .with_unit(key("co2"), 1.0)
            .with_unit(key("coal"), 3.0)])
        .unwrap();
        (Rc::new(registry), Rc::new(store))
    }

    #[test]
    fn load_keeps_only_resolvable_processes_in_order() {
        let (reg, store) = fixture();
        let p = FunctionalUnitProjection::new(reg, store);
        p.load("s").unwrap();

        let keys: Vec<EntityKey> = p.activities().into_iter().map(|fu| fu.key).collect();
        assert_eq!(keys, vec![key("steel"), key("coal")]);
        let dropped: Vec<EntityKey> = p.unresolved().into_iter().map(|fu| fu.key).collect();
        assert_eq!(dropped, vec![key("missing"), key("co2")]);

        let row = &p.rows()[0];
        assert_eq!(row.product, "steel");
        assert_eq!(row.unit, "kg");
        assert_eq!(row.database, "db");
    }

    #[test]
    fn load_unknown_setup_fails() {
        let (reg, store) = fixture();
        let p = FunctionalUnitProjection::new(reg, store);
        assert!(matches!(p.load("nope"), Err(AppError::SetupNotFound { .. })));
        assert!(matches!(p.sync(), Err(AppError::NotLoaded)));
    }

    #[test]
    fn entity_change_resyncs_without_duplicate_subscriptions() {
        let (reg, store) = fixture();
        let p = FunctionalUnitProjection::new(Rc::clone(&reg), store);
        p.load("s").unwrap();
        p.load("s").unwrap();
        assert_eq!(reg.change_subscribers(&key("steel")), 1);

        let updates = Rc::new(Cell::new(0));
        let u = Rc::clone(&updates);
        p.events().updated.connect(move |_| u.set(u.get() + 1));

        reg.modify_activity(&key("steel"), [ActivityChange::Name("steel, hot rolled".into())])
            .unwrap();
        assert_eq!(updates.get(), 1);
        assert_eq!(p.rows()[0].activity, "steel, hot rolled");
        assert_eq!(reg.change_subscribers(&key("steel")), 1);
    }

    #[test]
    fn deleted_entity_drops_its_row() {
        let (reg, store) = fixture();
        let p = FunctionalUnitProjection::new(Rc::clone(&reg), store);
        p.load("s").unwrap();
        reg.delete_activity(&key("coal")).unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(reg.change_subscribers(&key("coal")), 0);
    }

    #[test]
    fn delete_releases_subscription() {
        let (reg, store) = fixture();
        let p = FunctionalUnitProjection::new(Rc::clone(&reg), store);
        p.load("s").unwrap();
        p.delete(&[1]).unwrap();
        assert_eq!(p.get_key(0).unwrap(), key("steel"));
        assert!(matches!(p.get_key(1), Err(AppError::RowOutOfRange { row: 1, len: 1 })));
        assert_eq!(reg.change_subscribers(&key("coal")), 0);
    }

    #[test]
    fn include_skips_present_and_unresolvable_keys() {
        let (reg, store) = fixture();
        let p = FunctionalUnitProjection::new(reg, store);
        p.load("s").unwrap();

        let changes = Rc::new(Cell::new(0));
        let c = Rc::clone(&changes);
        p.events().setup_changed.connect(move |_| c.set(c.get() + 1));

        let added = p
            .include(&[
                FunctionalUnit::new(key("steel"), 9.0),
                FunctionalUnit::new(key("missing"), 1.0),
            ])
            .unwrap();
        assert_eq!(added, 0);
        assert_eq!(changes.get(), 0);
        assert_eq!(p.rows()[0].amount, 2.0);
    }

    #[test]
    fn include_rejects_batch_with_non_finite_amount_untouched() {
        let (reg, store) = fixture();
        let p = FunctionalUnitProjection::new(Rc::clone(&reg), store);
        p.load("s").unwrap();
        p.delete(&[1]).unwrap();
        assert_eq!(reg.change_subscribers(&key("coal")), 0);

        let result = p.include(&[
            FunctionalUnit::new(key("coal"), 1.0),
            FunctionalUnit::new(key("steel"), f64::INFINITY),
        ]);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(p.len(), 1);
        assert_eq!(p.subscribed_keys(), vec![key("steel")]);
        assert_eq!(reg.change_subscribers(&key("coal")), 0);
    }

    #[test]
    fn set_amount_rejects_non_finite() {
        let (reg, store) = fixture();
        let p = FunctionalUnitProjection::new(reg, store);
        p.load("s").unwrap();
        assert!(p.set_amount(0, f64::NAN).is_err());
        p.set_amount(0, 5.0).unwrap();
        assert_eq!(p.activities()[0].amount, 5.0);
    }

    #[test]
    fn dropping_projection_releases_subscriptions() {
        let (reg, store) = fixture();
        let p = FunctionalUnitProjection::new(Rc::clone(&reg), store);
        p.load("s").unwrap();
        assert_eq!(reg.total_change_subscribers(), 2);
        drop(p);
        assert_eq!(reg.total_change_subscribers(), 0);
    }
}
