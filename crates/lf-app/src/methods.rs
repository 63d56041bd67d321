//! Method projection: the current setup's impact methods, checked against
//! the live catalog.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use lf_core::MethodRef;
use lf_registry::MethodCatalog;
use lf_setup::{CalculationSetup, SetupStore};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::projection::{self, ProjectionEvents, SetupPart};

#[derive(Debug, Clone, PartialEq)]
pub struct MethodRow {
    pub name: String,
    pub unit: String,
    pub cf_count: usize,
    pub method: MethodRef,
}

pub struct MethodProjection {
    catalog: Rc<MethodCatalog>,
    store: Rc<SetupStore>,
    current: RefCell<Option<String>>,
    rows: RefCell<Vec<MethodRow>>,
    events: ProjectionEvents,
}

/// Drop every reference the catalog no longer knows. Returns how many went.
fn prune(catalog: &MethodCatalog, setup: &mut CalculationSetup) -> usize {
    let before = setup.ia.len();
    let kept: Vec<MethodRef> = setup
        .ia
        .iter()
        .filter(|m| catalog.contains(m))
        .cloned()
        .collect();
    let removed = before - kept.len();
    if removed > 0 {
        info!(setup = %setup.name, removed, "stale methods removed");
        setup.ia = kept;
    }
    removed
}

impl MethodProjection {
    pub fn new(catalog: Rc<MethodCatalog>, store: Rc<SetupStore>) -> Self {
        Self {
            catalog,
            store,
            current: RefCell::new(None),
            rows: RefCell::new(Vec::new()),
            events: ProjectionEvents::default(),
        }
    }

    pub fn events(&self) -> &ProjectionEvents {
        &self.events
    }

    pub fn current_setup(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    /// Remove stale catalog references from the durable setup, then sync.
    ///
    /// With `name`, or with a setup already active, only that setup is
    /// cleaned and becomes current. With neither, every setup in the store
    /// is cleaned and the (empty) projection is refreshed. Returns the
    /// number of references removed.
    pub fn reconcile(&self, name: Option<&str>) -> AppResult<usize> {
        let target = name.map(str::to_string).or_else(|| self.current_setup());
        match target {
            Some(name) => {
                let removed = self
                    .store
                    .update(&name, |setup| prune(&self.catalog, setup))?;
                self.sync(Some(&name))?;
                Ok(removed)
            }
            None => {
                let mut removed = 0;
                self.store
                    .update_all(|setup| removed += prune(&self.catalog, setup));
                self.sync(None)?;
                Ok(removed)
            }
        }
    }

    /// Rebuild the rows from the store's `ia`. With `name`, switch to it
    /// first. "updated" is emitted whether or not anything changed.
    pub fn sync(&self, name: Option<&str>) -> AppResult<()> {
        if let Some(name) = name {
            if !self.store.contains(name) {
                return Err(AppError::SetupNotFound {
                    name: name.to_string(),
                });
            }
            *self.current.borrow_mut() = Some(name.to_string());
        }

        let rows = match self.current_setup() {
            Some(current) => {
                let setup = self.store.require(&current)?;
                self.build_rows(&current, &setup.ia)
            }
            None => Vec::new(),
        };
        *self.rows.borrow_mut() = rows;
        self.events.updated.emit(&());
        Ok(())
    }

    pub fn relocate(&self, source: usize, target: usize) -> AppResult<()> {
        let name = self.current_setup().ok_or(AppError::NotLoaded)?;
        let mut rows = self.rows.borrow().clone();
        projection::relocate(&mut rows, source, target)?;
        *self.rows.borrow_mut() = rows;
        self.events.edited(&name, SetupPart::Methods);
        Ok(())
    }

    pub fn delete(&self, indices: &[usize]) -> AppResult<()> {
        let name = self.current_setup().ok_or(AppError::NotLoaded)?;
        let mut rows = self.rows.borrow().clone();
        projection::remove_rows(&mut rows, indices)?;
        *self.rows.borrow_mut() = rows;
        self.events.edited(&name, SetupPart::Methods);
        Ok(())
    }

    /// Append the methods not already listed. Returns the number added.
    pub fn include(&self, methods: &[MethodRef]) -> AppResult<usize> {
        let name = self.current_setup().ok_or(AppError::NotLoaded)?;
        let mut present: HashSet<MethodRef> =
            self.rows.borrow().iter().map(|r| r.method.clone()).collect();
        let fresh: Vec<MethodRef> = methods
            .iter()
            .filter(|m| present.insert((*m).clone()))
            .cloned()
            .collect();
        let new_rows = self.build_rows(&name, &fresh);
        if new_rows.is_empty() {
            return Ok(0);
        }
        let added = new_rows.len();
        let mut rows = self.rows.borrow().clone();
        rows.extend(new_rows);
        *self.rows.borrow_mut() = rows;
        self.events.edited(&name, SetupPart::Methods);
        Ok(added)
    }

    /// Method references in row order; empty if nothing is loaded.
    pub fn methods(&self) -> Vec<MethodRef> {
        self.rows.borrow().iter().map(|r| r.method.clone()).collect()
    }

    pub fn rows(&self) -> Vec<MethodRow> {
        self.rows.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }

    fn build_rows(&self, setup: &str, methods: &[MethodRef]) -> Vec<MethodRow> {
        let mut rows = Vec::with_capacity(methods.len());
        for method in methods {
            match self.catalog.get(method) {
                Ok(meta) => rows.push(MethodRow {
                    name: method.to_string(),
                    unit: meta.unit_or_unknown().to_string(),
                    cf_count: meta.cf_count(),
                    method: method.clone(),
                }),
                Err(err) => warn!(setup, method = %method, error = %err, "method skipped"),
            }
        }
        debug!(setup, rows = rows.len(), "method rows built");
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lf_core::EntityKey;
    use lf_registry::MethodMeta;
    use std::cell::Cell;

    fn m(name: &str) -> MethodRef {
        MethodRef::new(["IPCC 2021", name])
    }

    fn fixture() -> (Rc<MethodCatalog>, Rc<SetupStore>) {
        let catalog = MethodCatalog::from_methods([
            (
                m("GWP100"),
                MethodMeta::new("kg CO2-eq").with_factor(EntityKey::new("bio", "co2"), 1.0),
            ),
            (m("GTP100"), MethodMeta::default()),
        ]);
        let store = SetupStore::from_setups([
            CalculationSetup::new("a")
                .with_method(m("GWP100"))
                .with_method(m("GTP100")),
            CalculationSetup::new("b").with_method(m("GTP100")),
        ])
        .unwrap();
        (Rc::new(catalog), Rc::new(store))
    }

    #[test]
    fn rows_fall_back_to_unknown_unit() {
        let (catalog, store) = fixture();
        let p = MethodProjection::new(catalog, store);
        p.sync(Some("a")).unwrap();
        let rows = p.rows();
        assert_eq!(rows[0].name, "IPCC 2021, GWP100");
        assert_eq!(rows[0].unit, "kg CO2-eq");
        assert_eq!(rows[0].cf_count, 1);
        assert_eq!(rows[1].unit, "Unknown");
        assert_eq!(rows[1].cf_count, 0);
    }

    #[test]
    fn sync_unknown_setup_fails() {
        let (catalog, store) = fixture();
        let p = MethodProjection::new(catalog, store);
        assert!(matches!(p.sync(Some("zzz")), Err(AppError::SetupNotFound { .. })));
        assert!(p.methods().is_empty());
    }

    #[test]
    fn sync_without_setup_still_notifies() {
        let (catalog, store) = fixture();
        let p = MethodProjection::new(catalog, store);
        let updates = Rc::new(Cell::new(0));
        let u = Rc::clone(&updates);
        p.events().updated.connect(move |_| u.set(u.get() + 1));
        p.sync(None).unwrap();
        assert_eq!(updates.get(), 1);
    }

    #[test]
    fn reconcile_current_keeps_setup_and_cleans_store() {
        let (catalog, store) = fixture();
        let p = MethodProjection::new(Rc::clone(&catalog), Rc::clone(&store));
        p.sync(Some("a")).unwrap();
        catalog.remove(&m("GTP100")).unwrap();

        assert_eq!(p.reconcile(None).unwrap(), 1);
        assert_eq!(p.current_setup().as_deref(), Some("a"));
        assert_eq!(p.methods(), vec![m("GWP100")]);
        assert_eq!(store.get("a").unwrap().ia, vec![m("GWP100")]);
        // only the current setup is touched
        assert_eq!(store.get("b").unwrap().ia, vec![m("GTP100")]);
    }

    #[test]
    fn global_reconcile_sweeps_every_setup() {
        let (catalog, store) = fixture();
        let p = MethodProjection::new(Rc::clone(&catalog), Rc::clone(&store));
        catalog.remove(&m("GTP100")).unwrap();

        assert_eq!(p.reconcile(None).unwrap(), 2);
        assert!(p.current_setup().is_none());
        assert_eq!(store.get("a").unwrap().ia, vec![m("GWP100")]);
        assert!(store.get("b").unwrap().ia.is_empty());
    }

    #[test]
    fn stale_reference_is_skipped_on_sync() {
        let (catalog, store) = fixture();
        let p = MethodProjection::new(Rc::clone(&catalog), store);
        catalog.remove(&m("GWP100")).unwrap();
        p.sync(Some("a")).unwrap();
        assert_eq!(p.methods(), vec![m("GTP100")]);
    }

    #[test]
    fn include_is_a_set_difference() {
        let (catalog, store) = fixture();
        let p = MethodProjection::new(catalog, store);
        p.sync(Some("b")).unwrap();

        let changes = Rc::new(Cell::new(0));
        let c = Rc::clone(&changes);
        p.events().setup_changed.connect(move |_| c.set(c.get() + 1));

        assert_eq!(p.include(&[m("GTP100")]).unwrap(), 0);
        assert_eq!(changes.get(), 0);
        assert_eq!(p.include(&[m("GWP100"), m("GWP100")]).unwrap(), 1);
        assert_eq!(changes.get(), 1);
        assert_eq!(p.methods(), vec![m("GTP100"), m("GWP100")]);
    }

    #[test]
    fn edits_require_a_loaded_setup() {
        let (catalog, store) = fixture();
        let p = MethodProjection::new(catalog, store);
        assert!(matches!(p.delete(&[0]), Err(AppError::NotLoaded)));
        assert!(matches!(p.include(&[m("GWP100")]), Err(AppError::NotLoaded)));
    }
}
