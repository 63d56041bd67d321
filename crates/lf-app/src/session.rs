//! Session: one owner for the store, both projections and their wiring.
//!
//! Wiring installed by `Session::new`:
//! - "setup changed" from either projection writes the projection back into
//!   the durable store
//! - the catalog's "method deleted" channel reconciles the method projection
//! - `select` loads both projections and announces "calculation setup
//!   selected"

use std::collections::HashSet;
use std::rc::Rc;

use lf_core::{EntityKey, Signal, SubscriptionId};
use lf_registry::{EntityRegistry, MethodCatalog};
use lf_setup::{FunctionalUnit, SetupStore};
use tracing::{error, info};

use crate::calculation::{
    CalculationMode, CalculationOutput, MatrixBackend, Orchestrator, OrchestratorOptions,
};
use crate::error::{AppError, AppResult};
use crate::functional_units::FunctionalUnitProjection;
use crate::methods::MethodProjection;
use crate::projection::SetupChanged;

pub struct Session {
    registry: Rc<EntityRegistry>,
    catalog: Rc<MethodCatalog>,
    store: Rc<SetupStore>,
    functional_units: Rc<FunctionalUnitProjection>,
    methods: Rc<MethodProjection>,
    selected: Signal<String>,
    method_deleted: SubscriptionId,
}

/// The durable `inv` after an inventory edit.
///
/// Walks the stored sequence: entries the projection could not resolve keep
/// their slot, the other slots take the projection's rows in row order.
/// Rows beyond the stored resolved slots (new inclusions) are appended.
fn merged_inventory(
    durable: &[FunctionalUnit],
    projection: &FunctionalUnitProjection,
) -> Vec<FunctionalUnit> {
    let rows = projection.activities();
    let shown: HashSet<&EntityKey> = rows.iter().map(|fu| &fu.key).collect();
    let unresolved: HashSet<EntityKey> = projection
        .unresolved()
        .into_iter()
        .map(|fu| fu.key)
        .filter(|k| !shown.contains(k))
        .collect();

    let mut next = rows.iter();
    let mut inv = Vec::with_capacity(durable.len().max(rows.len()));
    for fu in durable {
        if unresolved.contains(&fu.key) {
            inv.push(fu.clone());
        } else if let Some(row) = next.next() {
            inv.push(row.clone());
        }
    }
    inv.extend(next.cloned());
    inv
}

impl Session {
    pub fn new(
        registry: Rc<EntityRegistry>,
        catalog: Rc<MethodCatalog>,
        store: Rc<SetupStore>,
    ) -> Self {
        let functional_units =
            FunctionalUnitProjection::new(Rc::clone(&registry), Rc::clone(&store));
        let methods = Rc::new(MethodProjection::new(Rc::clone(&catalog), Rc::clone(&store)));

        let fu = Rc::downgrade(&functional_units);
        let fu_store = Rc::clone(&store);
        functional_units
            .events()
            .setup_changed
            .connect(move |change: &SetupChanged| {
                let Some(projection) = fu.upgrade() else {
                    return;
                };
                let written = fu_store.require(&change.setup).and_then(|setup| {
                    fu_store.set_inventory(&change.setup, merged_inventory(&setup.inv, &projection))
                });
                if let Err(err) = written {
                    error!(setup = %change.setup, error = %err, "inventory write-back failed");
                }
            });

        let ia = Rc::downgrade(&methods);
        let ia_store = Rc::clone(&store);
        methods
            .events()
            .setup_changed
            .connect(move |change: &SetupChanged| {
                let Some(projection) = ia.upgrade() else {
                    return;
                };
                if let Err(err) = ia_store.set_methods(&change.setup, projection.methods()) {
                    error!(setup = %change.setup, error = %err, "method write-back failed");
                }
            });

        let ia = Rc::downgrade(&methods);
        let method_deleted = catalog.on_method_deleted(move |method| {
            let Some(projection) = ia.upgrade() else {
                return;
            };
            match projection.reconcile(None) {
                Ok(removed) => info!(method = %method, removed, "reconciled after method deletion"),
                Err(err) => error!(method = %method, error = %err, "reconcile failed"),
            }
        });

        Self {
            registry,
            catalog,
            store,
            functional_units,
            methods,
            selected: Signal::new(),
            method_deleted,
        }
    }

    pub fn registry(&self) -> &Rc<EntityRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Rc<MethodCatalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Rc<SetupStore> {
        &self.store
    }

    pub fn functional_units(&self) -> &FunctionalUnitProjection {
        &self.functional_units
    }

    pub fn methods(&self) -> &MethodProjection {
        &self.methods
    }

    pub fn current_setup(&self) -> Option<String> {
        self.functional_units.current_setup()
    }

    /// "calculation setup selected" channel.
    pub fn on_setup_selected(&self, f: impl Fn(&String) + 'static) -> SubscriptionId {
        self.selected.connect(f)
    }

    /// Make `name` the current setup in both projections.
    pub fn select(&self, name: &str) -> AppResult<()> {
        self.functional_units.load(name)?;
        self.methods.reconcile(Some(name))?;
        self.selected.emit(&name.to_string());
        Ok(())
    }

    pub fn new_setup(&self, name: &str) -> AppResult<()> {
        self.store.new_setup(name)?;
        Ok(())
    }

    /// Rename a setup, following it with the projections if it is current.
    pub fn rename_setup(&self, old: &str, new: &str) -> AppResult<()> {
        self.store.rename(old, new)?;
        if self.current_setup().as_deref() == Some(old) {
            self.select(new)?;
        }
        Ok(())
    }

    pub fn remove_setup(&self, name: &str) -> AppResult<()> {
        if self.current_setup().as_deref() == Some(name) {
            return Err(AppError::InvalidInput(format!(
                "cannot remove the current calculation setup '{name}'"
            )));
        }
        self.store.remove(name)?;
        Ok(())
    }

    pub fn orchestrator(&self, options: OrchestratorOptions) -> Orchestrator<MatrixBackend> {
        Orchestrator::matrix(
            Rc::clone(&self.registry),
            Rc::clone(&self.catalog),
            Rc::clone(&self.store),
        )
        .with_options(options)
    }

    /// Calculate the current setup with the matrix engine.
    pub fn calculate(&self, mode: &CalculationMode) -> AppResult<CalculationOutput> {
        let name = self.current_setup().ok_or(AppError::NotLoaded)?;
        self.orchestrator(OrchestratorOptions::default())
            .run(&name, mode)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.catalog.disconnect(self.method_deleted);
    }
}
