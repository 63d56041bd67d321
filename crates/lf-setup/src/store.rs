//! Calculation-setup store.
//!
//! The store is the durable record of every setup in a session. It is shared
//! behind an `Rc` by projections, the write-back path and the orchestrator,
//! so all mutators take `&self`. Mutations replace a setup's sequences
//! wholesale; readers never observe a half-edited `inv` or `ia`.

use std::cell::RefCell;
use std::collections::BTreeMap;

use lf_core::MethodRef;

use crate::schema::{CalculationSetup, FunctionalUnit};
use crate::validate::validate_setup;
use crate::{SetupError, SetupResult};

#[derive(Debug, Default)]
pub struct SetupStore {
    setups: RefCell<BTreeMap<String, CalculationSetup>>,
}

impl SetupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_setups(setups: impl IntoIterator<Item = CalculationSetup>) -> SetupResult<Self> {
        let store = Self::new();
        for setup in setups {
            store.insert(setup)?;
        }
        Ok(store)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.setups.borrow().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<CalculationSetup> {
        self.setups.borrow().get(name).cloned()
    }

    pub fn require(&self, name: &str) -> SetupResult<CalculationSetup> {
        self.get(name).ok_or_else(|| SetupError::SetupNotFound {
            name: name.to_string(),
        })
    }

    /// Setup names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.setups.borrow().keys().cloned().collect()
    }

    pub fn setups(&self) -> Vec<CalculationSetup> {
        self.setups.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.setups.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.setups.borrow().is_empty()
    }

    pub fn insert(&self, setup: CalculationSetup) -> SetupResult<()> {
        validate_setup(&setup)?;
        let mut setups = self.setups.borrow_mut();
        if setups.contains_key(&setup.name) {
            return Err(SetupError::DuplicateSetup { name: setup.name });
        }
        setups.insert(setup.name.clone(), setup);
        Ok(())
    }

    /// Create an empty setup.
    pub fn new_setup(&self, name: &str) -> SetupResult<()> {
        self.insert(CalculationSetup::new(name))
    }

    pub fn remove(&self, name: &str) -> SetupResult<CalculationSetup> {
        self.setups
            .borrow_mut()
            .remove(name)
            .ok_or_else(|| SetupError::SetupNotFound {
                name: name.to_string(),
            })
    }

    pub fn rename(&self, old: &str, new: &str) -> SetupResult<()> {
        if old == new {
            return self.require(old).map(|_| ());
        }
        let mut setups = self.setups.borrow_mut();
        if setups.contains_key(new) {
            return Err(SetupError::DuplicateSetup {
                name: new.to_string(),
            });
        }
        let mut setup = setups.remove(old).ok_or_else(|| SetupError::SetupNotFound {
            name: old.to_string(),
        })?;
        setup.name = new.to_string();
        if let Err(e) = validate_setup(&setup) {
            setup.name = old.to_string();
            setups.insert(old.to_string(), setup);
            return Err(e.into());
        }
        setups.insert(new.to_string(), setup);
        Ok(())
    }

    pub fn duplicate(&self, source: &str, new: &str) -> SetupResult<()> {
        let mut copy = self.require(source)?;
        copy.name = new.to_string();
        self.insert(copy)
    }

    pub fn set_inventory(&self, name: &str, inv: Vec<FunctionalUnit>) -> SetupResult<()> {
        self.update(name, |setup| setup.inv = inv)
    }

    pub fn set_methods(&self, name: &str, ia: Vec<MethodRef>) -> SetupResult<()> {
        self.update(name, |setup| setup.ia = ia)
    }

    /// Run `f` against one setup under a single mutable borrow.
    ///
    /// `f` must not call back into the store.
    pub fn update<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut CalculationSetup) -> R,
    ) -> SetupResult<R> {
        let mut setups = self.setups.borrow_mut();
        let setup = setups
            .get_mut(name)
            .ok_or_else(|| SetupError::SetupNotFound {
                name: name.to_string(),
            })?;
        Ok(f(setup))
    }

    /// Run `f` against every setup, in name order.
    pub fn update_all(&self, mut f: impl FnMut(&mut CalculationSetup)) {
        for setup in self.setups.borrow_mut().values_mut() {
            f(setup);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lf_core::EntityKey;

    fn store() -> SetupStore {
        SetupStore::from_setups([
            CalculationSetup::new("b").with_unit(EntityKey::new("db", "x"), 2.0),
            CalculationSetup::new("a"),
        ])
        .unwrap()
    }

    #[test]
    fn names_are_sorted() {
        assert_eq!(store().names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn insert_rejects_duplicate() {
        let s = store();
        assert!(matches!(
            s.new_setup("a"),
            Err(SetupError::DuplicateSetup { .. })
        ));
    }

    #[test]
    fn rename_moves_contents() {
        let s = store();
        s.rename("b", "c").unwrap();
        assert!(!s.contains("b"));
        let c = s.get("c").unwrap();
        assert_eq!(c.name, "c");
        assert_eq!(c.inv.len(), 1);

        assert!(matches!(
            s.rename("c", "a"),
            Err(SetupError::DuplicateSetup { .. })
        ));
        assert!(s.rename("c", "").is_err());
        assert!(s.contains("c"));
    }

    #[test]
    fn duplicate_copies_setup() {
        let s = store();
        s.duplicate("b", "b copy").unwrap();
        assert_eq!(s.get("b copy").unwrap().inv, s.get("b").unwrap().inv);
    }

    #[test]
    fn update_missing_setup_fails() {
        let s = store();
        assert!(matches!(
            s.set_methods("zzz", vec![]),
            Err(SetupError::SetupNotFound { .. })
        ));
    }
}
