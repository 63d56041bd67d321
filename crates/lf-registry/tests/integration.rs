//! Integration tests for lf-registry.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lf_core::{EntityKey, MethodRef, SubscriptionId};
use lf_registry::{
    Activity, ActivityKind, EntityRegistry, Exchange, ExchangeKind, MethodCatalog, MethodMeta,
    RegistryError,
};

fn key(code: &str) -> EntityKey {
    EntityKey::new("db", code)
}

fn small_registry() -> EntityRegistry {
    EntityRegistry::from_entities(
        [
            Activity::process(key("steel"), "steel production").with_product("steel", "kg"),
            Activity::process(key("coal"), "coal mining").with_product("coal", "kg"),
            Activity::process(EntityKey::new("bio", "co2"), "carbon dioxide")
                .with_kind(ActivityKind::Emission),
        ],
        [
            Exchange::new(key("p1"), key("steel"), key("steel"), 1.0, ExchangeKind::Production),
            Exchange::new(key("t1"), key("coal"), key("steel"), 0.5, ExchangeKind::Technosphere),
            Exchange::new(
                key("b1"),
                EntityKey::new("bio", "co2"),
                key("steel"),
                2.0,
                ExchangeKind::Biosphere,
            ),
        ],
    )
    .unwrap()
}

#[test]
fn delete_activity_removes_owned_exchanges() {
    let reg = small_registry();
    assert_eq!(reg.exchanges_of(&key("steel")).len(), 3);

    let deleted = Rc::new(Cell::new(false));
    let d = Rc::clone(&deleted);
    reg.on_deleted(&key("steel"), move |_| d.set(true));

    reg.delete_activity(&key("steel")).unwrap();
    assert!(deleted.get());
    assert!(reg.exchanges().is_empty());
    assert!(matches!(
        reg.get_exchange(&key("t1")),
        Err(RegistryError::ExchangeNotFound { .. })
    ));
    assert!(reg.delete_activity(&key("steel")).unwrap_err().is_not_found());
}

#[test]
fn subscriber_can_resubscribe_from_callback() {
    let reg = Rc::new(small_registry());
    let current = Rc::new(Cell::new(None));
    let calls = Rc::new(Cell::new(0));

    // A subscriber that tears down its own subscription and re-creates it,
    // which is what a projection does on every sync.
    fn subscribe(
        reg: &Rc<EntityRegistry>,
        current: &Rc<Cell<Option<SubscriptionId>>>,
        calls: &Rc<Cell<u32>>,
    ) {
        let r = Rc::clone(reg);
        let c = Rc::clone(current);
        let n = Rc::clone(calls);
        let id = reg.on_changed(&key("steel"), move |k| {
            n.set(n.get() + 1);
            if let Some(old) = c.get() {
                r.disconnect_changed(k, old);
            }
            subscribe(&r, &c, &n);
        });
        current.set(Some(id));
    }

    subscribe(&reg, &current, &calls);
    reg.save_activity(reg.get_activity(&key("steel")).unwrap());
    reg.save_activity(reg.get_activity(&key("steel")).unwrap());

    assert_eq!(calls.get(), 2);
    assert_eq!(reg.change_subscribers(&key("steel")), 1);
}

#[test]
fn catalog_listeners_see_shrunk_catalog() {
    let catalog = Rc::new(MethodCatalog::from_methods([
        (MethodRef::new(["a"]), MethodMeta::new("kg")),
        (MethodRef::new(["b"]), MethodMeta::new("kg")),
    ]));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let c = Rc::clone(&catalog);
    let s = Rc::clone(&seen);
    catalog.on_method_deleted(move |_| *s.borrow_mut() = c.methods());

    catalog.remove(&MethodRef::new(["a"])).unwrap();
    assert_eq!(*seen.borrow(), vec![MethodRef::new(["b"])]);
    assert_eq!(catalog.len(), 1);
}
