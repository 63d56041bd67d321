//! Synchronous, single-threaded observer lists.
//!
//! Callbacks run on the emitting thread before `emit` returns. The slot list
//! is snapshotted before delivery, so a callback may connect, disconnect or
//! emit again on the same signal without hitting a `RefCell` borrow. A slot
//! disconnected during delivery is skipped if it has not run yet.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use crate::ids::SubscriptionId;

type Slot<T> = Rc<dyn Fn(&T)>;

struct SlotList<T> {
    slots: Vec<(SubscriptionId, Slot<T>)>,
}

impl<T> Default for SlotList<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> SlotList<T> {
    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|(sid, _)| *sid != id);
        self.slots.len() != before
    }

    fn contains(&self, id: SubscriptionId) -> bool {
        self.slots.iter().any(|(sid, _)| *sid == id)
    }

    fn snapshot(&self) -> Vec<(SubscriptionId, Slot<T>)> {
        self.slots
            .iter()
            .map(|(id, f)| (*id, Rc::clone(f)))
            .collect()
    }
}

/// A signal without a routing key ("updated", "method deleted", ...).
pub struct Signal<T> {
    next: Cell<u64>,
    list: RefCell<SlotList<T>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            next: Cell::new(0),
            list: RefCell::new(SlotList::default()),
        }
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, f: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId::from_seq(self.next.get());
        self.next.set(self.next.get() + 1);
        let slot: Slot<T> = Rc::new(f);
        self.list.borrow_mut().slots.push((id, slot));
        id
    }

    /// Returns `false` if the id was not connected.
    pub fn disconnect(&self, id: SubscriptionId) -> bool {
        self.list.borrow_mut().remove(id)
    }

    pub fn emit(&self, value: &T) {
        let snapshot = self.list.borrow().snapshot();
        for (id, slot) in snapshot {
            if self.list.borrow().contains(id) {
                slot(value);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.list.borrow().slots.len()
    }
}

/// A family of signals routed by key, one slot list per key.
///
/// Used for per-entity change channels: subscribers name the entity they
/// rendered, and only emissions for that key reach them.
pub struct KeyedSignal<K, T> {
    next: Cell<u64>,
    lists: RefCell<HashMap<K, SlotList<T>>>,
}

impl<K, T> Default for KeyedSignal<K, T> {
    fn default() -> Self {
        Self {
            next: Cell::new(0),
            lists: RefCell::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, T> KeyedSignal<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, key: &K, f: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId::from_seq(self.next.get());
        self.next.set(self.next.get() + 1);
        let slot: Slot<T> = Rc::new(f);
        self.lists
            .borrow_mut()
            .entry(key.clone())
            .or_default()
            .slots
            .push((id, slot));
        id
    }

    pub fn disconnect(&self, key: &K, id: SubscriptionId) -> bool {
        let mut lists = self.lists.borrow_mut();
        let Some(list) = lists.get_mut(key) else {
            return false;
        };
        let removed = list.remove(id);
        if list.slots.is_empty() {
            lists.remove(key);
        }
        removed
    }

    pub fn emit(&self, key: &K, value: &T) {
        let snapshot = match self.lists.borrow().get(key) {
            Some(list) => list.snapshot(),
            None => return,
        };
        for (id, slot) in snapshot {
            let live = self
                .lists
                .borrow()
                .get(key)
                .is_some_and(|list| list.contains(id));
            if live {
                slot(value);
            }
        }
    }

    pub fn subscriber_count(&self, key: &K) -> usize {
        self.lists.borrow().get(key).map_or(0, |l| l.slots.len())
    }

    pub fn total_subscribers(&self) -> usize {
        self.lists.borrow().values().map(|l| l.slots.len()).sum()
    }

    /// Keys that currently have at least one subscriber.
    pub fn subscribed_keys(&self) -> Vec<K> {
        self.lists.borrow().keys().cloned().collect()
    }
}
