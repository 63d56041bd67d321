//! Stable indexing for matrix construction.
//!
//! Maps entity keys to contiguous matrix indices (0..N) in insertion order,
//! with O(1) lookup in both directions.

use std::collections::HashMap;

use lf_core::EntityKey;

#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    keys: Vec<EntityKey>,
    positions: HashMap<EntityKey, usize>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `key`, assigning the next free one if it is new. The flag
    /// is `true` when the key was inserted by this call.
    pub fn insert(&mut self, key: &EntityKey) -> (usize, bool) {
        if let Some(&idx) = self.positions.get(key) {
            return (idx, false);
        }
        let idx = self.keys.len();
        self.keys.push(key.clone());
        self.positions.insert(key.clone(), idx);
        (idx, true)
    }

    pub fn get(&self, key: &EntityKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn key(&self, idx: usize) -> Option<&EntityKey> {
        self.keys.get(idx)
    }

    pub fn keys(&self) -> &[EntityKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trip() {
        let mut index = KeyIndex::new();
        let a = EntityKey::new("db", "a");
        let b = EntityKey::new("db", "b");

        assert_eq!(index.insert(&a), (0, true));
        assert_eq!(index.insert(&b), (1, true));
        assert_eq!(index.insert(&a), (0, false));

        for (i, key) in index.keys().iter().enumerate() {
            assert_eq!(index.get(key), Some(i));
            assert_eq!(index.key(i), Some(key));
        }
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&EntityKey::new("db", "zzz")), None);
    }
}
