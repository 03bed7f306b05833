//! Q-table: a lazily grown map from state key to action values.
//!
//! Entries are created all-zero on first reference and never removed.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Bounds shared by every state-key type.
pub trait StateKey: Clone + Eq + Hash + Ord + Serialize + DeserializeOwned {}

impl<T> StateKey for T where T: Clone + Eq + Hash + Ord + Serialize + DeserializeOwned {}

#[derive(Debug, Clone)]
pub struct QTable<K> {
    n_actions: usize,
    entries: HashMap<K, Vec<f64>>,
}

impl<K: StateKey> QTable<K> {
    pub fn new(n_actions: usize) -> Self {
        Self {
            n_actions,
            entries: HashMap::new(),
        }
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Action values for `key`, inserting a zero row if absent.
    pub fn row_mut(&mut self, key: &K) -> &mut Vec<f64> {
        let n = self.n_actions;
        self.entries
            .entry(key.clone())
            .or_insert_with(|| vec![0.0; n])
    }

    pub fn row(&self, key: &K) -> Option<&[f64]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Rows sorted by key, for stable output.
    pub fn sorted_rows(&self) -> Vec<(&K, &[f64])> {
        let mut rows: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k, v.as_slice()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    /// Rebuild a table from persisted rows.
    pub(crate) fn from_rows(n_actions: usize, rows: impl IntoIterator<Item = (K, Vec<f64>)>) -> Self {
        Self {
            n_actions,
            entries: rows.into_iter().collect(),
        }
    }
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Largest value, or 0 for an empty slice.
pub fn max_value(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}
