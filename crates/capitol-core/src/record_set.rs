//! Keyed canonical result sets shared by every provider pipeline.
//!
//! A [`RecordSet`] holds at most one record per key. Candidates from a single
//! source compete through [`Keyed::supersedes`]; records from a lower-priority
//! source only ever fill holes.

use std::collections::BTreeMap;

use serde::Serialize;

/// A canonical record with a stable identity key.
pub trait Keyed {
    /// Identity key, unique within a merged result set.
    fn key(&self) -> &str;

    /// Whether `self` should replace `existing` when both come from the same source.
    fn supersedes(&self, existing: &Self) -> bool;
}

/// Ordered map of canonical records keyed by [`Keyed::key`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RecordSet<T> {
    records: BTreeMap<String, T>,
}

impl<T> Default for RecordSet<T> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }
}

impl<T: Keyed> RecordSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate from the source currently being assembled.
    ///
    /// Returns `true` if the candidate was stored.
    pub fn insert_candidate(&mut self, record: T) -> bool {
        match self.records.get(record.key()) {
            Some(existing) if !record.supersedes(existing) => false,
            _ => {
                self.records.insert(record.key().to_string(), record);
                true
            }
        }
    }

    /// Copy records from `other` whose keys are absent here. Existing records
    /// are never overwritten. Returns the number of records added.
    pub fn fill_holes(&mut self, other: RecordSet<T>) -> usize {
        let mut added = 0;
        for (key, record) in other.records {
            if !self.records.contains_key(&key) {
                self.records.insert(key, record);
                added += 1;
            }
        }
        added
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn into_values(self) -> Vec<T> {
        self.records.into_values().collect()
    }
}

impl<T: Keyed> FromIterator<T> for RecordSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for record in iter {
            set.insert_candidate(record);
        }
        set
    }
}
