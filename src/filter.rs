use std::collections::{HashMap, HashSet};

use crate::record::FieldAccess;

/// Accepted values per column.
///
/// An empty (or absent) set means the column is unrestricted. It never means
/// "reject everything": that is how "no filter" is told apart from "filtered
/// to nothing".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    accepted: HashMap<String, HashSet<String>>,
}

impl FilterState {
    /// Adds `value` to the column's accepted set, or removes it if present.
    /// Returns whether the value is accepted afterwards.
    pub fn toggle_value(&mut self, column: &str, value: &str) -> bool {
        let set = self.accepted.entry(column.to_string()).or_default();
        if set.remove(value) {
            false
        } else {
            set.insert(value.to_string());
            true
        }
    }

    pub fn clear(&mut self, column: &str) {
        if let Some(set) = self.accepted.get_mut(column) {
            set.clear();
        }
    }

    pub fn clear_all(&mut self) {
        self.accepted.clear();
    }

    /// True when the column restricts anything.
    pub fn is_active(&self, column: &str) -> bool {
        self.accepted.get(column).is_some_and(|set| !set.is_empty())
    }

    pub fn accepts(&self, column: &str, value: &str) -> bool {
        self.accepted
            .get(column)
            .is_some_and(|set| set.contains(value))
    }

    pub fn passes<R: FieldAccess>(&self, record: &R) -> bool {
        self.accepted
            .iter()
            .all(|(column, set)| set.is_empty() || set.contains(record.field(column)))
    }
}

/// The subsequence of `records` passing every active column filter.
pub fn apply<R: FieldAccess + Clone>(records: &[R], state: &FilterState) -> Vec<R> {
    records
        .iter()
        .filter(|r| state.passes(*r))
        .cloned()
        .collect()
}

/// Distinct values of `column`, in first-seen order, narrowed to those
/// containing `search` (case-insensitive). An empty search keeps everything.
pub fn distinct_values<R: FieldAccess>(records: &[R], column: &str, search: &str) -> Vec<String> {
    let needle = search.to_lowercase();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut values = Vec::new();

    for record in records {
        let value = record.field(column);
        if seen.insert(value) && (needle.is_empty() || value.to_lowercase().contains(&needle)) {
            values.push(value.to_string());
        }
    }
    values
}
