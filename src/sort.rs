use std::cmp::Ordering;

use crate::compare::compare_values;
use crate::record::FieldAccess;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "↑",
            SortDirection::Descending => "↓",
        }
    }
}

/// Which column the rows are ordered by. No column keeps input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    column: Option<String>,
    direction: SortDirection,
}

impl SortState {
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn is_sorted_by(&self, column: &str) -> bool {
        self.column.as_deref() == Some(column)
    }

    /// Header click: a new column starts ascending, the active one flips.
    /// Non sortable columns leave the state alone. Returns whether anything
    /// changed.
    pub fn toggle(&mut self, column: &str, sortable: bool) -> bool {
        if !sortable {
            return false;
        }
        if self.is_sorted_by(column) {
            self.direction = self.direction.flipped();
        } else {
            self.column = Some(column.to_string());
            self.direction = SortDirection::Ascending;
        }
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn apply<R: FieldAccess>(&self, rows: &mut [R]) {
        if let Some(column) = &self.column {
            sort(rows, column, self.direction);
        }
    }
}

/// Stable sort of `rows` by one column. Rows with equal values keep their
/// relative order in both directions.
pub fn sort<R: FieldAccess>(rows: &mut [R], column: &str, direction: SortDirection) {
    rows.sort_by(|a, b| direction.apply(compare_values(a.field(column), b.field(column))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn credits(values: &[&str]) -> Vec<Record> {
        values
            .iter()
            .map(|v| Record::from_pairs([("credits", *v)]))
            .collect()
    }

    fn column<'a>(rows: &'a [Record], id: &str) -> Vec<&'a str> {
        rows.iter().map(|r| r.field(id)).collect()
    }

    #[test]
    fn numeric_strings_sort_numerically() {
        let mut rows = credits(&["3", "1", "10"]);
        sort(&mut rows, "credits", SortDirection::Ascending);
        assert_eq!(column(&rows, "credits"), vec!["1", "3", "10"]);

        sort(&mut rows, "credits", SortDirection::Descending);
        assert_eq!(column(&rows, "credits"), vec!["10", "3", "1"]);
    }

    #[test]
    fn equal_keys_keep_input_order_both_ways() {
        let rows: Vec<Record> = [("2", "a"), ("1", "b"), ("2", "c"), ("1", "d"), ("2", "e")]
            .iter()
            .map(|(k, tag)| Record::from_pairs([("k", *k), ("tag", *tag)]))
            .collect();

        let mut asc = rows.clone();
        sort(&mut asc, "k", SortDirection::Ascending);
        assert_eq!(column(&asc, "tag"), vec!["b", "d", "a", "c", "e"]);

        let mut desc = asc.clone();
        sort(&mut desc, "k", SortDirection::Descending);
        assert_eq!(column(&desc, "tag"), vec!["a", "c", "e", "b", "d"]);
    }

    #[test]
    fn missing_values_sort_as_empty() {
        let mut rows = vec![
            Record::from_pairs([("name", "b")]),
            Record::new(),
            Record::from_pairs([("name", "a")]),
        ];
        sort(&mut rows, "name", SortDirection::Ascending);
        assert_eq!(column(&rows, "name"), vec!["", "a", "b"]);
    }

    #[test]
    fn toggle_rules() {
        let mut state = SortState::default();
        assert!(state.toggle("name", true));
        assert!(state.is_sorted_by("name"));
        assert_eq!(state.direction(), SortDirection::Ascending);

        assert!(state.toggle("name", true));
        assert_eq!(state.direction(), SortDirection::Descending);

        assert!(state.toggle("credits", true));
        assert!(state.is_sorted_by("credits"));
        assert_eq!(state.direction(), SortDirection::Ascending);

        assert!(!state.toggle("code", false));
        assert!(state.is_sorted_by("credits"));
    }

    #[test]
    fn no_column_keeps_order() {
        let mut rows = credits(&["3", "1", "2"]);
        SortState::default().apply(&mut rows);
        assert_eq!(column(&rows, "credits"), vec!["3", "1", "2"]);
    }
}
