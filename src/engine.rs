use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::expansion::ExpansionState;
use crate::filter::{FilterState, apply, distinct_values};
use crate::grouping::{Group, group_by};
use crate::record::FieldAccess;
use crate::resize::{ColumnWidths, PointerCapture, ResizeEngine};
use crate::schema::{ColumnSet, ColumnSpec, Schema};
use crate::sort::SortState;

/// The two ways a record list is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableVariant {
    /// One row per course, sections shown on expansion.
    #[default]
    Grouped,
    /// Every row on its own.
    Total,
}

impl TableVariant {
    pub fn toggled(self) -> Self {
        match self {
            TableVariant::Grouped => TableVariant::Total,
            TableVariant::Total => TableVariant::Grouped,
        }
    }
}

/// Which rows a sort or filter request is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Master rows of the grouped view.
    Master,
    /// Section rows of one expanded group.
    Detail(String),
    /// Rows of the flat view.
    Total,
}

impl Scope {
    pub fn column_set(&self) -> ColumnSet {
        match self {
            Scope::Master => ColumnSet::Master,
            Scope::Detail(_) => ColumnSet::Detail,
            Scope::Total => ColumnSet::Total,
        }
    }
}

/// Rows of one table variant, filtered and sorted, ready to render.
#[derive(Debug, PartialEq)]
pub enum ShownRows<'a, R> {
    Groups(Vec<&'a Group<R>>),
    Records(Vec<&'a R>),
}

/// Sort and filter state of one list of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub sort: SortState,
    pub filters: FilterState,
}

impl ViewState {
    fn reset(&mut self) {
        self.sort.reset();
        self.filters.clear_all();
    }
}

/// Master/detail table engine.
///
/// Owns the record list, its grouping and every piece of interactive state.
/// Replacing the records resets filters, sorting, expansion and per group
/// detail state; column widths and hidden columns are kept.
#[derive(Debug)]
pub struct TableEngine<R> {
    schema: Schema,
    records: Vec<R>,
    groups: Vec<Group<R>>,
    master: ViewState,
    total: ViewState,
    details: HashMap<String, ViewState>,
    expansion: ExpansionState,
    resizers: HashMap<ColumnSet, ResizeEngine>,
    active_resize: Option<ColumnSet>,
    hidden: HashSet<String>,
}

impl<R: FieldAccess + Clone> TableEngine<R> {
    pub fn new(schema: Schema, capture: PointerCapture) -> Self {
        let resizers = [ColumnSet::Master, ColumnSet::Detail, ColumnSet::Total]
            .into_iter()
            .map(|set| {
                let widths = ColumnWidths::from_columns(schema.columns(set));
                (set, ResizeEngine::new(widths, capture.clone()))
            })
            .collect();

        Self {
            schema,
            records: Vec::new(),
            groups: Vec::new(),
            master: ViewState::default(),
            total: ViewState::default(),
            details: HashMap::new(),
            expansion: ExpansionState::new(),
            resizers,
            active_resize: None,
            hidden: HashSet::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Swaps in a new record list.
    pub fn replace_records(&mut self, records: Vec<R>) {
        self.groups = group_by(&records, &self.schema.group_by);
        self.records = records;
        self.master.reset();
        self.total.reset();
        self.details.clear();
        self.expansion.clear();
        debug!(
            "Replaced records: {} rows in {} groups",
            self.records.len(),
            self.groups.len()
        );
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Every group in order of first appearance, ignoring filters.
    pub fn grouped(&self) -> &[Group<R>] {
        &self.groups
    }

    pub fn group(&self, key: &str) -> Option<&Group<R>> {
        self.groups.iter().find(|g| g.key == key)
    }

    // -------------------- Derived rows ---------------------- //

    /// Groups whose master passes the master filters, in master sort order.
    pub fn filtered_groups(&self) -> Vec<&Group<R>> {
        let all: Vec<&Group<R>> = self.groups.iter().collect();
        let mut groups = apply(&all, &self.master.filters);
        self.master.sort.apply(&mut groups);
        groups
    }

    /// Rows of the flat view after filtering and sorting.
    pub fn filtered_records(&self) -> Vec<&R> {
        let all: Vec<&R> = self.records.iter().collect();
        let mut rows = apply(&all, &self.total.filters);
        self.total.sort.apply(&mut rows);
        rows
    }

    /// Section rows of an expanded group, with that group's own filters and
    /// sort applied. `None` when the group is collapsed or unknown.
    pub fn visible_details(&self, key: &str) -> Option<Vec<&R>> {
        if !self.expansion.is_expanded(key) {
            return None;
        }
        let group = self.group(key)?;
        let mut rows: Vec<&R> = group.details.iter().collect();
        if let Some(state) = self.details.get(key) {
            rows = apply(&rows, &state.filters);
            state.sort.apply(&mut rows);
        }
        Some(rows)
    }

    pub fn filtered_and_sorted(&self, variant: TableVariant) -> ShownRows<'_, R> {
        match variant {
            TableVariant::Grouped => ShownRows::Groups(self.filtered_groups()),
            TableVariant::Total => ShownRows::Records(self.filtered_records()),
        }
    }

    pub fn shown_count(&self, variant: TableVariant) -> usize {
        match self.filtered_and_sorted(variant) {
            ShownRows::Groups(groups) => groups.len(),
            ShownRows::Records(records) => records.len(),
        }
    }

    pub fn total_count(&self, variant: TableVariant) -> usize {
        match variant {
            TableVariant::Grouped => self.grouped().len(),
            TableVariant::Total => self.records.len(),
        }
    }

    /// Distinct values offered by a column's filter, drawn from the
    /// unfiltered population of the scope.
    pub fn filter_candidates(&self, scope: &Scope, column: &str, search: &str) -> Vec<String> {
        match scope {
            Scope::Master => {
                let masters: Vec<&R> = self.groups.iter().map(|g| &g.master).collect();
                distinct_values(&masters, column, search)
            }
            Scope::Detail(key) => self
                .group(key)
                .map(|g| distinct_values(&g.details, column, search))
                .unwrap_or_default(),
            Scope::Total => distinct_values(&self.records, column, search),
        }
    }

    pub fn view_state(&self, scope: &Scope) -> Option<&ViewState> {
        match scope {
            Scope::Master => Some(&self.master),
            Scope::Detail(key) => self.details.get(key),
            Scope::Total => Some(&self.total),
        }
    }

    // -------------------- Mutators ---------------------- //

    fn column_spec(&self, scope: &Scope, column: &str) -> Option<&ColumnSpec> {
        let spec = self.schema.column(scope.column_set(), column);
        if spec.is_none() {
            trace!("Ignoring unknown column {column:?} for {scope:?}");
        }
        spec
    }

    fn view_state_mut(&mut self, scope: &Scope) -> Option<&mut ViewState> {
        match scope {
            Scope::Master => Some(&mut self.master),
            Scope::Detail(key) => {
                if self.group(key).is_none() {
                    trace!("Ignoring unknown group {key:?}");
                    return None;
                }
                Some(self.details.entry(key.clone()).or_default())
            }
            Scope::Total => Some(&mut self.total),
        }
    }

    /// Header click on `column`. Returns whether the sort changed.
    pub fn sort_by(&mut self, scope: &Scope, column: &str) -> bool {
        let Some(sortable) = self.column_spec(scope, column).map(|c| c.sortable) else {
            return false;
        };
        self.view_state_mut(scope)
            .is_some_and(|state| state.sort.toggle(column, sortable))
    }

    /// Checkbox click in a column filter. Returns whether `value` is now
    /// accepted; unknown or non filterable columns are ignored.
    pub fn toggle_filter_value(&mut self, scope: &Scope, column: &str, value: &str) -> bool {
        if !self.column_spec(scope, column).is_some_and(|c| c.filterable) {
            return false;
        }
        self.view_state_mut(scope)
            .is_some_and(|state| state.filters.toggle_value(column, value))
    }

    pub fn clear_filter(&mut self, scope: &Scope, column: &str) {
        if self.column_spec(scope, column).is_none() {
            return;
        }
        if let Some(state) = self.view_state_mut(scope) {
            state.filters.clear(column);
        }
    }

    /// Returns whether the group is expanded afterwards. Unknown keys are
    /// ignored.
    pub fn toggle_expand(&mut self, key: &str) -> bool {
        if self.group(key).is_none() {
            trace!("Ignoring expand of unknown group {key:?}");
            return false;
        }
        self.expansion.toggle(key)
    }

    pub fn is_expanded(&self, key: &str) -> bool {
        self.expansion.is_expanded(key)
    }

    // -------------------- Columns ---------------------- //

    /// Columns of a set that are currently shown.
    pub fn visible_columns(&self, set: ColumnSet) -> Vec<&ColumnSpec> {
        self.schema
            .columns(set)
            .iter()
            .filter(|c| set != ColumnSet::Total || !self.hidden.contains(c.id()))
            .collect()
    }

    /// Hides or shows a column of the flat view. Returns whether it is
    /// visible afterwards. The last visible column can not be hidden.
    pub fn toggle_column_visibility(&mut self, column: &str) -> bool {
        if self.schema.column(ColumnSet::Total, column).is_none() {
            trace!("Ignoring visibility toggle of unknown column {column:?}");
            return false;
        }
        if self.hidden.remove(column) {
            return true;
        }
        if self.visible_columns(ColumnSet::Total).len() <= 1 {
            return true;
        }
        self.hidden.insert(column.to_string());
        false
    }

    pub fn width(&self, set: ColumnSet, column: &str) -> Option<u16> {
        self.resizers.get(&set).and_then(|r| r.width(column))
    }

    pub fn begin_resize(&mut self, set: ColumnSet, left: &str, right: &str, x: i32) -> bool {
        self.end_resize();
        let started = self
            .resizers
            .get_mut(&set)
            .is_some_and(|r| r.begin_drag(left, right, x));
        if started {
            self.active_resize = Some(set);
        }
        started
    }

    pub fn drag_resize(&mut self, x: i32) -> Option<(u16, u16)> {
        let set = self.active_resize?;
        self.resizers.get_mut(&set)?.drag_to(x)
    }

    pub fn end_resize(&mut self) -> bool {
        match self.active_resize.take() {
            Some(set) => self.resizers.get_mut(&set).is_some_and(ResizeEngine::end_drag),
            None => false,
        }
    }

    /// Keyboard resize of `column` against its right neighbour.
    pub fn nudge_width(&mut self, set: ColumnSet, column: &str, delta: i32) -> Option<(u16, u16)> {
        let visible: Vec<String> = self
            .visible_columns(set)
            .iter()
            .map(|c| c.id().to_string())
            .collect();
        let idx = visible.iter().position(|id| id == column)?;
        let right = visible.get(idx + 1)?;
        self.resizers.get_mut(&set)?.nudge(column, right, delta)
    }
}
