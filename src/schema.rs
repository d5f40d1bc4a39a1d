use derive_setters::Setters;

use crate::record::FieldAccess;

/// Extra cells added to the widest value when a width is inferred.
pub const COLUMN_WIDTH_MARGIN: u16 = 2;
pub const DEFAULT_MIN_WIDTH: u16 = 4;

/// How one field takes part in the table.
#[derive(Debug, Clone, PartialEq, Eq, Setters)]
#[setters(prefix = "with_")]
pub struct ColumnSpec {
    #[setters(skip)]
    id: String,
    #[setters(into)]
    pub label: String,
    pub width: u16,
    pub min_width: u16,
    pub sortable: bool,
    pub filterable: bool,
}

impl ColumnSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>, width: u16) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            width,
            min_width: DEFAULT_MIN_WIDTH.min(width),
            sortable: false,
            filterable: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shorthand for a column that can be both sorted and filtered.
    pub fn interactive(self) -> Self {
        self.with_sortable(true).with_filterable(true)
    }
}

/// The column lists a table is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnSet {
    Master,
    Detail,
    Total,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub name: String,
    /// Field whose value decides group membership.
    pub group_by: String,
    pub master: Vec<ColumnSpec>,
    pub detail: Vec<ColumnSpec>,
    pub total: Vec<ColumnSpec>,
}

impl Schema {
    pub fn columns(&self, set: ColumnSet) -> &[ColumnSpec] {
        match set {
            ColumnSet::Master => &self.master,
            ColumnSet::Detail => &self.detail,
            ColumnSet::Total => &self.total,
        }
    }

    pub fn column(&self, set: ColumnSet, id: &str) -> Option<&ColumnSpec> {
        self.columns(set).iter().find(|c| c.id() == id)
    }

    /// Every field id referenced by any column list.
    pub fn field_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for column in self.master.iter().chain(&self.detail).chain(&self.total) {
            if !ids.contains(&column.id()) {
                ids.push(column.id());
            }
        }
        ids
    }

    /// Course offerings: one master row per course code, sections below.
    pub fn subjects() -> Self {
        let master = vec![
            ColumnSpec::new("kwamokcode", "Code", 10).with_min_width(8),
            ColumnSpec::new("kwamokname", "Course", 28)
                .with_min_width(12)
                .interactive(),
            ColumnSpec::new("isugubun", "Type", 10).with_filterable(true),
            ColumnSpec::new("hakjum", "Credits", 9).interactive(),
            ColumnSpec::new("haknean", "Year", 6).interactive(),
            ColumnSpec::new("kwamokgubun", "Category", 10).with_filterable(true),
        ];
        let detail = vec![
            ColumnSpec::new("juya", "Day/Night", 11).interactive(),
            ColumnSpec::new("bunban", "Sec", 5).with_sortable(true),
            ColumnSpec::new("prof", "Professor", 12).interactive(),
            ColumnSpec::new("classroom", "Room / Time", 30).with_min_width(10),
            ColumnSpec::new("cross_juya", "Cross", 7).with_filterable(true),
            ColumnSpec::new("plan", "Plan", 6),
        ];
        let total = master.iter().chain(detail.iter()).cloned().collect();

        Self {
            name: "subjects".into(),
            group_by: "kwamokcode".into(),
            master,
            detail,
            total,
        }
    }

    /// Remaining seats per section.
    pub fn seats() -> Self {
        let master = vec![
            ColumnSpec::new("gwamokcode", "Code", 10).with_min_width(8),
            ColumnSpec::new("gwamokname", "Course", 28)
                .with_min_width(12)
                .interactive(),
            ColumnSpec::new("isu", "Type", 10).with_filterable(true),
            ColumnSpec::new("haknean", "Year", 6).interactive(),
            ColumnSpec::new("hakjum", "Credits", 9).interactive(),
        ];
        let detail = vec![
            ColumnSpec::new("juya", "Day/Night", 11).interactive(),
            ColumnSpec::new("bunban", "Sec", 5).with_sortable(true),
            ColumnSpec::new("profname", "Professor", 12).interactive(),
            ColumnSpec::new("ta1", "Other Y1", 9).with_sortable(true),
            ColumnSpec::new("ta2", "Other Y2", 9).with_sortable(true),
            ColumnSpec::new("ta3", "Other Y3", 9).with_sortable(true),
            ColumnSpec::new("ta4", "Other Y4", 9).with_sortable(true),
            ColumnSpec::new("pyun", "Transfer", 9).with_sortable(true),
            ColumnSpec::new("jahaknean", "Own Dept", 9).with_sortable(true),
            ColumnSpec::new("total", "Left", 6).with_sortable(true),
            ColumnSpec::new("pre_sugang", "In Cart", 8).with_sortable(true),
        ];
        let total = vec![
            ColumnSpec::new("gwamokcode", "Code", 10).with_min_width(8),
            ColumnSpec::new("gwamokname", "Course", 24)
                .with_min_width(12)
                .with_sortable(true)
                .with_filterable(true),
            ColumnSpec::new("juya", "Day/Night", 11)
                .with_min_width(6)
                .with_filterable(true),
            ColumnSpec::new("bunban", "Sec", 5).with_min_width(3),
            ColumnSpec::new("profname", "Professor", 12)
                .with_min_width(6)
                .with_filterable(true),
            ColumnSpec::new("haknean", "Year", 6).with_filterable(true),
            ColumnSpec::new("hakjum", "Credits", 9).with_filterable(true),
            ColumnSpec::new("isu", "Type", 10).with_filterable(true),
            ColumnSpec::new("cross_juya", "Cross", 7).with_filterable(true),
            ColumnSpec::new("ta1", "Other Y1", 9).with_sortable(true),
            ColumnSpec::new("ta2", "Other Y2", 9).with_sortable(true),
            ColumnSpec::new("ta3", "Other Y3", 9).with_sortable(true),
            ColumnSpec::new("ta4", "Other Y4", 9).with_sortable(true),
            ColumnSpec::new("pyun", "Transfer", 9).with_sortable(true),
            ColumnSpec::new("jahaknean", "Own Dept", 9).with_sortable(true),
            ColumnSpec::new("total", "Left", 6).with_sortable(true),
            ColumnSpec::new("pre_sugang", "In Cart", 8).with_sortable(true),
        ];

        Self {
            name: "seats".into(),
            group_by: "gwamokcode".into(),
            master,
            detail,
            total,
        }
    }

    /// Builds a schema for arbitrary headers. The grouping column and the
    /// first `master_len` headers make up the master row, the rest are
    /// detail columns; the total view shows everything. Widths follow the
    /// widest value, capped at `max_column_width`.
    pub fn infer<R: FieldAccess>(
        headers: &[String],
        records: &[R],
        group_by: &str,
        master_len: usize,
        max_column_width: u16,
    ) -> Self {
        let total: Vec<ColumnSpec> = headers
            .iter()
            .map(|h| {
                let width = calculate_column_width(h, records, max_column_width);
                ColumnSpec::new(h.clone(), h.clone(), width).interactive()
            })
            .collect();

        let mut master = Vec::new();
        let mut detail = Vec::new();
        for (idx, column) in total.iter().enumerate() {
            if column.id() == group_by {
                // Grouping column leads the master row.
                master.insert(0, column.clone());
            } else if idx < master_len {
                master.push(column.clone());
            } else {
                detail.push(column.clone());
            }
        }
        if detail.is_empty() {
            detail = master.clone();
        }

        Self {
            name: "auto".into(),
            group_by: group_by.to_string(),
            master,
            detail,
            total,
        }
    }
}

fn calculate_column_width<R: FieldAccess>(id: &str, records: &[R], max_column_width: u16) -> u16 {
    let widest = records
        .iter()
        .map(|r| r.field(id).chars().count())
        .chain(std::iter::once(id.chars().count()))
        .max()
        .unwrap_or(0);
    let width = u16::try_from(widest)
        .unwrap_or(u16::MAX)
        .saturating_add(COLUMN_WIDTH_MARGIN);
    width.clamp(DEFAULT_MIN_WIDTH, max_column_width.max(DEFAULT_MIN_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    #[test]
    fn presets_keep_widths_above_minimum() {
        for schema in [Schema::subjects(), Schema::seats()] {
            for set in [ColumnSet::Master, ColumnSet::Detail, ColumnSet::Total] {
                for column in schema.columns(set) {
                    assert!(
                        column.width >= column.min_width,
                        "{} {}",
                        schema.name,
                        column.id()
                    );
                }
            }
            assert_eq!(schema.master[0].id(), schema.group_by);
        }
    }

    #[test]
    fn setters_build_columns() {
        let column = ColumnSpec::new("prof", "Professor", 12)
            .with_min_width(6)
            .with_label("Prof.")
            .interactive();
        assert_eq!(column.id(), "prof");
        assert_eq!(column.label, "Prof.");
        assert_eq!(column.min_width, 6);
        assert!(column.sortable && column.filterable);
    }

    #[test]
    fn lookup_by_set_and_id() {
        let schema = Schema::subjects();
        assert!(schema.column(ColumnSet::Detail, "prof").is_some());
        assert!(schema.column(ColumnSet::Master, "prof").is_none());
        assert!(schema.field_ids().contains(&"classroom"));
    }

    #[test]
    fn infer_puts_group_column_first() {
        let headers: Vec<String> = ["name", "code", "prof", "room"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let records = vec![Record::from_pairs([
            ("name", "Operating Systems"),
            ("code", "CS3"),
            ("prof", "Lee"),
            ("room", "N-101"),
        ])];
        let schema = Schema::infer(&headers, &records, "code", 1, 12);

        let master: Vec<&str> = schema.master.iter().map(ColumnSpec::id).collect();
        let detail: Vec<&str> = schema.detail.iter().map(ColumnSpec::id).collect();
        assert_eq!(master, vec!["code", "name"]);
        assert_eq!(detail, vec!["prof", "room"]);
        assert_eq!(schema.total.len(), 4);

        // "Operating Systems" is capped, "prof" is header-sized plus margin.
        assert_eq!(schema.column(ColumnSet::Total, "name").map(|c| c.width), Some(12));
        assert_eq!(schema.column(ColumnSet::Total, "prof").map(|c| c.width), Some(6));
    }
}
