use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Read access to the string fields of a row.
///
/// Every engine in this crate (grouping, filtering, sorting) only talks to
/// rows through this trait, so it does not care about the concrete shape of
/// a course offering or seat row. Missing fields read as an empty string.
pub trait FieldAccess {
    fn field(&self, id: &str) -> &str;
}

impl<T: FieldAccess + ?Sized> FieldAccess for &T {
    fn field(&self, id: &str) -> &str {
        (**self).field(id)
    }
}

impl<T: FieldAccess + ?Sized> FieldAccess for Arc<T> {
    fn field(&self, id: &str) -> &str {
        (**self).field(id)
    }
}

impl<T: FieldAccess + ?Sized> FieldAccess for Rc<T> {
    fn field(&self, id: &str) -> &str {
        (**self).field(id)
    }
}

/// A flat row as delivered by the record source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: HashMap<String, String>,
}

impl Record {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Values in the given field order, quoted so the line pastes as CSV.
    pub fn to_csv_line(&self, order: &[String]) -> String {
        order
            .iter()
            .map(|id| quote_csv_cell(self.field(id)))
            .collect::<Vec<String>>()
            .join(",")
    }
}

impl FieldAccess for Record {
    fn field(&self, id: &str) -> &str {
        self.values.get(id).map(String::as_str).unwrap_or("")
    }
}

fn quote_csv_cell(cell: &str) -> String {
    let needs_escaping = cell.contains('"');
    let needs_wrapping = cell.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(cell);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping || needs_escaping {
        out = format!("\"{out}\"");
    }
    out
}

#[cfg(test)]
impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(id.into(), value.into());
        self
    }
}
