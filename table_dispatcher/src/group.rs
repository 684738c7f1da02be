//! Bucketing of routed rows by destination table.

use indexmap::IndexMap;

use crate::row::Row;

/// Rows of one dispatch call, bucketed by destination table name.
///
/// Rows for the same table keep the order they were pushed in. Tables are
/// iterated in the order they were first seen, though nothing downstream
/// depends on that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableBuckets {
    tables: IndexMap<String, Vec<Row>>,
}

impl TableBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `row` to the bucket for `table`.
    pub fn push(&mut self, table: String, row: Row) {
        self.tables.entry(table).or_default().push(row);
    }

    /// Distinct table names referenced by the buckets.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// The rows bucketed for `table`, if any.
    pub fn rows(&self, table: &str) -> Option<&[Row]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Row])> {
        self.tables
            .iter()
            .map(|(table, rows)| (table.as_str(), rows.as_slice()))
    }

    /// Number of distinct tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of rows across all tables.
    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

impl Extend<(String, Row)> for TableBuckets {
    fn extend<T: IntoIterator<Item = (String, Row)>>(&mut self, iter: T) {
        for (table, row) in iter {
            self.push(table, row);
        }
    }
}

impl FromIterator<(String, Row)> for TableBuckets {
    fn from_iter<T: IntoIterator<Item = (String, Row)>>(iter: T) -> Self {
        let mut buckets = Self::new();
        buckets.extend(iter);
        buckets
    }
}
