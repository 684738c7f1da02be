//! The key/value [`Row`] decoded from an event payload.

use indexmap::IndexMap;

/// A single decoded row: an ordered mapping of field name to value.
///
/// A value of `None` is an SQL `NULL`, which is distinct from the field being
/// absent. Fields keep the order in which they were first inserted, which is
/// the column order used when the row is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: IndexMap<String, Option<String>>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `field`.
    ///
    /// Returns `None` if the field is absent and `Some(None)` if it is present
    /// but `NULL`.
    pub fn get(&self, field: &str) -> Option<Option<&str>> {
        self.fields.get(field).map(|v| v.as_deref())
    }

    /// Returns true if `field` is present, `NULL` or not.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Set `field` to `value`. An existing field keeps its position.
    pub fn insert(&mut self, field: impl Into<String>, value: Option<String>) {
        self.fields.insert(field.into(), value);
    }

    /// Field names in column order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// `(field, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for Row
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, Option<V>)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        }
    }
}
