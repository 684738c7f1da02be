//! Renaming and selection of row fields before they are written.

use std::{collections::HashSet, str::FromStr};

use thiserror::Error;

use crate::row::Row;

/// A field listed in a [`FieldMap`] was not in the row being mapped.
///
/// This means the producer's schema and the configured mapping disagree, so it
/// fails the batch rather than skipping the row.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("field {field:?} is listed in the field map but missing from the row")]
pub struct MissingFieldError {
    pub field: String,
}

/// Errors parsing a `source[:dest]` field list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldMapParseError {
    #[error("empty entry in field list {input:?}")]
    EmptyEntry { input: String },

    #[error("invalid field mapping {entry:?}, expected `source` or `source:dest`")]
    InvalidEntry { entry: String },

    #[error("source field {field:?} is mapped more than once")]
    DuplicateSource { field: String },
}

/// One `source -> dest` rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: String,
    pub dest: String,
}

impl FieldMapping {
    pub fn new(source: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }
}

/// How decoded rows are turned into destination rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldMap {
    /// Rows are written unchanged.
    #[default]
    KeepAll,

    /// Only the listed fields are written, renamed, in list order. Every other
    /// field is dropped.
    Mapped(Vec<FieldMapping>),
}

impl FieldMap {
    /// Apply the mapping to `row`.
    pub fn apply(&self, row: Row) -> Result<Row, MissingFieldError> {
        let mappings = match self {
            Self::KeepAll => return Ok(row),
            Self::Mapped(mappings) => mappings,
        };

        let mut out = Row::new();
        for mapping in mappings {
            let value = row.get(&mapping.source).ok_or_else(|| MissingFieldError {
                field: mapping.source.clone(),
            })?;
            out.insert(mapping.dest.clone(), value.map(ToOwned::to_owned));
        }
        Ok(out)
    }
}

impl FromStr for FieldMap {
    type Err = FieldMapParseError;

    /// Parse `*` or a comma separated list of `source[:dest]` entries, e.g.
    /// `id:newid, name, bar:baz`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" {
            return Ok(Self::KeepAll);
        }

        let mut seen = HashSet::new();
        let mut mappings = vec![];
        for entry in s.split(',').map(str::trim) {
            if entry.is_empty() {
                return Err(FieldMapParseError::EmptyEntry {
                    input: s.to_string(),
                });
            }

            let parts = entry.split(':').map(str::trim).collect::<Vec<_>>();
            let mapping = match parts.as_slice() {
                [source] => FieldMapping::new(*source, *source),
                [source, dest] if !source.is_empty() && !dest.is_empty() => {
                    FieldMapping::new(*source, *dest)
                }
                _ => {
                    return Err(FieldMapParseError::InvalidEntry {
                        entry: entry.to_string(),
                    });
                }
            };

            if !seen.insert(mapping.source.clone()) {
                return Err(FieldMapParseError::DuplicateSource {
                    field: mapping.source,
                });
            }
            mappings.push(mapping);
        }

        Ok(Self::Mapped(mappings))
    }
}
