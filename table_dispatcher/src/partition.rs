//! Resolution of the destination table for a row.
//!
//! When partitioning is enabled, the table name is the base name with a date
//! suffix taken from the partition value: `orders_2024_03_15` for daily
//! partitions and `orders_2024_03` for monthly ones. The value is not checked
//! for being a calendar date; whatever precedes the first space is split on
//! `-` and the pieces are joined with `_`.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::row::Row;

/// Partition field name that selects the event creation time instead of a row
/// field.
pub const EVENT_TIME_FIELD: &str = "_EVTIME";

/// The row lacked a value for the partition field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("partition field {field:?} is missing or null")]
pub struct MissingPartitionFieldError {
    pub field: String,
}

/// An unknown partition granularity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid partition method {0:?}, expected `daily` or `monthly`")]
pub struct InvalidGranularity(pub String);

/// How much of the partition date ends up in the table name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// `<base>_YYYY_MM_DD`
    #[default]
    Daily,
    /// `<base>_YYYY_MM`
    Monthly,
}

impl FromStr for Granularity {
    type Err = InvalidGranularity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "monthly" => Ok(Self::Monthly),
            _ => Err(InvalidGranularity(s.to_string())),
        }
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// Where the partition value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartitionSource {
    /// A named field of the decoded row.
    Field(String),
    /// The creation time of the event carrying the row.
    EventTime,
}

impl PartitionSource {
    /// Interpret a configured partition field name, mapping
    /// [`EVENT_TIME_FIELD`] to [`PartitionSource::EventTime`].
    pub fn from_field_name(name: &str) -> Self {
        match name {
            EVENT_TIME_FIELD => Self::EventTime,
            _ => Self::Field(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PartitionColumn {
    source: PartitionSource,
    granularity: Granularity,
}

/// Maps rows to destination table names.
///
/// The resolved name only depends on the row, the event creation time and
/// this value, so redelivered events always land in the same table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    dest_table: String,
    column: Option<PartitionColumn>,
}

impl PartitionSpec {
    /// Every row goes to `dest_table`.
    pub fn unpartitioned(dest_table: impl Into<String>) -> Self {
        Self {
            dest_table: dest_table.into(),
            column: None,
        }
    }

    /// Rows go to date partitions of `dest_table`, keyed by `source`.
    pub fn partitioned(
        dest_table: impl Into<String>,
        source: PartitionSource,
        granularity: Granularity,
    ) -> Self {
        Self {
            dest_table: dest_table.into(),
            column: Some(PartitionColumn {
                source,
                granularity,
            }),
        }
    }

    /// The configured base table name.
    pub fn dest_table(&self) -> &str {
        &self.dest_table
    }

    pub fn source(&self) -> Option<&PartitionSource> {
        self.column.as_ref().map(|c| &c.source)
    }

    pub fn granularity(&self) -> Option<Granularity> {
        self.column.as_ref().map(|c| c.granularity)
    }

    /// Resolve the destination table for `row`, carried by an event created at
    /// `created_at`.
    pub fn resolve(
        &self,
        row: &Row,
        created_at: &DateTime<FixedOffset>,
    ) -> Result<String, MissingPartitionFieldError> {
        let Some(column) = &self.column else {
            return Ok(self.dest_table.clone());
        };

        let value = match &column.source {
            PartitionSource::EventTime => {
                created_at.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string()
            }
            PartitionSource::Field(field) => row
                .get(field)
                .flatten()
                .ok_or_else(|| MissingPartitionFieldError {
                    field: field.clone(),
                })?
                .to_string(),
        };

        Ok(format!(
            "{}_{}",
            self.dest_table,
            partition_suffix(&value, column.granularity)
        ))
    }
}

/// Turn a partition value such as `2024-03-15 10:00:00` into a table suffix
/// such as `2024_03_15`.
fn partition_suffix(value: &str, granularity: Granularity) -> String {
    let date = value.split(' ').next().unwrap_or_default();
    let parts = date.split('-');
    let parts: Vec<_> = match granularity {
        Granularity::Daily => parts.collect(),
        Granularity::Monthly => parts.take(2).collect(),
    };
    parts.join("_")
}
