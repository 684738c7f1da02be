//! Operator-supplied DDL used to create missing destination tables.

use crate::quote::{quote_fqident, quote_ident};

/// Placeholder replaced by the quoted, schema-qualified destination table.
pub const DEST_TABLE_PLACEHOLDER: &str = "_DEST_TABLE";

/// Placeholder replaced by a quoted identifier derived from the destination
/// table with `.` replaced by `__`, for names such as constraints that cannot
/// contain a schema separator.
pub const SCHEMA_TABLE_PLACEHOLDER: &str = "_SCHEMA_TABLE";

/// DDL text, possibly several statements, containing the placeholders above.
///
/// ```text
/// create table _DEST_TABLE () inherits (orders);
/// alter table only _DEST_TABLE add constraint _SCHEMA_TABLE_pkey primary key (id);
/// grant select on _DEST_TABLE to group reporting;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTemplate {
    sql: String,
}

impl PartitionTemplate {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    /// Wrap configured template text; blank text means no template.
    pub fn from_config(sql: &str) -> Option<Self> {
        (!sql.trim().is_empty()).then(|| Self::new(sql))
    }

    pub fn as_str(&self) -> &str {
        &self.sql
    }

    /// Render the template for `table`.
    pub fn render(&self, table: &str) -> String {
        let schema_table = table.replace('.', "__");
        self.sql
            .replace(DEST_TABLE_PLACEHOLDER, &quote_fqident(table))
            .replace(SCHEMA_TABLE_PLACEHOLDER, &quote_ident(&schema_table))
    }
}
