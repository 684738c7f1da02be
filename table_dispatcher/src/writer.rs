//! Bulk writes of bucketed rows into their destination tables.

use indexmap::IndexSet;
use thiserror::Error;
use tracing::debug;

use crate::{
    destination::{Destination, DestinationError},
    group::TableBuckets,
    quote::{quote_fqident, quote_ident, quote_literal},
    row::Row,
};

/// The destination rejected rows for a table.
#[derive(Debug, Error)]
#[error("failed to write {rows} rows into {table}: {source}")]
pub struct WriteError {
    pub table: String,
    pub rows: usize,
    pub source: DestinationError,
}

/// Insert every bucket's rows into its table.
///
/// Stops at the first rejected table. Nothing is committed here; rows become
/// durable when the caller commits the destination transaction.
pub async fn write_buckets<D>(destination: &mut D, buckets: &TableBuckets) -> Result<(), WriteError>
where
    D: Destination + ?Sized,
{
    for (table, rows) in buckets.iter() {
        destination
            .bulk_insert(table, rows)
            .await
            .map_err(|source| WriteError {
                table: table.to_string(),
                rows: rows.len(),
                source,
            })?;
        debug!(%table, rows = rows.len(), "wrote rows");
    }
    Ok(())
}

/// Columns covering every row, in the order they are first seen.
pub fn columns(rows: &[Row]) -> Vec<&str> {
    rows.iter()
        .flat_map(Row::fields)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Render a multi-row `INSERT` of `rows` into `table`, or `None` if there is
/// nothing to insert.
///
/// Columns are the union of the rows' fields; a row lacking one of them
/// inserts `NULL` there. Rows without any field at all insert the column
/// defaults, one statement per row.
pub fn insert_statement(table: &str, rows: &[Row]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }

    let columns = columns(rows);
    if columns.is_empty() {
        let statement = format!("insert into {} default values;", quote_fqident(table));
        return Some(vec![statement; rows.len()].join("\n"));
    }

    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let values = rows
        .iter()
        .map(|row| {
            let values = columns
                .iter()
                .map(|c| quote_literal(row.get(c).flatten()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({values})")
        })
        .collect::<Vec<_>>()
        .join(",\n");

    Some(format!(
        "insert into {} ({column_list}) values\n{values};",
        quote_fqident(table)
    ))
}
