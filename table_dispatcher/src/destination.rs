//! The connection to the database rows are dispatched into.

use async_trait::async_trait;

use crate::{row::Row, writer::insert_statement};

/// Generic boxed error type returned by [`Destination`] implementations.
///
/// The dynamic boxing makes it easier to deal with errors from different
/// storage drivers.
pub type DestinationError = Box<dyn std::error::Error + Send + Sync>;

/// A transactional connection to the destination database.
///
/// A connection is used by one dispatcher at a time. Everything done through it
/// is part of a single open transaction until [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) is called, after which a new one begins.
#[async_trait]
pub trait Destination: std::fmt::Debug + Send + Sync {
    /// Returns true if `table` exists and is visible to the current
    /// transaction.
    async fn table_exists(&mut self, table: &str) -> Result<bool, DestinationError>;

    /// Execute one or more SQL statements.
    async fn execute(&mut self, sql: &str) -> Result<(), DestinationError>;

    async fn commit(&mut self) -> Result<(), DestinationError>;

    async fn rollback(&mut self) -> Result<(), DestinationError>;

    /// Insert `rows` into `table` in order.
    ///
    /// The default implementation issues a single multi-row `INSERT` through
    /// [`execute`](Self::execute).
    async fn bulk_insert(&mut self, table: &str, rows: &[Row]) -> Result<(), DestinationError> {
        match insert_statement(table, rows) {
            Some(sql) => self.execute(&sql).await,
            None => Ok(()),
        }
    }
}
