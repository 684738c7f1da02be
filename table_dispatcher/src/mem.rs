//! In-memory implementations of [`Destination`] and [`BatchSource`]. They can
//! be used for testing or to run a dispatcher without a database.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::warn;

use crate::{
    consumer::{BatchSource, SourceError},
    destination::{Destination, DestinationError},
    event::{Batch, BatchId},
    quote::DEFAULT_SCHEMA,
    row::Row,
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct MemTables {
    tables: IndexMap<String, Vec<Row>>,
}

/// In-memory destination database.
///
/// Changes are staged until [`Destination::commit`] and discarded by
/// [`Destination::rollback`]. Executed SQL is recorded but only
/// `create table` statements are interpreted; other statements are accepted
/// and have no effect.
#[derive(Debug, Default)]
pub struct MemDestination {
    committed: MemTables,
    staged: MemTables,
    statements: Vec<String>,
    commits: usize,
    rollbacks: usize,
    failing_tables: HashSet<String>,
    fail_next_commit: bool,
}

impl MemDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing, committed, empty `table`.
    pub fn with_table(mut self, table: &str) -> Self {
        let table = normalize(table);
        self.committed.tables.entry(table.clone()).or_default();
        self.staged.tables.entry(table).or_default();
        self
    }

    /// Reject every insert into `table`, as a constraint violation would.
    pub fn fail_inserts_into(mut self, table: &str) -> Self {
        self.failing_tables.insert(normalize(table));
        self
    }

    /// Fail the next commit, leaving the transaction open.
    pub fn fail_next_commit(mut self) -> Self {
        self.fail_next_commit = true;
        self
    }

    /// Committed rows of `table`, or `None` if it does not exist.
    pub fn rows(&self, table: &str) -> Option<&[Row]> {
        self.committed
            .tables
            .get(&normalize(table))
            .map(Vec::as_slice)
    }

    /// Rows of `table` as seen by the open transaction.
    pub fn pending_rows(&self, table: &str) -> Option<&[Row]> {
        self.staged.tables.get(&normalize(table)).map(Vec::as_slice)
    }

    pub fn committed_table_exists(&self, table: &str) -> bool {
        self.committed.tables.contains_key(&normalize(table))
    }

    /// Committed table names, in creation order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.committed.tables.keys().map(String::as_str)
    }

    /// Every SQL text passed to [`Destination::execute`].
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks
    }

    fn create_table(&mut self, statement: &str) -> Result<(), DestinationError> {
        let Some((table, if_not_exists)) = parse_create_table(statement) else {
            return Ok(());
        };

        if self.staged.tables.contains_key(&table) {
            if if_not_exists {
                return Ok(());
            }
            return Err(format!("relation \"{table}\" already exists").into());
        }
        self.staged.tables.insert(table, vec![]);
        Ok(())
    }
}

#[async_trait]
impl Destination for MemDestination {
    async fn table_exists(&mut self, table: &str) -> Result<bool, DestinationError> {
        Ok(self.staged.tables.contains_key(&normalize(table)))
    }

    async fn execute(&mut self, sql: &str) -> Result<(), DestinationError> {
        self.statements.push(sql.to_string());
        for statement in sql.split(';') {
            self.create_table(statement)?;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DestinationError> {
        if std::mem::take(&mut self.fail_next_commit) {
            return Err("could not serialize access due to concurrent update".into());
        }
        self.committed = self.staged.clone();
        self.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DestinationError> {
        self.staged = self.committed.clone();
        self.rollbacks += 1;
        Ok(())
    }

    async fn bulk_insert(&mut self, table: &str, rows: &[Row]) -> Result<(), DestinationError> {
        let table = normalize(table);
        if self.failing_tables.contains(&table) {
            return Err(format!("insert into \"{table}\" rejected").into());
        }

        let existing = self
            .staged
            .tables
            .get_mut(&table)
            .ok_or_else(|| format!("relation \"{table}\" does not exist"))?;
        existing.extend_from_slice(rows);
        Ok(())
    }
}

/// Strip the default schema so `public.orders` and `orders` are the same
/// table.
fn normalize(table: &str) -> String {
    table
        .strip_prefix(DEFAULT_SCHEMA)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(table)
        .to_string()
}

/// Extract the table name of a `create table` statement, and whether it was
/// `if not exists`.
fn parse_create_table(statement: &str) -> Option<(String, bool)> {
    let statement = statement.trim_start();
    let rest = strip_keyword(statement, "create")?;
    let rest = strip_keyword(rest, "table")?;

    let (rest, if_not_exists) = match strip_keyword(rest, "if")
        .and_then(|r| strip_keyword(r, "not"))
        .and_then(|r| strip_keyword(r, "exists"))
    {
        Some(rest) => (rest, true),
        None => (rest, false),
    };

    let name = parse_name(rest);
    (!name.is_empty()).then(|| (normalize(&name), if_not_exists))
}

/// Strip a case-insensitive keyword followed by whitespace.
fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let head = s.get(..keyword.len())?;
    let tail = &s[keyword.len()..];
    (head.eq_ignore_ascii_case(keyword) && tail.starts_with(char::is_whitespace))
        .then(|| tail.trim_start())
}

/// Parse a possibly quoted, possibly qualified name, folding unquoted parts to
/// lowercase.
fn parse_name(s: &str) -> String {
    let mut name = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                while let Some(c) = chars.next() {
                    match c {
                        '"' if chars.peek() == Some(&'"') => {
                            chars.next();
                            name.push('"');
                        }
                        '"' => break,
                        c => name.push(c),
                    }
                }
            }
            c if c.is_whitespace() || c == '(' || c == ';' => break,
            c => name.push(c.to_ascii_lowercase()),
        }
    }

    name
}

/// In-memory queue that hands out the oldest unfinished batch until it is
/// finished, mirroring how a queue redelivers a batch whose processing failed.
#[derive(Debug, Default)]
pub struct MemBatchSource {
    pending: VecDeque<Batch>,
    finished: Vec<BatchId>,
    deliveries: usize,
}

impl MemBatchSource {
    pub fn new(batches: impl IntoIterator<Item = Batch>) -> Self {
        Self {
            pending: batches.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Ids of finished batches, in order.
    pub fn finished(&self) -> &[BatchId] {
        &self.finished
    }

    /// Number of batches handed out, counting redeliveries.
    pub fn deliveries(&self) -> usize {
        self.deliveries
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl BatchSource for MemBatchSource {
    async fn next_batch(&mut self) -> Result<Option<Batch>, SourceError> {
        let batch = self.pending.front().cloned();
        if batch.is_some() {
            self.deliveries += 1;
        }
        Ok(batch)
    }

    async fn finish_batch(&mut self, batch_id: BatchId) -> Result<(), SourceError> {
        match self.pending.front() {
            Some(batch) if batch.id == batch_id => {
                self.pending.pop_front();
                self.finished.push(batch_id);
                Ok(())
            }
            _ => {
                warn!(batch_id, "finishing a batch that is not the current one");
                Err(format!("batch {batch_id} is not the current batch").into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{FixedOffset, TimeZone};

    use super::*;
    use crate::event::Event;

    fn row(id: &str) -> Row {
        [("id", Some(id))].into_iter().collect()
    }

    #[test]
    fn parse_create_statements() {
        assert_eq!(
            parse_create_table("create table public.orders_2024_03_15 () inherits (orders)"),
            Some(("orders_2024_03_15".to_string(), false))
        );
        assert_eq!(
            parse_create_table("\n  CREATE TABLE IF NOT EXISTS reporting.Orders(id int)"),
            Some(("reporting.orders".to_string(), true))
        );
        assert_eq!(
            parse_create_table("create table \"Reporting\".\"a\"\"b\" ()"),
            Some(("Reporting.a\"b".to_string(), false))
        );
        assert_eq!(parse_create_table("grant select on orders to group x"), None);
        assert_eq!(parse_create_table("create tablespace foo"), None);
        assert_eq!(parse_create_table(""), None);
    }

    #[tokio::test]
    async fn staged_until_commit() {
        let mut destination = MemDestination::new();

        destination
            .execute("create table orders (); grant select on orders to group reporting;")
            .await
            .unwrap();
        assert!(destination.table_exists("orders").await.unwrap());
        assert!(destination.table_exists("public.orders").await.unwrap());
        assert!(!destination.committed_table_exists("orders"));

        destination.commit().await.unwrap();
        assert!(destination.committed_table_exists("orders"));

        destination
            .bulk_insert("orders", &[row("1"), row("2")])
            .await
            .unwrap();
        assert_eq!(destination.pending_rows("orders").unwrap().len(), 2);
        assert_eq!(destination.rows("orders").unwrap().len(), 0);

        destination.rollback().await.unwrap();
        assert_eq!(destination.pending_rows("orders").unwrap().len(), 0);
        assert_eq!(destination.rollback_count(), 1);
        assert_eq!(destination.table_names().collect::<Vec<_>>(), vec!["orders"]);
    }

    #[tokio::test]
    async fn insert_errors() {
        let mut destination = MemDestination::new()
            .with_table("orders")
            .fail_inserts_into("public.orders");

        assert!(destination.bulk_insert("missing", &[row("1")]).await.is_err());
        assert!(destination.bulk_insert("orders", &[row("1")]).await.is_err());
        assert!(destination.execute("create table orders ()").await.is_err());
        destination
            .execute("create table if not exists orders ()")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_commit_keeps_staged_state() {
        let mut destination = MemDestination::new().with_table("orders").fail_next_commit();

        destination.bulk_insert("orders", &[row("1")]).await.unwrap();
        assert!(destination.commit().await.is_err());
        assert_eq!(destination.commit_count(), 0);
        assert_eq!(destination.rows("orders").unwrap().len(), 0);
        assert_eq!(destination.pending_rows("orders").unwrap().len(), 1);

        // only the next commit fails
        destination.commit().await.unwrap();
        assert_eq!(destination.rows("orders").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redelivers_until_finished() {
        let created_at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 15, 0, 0, 0)
            .unwrap();
        let mut source = MemBatchSource::new([
            Batch::new(1, vec![Event::new(1, created_at, "id=1")]),
            Batch::new(2, vec![]),
        ]);

        assert_eq!(source.next_batch().await.unwrap().unwrap().id, 1);
        assert_eq!(source.next_batch().await.unwrap().unwrap().id, 1);
        assert_matches!(source.finish_batch(2).await, Err(_));

        source.finish_batch(1).await.unwrap();
        assert_eq!(source.next_batch().await.unwrap().unwrap().id, 2);
        source.finish_batch(2).await.unwrap();

        assert_eq!(source.next_batch().await.unwrap(), None);
        assert_eq!(source.finished(), &[1, 2]);
        assert_eq!(source.deliveries(), 3);
        assert_eq!(source.pending(), 0);
    }
}
