//! Serial consumption of queue batches.
//!
//! A [`SerialConsumer`] processes one batch at a time: it dispatches the
//! batch, commits the destination transaction and then tells the queue the
//! batch is finished. A batch that fails is rolled back and left unfinished,
//! so the queue delivers it again and the whole batch is retried.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    destination::{Destination, DestinationError},
    dispatcher::{DispatchSummary, Dispatcher},
    event::{Batch, BatchId},
};

/// Generic boxed error type returned by [`BatchSource`] implementations.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// A queue handing out batches of events.
#[async_trait]
pub trait BatchSource: std::fmt::Debug + Send + Sync {
    /// The next batch to process, or `None` if the queue has nothing pending.
    ///
    /// A batch that was handed out but not finished is handed out again.
    async fn next_batch(&mut self) -> Result<Option<Batch>, SourceError>;

    /// Mark `batch_id` as processed so it is not delivered again.
    async fn finish_batch(&mut self, batch_id: BatchId) -> Result<(), SourceError>;
}

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("queue error: {0}")]
    Source(SourceError),

    #[error("batch {batch_id} failed: {source}")]
    Dispatch {
        batch_id: BatchId,
        source: crate::Error,
    },

    #[error("failed to commit batch {batch_id}: {source}")]
    Commit {
        batch_id: BatchId,
        source: DestinationError,
    },
}

/// Drives a [`Dispatcher`] from a [`BatchSource`] into a [`Destination`].
#[derive(Debug)]
pub struct SerialConsumer<S, D> {
    dispatcher: Dispatcher,
    source: S,
    destination: D,
}

impl<S, D> SerialConsumer<S, D>
where
    S: BatchSource,
    D: Destination,
{
    pub fn new(dispatcher: Dispatcher, source: S, destination: D) -> Self {
        Self {
            dispatcher,
            source,
            destination,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn into_parts(self) -> (S, D) {
        (self.source, self.destination)
    }

    /// Process the next pending batch, returning `None` if there was none.
    ///
    /// A batch whose dispatch or commit fails is rolled back and left
    /// unfinished. If the destination commit succeeds but finishing the batch
    /// fails, the batch is delivered and written again.
    pub async fn process_next(&mut self) -> Result<Option<DispatchSummary>, ConsumerError> {
        let Some(batch) = self
            .source
            .next_batch()
            .await
            .map_err(ConsumerError::Source)?
        else {
            return Ok(None);
        };
        let batch_id = batch.id;
        debug!(batch_id, events = batch.events.len(), "processing batch");

        let summary = match self
            .dispatcher
            .dispatch(&mut self.destination, &batch.events)
            .await
        {
            Ok(summary) => summary,
            Err(source) => {
                warn!(batch_id, error = %source, "batch failed, rolling back");
                if let Err(e) = self.destination.rollback().await {
                    warn!(batch_id, error = %e, "rollback failed");
                }
                return Err(ConsumerError::Dispatch { batch_id, source });
            }
        };

        if let Err(source) = self.destination.commit().await {
            warn!(batch_id, error = %source, "commit failed, rolling back");
            if let Err(e) = self.destination.rollback().await {
                warn!(batch_id, error = %e, "rollback failed");
            }
            return Err(ConsumerError::Commit { batch_id, source });
        }
        self.source
            .finish_batch(batch_id)
            .await
            .map_err(ConsumerError::Source)?;

        info!(
            batch_id,
            events = summary.events,
            tables = summary.rows_written.len(),
            created = summary.created_tables.len(),
            "batch processed"
        );
        Ok(Some(summary))
    }

    /// Process batches until the source has none pending, returning how many
    /// were processed. Stops at the first failed batch.
    pub async fn run_until_idle(&mut self) -> Result<usize, ConsumerError> {
        let mut processed = 0;
        while self.process_next().await?.is_some() {
            processed += 1;
        }
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{FixedOffset, TimeZone};

    use super::*;
    use crate::{
        Error,
        event::Event,
        field_map::FieldMap,
        mem::{MemBatchSource, MemDestination},
        partition::{Granularity, PartitionSource, PartitionSpec},
        template::PartitionTemplate,
    };

    fn event(id: i64, payload: &str) -> Event {
        let created_at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 15, 10, 0, 0)
            .unwrap();
        Event::new(id, created_at, payload)
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            FieldMap::KeepAll,
            PartitionSpec::partitioned(
                "orders",
                PartitionSource::Field("created".to_string()),
                Granularity::Daily,
            ),
            Some(PartitionTemplate::new(
                "create table _DEST_TABLE () inherits (orders)",
            )),
        )
    }

    #[test_log::test(tokio::test)]
    async fn commits_and_finishes() {
        let source = MemBatchSource::new([
            Batch::new(1, vec![event(1, "id=1&created=2024-03-15")]),
            Batch::new(2, vec![event(2, "id=2&created=2024-03-16")]),
        ]);
        let mut consumer = SerialConsumer::new(dispatcher(), source, MemDestination::new());

        assert_eq!(consumer.run_until_idle().await.unwrap(), 2);
        assert_eq!(consumer.source().finished(), &[1, 2]);
        assert_eq!(
            consumer
                .destination()
                .rows("orders_2024_03_16")
                .unwrap()
                .len(),
            1
        );
        assert_eq!(consumer.process_next().await.unwrap(), None);
    }

    #[test_log::test(tokio::test)]
    async fn failed_batch_is_redelivered() {
        let source = MemBatchSource::new([Batch::new(
            7,
            vec![
                event(1, "id=1&created=2024-03-15"),
                event(2, "id=2&created=2024-03-16"),
            ],
        )]);
        let destination = MemDestination::new().fail_inserts_into("orders_2024_03_16");
        let mut consumer = SerialConsumer::new(dispatcher(), source, destination);

        assert_matches!(
            consumer.process_next().await,
            Err(ConsumerError::Dispatch {
                batch_id: 7,
                source: Error::Write(_)
            })
        );

        let (source, destination) = consumer.into_parts();
        assert!(source.finished().is_empty());
        assert_eq!(source.pending(), 1);
        // tables were committed as they were created, the rows were not
        assert_eq!(destination.rows("orders_2024_03_15").unwrap().len(), 0);
        assert_eq!(destination.rollback_count(), 1);

        // redelivery performs no more DDL and writes the batch once it succeeds
        let destination = MemDestination::new()
            .with_table("orders_2024_03_15")
            .with_table("orders_2024_03_16");
        let mut consumer = SerialConsumer::new(dispatcher(), source, destination);
        let summary = consumer.process_next().await.unwrap().unwrap();
        assert!(summary.created_tables.is_empty());
        assert_eq!(consumer.source().finished(), &[7]);
        assert_eq!(consumer.source().deliveries(), 2);
        assert!(consumer.destination().statements().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn failed_commit_is_rolled_back() {
        let source = MemBatchSource::new([Batch::new(1, vec![event(1, "id=1")])]);
        let destination = MemDestination::new().with_table("orders").fail_next_commit();
        let dispatcher = Dispatcher::new(
            FieldMap::KeepAll,
            PartitionSpec::unpartitioned("orders"),
            None,
        );
        let mut consumer = SerialConsumer::new(dispatcher, source, destination);

        assert_matches!(
            consumer.process_next().await,
            Err(ConsumerError::Commit { batch_id: 1, .. })
        );
        assert_eq!(consumer.destination().rollback_count(), 1);
        assert_eq!(consumer.destination().pending_rows("orders").unwrap().len(), 0);
        assert!(consumer.source().finished().is_empty());

        // the redelivered batch commits exactly one copy of the row
        assert!(consumer.process_next().await.unwrap().is_some());
        assert_eq!(consumer.source().finished(), &[1]);
        assert_eq!(consumer.destination().rows("orders").unwrap().len(), 1);
    }
}
