//! Routing of a batch of events into partition tables.

use tracing::debug;

use crate::{
    Error, Result,
    decode::decode_row,
    destination::Destination,
    event::Event,
    field_map::FieldMap,
    group::TableBuckets,
    partition::PartitionSpec,
    provision::TableProvisioner,
    template::PartitionTemplate,
    writer::write_buckets,
};

/// What a successful [`Dispatcher::dispatch`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Number of events in the batch.
    pub events: usize,
    /// Tables created for this batch, in the order they were first needed.
    pub created_tables: Vec<String>,
    /// Rows written per destination table, in the order tables were first
    /// seen.
    pub rows_written: Vec<(String, usize)>,
}

impl DispatchSummary {
    pub fn total_rows(&self) -> usize {
        self.rows_written.iter().map(|(_, rows)| rows).sum()
    }
}

/// Dispatches batches of urlencoded events into a destination table, or into
/// date partitions of it.
///
/// Processing a batch is all-or-nothing with respect to rows: either every
/// event is decoded, mapped and written, or the batch fails and none of its
/// rows should be committed. Table creation is the exception, see
/// [`TableProvisioner::ensure_tables`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    field_map: FieldMap,
    partition: PartitionSpec,
    provisioner: TableProvisioner,
}

impl Dispatcher {
    pub fn new(
        field_map: FieldMap,
        partition: PartitionSpec,
        template: Option<PartitionTemplate>,
    ) -> Self {
        Self {
            field_map,
            partition,
            provisioner: TableProvisioner::new(template),
        }
    }

    pub fn field_map(&self) -> &FieldMap {
        &self.field_map
    }

    pub fn partition(&self) -> &PartitionSpec {
        &self.partition
    }

    pub fn template(&self) -> Option<&PartitionTemplate> {
        self.provisioner.template()
    }

    /// Decode, partition and map every event, bucketing the resulting rows by
    /// destination table.
    ///
    /// The partition value is read from the decoded row before the field map
    /// applies, so the partition field need not be one of the mapped fields.
    /// The first event that cannot be routed fails the whole batch.
    pub fn route(&self, events: &[Event]) -> Result<TableBuckets> {
        let mut buckets = TableBuckets::new();

        for event in events {
            let row = decode_row(&event.payload).map_err(|source| Error::Decode {
                event_id: event.id,
                source,
            })?;
            let table = self
                .partition
                .resolve(&row, &event.created_at)
                .map_err(|source| Error::MissingPartitionField {
                    event_id: event.id,
                    source,
                })?;
            let row = self
                .field_map
                .apply(row)
                .map_err(|source| Error::MissingField {
                    event_id: event.id,
                    source,
                })?;

            buckets.push(table, row);
        }

        Ok(buckets)
    }

    /// Route `events`, create any missing destination tables and write the
    /// rows.
    ///
    /// Rows are left uncommitted; the caller commits the destination
    /// transaction on success and rolls it back on failure. No DDL runs unless
    /// every event routed successfully.
    pub async fn dispatch<D>(&self, destination: &mut D, events: &[Event]) -> Result<DispatchSummary>
    where
        D: Destination + ?Sized,
    {
        let buckets = self.route(events)?;
        debug!(
            events = events.len(),
            tables = buckets.len(),
            rows = buckets.total_rows(),
            "routed batch"
        );

        let tables: Vec<&str> = buckets.table_names().collect();
        let created_tables = self.provisioner.ensure_tables(destination, &tables).await?;

        write_buckets(destination, &buckets).await?;

        Ok(DispatchSummary {
            events: events.len(),
            created_tables,
            rows_written: buckets
                .iter()
                .map(|(table, rows)| (table.to_string(), rows.len()))
                .collect(),
        })
    }
}
