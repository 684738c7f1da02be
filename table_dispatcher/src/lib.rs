//! Dispatches batches of urlencoded queue events into rows of a destination
//! table, optionally split into date partitions.
//!
//! A [`Dispatcher`] turns each event of a batch into a [`Row`], picks its
//! destination table through a [`PartitionSpec`], renames fields through a
//! [`FieldMap`], creates missing partition tables from a
//! [`PartitionTemplate`] and bulk inserts the rows through a [`Destination`].
//! A [`SerialConsumer`] drives a dispatcher batch by batch from a
//! [`BatchSource`], committing each batch or leaving it to be redelivered.

use thiserror::Error;

pub mod consumer;
pub mod decode;
pub mod destination;
pub mod dispatcher;
pub mod event;
pub mod field_map;
pub mod group;
pub mod mem;
pub mod partition;
pub mod provision;
pub mod quote;
pub mod row;
pub mod template;
pub mod writer;

pub use consumer::{BatchSource, ConsumerError, SerialConsumer};
pub use destination::{Destination, DestinationError};
pub use dispatcher::{DispatchSummary, Dispatcher};
pub use event::{Batch, BatchId, Event};
pub use field_map::{FieldMap, FieldMapping};
pub use partition::{Granularity, PartitionSource, PartitionSpec};
pub use row::Row;
pub use template::PartitionTemplate;

/// Errors dispatching a batch.
///
/// Any of them fails the whole batch.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot decode event {event_id}: {source}")]
    Decode {
        event_id: i64,
        source: decode::DecodeError,
    },

    #[error("cannot map event {event_id}: {source}")]
    MissingField {
        event_id: i64,
        source: field_map::MissingFieldError,
    },

    #[error("cannot partition event {event_id}: {source}")]
    MissingPartitionField {
        event_id: i64,
        source: partition::MissingPartitionFieldError,
    },

    #[error(transparent)]
    Provision(#[from] provision::ProvisionError),

    #[error(transparent)]
    Write(#[from] writer::WriteError),
}

/// A specialized `Result` for dispatch errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;
