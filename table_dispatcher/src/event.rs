//! Queue events and the batches they are delivered in.

use chrono::{DateTime, FixedOffset};

/// Identifier the queue assigns to a delivered batch.
pub type BatchId = i64;

/// A single queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Queue-assigned event id, used for error context.
    pub id: i64,
    /// Creation time of the event, in the timezone the queue reported it in.
    pub created_at: DateTime<FixedOffset>,
    /// Urlencoded row data.
    pub payload: String,
}

impl Event {
    pub fn new(id: i64, created_at: DateTime<FixedOffset>, payload: impl Into<String>) -> Self {
        Self {
            id,
            created_at,
            payload: payload.into(),
        }
    }
}

/// An ordered group of events delivered for one dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub id: BatchId,
    pub events: Vec<Event>,
}

impl Batch {
    pub fn new(id: BatchId, events: Vec<Event>) -> Self {
        Self { id, events }
    }
}
