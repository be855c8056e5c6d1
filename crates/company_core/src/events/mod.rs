//! Mutation notifications.
//!
//! # Responsibility
//! - Define the immutable event emitted after every successful mutation.
//! - Define the writer contract used to publish events to a topic.
//!
//! # Invariants
//! - Events are created only after the mutation is persisted.
//! - Publishing is best-effort: no retry, outbox or idempotency key here.
//!
//! # See also
//! - `channel` for the in-process topic writer.

use crate::context::{ContextError, RequestContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub mod channel;

pub use channel::{ChannelEventsWriter, EventMessage};

/// Kind of mutation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
}

impl MutationKind {
    /// Stable event name published on the wire.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Created => "CompanyCreated",
            Self::Updated => "CompanyUpdated",
            Self::Deleted => "CompanyDeleted",
        }
    }
}

/// Immutable record of one successful mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEvent {
    /// Unique per event, unrelated to the company id.
    pub id: Uuid,
    pub name: String,
    pub time: DateTime<Utc>,
    /// Label of the application that produced the event.
    pub producer: String,
    pub data: Value,
}

impl MutationEvent {
    /// Stamps a new event with a fresh id and the current time.
    pub fn new<T: Serialize + ?Sized>(
        kind: MutationKind,
        producer: &str,
        data: &T,
    ) -> Result<Self, EventsError> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: kind.event_name().to_string(),
            time: Utc::now(),
            producer: producer.to_string(),
            data: serde_json::to_value(data)?,
        })
    }
}

/// Event publishing failure.
#[derive(Debug)]
pub enum EventsError {
    Cancelled(ContextError),
    Serialize(serde_json::Error),
    /// The writer was closed before the call.
    Closed,
    Transport(String),
}

impl Display for EventsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled(err) => write!(f, "{err}"),
            Self::Serialize(err) => write!(f, "failed to serialize event: {err}"),
            Self::Closed => write!(f, "events writer is closed"),
            Self::Transport(message) => write!(f, "events transport error: {message}"),
        }
    }
}

impl Error for EventsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Cancelled(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::Closed | Self::Transport(_) => None,
        }
    }
}

impl From<ContextError> for EventsError {
    fn from(value: ContextError) -> Self {
        Self::Cancelled(value)
    }
}

impl From<serde_json::Error> for EventsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Publishes serialized events to one topic.
///
/// A failed `write` may have delivered part of the batch.
pub trait EventsWriter: Send + Sync {
    fn write(&self, ctx: &RequestContext, events: &[MutationEvent]) -> Result<(), EventsError>;
    /// Releases the underlying channel; later writes fail with `Closed`.
    fn close(&self);
}

impl<T: EventsWriter + ?Sized> EventsWriter for Arc<T> {
    fn write(&self, ctx: &RequestContext, events: &[MutationEvent]) -> Result<(), EventsError> {
        (**self).write(ctx, events)
    }

    fn close(&self) {
        (**self).close()
    }
}
