//! In-process topic writer backed by a std channel.

use super::{EventsError, EventsWriter, MutationEvent};
use crate::context::RequestContext;
use log::{debug, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

/// One serialized event as delivered to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub topic: String,
    /// JSON-encoded `MutationEvent`.
    pub payload: Vec<u8>,
}

/// Writes JSON-encoded events to a single topic channel.
pub struct ChannelEventsWriter {
    topic: String,
    sender: Mutex<Option<Sender<EventMessage>>>,
}

impl ChannelEventsWriter {
    /// Creates a writer and the consumer end of its topic.
    ///
    /// The receiver yields messages until the writer is closed or dropped.
    pub fn new(topic: impl Into<String>) -> (Self, Receiver<EventMessage>) {
        let (sender, receiver) = mpsc::channel();
        let writer = Self {
            topic: topic.into(),
            sender: Mutex::new(Some(sender)),
        };
        (writer, receiver)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl EventsWriter for ChannelEventsWriter {
    fn write(&self, ctx: &RequestContext, events: &[MutationEvent]) -> Result<(), EventsError> {
        ctx.check()?;

        let messages = events
            .iter()
            .map(|event| {
                Ok(EventMessage {
                    topic: self.topic.clone(),
                    payload: serde_json::to_vec(event)?,
                })
            })
            .collect::<Result<Vec<_>, EventsError>>()?;

        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(EventsError::Closed)?;
        for message in messages {
            sender.send(message).map_err(|_| {
                warn!(
                    "event=events_write module=events status=error topic={} error_code=consumer_gone",
                    self.topic
                );
                EventsError::Transport(format!("no consumer attached to topic `{}`", self.topic))
            })?;
        }

        debug!(
            "event=events_write module=events status=ok topic={} count={}",
            self.topic,
            events.len()
        );
        Ok(())
    }

    fn close(&self) {
        let mut guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            debug!(
                "event=events_close module=events status=ok topic={}",
                self.topic
            );
        }
    }
}
