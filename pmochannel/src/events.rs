//! Player event bus
//!
//! Every noteworthy step of a player is published here, including the
//! non-fatal outcomes that are otherwise only logged. Subscribers that lag
//! behind lose the oldest events; publishing never blocks the poll loop.

use crate::error::NonFatal;
use crate::reconciler::Strategy;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Serialized with a `type` tag, e.g. `{"type":"stopped","channel":"news"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// A new stream URL was handed to the playback element
    SourceApplied {
        channel: String,
        url: String,
        strategy: Strategy,
    },

    /// A cycle completed; `changed` tells whether the source was switched
    CycleSucceeded {
        channel: String,
        changed: bool,
        next_poll_in: Duration,
    },

    /// A cycle failed and the poller entered its backoff path
    CycleFailed {
        channel: String,
        reason: String,
        retry_in: Duration,
    },

    /// A failure absorbed where it happened
    NonFatal { channel: String, outcome: NonFatal },

    /// The poll loop observed the stop flag and exited
    Stopped { channel: String },
}

/// Broadcast channel shared by a player's components
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity.max(1)).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; dropped silently when nobody listens
    pub fn publish(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Log a non-fatal outcome at its severity and publish it
    pub fn non_fatal(&self, channel: &str, outcome: NonFatal) {
        outcome.log(channel);
        self.publish(PlayerEvent::NonFatal {
            channel: channel.to_string(),
            outcome,
        });
    }
}
