// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Mission Lifecycle Events
//
// Two delivery paths share one publish call:
// - Topic listeners: callbacks registered per event type (or "*"), invoked
//   synchronously in registration order. A panicking listener is isolated and
//   never stops delivery to the others or unwinds into the publisher.
// - Streams: tokio broadcast channel for async consumers (CLI followers, tests).
//
// In-memory only; events are not replayed after restart.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::{MissionEvent, MissionEventType};
use crate::domain::mission::MissionId;

/// Wildcard topic matching every event type.
pub const ALL_EVENTS: &str = "*";

pub type EventCallback = Arc<dyn Fn(&MissionEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topic {
    All,
    Exact(MissionEventType),
}

impl Topic {
    fn parse(topic: &str) -> Result<Self, EventBusError> {
        if topic == ALL_EVENTS {
            return Ok(Topic::All);
        }
        topic
            .parse::<MissionEventType>()
            .map(Topic::Exact)
            .map_err(|_| EventBusError::UnknownTopic(topic.to_string()))
    }

    fn matches(&self, event_type: MissionEventType) -> bool {
        match self {
            Topic::All => true,
            Topic::Exact(expected) => *expected == event_type,
        }
    }
}

struct Listener {
    id: SubscriptionId,
    topic: Topic,
    callback: EventCallback,
}

/// Event bus for publishing and subscribing to mission events
pub struct EventBus {
    sender: broadcast::Sender<MissionEvent>,
    listeners: RwLock<Vec<Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create a new event bus; `capacity` bounds the buffer of each stream subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create event bus with default capacity (1024)
    pub fn with_default_capacity() -> Self {
        Self::new(1024)
    }

    /// Register a callback for `topic` (an event type such as `mission.failed`, or `*`)
    pub fn subscribe<F>(&self, topic: &str, callback: F) -> Result<SubscriptionId, EventBusError>
    where
        F: Fn(&MissionEvent) + Send + Sync + 'static,
    {
        let topic = Topic::parse(topic)?;
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(Listener {
            id,
            topic,
            callback: Arc::new(callback),
        });
        Ok(id)
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    /// Publish to every matching listener, then to stream subscribers.
    /// Returns the number of listeners that handled the event without panicking.
    pub fn publish(&self, event: MissionEvent) -> usize {
        debug!(
            event_type = %event.event_type,
            mission_id = %event.mission_id,
            "Publishing event"
        );

        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let targets: Vec<EventCallback> = self
            .listeners
            .read()
            .iter()
            .filter(|listener| listener.topic.matches(event.event_type))
            .map(|listener| listener.callback.clone())
            .collect();

        let mut delivered = 0;
        for callback in targets {
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<String>()
                        .map(String::as_str)
                        .or_else(|| panic.downcast_ref::<&str>().copied())
                        .unwrap_or("unknown panic");
                    warn!(
                        event_type = %event.event_type,
                        mission_id = %event.mission_id,
                        error = message,
                        "Event listener panicked"
                    );
                }
            }
        }

        if self.sender.send(event).is_err() {
            debug!("No stream subscribers listening to event");
        }

        delivered
    }

    /// Subscribe to all events as a stream
    pub fn subscribe_stream(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single mission
    pub fn subscribe_mission(&self, mission_id: MissionId) -> MissionEventReceiver {
        MissionEventReceiver {
            receiver: self.sender.subscribe(),
            mission_id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn stream_subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all mission events
pub struct EventReceiver {
    receiver: broadcast::Receiver<MissionEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<MissionEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<MissionEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one mission id
pub struct MissionEventReceiver {
    receiver: broadcast::Receiver<MissionEvent>,
    mission_id: MissionId,
}

impl MissionEventReceiver {
    pub async fn recv(&mut self) -> Result<MissionEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.mission_id == self.mission_id {
                return Ok(event);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),

    #[error("Unknown event topic: {0}")]
    UnknownTopic(String),
}
