//! Event system for async cycle reporting.
//!
//! The event system lets indicator drivers, status publishers and tests
//! follow dispatch cycles without polling the controller.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::protocol::Intent;
use crate::types::{AggregateOutcome, DispatchOutcome, Target};

/// Event types that can be dispatched.
#[derive(Debug, Clone)]
pub enum Event {
    /// A command was accepted and its cycle started.
    CycleStarted { intent: Intent, target: Target },
    /// The scan window closed.
    ScanCompleted { discovered: usize },
    /// One device was processed.
    DeviceDispatched(DispatchOutcome),
    /// The cycle ended and the controller is idle again.
    CycleFinished(AggregateOutcome),
    /// An identity was renamed.
    Renamed { index: usize, name: String },
}

/// Discriminant of an [`Event`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CycleStarted,
    ScanCompleted,
    DeviceDispatched,
    CycleFinished,
    Renamed,
}

impl Event {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::CycleStarted { .. } => EventKind::CycleStarted,
            Self::ScanCompleted { .. } => EventKind::ScanCompleted,
            Self::DeviceDispatched(_) => EventKind::DeviceDispatched,
            Self::CycleFinished(_) => EventKind::CycleFinished,
            Self::Renamed { .. } => EventKind::Renamed,
        }
    }

    /// Returns the identity this event concerns, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<usize> {
        match self {
            Self::DeviceDispatched(outcome) => outcome.kind.identity(),
            Self::Renamed { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Subscription filter for specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by event kinds.
    pub kinds: Option<Vec<EventKind>>,
    /// Filter for events about one identity.
    pub identity: Option<usize>,
}

impl EventFilter {
    /// Creates a filter for specific event kinds.
    #[must_use]
    pub const fn kinds(kinds: Vec<EventKind>) -> Self {
        Self {
            kinds: Some(kinds),
            identity: None,
        }
    }

    /// Creates a filter for events about one identity.
    #[must_use]
    pub const fn identity(index: usize) -> Self {
        Self {
            kinds: None,
            identity: Some(index),
        }
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }

        if let Some(expected) = self.identity {
            if event.identity() != Some(expected) {
                return false;
            }
        }

        true
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No receivers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to all events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }

    /// Waits for an event matching the filter with timeout.
    ///
    /// Returns `None` if the timeout expires or the channel is closed.
    pub async fn wait_for(
        &self,
        filter: EventFilter,
        timeout: std::time::Duration,
    ) -> Option<Event> {
        let mut subscription = self.subscribe();

        tokio::select! {
            biased;
            result = async {
                loop {
                    let event = subscription.recv().await?;
                    if filter.matches(&event) {
                        return Some(event);
                    }
                }
            } => result,
            () = tokio::time::sleep(timeout) => None,
        }
    }
}
