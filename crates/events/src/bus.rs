//! Where geofence events go once the monitor has produced them.

use crate::{GeofenceEvent, MonitorStatePayload, TransitionPayload};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Sink for geofence events (UI bridge, log writer, test recorder).
///
/// Called from the callback dispatcher thread and the state forwarder task,
/// so implementations must not block for long.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: GeofenceEvent);
}

/// Type alias for shared event bus reference.
pub type EventBusRef = Arc<dyn EventBus>;

/// Keeps every published event in order.
///
/// Splits the stream back into typed transitions and state snapshots so
/// tests can assert on them without poking at JSON.
#[derive(Default)]
pub struct RecordingBus {
    events: Mutex<Vec<GeofenceEvent>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<GeofenceEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<GeofenceEvent> {
        self.lock().clone()
    }

    /// Enter and exit payloads in publication order.
    pub fn transitions(&self) -> Vec<TransitionPayload> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                GeofenceEvent::Enter(p) | GeofenceEvent::Exit(p) => Some(p.clone()),
                GeofenceEvent::State(_) => None,
            })
            .collect()
    }

    /// State snapshots in publication order.
    pub fn states(&self) -> Vec<MonitorStatePayload> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                GeofenceEvent::State(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl EventBus for RecordingBus {
    fn publish(&self, event: GeofenceEvent) {
        tracing::trace!(topic = event.topic(), "recorded geofence event");
        self.lock().push(event);
    }
}
