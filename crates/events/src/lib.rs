//! Event contracts for geofence monitoring.
//!
//! Defines the payloads published when a participant crosses a boundary or
//! the monitor changes state, plus the `EventBus` seam they travel over.
//! On the wire every event is `{"topic": ..., "payload": ...}`.

mod bridge;
mod bus;

pub use bridge::{bus_callbacks, publish_state, spawn_state_forwarder};
pub use bus::{EventBus, EventBusRef, RecordingBus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use waypost_fence::{
    Lifecycle, MonitorState, SampleChannel, Status, Transition, TransitionEvent,
};

/// Event emitted when the participant enters or leaves the boundary.
///
/// Producers: `bus_callbacks`
/// Consumers: frontend, replay output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionPayload {
    pub transition: Transition,
    pub boundary_id: String,
    pub session_id: Uuid,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    /// Timestamp of the fix, milliseconds since epoch.
    pub timestamp_ms: i64,
    pub distance_m: f64,
    pub channel: SampleChannel,
    pub seq: u64,
}

impl From<&TransitionEvent> for TransitionPayload {
    fn from(event: &TransitionEvent) -> Self {
        Self {
            transition: event.transition,
            boundary_id: event.boundary_id.clone(),
            session_id: event.session_id,
            lat: event.location.lat,
            lon: event.location.lon,
            accuracy_m: event.location.accuracy_m,
            timestamp_ms: event.location.timestamp,
            distance_m: event.distance_m,
            channel: event.channel,
            seq: event.seq,
        }
    }
}

/// Event emitted whenever the public monitor state changes.
///
/// Producers: `publish_state`, `spawn_state_forwarder`
/// Consumers: frontend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatePayload {
    pub status: Status,
    #[serde(default)]
    pub distance_m: Option<f64>,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    pub is_monitoring: bool,
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub boundary_id: Option<String>,
}

impl From<&MonitorState> for MonitorStatePayload {
    fn from(state: &MonitorState) -> Self {
        Self {
            status: state.status,
            distance_m: state.distance_m,
            last_checked: state.last_checked,
            is_monitoring: state.is_monitoring,
            lifecycle: state.lifecycle,
            boundary_id: state.boundary_id.clone(),
        }
    }
}

/// Everything the bridge publishes, tagged with its topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload")]
pub enum GeofenceEvent {
    #[serde(rename = "geofence:enter")]
    Enter(TransitionPayload),
    #[serde(rename = "geofence:exit")]
    Exit(TransitionPayload),
    #[serde(rename = "geofence:state")]
    State(MonitorStatePayload),
}

impl GeofenceEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            GeofenceEvent::Enter(_) => event_names::GEOFENCE_ENTER,
            GeofenceEvent::Exit(_) => event_names::GEOFENCE_EXIT,
            GeofenceEvent::State(_) => event_names::MONITOR_STATE,
        }
    }
}

impl From<&TransitionEvent> for GeofenceEvent {
    fn from(event: &TransitionEvent) -> Self {
        let payload = TransitionPayload::from(event);
        match event.transition {
            Transition::Enter => GeofenceEvent::Enter(payload),
            Transition::Exit => GeofenceEvent::Exit(payload),
        }
    }
}

/// Event names as constants.
pub mod event_names {
    /// Participant entered the boundary.
    pub const GEOFENCE_ENTER: &str = "geofence:enter";
    /// Participant left the boundary.
    pub const GEOFENCE_EXIT: &str = "geofence:exit";
    /// Monitor state snapshot.
    pub const MONITOR_STATE: &str = "geofence:state";
}
