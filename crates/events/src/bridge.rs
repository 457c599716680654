//! Wires monitor output onto an [`EventBus`].

use crate::bus::{EventBus, EventBusRef};
use crate::{GeofenceEvent, MonitorStatePayload};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use waypost_fence::{MonitorState, TransitionCallbacks};

/// Callbacks that publish every enter/exit on `bus`.
pub fn bus_callbacks(bus: EventBusRef) -> TransitionCallbacks {
    let enter_bus = bus.clone();
    TransitionCallbacks::new()
        .on_enter(move |event| enter_bus.publish(GeofenceEvent::from(&event)))
        .on_exit(move |event| bus.publish(GeofenceEvent::from(&event)))
}

/// Publish one state snapshot.
pub fn publish_state(bus: &dyn EventBus, state: &MonitorState) {
    bus.publish(GeofenceEvent::State(MonitorStatePayload::from(state)));
}

/// Forward every state change from `states` until the monitor goes away.
pub fn spawn_state_forwarder(
    bus: EventBusRef,
    mut states: watch::Receiver<MonitorState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            publish_state(bus.as_ref(), &state);
        }
        tracing::debug!("monitor state forwarder stopped");
    })
}
