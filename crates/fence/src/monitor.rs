//! Monitoring controller - owns the session and drives classification.
//!
//! One classifier task per session consumes the location bus; the one-shot
//! paths (start-up check, manual refresh) classify inline. Both go through
//! the same session lock, so transition detection never races. Callbacks
//! run on a dedicated dispatcher thread in classification order.

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::event::Event;
use crate::provider::{BackgroundDelivery, LocationError, PositionSource, Subscription};
use crate::status::{Lifecycle, MonitorState, Status, StatusTracker, Transition};
use chrono::Utc;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use waypost_bus::{
    Location, LocationBusConfig, LocationBusReceiver, SampleChannel, SampleStats,
    SampleStatsSnapshot,
};
use waypost_geo::Boundary;
use waypost_permissions::{ensure_permission, PermissionGateRef, PermissionKind};

/// A boundary crossing delivered to `on_enter` / `on_exit`.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub transition: Transition,
    pub boundary_id: String,
    /// Monitoring session that produced the transition.
    pub session_id: Uuid,
    /// The fix that triggered the crossing.
    pub location: Location,
    pub distance_m: f64,
    pub channel: SampleChannel,
    /// Per-controller counter, strictly increasing in delivery order.
    pub seq: u64,
    pub detected_at: Instant,
}

/// Callback type for transition events.
pub type TransitionCallback = Arc<dyn Fn(TransitionEvent) + Send + Sync + 'static>;

/// Caller-supplied side effects for enter/exit.
///
/// A panicking callback is logged and otherwise ignored.
#[derive(Clone, Default)]
pub struct TransitionCallbacks {
    on_enter: Option<TransitionCallback>,
    on_exit: Option<TransitionCallback>,
}

impl TransitionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enter<F>(mut self, f: F) -> Self
    where
        F: Fn(TransitionEvent) + Send + Sync + 'static,
    {
        self.on_enter = Some(Arc::new(f));
        self
    }

    pub fn on_exit<F>(mut self, f: F) -> Self
    where
        F: Fn(TransitionEvent) + Send + Sync + 'static,
    {
        self.on_exit = Some(Arc::new(f));
        self
    }

    fn callback_for(&self, transition: Transition) -> Option<&TransitionCallback> {
        match transition {
            Transition::Enter => self.on_enter.as_ref(),
            Transition::Exit => self.on_exit.as_ref(),
        }
    }

    fn invoke(&self, event: TransitionEvent) {
        let Some(callback) = self.callback_for(event.transition) else {
            return;
        };
        let transition = event.transition;
        let seq = event.seq;
        if std::panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
            tracing::warn!(%transition, seq, "transition callback panicked");
        }
    }
}

impl std::fmt::Debug for TransitionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionCallbacks")
            .field("on_enter", &self.on_enter.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .finish()
    }
}

/// Everything guarded by the classification lock.
struct Session {
    boundary: Option<Boundary>,
    tracker: StatusTracker,
    state: MonitorState,
    session_id: Uuid,
    next_seq: u64,
    /// Queue to the callback dispatcher; `None` once shut down.
    dispatch: Option<crossbeam_channel::Sender<TransitionEvent>>,
}

struct Shared {
    session: Mutex<Session>,
    state_tx: watch::Sender<MonitorState>,
    stats: Arc<SampleStats>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &MonitorState) {
        self.state_tx.send_replace(state.clone());
    }

    fn has_boundary(&self) -> bool {
        self.lock().boundary.is_some()
    }

    fn set_lifecycle(&self, lifecycle: Lifecycle) {
        let mut session = self.lock();
        session.state.lifecycle = lifecycle;
        self.publish(&session.state);
    }

    fn replace_boundary(&self, boundary: Option<Boundary>) {
        let mut session = self.lock();
        session.state = MonitorState::for_boundary(boundary.as_ref().map(|b| b.id().to_string()));
        session.boundary = boundary;
        session.tracker.reset();
        self.publish(&session.state);
    }

    fn activate(&self) -> Uuid {
        let mut session = self.lock();
        session.tracker.reset();
        session.state.reset();
        session.state.is_monitoring = true;
        session.state.lifecycle = Lifecycle::Active;
        session.session_id = Uuid::new_v4();
        self.publish(&session.state);
        session.session_id
    }

    /// Disconnect the dispatcher queue so the thread exits once drained.
    fn close_dispatch(&self) {
        self.lock().dispatch = None;
    }

    fn deactivate(&self) {
        let mut session = self.lock();
        session.tracker.reset();
        session.state.reset();
        self.publish(&session.state);
    }

    /// Classify one fix and queue any resulting transition.
    ///
    /// With `require_monitoring`, fixes that arrive once monitoring has
    /// stopped are discarded; the check happens under the same lock as
    /// classification.
    fn apply(&self, channel: SampleChannel, location: Location, require_monitoring: bool) -> Status {
        let mut guard = self.lock();
        let session = &mut *guard;

        if require_monitoring && !session.state.is_monitoring {
            self.stats.increment_discarded();
            tracing::trace!(%channel, "discarding sample, monitoring inactive");
            return session.state.status;
        }
        let Some(boundary) = session.boundary.as_ref() else {
            self.stats.increment_discarded();
            return Status::Unknown;
        };

        let classification = session.tracker.classify(location.coordinate(), boundary);
        self.stats.increment_classified();

        session.state.status = classification.status;
        session.state.distance_m = Some(classification.distance_m);
        session.state.last_checked = Some(Utc::now());

        tracing::trace!(
            %channel,
            status = %classification.status,
            distance_m = classification.distance_m,
            "classified sample"
        );

        if let Some(transition) = classification.transition {
            let event = TransitionEvent {
                transition,
                boundary_id: boundary.id().to_string(),
                session_id: session.session_id,
                location,
                distance_m: classification.distance_m,
                channel,
                seq: session.next_seq,
                detected_at: Instant::now(),
            };
            session.next_seq += 1;
            self.stats.increment_transitions();

            tracing::debug!(
                %transition,
                boundary = %event.boundary_id,
                %channel,
                seq = event.seq,
                distance_m = event.distance_m,
                "geofence transition"
            );

            let delivered = match &session.dispatch {
                Some(dispatch) => dispatch.send(event).is_ok(),
                None => false,
            };
            if !delivered {
                tracing::warn!(%transition, "callback dispatcher gone, transition not delivered");
            }
        }

        self.publish(&session.state);
        classification.status
    }
}

/// Resources held while a session is active.
struct ActiveSession {
    foreground: Subscription,
    background_task: Option<String>,
    cancel: CancellationToken,
    classifier: JoinHandle<()>,
}

/// Geofence monitoring controller.
///
/// Lifecycle: `Idle -> PermissionPending -> Active -> Idle`. All methods
/// take `&self`, so the controller can be shared behind an `Arc`.
pub struct GeofenceMonitor {
    config: MonitorConfig,
    positions: Arc<dyn PositionSource>,
    background: Option<Arc<dyn BackgroundDelivery>>,
    permissions: PermissionGateRef,
    shared: Arc<Shared>,
    /// Serializes start/stop/boundary changes.
    control: tokio::sync::Mutex<Option<ActiveSession>>,
    /// Cancels in-flight one-shot fetches; replaced after each stop.
    fetch_cancel: Mutex<CancellationToken>,
    dispatcher: Option<std::thread::JoinHandle<()>>,
}

impl GeofenceMonitor {
    /// Create an idle controller with no boundary selected.
    ///
    /// Spawns the callback dispatcher thread.
    pub fn new(
        config: MonitorConfig,
        positions: Arc<dyn PositionSource>,
        permissions: PermissionGateRef,
        callbacks: TransitionCallbacks,
    ) -> Result<Self> {
        config.validate()?;

        let (dispatch, events) = crossbeam_channel::unbounded::<TransitionEvent>();
        let dispatcher = std::thread::Builder::new()
            .name("waypost-callbacks".into())
            .spawn(move || run_dispatcher(events, callbacks))?;

        let (state_tx, _) = watch::channel(MonitorState::default());

        let shared = Arc::new(Shared {
            session: Mutex::new(Session {
                boundary: None,
                tracker: StatusTracker::with_hysteresis(config.hysteresis_m),
                state: MonitorState::default(),
                session_id: Uuid::new_v4(),
                next_seq: 0,
                dispatch: Some(dispatch),
            }),
            state_tx,
            stats: Arc::new(SampleStats::new()),
        });

        Ok(Self {
            config,
            positions,
            background: None,
            permissions,
            shared,
            control: tokio::sync::Mutex::new(None),
            fetch_cancel: Mutex::new(CancellationToken::new()),
            dispatcher: Some(dispatcher),
        })
    }

    /// Enable OS background delivery (still subject to permission and config).
    pub fn with_background(mut self, background: Arc<dyn BackgroundDelivery>) -> Self {
        self.background = Some(background);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Snapshot of the public state.
    pub fn state(&self) -> MonitorState {
        self.shared.state_tx.borrow().clone()
    }

    /// Watch channel that yields every state change.
    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.shared.state_tx.subscribe()
    }

    pub fn status(&self) -> Status {
        self.shared.state_tx.borrow().status
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.state_tx.borrow().lifecycle
    }

    pub fn is_monitoring(&self) -> bool {
        self.shared.state_tx.borrow().is_monitoring
    }

    pub fn boundary(&self) -> Option<Boundary> {
        self.shared.lock().boundary.clone()
    }

    pub fn stats(&self) -> SampleStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Replace the tracked boundary.
    ///
    /// Validates first; on success any running session is stopped and the
    /// state starts over for the new boundary. `None` clears the selection.
    pub async fn set_boundary(&self, boundary: Option<Boundary>) -> Result<()> {
        if let Some(b) = &boundary {
            b.validate()?;
        }
        self.cancel_pending_fetch();

        let mut control = self.control.lock().await;
        self.stop_locked(&mut control).await;
        tracing::info!(
            boundary = boundary.as_ref().map(|b| b.id()).unwrap_or("none"),
            "geofence boundary selected"
        );
        self.shared.replace_boundary(boundary);
        Ok(())
    }

    /// Select the event's primary boundary and track it.
    pub async fn set_event(&self, event: &Event) -> Result<()> {
        let boundary = event.primary_boundary()?;
        if boundary.is_none() {
            tracing::info!(event = %event.id, "event has no boundaries, nothing to monitor");
        }
        self.set_boundary(boundary).await
    }

    /// Start continuous monitoring.
    ///
    /// Returns `Ok(false)` when there is no boundary or foreground permission
    /// is denied. Returns an error when a position stream can't be started;
    /// in that case no state has changed.
    pub async fn start_monitoring(&self) -> Result<bool> {
        let mut control = self.control.lock().await;
        if control.is_some() {
            tracing::warn!("GeofenceMonitor already running");
            return Ok(true);
        }

        let Some(boundary_id) = self.boundary().map(|b| b.id().to_string()) else {
            tracing::info!("no boundary selected, monitoring not started");
            return Ok(false);
        };

        self.shared.set_lifecycle(Lifecycle::PermissionPending);
        if !ensure_permission(self.permissions.as_ref(), PermissionKind::Foreground).await {
            self.shared.set_lifecycle(Lifecycle::Idle);
            return Ok(false);
        }

        let initial = self.fetch_position().await;
        if matches!(initial, Err(LocationError::Cancelled)) {
            tracing::info!("monitoring start cancelled");
            self.shared.set_lifecycle(Lifecycle::Idle);
            return Ok(false);
        }

        let (sender, receiver) = waypost_bus::channel(
            LocationBusConfig {
                capacity: self.config.sample_buffer,
            },
            Arc::clone(&self.shared.stats),
        );
        let options = self.config.watch_options();

        let foreground = match self
            .positions
            .watch_position(options, sender.sink(SampleChannel::Foreground))
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(error = %e, "failed to start foreground location updates");
                self.shared.set_lifecycle(Lifecycle::Idle);
                return Err(MonitorError::Subscription(e));
            }
        };

        let mut background_task = None;
        if let Some(background) = self.background_channel() {
            if ensure_permission(self.permissions.as_ref(), PermissionKind::Background).await {
                let task_id = self.config.background_task_id.clone();
                if let Err(e) = background
                    .start_background_updates(&task_id, options, sender.sink(SampleChannel::Background))
                    .await
                {
                    tracing::warn!(error = %e, "failed to register background location delivery");
                    foreground.remove();
                    self.shared.set_lifecycle(Lifecycle::Idle);
                    return Err(MonitorError::BackgroundRegistration(e));
                }
                background_task = Some(task_id);
            } else {
                tracing::info!("background permission denied, foreground sampling only");
            }
        }
        drop(sender);

        let session_id = self.shared.activate();
        match initial {
            Ok(location) => {
                self.shared.apply(SampleChannel::OneShot, location, true);
            }
            Err(e) => {
                self.shared.stats.increment_location_errors();
                tracing::warn!(error = %e, "initial position unavailable, status unknown");
            }
        }

        let cancel = CancellationToken::new();
        let classifier = tokio::spawn(run_classifier(
            Arc::clone(&self.shared),
            receiver,
            cancel.child_token(),
        ));

        tracing::info!(
            boundary = %boundary_id,
            %session_id,
            background = background_task.is_some(),
            interval_ms = self.config.time_interval_ms,
            distance_interval_m = self.config.distance_interval_m,
            "geofence monitoring started"
        );

        *control = Some(ActiveSession {
            foreground,
            background_task,
            cancel,
            classifier,
        });
        Ok(true)
    }

    /// Stop monitoring and reset state. Safe to call when not monitoring.
    pub async fn stop_monitoring(&self) {
        self.cancel_pending_fetch();

        let mut control = self.control.lock().await;
        self.stop_locked(&mut control).await;
    }

    /// Stop monitoring, then wait for every queued callback to finish.
    ///
    /// Transitions detected before this call are always delivered.
    pub async fn shutdown(mut self) {
        self.stop_monitoring().await;
        if let Some(dispatcher) = self.close_dispatcher() {
            match tokio::task::spawn_blocking(move || dispatcher.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => tracing::warn!("callback dispatcher panicked"),
                Err(e) => tracing::warn!(error = %e, "failed to join callback dispatcher"),
            }
        }
    }

    /// Tear down the active session. The caller holds the control lock.
    async fn stop_locked(&self, control: &mut Option<ActiveSession>) {
        self.shared.deactivate();

        let Some(active) = control.take() else {
            tracing::debug!("stop_monitoring called while idle");
            return;
        };

        active.cancel.cancel();
        active.foreground.remove();

        if let (Some(task_id), Some(background)) = (active.background_task, self.background.as_ref()) {
            if let Err(e) = background.stop_background_updates(&task_id).await {
                tracing::warn!(error = %e, task_id = %task_id, "failed to stop background location delivery");
            }
        }

        if let Err(e) = active.classifier.await {
            tracing::warn!(error = %e, "classifier task ended abnormally");
        }

        tracing::info!("geofence monitoring stopped");
    }

    /// Classify a fresh fix right now.
    ///
    /// Leaves subscriptions alone. Fires callbacks like any other sample.
    /// Returns `Unknown` when no boundary is selected or the fix fails; in
    /// the failure case the published state is left untouched.
    pub async fn check_status_now(&self) -> Status {
        if !self.shared.has_boundary() {
            tracing::debug!("check_status_now without a boundary");
            return Status::Unknown;
        }

        match self.fetch_position().await {
            Ok(location) => self.shared.apply(SampleChannel::OneShot, location, false),
            Err(e) => {
                self.shared.stats.increment_location_errors();
                tracing::warn!(error = %e, "position fetch failed, status unknown");
                Status::Unknown
            }
        }
    }

    fn background_channel(&self) -> Option<&Arc<dyn BackgroundDelivery>> {
        if !self.config.background_enabled {
            return None;
        }
        self.background.as_ref()
    }

    /// One-shot fetch bounded by the configured timeout and by `stop_monitoring`.
    async fn fetch_position(&self) -> std::result::Result<Location, LocationError> {
        let token = self.fetch_token();
        let fetch = tokio::time::timeout(
            self.config.position_timeout(),
            self.positions.current_position(self.config.accuracy),
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(LocationError::Cancelled),
            result = fetch => result.unwrap_or(Err(LocationError::Timeout)),
        }
    }

    fn fetch_token(&self) -> CancellationToken {
        self.fetch_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token()
    }

    fn cancel_pending_fetch(&self) {
        let mut token = self.fetch_cancel.lock().unwrap_or_else(PoisonError::into_inner);
        token.cancel();
        *token = CancellationToken::new();
    }

    fn close_dispatcher(&mut self) -> Option<std::thread::JoinHandle<()>> {
        self.shared.close_dispatch();
        self.dispatcher.take()
    }
}

impl Drop for GeofenceMonitor {
    fn drop(&mut self) {
        self.cancel_pending_fetch();
        if let Some(active) = self.control.get_mut().take() {
            active.cancel.cancel();
            if let Some(task_id) = active.background_task {
                tracing::warn!(task_id = %task_id, "GeofenceMonitor dropped while active, background task left registered");
            }
        }
        if let Some(dispatcher) = self.close_dispatcher() {
            // A callback may hold the last handle to the monitor.
            if dispatcher.thread().id() != std::thread::current().id() {
                let _ = dispatcher.join();
            }
        }
    }
}

async fn run_classifier(shared: Arc<Shared>, mut receiver: LocationBusReceiver, cancel: CancellationToken) {
    tracing::debug!("geofence classifier started");
    let mut samples = 0u64;

    loop {
        let sample = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sample = receiver.recv() => sample,
        };

        let Some(sample) = sample else {
            tracing::info!("location stream closed");
            break;
        };

        shared.apply(sample.channel, sample.location, true);
        samples += 1;
    }

    receiver.close();
    tracing::debug!(samples, gaps = receiver.gaps_detected(), "geofence classifier stopped");
}

fn run_dispatcher(events: crossbeam_channel::Receiver<TransitionEvent>, callbacks: TransitionCallbacks) {
    tracing::debug!("transition dispatcher started");
    for event in events.iter() {
        callbacks.invoke(event);
    }
    tracing::debug!("transition dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypost_permissions::StaticPermissions;

    fn monitor() -> GeofenceMonitor {
        GeofenceMonitor::new(
            MonitorConfig::default(),
            Arc::new(crate::provider::NullProvider),
            Arc::new(StaticPermissions::granted()),
            TransitionCallbacks::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_new_monitor_is_idle() {
        let monitor = monitor();
        let state = monitor.state();
        assert_eq!(state.status, Status::Unknown);
        assert!(!state.is_monitoring);
        assert_eq!(state.lifecycle, Lifecycle::Idle);
        assert!(monitor.boundary().is_none());
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_harmless() {
        let monitor = monitor();
        monitor.stop_monitoring().await;
        monitor.stop_monitoring().await;
        assert!(!monitor.is_monitoring());
    }

    #[tokio::test]
    async fn test_start_without_boundary_is_noop() {
        let monitor = monitor();
        assert!(!monitor.start_monitoring().await.unwrap());
        assert_eq!(monitor.lifecycle(), Lifecycle::Idle);
    }

    #[tokio::test]
    async fn test_invalid_boundary_rejected() {
        let monitor = monitor();
        let bad = Boundary::circle("bad", waypost_geo::Coordinate::new(0.0, 0.0), -1.0);
        assert!(matches!(
            monitor.set_boundary(Some(bad)).await,
            Err(MonitorError::InvalidGeometry(_))
        ));
        assert!(monitor.boundary().is_none());
    }

    #[tokio::test]
    async fn test_check_now_without_boundary_is_unknown() {
        let monitor = monitor();
        assert_eq!(monitor.check_status_now().await, Status::Unknown);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MonitorConfig {
            sample_buffer: 0,
            ..MonitorConfig::default()
        };
        let result = GeofenceMonitor::new(
            config,
            Arc::new(crate::provider::NullProvider),
            Arc::new(StaticPermissions::granted()),
            TransitionCallbacks::new(),
        );
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_callback_panic_is_contained() {
        let callbacks = TransitionCallbacks::new().on_enter(|_| panic!("boom"));
        let event = TransitionEvent {
            transition: Transition::Enter,
            boundary_id: "start".into(),
            session_id: Uuid::new_v4(),
            location: Location::new(0.0, 0.0, 0),
            distance_m: 0.0,
            channel: SampleChannel::OneShot,
            seq: 0,
            detected_at: Instant::now(),
        };
        callbacks.invoke(event);
    }
}
