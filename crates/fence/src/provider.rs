//! Provider traits for position delivery.
//!
//! These traits abstract the platform's location services so the
//! monitoring logic stays testable without a device.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use waypost_bus::{Location, LocationSink};

/// Failure to obtain a position fix or start a position stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location services unavailable: {0}")]
    Unavailable(String),

    #[error("timed out waiting for a position fix")]
    Timeout,

    #[error("position request cancelled")]
    Cancelled,

    #[error("location updates could not be started: {0}")]
    Subscription(String),
}

/// Requested fix accuracy, mirroring the platform presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    Lowest,
    Low,
    #[default]
    Balanced,
    High,
    Highest,
    BestForNavigation,
}

/// Sampling parameters shared by the foreground and background channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    /// Minimum time between samples.
    pub time_interval: Duration,
    /// Minimum movement between samples, in meters.
    pub distance_interval_m: f64,
    pub accuracy: Accuracy,
}

/// Handle for an active foreground position stream.
///
/// The stream is torn down by [`Subscription::remove`] or on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Subscription {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn remove(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Foreground location services.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Fetch a single fix.
    async fn current_position(&self, accuracy: Accuracy) -> Result<Location, LocationError>;

    /// Start a continuous stream that pushes every fix into `sink`.
    async fn watch_position(
        &self,
        options: WatchOptions,
        sink: LocationSink,
    ) -> Result<Subscription, LocationError>;
}

/// OS-managed background location delivery.
///
/// The platform wakes a registered task with batches of fixes; the
/// implementation forwards them with [`LocationSink::deliver_batch`].
#[async_trait]
pub trait BackgroundDelivery: Send + Sync {
    async fn start_background_updates(
        &self,
        task_id: &str,
        options: WatchOptions,
        sink: LocationSink,
    ) -> Result<(), LocationError>;

    async fn stop_background_updates(&self, task_id: &str) -> Result<(), LocationError>;
}

/// Null implementation for unsupported platforms.
pub struct NullProvider;

#[async_trait]
impl PositionSource for NullProvider {
    async fn current_position(&self, _accuracy: Accuracy) -> Result<Location, LocationError> {
        Err(LocationError::Unavailable("no location provider".into()))
    }

    async fn watch_position(
        &self,
        _options: WatchOptions,
        _sink: LocationSink,
    ) -> Result<Subscription, LocationError> {
        Err(LocationError::Subscription("no location provider".into()))
    }
}

#[async_trait]
impl BackgroundDelivery for NullProvider {
    async fn start_background_updates(
        &self,
        _task_id: &str,
        _options: WatchOptions,
        _sink: LocationSink,
    ) -> Result<(), LocationError> {
        Err(LocationError::Subscription(
            "background delivery not supported".into(),
        ))
    }

    async fn stop_background_updates(&self, _task_id: &str) -> Result<(), LocationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_subscription_cancels_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let sub = Subscription::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        sub.remove();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_cancels_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        {
            let _sub = Subscription::new(move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_null_provider_fails() {
        let provider = NullProvider;
        assert!(matches!(
            provider.current_position(Accuracy::High).await,
            Err(LocationError::Unavailable(_))
        ));
    }

    #[test]
    fn test_accuracy_json() {
        let a: Accuracy = serde_json::from_str("\"best_for_navigation\"").unwrap();
        assert_eq!(a, Accuracy::BestForNavigation);
        assert_eq!(Accuracy::default(), Accuracy::Balanced);
    }
}
