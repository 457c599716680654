//! Monitor configuration.

use crate::error::MonitorError;
use crate::provider::{Accuracy, WatchOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default minimum time between samples.
pub const DEFAULT_TIME_INTERVAL: Duration = Duration::from_secs(30);

/// Default minimum movement between samples, in meters.
pub const DEFAULT_DISTANCE_INTERVAL_M: f64 = 50.0;

/// Default task id for background delivery registration.
pub const DEFAULT_BACKGROUND_TASK_ID: &str = "waypost-geofence-monitor";

/// Tuning for a [`GeofenceMonitor`](crate::GeofenceMonitor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub time_interval_ms: u64,
    pub distance_interval_m: f64,
    pub accuracy: Accuracy,
    /// Register OS background delivery when background permission is granted.
    pub background_enabled: bool,
    pub background_task_id: String,
    /// Upper bound on a one-shot fix; exceeding it counts as unavailable.
    pub position_timeout_ms: u64,
    /// Queue capacity of the classification stream.
    pub sample_buffer: usize,
    /// Exit hysteresis in meters. 0 disables it.
    pub hysteresis_m: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            time_interval_ms: DEFAULT_TIME_INTERVAL.as_millis() as u64,
            distance_interval_m: DEFAULT_DISTANCE_INTERVAL_M,
            accuracy: Accuracy::Balanced,
            background_enabled: true,
            background_task_id: DEFAULT_BACKGROUND_TASK_ID.to_string(),
            position_timeout_ms: 15_000,
            sample_buffer: waypost_bus::DEFAULT_CAPACITY,
            hysteresis_m: 0.0,
        }
    }
}

impl MonitorConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, MonitorError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MonitorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.time_interval_ms == 0 {
            return Err(MonitorError::Config(
                "time_interval_ms must be greater than zero".into(),
            ));
        }
        if !(self.distance_interval_m.is_finite() && self.distance_interval_m >= 0.0) {
            return Err(MonitorError::Config(format!(
                "distance_interval_m must be a non-negative number (got {})",
                self.distance_interval_m
            )));
        }
        if self.position_timeout_ms == 0 {
            return Err(MonitorError::Config(
                "position_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.sample_buffer == 0 {
            return Err(MonitorError::Config(
                "sample_buffer must be greater than zero".into(),
            ));
        }
        if !(self.hysteresis_m.is_finite() && self.hysteresis_m >= 0.0) {
            return Err(MonitorError::Config(format!(
                "hysteresis_m must be a non-negative number (got {})",
                self.hysteresis_m
            )));
        }
        if self.background_enabled && self.background_task_id.trim().is_empty() {
            return Err(MonitorError::Config(
                "background_task_id must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn time_interval(&self) -> Duration {
        Duration::from_millis(self.time_interval_ms)
    }

    pub fn position_timeout(&self) -> Duration {
        Duration::from_millis(self.position_timeout_ms)
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            time_interval: self.time_interval(),
            distance_interval_m: self.distance_interval_m,
            accuracy: self.accuracy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.time_interval(), Duration::from_secs(30));
        assert_eq!(config.distance_interval_m, 50.0);
        assert!(config.background_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            MonitorConfig::from_json_str(r#"{"time_interval_ms": 5000, "accuracy": "high"}"#)
                .unwrap();
        assert_eq!(config.time_interval(), Duration::from_secs(5));
        assert_eq!(config.accuracy, Accuracy::High);
        assert_eq!(config.distance_interval_m, DEFAULT_DISTANCE_INTERVAL_M);
        assert_eq!(config.background_task_id, DEFAULT_BACKGROUND_TASK_ID);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = MonitorConfig::from_json_str(r#"{"time_interval_ms": 0}"#).unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }

    #[test]
    fn test_rejects_negative_hysteresis() {
        let config = MonitorConfig {
            hysteresis_m: -1.0,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            MonitorConfig::from_json_str("{not json"),
            Err(MonitorError::Config(_))
        ));
    }

    #[test]
    fn test_watch_options() {
        let options = MonitorConfig::default().watch_options();
        assert_eq!(options.time_interval, DEFAULT_TIME_INTERVAL);
        assert_eq!(options.distance_interval_m, DEFAULT_DISTANCE_INTERVAL_M);
        assert_eq!(options.accuracy, Accuracy::Balanced);
    }
}
