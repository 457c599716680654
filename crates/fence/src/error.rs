use crate::provider::LocationError;
use serde::{Serialize, Serializer};
use waypost_geo::GeometryError;

/// Errors surfaced by the monitoring controller.
///
/// A denied permission or a missing boundary is not an error; those come
/// back as `Ok(false)` from `start_monitoring`.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Invalid boundary: {0}")]
    InvalidGeometry(#[from] GeometryError),

    #[error("Foreground location updates failed to start: {0}")]
    Subscription(LocationError),

    #[error("Background location delivery failed to register: {0}")]
    BackgroundRegistration(LocationError),

    #[error("Invalid monitor configuration: {0}")]
    Config(String),

    #[error("Callback dispatcher failed to start: {0}")]
    Dispatcher(#[from] std::io::Error),
}

impl Serialize for MonitorError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
