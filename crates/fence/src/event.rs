//! Event model as supplied by the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waypost_geo::{Boundary, CircleFence, Coordinate, GeometryError};

/// Role of a boundary within an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Start,
    Checkpoint,
    Finish,
}

impl BoundaryKind {
    pub fn label(&self) -> &'static str {
        match self {
            BoundaryKind::Start => "start",
            BoundaryKind::Checkpoint => "checkpoint",
            BoundaryKind::Finish => "finish",
        }
    }
}

impl std::fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A circular boundary as the backend describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendBoundary {
    pub kind: BoundaryKind,
    pub lat: f64,
    pub lon: f64,
    pub radius_m: f64,
    #[serde(default)]
    pub name: Option<String>,
}

impl BackendBoundary {
    /// `"<kind>"`, or `"<kind>:<name>"` for named boundaries.
    pub fn fence_id(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => format!("{}:{}", self.kind, name),
            _ => self.kind.to_string(),
        }
    }

    pub fn to_circle(&self) -> CircleFence {
        CircleFence {
            id: self.fence_id(),
            center: Coordinate::new(self.lat, self.lon),
            radius_m: self.radius_m,
        }
    }
}

/// A participation event with its boundaries and time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub start_time: DateTime<Utc>,
    /// Open-ended when absent.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub boundaries: Vec<BackendBoundary>,
}

impl Event {
    /// Active iff `start_time <= now` and `now <= end_time` (when set).
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time && self.end_time.map_or(true, |end| now <= end)
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// The boundary that should drive monitoring for this event.
    pub fn primary_boundary(&self) -> Result<Option<Boundary>, GeometryError> {
        Ok(crate::selector::select_primary(&self.boundaries)?.map(Boundary::from))
    }
}
