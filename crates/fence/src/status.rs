//! Inside/outside status and transition detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waypost_geo::{distance_to, edge_distance, is_inside, Boundary, Coordinate};

/// Classification of the participant relative to the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing classified yet, or the last fetch failed.
    #[default]
    Unknown,
    Inside,
    Outside,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Inside => "inside",
            Status::Outside => "outside",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Enter,
    Exit,
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Enter => f.write_str("enter"),
            Transition::Exit => f.write_str("exit"),
        }
    }
}

/// Result of classifying one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub status: Status,
    pub transition: Option<Transition>,
    pub distance_m: f64,
}

/// Debounced transition detector.
///
/// Remembers the last status it produced, separately from whatever the
/// controller publishes, so a crossing is reported once no matter how many
/// times the same position is classified.
///
/// Transition rules:
/// - `Unknown -> Inside` fires `Enter` (already inside when monitoring starts)
/// - `Outside -> Inside` fires `Enter`
/// - `Inside -> Outside` fires `Exit`
/// - `Unknown -> Outside` fires nothing: the participant never was inside
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    remembered: Status,
    hysteresis_m: f64,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `Inside` until a sample is more than `hysteresis_m` beyond the edge.
    ///
    /// Non-finite or negative values disable the band.
    pub fn with_hysteresis(hysteresis_m: f64) -> Self {
        Self {
            remembered: Status::Unknown,
            hysteresis_m: if hysteresis_m.is_finite() {
                hysteresis_m.max(0.0)
            } else {
                0.0
            },
        }
    }

    pub fn remembered(&self) -> Status {
        self.remembered
    }

    pub fn hysteresis_m(&self) -> f64 {
        self.hysteresis_m
    }

    pub fn reset(&mut self) {
        self.remembered = Status::Unknown;
    }

    pub fn classify(&mut self, point: Coordinate, boundary: &Boundary) -> Classification {
        let distance_m = distance_to(point, boundary);
        let inside = is_inside(point, boundary) || self.within_exit_band(point, boundary, distance_m);
        let status = if inside { Status::Inside } else { Status::Outside };

        let transition = match (self.remembered, status) {
            (previous, Status::Inside) if previous != Status::Inside => Some(Transition::Enter),
            (Status::Inside, Status::Outside) => Some(Transition::Exit),
            _ => None,
        };
        self.remembered = status;

        Classification {
            status,
            transition,
            distance_m,
        }
    }

    fn within_exit_band(&self, point: Coordinate, boundary: &Boundary, distance_m: f64) -> bool {
        if self.remembered != Status::Inside || self.hysteresis_m <= 0.0 {
            return false;
        }
        match boundary {
            Boundary::Circle(c) => distance_m <= c.radius_m + self.hysteresis_m,
            Boundary::Polygon(_) => edge_distance(point, boundary) <= self.hysteresis_m,
        }
    }
}

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Idle,
    PermissionPending,
    Active,
}

/// Public monitoring state. Observers only ever see copies of this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MonitorState {
    pub status: Status,
    /// Last computed distance to the boundary in meters.
    pub distance_m: Option<f64>,
    pub last_checked: Option<DateTime<Utc>>,
    pub is_monitoring: bool,
    pub lifecycle: Lifecycle,
    /// Id of the boundary being tracked, if one is selected.
    pub boundary_id: Option<String>,
}

impl MonitorState {
    pub fn for_boundary(boundary_id: Option<String>) -> Self {
        Self {
            boundary_id,
            ..Self::default()
        }
    }

    /// Clear per-session fields, keeping the selected boundary.
    pub fn reset(&mut self) {
        *self = Self::for_boundary(self.boundary_id.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypost_geo::EARTH_RADIUS_M;

    const CENTER: Coordinate = Coordinate::new(52.3676, 4.9041);
    const FAR: Coordinate = Coordinate::new(52.3776, 4.9041);

    fn fence() -> Boundary {
        Boundary::circle("start", CENTER, 100.0)
    }

    fn north_of(meters: f64) -> Coordinate {
        let d_lat = (meters / EARTH_RADIUS_M).to_degrees();
        Coordinate::new(CENTER.lat + d_lat, CENTER.lon)
    }

    #[test]
    fn test_initial_inside_fires_enter() {
        let mut tracker = StatusTracker::new();
        let c = tracker.classify(CENTER, &fence());
        assert_eq!(c.status, Status::Inside);
        assert_eq!(c.transition, Some(Transition::Enter));
    }

    #[test]
    fn test_initial_outside_fires_nothing() {
        let mut tracker = StatusTracker::new();
        let c = tracker.classify(FAR, &fence());
        assert_eq!(c.status, Status::Outside);
        assert_eq!(c.transition, None);
        assert_eq!(tracker.remembered(), Status::Outside);
    }

    #[test]
    fn test_repeated_classification_is_idempotent() {
        let mut tracker = StatusTracker::new();
        let first = tracker.classify(CENTER, &fence());
        let second = tracker.classify(CENTER, &fence());
        assert_eq!(first.status, second.status);
        assert_eq!(first.transition, Some(Transition::Enter));
        assert_eq!(second.transition, None);
    }

    #[test]
    fn test_transition_sequence() {
        let mut tracker = StatusTracker::new();
        let path = [FAR, FAR, CENTER, CENTER, FAR];
        let transitions: Vec<_> = path
            .iter()
            .filter_map(|p| tracker.classify(*p, &fence()).transition)
            .collect();
        assert_eq!(transitions, vec![Transition::Enter, Transition::Exit]);
    }

    #[test]
    fn test_every_flip_toggles_without_hysteresis() {
        let mut tracker = StatusTracker::new();
        let fence = fence();
        tracker.classify(north_of(99.0), &fence);
        assert_eq!(
            tracker.classify(north_of(101.0), &fence).transition,
            Some(Transition::Exit)
        );
        assert_eq!(
            tracker.classify(north_of(99.0), &fence).transition,
            Some(Transition::Enter)
        );
    }

    #[test]
    fn test_hysteresis_suppresses_edge_flapping() {
        let mut tracker = StatusTracker::with_hysteresis(20.0);
        let fence = fence();

        assert_eq!(
            tracker.classify(north_of(90.0), &fence).transition,
            Some(Transition::Enter)
        );
        // Inside the 20 m band: still inside.
        let c = tracker.classify(north_of(115.0), &fence);
        assert_eq!(c.status, Status::Inside);
        assert_eq!(c.transition, None);
        // Beyond the band: exit.
        assert_eq!(
            tracker.classify(north_of(125.0), &fence).transition,
            Some(Transition::Exit)
        );
        // The band only applies on the way out.
        let c = tracker.classify(north_of(110.0), &fence);
        assert_eq!(c.status, Status::Outside);
    }

    #[test]
    fn test_hysteresis_on_polygon() {
        let square = Boundary::polygon(
            "sq",
            vec![vec![[0.0, 0.0], [0.01, 0.0], [0.01, 0.01], [0.0, 0.01], [0.0, 0.0]]],
        );
        let mut tracker = StatusTracker::with_hysteresis(50.0);
        tracker.classify(Coordinate::new(0.005, 0.005), &square);

        // ~11 m east of the right edge.
        let c = tracker.classify(Coordinate::new(0.005, 0.0101), &square);
        assert_eq!(c.status, Status::Inside);

        // ~111 m east of the right edge.
        let c = tracker.classify(Coordinate::new(0.005, 0.011), &square);
        assert_eq!(c.transition, Some(Transition::Exit));
    }

    #[test]
    fn test_invalid_hysteresis_disables_band() {
        assert_eq!(StatusTracker::with_hysteresis(-3.0).hysteresis_m(), 0.0);
        assert_eq!(StatusTracker::with_hysteresis(f64::NAN).hysteresis_m(), 0.0);
    }

    #[test]
    fn test_reset_forgets_status() {
        let mut tracker = StatusTracker::new();
        tracker.classify(CENTER, &fence());
        tracker.reset();
        assert_eq!(tracker.remembered(), Status::Unknown);
        assert_eq!(
            tracker.classify(CENTER, &fence()).transition,
            Some(Transition::Enter)
        );
    }

    #[test]
    fn test_distance_reported() {
        let mut tracker = StatusTracker::new();
        let c = tracker.classify(FAR, &fence());
        assert!((c.distance_m - 1110.0).abs() < 1110.0 * 0.05);
    }

    #[test]
    fn test_monitor_state_reset_keeps_boundary() {
        let mut state = MonitorState::for_boundary(Some("start".into()));
        state.status = Status::Inside;
        state.is_monitoring = true;
        state.distance_m = Some(12.0);
        state.reset();
        assert_eq!(state, MonitorState::for_boundary(Some("start".into())));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Inside).unwrap(), "\"inside\"");
        assert_eq!(
            serde_json::to_string(&Lifecycle::PermissionPending).unwrap(),
            "\"permission_pending\""
        );
    }
}
