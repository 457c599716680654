//! Geometry validation errors.

use thiserror::Error;

/// A boundary that violates its shape invariants.
///
/// This always points at malformed upstream data; callers should surface it
/// rather than classify against the broken shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("boundary {id}: radius must be a positive finite number of meters (got {radius_m})")]
    InvalidRadius { id: String, radius_m: f64 },

    #[error("boundary {id}: coordinate ({lat}, {lon}) is out of range")]
    CoordinateOutOfRange { id: String, lat: f64, lon: f64 },

    #[error("boundary {id}: polygon has no rings")]
    NoRings { id: String },

    #[error("boundary {id}: ring {ring} has {points} points, at least {min} required")]
    RingTooShort {
        id: String,
        ring: usize,
        points: usize,
        min: usize,
    },

    #[error("boundary {id}: ring {ring} is not closed (first point must equal last point)")]
    RingNotClosed { id: String, ring: usize },
}
