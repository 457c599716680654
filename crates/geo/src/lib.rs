//! Geofence geometry for waypost.
//!
//! Pure functions only: no state, no I/O. Everything here is safe to call
//! from any thread and returns the same answer for the same input.
//!
//! Two boundary shapes are supported:
//! - `Circle`: a center coordinate plus a radius in meters
//! - `Polygon`: GeoJSON-style rings of `[lon, lat]` positions, first ring
//!   is the exterior, the rest are holes
//!
//! # Example
//!
//! ```
//! use waypost_geo::{distance_to, is_inside, Boundary, Coordinate};
//!
//! let fence = Boundary::circle("start", Coordinate::new(52.3676, 4.9041), 100.0);
//! let here = Coordinate::new(52.3676, 4.9041);
//!
//! assert!(is_inside(here, &fence));
//! assert!(distance_to(here, &fence) < 1e-6);
//! ```

mod boundary;
mod coordinate;
mod engine;
mod error;

pub use boundary::{Boundary, CircleFence, PolygonFence, Position, MIN_RING_POINTS};
pub use coordinate::{haversine_m, Coordinate, EARTH_RADIUS_M};
pub use engine::{distance_to, edge_distance, is_inside, reference_vertex_distance};
pub use error::GeometryError;
