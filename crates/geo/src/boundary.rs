//! Boundary shapes.

use crate::coordinate::Coordinate;
use crate::error::GeometryError;
use serde::{Deserialize, Serialize};

/// A GeoJSON position: `[lon, lat]`.
pub type Position = [f64; 2];

/// Smallest closed ring: a triangle plus the repeated first point.
pub const MIN_RING_POINTS: usize = 4;

/// Circular geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleFence {
    pub id: String,
    pub center: Coordinate,
    pub radius_m: f64,
}

/// Polygonal geofence in GeoJSON ring layout.
///
/// `rings[0]` is the exterior; any further rings are holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonFence {
    pub id: String,
    pub rings: Vec<Vec<Position>>,
}

/// A geographic region that drives enter/exit transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Boundary {
    Circle(CircleFence),
    Polygon(PolygonFence),
}

impl Boundary {
    pub fn circle(id: impl Into<String>, center: Coordinate, radius_m: f64) -> Self {
        Boundary::Circle(CircleFence {
            id: id.into(),
            center,
            radius_m,
        })
    }

    pub fn polygon(id: impl Into<String>, rings: Vec<Vec<Position>>) -> Self {
        Boundary::Polygon(PolygonFence {
            id: id.into(),
            rings,
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Boundary::Circle(c) => &c.id,
            Boundary::Polygon(p) => &p.id,
        }
    }

    /// Representative point for display: the circle center, or the mean of
    /// the exterior ring's distinct vertices.
    pub fn centroid(&self) -> Option<Coordinate> {
        match self {
            Boundary::Circle(c) => Some(c.center),
            Boundary::Polygon(p) => {
                let exterior = p.rings.first()?;
                // Closed rings repeat the first point; don't count it twice.
                let distinct = match exterior.len() {
                    0 => return None,
                    n if n > 1 && exterior[0] == exterior[n - 1] => &exterior[..n - 1],
                    _ => &exterior[..],
                };
                let n = distinct.len() as f64;
                let (lon, lat) = distinct
                    .iter()
                    .fold((0.0, 0.0), |(lon, lat), pos| (lon + pos[0], lat + pos[1]));
                Some(Coordinate::new(lat / n, lon / n))
            }
        }
    }

    /// Check the shape invariants.
    ///
    /// Circles need a positive finite radius and an in-range center. Polygons
    /// need at least one ring, and every ring must be closed with at least
    /// [`MIN_RING_POINTS`] in-range positions.
    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            Boundary::Circle(c) => c.validate(),
            Boundary::Polygon(p) => p.validate(),
        }
    }
}

impl CircleFence {
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !self.center.in_range() {
            return Err(GeometryError::CoordinateOutOfRange {
                id: self.id.clone(),
                lat: self.center.lat,
                lon: self.center.lon,
            });
        }
        if !(self.radius_m.is_finite() && self.radius_m > 0.0) {
            return Err(GeometryError::InvalidRadius {
                id: self.id.clone(),
                radius_m: self.radius_m,
            });
        }
        Ok(())
    }
}

impl From<CircleFence> for Boundary {
    fn from(circle: CircleFence) -> Self {
        Boundary::Circle(circle)
    }
}

impl From<PolygonFence> for Boundary {
    fn from(polygon: PolygonFence) -> Self {
        Boundary::Polygon(polygon)
    }
}

impl PolygonFence {
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.rings.is_empty() {
            return Err(GeometryError::NoRings {
                id: self.id.clone(),
            });
        }
        for (ring_idx, ring) in self.rings.iter().enumerate() {
            if ring.len() < MIN_RING_POINTS {
                return Err(GeometryError::RingTooShort {
                    id: self.id.clone(),
                    ring: ring_idx,
                    points: ring.len(),
                    min: MIN_RING_POINTS,
                });
            }
            if let Some(bad) = ring
                .iter()
                .map(|pos| Coordinate::from_lon_lat(*pos))
                .find(|c| !c.in_range())
            {
                return Err(GeometryError::CoordinateOutOfRange {
                    id: self.id.clone(),
                    lat: bad.lat,
                    lon: bad.lon,
                });
            }
            if ring.first() != ring.last() {
                return Err(GeometryError::RingNotClosed {
                    id: self.id.clone(),
                    ring: ring_idx,
                });
            }
        }
        Ok(())
    }

    /// Planar `geo` polygon with x = lon, y = lat.
    pub(crate) fn to_geo(&self) -> Option<geo::Polygon<f64>> {
        let mut rings = self.rings.iter().map(|ring| to_line_string(ring));
        let exterior = rings.next()?;
        Some(geo::Polygon::new(exterior, rings.collect()))
    }
}

fn to_line_string(ring: &[Position]) -> geo::LineString<f64> {
    geo::LineString::from(
        ring.iter()
            .map(|pos| (pos[0], pos[1]))
            .collect::<Vec<(f64, f64)>>(),
    )
}
