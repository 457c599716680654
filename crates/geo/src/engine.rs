//! Distance and containment against a boundary.

use crate::boundary::{Boundary, PolygonFence};
use crate::coordinate::{haversine_m, Coordinate};
use geo::{Closest, ClosestPoint, Coord, Intersects, LineString, Point};

/// Distance in meters from `point` to `boundary`.
///
/// - Circle: great-circle distance to the center.
/// - Polygon: great-circle distance to the nearest point on any ring edge
///   (see [`edge_distance`]). 0 when the polygon has no rings.
pub fn distance_to(point: Coordinate, boundary: &Boundary) -> f64 {
    match boundary {
        Boundary::Circle(c) => haversine_m(point, c.center),
        Boundary::Polygon(p) => polygon_edge_distance(point, p),
    }
}

/// Whether `point` lies inside `boundary`. Points exactly on the edge are inside.
///
/// - Circle: `distance_to(point) <= radius_m`.
/// - Polygon: exterior ring minus holes. A point on any ring edge (including
///   a hole's edge) counts as inside.
pub fn is_inside(point: Coordinate, boundary: &Boundary) -> bool {
    match boundary {
        Boundary::Circle(c) => haversine_m(point, c.center) <= c.radius_m,
        Boundary::Polygon(p) => match p.to_geo() {
            Some(polygon) => polygon.intersects(&point.to_point()),
            None => false,
        },
    }
}

/// Distance in meters from `point` to the nearest edge of `boundary`.
///
/// For circles this is `|distance to center - radius|`. For polygons the
/// nearest point is found in a local equirectangular frame centered on
/// `point` (longitude scaled by `cos(lat)`) and then measured with
/// Haversine. The frame distorts with distance from `point`, so the result
/// is exact for nearby edges and approximate for edges tens of kilometers
/// away. Rings crossing the antimeridian are not handled.
pub fn edge_distance(point: Coordinate, boundary: &Boundary) -> f64 {
    match boundary {
        Boundary::Circle(c) => (haversine_m(point, c.center) - c.radius_m).abs(),
        Boundary::Polygon(p) => polygon_edge_distance(point, p),
    }
}

/// Distance to the first vertex of the exterior ring (circles: to the center).
///
/// Cheap reference number kept for consumers that display it; prefer
/// [`distance_to`]. 0 when the exterior ring is empty.
pub fn reference_vertex_distance(point: Coordinate, boundary: &Boundary) -> f64 {
    match boundary {
        Boundary::Circle(c) => haversine_m(point, c.center),
        Boundary::Polygon(p) => p
            .rings
            .first()
            .and_then(|ring| ring.first())
            .map(|pos| haversine_m(point, Coordinate::from_lon_lat(*pos)))
            .unwrap_or(0.0),
    }
}

/// Smallest `cos(lat)` used for scaling, so polar points don't divide by zero.
const MIN_LON_SCALE: f64 = 1e-9;

fn polygon_edge_distance(point: Coordinate, polygon: &PolygonFence) -> f64 {
    let scale = point.lat.to_radians().cos().max(MIN_LON_SCALE);
    let project = |pos: &[f64; 2]| Coord {
        x: (pos[0] - point.lon) * scale,
        y: pos[1] - point.lat,
    };
    let origin = Point::new(0.0, 0.0);

    polygon
        .rings
        .iter()
        .map(|ring| LineString::new(ring.iter().map(project).collect()))
        .filter_map(|ring| match ring.closest_point(&origin) {
            Closest::Intersection(p) | Closest::SinglePoint(p) => Some(haversine_m(
                point,
                Coordinate::new(point.lat + p.y(), point.lon + p.x() / scale),
            )),
            Closest::Indeterminate => None,
        })
        .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.min(d))))
        .unwrap_or(0.0)
}
