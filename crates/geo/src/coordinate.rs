//! Geographic coordinates and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters used for all great-circle math.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build from a GeoJSON `[lon, lat]` position.
    pub const fn from_lon_lat(position: [f64; 2]) -> Self {
        Self {
            lat: position[1],
            lon: position[0],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180].
    pub fn in_range(&self) -> bool {
        self.is_finite() && (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    pub(crate) fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}

/// Great-circle distance between two coordinates in meters (Haversine).
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lon - a.lon).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1.0 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = Coordinate::new(52.3676, 4.9041);
        assert_eq!(haversine_m(p, p), 0.0);
    }

    #[test]
    fn test_haversine_one_hundredth_degree_north() {
        let a = Coordinate::new(52.3676, 4.9041);
        let b = Coordinate::new(52.3776, 4.9041);
        let d = haversine_m(a, b);
        // 0.01 degrees of latitude on a 6,371 km sphere.
        assert!((d - 1111.95).abs() < 0.1, "got {}", d);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = Coordinate::new(-33.8688, 151.2093);
        let b = Coordinate::new(51.5074, -0.1278);
        assert!((haversine_m(a, b) - haversine_m(b, a)).abs() < 1e-6);
    }

    #[test]
    fn test_haversine_antipodal_is_half_circumference() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 180.0);
        let expected = std::f64::consts::PI * EARTH_RADIUS_M;
        assert!((haversine_m(a, b) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_in_range() {
        assert!(Coordinate::new(90.0, -180.0).in_range());
        assert!(!Coordinate::new(90.5, 0.0).in_range());
        assert!(!Coordinate::new(0.0, f64::NAN).in_range());
    }

    #[test]
    fn test_from_lon_lat_swaps_axes() {
        let c = Coordinate::from_lon_lat([4.9, 52.3]);
        assert_eq!(c.lat, 52.3);
        assert_eq!(c.lon, 4.9);
    }
}
