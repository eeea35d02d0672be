//! Great-circle distance on a spherical Earth.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for all distance computations, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Distance to `other` in meters.
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        haversine_distance_meters(*self, *other)
    }
}

/// Haversine distance between two points, in meters.
pub fn haversine_distance_meters(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

/// Returns the point reached by travelling `distance_meters` due north
/// (positive) or south (negative) from `origin`.
///
/// Meridian arcs make this exact under the haversine model, which is handy
/// for building fixtures at a known distance from a zone center.
pub fn offset_north(origin: Coordinates, distance_meters: f64) -> Coordinates {
    let delta_deg = (distance_meters / EARTH_RADIUS_METERS).to_degrees();
    Coordinates::new(origin.latitude + delta_deg, origin.longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = Coordinates::new(19.0176, 72.8562);
        assert_eq!(haversine_distance_meters(p, p), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let mumbai = Coordinates::new(19.0176, 72.8562);
        let pune = Coordinates::new(18.5204, 73.8567);
        let d1 = mumbai.distance_to(&pune);
        let d2 = pune.distance_to(&mumbai);
        assert!((d1 - d2).abs() < 1e-6);
    }

    #[test]
    fn test_mumbai_to_pune() {
        let mumbai = Coordinates::new(19.0176, 72.8562);
        let pune = Coordinates::new(18.5204, 73.8567);
        let km = mumbai.distance_to(&pune) / 1000.0;
        // Roughly 117 km as the crow flies.
        assert!(km > 115.0 && km < 120.0, "got {km}");
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let a = Coordinates::new(0.0, 0.0);
        let b = Coordinates::new(1.0, 0.0);
        let expected = EARTH_RADIUS_METERS * 1.0_f64.to_radians();
        assert!((a.distance_to(&b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_antipodal_points() {
        let a = Coordinates::new(0.0, 0.0);
        let b = Coordinates::new(0.0, 180.0);
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_METERS;
        assert!((a.distance_to(&b) - half_circumference).abs() < 1e-3);
    }

    #[test]
    fn test_offset_north_round_trips_distance() {
        let origin = Coordinates::new(19.0896, 72.8656);
        let moved = offset_north(origin, 5000.0);
        assert!((origin.distance_to(&moved) - 5000.0).abs() < 1e-6);

        let south = offset_north(origin, -2000.0);
        assert!(south.latitude < origin.latitude);
        assert!((origin.distance_to(&south) - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn test_coordinates_serialization() {
        let p = Coordinates::new(19.0, 72.5);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"latitude":19.0,"longitude":72.5}"#);
    }
}
