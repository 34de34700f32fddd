//! Geographic primitives
//!
//! Axis-aligned latitude/longitude boxes and great-circle distance. Boxes are
//! coarse on purpose: they describe service areas and named deserts, not borders.

use serde::Serialize;

/// Mean Earth radius in kilometres
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Named latitude/longitude rectangle (inclusive bounds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub name: &'static str,
    pub lat_min: f64,
    pub lat_max: f64,
    pub long_min: f64,
    pub long_max: f64,
}

impl BoundingBox {
    pub const fn new(
        name: &'static str,
        lat_min: f64,
        lat_max: f64,
        long_min: f64,
        long_max: f64,
    ) -> Self {
        Self {
            name,
            lat_min,
            lat_max,
            long_min,
            long_max,
        }
    }

    pub fn contains(&self, lat: f64, long: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat)
            && (self.long_min..=self.long_max).contains(&long)
    }
}

/// India service area
pub const INDIA: BoundingBox = BoundingBox::new("India", 8.0, 38.0, 68.0, 98.0);

/// Contiguous USA service area
pub const USA: BoundingBox = BoundingBox::new("USA", 25.0, 50.0, -125.0, -65.0);

/// Regions where the service has baseline coverage
pub const SERVICE_AREAS: [BoundingBox; 2] = [INDIA, USA];

/// First service area containing the point, if any
pub fn service_area_for(lat: f64, long: f64) -> Option<&'static BoundingBox> {
    SERVICE_AREAS.iter().find(|area| area.contains(lat, long))
}

/// (0, 0) is the "no location provided" sentinel, never a real report
pub fn is_null_island(lat: f64, long: f64) -> bool {
    lat == 0.0 && long == 0.0
}

/// True when the coordinates are finite and inside the WGS84 domain
pub fn is_valid_coordinate(lat: f64, long: f64) -> bool {
    lat.is_finite() && long.is_finite() && lat.abs() <= 90.0 && long.abs() <= 180.0
}

/// Haversine great-circle distance in kilometres
pub fn haversine_km(lat1: f64, long1: f64, lat2: f64, long2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (long2 - long1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Latitude/longitude half-extents (degrees) of a box covering `radius_km`
/// around a point
pub fn degree_extent(lat: f64, radius_km: f64) -> (f64, f64) {
    let d_lat = radius_km / 111.32;
    let cos_lat = lat.to_radians().cos().abs().max(0.01);
    let d_long = (radius_km / (111.32 * cos_lat)).min(180.0);
    (d_lat, d_long)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_area_lookup() {
        assert_eq!(service_area_for(13.08, 80.27).map(|a| a.name), Some("India"));
        assert_eq!(service_area_for(40.7, -74.0).map(|a| a.name), Some("USA"));
        assert!(service_area_for(51.5, -0.12).is_none());
    }

    #[test]
    fn test_null_island_and_domain() {
        assert!(is_null_island(0.0, 0.0));
        assert!(!is_null_island(0.0, 1.0));
        assert!(is_valid_coordinate(-90.0, 180.0));
        assert!(!is_valid_coordinate(91.0, 0.0));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
    }

    #[test]
    fn test_haversine_known_distance() {
        // Delhi to Mumbai is roughly 1150 km
        let d = haversine_km(28.6139, 77.2090, 19.0760, 72.8777);
        assert!((d - 1150.0).abs() < 20.0, "got {}", d);
        assert!(haversine_km(10.0, 10.0, 10.0, 10.0).abs() < 1e-9);
    }

}
