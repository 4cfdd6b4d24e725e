use crate::models::GeoPoint;
use std::f64::consts::PI;

/// Earth mean radius in meters: (2 * equatorial + polar) / 3
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_009.0;

/// Earth circumference at the mean radius in meters
pub const EARTH_CIRCUMFERENCE_M: f64 = 2.0 * PI * EARTH_MEAN_RADIUS_M;

/// Distance of any point at the given latitude from the Equator, in meters.
/// Negative south of the Equator.
#[inline]
pub fn distance_from_equator(lat: f64) -> f64 {
    EARTH_CIRCUMFERENCE_M / 360.0 * lat
}

/// Distance of the given point from the reference meridian along its
/// circle of latitude, in meters. Negative west of the meridian.
#[inline]
pub fn distance_from_meridian(lat: f64, lng: f64) -> f64 {
    let circle_radius = lat.to_radians().cos() * EARTH_MEAN_RADIUS_M;
    let circle_circumference = circle_radius * 2.0 * PI;

    circle_circumference / 360.0 * lng
}

/// Flat-earth distance between two points in meters, truncated.
///
/// Projects both points onto the equator/meridian axes and takes the
/// Pythagorean norm of the deltas. Accurate enough below ~1,000 km; the
/// movement and margin thresholds are tuned against this approximation.
#[inline]
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> i64 {
    let d_eq = distance_from_equator(a.latitude) - distance_from_equator(b.latitude);
    let d_mer = distance_from_meridian(a.latitude, a.longitude)
        - distance_from_meridian(b.latitude, b.longitude);

    (d_eq * d_eq + d_mer * d_mer).sqrt() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equator_distance_is_linear() {
        assert_eq!(distance_from_equator(0.0), 0.0);
        // One degree of latitude is ~111.2 km
        let one_degree = distance_from_equator(1.0);
        assert!((one_degree - 111_195.0).abs() < 5.0, "got {}", one_degree);
        assert_eq!(distance_from_equator(-1.0), -one_degree);
    }

    #[test]
    fn test_meridian_distance_shrinks_with_latitude() {
        let at_equator = distance_from_meridian(0.0, 1.0);
        let at_60 = distance_from_meridian(60.0, 1.0);
        assert!((at_60 - at_equator / 2.0).abs() < 1.0);
        assert!(distance_from_meridian(45.0, -10.0) < 0.0);
    }

    #[test]
    fn test_distance_zero_and_symmetric() {
        let budapest = GeoPoint::new(47.4979, 19.0402);
        let vienna = GeoPoint::new(48.2082, 16.3738);

        assert_eq!(distance(&budapest, &budapest), 0);
        assert_eq!(distance(&budapest, &vienna), distance(&vienna, &budapest));
    }

    #[test]
    fn test_distance_along_meridian_matches_latitude_delta() {
        let a = GeoPoint::new(47.0, 0.0);
        let b = GeoPoint::new(48.0, 0.0);

        let d = distance(&a, &b);
        assert!((d - 111_195).abs() <= 1, "Distance should be ~111km, got {}", d);
    }

    #[test]
    fn test_distance_short_range_close_to_great_circle() {
        // ~1.1 km apart in Budapest
        let a = GeoPoint::new(47.4979, 19.0402);
        let b = GeoPoint::new(47.5079, 19.0452);

        let d = distance(&a, &b);
        assert!((d - 1_110).abs() < 30, "got {}", d);
    }
}
