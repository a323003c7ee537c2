use serde::{Deserialize, Serialize};

/// Metres per degree on the equator (ArduPilot autotest constant).
pub const METRES_PER_DEGREE: f64 = 1.113195e5;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geodetic position. `alt_m` is relative to the home (arming) position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub alt_m: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64, alt_m: f64) -> Self {
        Self { lat, lon, alt_m }
    }
}

/// Ground distance in metres, treating degrees of latitude and longitude as
/// equal length.
///
/// Only accurate for points a few tens of km apart and well away from the
/// poles: a degree of longitude shrinks with cos(lat), which this ignores.
/// Altitude is not part of the distance. NaN in, NaN out.
pub fn distance_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let dlat = b.lat - a.lat;
    let dlon = b.lon - a.lon;
    (dlat * dlat + dlon * dlon).sqrt() * METRES_PER_DEGREE
}

/// Great-circle distance in metres. Used to sanity-check `distance_m` on a
/// planned route, never in the control loop.
pub fn haversine_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat/2.0).sin().powi(2) + a.lat.to_radians().cos()*b.lat.to_radians().cos()*(dlon/2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0-h).sqrt());
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        for p in [
            GeoPoint::new(0.0, 0.0, 0.0),
            GeoPoint::new(32.685490, -117.004233, 10.0),
            GeoPoint::new(-45.5, 170.25, 120.0),
        ] {
            assert_eq!(distance_m(&p, &p), 0.0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint::new(32.685000, -117.004000, 0.0);
        let b = GeoPoint::new(32.685673, -117.004331, 10.0);
        assert_eq!(distance_m(&a, &b), distance_m(&b, &a));
    }

    #[test]
    fn distance_matches_hand_computed_leg() {
        let a = GeoPoint::new(32.685000, -117.004000, 0.0);
        let b = GeoPoint::new(32.685490, -117.004233, 10.0);
        let expected = (0.00049_f64.powi(2) + 0.000233_f64.powi(2)).sqrt() * 111_319.5;
        assert!((distance_m(&a, &b) - expected).abs() < 1e-6);
        assert!((distance_m(&a, &b) - 60.4).abs() < 0.5);
    }

    #[test]
    fn altitude_is_ignored() {
        let a = GeoPoint::new(10.0, 10.0, 0.0);
        let b = GeoPoint::new(10.0, 10.0, 500.0);
        assert_eq!(distance_m(&a, &b), 0.0);
    }

    #[test]
    fn nan_propagates() {
        let a = GeoPoint::new(f64::NAN, 0.0, 0.0);
        let b = GeoPoint::new(1.0, 1.0, 0.0);
        assert!(distance_m(&a, &b).is_nan());
    }

    #[test]
    fn parses_from_toml() {
        let p: GeoPoint = toml::from_str("lat = 32.685490\nlon = -117.004233\nalt_m = 10.0\n").unwrap();
        assert_eq!(p, GeoPoint::new(32.685490, -117.004233, 10.0));
    }

    #[test]
    fn planar_and_great_circle_agree_near_equator() {
        let a = GeoPoint::new(0.0, 0.0, 0.0);
        let b = GeoPoint::new(0.001, 0.001, 0.0);
        let planar = distance_m(&a, &b);
        let gc = haversine_m(&a, &b);
        assert!((planar - gc).abs() / gc < 0.01, "planar={planar} gc={gc}");
    }
}
