use crate::geo::{distance_m, haversine_m, GeoPoint};

/// One point-to-point segment of a route.
#[derive(Debug, Clone, Copy)]
pub struct Leg {
    pub index: usize,
    pub from: GeoPoint,
    pub to: GeoPoint,
}

impl Leg {
    pub fn distance_m(&self) -> f64 {
        distance_m(&self.from, &self.to)
    }

    /// Relative error of the planar approximation against great-circle
    /// distance. 0.0 for zero-length legs.
    pub fn planar_error(&self) -> f64 {
        let gc = haversine_m(&self.from, &self.to);
        if gc == 0.0 { return 0.0; }
        (self.distance_m() - gc).abs() / gc
    }
}

/// Ordered waypoints flown from a start position. Flight order is
/// insertion order.
#[derive(Debug, Clone)]
pub struct Route<'a> {
    start: GeoPoint,
    waypoints: &'a [GeoPoint],
}

impl<'a> Route<'a> {
    pub fn new(start: GeoPoint, waypoints: &'a [GeoPoint]) -> Self {
        Self { start, waypoints }
    }

    pub fn legs(&self) -> impl Iterator<Item = Leg> + '_ {
        let mut prev = self.start;
        self.waypoints.iter().enumerate().map(move |(index, to)| {
            let leg = Leg { index, from: prev, to: *to };
            prev = *to;
            leg
        })
    }

    pub fn total_m(&self) -> f64 {
        self.legs().map(|l| l.distance_m()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legs_follow_insertion_order() {
        let home = GeoPoint::new(32.685000, -117.004000, 0.0);
        let wps = [
            GeoPoint::new(32.685490, -117.004233, 10.0),
            GeoPoint::new(32.685673, -117.004331, 10.0),
            GeoPoint::new(32.685685, -117.004074, 10.0),
        ];
        let route = Route::new(home, &wps);
        let legs: Vec<Leg> = route.legs().collect();
        assert_eq!(legs.len(), 3);
        assert_eq!(legs[0].from, home);
        assert_eq!(legs[1].from, wps[0]);
        assert_eq!(legs[2].to, wps[2]);
        let sum: f64 = legs.iter().map(|l| l.distance_m()).sum();
        assert!((route.total_m() - sum).abs() < 1e-9);
    }

    #[test]
    fn empty_route_has_no_legs() {
        let route = Route::new(GeoPoint::new(0.0, 0.0, 0.0), &[]);
        assert_eq!(route.legs().count(), 0);
        assert_eq!(route.total_m(), 0.0);
    }

    #[test]
    fn planar_error_grows_with_latitude() {
        let low = Leg { index: 0, from: GeoPoint::new(1.0, 1.0, 0.0), to: GeoPoint::new(1.0, 1.01, 0.0) };
        let high = Leg { index: 0, from: GeoPoint::new(70.0, 1.0, 0.0), to: GeoPoint::new(70.0, 1.01, 0.0) };
        assert!(low.planar_error() < 0.01);
        assert!(high.planar_error() > 1.0);
    }
}
