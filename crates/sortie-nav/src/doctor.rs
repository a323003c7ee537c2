use anyhow::Result;
use tracing::warn;

use crate::geo::GeoPoint;
use crate::route::Route;

/// Above this latitude the planar distance is off by more than a factor ~2
/// in longitude and arrival checks become unreliable.
pub const MAX_ABS_LAT: f64 = 60.0;
/// Longest leg we accept for the planar approximation.
pub const MAX_LEG_M: f64 = 20_000.0;

pub fn check_waypoints(waypoints: &[GeoPoint]) -> Result<()> {
    for (i, wp) in waypoints.iter().enumerate() {
        anyhow::ensure!(wp.lat.is_finite() && wp.lon.is_finite() && wp.alt_m.is_finite(), "mission.waypoints[{}] not finite", i);
        anyhow::ensure!(wp.lat.abs() <= 90.0 && wp.lon.abs() <= 180.0, "mission.waypoints[{}] coordinates invalid", i);
        anyhow::ensure!(wp.lat.abs() <= MAX_ABS_LAT, "mission.waypoints[{}] too close to the pole (|lat| > {})", i, MAX_ABS_LAT);
        anyhow::ensure!(wp.alt_m > 0.0, "mission.waypoints[{}] alt_m must be above home", i);
    }

    // First waypoint is not checked against home: home is only known once
    // the vehicle reports a position.
    if let Some((first, rest)) = waypoints.split_first() {
        for leg in Route::new(*first, rest).legs() {
            let d = leg.distance_m();
            anyhow::ensure!(d <= MAX_LEG_M, "leg {} -> {} is {:.0}m (max {}m)", leg.index + 1, leg.index + 2, d, MAX_LEG_M);
            if leg.planar_error() > 0.25 {
                warn!("leg {} -> {}: planar distance off by {:.0}% vs great circle", leg.index + 1, leg.index + 2, leg.planar_error() * 100.0);
            }
        }
    }
    Ok(())
}

pub fn check_flight_params(takeoff_alt_m: f64, groundspeed_mps: f64, arrival_fraction: f64) -> Result<()> {
    anyhow::ensure!(takeoff_alt_m > 0.0 && takeoff_alt_m <= 120.0, "mission.takeoff_alt_m should be in (0, 120]");
    anyhow::ensure!(groundspeed_mps > 0.0 && groundspeed_mps <= 20.0, "mission.groundspeed_mps should be in (0, 20]");
    anyhow::ensure!(arrival_fraction > 0.0 && arrival_fraction < 1.0, "mission.arrival_fraction should be in (0, 1)");
    Ok(())
}
