use std::time::{Duration, Instant};

use sortie_nav::GeoPoint;

use crate::link::{FlightMode, LinkFault};

/// Latest telemetry decoded by the reader task. Single writer (the reader),
/// readers take a clone.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub reader_alive: bool,

    pub last_heartbeat: Option<Instant>,
    pub armed: bool,
    pub custom_mode: Option<u32>,
    /// FC reports STANDBY or ACTIVE (done booting / calibrating).
    pub system_ready: bool,
    /// GPS fix is 2D or better.
    pub gps_fix_ok: bool,

    pub position: Option<GeoPoint>,
    pub last_position: Option<Instant>,

    pub last_msg: Option<String>,
}

impl Telemetry {
    pub fn hb_age(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }

    pub fn position_age(&self) -> Option<Duration> {
        self.last_position.map(|t| t.elapsed())
    }

    /// Last fix, unless GLOBAL_POSITION_INT has gone quiet for longer than
    /// `max_age` (heartbeats alone keep the link looking alive).
    pub fn fresh_position(&self, max_age: Duration) -> Result<GeoPoint, LinkFault> {
        match (self.position, self.position_age()) {
            (Some(p), Some(age)) if age <= max_age => Ok(p),
            (Some(_), Some(age)) => Err(LinkFault::PositionStale { age_ms: age.as_millis() as u64 }),
            _ => Err(LinkFault::NoTelemetry("GLOBAL_POSITION_INT")),
        }
    }

    pub fn mode(&self) -> Option<FlightMode> {
        self.custom_mode.map(FlightMode::from_custom_mode)
    }

    pub fn is_armable(&self) -> bool {
        self.last_heartbeat.is_some() && self.system_ready && self.gps_fix_ok
    }
}
