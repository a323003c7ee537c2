//! What the mission core needs from a flight controller.
//!
//! Reads return `Ok(false)` / `Ok(value)` when the vehicle simply is not there
//! yet; `Err(LinkFault)` only when the link itself is broken.

use std::fmt;

use async_trait::async_trait;
use sortie_nav::GeoPoint;

/// ArduCopter `custom_mode` numbers.
pub const COPTER_MODE_GUIDED: u32 = 4;
pub const COPTER_MODE_RTL: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightMode {
    Guided,
    Rtl,
    Other(u32),
}

impl FlightMode {
    pub fn from_custom_mode(mode: u32) -> Self {
        match mode {
            COPTER_MODE_GUIDED => FlightMode::Guided,
            COPTER_MODE_RTL => FlightMode::Rtl,
            other => FlightMode::Other(other),
        }
    }

    pub fn custom_mode(self) -> u32 {
        match self {
            FlightMode::Guided => COPTER_MODE_GUIDED,
            FlightMode::Rtl => COPTER_MODE_RTL,
            FlightMode::Other(m) => m,
        }
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightMode::Guided => f.write_str("GUIDED"),
            FlightMode::Rtl => f.write_str("RTL"),
            FlightMode::Other(m) => write!(f, "MODE({})", m),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LinkFault {
    #[error("no heartbeat from flight controller yet")]
    NoHeartbeat,
    #[error("flight controller heartbeat lost ({age_ms}ms since last)")]
    HeartbeatLost { age_ms: u64 },
    #[error("no {0} received yet")]
    NoTelemetry(&'static str),
    #[error("position telemetry stale ({age_ms}ms since last fix)")]
    PositionStale { age_ms: u64 },
    #[error("mavlink send failed: {0}")]
    Send(String),
    #[error("telemetry reader stopped")]
    ReaderStopped,
}

/// One consistent read of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub position: GeoPoint,
    pub armed: bool,
    pub mode: FlightMode,
    pub is_armable: bool,
}

#[async_trait]
pub trait VehicleLink: Send + Sync {
    async fn current_position(&self) -> Result<GeoPoint, LinkFault>;
    async fn current_mode(&self) -> Result<FlightMode, LinkFault>;
    async fn is_armable(&self) -> Result<bool, LinkFault>;
    async fn is_armed(&self) -> Result<bool, LinkFault>;

    async fn set_mode(&self, mode: FlightMode) -> Result<(), LinkFault>;
    async fn arm(&self) -> Result<(), LinkFault>;
    async fn takeoff(&self, target_alt_m: f64) -> Result<(), LinkFault>;
    async fn goto(&self, point: GeoPoint) -> Result<(), LinkFault>;
    async fn set_groundspeed(&self, mps: f64) -> Result<(), LinkFault>;

    async fn state(&self) -> Result<VehicleState, LinkFault> {
        Ok(VehicleState {
            position: self.current_position().await?,
            armed: self.is_armed().await?,
            mode: self.current_mode().await?,
            is_armable: self.is_armable().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_mode_mapping() {
        assert_eq!(FlightMode::from_custom_mode(4), FlightMode::Guided);
        assert_eq!(FlightMode::from_custom_mode(6), FlightMode::Rtl);
        assert_eq!(FlightMode::from_custom_mode(5), FlightMode::Other(5));
        assert_eq!(FlightMode::Other(5).custom_mode(), 5);
        assert_eq!(FlightMode::Rtl.to_string(), "RTL");
    }
}
