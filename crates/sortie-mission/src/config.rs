use std::time::Duration;

use serde::Deserialize;
use sortie_nav::GeoPoint;

/// What the runner does when a fault hits after takeoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// One best-effort RTL command, then report the fault.
    #[default]
    Rtl,
    /// Leave the flight controller in whatever mode it is in.
    Hold,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MissionConfig {
    pub takeoff_alt_m: f64,
    pub groundspeed_mps: f64,
    /// A leg is reached once the remaining distance is at most this fraction
    /// of the distance at the time the goto was issued.
    #[serde(default = "default_arrival_fraction")]
    pub arrival_fraction: f64,
    #[serde(default)]
    pub on_fault: FaultPolicy,
    /// Flown in order.
    #[serde(default)]
    pub waypoints: Vec<GeoPoint>,
}

fn default_arrival_fraction() -> f64 {
    0.1
}

/// Poll intervals and optional deadlines. No deadline means wait forever.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub phase_poll_ms: u64,
    pub transit_poll_ms: u64,
    pub pre_arm_timeout_s: Option<u64>,
    pub arm_timeout_s: Option<u64>,
    pub takeoff_timeout_s: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            phase_poll_ms: 1000,
            transit_poll_ms: 2000,
            pre_arm_timeout_s: None,
            arm_timeout_s: None,
            takeoff_timeout_s: None,
        }
    }
}

impl TimingConfig {
    pub fn phase_poll(&self) -> Duration {
        Duration::from_millis(self.phase_poll_ms)
    }

    pub fn transit_poll(&self) -> Duration {
        Duration::from_millis(self.transit_poll_ms)
    }

    pub fn pre_arm_deadline(&self) -> Option<Duration> {
        self.pre_arm_timeout_s.map(Duration::from_secs)
    }

    pub fn arm_deadline(&self) -> Option<Duration> {
        self.arm_timeout_s.map(Duration::from_secs)
    }

    pub fn takeoff_deadline(&self) -> Option<Duration> {
        self.takeoff_timeout_s.map(Duration::from_secs)
    }
}
