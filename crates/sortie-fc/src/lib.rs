pub mod autodetect;
pub mod link;
pub mod mav;
pub mod state;

pub use link::{FlightMode, LinkFault, VehicleLink, VehicleState};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct FcConfig {
    /// If true, sortie will probe candidate serial ports/bauds and pick the first
    /// that yields a MAVLink HEARTBEAT from `target_sys`.
    #[serde(default)]
    pub autodetect: bool,

    /// When autodetect=false: fixed port config
    pub serial_dev: Option<String>,
    pub baud: Option<u32>,

    /// Autodetect candidates (paths). Example:
    /// ["/dev/serial0","/dev/ttyAMA0","/dev/ttyS0","/dev/ttyUSB0","/dev/ttyACM0"]
    pub candidate_devs: Option<Vec<String>>,

    /// Autodetect candidate baud rates (common ArduPilot telemetry values).
    pub candidate_bauds: Option<Vec<u32>>,

    /// Heartbeat wait per probe attempt, and for the first heartbeat after open.
    pub heartbeat_timeout_ms: Option<u64>,

    /// MAVLink ids we use (companion side)
    pub sys_id: u8,
    pub comp_id: u8,

    /// target system/component (FC side). 1/1 is common for ArduPilot.
    pub target_sys: u8,
    pub target_comp: u8,

    /// Refuse commands and position reads until an FC heartbeat was seen.
    #[serde(default = "default_true")]
    pub require_heartbeat: bool,

    /// Companion heartbeat send rate. Default 1 Hz.
    pub send_heartbeat_hz: Option<f32>,

    /// FC heartbeat older than this counts as link loss. Default 5s.
    pub link_timeout_ms: Option<u64>,

    /// Position fix older than this is refused. Defaults to the link timeout.
    pub position_timeout_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl FcConfig {
    pub fn link_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.link_timeout_ms.unwrap_or(5000))
    }

    pub fn position_timeout(&self) -> std::time::Duration {
        self.position_timeout_ms
            .map(std::time::Duration::from_millis)
            .unwrap_or_else(|| self.link_timeout())
    }

    pub fn heartbeat_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.heartbeat_timeout_ms.unwrap_or(1500))
    }
}
