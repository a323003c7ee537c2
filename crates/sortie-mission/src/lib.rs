//! Mission sequencing on top of a [`VehicleLink`](sortie_fc::VehicleLink):
//! pre-arm, arm, takeoff, waypoint legs, return to launch.

pub mod config;
pub mod error;
pub mod log;
pub mod phase;
pub mod runner;
pub mod transit;
pub mod wait;

pub use config::{FaultPolicy, MissionConfig, TimingConfig};
pub use error::MissionError;
pub use log::{FlightLog, MemoryLog, MissionLog};
pub use phase::{MissionPhase, PhaseController};
pub use runner::{MissionResult, MissionRunner};
pub use transit::{CorrectedGoto, GotoStrategy, NativeGoto, PositionCorrector, TransitOutcome, TransitState, WaypointController};
pub use wait::wait_until;
