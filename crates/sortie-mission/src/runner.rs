use sortie_fc::{FlightMode, VehicleLink};
use tracing::{info, warn};

use crate::config::{FaultPolicy, MissionConfig, TimingConfig};
use crate::error::MissionError;
use crate::log::MissionLog;
use crate::phase::{MissionPhase, PhaseController};
use crate::transit::{GotoStrategy, NativeGoto, TransitOutcome, WaypointController};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionResult {
    Completed,
    /// Leg at this 0-based waypoint index was preempted; later legs were skipped.
    AbortedAt(usize),
}

/// Owns the link, the log and the goto strategy for one mission and lends
/// them to the phase and waypoint controllers.
pub struct MissionRunner<L, G, S = NativeGoto> {
    link: L,
    log: G,
    goto: S,
    mission: MissionConfig,
    timing: TimingConfig,
}

impl<L, G> MissionRunner<L, G, NativeGoto>
where
    L: VehicleLink,
    G: MissionLog,
{
    pub fn new(link: L, log: G, mission: MissionConfig, timing: TimingConfig) -> Self {
        Self { link, log, goto: NativeGoto, mission, timing }
    }
}

impl<L, G, S> MissionRunner<L, G, S>
where
    L: VehicleLink,
    G: MissionLog,
    S: GotoStrategy,
{
    pub fn with_goto<S2: GotoStrategy>(self, goto: S2) -> MissionRunner<L, G, S2> {
        MissionRunner { link: self.link, log: self.log, goto, mission: self.mission, timing: self.timing }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn log(&self) -> &G {
        &self.log
    }

    /// Flies the whole mission.
    ///
    /// A fault before the vehicle is airborne is returned as is. A fault
    /// after takeoff is logged and, under [`FaultPolicy::Rtl`], followed by one
    /// best-effort RTL command before it is returned.
    pub async fn run(&self) -> Result<MissionResult, MissionError> {
        let mut phases = PhaseController::new(&self.link, &self.log, &self.timing);
        match self.fly(&mut phases).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let phase = phases.phase();
                self.log.append(&format!("FAULT during {}: {}", phase, e));
                if phase == MissionPhase::Airborne && self.mission.on_fault == FaultPolicy::Rtl {
                    match self.link.set_mode(FlightMode::Rtl).await {
                        Ok(()) => self.log.append("RTL commanded after fault"),
                        Err(rtl) => {
                            warn!("RTL after fault failed: {}", rtl);
                            self.log.append(&format!("RTL after fault failed: {}", rtl));
                        }
                    }
                }
                Err(e)
            }
        }
    }

    async fn fly(&self, phases: &mut PhaseController<'_, L, G>) -> Result<MissionResult, MissionError> {
        phases.arm_and_takeoff(self.mission.takeoff_alt_m).await?;

        self.log.append(&format!("Set groundspeed to {:.1}m/s", self.mission.groundspeed_mps));
        self.link.set_groundspeed(self.mission.groundspeed_mps).await?;

        let legs = WaypointController::new(&self.link, &self.log, &self.goto, &self.timing, self.mission.arrival_fraction);
        let mut result = MissionResult::Completed;
        for (i, wp) in self.mission.waypoints.iter().enumerate() {
            self.log.append(&format!("Going to position {} ({:.7},{:.7} alt={:.1}m)", i + 1, wp.lat, wp.lon, wp.alt_m));
            if legs.transit_to(*wp).await? == TransitOutcome::Preempted {
                self.log.append(&format!(
                    "Aborting mission at position {}: vehicle left GUIDED, skipping {} remaining",
                    i + 1,
                    self.mission.waypoints.len() - i - 1
                ));
                result = MissionResult::AbortedAt(i);
                break;
            }
        }

        self.log.append("Returning to launch");
        self.link.set_mode(FlightMode::Rtl).await?;

        match result {
            MissionResult::Completed => {
                info!("mission completed ({} waypoints)", self.mission.waypoints.len());
                self.log.append("Completed");
            }
            MissionResult::AbortedAt(i) => {
                warn!("mission aborted at waypoint index {}", i);
                self.log.append(&format!("Ended early, aborted at position {}", i + 1));
            }
        }
        Ok(result)
    }
}
