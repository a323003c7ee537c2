use std::fmt;

use sortie_fc::{FlightMode, VehicleLink};
use tracing::debug;

use crate::config::TimingConfig;
use crate::error::MissionError;
use crate::log::MissionLog;
use crate::wait::wait_until;

/// Takeoff is complete once relative altitude reaches this fraction of the
/// target; copters tend to settle just below the commanded altitude.
pub const TAKEOFF_ALT_FRACTION: f64 = 0.95;

/// Lifecycle of [`PhaseController`]. Ordered: a controller only moves to a
/// later variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MissionPhase {
    PreArm,
    Arming,
    TakingOff,
    Airborne,
}

impl fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissionPhase::PreArm => "PRE_ARM",
            MissionPhase::Arming => "ARMING",
            MissionPhase::TakingOff => "TAKING_OFF",
            MissionPhase::Airborne => "AIRBORNE",
        })
    }
}

/// Pre-arm checks, arming and takeoff.
///
/// Commands are sent once and never retried; only the vehicle state is
/// re-polled. Waits have no deadline unless one is set in [`TimingConfig`],
/// and nothing outside can cancel them short of dropping the future.
pub struct PhaseController<'a, L, G: ?Sized> {
    link: &'a L,
    log: &'a G,
    timing: &'a TimingConfig,
    phase: MissionPhase,
}

impl<'a, L, G> PhaseController<'a, L, G>
where
    L: VehicleLink,
    G: MissionLog + ?Sized,
{
    pub fn new(link: &'a L, log: &'a G, timing: &'a TimingConfig) -> Self {
        Self { link, log, timing, phase: MissionPhase::PreArm }
    }

    pub fn phase(&self) -> MissionPhase {
        self.phase
    }

    fn advance(&mut self, next: MissionPhase) {
        debug_assert!(next > self.phase, "phase went backwards: {} -> {}", self.phase, next);
        debug!("phase {} -> {}", self.phase, next);
        self.phase = next;
    }

    /// Runs PRE_ARM, ARMING and TAKING_OFF and returns in AIRBORNE.
    pub async fn arm_and_takeoff(&mut self, target_alt_m: f64) -> Result<(), MissionError> {
        let link = self.link;
        let log = self.log;
        let poll = self.timing.phase_poll();

        log.append("PRE_ARM: basic pre-arm checks");
        wait_until("vehicle to become armable", poll, self.timing.pre_arm_deadline(), move || async move {
            let armable = link.is_armable().await?;
            if !armable {
                log.append("PRE_ARM: waiting for vehicle to initialise...");
            }
            Ok::<_, MissionError>(armable)
        })
        .await?;

        self.advance(MissionPhase::Arming);
        log.append("ARMING: arming motors");
        // Copter should arm in GUIDED mode
        link.set_mode(FlightMode::Guided).await?;
        link.arm().await?;
        wait_until("motors to arm", poll, self.timing.arm_deadline(), move || async move {
            let armed = link.is_armed().await?;
            if !armed {
                log.append("ARMING: waiting for arming...");
            }
            Ok::<_, MissionError>(armed)
        })
        .await?;

        self.advance(MissionPhase::TakingOff);
        log.append(&format!("TAKING_OFF: taking off to {:.1}m", target_alt_m));
        link.takeoff(target_alt_m).await?;
        let floor = target_alt_m * TAKEOFF_ALT_FRACTION;
        wait_until("takeoff altitude", poll, self.timing.takeoff_deadline(), move || async move {
            let alt = link.current_position().await?.alt_m;
            log.append(&format!("TAKING_OFF: altitude {:.2}m", alt));
            Ok::<_, MissionError>(alt >= floor)
        })
        .await?;
        log.append("TAKING_OFF: reached target altitude");

        self.advance(MissionPhase::Airborne);
        Ok(())
    }
}
