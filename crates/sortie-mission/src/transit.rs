use std::time::Duration;

use async_trait::async_trait;
use sortie_fc::{FlightMode, VehicleLink};
use sortie_nav::geo::{distance_m, GeoPoint};
use tracing::{debug, info};

use crate::config::TimingConfig;
use crate::error::MissionError;
use crate::log::MissionLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitOutcome {
    Reached,
    /// The vehicle left GUIDED during the leg (operator or failsafe took over).
    Preempted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransitState {
    Started,
    InProgress,
    Reached,
    Preempted,
}

/// How the position setpoint for a leg is sent to the vehicle.
#[async_trait]
pub trait GotoStrategy: Send + Sync {
    /// Sends the setpoint for `target` and returns the point actually
    /// commanded. Arrival is measured against that point.
    async fn goto(&self, link: &dyn VehicleLink, target: GeoPoint) -> Result<GeoPoint, MissionError>;
}

/// The flight controller's own position setpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeGoto;

#[async_trait]
impl GotoStrategy for NativeGoto {
    async fn goto(&self, link: &dyn VehicleLink, target: GeoPoint) -> Result<GeoPoint, MissionError> {
        link.goto(target).await?;
        Ok(target)
    }
}

/// Refines a waypoint from an external source, e.g. a camera locating the
/// target on the ground.
#[async_trait]
pub trait PositionCorrector: Send + Sync {
    /// `Ok(None)` when the source has nothing better than `nominal`.
    async fn correct(&self, vehicle: GeoPoint, nominal: GeoPoint) -> anyhow::Result<Option<GeoPoint>>;
}

/// Flies the corrected point when the corrector has one, the nominal
/// waypoint otherwise.
pub struct CorrectedGoto<C> {
    corrector: C,
}

impl<C: PositionCorrector> CorrectedGoto<C> {
    pub fn new(corrector: C) -> Self {
        Self { corrector }
    }
}

#[async_trait]
impl<C: PositionCorrector> GotoStrategy for CorrectedGoto<C> {
    async fn goto(&self, link: &dyn VehicleLink, target: GeoPoint) -> Result<GeoPoint, MissionError> {
        let here = link.current_position().await?;
        let point = match self.corrector.correct(here, target).await.map_err(MissionError::Correction)? {
            Some(p) => {
                info!("goto corrected {:.7},{:.7} -> {:.7},{:.7}", target.lat, target.lon, p.lat, p.lon);
                p
            }
            None => target,
        };
        link.goto(point).await?;
        Ok(point)
    }
}

struct Leg {
    target: GeoPoint,
    initial_m: f64,
    state: TransitState,
}

impl Leg {
    fn enter(&mut self, next: TransitState) {
        debug_assert!(next > self.state);
        debug!("leg to {:.7},{:.7}: {:?} -> {:?}", self.target.lat, self.target.lon, self.state, next);
        self.state = next;
    }
}

/// Supervises one leg at a time: issue the goto, then watch distance and
/// flight mode until the vehicle arrives or someone else takes control.
pub struct WaypointController<'a, L, G: ?Sized, S: ?Sized> {
    link: &'a L,
    log: &'a G,
    goto: &'a S,
    poll: Duration,
    arrival_fraction: f64,
}

impl<'a, L, G, S> WaypointController<'a, L, G, S>
where
    L: VehicleLink,
    G: MissionLog + ?Sized,
    S: GotoStrategy + ?Sized,
{
    pub fn new(link: &'a L, log: &'a G, goto: &'a S, timing: &TimingConfig, arrival_fraction: f64) -> Self {
        Self { link, log, goto, poll: timing.transit_poll(), arrival_fraction }
    }

    /// Flies to `target`. Returns `Reached` at the first poll where the
    /// remaining distance to the commanded point is within `arrival_fraction`
    /// of the distance at goto time (a remaining distance of exactly zero
    /// always counts).
    pub async fn transit_to(&self, target: GeoPoint) -> Result<TransitOutcome, MissionError> {
        let start = self.link.current_position().await?;
        let commanded = self.goto.goto(self.link, target).await?;
        let mut leg = Leg { target: commanded, initial_m: distance_m(&start, &commanded), state: TransitState::Started };
        let threshold_m = leg.initial_m * self.arrival_fraction;
        leg.enter(TransitState::InProgress);

        loop {
            let mode = self.link.current_mode().await?;
            if mode != FlightMode::Guided {
                leg.enter(TransitState::Preempted);
                self.log.append(&format!("Mode changed to {}, leaving leg", mode));
                return Ok(TransitOutcome::Preempted);
            }

            let here = self.link.current_position().await?;
            let remaining = distance_m(&here, &leg.target);
            self.log.append(&format!("Distance to target: {:.2}m", remaining));

            if remaining <= threshold_m || remaining == 0.0 {
                leg.enter(TransitState::Reached);
                self.log.append(&format!(
                    "Reached target ({:.1}m of {:.1}m left), at {:.7},{:.7} alt={:.1}m",
                    remaining, leg.initial_m, here.lat, here.lon, here.alt_m
                ));
                return Ok(TransitOutcome::Reached);
            }

            tokio::time::sleep(self.poll).await;
        }
    }
}
