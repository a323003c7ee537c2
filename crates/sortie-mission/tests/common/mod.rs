#![allow(dead_code)]

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use sortie_fc::{FlightMode, LinkFault, VehicleLink};
use sortie_mission::{FaultPolicy, MissionConfig};
use sortie_nav::GeoPoint;

pub const LOITER: FlightMode = FlightMode::Other(5);

#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    SetMode(FlightMode),
    Arm,
    Takeoff(f64),
    Goto(GeoPoint),
    Groundspeed(f64),
}

/// How the vehicle moves toward the active goto target on each position read.
#[derive(Debug, Clone, Copy)]
pub enum Motion {
    /// Covers 1/steps of the leg per read.
    Linear { steps: u32 },
    /// Covers half the remaining distance per read.
    Halfway,
    Stay,
}

#[derive(Debug)]
pub struct Script {
    pub position: GeoPoint,
    pub mode: FlightMode,
    pub armed: bool,
    /// is_armable answers false this many times first.
    pub not_armable_polls: usize,
    /// is_armed answers false this many times after arm().
    pub arm_delay_polls: usize,
    pub climb_per_poll: f64,
    pub motion: Motion,
    /// Mode flips to LOITER when goto number n (0-based) is issued.
    pub preempt_on_goto: Option<usize>,
    /// Mode flips to LOITER after this many mode reads.
    pub preempt_after_mode_reads: Option<usize>,
    pub fail_arm: bool,
    pub fail_goto: Option<usize>,

    pub commands: Vec<Cmd>,
    armable_polls: usize,
    armed_polls: usize,
    mode_reads: usize,
    arm_requested: bool,
    takeoff_target: Option<f64>,
    goto_target: Option<GeoPoint>,
    leg_origin: GeoPoint,
    leg_reads: u32,
    gotos: usize,
}

impl Script {
    pub fn at(position: GeoPoint) -> Self {
        Self {
            position,
            mode: FlightMode::Other(0),
            armed: false,
            not_armable_polls: 0,
            arm_delay_polls: 0,
            climb_per_poll: 10.0,
            motion: Motion::Linear { steps: 4 },
            preempt_on_goto: None,
            preempt_after_mode_reads: None,
            fail_arm: false,
            fail_goto: None,
            commands: Vec::new(),
            armable_polls: 0,
            armed_polls: 0,
            mode_reads: 0,
            arm_requested: false,
            takeoff_target: None,
            goto_target: None,
            leg_origin: position,
            leg_reads: 0,
            gotos: 0,
        }
    }

    /// Already airborne in GUIDED, as the waypoint controller expects.
    pub fn airborne(position: GeoPoint) -> Self {
        let mut s = Self::at(position);
        s.mode = FlightMode::Guided;
        s.armed = true;
        s
    }

    fn step(&mut self) {
        if let Some(target) = self.goto_target {
            self.leg_reads += 1;
            match self.motion {
                Motion::Linear { steps } => {
                    let f = (self.leg_reads.min(steps)) as f64 / steps as f64;
                    self.position.lat = self.leg_origin.lat + (target.lat - self.leg_origin.lat) * f;
                    self.position.lon = self.leg_origin.lon + (target.lon - self.leg_origin.lon) * f;
                }
                Motion::Halfway => {
                    self.position.lat += (target.lat - self.position.lat) / 2.0;
                    self.position.lon += (target.lon - self.position.lon) / 2.0;
                }
                Motion::Stay => {}
            }
        } else if let Some(target) = self.takeoff_target {
            self.position.alt_m = (self.position.alt_m + self.climb_per_poll).min(target);
        }
    }
}

pub struct ScriptedVehicle {
    script: Mutex<Script>,
}

impl ScriptedVehicle {
    pub fn new(script: Script) -> Self {
        Self { script: Mutex::new(script) }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        f(&mut self.script.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn commands(&self) -> Vec<Cmd> {
        self.with(|s| s.commands.clone())
    }

    pub fn gotos(&self) -> Vec<GeoPoint> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                Cmd::Goto(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self) -> GeoPoint {
        self.with(|s| s.position)
    }
}

#[async_trait]
impl VehicleLink for ScriptedVehicle {
    async fn current_position(&self) -> Result<GeoPoint, LinkFault> {
        Ok(self.with(|s| {
            s.step();
            s.position
        }))
    }

    async fn current_mode(&self) -> Result<FlightMode, LinkFault> {
        Ok(self.with(|s| {
            s.mode_reads += 1;
            if let Some(n) = s.preempt_after_mode_reads {
                if s.mode_reads > n {
                    s.mode = LOITER;
                }
            }
            s.mode
        }))
    }

    async fn is_armable(&self) -> Result<bool, LinkFault> {
        Ok(self.with(|s| {
            s.armable_polls += 1;
            s.armable_polls > s.not_armable_polls
        }))
    }

    async fn is_armed(&self) -> Result<bool, LinkFault> {
        Ok(self.with(|s| {
            if s.arm_requested && !s.armed {
                s.armed_polls += 1;
                if s.armed_polls > s.arm_delay_polls {
                    s.armed = true;
                }
            }
            s.armed
        }))
    }

    async fn set_mode(&self, mode: FlightMode) -> Result<(), LinkFault> {
        self.with(|s| {
            s.commands.push(Cmd::SetMode(mode));
            s.mode = mode;
        });
        Ok(())
    }

    async fn arm(&self) -> Result<(), LinkFault> {
        self.with(|s| {
            s.commands.push(Cmd::Arm);
            if s.fail_arm {
                return Err(LinkFault::HeartbeatLost { age_ms: 6000 });
            }
            s.arm_requested = true;
            Ok(())
        })
    }

    async fn takeoff(&self, target_alt_m: f64) -> Result<(), LinkFault> {
        self.with(|s| {
            s.commands.push(Cmd::Takeoff(target_alt_m));
            s.takeoff_target = Some(target_alt_m);
        });
        Ok(())
    }

    async fn goto(&self, point: GeoPoint) -> Result<(), LinkFault> {
        self.with(|s| {
            let n = s.gotos;
            s.gotos += 1;
            if s.fail_goto == Some(n) {
                return Err(LinkFault::Send("serial write timed out".into()));
            }
            s.commands.push(Cmd::Goto(point));
            s.goto_target = Some(point);
            s.leg_origin = s.position;
            s.leg_reads = 0;
            if s.preempt_on_goto == Some(n) {
                s.mode = LOITER;
            }
            Ok(())
        })
    }

    async fn set_groundspeed(&self, mps: f64) -> Result<(), LinkFault> {
        self.with(|s| s.commands.push(Cmd::Groundspeed(mps)));
        Ok(())
    }
}

pub fn home() -> GeoPoint {
    GeoPoint::new(32.685000, -117.004000, 0.0)
}

/// Three short legs around `home()`.
pub fn survey_waypoints() -> Vec<GeoPoint> {
    vec![
        GeoPoint::new(32.685490, -117.004233, 10.0),
        GeoPoint::new(32.685673, -117.004331, 10.0),
        GeoPoint::new(32.685685, -117.004074, 10.0),
    ]
}

pub fn mission(waypoints: Vec<GeoPoint>) -> MissionConfig {
    MissionConfig {
        takeoff_alt_m: 5.0,
        groundspeed_mps: 5.0,
        arrival_fraction: 0.1,
        on_fault: FaultPolicy::Rtl,
        waypoints,
    }
}
