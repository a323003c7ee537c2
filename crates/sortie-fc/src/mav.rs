use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use mavlink::{
    common::{
        GpsFixType, MavAutopilot, MavCmd, MavFrame, MavMessage, MavModeFlag, MavResult,
        MavState, MavType, PositionTargetTypemask, COMMAND_LONG_DATA, HEARTBEAT_DATA,
        SET_POSITION_TARGET_GLOBAL_INT_DATA,
    },
    MavConnection, MavHeader,
};
use sortie_nav::GeoPoint;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::link::{FlightMode, LinkFault, VehicleLink};
use crate::state::Telemetry;
use crate::FcConfig;

pub type SharedConn = Arc<dyn MavConnection<MavMessage> + Send + Sync>;

/// Ignore velocity, acceleration, yaw and yaw rate: position setpoint only.
const POSITION_ONLY_MASK: u16 = 0x0DF8;

/// Opens a MAVLink connection on a serial device.
pub fn open_serial(dev: &str, baud: u32) -> Result<SharedConn> {
    // quick validate device
    let _ = tokio_serial::new(dev, baud)
        .open_native_async()
        .with_context(|| format!("open fc serial device {}", dev))?;

    let url = format!("serial:{}:{}", dev, baud);
    let conn = mavlink::connect::<MavMessage>(&url)
        .with_context(|| format!("mavlink connect {}", url))?;
    Ok(Arc::from(conn))
}

struct Outbox {
    conn: SharedConn,
    sys_id: u8,
    comp_id: u8,
    sequence: AtomicU8,
}

impl Outbox {
    fn send(&self, msg: &MavMessage) -> Result<(), LinkFault> {
        let hdr = MavHeader {
            system_id: self.sys_id,
            component_id: self.comp_id,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1),
        };
        self.conn.send(&hdr, msg).map_err(|e| LinkFault::Send(format!("{:?}", e)))?;
        Ok(())
    }
}

/// Runs a blocking serial operation on the blocking pool. The reader holds
/// the port inside `recv` until a frame arrives, so a write can stall.
async fn off_runtime<T, F>(f: F) -> Result<T, LinkFault>
where
    F: FnOnce() -> Result<T, LinkFault> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LinkFault::Send(format!("send task: {}", e)))?
}

/// ArduCopter behind a MAVLink serial link.
///
/// A blocking reader task owns `recv` and is the only writer of the
/// telemetry snapshot; it also sends the companion heartbeat. Commands go
/// out on the same connection from the blocking pool.
pub struct MavVehicle {
    outbox: Arc<Outbox>,
    telemetry: Arc<RwLock<Telemetry>>,
    stop: Arc<AtomicBool>,
    target_sys: u8,
    target_comp: u8,
    require_heartbeat: bool,
    link_timeout: Duration,
    position_timeout: Duration,
}

impl MavVehicle {
    /// Must be called from inside a tokio runtime: the reader runs on the
    /// blocking pool.
    pub fn open(cfg: &FcConfig, dev: &str, baud: u32) -> Result<Self> {
        let conn = open_serial(dev, baud)?;
        info!("fc: connected {} @ {}", dev, baud);

        let telemetry = Arc::new(RwLock::new(Telemetry {
            port: Some(dev.to_string()),
            baud: Some(baud),
            reader_alive: true,
            ..Default::default()
        }));
        let outbox = Arc::new(Outbox {
            conn: conn.clone(),
            sys_id: cfg.sys_id,
            comp_id: cfg.comp_id,
            sequence: AtomicU8::new(0),
        });
        let stop = Arc::new(AtomicBool::new(false));

        let hb_hz = cfg.send_heartbeat_hz.unwrap_or(1.0).max(0.2);
        let reader = Reader {
            conn,
            outbox: outbox.clone(),
            telemetry: telemetry.clone(),
            stop: stop.clone(),
            target: (cfg.target_sys, cfg.target_comp),
            hb_interval: Duration::from_secs_f32(1.0 / hb_hz),
        };
        tokio::task::spawn_blocking(move || reader.run());

        Ok(Self {
            outbox,
            telemetry,
            stop,
            target_sys: cfg.target_sys,
            target_comp: cfg.target_comp,
            require_heartbeat: cfg.require_heartbeat,
            link_timeout: cfg.link_timeout(),
            position_timeout: cfg.position_timeout(),
        })
    }

    pub fn snapshot(&self) -> Telemetry {
        self.telemetry.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Waits for the first FC heartbeat.
    pub async fn wait_for_heartbeat(&self, timeout: Duration) -> Result<()> {
        let start = tokio::time::Instant::now();
        loop {
            let t = self.snapshot();
            if t.last_heartbeat.is_some() {
                return Ok(());
            }
            anyhow::ensure!(t.reader_alive, LinkFault::ReaderStopped);
            anyhow::ensure!(start.elapsed() < timeout, LinkFault::NoHeartbeat);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    fn live(&self, t: &Telemetry) -> Result<(), LinkFault> {
        if !t.reader_alive {
            return Err(LinkFault::ReaderStopped);
        }
        match t.hb_age() {
            None if self.require_heartbeat => Err(LinkFault::NoHeartbeat),
            None => Ok(()),
            Some(age) if age > self.link_timeout => {
                Err(LinkFault::HeartbeatLost { age_ms: age.as_millis() as u64 })
            }
            Some(_) => Ok(()),
        }
    }

    async fn dispatch(&self, msg: MavMessage) -> Result<(), LinkFault> {
        self.live(&self.snapshot())?;
        let outbox = self.outbox.clone();
        off_runtime(move || outbox.send(&msg)).await
    }

    async fn command(&self, command: MavCmd, params: [f32; 7]) -> Result<(), LinkFault> {
        let cmd = command_long(self.target_sys, self.target_comp, command, params);
        self.dispatch(MavMessage::COMMAND_LONG(cmd)).await
    }
}

impl Drop for MavVehicle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl VehicleLink for MavVehicle {
    async fn current_position(&self) -> Result<GeoPoint, LinkFault> {
        let t = self.snapshot();
        self.live(&t)?;
        t.fresh_position(self.position_timeout)
    }

    async fn current_mode(&self) -> Result<FlightMode, LinkFault> {
        let t = self.snapshot();
        self.live(&t)?;
        t.mode().ok_or(LinkFault::NoHeartbeat)
    }

    async fn is_armable(&self) -> Result<bool, LinkFault> {
        let t = self.snapshot();
        // FC still booting: not a fault, just not armable yet.
        if t.reader_alive && t.last_heartbeat.is_none() {
            return Ok(false);
        }
        self.live(&t)?;
        Ok(t.is_armable())
    }

    async fn is_armed(&self) -> Result<bool, LinkFault> {
        let t = self.snapshot();
        self.live(&t)?;
        Ok(t.armed)
    }

    async fn set_mode(&self, mode: FlightMode) -> Result<(), LinkFault> {
        info!("FC: set mode {}", mode);
        let flag = MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED.bits() as f32;
        self.command(MavCmd::MAV_CMD_DO_SET_MODE, [flag, mode.custom_mode() as f32, 0.0, 0.0, 0.0, 0.0, 0.0]).await
    }

    async fn arm(&self) -> Result<(), LinkFault> {
        info!("FC: arming");
        self.command(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).await
    }

    async fn takeoff(&self, target_alt_m: f64) -> Result<(), LinkFault> {
        info!("FC: takeoff to {:.1}m", target_alt_m);
        self.command(MavCmd::MAV_CMD_NAV_TAKEOFF, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, target_alt_m as f32]).await
    }

    async fn goto(&self, point: GeoPoint) -> Result<(), LinkFault> {
        debug!("FC: goto {:.7},{:.7} alt={:.1}", point.lat, point.lon, point.alt_m);
        let sp = position_target(self.target_sys, self.target_comp, &point);
        self.dispatch(MavMessage::SET_POSITION_TARGET_GLOBAL_INT(sp)).await
    }

    async fn set_groundspeed(&self, mps: f64) -> Result<(), LinkFault> {
        info!("FC: groundspeed {:.1}m/s", mps);
        // param1=1: ground speed, param3=-1: leave throttle unchanged
        self.command(MavCmd::MAV_CMD_DO_CHANGE_SPEED, [1.0, mps as f32, -1.0, 0.0, 0.0, 0.0, 0.0]).await
    }
}

struct Reader {
    conn: SharedConn,
    outbox: Arc<Outbox>,
    telemetry: Arc<RwLock<Telemetry>>,
    stop: Arc<AtomicBool>,
    target: (u8, u8),
    hb_interval: Duration,
}

impl Reader {
    fn run(self) {
        let mut last_hb_send: Option<Instant> = None;

        while !self.stop.load(Ordering::Relaxed) {
            // Send companion heartbeat periodically
            if last_hb_send.map_or(true, |t| t.elapsed() >= self.hb_interval) {
                if let Err(e) = self.outbox.send(&MavMessage::HEARTBEAT(companion_heartbeat())) {
                    debug!("companion heartbeat: {}", e);
                }
                last_hb_send = Some(Instant::now());
            }

            match self.conn.recv() {
                Ok((hdr, msg)) => {
                    let mut t = self.telemetry.write().unwrap_or_else(PoisonError::into_inner);
                    apply(&mut t, &hdr, &msg, self.target, Instant::now());
                }
                Err(e) => {
                    debug!("mavlink recv: {:?}", e);
                    // Light sleep to avoid busy loop
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }

        self.telemetry.write().unwrap_or_else(PoisonError::into_inner).reader_alive = false;
        debug!("fc reader stopped");
    }
}

/// Folds one message from the FC into the snapshot. Messages from other
/// systems are ignored; heartbeats also have to come from the autopilot
/// component (cameras and gimbals share the system id).
pub fn apply(t: &mut Telemetry, hdr: &MavHeader, msg: &MavMessage, target: (u8, u8), now: Instant) {
    if hdr.system_id != target.0 {
        return;
    }
    match msg {
        MavMessage::HEARTBEAT(hb) => {
            if hdr.component_id != target.1 {
                return;
            }
            t.last_heartbeat = Some(now);
            t.armed = hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
            t.custom_mode = Some(hb.custom_mode);
            t.system_ready = matches!(hb.system_status, MavState::MAV_STATE_STANDBY | MavState::MAV_STATE_ACTIVE);
        }
        MavMessage::GLOBAL_POSITION_INT(p) => {
            t.position = Some(GeoPoint::new(
                p.lat as f64 / 1e7,
                p.lon as f64 / 1e7,
                p.relative_alt as f64 / 1000.0,
            ));
            t.last_position = Some(now);
        }
        MavMessage::GPS_RAW_INT(g) => {
            t.gps_fix_ok = !matches!(g.fix_type, GpsFixType::GPS_FIX_TYPE_NO_GPS | GpsFixType::GPS_FIX_TYPE_NO_FIX);
        }
        MavMessage::COMMAND_ACK(ack) => {
            if ack.result != MavResult::MAV_RESULT_ACCEPTED {
                warn!("FC rejected {:?}: {:?}", ack.command, ack.result);
            }
            t.last_msg = Some(format!("ACK {:?} {:?}", ack.command, ack.result));
        }
        _ => {}
    }
}

pub fn companion_heartbeat() -> HEARTBEAT_DATA {
    HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_ONBOARD_CONTROLLER,
        autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: 3,
    }
}

pub fn command_long(target_system: u8, target_component: u8, command: MavCmd, p: [f32; 7]) -> COMMAND_LONG_DATA {
    COMMAND_LONG_DATA {
        target_system,
        target_component,
        command,
        confirmation: 0,
        param1: p[0],
        param2: p[1],
        param3: p[2],
        param4: p[3],
        param5: p[4],
        param6: p[5],
        param7: p[6],
    }
}

pub fn position_target(target_system: u8, target_component: u8, point: &GeoPoint) -> SET_POSITION_TARGET_GLOBAL_INT_DATA {
    SET_POSITION_TARGET_GLOBAL_INT_DATA {
        target_system,
        target_component,
        coordinate_frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
        type_mask: PositionTargetTypemask::from_bits_truncate(POSITION_ONLY_MASK),
        lat_int: (point.lat * 1e7).round() as i32,
        lon_int: (point.lon * 1e7).round() as i32,
        alt: point.alt_m as f32,
        ..Default::default()
    }
}
