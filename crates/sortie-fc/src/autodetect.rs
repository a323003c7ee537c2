use anyhow::Result;
use mavlink::common::MavMessage;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::mav::open_serial;

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub dev: String,
    pub baud: u32,
    pub hb_seen: bool,
    pub elapsed_ms: u64,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct AutodetectResult {
    pub chosen: Option<(String, u32)>,
    pub probes: Vec<ProbeResult>,
}

pub fn default_candidate_devs() -> Vec<String> {
    vec![
        "/dev/serial0".into(),
        "/dev/ttyAMA0".into(),
        "/dev/ttyS0".into(),
        "/dev/ttyUSB0".into(),
        "/dev/ttyUSB1".into(),
        "/dev/ttyACM0".into(),
        "/dev/ttyACM1".into(),
    ]
}

pub fn default_candidate_bauds() -> Vec<u32> {
    vec![57600, 115200, 230400, 921600]
}

/// Probes every device × baud pair and returns the first that carries a
/// heartbeat from `target_sys`.
pub fn autodetect_fc(
    candidate_devs: Vec<String>,
    candidate_bauds: Vec<u32>,
    heartbeat_timeout: Duration,
    target_sys: u8,
) -> Result<AutodetectResult> {
    let mut probes = Vec::new();

    for dev in candidate_devs {
        for baud in &candidate_bauds {
            let start = Instant::now();
            let mut hb_seen = false;

            let note = match open_serial(&dev, *baud) {
                Ok(conn) => {
                    // Wait briefly for heartbeat
                    while start.elapsed() < heartbeat_timeout {
                        if let Ok((hdr, msg)) = conn.recv() {
                            if is_fc_heartbeat(hdr.system_id, &msg, target_sys) {
                                hb_seen = true;
                                break;
                            }
                        }
                        std::thread::sleep(Duration::from_millis(25));
                    }
                    if hb_seen { "heartbeat".to_string() } else { "no heartbeat".to_string() }
                }
                Err(e) => {
                    warn!("fc autodetect probe failed dev={} baud={} err={:#}", dev, baud, e);
                    format!("open/connect failed: {:#}", e)
                }
            };

            probes.push(ProbeResult {
                dev: dev.clone(),
                baud: *baud,
                hb_seen,
                elapsed_ms: start.elapsed().as_millis() as u64,
                note,
            });

            if hb_seen {
                info!("fc autodetect: OK {} @ {}", dev, baud);
                return Ok(AutodetectResult { chosen: Some((dev, *baud)), probes });
            }
        }
    }

    Ok(AutodetectResult { chosen: None, probes })
}

fn is_fc_heartbeat(system_id: u8, msg: &MavMessage, target_sys: u8) -> bool {
    system_id == target_sys && matches!(msg, MavMessage::HEARTBEAT(_))
}
