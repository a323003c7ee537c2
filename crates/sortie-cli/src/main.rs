use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::{info, warn};

use sortie_fc::autodetect::{autodetect_fc, default_candidate_bauds, default_candidate_devs, AutodetectResult};
use sortie_fc::mav::MavVehicle;
use sortie_fc::{FcConfig, VehicleLink};
use sortie_mission::{FlightLog, MissionConfig, MissionResult, MissionRunner, TimingConfig};
use sortie_nav::{doctor as nav_doctor, route::Route};

#[derive(Debug, Parser)]
#[command(name = "sortie", version, about = "sortie - waypoint missions for MAVLink copters")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config without touching the vehicle.
    Doctor,
    /// Print the legs of the configured mission.
    Plan,
    /// Arm, take off, fly the waypoints and return to launch.
    Run,
    Fc { #[command(subcommand)] cmd: FcCmd },
}

#[derive(Debug, Subcommand)]
enum FcCmd {
    /// Probe serial ports/bauds for MAVLink heartbeats.
    Autodetect,
    /// Connect, wait for telemetry and print the vehicle state.
    Status,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    fc: FcConfig,
    mission: MissionConfig,
    #[serde(default)]
    timing: TimingConfig,
    #[serde(default)]
    log: LogCfg,
}

#[derive(Debug, serde::Deserialize)]
struct LogCfg { dir: String }

impl Default for LogCfg {
    fn default() -> Self {
        Self { dir: ".".into() }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Plan => plan(&cfg)?,
        Command::Run => run(&cfg).await?,
        Command::Fc { cmd } => fc_cmd(&cfg, cmd).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    nav_doctor::check_waypoints(&cfg.mission.waypoints)?;
    nav_doctor::check_flight_params(cfg.mission.takeoff_alt_m, cfg.mission.groundspeed_mps, cfg.mission.arrival_fraction)?;
    if cfg.mission.waypoints.is_empty() {
        warn!("doctor: mission has no waypoints (takeoff then RTL)");
    }

    anyhow::ensure!(cfg.timing.phase_poll_ms > 0 && cfg.timing.transit_poll_ms > 0, "timing poll intervals must be > 0");
    if cfg.timing.pre_arm_timeout_s.is_none() || cfg.timing.arm_timeout_s.is_none() || cfg.timing.takeoff_timeout_s.is_none() {
        info!("doctor: some phase waits have no timeout and will wait indefinitely");
    }

    if cfg.fc.autodetect {
        info!("doctor: fc autodetect enabled (OK)");
    } else {
        anyhow::ensure!(cfg.fc.serial_dev.as_ref().map(|s| !s.is_empty()).unwrap_or(false), "fc.serial_dev missing");
        anyhow::ensure!(cfg.fc.baud.unwrap_or(0) > 0, "fc.baud invalid");
    }
    if !cfg.fc.require_heartbeat {
        warn!("doctor: fc.require_heartbeat=false, commands may go out before the FC is up");
    }

    let dir = std::path::Path::new(&cfg.log.dir);
    anyhow::ensure!(!dir.exists() || dir.is_dir(), "log.dir {} is not a directory", cfg.log.dir);

    info!("doctor: OK");
    Ok(())
}

fn plan(cfg: &Config) -> Result<()> {
    let wps = &cfg.mission.waypoints;
    println!("takeoff to {:.1}m, cruise {:.1}m/s", cfg.mission.takeoff_alt_m, cfg.mission.groundspeed_mps);
    let Some((first, rest)) = wps.split_first() else {
        println!("no waypoints: takeoff then RTL");
        return Ok(());
    };
    println!("wp 1: {:.7},{:.7} alt={:.1}m (leg from launch point)", first.lat, first.lon, first.alt_m);
    let route = Route::new(*first, rest);
    for leg in route.legs() {
        println!(
            "wp {}: {:.7},{:.7} alt={:.1}m leg={:.1}m arrive<={:.1}m planar_err={:.2}%",
            leg.index + 2,
            leg.to.lat,
            leg.to.lon,
            leg.to.alt_m,
            leg.distance_m(),
            leg.distance_m() * cfg.mission.arrival_fraction,
            leg.planar_error() * 100.0,
        );
    }
    println!("total between waypoints: {:.1}m", route.total_m());
    Ok(())
}

async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");
    doctor(cfg).context("config check")?;

    let vehicle = open_vehicle(&cfg.fc).await?;
    let log = FlightLog::create(&cfg.log.dir)?;
    info!("run: flight log {}", log.path().display());

    let runner = MissionRunner::new(vehicle, log, cfg.mission.clone(), cfg.timing.clone());
    match runner.run().await.context("mission failed")? {
        MissionResult::Completed => info!("run: mission completed"),
        MissionResult::AbortedAt(i) => warn!("run: mission aborted at waypoint {} (operator or failsafe took over)", i + 1),
    }
    Ok(())
}

async fn fc_cmd(cfg: &Config, cmd: FcCmd) -> Result<()> {
    match cmd {
        FcCmd::Autodetect => {
            let res = run_fc_autodetect(&cfg.fc)?;
            if let Some((dev, baud)) = res.chosen {
                println!("CHOSEN: {} @ {}", dev, baud);
            } else {
                println!("CHOSEN: none");
            }
            for p in res.probes {
                println!("probe dev={} baud={} hb={} {}ms note={}", p.dev, p.baud, p.hb_seen, p.elapsed_ms, p.note);
            }
            Ok(())
        }
        FcCmd::Status => {
            let vehicle = open_vehicle(&cfg.fc).await?;
            // give GLOBAL_POSITION_INT a moment to arrive
            tokio::time::sleep(Duration::from_secs(1)).await;

            let t = vehicle.snapshot();
            println!("port={:?} baud={:?}", t.port, t.baud);
            println!("last_heartbeat_age={:?}", t.hb_age());
            println!("last_msg={:?}", t.last_msg);
            match vehicle.state().await {
                Ok(st) => {
                    println!("mode={} armed={} armable={}", st.mode, st.armed, st.is_armable);
                    println!("position={:.7},{:.7} rel_alt={:.1}m", st.position.lat, st.position.lon, st.position.alt_m);
                }
                Err(e) => println!("state unavailable: {}", e),
            }
            Ok(())
        }
    }
}

async fn open_vehicle(fc: &FcConfig) -> Result<MavVehicle> {
    let (dev, baud) = resolve_fc_port(fc)?;
    let vehicle = MavVehicle::open(fc, &dev, baud).context("FC open")?;
    if fc.require_heartbeat {
        vehicle
            .wait_for_heartbeat(fc.link_timeout())
            .await
            .context("waiting for FC heartbeat")?;
    }
    Ok(vehicle)
}

fn run_fc_autodetect(fc: &FcConfig) -> Result<AutodetectResult> {
    let devs = fc.candidate_devs.clone().unwrap_or_else(default_candidate_devs);
    let bauds = fc.candidate_bauds.clone().unwrap_or_else(default_candidate_bauds);
    autodetect_fc(devs, bauds, fc.heartbeat_timeout(), fc.target_sys)
}

fn resolve_fc_port(fc: &FcConfig) -> Result<(String, u32)> {
    if fc.autodetect {
        let res = run_fc_autodetect(fc)?;
        if let Some((dev, baud)) = res.chosen {
            return Ok((dev, baud));
        }
        anyhow::bail!("fc autodetect failed: no heartbeat found");
    } else {
        let dev = fc.serial_dev.clone().context("fc.serial_dev missing (autodetect=false)")?;
        let baud = fc.baud.context("fc.baud missing (autodetect=false)")?;
        Ok((dev, baud))
    }
}
