//! Main drone-side executable entry point.
//!
//! # Architecture
//!
//! - Initialise the session, logging and parameters
//! - Connect to the flight controller bridge
//! - Arm and take off
//! - Hold loop:
//!     - Monitor link health, landing early if it is lost
//!     - Optionally hold the take-off altitude with position control
//! - Land, disarm and close the link

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use nalgebra::Vector3;
use std::{
    collections::VecDeque,
    path::PathBuf,
    thread,
    time::Instant,
};
use structopt::StructOpt;

// Internal
use comms_if::tc::DroneCmd;
use drone_lib::{
    drone::Drone,
    params::DroneExecParams,
    pos_ctrl::{InputData, PosCtrl},
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
    time::secs_to_duration,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Arm, take off, hover and land.
#[derive(Debug, StructOpt)]
#[structopt(name = "drone_exec")]
struct Opt {
    /// Time to hover after take-off, in seconds
    #[structopt(long, default_value = "10.0")]
    hold_s: f64,

    /// Period between health and attitude reports, in seconds
    #[structopt(long, default_value = "0.5")]
    monitor_period_s: f64,

    /// Hold the take-off altitude with the position controller
    #[structopt(long)]
    pos_hold: bool,

    /// Pilot command script, one JSON command per line, applied one line
    /// per report period during the hold
    #[structopt(long, parse(from_os_str))]
    script: Option<PathBuf>,

    /// Minimum log level, one of info, debug or trace
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("drone_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opt.log_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Pluto Drone Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let params: DroneExecParams = util::params::load("drone_exec.toml")
        .wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    let mut script: VecDeque<DroneCmd> = match &opt.script {
        Some(path) => {
            let cmds = DroneCmd::parse_script(
                &std::fs::read_to_string(path)
                    .wrap_err_with(|| format!("Could not read script {:?}", path))?
            ).wrap_err("Could not parse the script")?;
            info!("Loaded {} scripted commands from {:?}", cmds.len(), path);
            cmds.into()
        }
        None => VecDeque::new(),
    };

    // ---- INITIALISE MODULES ----

    let mut pos_ctrl = PosCtrl::default();
    pos_ctrl.init("pos_ctrl.toml")
        .wrap_err("Failed to initialise PosCtrl")?;
    info!("PosCtrl init complete");

    // ---- CONNECT ----

    let mut drone = Drone::connect(&params)
        .wrap_err("Failed to connect to the flight controller")?;

    // ---- FLIGHT ----

    drone.arm();
    drone.takeoff();

    // The cycle runs at the control rate when holding position, otherwise
    // it only needs to keep up with the reports.
    let cycle_period = if opt.pos_hold {
        secs_to_duration(pos_ctrl.params().control_timestep_s)
    } else {
        secs_to_duration(opt.monitor_period_s)
    };
    let monitor_period = secs_to_duration(opt.monitor_period_s);
    let hold_duration = secs_to_duration(opt.hold_s);

    let target_pos_m = Vector3::new(0.0, 0.0, drone.telemetry().altitude.est_alt_m());

    if opt.pos_hold {
        info!("Holding altitude {:.02} m", target_pos_m.z);
        pos_ctrl.reset();
        drone.engage_autopilot(true);
    }

    let hold_start = Instant::now();
    let mut last_report = hold_start;

    while hold_start.elapsed() < hold_duration {
        let cycle_start_instant = Instant::now();

        // ---- HEALTH ----

        if !drone.healthy() {
            warn!("Flight controller link lost, landing early");
            break;
        }

        // ---- POSITION CONTROL ----

        if opt.pos_hold {
            let telemetry = drone.telemetry();
            let input = InputData {
                cur_pos_m: Vector3::new(0.0, 0.0, telemetry.altitude.est_alt_m()),
                cur_rpy_rad: Vector3::from(telemetry.attitude.to_radians()),
                target_pos_m,
            };

            match pos_ctrl.proc(&input) {
                Ok((output, report)) => {
                    drone.set_autopilot(output.to_ap_vector(pos_ctrl.params()));

                    if report.roll_limited || report.pitch_limited {
                        debug!("PosCtrl tilt limited: {:?}", report);
                    }
                }
                Err(e) => warn!("PosCtrl error: {}", e),
            }
        }

        // ---- REPORTING ----

        if last_report.elapsed() >= monitor_period {
            if let Some(cmd) = script.pop_front() {
                debug!("Scripted command: {:?}", cmd);
                drone.send_command(&cmd);
            }

            let att = drone.get_state();
            info!(
                "Attitude: roll {:.01}, pitch {:.01}, yaw {:.01} deg",
                att.roll_deg, att.pitch_deg, att.yaw_deg
            );
            last_report = Instant::now();
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
            ),
        }
    }

    // ---- SHUTDOWN ----

    if opt.pos_hold {
        drone.engage_autopilot(false);
    }

    info!("Writer stats: {:?}", drone.writer_stats());
    info!(
        "Final telemetry: {}",
        serde_json::to_string(&drone.telemetry())
            .wrap_err("Failed to serialise the telemetry")?
    );

    drone.shutdown();

    info!("End of execution");

    Ok(())
}
