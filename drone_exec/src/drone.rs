//! # Vehicle facade
//!
//! `Drone` owns the link to the flight controller and the two tasks which
//! service it. Manoeuvres are staged on a local command and then applied to
//! the shared command block, which the writer transmits on its next tick.
//!
//! Nothing here reports transport failures synchronously, the link health
//! is polled through `Drone::healthy`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    io::BufReader,
    net::{Shutdown, TcpStream},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error, info, warn};

use comms_if::{
    msp::{Attitude, CommandSink, MspReader, MspWriter, TelemetrySource},
    net::{self, ConnectError},
    tc::{DroneCmd, CMD_NONE, CMD_TAKE_OFF, RC_MID, RC_MIN},
};

use crate::{
    link::{LinkStatus, WriterStats, WriterStatsSnapshot},
    params::DroneExecParams,
    reader::reader_thread,
    shared::{ApVector, CmdBlock, SharedCmd},
    telemetry::{Telemetry, TelemetrySnapshot},
    writer::writer_thread,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Facade over the flight controller link.
pub struct Drone {
    params: DroneExecParams,

    /// Command staged by the manoeuvre methods, applied with `apply`
    staged: DroneCmd,

    cmd: Arc<SharedCmd>,
    telemetry: Arc<TelemetrySnapshot>,
    status: Arc<LinkStatus>,
    stats: Arc<WriterStats>,

    /// Handle used to close the link, the tasks own clones of it
    transport: Option<TcpStream>,

    writer_handle: Option<JoinHandle<()>>,
    reader_handle: Option<JoinHandle<()>>,

    flight_state: FlightState,

    /// Set once the tasks have been stopped and the transport closed
    released: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The flight state as last commanded through the facade.
///
/// This is what was asked of the vehicle, not what it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    GroundedDisarmed,
    ArmedIdle,
    Flying,
    Landing,
}

#[derive(Debug, thiserror::Error)]
pub enum DroneError {
    #[error("Could not connect to the flight controller: {0}")]
    Connect(#[from] ConnectError),

    #[error("Could not clone the transport handle: {0}")]
    CloneTransport(std::io::Error),

    #[error("Could not spawn the {0} thread: {1}")]
    SpawnThread(&'static str, std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Drone {
    /// Connect to the flight controller bridge and start the writer and
    /// reader tasks.
    ///
    /// Connection is retried as configured in `params.net`. On exhaustion
    /// `DroneError::Connect` is returned.
    pub fn connect(params: &DroneExecParams) -> Result<Self, DroneError> {
        let stream = net::connect(&params.net)?;

        info!("Connected to the flight controller at {}", params.net.endpoint());

        Self::from_stream(params, stream)
    }

    /// Start the writer and reader tasks on an already connected stream.
    pub fn from_stream(params: &DroneExecParams, stream: TcpStream) -> Result<Self, DroneError> {
        let writer_stream = stream.try_clone().map_err(DroneError::CloneTransport)?;
        let reader_stream = stream.try_clone().map_err(DroneError::CloneTransport)?;

        let mut drone = Self {
            params: params.clone(),
            staged: DroneCmd::default(),
            cmd: Arc::new(SharedCmd::new()),
            telemetry: Arc::new(TelemetrySnapshot::new()),
            status: Arc::new(LinkStatus::new()),
            stats: Arc::new(WriterStats::default()),
            transport: Some(stream),
            writer_handle: None,
            reader_handle: None,
            flight_state: FlightState::GroundedDisarmed,
            released: false,
        };

        // If either spawn fails the drone is dropped here, which stops
        // whatever was already started.
        drone.writer_handle = Some(drone.spawn_writer(Box::new(MspWriter::new(writer_stream)))?);
        drone.reader_handle = Some(
            drone.spawn_reader(Box::new(MspReader::new(BufReader::new(reader_stream))))?
        );

        Ok(drone)
    }

    fn spawn_writer(&self, sink: Box<dyn CommandSink>) -> Result<JoinHandle<()>, DroneError> {
        let cmd = self.cmd.clone();
        let status = self.status.clone();
        let stats = self.stats.clone();
        let period = self.params.writer_period();

        thread::Builder::new()
            .name(String::from("fc_writer"))
            .spawn(move || writer_thread(sink, cmd, status, stats, period))
            .map_err(|e| DroneError::SpawnThread("writer", e))
    }

    fn spawn_reader(&self, source: Box<dyn TelemetrySource>) -> Result<JoinHandle<()>, DroneError> {
        let telemetry = self.telemetry.clone();
        let status = self.status.clone();

        thread::Builder::new()
            .name(String::from("fc_reader"))
            .spawn(move || reader_thread(source, telemetry, status))
            .map_err(|e| DroneError::SpawnThread("reader", e))
    }

    // ---- MANOEUVRES ----

    /// Arm the vehicle at minimum throttle, then wait for the flight
    /// controller to register it.
    pub fn arm(&mut self) {
        info!("Arming");

        self.reset();
        self.set_armed_sticks(RC_MIN);
        self.apply();
        self.flight_state = FlightState::ArmedIdle;

        pause(self.params.arm_pause());
    }

    /// Arm the vehicle at mid throttle.
    pub fn box_arm(&mut self) {
        debug!("Box arming");

        self.set_armed_sticks(RC_MID);
        self.apply();
        self.flight_state = FlightState::ArmedIdle;

        pause(self.params.box_arm_pause());
    }

    /// Disarm the vehicle.
    pub fn disarm(&mut self) {
        info!("Disarming");

        self.staged.rc_throttle = RC_MID;
        self.staged.rc_aux4 = RC_MIN;
        self.apply();
        self.flight_state = FlightState::GroundedDisarmed;

        pause(self.params.disarm_pause());
    }

    /// Take off by cycling the arm state and sending the take-off command.
    pub fn takeoff(&mut self) {
        info!("Taking off");

        self.reset();
        self.disarm();
        self.box_arm();

        self.staged.command_type = CMD_TAKE_OFF;
        self.apply();
        self.flight_state = FlightState::Flying;
    }

    /// Drop to the land throttle, nothing else is changed.
    pub fn land(&mut self) {
        info!("Landing");

        self.staged.rc_throttle = self.params.land_throttle;
        self.apply();
        self.flight_state = FlightState::Landing;
    }

    /// Raise the throttle to the climb set-point.
    pub fn increase_height(&mut self) {
        self.staged.rc_throttle = self.params.climb_throttle;
        self.apply();
    }

    /// Drop the throttle to the land set-point.
    pub fn decrease_height(&mut self) {
        self.staged.rc_throttle = self.params.land_throttle;
        self.apply();
    }

    /// Return the staged sticks to neutral and drop any pending command.
    ///
    /// The neutral sticks are only transmitted by the next manoeuvre which
    /// applies the staged command.
    pub fn reset(&mut self) {
        self.staged.rc_roll = RC_MID;
        self.staged.rc_pitch = RC_MID;
        self.staged.rc_throttle = RC_MID;
        self.staged.rc_yaw = RC_MID;
        self.staged.command_type = CMD_NONE;

        if let Some(c) = self.cmd.take_one_shot() {
            debug!("Pending command {} dropped by reset", c);
        }
    }

    // ---- COMMAND INPUT ----

    /// Submit an externally produced command.
    ///
    /// Blocks until the command block lock is free. The staged command
    /// follows the submitted one so later manoeuvres start from it.
    pub fn send_command(&mut self, cmd: &DroneCmd) {
        self.cmd.write_manual(cmd);
        self.staged = DroneCmd {
            command_type: CMD_NONE,
            ..*cmd
        };
    }

    /// Install a new autopilot vector.
    pub fn set_autopilot(&self, ap: ApVector) {
        self.cmd.set_autopilot(ap);
    }

    /// Switch autopilot blending on or off.
    pub fn engage_autopilot(&mut self, on: bool) {
        if self.staged.is_autopilot_on != on {
            info!("Autopilot {}", if on { "engaged" } else { "disengaged" });
        }

        self.staged.is_autopilot_on = on;
        self.apply();
    }

    // ---- QUERIES ----

    /// Last known attitude. Never blocks, may be stale.
    pub fn get_state(&self) -> Attitude {
        self.telemetry.attitude()
    }

    /// Last known telemetry.
    pub fn telemetry(&self) -> Telemetry {
        self.telemetry.latest()
    }

    /// True iff both tasks are running and no transport error has been seen.
    pub fn healthy(&self) -> bool {
        self.status.healthy()
    }

    pub fn flight_state(&self) -> FlightState {
        self.flight_state
    }

    pub fn writer_stats(&self) -> WriterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Copy of the shared command block.
    pub fn command_snapshot(&self) -> CmdBlock {
        self.cmd.read_snapshot()
    }

    // ---- TEARDOWN ----

    /// Land, disarm and close the link.
    ///
    /// Never fails, a transport which is already broken is tolerated.
    pub fn shutdown(mut self) {
        info!("Shutting down the flight controller link");

        self.land();
        self.disarm();

        self.status.request_stop();
        pause(self.params.teardown_pause());

        self.release();
        pause(self.params.teardown_pause());

        info!("Flight controller link closed");
    }

    // ---- PRIVATE ----

    fn set_armed_sticks(&mut self, throttle: u16) {
        self.staged.rc_roll = RC_MID;
        self.staged.rc_pitch = RC_MID;
        self.staged.rc_yaw = RC_MID;
        self.staged.rc_throttle = throttle;
        self.staged.rc_aux4 = RC_MID;
        self.staged.is_autopilot_on = false;
    }

    /// Write the staged command into the shared block.
    ///
    /// The staged one-shot command is cleared once submitted so no later
    /// manoeuvre submits it again. Applying with no staged command leaves a
    /// command the writer has not sent yet pending, only `reset` drops it.
    fn apply(&mut self) {
        let mut block = self.cmd.lock();
        let pending = block.command_type;

        block.write_manual(&self.staged);
        if self.staged.command_type == CMD_NONE {
            block.command_type = pending;
        }
        drop(block);

        self.staged.command_type = CMD_NONE;
    }

    /// Stop the tasks, close the transport and join the tasks.
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        self.status.request_stop();

        // Closing unblocks the reader. Errors mean it was already closed.
        if let Some(stream) = self.transport.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!("Transport close: {}", e);
            }
        }

        for (name, handle) in [
            ("writer", self.writer_handle.take()),
            ("reader", self.reader_handle.take()),
        ]
        .iter_mut()
        {
            if let Some(h) = handle.take() {
                if h.join().is_err() {
                    error!("The {} thread panicked", name);
                }
            }
        }
    }
}

impl Drop for Drone {
    fn drop(&mut self) {
        if !self.released {
            warn!("Drone dropped without shutdown, releasing the link without landing");
            self.release();
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn pause(duration: Duration) {
    if duration > Duration::from_secs(0) {
        thread::sleep(duration);
    }
}
