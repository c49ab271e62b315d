//! # Executable parameters
//!
//! Parameters of the vehicle link and the facade's manoeuvre set-points,
//! loaded from `params/drone_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Duration;

use serde::Deserialize;

use comms_if::net::NetParams;
use util::time::secs_to_duration;

use crate::writer::WRITER_PERIOD_S;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for `drone_exec`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DroneExecParams {
    /// Connection to the flight controller bridge
    pub net: NetParams,

    /// Period of the command writer.
    ///
    /// Units: seconds
    pub writer_period_s: f64,

    /// Pause after arming to let the flight controller register it.
    ///
    /// Units: seconds
    pub arm_pause_s: f64,

    /// Pause after arming at mid throttle.
    ///
    /// Units: seconds
    pub box_arm_pause_s: f64,

    /// Pause after disarming.
    ///
    /// Units: seconds
    pub disarm_pause_s: f64,

    /// Grace period between stopping the tasks and closing the transport,
    /// and again after closing.
    ///
    /// Units: seconds
    pub teardown_pause_s: f64,

    /// Throttle set-point giving a net descent
    pub land_throttle: u16,

    /// Throttle set-point giving a net climb
    pub climb_throttle: u16,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DroneExecParams {
    pub fn writer_period(&self) -> Duration {
        secs_to_duration(self.writer_period_s)
    }

    pub fn arm_pause(&self) -> Duration {
        secs_to_duration(self.arm_pause_s)
    }

    pub fn box_arm_pause(&self) -> Duration {
        secs_to_duration(self.box_arm_pause_s)
    }

    pub fn disarm_pause(&self) -> Duration {
        secs_to_duration(self.disarm_pause_s)
    }

    pub fn teardown_pause(&self) -> Duration {
        secs_to_duration(self.teardown_pause_s)
    }
}

impl Default for DroneExecParams {
    fn default() -> Self {
        Self {
            net: NetParams::default(),
            writer_period_s: WRITER_PERIOD_S,
            arm_pause_s: 1.0,
            box_arm_pause_s: 0.5,
            disarm_pause_s: 0.5,
            teardown_pause_s: 0.5,
            land_throttle: 1300,
            climb_throttle: 2000,
        }
    }
}
