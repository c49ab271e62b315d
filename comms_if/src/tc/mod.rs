//! # Pilot command module
//!
//! This module defines the command structure accepted by the vehicle from any
//! input source, be it manual (keyboard, joystick) or the autopilot.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of RC channels sent to the flight controller each tick.
pub const NUM_RC_CHANNELS: usize = 8;

/// Lowest valid RC channel value.
pub const RC_MIN: u16 = 1000;

/// Neutral RC channel value.
pub const RC_MID: u16 = 1500;

/// Highest valid RC channel value.
pub const RC_MAX: u16 = 2000;

/// Channel indexes.
pub const ROLL: usize = 0;
pub const PITCH: usize = 1;
pub const THROTTLE: usize = 2;
pub const YAW: usize = 3;
pub const AUX1: usize = 4;
pub const AUX2: usize = 5;
pub const AUX3: usize = 6;

/// The arm/mode channel. A value of `RC_MID` on this channel permits the
/// autopilot blend, `RC_MIN` disarms.
pub const AUX4: usize = 7;

/// One-shot command code meaning "no command".
pub const CMD_NONE: u16 = 0;

/// One-shot command code which asks the flight controller to take off and
/// hold altitude.
pub const CMD_TAKE_OFF: u16 = 1;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Error in a pilot command script.
#[derive(Debug, Error)]
#[error("Invalid command on line {line}: {source}")]
pub struct ScriptError {
    /// 1-based line number
    pub line: usize,
    pub source: serde_json::Error,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A complete set of RC channel values.
///
/// Channels are always handled as a whole 8-tuple so a reader never sees a
/// partially updated set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcChannels(pub [u16; NUM_RC_CHANNELS]);

/// A command produced by an input source.
///
/// This is the only shape of input the vehicle accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneCmd {
    pub rc_roll: u16,
    pub rc_pitch: u16,
    pub rc_throttle: u16,
    pub rc_yaw: u16,
    pub rc_aux1: u16,
    pub rc_aux2: u16,
    pub rc_aux3: u16,

    /// Arm/mode channel
    pub rc_aux4: u16,

    /// If true the autopilot vector is blended onto the manual channels
    /// whenever the mode channel is neutral.
    pub is_autopilot_on: bool,

    /// One-shot command code, `CMD_NONE` for no command.
    pub command_type: u16
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RcChannels {
    /// Clamp every channel into `[RC_MIN, RC_MAX]`.
    pub fn clamped(self) -> Self {
        let mut channels = self.0;
        for c in channels.iter_mut() {
            *c = (*c).max(RC_MIN).min(RC_MAX);
        }
        Self(channels)
    }

    /// The arm/mode channel value.
    pub fn mode(&self) -> u16 {
        self.0[AUX4]
    }
}

impl Default for RcChannels {
    /// Neutral sticks with all AUX channels low.
    fn default() -> Self {
        Self([RC_MID, RC_MID, RC_MID, RC_MID, RC_MIN, RC_MIN, RC_MIN, RC_MIN])
    }
}

impl std::ops::Index<usize> for RcChannels {
    type Output = u16;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl std::ops::IndexMut<usize> for RcChannels {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl DroneCmd {
    /// Parse a command from a JSON string, as sent by external input
    /// processes.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Parse a pilot command script, one JSON command per line.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    pub fn parse_script(script: &str) -> Result<Vec<Self>, ScriptError> {
        script
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
            .map(|(line, l)| Self::from_json(l).map_err(|source| ScriptError { line, source }))
            .collect()
    }

    /// Get the 8 RC channels of this command in transmission order.
    pub fn rc_channels(&self) -> RcChannels {
        RcChannels([
            self.rc_roll,
            self.rc_pitch,
            self.rc_throttle,
            self.rc_yaw,
            self.rc_aux1,
            self.rc_aux2,
            self.rc_aux3,
            self.rc_aux4
        ])
    }
}

impl Default for DroneCmd {
    fn default() -> Self {
        let rc = RcChannels::default();

        Self {
            rc_roll: rc[ROLL],
            rc_pitch: rc[PITCH],
            rc_throttle: rc[THROTTLE],
            rc_yaw: rc[YAW],
            rc_aux1: rc[AUX1],
            rc_aux2: rc[AUX2],
            rc_aux3: rc[AUX3],
            rc_aux4: rc[AUX4],
            is_autopilot_on: false,
            command_type: CMD_NONE
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rc_channels_order() {
        let cmd = DroneCmd {
            rc_roll: 1100,
            rc_pitch: 1200,
            rc_throttle: 1300,
            rc_yaw: 1400,
            rc_aux1: 1500,
            rc_aux2: 1600,
            rc_aux3: 1700,
            rc_aux4: 1800,
            ..Default::default()
        };

        assert_eq!(
            cmd.rc_channels(),
            RcChannels([1100, 1200, 1300, 1400, 1500, 1600, 1700, 1800])
        );
        assert_eq!(cmd.rc_channels().mode(), 1800);
    }

    #[test]
    fn test_clamped() {
        let rc = RcChannels([900, 2100, 1500, 1000, 2000, 0, u16::MAX, 1999]).clamped();
        assert_eq!(rc, RcChannels([1000, 2000, 1500, 1000, 2000, 1000, 2000, 1999]));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "rc_roll": 1500, "rc_pitch": 1500, "rc_throttle": 1300, "rc_yaw": 1500,
            "rc_aux1": 1000, "rc_aux2": 1000, "rc_aux3": 1000, "rc_aux4": 1500,
            "is_autopilot_on": true, "command_type": 1
        }"#;

        let cmd = DroneCmd::from_json(json).unwrap();
        assert_eq!(cmd.rc_throttle, 1300);
        assert!(cmd.is_autopilot_on);
        assert_eq!(cmd.command_type, CMD_TAKE_OFF);

        assert!(DroneCmd::from_json("{\"rc_roll\": 1500}").is_err());
    }

    #[test]
    fn test_parse_script() {
        let cmd = r#"{"rc_roll": 1600, "rc_pitch": 1500, "rc_throttle": 1500, "rc_yaw": 1500, "rc_aux1": 1000, "rc_aux2": 1000, "rc_aux3": 1000, "rc_aux4": 1500, "is_autopilot_on": false, "command_type": 0}"#;
        let script = format!("# roll right\n{}\n\n  {}  \n", cmd, cmd);

        let cmds = DroneCmd::parse_script(&script).unwrap();
        assert_eq!(cmds.len(), 2);
        assert!(cmds.iter().all(|c| c.rc_roll == 1600));

        let bad = format!("{}\n# comment\n{{\"rc_roll\": 1}}\n", cmd);
        match DroneCmd::parse_script(&bad) {
            Err(ScriptError { line, .. }) => assert_eq!(line, 3),
            Ok(_) => panic!("Script with a bad line parsed"),
        }
    }
}
