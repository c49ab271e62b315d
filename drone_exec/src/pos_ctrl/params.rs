//! Parameters structure for PosCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::PosCtrlError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for position control.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {

    // ---- GAINS ----

    /// Proportional gain per axis (x, y, z)
    pub k_p: [f64; 3],

    /// Integral gain per axis (x, y, z)
    pub k_i: [f64; 3],

    /// Derivative gain per axis (x, y, z)
    pub k_d: [f64; 3],

    // ---- PHYSICAL ----

    /// Gravitational acceleration used for gravity compensation.
    ///
    /// Units: meters/second^2
    pub gravity_mss: f64,

    /// Limit on the target roll and pitch.
    ///
    /// Units: radians
    pub max_roll_pitch_rad: f64,

    /// Fixed timestep between calls to the controller.
    ///
    /// Units: seconds
    pub control_timestep_s: f64,

    // ---- AUTOPILOT MAPPING ----

    /// RC offset from neutral commanded at the roll/pitch limit.
    pub ap_tilt_span: f64,

    /// Thrust offset from hover (`gravity_mss`) which maps to full or zero
    /// throttle.
    pub ap_thrust_span: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters can be used by the controller.
    pub fn validate(&self) -> Result<(), PosCtrlError> {
        let positive = [
            ("control_timestep_s", self.control_timestep_s),
            ("max_roll_pitch_rad", self.max_roll_pitch_rad),
            ("ap_tilt_span", self.ap_tilt_span),
            ("ap_thrust_span", self.ap_thrust_span),
        ];

        for (name, value) in positive.iter() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(PosCtrlError::InvalidParam(*name, *value));
            }
        }

        if !self.gravity_mss.is_finite() {
            return Err(PosCtrlError::InvalidParam("gravity_mss", self.gravity_mss));
        }

        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            k_p: [0.1, 0.1, 0.2],
            k_i: [0.0001, 0.0001, 0.0001],
            k_d: [0.3, 0.3, 0.4],
            gravity_mss: 9.8,
            max_roll_pitch_rad: std::f64::consts::PI / 6.0,
            control_timestep_s: 1.0 / 125.0,
            ap_tilt_span: 500.0,
            ap_thrust_span: 9.8,
        }
    }
}
