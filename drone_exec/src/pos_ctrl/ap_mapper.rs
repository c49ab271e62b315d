//! Mapping of the position controller output onto the autopilot RC vector

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::tc::{RC_MAX, RC_MID, RC_MIN};
use util::maths::{clamp, lin_map};

use super::{OutputData, Params};
use crate::shared::ApVector;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl OutputData {
    /// Convert the target attitude and thrust into autopilot RC targets.
    ///
    /// Roll and pitch map linearly from the tilt limit onto
    /// `RC_MID +/- ap_tilt_span`, thrust maps from
    /// `gravity_mss +/- ap_thrust_span` onto the full throttle range. Yaw is
    /// held at neutral.
    pub fn to_ap_vector(&self, params: &Params) -> ApVector {
        let mid = RC_MID as f64;
        let max_tilt = params.max_roll_pitch_rad;

        let tilt = |angle: f64| {
            lin_map(
                (-max_tilt, max_tilt),
                (mid - params.ap_tilt_span, mid + params.ap_tilt_span),
                angle,
            )
        };

        let throttle = lin_map(
            (
                params.gravity_mss - params.ap_thrust_span,
                params.gravity_mss + params.ap_thrust_span,
            ),
            (RC_MIN as f64, RC_MAX as f64),
            self.thrust,
        );

        ApVector([
            to_channel(tilt(self.target_rpy_rad.x)),
            to_channel(tilt(self.target_rpy_rad.y)),
            to_channel(throttle),
            RC_MID,
        ])
    }
}

/// Round and clamp a raw value into the RC channel range.
fn to_channel(value: f64) -> u16 {
    clamp(&value.round(), &(RC_MIN as f64), &(RC_MAX as f64)) as u16
}
