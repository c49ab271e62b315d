//! Implementations for the PosCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{Rotation3, Vector3};
use serde::Serialize;

// Internal
use super::{Params, PosCtrlError};
use util::{
    maths::{clamp, sign_nonzero},
    module::State,
    params,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Position control module state
#[derive(Debug, Default, Clone, Serialize)]
pub struct PosCtrl {
    pub(crate) params: Params,

    /// Position error on the previous step
    last_pos_e: Vector3<f64>,

    /// Accumulated position error. There is no anti-windup limit.
    integral_pos_e: Vector3<f64>,

    /// Number of steps since the last reset
    control_counter: u64,
}

/// Input data to position control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Current position.
    ///
    /// Units: meters
    pub cur_pos_m: Vector3<f64>,

    /// Current attitude as roll, pitch, yaw.
    ///
    /// Units: radians
    pub cur_rpy_rad: Vector3<f64>,

    /// Position to hold.
    ///
    /// Units: meters
    pub target_pos_m: Vector3<f64>,
}

/// Output of position control.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutputData {
    /// Target roll, pitch and yaw. Yaw is always zero.
    ///
    /// Units: radians
    pub target_rpy_rad: Vector3<f64>,

    /// Thrust along the body Z axis, `gravity_mss` when hovering level.
    pub thrust: f64,
}

/// Status report for position control processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Position error on this step.
    ///
    /// Units: meters
    pub pos_error_m: Vector3<f64>,

    pub roll_limited: bool,
    pub pitch_limited: bool,

    /// The target force was zero so no tilt could be derived from it
    pub zero_force: bool,

    pub control_counter: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PosCtrl {
    /// Create a new controller from the given parameters.
    pub fn new(params: Params) -> Result<Self, PosCtrlError> {
        params.validate()?;

        Ok(Self {
            params,
            ..Default::default()
        })
    }

    /// Run one control step and return the target attitude and thrust.
    ///
    /// Non-finite inputs are rejected as in `proc`, leaving the controller
    /// memory untouched.
    pub fn update(
        &mut self,
        cur_pos_m: Vector3<f64>,
        cur_rpy_rad: Vector3<f64>,
        target_pos_m: Vector3<f64>,
    ) -> Result<(Vector3<f64>, f64), PosCtrlError> {
        let (output, _) = self.proc(&InputData {
            cur_pos_m,
            cur_rpy_rad,
            target_pos_m,
        })?;

        Ok((output.target_rpy_rad, output.thrust))
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn control_counter(&self) -> u64 {
        self.control_counter
    }

    /// The PID control law.
    fn step(&mut self, input: &InputData) -> (OutputData, StatusReport) {
        let dt = self.params.control_timestep_s;
        let g = self.params.gravity_mss;
        let max_tilt = self.params.max_roll_pitch_rad;

        self.control_counter += 1;

        // Errors
        let pos_e = input.target_pos_m - input.cur_pos_m;
        let d_pos_e = (pos_e - self.last_pos_e) / dt;
        self.last_pos_e = pos_e;
        self.integral_pos_e += pos_e * dt;

        // Gravity compensated target force
        let target_force = Vector3::new(0.0, 0.0, g)
            + Vector3::from(self.params.k_p).component_mul(&pos_e)
            + Vector3::from(self.params.k_i).component_mul(&self.integral_pos_e)
            + Vector3::from(self.params.k_d).component_mul(&d_pos_e);

        // A zero Z force counts as pointing up
        let sign_z = sign_nonzero(target_force.z);
        let force_norm = target_force.norm();
        let zero_force = force_norm == 0.0;

        let roll = if zero_force {
            0.0
        } else {
            clamp(&(-sign_z * target_force.y / force_norm), &-1.0, &1.0).asin()
        };
        let pitch = (sign_z * target_force.x).atan2(sign_z * target_force.z);

        let target_rpy_rad = Vector3::new(
            clamp(&roll, &-max_tilt, &max_tilt),
            clamp(&pitch, &-max_tilt, &max_tilt),
            0.0,
        );

        // Thrust is the Z component of the target force rotated by the
        // current attitude (yaw-pitch-roll)
        let cur_rotation = Rotation3::from_euler_angles(
            input.cur_rpy_rad.x,
            input.cur_rpy_rad.y,
            input.cur_rpy_rad.z,
        );
        let thrust = (cur_rotation * target_force).z;

        trace!(
            "PosCtrl step {}: error {:?}, force {:?}, rpy {:?}, thrust {:.4}",
            self.control_counter,
            pos_e.as_slice(),
            target_force.as_slice(),
            target_rpy_rad.as_slice(),
            thrust
        );

        let report = StatusReport {
            pos_error_m: pos_e,
            roll_limited: roll.abs() > max_tilt,
            pitch_limited: pitch.abs() > max_tilt,
            zero_force,
            control_counter: self.control_counter,
        };

        (OutputData { target_rpy_rad, thrust }, report)
    }
}

impl InputData {
    fn is_finite(&self) -> bool {
        self.cur_pos_m
            .iter()
            .chain(self.cur_rpy_rad.iter())
            .chain(self.target_pos_m.iter())
            .all(|v| v.is_finite())
    }
}

impl State for PosCtrl {
    type InitData = &'static str;
    type InitError = PosCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = PosCtrlError;

    /// Initialise the PosCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        let params: Params = params::load(init_data)
            .map_err(PosCtrlError::ParamLoadError)?;
        params.validate()?;

        self.params = params;
        self.reset();

        Ok(())
    }

    /// Clear the controller memory and step counter.
    fn reset(&mut self) {
        self.last_pos_e = Vector3::zeros();
        self.integral_pos_e = Vector3::zeros();
        self.control_counter = 0;
    }

    /// Perform one step of position control.
    ///
    /// Non-finite inputs are rejected without touching the controller memory.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        if !input_data.is_finite() {
            return Err(PosCtrlError::NonFiniteInput(*input_data));
        }

        Ok(self.step(input_data))
    }
}
