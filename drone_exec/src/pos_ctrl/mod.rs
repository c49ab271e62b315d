//! Position control module
//!
//! Position-hold PID controller which converts a target position into a
//! target attitude and thrust, plus the mapping of that output onto the
//! autopilot RC vector.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod ap_mapper;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during PosCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum PosCtrlError {
    #[error("Could not load the parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Invalid parameter {0}: {1}")]
    InvalidParam(&'static str, f64),

    #[error("Recieved a non-finite input: {0:?}")]
    NonFiniteInput(InputData),
}
