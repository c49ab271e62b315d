//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Pilot command definitions shared by every command source (keyboard, autopilot, scripts)
pub mod tc;

/// MultiWii Serial Protocol codec used to talk to the flight controller
pub mod msp;

/// Network module
pub mod net;
