//! # Drone library.
//!
//! Real-time RC and telemetry loop for a small quadcopter whose flight
//! controller speaks MSP over a TCP bridge.
//!
//! Two tasks service the link: the writer sends the current RC channels, a
//! telemetry poll and any pending one-shot command every period, the reader
//! decodes telemetry into a snapshot as fast as it arrives. The `Drone`
//! facade drives both through a shared command block.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Vehicle facade - arming, take-off, landing and link teardown
pub mod drone;

/// Link status flags and writer counters
pub mod link;

/// Parameters of the executable
pub mod params;

/// Position control module - converts a position error into attitude and thrust targets
pub mod pos_ctrl;

/// Telemetry reader task
pub mod reader;

/// Command block shared between the facade and the writer
pub mod shared;

/// Most recent telemetry
pub mod telemetry;

/// Command writer task
pub mod writer;
