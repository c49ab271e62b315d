//! # Telemetry reader task
//!
//! Decodes frames as fast as they arrive and publishes them into the
//! telemetry snapshot.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use log::{debug, error, info, trace, warn};

use comms_if::msp::TelemetrySource;

use crate::{link::LinkStatus, telemetry::TelemetrySnapshot};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Reader thread body.
///
/// Frame level errors (bad checksum, short payload, FC error frames) lose
/// only that frame. A transport error ends the loop and marks the link
/// unstable, unless it happened because the link is being shut down.
pub fn reader_thread(
    mut source: Box<dyn TelemetrySource>,
    telemetry: Arc<TelemetrySnapshot>,
    status: Arc<LinkStatus>,
) {
    info!("Reader thread started");

    while status.is_running() {
        match source.read_record() {
            Ok(Some(record)) => {
                trace!("Telemetry: {:?}", record);
                telemetry.update(&record);
            }
            Ok(None) => (),
            Err(e) if e.is_transport() => {
                if !status.is_running() {
                    debug!("Reader transport closed during shutdown: {}", e);
                } else if status.mark_unstable() {
                    error!("Cannot read from the flight controller: {}", e);
                }
                break;
            }
            Err(e) => warn!("Dropped telemetry frame: {}", e),
        }
    }

    info!("Reader thread stopped");
}
