//! Typed telemetry records decoded from MSP response frames.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;

use super::{MspError, MspFrame, Direction};
use super::{MSP_ALTITUDE, MSP_ANALOG, MSP_ATTITUDE, MSP_RAW_IMU, MSP_RC};
use crate::tc::{RcChannels, NUM_RC_CHANNELS};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Vehicle attitude.
///
/// Units: degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Attitude {
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
}

/// Raw IMU readings in sensor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RawImu {
    pub acc: [i16; 3],
    pub gyro: [i16; 3],
    pub mag: [i16; 3],
}

/// Estimated altitude and vertical speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Altitude {
    /// Units: centimeters
    pub est_alt_cm: i32,

    /// Units: centimeters/second
    pub vario_cms: i16,
}

/// Battery and link quality readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Analog {
    /// Battery voltage in tenths of a volt
    pub vbat_dv: u8,
    pub power_meter_sum: u16,
    pub rssi: u16,
    pub amperage: i16,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A single decoded telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TelemetryRecord {
    /// RC channels as seen by the flight controller
    Rc(RcChannels),
    Attitude(Attitude),
    RawImu(RawImu),
    Altitude(Altitude),
    Analog(Analog),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Attitude {
    /// Attitude as `[roll, pitch, yaw]` in radians.
    pub fn to_radians(&self) -> [f64; 3] {
        [
            self.roll_deg.to_radians(),
            self.pitch_deg.to_radians(),
            self.yaw_deg.to_radians(),
        ]
    }
}

impl Altitude {
    /// Units: meters
    pub fn est_alt_m(&self) -> f64 {
        self.est_alt_cm as f64 * 0.01
    }
}

impl TelemetryRecord {
    /// Decode a frame into a telemetry record.
    ///
    /// Frames which carry no telemetry (acknowledgements of RC or command
    /// frames for example) give `Ok(None)`.
    pub fn decode(frame: &MspFrame) -> Result<Option<Self>, MspError> {
        if frame.direction == Direction::Error {
            return Err(MspError::FcError(frame.code));
        }

        let expected = match frame.code {
            MSP_RC => 2 * NUM_RC_CHANNELS,
            MSP_ATTITUDE => 6,
            MSP_RAW_IMU => 18,
            MSP_ALTITUDE => 6,
            MSP_ANALOG => 7,
            _ => return Ok(None),
        };

        if frame.payload.len() < expected {
            return Err(MspError::PayloadLength {
                code: frame.code,
                len: frame.payload.len(),
                expected,
            });
        }

        let mut cur = Cursor::new(&frame.payload);

        let record = match frame.code {
            MSP_RC => {
                let mut channels = [0u16; NUM_RC_CHANNELS];
                cur.read_u16_into::<LittleEndian>(&mut channels)?;
                TelemetryRecord::Rc(RcChannels(channels))
            }
            MSP_ATTITUDE => {
                // Roll and pitch are sent in tenths of a degree, yaw in whole degrees
                let roll = cur.read_i16::<LittleEndian>()?;
                let pitch = cur.read_i16::<LittleEndian>()?;
                let yaw = cur.read_i16::<LittleEndian>()?;
                TelemetryRecord::Attitude(Attitude {
                    roll_deg: roll as f64 / 10.0,
                    pitch_deg: pitch as f64 / 10.0,
                    yaw_deg: yaw as f64,
                })
            }
            MSP_RAW_IMU => {
                let mut imu = RawImu::default();
                cur.read_i16_into::<LittleEndian>(&mut imu.acc)?;
                cur.read_i16_into::<LittleEndian>(&mut imu.gyro)?;
                cur.read_i16_into::<LittleEndian>(&mut imu.mag)?;
                TelemetryRecord::RawImu(imu)
            }
            MSP_ALTITUDE => TelemetryRecord::Altitude(Altitude {
                est_alt_cm: cur.read_i32::<LittleEndian>()?,
                vario_cms: cur.read_i16::<LittleEndian>()?,
            }),
            MSP_ANALOG => TelemetryRecord::Analog(Analog {
                vbat_dv: cur.read_u8()?,
                power_meter_sum: cur.read_u16::<LittleEndian>()?,
                rssi: cur.read_u16::<LittleEndian>()?,
                amperage: cur.read_i16::<LittleEndian>()?,
            }),
            _ => return Ok(None),
        };

        Ok(Some(record))
    }
}
