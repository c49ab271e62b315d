//! # MultiWii Serial Protocol
//!
//! Framing for the MSP v1 protocol spoken by the flight controller bridge.
//!
//! A frame is laid out as:
//!
//! ```text
//! '$' 'M' <dir> <size:u8> <code:u8> <payload:size bytes> <checksum:u8>
//! ```
//!
//! where `<dir>` is `<` for requests to the flight controller, `>` for
//! responses and `!` for error responses. The checksum is the XOR of the
//! size, code and every payload byte. All multi-byte integers are little
//! endian.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod link;
mod telemetry;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::io::Read;

use byteorder::ReadBytesExt;
use serde::Serialize;

pub use link::*;
pub use telemetry::*;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

pub const MSP_RAW_IMU: u8 = 102;
pub const MSP_RC: u8 = 105;
pub const MSP_ATTITUDE: u8 = 108;
pub const MSP_ALTITUDE: u8 = 109;
pub const MSP_ANALOG: u8 = 110;
pub const MSP_SET_RAW_RC: u8 = 200;
pub const MSP_SET_COMMAND: u8 = 217;
pub const MSP_ACC_TRIM: u8 = 240;

/// Largest payload a single MSP v1 frame can carry.
pub const MAX_PAYLOAD_LEN: usize = 255;

/// The telemetry polled on every writer tick.
pub const TELEMETRY_POLL: [TelemetryType; 5] = [
    TelemetryType::Rc,
    TelemetryType::Attitude,
    TelemetryType::RawImu,
    TelemetryType::Altitude,
    TelemetryType::Analog,
];

const PREAMBLE: [u8; 2] = [b'$', b'M'];

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Telemetry that can be requested from the flight controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TelemetryType {
    Rc,
    Attitude,
    RawImu,
    Altitude,
    Analog,
}

/// Direction marker of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `<`, host to flight controller
    Request,

    /// `>`, flight controller to host
    Response,

    /// `!`, the flight controller could not handle the request
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum MspError {
    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checksum mismatch on code {code}: computed {computed:#04x}, recieved {recieved:#04x}")]
    Checksum { code: u8, computed: u8, recieved: u8 },

    #[error("Payload for code {code} has {len} bytes, expected {expected}")]
    PayloadLength { code: u8, len: usize, expected: usize },

    #[error("Payload of {0} bytes does not fit in a single frame")]
    PayloadTooLong(usize),

    #[error("The flight controller returned an error for code {0}")]
    FcError(u8),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MspFrame {
    pub direction: Direction,
    pub code: u8,
    pub payload: Vec<u8>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TelemetryType {
    /// The MSP code used to request this telemetry.
    pub fn code(self) -> u8 {
        match self {
            TelemetryType::Rc => MSP_RC,
            TelemetryType::Attitude => MSP_ATTITUDE,
            TelemetryType::RawImu => MSP_RAW_IMU,
            TelemetryType::Altitude => MSP_ALTITUDE,
            TelemetryType::Analog => MSP_ANALOG,
        }
    }
}

impl Direction {
    fn marker(self) -> u8 {
        match self {
            Direction::Request => b'<',
            Direction::Response => b'>',
            Direction::Error => b'!',
        }
    }

    fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'<' => Some(Direction::Request),
            b'>' => Some(Direction::Response),
            b'!' => Some(Direction::Error),
            _ => None,
        }
    }
}

impl MspError {
    /// True if this error came from the underlying transport rather than from
    /// the content of a frame.
    ///
    /// Transport errors leave the stream in an unknown state, frame errors
    /// only lose the frame in question.
    pub fn is_transport(&self) -> bool {
        matches!(self, MspError::Io(_))
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Compute the checksum of a frame.
pub fn checksum(code: u8, payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold((payload.len() as u8) ^ code, |acc, b| acc ^ b)
}

/// Append an encoded frame to `buf`.
pub fn encode_frame(
    direction: Direction,
    code: u8,
    payload: &[u8],
    buf: &mut Vec<u8>,
) -> Result<(), MspError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(MspError::PayloadTooLong(payload.len()));
    }

    buf.extend_from_slice(&PREAMBLE);
    buf.push(direction.marker());
    buf.push(payload.len() as u8);
    buf.push(code);
    buf.extend_from_slice(payload);
    buf.push(checksum(code, payload));

    Ok(())
}

/// Append an encoded request frame to `buf`.
pub fn encode_request(code: u8, payload: &[u8], buf: &mut Vec<u8>) -> Result<(), MspError> {
    encode_frame(Direction::Request, code, payload, buf)
}

/// Read one frame from the reader, blocking until it is complete.
///
/// Bytes before the next `$M<dir>` preamble are discarded, so the decoder
/// recovers from garbage or a partially recieved frame on the stream.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<MspFrame, MspError> {
    let mut byte = reader.read_u8()?;

    let direction = loop {
        if byte != PREAMBLE[0] {
            byte = reader.read_u8()?;
            continue;
        }

        // `byte` is re-examined at the top of the loop if it isn't the next
        // preamble byte, so "$$M>" still syncs.
        byte = reader.read_u8()?;
        if byte != PREAMBLE[1] {
            continue;
        }

        byte = reader.read_u8()?;
        match Direction::from_marker(byte) {
            Some(d) => break d,
            None => continue,
        }
    };

    let size = reader.read_u8()? as usize;
    let code = reader.read_u8()?;
    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload)?;
    let recieved = reader.read_u8()?;

    let computed = checksum(code, &payload);
    if computed != recieved {
        return Err(MspError::Checksum {
            code,
            computed,
            recieved,
        });
    }

    Ok(MspFrame {
        direction,
        code,
        payload,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_request() {
        let mut buf = Vec::new();
        encode_request(MSP_ATTITUDE, &[], &mut buf).unwrap();
        assert_eq!(buf, vec![b'$', b'M', b'<', 0, 108, 108]);

        let mut buf = Vec::new();
        encode_request(MSP_SET_COMMAND, &[1, 0], &mut buf).unwrap();
        assert_eq!(buf, vec![b'$', b'M', b'<', 2, 217, 1, 0, 2 ^ 217 ^ 1]);
    }

    #[test]
    fn test_encode_too_long() {
        let mut buf = Vec::new();
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        match encode_request(MSP_SET_RAW_RC, &payload, &mut buf) {
            Err(MspError::PayloadTooLong(256)) => (),
            r => panic!("Expected PayloadTooLong, got {:?}", r),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_frame_resyncs() {
        let mut bytes = vec![0x00, b'$', b'$', b'M', b'x', 0x17];
        encode_frame(Direction::Response, MSP_ALTITUDE, &[1, 2, 3, 4, 5, 6], &mut bytes).unwrap();

        let frame = read_frame(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(frame.direction, Direction::Response);
        assert_eq!(frame.code, MSP_ALTITUDE);
        assert_eq!(frame.payload, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_read_frame_bad_checksum() {
        let mut bytes = Vec::new();
        encode_frame(Direction::Response, MSP_RC, &[9, 9], &mut bytes).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        match read_frame(&mut Cursor::new(bytes)) {
            Err(MspError::Checksum { code: MSP_RC, .. }) => (),
            r => panic!("Expected checksum error, got {:?}", r),
        }
    }

    #[test]
    fn test_read_frame_eof_is_transport() {
        let bytes = vec![b'$', b'M', b'>', 4, MSP_RC, 1];
        let err = read_frame(&mut Cursor::new(bytes)).unwrap_err();
        assert!(err.is_transport());
    }
}
