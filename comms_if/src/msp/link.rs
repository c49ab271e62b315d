//! Typed send and recieve operations over an MSP byte stream.
//!
//! The vehicle core only sees the `CommandSink` and `TelemetrySource`
//! traits, `MspWriter` and `MspReader` are the implementations used over a
//! real transport.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::io::{Read, Write};

use log::trace;

use super::{
    encode_request, read_frame, MspError, TelemetryRecord, TelemetryType,
    MSP_ACC_TRIM, MSP_SET_COMMAND, MSP_SET_RAW_RC,
};
use crate::tc::{RcChannels, NUM_RC_CHANNELS};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Outgoing half of the flight controller link.
pub trait CommandSink: Send {
    /// Send a full set of RC channels.
    fn send_rc(&mut self, rc: &RcChannels) -> Result<(), MspError>;

    /// Request the given telemetry.
    fn send_telemetry_poll(&mut self, types: &[TelemetryType]) -> Result<(), MspError>;

    /// Send a one-shot command code.
    fn send_command(&mut self, command_type: u16) -> Result<(), MspError>;

    /// Request the accelerometer trim.
    fn send_acc_trim_request(&mut self) -> Result<(), MspError>;
}

/// Incoming half of the flight controller link.
pub trait TelemetrySource: Send {
    /// Block until one frame has been recieved and decode it.
    ///
    /// Frames which carry no telemetry give `Ok(None)`.
    fn read_record(&mut self) -> Result<Option<TelemetryRecord>, MspError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Writes MSP request frames onto a byte stream.
pub struct MspWriter<W> {
    inner: W,
    buf: Vec<u8>,
}

/// Reads MSP response frames from a byte stream.
pub struct MspReader<R> {
    inner: R,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<W: Write> MspWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(64),
        }
    }

    /// Get back the underlying stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Write the contents of the buffer as a single write and clear it.
    fn flush_buf(&mut self) -> Result<(), MspError> {
        let result = self.inner.write_all(&self.buf).and_then(|_| self.inner.flush());
        self.buf.clear();
        result.map_err(MspError::from)
    }
}

impl<W: Write + Send> CommandSink for MspWriter<W> {
    fn send_rc(&mut self, rc: &RcChannels) -> Result<(), MspError> {
        let mut payload = [0u8; 2 * NUM_RC_CHANNELS];
        for (i, c) in rc.0.iter().enumerate() {
            payload[2 * i..2 * i + 2].copy_from_slice(&c.to_le_bytes());
        }

        trace!("Sending RC {:?}", rc.0);

        encode_request(MSP_SET_RAW_RC, &payload, &mut self.buf)?;
        self.flush_buf()
    }

    fn send_telemetry_poll(&mut self, types: &[TelemetryType]) -> Result<(), MspError> {
        for t in types {
            encode_request(t.code(), &[], &mut self.buf)?;
        }
        self.flush_buf()
    }

    fn send_command(&mut self, command_type: u16) -> Result<(), MspError> {
        trace!("Sending command {}", command_type);

        encode_request(MSP_SET_COMMAND, &command_type.to_le_bytes(), &mut self.buf)?;
        self.flush_buf()
    }

    fn send_acc_trim_request(&mut self) -> Result<(), MspError> {
        encode_request(MSP_ACC_TRIM, &[], &mut self.buf)?;
        self.flush_buf()
    }
}

impl<R: Read> MspReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> TelemetrySource for MspReader<R> {
    fn read_record(&mut self) -> Result<Option<TelemetryRecord>, MspError> {
        let frame = read_frame(&mut self.inner)?;
        TelemetryRecord::decode(&frame)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::msp::{encode_frame, Attitude, Direction, MSP_ATTITUDE, MSP_RC, TELEMETRY_POLL};
    use std::io::Cursor;

    #[test]
    fn test_send_rc_frame() {
        let mut writer = MspWriter::new(Vec::new());
        writer
            .send_rc(&RcChannels([1000, 1500, 2000, 1500, 1000, 1000, 1000, 1500]))
            .unwrap();

        let bytes = writer.into_inner();
        let frame = read_frame(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(frame.direction, Direction::Request);
        assert_eq!(frame.code, MSP_SET_RAW_RC);
        assert_eq!(frame.payload.len(), 16);
        assert_eq!(&frame.payload[0..2], &1000u16.to_le_bytes());
        assert_eq!(&frame.payload[4..6], &2000u16.to_le_bytes());
    }

    #[test]
    fn test_send_poll_is_one_frame_per_type() {
        let mut writer = MspWriter::new(Vec::new());
        writer.send_telemetry_poll(&TELEMETRY_POLL).unwrap();

        let mut cur = Cursor::new(writer.into_inner());
        let codes: Vec<u8> = (0..TELEMETRY_POLL.len())
            .map(|_| read_frame(&mut cur).unwrap().code)
            .collect();

        assert_eq!(codes, vec![105, 108, 102, 109, 110]);
    }

    #[test]
    fn test_reader_skips_non_telemetry() {
        let mut bytes = Vec::new();
        encode_frame(Direction::Response, MSP_SET_RAW_RC, &[], &mut bytes).unwrap();
        encode_frame(Direction::Response, MSP_ATTITUDE, &[10, 0, 20, 0, 90, 0], &mut bytes)
            .unwrap();
        encode_frame(Direction::Response, MSP_RC, &[0; 4], &mut bytes).unwrap();

        let mut reader = MspReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_record().unwrap(), None);
        assert_eq!(
            reader.read_record().unwrap(),
            Some(TelemetryRecord::Attitude(Attitude {
                roll_deg: 1.0,
                pitch_deg: 2.0,
                yaw_deg: 90.0
            }))
        );

        // Truncated RC payload is a frame error, then the stream runs dry
        assert!(!reader.read_record().unwrap_err().is_transport());
        assert!(reader.read_record().unwrap_err().is_transport());
    }
}
