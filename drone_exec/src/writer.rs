//! # Command writer task
//!
//! Sends the composed RC frame, a telemetry poll and any pending one-shot
//! command to the flight controller once per period.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use log::{debug, error, info, trace};

use comms_if::{
    msp::{CommandSink, MspError, TELEMETRY_POLL},
    tc::RcChannels,
};

use crate::{
    link::{LinkStatus, WriterStats},
    shared::{SharedCmd, TryLockOutcome},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default writer period, about 45 Hz.
pub const WRITER_PERIOD_S: f64 = 0.022;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What happened on one writer tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// Frames were sent. `command` holds the one-shot command sent on this
    /// tick, if any.
    Sent {
        rc: RcChannels,
        command: Option<u16>,
    },

    /// The command block was locked by someone else, nothing was sent.
    Skipped,

    /// A send failed. Any pending command stays pending.
    Failed(MspError),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run a single writer tick.
///
/// The lock is held across the sends so that a command submitted by the
/// pilot is never half applied to a frame.
pub fn writer_tick(sink: &mut dyn CommandSink, cmd: &SharedCmd) -> TickOutcome {
    let mut block = match cmd.try_lock() {
        TryLockOutcome::Acquired(b) => b,
        TryLockOutcome::Contended => return TickOutcome::Skipped,
    };

    let rc = block.blended_rc();

    if let Err(e) = sink
        .send_rc(&rc)
        .and_then(|_| sink.send_telemetry_poll(&TELEMETRY_POLL))
    {
        return TickOutcome::Failed(e);
    }

    // Only clear the command once it has actually gone out
    let command = block.pending_command();
    if let Some(c) = command {
        if let Err(e) = sink.send_command(c) {
            return TickOutcome::Failed(e);
        }
        block.take_command();
    }

    TickOutcome::Sent { rc, command }
}

/// Writer thread body.
///
/// Runs until `status` is asked to stop. Transport errors mark the link
/// unstable but do not stop the loop.
pub fn writer_thread(
    mut sink: Box<dyn CommandSink>,
    cmd: Arc<SharedCmd>,
    status: Arc<LinkStatus>,
    stats: Arc<WriterStats>,
    period: Duration,
) {
    info!("Writer thread started");

    if let Err(e) = sink.send_acc_trim_request() {
        handle_failure(&status, &stats, e);
    }

    while status.is_running() {
        let tick_start = Instant::now();

        match writer_tick(sink.as_mut(), &cmd) {
            TickOutcome::Sent { rc, command } => {
                stats.record_sent(command.is_some());
                if let Some(c) = command {
                    debug!("One-shot command {} sent", c);
                }
                trace!("Tick sent {:?}", rc.0);
            }
            TickOutcome::Skipped => {
                stats.record_skipped();
                trace!("Command block busy, tick skipped");
            }
            TickOutcome::Failed(e) => handle_failure(&status, &stats, e),
        }

        // Sleep out the rest of the period. An overrun tick goes straight into
        // the next one, there is no catching up on missed ticks.
        match period.checked_sub(tick_start.elapsed()) {
            Some(d) => thread::sleep(d),
            None => trace!(
                "Writer tick overran by {:.06} s",
                tick_start.elapsed().as_secs_f64() - period.as_secs_f64()
            ),
        }
    }

    info!("Writer thread stopped");
}

fn handle_failure(status: &LinkStatus, stats: &WriterStats, e: MspError) {
    stats.record_failed();

    if status.mark_unstable() {
        error!("Cannot write to the flight controller: {}", e);
    } else {
        trace!("Write failed on unstable link: {}", e);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::{
        msp::TelemetryType,
        tc::{DroneCmd, CMD_TAKE_OFF},
    };
    use std::sync::Mutex;

    /// Something the writer sent.
    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Rc(RcChannels),
        Poll(Vec<TelemetryType>),
        Command(u16),
        AccTrim,
    }

    /// A sink which records what it is given, optionally failing.
    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<Sent>>>,
        fail: Arc<Mutex<bool>>,
    }

    impl RecordingSink {
        fn push(&mut self, s: Sent) -> Result<(), MspError> {
            if *self.fail.lock().unwrap() {
                return Err(MspError::Io(std::io::ErrorKind::BrokenPipe.into()));
            }
            self.sent.lock().unwrap().push(s);
            Ok(())
        }

        fn commands(&self) -> Vec<u16> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|s| match s {
                    Sent::Command(c) => Some(*c),
                    _ => None,
                })
                .collect()
        }
    }

    impl CommandSink for RecordingSink {
        fn send_rc(&mut self, rc: &RcChannels) -> Result<(), MspError> {
            self.push(Sent::Rc(*rc))
        }

        fn send_telemetry_poll(&mut self, types: &[TelemetryType]) -> Result<(), MspError> {
            self.push(Sent::Poll(types.to_vec()))
        }

        fn send_command(&mut self, command_type: u16) -> Result<(), MspError> {
            self.push(Sent::Command(command_type))
        }

        fn send_acc_trim_request(&mut self) -> Result<(), MspError> {
            self.push(Sent::AccTrim)
        }
    }

    #[test]
    fn test_tick_sends_rc_and_poll() {
        let mut sink = RecordingSink::default();
        let cmd = SharedCmd::new();

        match writer_tick(&mut sink, &cmd) {
            TickOutcome::Sent { rc, command: None } => assert_eq!(rc, RcChannels::default()),
            o => panic!("Unexpected outcome {:?}", o),
        }

        assert_eq!(
            *sink.sent.lock().unwrap(),
            vec![Sent::Rc(RcChannels::default()), Sent::Poll(TELEMETRY_POLL.to_vec())]
        );
    }

    #[test]
    fn test_one_shot_consumed_by_exactly_one_tick() {
        let mut sink = RecordingSink::default();
        let cmd = SharedCmd::new();
        cmd.write_manual(&DroneCmd {
            command_type: CMD_TAKE_OFF,
            ..Default::default()
        });

        assert!(matches!(
            writer_tick(&mut sink, &cmd),
            TickOutcome::Sent { command: Some(CMD_TAKE_OFF), .. }
        ));
        assert!(matches!(
            writer_tick(&mut sink, &cmd),
            TickOutcome::Sent { command: None, .. }
        ));

        assert_eq!(sink.commands(), vec![CMD_TAKE_OFF]);
    }

    #[test]
    fn test_out_of_range_channels_clamped_on_wire() {
        let mut sink = RecordingSink::default();
        let cmd = SharedCmd::new();
        cmd.write_manual(&DroneCmd {
            rc_roll: 0,
            rc_throttle: 65000,
            rc_aux1: 999,
            rc_aux4: 2001,
            ..Default::default()
        });

        match writer_tick(&mut sink, &cmd) {
            TickOutcome::Sent { rc, .. } => {
                assert_eq!(rc, RcChannels([1000, 1500, 2000, 1500, 1000, 1000, 1000, 2000]))
            }
            o => panic!("Unexpected outcome {:?}", o),
        }

        match &sink.sent.lock().unwrap()[0] {
            Sent::Rc(rc) => assert!(rc.0.iter().all(|c| (1000..=2000).contains(c))),
            s => panic!("Expected RC first, got {:?}", s),
        };
    }

    #[test]
    fn test_tick_skipped_when_locked() {
        let mut sink = RecordingSink::default();
        let cmd = SharedCmd::new();

        let guard = cmd.lock();
        assert!(matches!(writer_tick(&mut sink, &cmd), TickOutcome::Skipped));
        drop(guard);

        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_send_keeps_command_pending() {
        let mut sink = RecordingSink::default();
        let cmd = SharedCmd::new();
        cmd.write_manual(&DroneCmd {
            command_type: CMD_TAKE_OFF,
            ..Default::default()
        });

        *sink.fail.lock().unwrap() = true;
        assert!(matches!(writer_tick(&mut sink, &cmd), TickOutcome::Failed(_)));
        assert_eq!(cmd.read_snapshot().pending_command(), Some(CMD_TAKE_OFF));

        *sink.fail.lock().unwrap() = false;
        assert!(matches!(
            writer_tick(&mut sink, &cmd),
            TickOutcome::Sent { command: Some(CMD_TAKE_OFF), .. }
        ));
    }

    #[test]
    fn test_writer_thread_survives_failures() {
        let sink = RecordingSink::default();
        let cmd = Arc::new(SharedCmd::new());
        let status = Arc::new(LinkStatus::new());
        let stats = Arc::new(WriterStats::default());

        *sink.fail.lock().unwrap() = true;

        let jh = {
            let (sink, cmd, status, stats) =
                (sink.clone(), cmd.clone(), status.clone(), stats.clone());
            thread::spawn(move || {
                writer_thread(Box::new(sink), cmd, status, stats, Duration::from_millis(2))
            })
        };

        thread::sleep(Duration::from_millis(30));
        assert!(!status.is_stable());

        // The loop keeps going after the failure
        *sink.fail.lock().unwrap() = false;
        thread::sleep(Duration::from_millis(30));

        status.request_stop();
        jh.join().unwrap();

        let s = stats.snapshot();
        assert!(s.failed >= 1);
        assert!(s.sent >= 1);
        assert!(!status.is_stable());
    }
}
