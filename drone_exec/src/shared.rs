//! # Shared command block
//!
//! The RC channels, autopilot vector and pending one-shot command are held in
//! a single block behind one lock. The writer only ever tries the lock and
//! skips its tick if the lock is held, pilot-rate callers block on it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use comms_if::tc::{DroneCmd, RcChannels, CMD_NONE, RC_MAX, RC_MID, RC_MIN};
use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of channels the autopilot offsets (roll, pitch, throttle, yaw).
pub const NUM_AP_CHANNELS: usize = 4;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Autopilot targets for roll, pitch, throttle and yaw, centred on `RC_MID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApVector(pub [u16; NUM_AP_CHANNELS]);

/// Everything the writer needs to compose one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CmdBlock {
    /// Manual RC channels as last submitted by the pilot
    pub rc: RcChannels,

    /// Current autopilot targets
    pub autopilot: ApVector,

    /// Whether the autopilot vector should be blended in
    pub is_autopilot_on: bool,

    /// Pending one-shot command, `CMD_NONE` if there is none
    pub command_type: u16,
}

/// The command block shared between the writer and the vehicle facade.
#[derive(Debug, Default)]
pub struct SharedCmd {
    block: Mutex<CmdBlock>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Result of a non-blocking attempt on the command block lock.
pub enum TryLockOutcome<'a> {
    Acquired(MutexGuard<'a, CmdBlock>),

    /// Someone else holds the lock
    Contended,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ApVector {
    fn default() -> Self {
        Self([RC_MID; NUM_AP_CHANNELS])
    }
}

impl Default for CmdBlock {
    fn default() -> Self {
        Self {
            rc: RcChannels::default(),
            autopilot: ApVector::default(),
            is_autopilot_on: false,
            command_type: CMD_NONE,
        }
    }
}

impl CmdBlock {
    /// Copy every field of an externally produced command into the block.
    ///
    /// Channels are clamped into the valid RC range on the way in.
    pub fn write_manual(&mut self, cmd: &DroneCmd) {
        self.rc = cmd.rc_channels().clamped();
        self.is_autopilot_on = cmd.is_autopilot_on;
        self.command_type = cmd.command_type;
    }

    /// The channels to transmit this tick, with the autopilot blend applied.
    pub fn blended_rc(&self) -> RcChannels {
        blend(&self.rc, &self.autopilot, self.is_autopilot_on)
    }

    /// The pending one-shot command, if any.
    pub fn pending_command(&self) -> Option<u16> {
        match self.command_type {
            CMD_NONE => None,
            c => Some(c),
        }
    }

    /// Take the pending one-shot command, leaving none behind.
    pub fn take_command(&mut self) -> Option<u16> {
        let cmd = self.pending_command();
        self.command_type = CMD_NONE;
        cmd
    }
}

impl SharedCmd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to lock the block without blocking.
    ///
    /// A poisoned lock is recovered, the block holds plain values so a panic
    /// elsewhere cannot leave it half written.
    pub fn try_lock(&self) -> TryLockOutcome<'_> {
        match self.block.try_lock() {
            Ok(guard) => TryLockOutcome::Acquired(guard),
            Err(TryLockError::Poisoned(p)) => TryLockOutcome::Acquired(p.into_inner()),
            Err(TryLockError::WouldBlock) => TryLockOutcome::Contended,
        }
    }

    /// Lock the block, blocking until it is available.
    pub fn lock(&self) -> MutexGuard<'_, CmdBlock> {
        self.block.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a copy of the whole block.
    pub fn read_snapshot(&self) -> CmdBlock {
        *self.lock()
    }

    /// Replace the manual channels, autopilot flag and pending command.
    pub fn write_manual(&self, cmd: &DroneCmd) {
        self.lock().write_manual(cmd)
    }

    /// Replace the autopilot vector.
    pub fn set_autopilot(&self, ap: ApVector) {
        self.lock().autopilot = ap;
    }

    /// Take the pending one-shot command.
    pub fn take_one_shot(&self) -> Option<u16> {
        self.lock().take_command()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Blend the autopilot vector onto the manual channels.
///
/// The offset `ap[i] - RC_MID` is added to roll, pitch, throttle and yaw only
/// when the autopilot is on and the mode channel is exactly `RC_MID`. The
/// result is clamped into the valid channel range.
pub fn blend(rc: &RcChannels, ap: &ApVector, is_autopilot_on: bool) -> RcChannels {
    if !is_autopilot_on || rc.mode() != RC_MID {
        return *rc;
    }

    let mut out = *rc;
    for i in 0..NUM_AP_CHANNELS {
        let v = rc[i] as i32 + ap.0[i] as i32 - RC_MID as i32;
        out[i] = v.max(RC_MIN as i32).min(RC_MAX as i32) as u16;
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::{AUX4, CMD_TAKE_OFF, THROTTLE};

    fn armed_rc() -> RcChannels {
        RcChannels([1500, 1450, 1600, 1500, 1000, 1000, 1000, 1500])
    }

    #[test]
    fn test_blend_applies_offset_when_gated() {
        let ap = ApVector([1600, 1400, 1550, 1500]);
        let out = blend(&armed_rc(), &ap, true);

        assert_eq!(out, RcChannels([1600, 1350, 1650, 1500, 1000, 1000, 1000, 1500]));
    }

    #[test]
    fn test_blend_gate() {
        let ap = ApVector([1700, 1300, 1800, 1200]);

        // Autopilot off
        assert_eq!(blend(&armed_rc(), &ap, false), armed_rc());

        // Mode channel anything but neutral
        for mode in [1000u16, 1499, 1501, 2000].iter() {
            let mut rc = armed_rc();
            rc[AUX4] = *mode;
            assert_eq!(blend(&rc, &ap, true), rc);
        }
    }

    #[test]
    fn test_blend_clamps() {
        let ap = ApVector([2000, 1000, 2000, 1500]);
        let mut rc = armed_rc();
        rc[THROTTLE] = 1900;

        let out = blend(&rc, &ap, true);
        assert_eq!(out[0], 2000);
        assert_eq!(out[1], 1000);
        assert_eq!(out[THROTTLE], 2000);
    }

    #[test]
    fn test_blend_does_not_touch_stored_rc() {
        let shared = SharedCmd::new();
        let cmd = DroneCmd {
            rc_aux4: 1500,
            is_autopilot_on: true,
            ..Default::default()
        };
        shared.write_manual(&cmd);
        shared.set_autopilot(ApVector([1600, 1500, 1500, 1500]));

        // Blending repeatedly must not accumulate offsets
        for _ in 0..3 {
            let block = shared.read_snapshot();
            assert_eq!(block.blended_rc()[0], 1600);
            assert_eq!(block.rc[0], 1500);
        }
    }

    #[test]
    fn test_one_shot_taken_once() {
        let shared = SharedCmd::new();
        shared.write_manual(&DroneCmd {
            command_type: CMD_TAKE_OFF,
            ..Default::default()
        });

        assert_eq!(shared.take_one_shot(), Some(CMD_TAKE_OFF));
        assert_eq!(shared.take_one_shot(), None);
    }

    #[test]
    fn test_try_lock_contended() {
        let shared = SharedCmd::new();

        let guard = shared.lock();
        assert!(matches!(shared.try_lock(), TryLockOutcome::Contended));
        drop(guard);

        assert!(matches!(shared.try_lock(), TryLockOutcome::Acquired(_)));
    }
}
