//! # Link status
//!
//! Liveness flags shared by the writer, the reader and the facade.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Two independent flags, "running" and "stable".
///
/// `stable` is sticky: once a transport error has been seen it is never set
/// back, a degraded link has to be replaced by a new one.
#[derive(Debug)]
pub struct LinkStatus {
    running: AtomicBool,
    stable: AtomicBool,
}

/// Counters kept by the writer.
#[derive(Debug, Default)]
pub struct WriterStats {
    sent: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    commands_sent: AtomicU64,
}

/// Copy of the writer counters at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStatsSnapshot {
    /// Ticks on which a frame was sent
    pub sent: u64,

    /// Ticks skipped because the command block was locked
    pub skipped: u64,

    /// Ticks which failed with a transport error
    pub failed: u64,

    /// One-shot commands sent
    pub commands_sent: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LinkStatus {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            stable: AtomicBool::new(true),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask both tasks to stop at their next iteration.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_stable(&self) -> bool {
        self.stable.load(Ordering::Acquire)
    }

    /// Record a transport failure.
    ///
    /// Returns true if the link was stable until now.
    pub fn mark_unstable(&self) -> bool {
        self.stable.swap(false, Ordering::AcqRel)
    }

    /// True iff the tasks are running and no transport error has been seen.
    pub fn healthy(&self) -> bool {
        self.is_running() && self.is_stable()
    }
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterStats {
    pub fn record_sent(&self, with_command: bool) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        if with_command {
            self.commands_sent.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WriterStatsSnapshot {
        WriterStatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_health() {
        let status = LinkStatus::new();
        assert!(status.healthy());

        assert!(status.mark_unstable());
        assert!(!status.mark_unstable());
        assert!(!status.healthy());
        assert!(status.is_running());

        let status = LinkStatus::new();
        status.request_stop();
        assert!(!status.healthy());
        assert!(status.is_stable());
    }

    #[test]
    fn test_writer_stats() {
        let stats = WriterStats::default();
        stats.record_sent(false);
        stats.record_sent(true);
        stats.record_skipped();
        stats.record_failed();

        assert_eq!(
            stats.snapshot(),
            WriterStatsSnapshot {
                sent: 2,
                skipped: 1,
                failed: 1,
                commands_sent: 1
            }
        );
    }
}
