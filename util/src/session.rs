//! Session management
//!
//! A session is one run of an executable. It fixes the epoch that log
//! timestamps count from and owns a directory for the run's log file.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Format of the timestamp in session directory names
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The directory layout of the current run.
#[derive(Clone, Debug)]
pub struct Session {
    /// Name of the executable which started the session
    pub exec_name: String,

    /// `<sessions_dir>/<exec_name>_<timestamp>`
    pub session_root: PathBuf,

    /// `<session_root>/<exec_name>.log`
    pub log_file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root is not set, export PLUTO_SW_ROOT")]
    SwRootNotSet,

    #[error("Could not create the session directory {0:?}: {1}")]
    CannotCreateDir(PathBuf, std::io::Error),

    #[error("A session has already been started in this process")]
    AlreadyStarted,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start the session of this process under
    /// `$PLUTO_SW_ROOT/<sessions_dir>`.
    ///
    /// Only one session may be started per process since it fixes the
    /// logging epoch.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        let mut sessions_path = crate::host::get_pluto_sw_root()
            .map_err(|_| SessionError::SwRootNotSet)?;
        sessions_path.push(sessions_dir);

        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(|_| SessionError::AlreadyStarted)?;

        Self::create(exec_name, &sessions_path, epoch().unwrap_or_else(Utc::now))
    }

    /// Create the session directory for a run started at `start`.
    fn create(
        exec_name: &str,
        sessions_path: &Path,
        start: DateTime<Utc>
    ) -> Result<Self, SessionError> {
        let session_root = sessions_path.join(format!(
            "{}_{}",
            exec_name,
            start.format(TIMESTAMP_FORMAT)
        ));

        fs::create_dir_all(&session_root)
            .map_err(|e| SessionError::CannotCreateDir(session_root.clone(), e))?;

        let log_file_path = session_root.join(format!("{}.log", exec_name));

        Ok(Session {
            exec_name: String::from(exec_name),
            session_root,
            log_file_path,
        })
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The session epoch, `None` before a session is started.
pub fn epoch() -> Option<DateTime<Utc>> {
    SESSION_EPOCH.get().copied()
}

/// Seconds elapsed since the session epoch.
///
/// `NAN` when no session has been started, so that logging from tests never
/// fails.
pub fn get_elapsed_seconds() -> f64 {
    epoch()
        .and_then(|e| time::duration_to_seconds(Utc::now() - e))
        .unwrap_or(std::f64::NAN)
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_create_layout() {
        let sessions = std::env::temp_dir().join("pluto_session_test");
        let start = Utc.ymd(2021, 3, 4).and_hms(5, 6, 7);

        let session = Session::create("test_exec", &sessions, start).unwrap();

        assert_eq!(session.session_root, sessions.join("test_exec_20210304_050607"));
        assert_eq!(
            session.log_file_path,
            session.session_root.join("test_exec.log")
        );
        assert!(session.session_root.is_dir());

        // Creating the same session again is not an error
        assert!(Session::create("test_exec", &sessions, start).is_ok());

        fs::remove_dir_all(&session.session_root).ok();
    }
}
