//! # Network Module
//!
//! This module establishes the stream connection to the flight controller
//! bridge. Connections are made with TCP keep-alive enabled, and are only
//! handed out once keep-alive has been verified and the socket reports no
//! pending error.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    thread,
    time::Duration,
};

use log::{info, warn};
use serde::Deserialize;
use socket2::SockRef;

use util::time::secs_to_duration;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the link to the flight controller bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetParams {
    /// Host name or IP address of the bridge
    pub host: String,

    /// TCP port of the bridge
    pub port: u16,

    /// Maximum number of connection attempts before giving up
    pub connect_attempts: u32,

    /// Time to wait between failed connection attempts.
    ///
    /// Units: seconds
    pub connect_backoff_s: f64,

    /// Time limit on a single connection attempt.
    ///
    /// Units: seconds
    pub connect_timeout_s: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("Could not resolve {0}: {1}")]
    AddrResolve(String, std::io::Error),

    #[error("{0} did not resolve to any address")]
    NoAddress(String),

    #[error("Could not connect the socket: {0}")]
    CouldNotConnect(std::io::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(&'static str, std::io::Error),

    #[error("Keep-alive could not be enabled on the socket")]
    KeepAliveNotEnabled,

    #[error("The socket reported an error after connecting: {0}")]
    PendingSocketError(std::io::Error),

    #[error("Could not connect after {attempts} attempts, last error: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ConnectError>,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NetParams {
    /// The `host:port` endpoint string.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_backoff(&self) -> Duration {
        secs_to_duration(self.connect_backoff_s)
    }

    pub fn connect_timeout(&self) -> Duration {
        // A zero timeout is rejected by `connect_timeout`, so keep at least 1 ms
        secs_to_duration(self.connect_timeout_s).max(Duration::from_millis(1))
    }
}

impl Default for NetParams {
    fn default() -> Self {
        Self {
            host: String::from("192.168.4.1"),
            port: 23,
            connect_attempts: 3,
            connect_backoff_s: 2.0,
            connect_timeout_s: 5.0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Connect to the bridge described by `params`, retrying on failure.
///
/// Up to `params.connect_attempts` attempts are made with
/// `params.connect_backoff_s` between them. If every attempt fails
/// `ConnectError::RetriesExhausted` is returned, it is up to the caller to
/// decide whether this is fatal.
pub fn connect(params: &NetParams) -> Result<TcpStream, ConnectError> {
    let endpoint = params.endpoint();

    retry(params.connect_attempts, params.connect_backoff(), |attempt| {
        info!(
            "Connecting to {} (attempt {} of {})...",
            endpoint,
            attempt,
            params.connect_attempts.max(1)
        );
        connect_once(&endpoint, params.connect_timeout())
    })
}

/// Run `attempt_fn` until it succeeds or `attempts` attempts have been made,
/// sleeping for `backoff` after each failure except the last.
///
/// `attempt_fn` is passed the 1-based attempt number. At least one attempt
/// is always made.
pub fn retry<T, F>(attempts: u32, backoff: Duration, mut attempt_fn: F) -> Result<T, ConnectError>
where
    F: FnMut(u32) -> Result<T, ConnectError>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match attempt_fn(attempt) {
            Ok(t) => {
                info!("Connected");
                return Ok(t);
            }
            Err(e) if attempt >= attempts => {
                warn!("Connection attempt {} failed with error: {}", attempt, e);
                return Err(ConnectError::RetriesExhausted {
                    attempts,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                warn!("Connection attempt {} failed with error: {}", attempt, e);
                thread::sleep(backoff);
                attempt += 1;
            }
        }
    }
}

/// Make a single connection attempt to `endpoint`.
///
/// The stream is returned in blocking mode with keep-alive enabled.
pub fn connect_once(endpoint: &str, timeout: Duration) -> Result<TcpStream, ConnectError> {
    let addr: SocketAddr = endpoint
        .to_socket_addrs()
        .map_err(|e| ConnectError::AddrResolve(endpoint.into(), e))?
        .next()
        .ok_or_else(|| ConnectError::NoAddress(endpoint.into()))?;

    let stream =
        TcpStream::connect_timeout(&addr, timeout).map_err(ConnectError::CouldNotConnect)?;

    stream
        .set_nonblocking(false)
        .map_err(|e| ConnectError::SocketOptionError("nonblocking", e))?;
    stream
        .set_nodelay(true)
        .map_err(|e| ConnectError::SocketOptionError("TCP_NODELAY", e))?;

    enable_keepalive(&stream)?;

    Ok(stream)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Enable keep-alive and check the socket is healthy.
fn enable_keepalive(stream: &TcpStream) -> Result<(), ConnectError> {
    let sock = SockRef::from(stream);

    sock.set_keepalive(true)
        .map_err(|e| ConnectError::SocketOptionError("SO_KEEPALIVE", e))?;

    match sock.keepalive() {
        Ok(true) => (),
        Ok(false) => return Err(ConnectError::KeepAliveNotEnabled),
        Err(e) => return Err(ConnectError::SocketOptionError("SO_KEEPALIVE", e)),
    }

    match stream.take_error() {
        Ok(None) => Ok(()),
        Ok(Some(e)) | Err(e) => Err(ConnectError::PendingSocketError(e)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_durations_from_bad_values() {
        let params = NetParams {
            connect_backoff_s: f64::INFINITY,
            connect_timeout_s: 1e300,
            ..Default::default()
        };
        assert_eq!(params.connect_backoff(), Duration::from_secs(u64::MAX));
        assert_eq!(params.connect_timeout(), Duration::from_secs(u64::MAX));

        let params = NetParams {
            connect_backoff_s: f64::NAN,
            connect_timeout_s: -1.0,
            ..Default::default()
        };
        assert_eq!(params.connect_backoff(), Duration::from_secs(0));
        assert_eq!(params.connect_timeout(), Duration::from_millis(1));
    }

    #[test]
    fn test_retry_succeeds_on_second_attempt() {
        let mut calls = Vec::new();

        let result = retry(3, Duration::from_millis(1), |attempt| {
            calls.push(attempt);
            if attempt == 1 {
                Err(ConnectError::CouldNotConnect(std::io::ErrorKind::ConnectionRefused.into()))
            } else {
                Ok(attempt)
            }
        });

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, vec![1, 2]);
    }

    #[test]
    fn test_retry_exhausted() {
        let mut calls = 0;

        let result: Result<(), _> = retry(3, Duration::from_millis(1), |_| {
            calls += 1;
            Err(ConnectError::KeepAliveNotEnabled)
        });

        match result {
            Err(ConnectError::RetriesExhausted { attempts: 3, last }) => match *last {
                ConnectError::KeepAliveNotEnabled => (),
                e => panic!("Unexpected last error {:?}", e),
            },
            r => panic!("Expected RetriesExhausted, got {:?}", r),
        }
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_zero_attempts_still_tries_once() {
        let mut calls = 0;
        let result = retry(0, Duration::from_millis(1), |_| {
            calls += 1;
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_connect_once_enables_keepalive() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();

        let stream = connect_once(&endpoint, Duration::from_secs(1)).unwrap();
        assert!(SockRef::from(&stream).keepalive().unwrap());
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port nothing is listening on
        let endpoint = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let params = NetParams {
            host: String::from("127.0.0.1"),
            port: endpoint.rsplit(':').next().unwrap().parse().unwrap(),
            connect_attempts: 2,
            connect_backoff_s: 0.01,
            connect_timeout_s: 1.0,
        };

        match connect(&params) {
            Err(ConnectError::RetriesExhausted { attempts: 2, .. }) => (),
            r => panic!("Expected RetriesExhausted, got {:?}", r.map(|_| ())),
        }
    }
}
