//! Unified error type.

use std::fmt;

/// Boxed error type carried by type-erased request bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type returned by plinth's fallible operations.
///
/// Application-level failures (404, 415, 503, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: binding a port, accepting a connection, or a
/// drain that did not finish inside its deadline.
#[derive(Debug)]
pub enum Error {
    /// Socket-level failure while binding or accepting.
    Io(std::io::Error),
    /// The drain deadline elapsed with connections still open. The caller
    /// is expected to exit with a failure status.
    DrainTimedOut {
        /// Connections still open when the deadline fired.
        in_flight: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::DrainTimedOut { in_flight } => {
                write!(f, "drain timed out with {in_flight} connections still open")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::DrainTimedOut { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
