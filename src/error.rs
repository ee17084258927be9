use std::path::PathBuf;

use thiserror::Error;

/// Errors that may occur in this library.
///
/// Apart from [`Error::BadConfig`] and [`Error::LogSetup`] every variant is
/// recoverable: the supervisor closes the link and opens it again.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// The serial device could not be opened or configured.
    #[error("Could not open `{port}`, problem: {reason}")]
    OpenFailed {
        /// The device path.
        port: String,

        /// What went wrong.
        reason: String,
    },

    /// The link was closed, or the liveness probe failed before sending.
    #[error("Serial port not connected")]
    NotConnected,

    /// A write to the device failed.
    #[error("Write to serial port failed: {0}")]
    WriteFailed(String),

    /// The liveness probe failed in the middle of a transmission.
    #[error("Connection lost during transmission")]
    ConnectionLost,

    /// The text to send could not be read.
    #[error("Could not read `{path:?}`, problem: {reason}")]
    SourceUnreadable {
        /// The source path.
        path: PathBuf,

        /// What went wrong.
        reason: String,
    },

    /// The configuration does not make sense.
    #[error("Bad configuration: {0}")]
    BadConfig(String),

    /// The log sink could not be set up.
    #[error("Could not set up logging: {0}")]
    LogSetup(String),
}

impl Error {
    /// Get the problem description if this is a [`Error::BadConfig`].
    pub fn try_into_bad_config(self) -> Result<String, Self> {
        if let Self::BadConfig(problem) = self {
            Ok(problem)
        } else {
            Err(self)
        }
    }
}
