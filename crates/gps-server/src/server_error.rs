//! Process-level server errors.
//!
//! Hand-rolled `Display`/`Error`, not `thiserror`: this crate's lower layers
//! (`gps_proto::ProtocolError`, `gps_core::ConnectionError`) are
//! thiserror-derived and contained to a frame or a connection; `ServerError`
//! covers the handful of failures that abort the whole process (bind
//! failure, listener setup), so it gets the simpler hand-written treatment.

use std::fmt;

/// Errors that can abort the server process.
#[derive(Debug)]
pub enum ServerError {
    /// Failed to bind the device-facing TCP listener.
    Bind {
        /// Address the listener tried to bind.
        address: String,
        /// Underlying I/O error.
        reason: String,
    },

    /// Failed to bind the operator control listener.
    ControlBind {
        /// Address the listener tried to bind.
        address: String,
        /// Underlying I/O error.
        reason: String,
    },

    /// A connection-level I/O error that escaped the per-session task.
    Io(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { address, reason } => {
                write!(f, "failed to bind device listener on {address}: {reason}")
            },
            Self::ControlBind { address, reason } => {
                write!(f, "failed to bind control listener on {address}: {reason}")
            },
            Self::Io(reason) => write!(f, "I/O error: {reason}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
