//! Error types for the GPS session core.
//!
//! Strongly-typed errors for connection-local failures (bad framing, state
//! violations, oversized buffers). We avoid `std::io::Error` for session
//! logic to keep protocol errors distinguishable from transport errors.

use std::io;

use thiserror::Error;

use crate::session::SessionState;

/// Maximum bytes a single session's receive buffer may hold before the
/// connection is closed with [`ConnectionError::FrameTooLarge`].
pub const MAX_RECEIVE_BUFFER: usize = 64 * 1024;

/// Errors that can occur while driving a session's state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted.
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred.
        state: SessionState,
        /// Operation that was attempted.
        operation: String,
    },

    /// A frame arrived before the device had identified itself via login.
    #[error("frame with opcode {opcode:#04x} received before login")]
    NotIdentified {
        /// Opcode of the frame that required an identified session.
        opcode: u8,
    },

    /// Connection idle timeout exceeded.
    #[error("idle timeout after {elapsed_secs}s")]
    IdleTimeout {
        /// How long the session was idle, in seconds.
        elapsed_secs: u64,
    },

    /// The frame codec's declared length would grow the receive buffer
    /// beyond [`MAX_RECEIVE_BUFFER`].
    #[error("frame too large: declared length would need {needed} bytes, cap is {cap}")]
    FrameTooLarge {
        /// Bytes the declared frame length would require.
        needed: usize,
        /// The configured cap.
        cap: usize,
    },

    /// Wire-format error surfaced from `gps-proto`.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying transport error.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Returns true if this error is transient and does not indicate a
    /// malformed or malicious peer.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::IdleTimeout { .. })
    }
}

/// Converts `ConnectionError` to `io::Error` for compatibility with async
/// I/O APIs. Boundary conversion only; session logic uses `ConnectionError`.
impl From<ConnectionError> for io::Error {
    fn from(err: ConnectionError) -> Self {
        let kind = match &err {
            ConnectionError::IdleTimeout { .. } => io::ErrorKind::TimedOut,
            ConnectionError::InvalidState { .. }
            | ConnectionError::NotIdentified { .. }
            | ConnectionError::FrameTooLarge { .. }
            | ConnectionError::Protocol(_) => io::ErrorKind::InvalidData,
            ConnectionError::Transport(_) => io::ErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

/// Converts `gps-proto` errors to `ConnectionError`.
impl From<gps_proto::ProtocolError> for ConnectionError {
    fn from(err: gps_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Converts `io::Error` to `ConnectionError` (for transport errors).
impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_timeout_is_transient() {
        assert!(ConnectionError::IdleTimeout { elapsed_secs: 61 }.is_transient());
    }

    #[test]
    fn protocol_violations_are_fatal() {
        assert!(
            !ConnectionError::InvalidState {
                state: SessionState::Open,
                operation: "send_command".to_string(),
            }
            .is_transient()
        );
        assert!(!ConnectionError::NotIdentified { opcode: 0x22 }.is_transient());
        assert!(!ConnectionError::FrameTooLarge { needed: 100_000, cap: 65_536 }.is_transient());
        assert!(!ConnectionError::Protocol("bad crc".to_string()).is_transient());
        assert!(!ConnectionError::Transport("reset".to_string()).is_transient());
    }
}
