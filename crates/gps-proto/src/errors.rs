//! Frame-local parsing errors.
//!
//! Every variant here is contained to the one frame that produced it; a
//! caller drops the offending frame and keeps the connection open (see
//! the error handling design in the top-level spec).

use thiserror::Error;

/// Result alias for frame and payload parsing.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while decoding a single frame or payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame claimed a length that the buffer does not actually hold.
    #[error("declared frame length {declared} exceeds available buffer ({available} bytes)")]
    LengthOverrun {
        /// Length declared in the frame header.
        declared: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A payload was shorter than its opcode requires.
    #[error("payload too short for opcode {opcode:#04x}: need {need} bytes, have {have}")]
    PayloadTooShort {
        /// Opcode being parsed.
        opcode: u8,
        /// Minimum bytes required.
        need: usize,
        /// Bytes actually present.
        have: usize,
    },

    /// The frame start marker was neither `0x7878` nor `0x7979`.
    #[error("invalid start marker: {0:#06x}")]
    InvalidStartMarker(u16),

    /// An opcode with no registered parser.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// A text field was not valid ASCII/UTF-8.
    #[error("invalid text encoding in opcode {0:#04x} payload")]
    InvalidText(u8),
}
