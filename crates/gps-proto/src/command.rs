//! The outbound server-to-device command (0x80) encoder.
//!
//! Unlike every other payload in this crate, there is no inbound parser: a
//! command only ever travels server to device, and its response comes back
//! as a 0x15/0x21 [`crate::payloads::command_response::CommandResponse`]
//! correlated by sequence.

use crate::frame::assemble_frame;

/// Chinese (`0x0001`) vs. English (`0x0002`) reply language, per §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandLanguage {
    /// `0x0001`.
    Chinese,
    /// `0x0002`.
    English,
}

impl CommandLanguage {
    fn to_be_bytes(self) -> [u8; 2] {
        match self {
            Self::Chinese => 1u16.to_be_bytes(),
            Self::English => 2u16.to_be_bytes(),
        }
    }
}

/// Builds a server-to-device command frame:
/// `80 server-flag(4) command-text language(2) sequence(2)`, short- or
/// long-framed depending on the resulting body size.
#[must_use]
pub fn build_command_frame(
    command_text: &str,
    server_flag: u32,
    language: CommandLanguage,
    sequence: u16,
) -> Vec<u8> {
    let mut body = vec![0x80u8];
    body.extend_from_slice(&server_flag.to_be_bytes());
    body.extend_from_slice(command_text.as_bytes());
    body.extend_from_slice(&language.to_be_bytes());
    body.extend_from_slice(&sequence.to_be_bytes());
    assemble_frame(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameCodec, FrameOutcome};

    #[test]
    fn encodes_short_command() {
        let bytes = build_command_frame("RESET#", 0, CommandLanguage::English, 0x0001);
        match FrameCodec::next_frame(&bytes) {
            FrameOutcome::Frame { frame, consumed } => {
                assert_eq!(consumed, bytes.len());
                assert_eq!(frame.opcode(), 0x80);
                assert_eq!(frame.sequence(), 0x0001);
                assert!(frame.crc_valid());
            },
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn encodes_long_command_when_body_exceeds_short_limit() {
        let long_text = "X".repeat(300);
        let bytes = build_command_frame(&long_text, 0, CommandLanguage::English, 0x0002);
        assert_eq!(&bytes[..2], &[0x79, 0x79]);
        match FrameCodec::next_frame(&bytes) {
            FrameOutcome::Frame { frame, .. } => assert!(frame.crc_valid()),
            other => panic!("expected a frame, got {other:?}"),
        }
    }
}
