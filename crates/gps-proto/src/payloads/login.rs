//! Login (0x01).

use crate::{
    bytes_util::decode_bcd_identifier,
    crc::crc_itu,
    errors::{ProtocolError, Result},
    frame::Frame,
};

/// A parsed login payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    /// The device's 15-digit decimal identifier.
    pub identifier: String,
    /// Sequence carried by the frame.
    pub sequence: u16,
}

/// Parses a login payload: an 8-byte BCD identifier.
pub fn parse_login(frame: &Frame) -> Result<Login> {
    let payload = frame.payload();
    if payload.len() < 8 {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: 8,
            have: payload.len(),
        });
    }
    let mut bcd = [0u8; 8];
    bcd.copy_from_slice(&payload[..8]);
    Ok(Login { identifier: decode_bcd_identifier(&bcd), sequence: frame.sequence() })
}

/// Builds the login ack body: `05 01 seq_hi seq_lo crc_hi crc_lo`.
#[must_use]
pub fn build_login_ack(sequence: u16) -> Vec<u8> {
    let mut body = vec![0x05, 0x01];
    body.extend_from_slice(&sequence.to_be_bytes());
    let crc = crc_itu(&body);
    body.extend_from_slice(&crc.to_be_bytes());
    body
}
