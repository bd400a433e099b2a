//! External device data passthrough (0x9B), e.g. fuel-sensor or RFID readers
//! wired to the tracker's serial port.

use crate::{
    crc::crc_itu,
    errors::{ProtocolError, Result},
    frame::Frame,
};

/// A parsed external-device payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDeviceData {
    /// Raw bytes reported by the attached device.
    pub data: Vec<u8>,
    /// Sequence carried by the frame.
    pub sequence: u16,
}

/// Parses a 0x9B payload: `data-length(1) data(n)`.
pub fn parse_external_device(frame: &Frame) -> Result<ExternalDeviceData> {
    let payload = frame.payload();
    if payload.is_empty() {
        return Err(ProtocolError::PayloadTooShort { opcode: frame.opcode(), need: 1, have: 0 });
    }
    let declared_len = usize::from(payload[0]);
    let available = payload.len() - 1;
    let data_len = declared_len.min(available);

    Ok(ExternalDeviceData { data: payload[1..1 + data_len].to_vec(), sequence: frame.sequence() })
}

/// Builds the 0x9B ack body: `05 9B seq_hi seq_lo crc crc`.
#[must_use]
pub fn build_external_device_ack(sequence: u16) -> Vec<u8> {
    let mut body = vec![0x05, 0x9B];
    body.extend_from_slice(&sequence.to_be_bytes());
    let crc = crc_itu(&body);
    body.extend_from_slice(&crc.to_be_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{assemble_frame, FrameCodec, FrameOutcome};

    #[test]
    fn parses_external_device_payload() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut body = vec![0x9Bu8, data.len() as u8];
        body.extend_from_slice(&data);
        body.extend_from_slice(&0x0010u16.to_be_bytes());
        let bytes = assemble_frame(&body);
        let frame = match FrameCodec::next_frame(&bytes) {
            FrameOutcome::Frame { frame, .. } => frame,
            other => panic!("expected frame, got {other:?}"),
        };
        let parsed = parse_external_device(&frame).unwrap();
        assert_eq!(parsed.data, data);
        assert_eq!(parsed.sequence, 0x0010);
    }
}
