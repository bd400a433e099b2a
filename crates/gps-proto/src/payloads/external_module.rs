//! External module transmission (0x9C), e.g. a CAN/OBD add-on board
//! reporting through a distinct module id.

use crate::{
    crc::crc_itu,
    errors::{ProtocolError, Result},
    frame::Frame,
};

/// A parsed external-module payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalModuleData {
    /// Identifies which attached module produced `data`.
    pub module_id: u8,
    /// Raw bytes reported by the module.
    pub data: Vec<u8>,
    /// Sequence carried by the frame.
    pub sequence: u16,
}

/// Parses a 0x9C payload: `module-id(1) data-length(1) data(n)`.
pub fn parse_external_module(frame: &Frame) -> Result<ExternalModuleData> {
    let payload = frame.payload();
    if payload.len() < 2 {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: 2,
            have: payload.len(),
        });
    }
    let module_id = payload[0];
    let declared_len = usize::from(payload[1]);
    let available = payload.len() - 2;
    let data_len = declared_len.min(available);

    Ok(ExternalModuleData {
        module_id,
        data: payload[2..2 + data_len].to_vec(),
        sequence: frame.sequence(),
    })
}

/// Builds the 0x9C ack body: `06 9C module_id seq_hi seq_lo crc crc`.
#[must_use]
pub fn build_external_module_ack(module_id: u8, sequence: u16) -> Vec<u8> {
    let mut body = vec![0x06, 0x9C, module_id];
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
    fn parses_external_module_payload() {
        let data = [0x01, 0x02, 0x03];
        let mut body = vec![0x9Cu8, 0x07, data.len() as u8];
        body.extend_from_slice(&data);
        body.extend_from_slice(&0x0011u16.to_be_bytes());
        let bytes = assemble_frame(&body);
        let frame = match FrameCodec::next_frame(&bytes) {
            FrameOutcome::Frame { frame, .. } => frame,
            other => panic!("expected frame, got {other:?}"),
        };
        let parsed = parse_external_module(&frame).unwrap();
        assert_eq!(parsed.module_id, 0x07);
        assert_eq!(parsed.data, data);
    }

    #[test]
    fn ack_carries_module_id() {
        let ack = build_external_module_ack(0x07, 0x0011);
        assert_eq!(ack[2], 0x07);
    }
}
