//! LBS alarm (0x19) and LBS multi-base extension (0x28).

use crate::{
    bytes_util::{read_datetime_sextuplet, read_u16_be, read_u24_be},
    crc::crc_itu,
    errors::{ProtocolError, Result},
    frame::Frame,
};

/// A parsed LBS alarm payload (0x19): no date/time, a single cell plus
/// device status bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LbsAlarm {
    /// Mobile country code.
    pub mcc: u16,
    /// Mobile network code.
    pub mnc: u8,
    /// Location area code.
    pub lac: u16,
    /// Cell identifier.
    pub cell_id: u32,
    /// Raw terminal-info byte (same bit layout as heartbeat's).
    pub terminal_info: u8,
    /// Raw battery/voltage level byte.
    pub voltage_level: u8,
    /// GSM signal strength.
    pub gsm_signal: u8,
    /// Raw alarm code byte.
    pub alarm_code: u8,
    /// Sequence carried by the frame.
    pub sequence: u16,
}

const LBS_ALARM_LEN: usize = 2 + 1 + 2 + 3 + 1 + 1 + 1 + 1 + 1;

/// Parses an LBS alarm payload.
pub fn parse_lbs_alarm(frame: &Frame) -> Result<LbsAlarm> {
    let payload = frame.payload();
    if payload.len() < LBS_ALARM_LEN {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: LBS_ALARM_LEN,
            have: payload.len(),
        });
    }

    Ok(LbsAlarm {
        mcc: read_u16_be(payload, 0),
        mnc: payload[2],
        lac: read_u16_be(payload, 3),
        cell_id: read_u24_be(payload, 5),
        terminal_info: payload[8],
        voltage_level: payload[9],
        gsm_signal: payload[10],
        alarm_code: payload[11],
        sequence: frame.sequence(),
    })
}

/// Builds the LBS alarm ack body: `05 19 seq_hi seq_lo crc crc`.
#[must_use]
pub fn build_lbs_alarm_ack(sequence: u16) -> Vec<u8> {
    let mut body = vec![0x05, 0x19];
    body.extend_from_slice(&sequence.to_be_bytes());
    let crc = crc_itu(&body);
    body.extend_from_slice(&crc.to_be_bytes());
    body
}

/// One cell tower record: `LAC(2) CID(3) RSSI(1)`, as used by the neighbor
/// list in the multi-base and WiFi payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborCell {
    /// Location area code.
    pub lac: u16,
    /// Cell identifier.
    pub cell_id: u32,
    /// Received signal strength.
    pub rssi: u8,
}

/// The shared 45-byte `date(6) + main-cell(9) + neighbors(36)` LBS block
/// used by both 0x28 and 0x2C.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LbsBlock {
    /// Mobile country code of the main cell.
    pub mcc: u16,
    /// Mobile network code of the main cell.
    pub mnc: u8,
    /// Location area code of the main cell.
    pub lac: u16,
    /// Cell identifier of the main cell.
    pub cell_id: u32,
    /// Main cell's signal strength.
    pub rssi: u8,
    /// Up to six neighboring cells.
    pub neighbors: Vec<NeighborCell>,
}

const LBS_BLOCK_LEN: usize = 9 + 36;

/// Reads the 45-byte LBS block at `offset`.
pub fn read_lbs_block(data: &[u8], offset: usize) -> Result<LbsBlock> {
    if data.len() < offset + LBS_BLOCK_LEN {
        return Err(ProtocolError::PayloadTooShort {
            opcode: 0x28,
            need: offset + LBS_BLOCK_LEN,
            have: data.len(),
        });
    }

    let mcc = read_u16_be(data, offset);
    let mnc = data[offset + 2];
    let lac = read_u16_be(data, offset + 3);
    let cell_id = read_u24_be(data, offset + 5);
    let rssi = data[offset + 8];

    let mut neighbors = Vec::with_capacity(6);
    for i in 0..6 {
        let base = offset + 9 + i * 6;
        neighbors.push(NeighborCell {
            lac: read_u16_be(data, base),
            cell_id: read_u24_be(data, base + 2),
            rssi: data[base + 5],
        });
    }

    Ok(LbsBlock { mcc, mnc, lac, cell_id, rssi, neighbors })
}

/// A parsed LBS multi-base extension payload (0x28). No acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LbsMultiBase {
    /// Date-time prefix.
    pub timestamp: crate::bytes_util::DateTimeSextuplet,
    /// Main cell plus up to six neighbors.
    pub block: LbsBlock,
    /// Timing-advance byte.
    pub timing_advance: u8,
    /// Sequence carried by the frame.
    pub sequence: u16,
}

/// Parses an LBS multi-base extension payload.
pub fn parse_lbs_multi_base(frame: &Frame) -> Result<LbsMultiBase> {
    let payload = frame.payload();
    if payload.len() < 6 {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: 6,
            have: payload.len(),
        });
    }
    let timestamp = read_datetime_sextuplet(payload, 0);
    let block = read_lbs_block(payload, 6)?;

    let timing_advance_offset = 6 + LBS_BLOCK_LEN;
    let timing_advance = payload.get(timing_advance_offset).copied().unwrap_or(0);

    Ok(LbsMultiBase { timestamp, block, timing_advance, sequence: frame.sequence() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{assemble_frame, FrameCodec, FrameOutcome};

    fn decode(bytes: &[u8]) -> Frame {
        match FrameCodec::next_frame(bytes) {
            FrameOutcome::Frame { frame, .. } => frame,
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn parses_lbs_alarm_fields() {
        let payload = [0x02u8, 0x01, 0x03, 0x00, 0x42, 0x00, 0x12, 0x34, 0x47, 0x06, 0x04, 0x02];
        let mut body = vec![0x19u8];
        body.extend_from_slice(&payload);
        body.extend_from_slice(&0x0005u16.to_be_bytes());
        let bytes = assemble_frame(&body);
        let frame = decode(&bytes);
        let alarm = parse_lbs_alarm(&frame).unwrap();
        assert_eq!(alarm.mcc, 0x0201);
        assert_eq!(alarm.alarm_code, 0x02);
        assert_eq!(alarm.sequence, 0x0005);
    }

    #[test]
    fn parses_multi_base_with_six_neighbors() {
        let mut payload = vec![0x1A, 0x02, 0x09, 0x06, 0x11, 0x14]; // date
        payload.extend_from_slice(&[0x02, 0x01, 0x03, 0x00, 0x42, 0x00, 0x12, 0x34, 0x47]); // main cell
        for _ in 0..6 {
            payload.extend_from_slice(&[0x00, 0x42, 0x00, 0x12, 0x34, 0x20]); // neighbor
        }
        payload.push(0x05); // timing advance

        let mut body = vec![0x28u8];
        body.extend_from_slice(&payload);
        body.extend_from_slice(&0x0006u16.to_be_bytes());
        let bytes = assemble_frame(&body);
        let frame = decode(&bytes);
        let multi = parse_lbs_multi_base(&frame).unwrap();
        assert_eq!(multi.block.neighbors.len(), 6);
        assert_eq!(multi.timing_advance, 0x05);
    }
}
