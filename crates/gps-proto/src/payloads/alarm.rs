//! Alarm (0x26) and alarm HVT001 (0x27).

use crate::{
    bytes_util::{read_datetime_sextuplet, DateTimeSextuplet},
    crc::crc_itu,
    errors::{ProtocolError, Result},
    frame::Frame,
    payloads::gps::{read_gps_block, GpsFix},
};

/// Human-readable label for the alarm code table (§Glossary / §4.3.4).
#[must_use]
pub fn alarm_label(code: u8) -> &'static str {
    match code {
        0x01 => "SOS",
        0x02 => "Power Cut Alarm",
        0x03 => "Vibration Alarm",
        0x04 => "Enter Fence Alarm",
        0x05 => "Exit Fence Alarm",
        0x06 => "Over Speed Alarm",
        0x0E => "External Low Battery Alarm",
        0x13 => "Tamper Alarm",
        0x19 => "Internal Low Battery Alarm",
        0xFE => "ACC On",
        0xFF => "ACC Off",
        _ => "Unknown Alarm",
    }
}

/// A parsed alarm payload, shared by 0x26 and 0x27.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    /// Whether this came in as the HVT001 variant (0x27) vs. 0x26.
    pub is_hvt001: bool,
    /// UTC timestamp prefix.
    pub timestamp: DateTimeSextuplet,
    /// Raw alarm code byte.
    pub alarm_code: u8,
    /// GPS fix, present only for 0x27 when the device included one.
    pub gps: Option<GpsFix>,
    /// Sequence carried by the frame.
    pub sequence: u16,
}

/// Parses an alarm payload for opcode `0x26` or `0x27`.
pub fn parse_alarm(frame: &Frame) -> Result<Alarm> {
    let payload = frame.payload();
    if payload.len() < 6 {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: 6,
            have: payload.len(),
        });
    }
    let timestamp = read_datetime_sextuplet(payload, 0);

    let full_len = frame.len();
    if full_len < 8 {
        return Err(ProtocolError::PayloadTooShort { opcode: frame.opcode(), need: 8, have: full_len });
    }
    let alarm_code = frame.raw()[full_len - 8];

    let is_hvt001 = frame.opcode() == 0x27;
    let gps = if is_hvt001 && payload.len() > 6 {
        let gps_info = payload[6];
        if gps_info & 0x0F > 0 {
            read_gps_block(payload, 0).ok().map(|(fix, _)| fix)
        } else {
            None
        }
    } else {
        None
    };

    Ok(Alarm { is_hvt001, timestamp, alarm_code, gps, sequence: frame.sequence() })
}

/// Builds the alarm ack body: `05 <opcode> seq_hi seq_lo crc crc`.
#[must_use]
pub fn build_alarm_ack(opcode: u8, sequence: u16) -> Vec<u8> {
    let mut body = vec![0x05, opcode];
    body.extend_from_slice(&sequence.to_be_bytes());
    let crc = crc_itu(&body);
    body.extend_from_slice(&crc.to_be_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameCodec, FrameOutcome};

    fn decode(bytes: &[u8]) -> Frame {
        match FrameCodec::next_frame(bytes) {
            FrameOutcome::Frame { frame, .. } => frame,
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn s3_corrupted_alarm_fixture() {
        let hex = "787825261A0209061114CF01DBD3430869E777001400090194EA4EB800FFA34002043202008122CC0D0A";
        let bytes: Vec<u8> = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect();

        let frame = decode(&bytes);
        assert_eq!(frame.opcode(), 0x26);

        let alarm = parse_alarm(&frame).unwrap();
        assert_eq!(alarm.timestamp.year, 2026);
        assert_eq!(alarm.timestamp.month, 2);
        assert_eq!(alarm.timestamp.day, 9);
        assert_eq!(alarm.alarm_code, 0x02);
        assert_eq!(alarm_label(alarm.alarm_code), "Power Cut Alarm");
    }
}
