//! Heartbeat (0x13).

use crate::{
    crc::crc_itu,
    errors::{ProtocolError, Result},
    frame::Frame,
};

/// Textual battery level, per the six-entry table in §4.3.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryLevel {
    /// 0 — no power.
    NoPower,
    /// 1 — extremely low.
    ExtremelyLow,
    /// 2 — very low.
    VeryLow,
    /// 3 — low.
    Low,
    /// 4 — medium.
    Medium,
    /// 5 — high.
    High,
    /// 6 — full.
    Full,
}

impl BatteryLevel {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NoPower),
            1 => Some(Self::ExtremelyLow),
            2 => Some(Self::VeryLow),
            3 => Some(Self::Low),
            4 => Some(Self::Medium),
            5 => Some(Self::High),
            6 => Some(Self::Full),
            _ => None,
        }
    }
}

/// A parsed heartbeat payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Fuel/electricity relay is cut.
    pub oil_electricity_disconnected: bool,
    /// GPS tracking is active.
    pub gps_tracking: bool,
    /// Charging from external power.
    pub charging: bool,
    /// Accessory ignition line is high.
    pub acc_high: bool,
    /// Anti-theft alarm is armed.
    pub defense_activated: bool,
    /// Battery level, if the raw code was recognized.
    pub battery: Option<BatteryLevel>,
    /// Raw GSM signal strength, 0-4.
    pub gsm_signal: u8,
    /// Sequence carried by the frame.
    pub sequence: u16,
}

/// Parses a heartbeat payload: `[terminal_info, battery_level, gsm_signal, language_hi, language_lo]`.
pub fn parse_heartbeat(frame: &Frame) -> Result<Heartbeat> {
    let payload = frame.payload();
    if payload.len() < 3 {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: 3,
            have: payload.len(),
        });
    }

    let terminal_info = payload[0];
    let battery_level = payload[1];
    let gsm_signal = payload[2];

    Ok(Heartbeat {
        oil_electricity_disconnected: terminal_info & 0b1000_0000 != 0,
        gps_tracking: terminal_info & 0b0100_0000 != 0,
        charging: terminal_info & 0b0000_0100 != 0,
        acc_high: terminal_info & 0b0000_0010 != 0,
        defense_activated: terminal_info & 0b0000_0001 != 0,
        battery: BatteryLevel::from_code(battery_level),
        gsm_signal,
        sequence: frame.sequence(),
    })
}

/// Builds the heartbeat ack body: `05 13 seq_hi seq_lo crc crc`.
#[must_use]
pub fn build_heartbeat_ack(sequence: u16) -> Vec<u8> {
    let mut body = vec![0x05, 0x13];
    body.extend_from_slice(&sequence.to_be_bytes());
    let crc = crc_itu(&body);
    body.extend_from_slice(&crc.to_be_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{assemble_frame, FrameCodec, FrameOutcome};

    fn frame_for(opcode: u8, payload: &[u8], sequence: u16) -> Frame {
        let mut body = vec![opcode];
        body.extend_from_slice(payload);
        body.extend_from_slice(&sequence.to_be_bytes());
        let bytes = assemble_frame(&body);
        match FrameCodec::next_frame(&bytes) {
            FrameOutcome::Frame { frame, .. } => frame,
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn s2_heartbeat() {
        // terminal_info 0x47 = 0100_0111 -> bits 6,2,1,0 set.
        let frame = frame_for(0x13, &[0x47, 0x06, 0x04, 0x00, 0x02], 0x0010);
        let hb = parse_heartbeat(&frame).unwrap();

        assert!(!hb.oil_electricity_disconnected);
        assert!(hb.gps_tracking);
        assert!(hb.charging);
        assert!(hb.acc_high);
        assert!(hb.defense_activated);
        assert_eq!(hb.battery, Some(BatteryLevel::Full));
        assert_eq!(hb.gsm_signal, 0x04);
        assert_eq!(hb.sequence, 0x0010);

        let ack = build_heartbeat_ack(hb.sequence);
        assert_eq!(ack[0], 0x05);
        assert_eq!(ack[1], 0x13);
        assert_eq!(&ack[2..4], &0x0010u16.to_be_bytes());
    }
}
