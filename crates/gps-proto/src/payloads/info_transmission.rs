//! Information transmission (0x94). No acknowledgment for any sub-opcode.

use std::collections::BTreeMap;

use crate::{
    bytes_util::read_u16_be,
    errors::{ProtocolError, Result},
    frame::Frame,
};

/// Decoded door-status bits (sub-opcode 0x05).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorStatus {
    /// Door is open.
    pub open: bool,
    /// Triggering line is high.
    pub triggering_high: bool,
    /// IO line is high.
    pub io_high: bool,
}

/// The decoded body of an information-transmission payload, one variant per
/// sub-opcode.
#[derive(Debug, Clone, PartialEq)]
pub enum InformationTransmission {
    /// 0x00 — external power voltage, in volts.
    ExternalPowerVoltage(f64),
    /// 0x04 — status synchronisation key/value pairs.
    StatusSync {
        /// Parsed `KEY=VAL` pairs.
        fields: BTreeMap<String, String>,
        /// Whether key `DYD`'s bit 1 indicates the fuel/electricity cut is engaged.
        fuel_electricity_cut: bool,
    },
    /// 0x05 — door status.
    DoorStatus(DoorStatus),
    /// 0x0A — ICCID, hex-encoded.
    Iccid(String),
    /// Any other sub-opcode: raw payload bytes past the sub-opcode byte.
    Raw {
        /// The sub-opcode byte.
        sub_opcode: u8,
        /// Raw bytes following the sub-opcode.
        data: Vec<u8>,
    },
}

fn parse_status_sync(ascii: &[u8]) -> (BTreeMap<String, String>, bool) {
    let text = String::from_utf8_lossy(ascii);
    let mut fields = BTreeMap::new();
    for entry in text.split(';') {
        if let Some((key, value)) = entry.split_once('=') {
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    let fuel_electricity_cut = fields
        .get("DYD")
        .and_then(|v| u32::from_str_radix(v.trim_start_matches("0x"), 16).ok())
        .map(|v| v & 0b10 != 0)
        .unwrap_or(false);

    (fields, fuel_electricity_cut)
}

/// Parses an information-transmission payload.
pub fn parse_information_transmission(frame: &Frame) -> Result<InformationTransmission> {
    let payload = frame.payload();
    if payload.is_empty() {
        return Err(ProtocolError::PayloadTooShort { opcode: frame.opcode(), need: 1, have: 0 });
    }
    let sub_opcode = payload[0];
    let rest = &payload[1..];

    Ok(match sub_opcode {
        0x00 => {
            if rest.len() < 2 {
                return Err(ProtocolError::PayloadTooShort {
                    opcode: frame.opcode(),
                    need: 3,
                    have: payload.len(),
                });
            }
            let raw = read_u16_be(rest, 0);
            InformationTransmission::ExternalPowerVoltage(f64::from(raw) / 100.0)
        },
        0x04 => {
            // ASCII payload runs from payload_start + 1 to frame_length - 6;
            // `rest` here is already that window since `payload()` is
            // already trimmed to exclude sequence/crc/terminator.
            let (fields, fuel_electricity_cut) = parse_status_sync(rest);
            InformationTransmission::StatusSync { fields, fuel_electricity_cut }
        },
        0x05 => {
            if rest.is_empty() {
                return Err(ProtocolError::PayloadTooShort {
                    opcode: frame.opcode(),
                    need: 2,
                    have: payload.len(),
                });
            }
            let bits = rest[0];
            InformationTransmission::DoorStatus(DoorStatus {
                open: bits & 0b001 != 0,
                triggering_high: bits & 0b010 != 0,
                io_high: bits & 0b100 != 0,
            })
        },
        0x0A => {
            if rest.len() < 10 {
                return Err(ProtocolError::PayloadTooShort {
                    opcode: frame.opcode(),
                    need: 11,
                    have: payload.len(),
                });
            }
            let iccid = rest[..10].iter().map(|b| format!("{b:02x}")).collect();
            InformationTransmission::Iccid(iccid)
        },
        other => InformationTransmission::Raw { sub_opcode: other, data: rest.to_vec() },
    })
}
