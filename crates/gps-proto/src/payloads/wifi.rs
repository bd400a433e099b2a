//! WiFi access point report (0x2C).

use crate::{
    bytes_util::{read_datetime_sextuplet, DateTimeSextuplet},
    crc::crc_itu,
    errors::{ProtocolError, Result},
    frame::Frame,
    payloads::lbs::{read_lbs_block, LbsBlock},
};

/// One observed WiFi access point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    /// MAC address rendered as six colon-separated hex pairs.
    pub mac: String,
    /// Signal strength, signed (two's complement over one byte).
    pub signal: i8,
    /// SSID bytes, decoded as UTF-8.
    pub ssid: String,
}

/// A parsed WiFi payload (0x2C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wifi {
    /// Date-time prefix.
    pub timestamp: DateTimeSextuplet,
    /// The shared LBS block (main cell + six neighbors).
    pub lbs: LbsBlock,
    /// Observed access points.
    pub access_points: Vec<AccessPoint>,
    /// Sequence carried by the frame.
    pub sequence: u16,
}

const LBS_BLOCK_LEN: usize = 9 + 36;

/// Parses a WiFi payload.
pub fn parse_wifi(frame: &Frame) -> Result<Wifi> {
    let payload = frame.payload();
    if payload.len() < 6 {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: 6,
            have: payload.len(),
        });
    }
    let timestamp = read_datetime_sextuplet(payload, 0);
    let lbs = read_lbs_block(payload, 6)?;

    let mut cursor = 6 + LBS_BLOCK_LEN + 1; // skip time-leads byte
    if payload.len() < cursor + 1 {
        return Err(ProtocolError::PayloadTooShort { opcode: frame.opcode(), need: cursor + 1, have: payload.len() });
    }
    let ap_count = payload[cursor];
    cursor += 1;

    let mut access_points = Vec::with_capacity(usize::from(ap_count));
    for _ in 0..ap_count {
        if payload.len() < cursor + 8 {
            return Err(ProtocolError::PayloadTooShort {
                opcode: frame.opcode(),
                need: cursor + 8,
                have: payload.len(),
            });
        }
        let mac_bytes = &payload[cursor..cursor + 6];
        let mac = mac_bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(":");
        let signal = payload[cursor + 6] as i8;
        let ssid_len = usize::from(payload[cursor + 7]);
        cursor += 8;

        if payload.len() < cursor + ssid_len {
            return Err(ProtocolError::PayloadTooShort {
                opcode: frame.opcode(),
                need: cursor + ssid_len,
                have: payload.len(),
            });
        }
        let ssid = String::from_utf8(payload[cursor..cursor + ssid_len].to_vec())
            .map_err(|_| ProtocolError::InvalidText(frame.opcode()))?;
        cursor += ssid_len;

        access_points.push(AccessPoint { mac, signal, ssid });
    }

    Ok(Wifi { timestamp, lbs, access_points, sequence: frame.sequence() })
}

/// Builds the WiFi ack body: `05 2C seq_hi seq_lo crc crc`.
#[must_use]
pub fn build_wifi_ack(sequence: u16) -> Vec<u8> {
    let mut body = vec![0x05, 0x2C];
    body.extend_from_slice(&sequence.to_be_bytes());
    let crc = crc_itu(&body);
    body.extend_from_slice(&crc.to_be_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{assemble_frame, FrameCodec, FrameOutcome};
    use regex_lite_check::mac_matches;

    mod regex_lite_check {
        pub fn mac_matches(mac: &str) -> bool {
            let parts: Vec<&str> = mac.split(':').collect();
            parts.len() == 6
                && parts.iter().all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
        }
    }

    fn decode(bytes: &[u8]) -> Frame {
        match FrameCodec::next_frame(bytes) {
            FrameOutcome::Frame { frame, .. } => frame,
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn s6_wifi_payload_count_bound() {
        let mut payload = vec![0x1A, 0x02, 0x09, 0x06, 0x11, 0x14]; // date
        payload.extend_from_slice(&[0x02, 0x01, 0x03, 0x00, 0x42, 0x00, 0x12, 0x34, 0x47]); // main cell
        for _ in 0..6 {
            payload.extend_from_slice(&[0x00, 0x42, 0x00, 0x12, 0x34, 0x20]); // neighbor
        }
        payload.push(0x00); // time-leads
        payload.push(0x02); // ap_count

        for i in 0..2u8 {
            payload.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, i]); // mac
            payload.push((-40i8) as u8); // signal
            let ssid = format!("AP{i}");
            payload.push(ssid.len() as u8);
            payload.extend_from_slice(ssid.as_bytes());
        }

        let mut body = vec![0x2Cu8];
        body.extend_from_slice(&payload);
        body.extend_from_slice(&0x0007u16.to_be_bytes());
        let bytes = assemble_frame(&body);
        let frame = decode(&bytes);
        let wifi = parse_wifi(&frame).unwrap();

        assert_eq!(wifi.access_points.len(), 2);
        for ap in &wifi.access_points {
            assert!(mac_matches(&ap.mac), "bad mac: {}", ap.mac);
        }
        assert_eq!(wifi.access_points[0].ssid, "AP0");
        assert_eq!(wifi.access_points[1].ssid, "AP1");
    }
}
