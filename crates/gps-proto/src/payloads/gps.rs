//! GPS location (0x22), plus the shared GPS-block reader used by the alarm
//! (0x27) payload.

use crate::{
    bytes_util::{read_datetime_sextuplet, read_u16_be, read_u24_be, read_u32_be, DateTimeSextuplet},
    errors::{ProtocolError, Result},
    frame::Frame,
};

/// Fixed-size portion of a GPS block: date(6) + gps_info(1) + lat(4) + lon(4) + speed(1) + course_status(2).
const MIN_GPS_BLOCK: usize = 18;

/// A decoded GPS fix block (date, position, course, cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsFix {
    /// UTC timestamp of the fix.
    pub timestamp: DateTimeSextuplet,
    /// Number of satellites used.
    pub satellite_count: u8,
    /// Latitude in millionths of a degree (decimal degrees * 1_000_000),
    /// sign already applied. Kept as an integer to avoid float precision
    /// drift; callers divide by 1_000_000.0 for display.
    pub latitude_micro_deg: i32,
    /// Longitude in millionths of a degree, sign already applied.
    pub longitude_micro_deg: i32,
    /// Speed in km/h.
    pub speed_kmh: u8,
    /// 10-bit course value, always in `0..=1023`.
    pub course_raw: u16,
    /// Whether the fix is considered positioned (GPS block valid and
    /// latitude/longitude within range).
    pub positioned: bool,
    /// `false` = real-time fix, `true` = differential.
    pub differential: bool,
    /// Mobile country code.
    pub mcc: u16,
    /// Mobile network code.
    pub mnc: u8,
    /// Location area code.
    pub lac: u16,
    /// Cell identifier.
    pub cell_id: u32,
}

/// Reads a GPS fix block starting at `offset` within `data`. Returns the
/// fix plus the number of bytes consumed (18, the fixed portion).
pub fn read_gps_block(data: &[u8], offset: usize) -> Result<(GpsFix, usize)> {
    if data.len() < offset + MIN_GPS_BLOCK {
        return Err(ProtocolError::PayloadTooShort {
            opcode: 0x22,
            need: offset + MIN_GPS_BLOCK,
            have: data.len(),
        });
    }

    let timestamp = read_datetime_sextuplet(data, offset);
    let gps_info = data[offset + 6];
    let satellite_count = gps_info & 0x0F;

    let raw_lat = read_u32_be(data, offset + 7);
    let raw_lon = read_u32_be(data, offset + 11);
    let speed_kmh = data[offset + 15];
    let b1 = data[offset + 16];
    let b2 = data[offset + 17];

    let course_raw = (u16::from(b1 & 0x03) << 8) | u16::from(b2);
    let gps_positioned = b1 & 0b0001_0000 != 0;
    let differential = b1 & 0b0010_0000 != 0;
    let longitude_west = b1 & 0b0000_1000 != 0;
    let latitude_north = b1 & 0b0000_0100 != 0;

    let lat_deg = (raw_lat as f64) / 1_800_000.0;
    let lon_deg = (raw_lon as f64) / 1_800_000.0;

    let latitude = if latitude_north { lat_deg } else { -lat_deg };
    let longitude = if longitude_west { -lon_deg } else { lon_deg };

    let in_range = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
    let positioned = gps_positioned && in_range;

    let cell_offset = offset + 18;
    let (mcc, mnc, lac, cell_id) = if data.len() >= cell_offset + 8 {
        (
            read_u16_be(data, cell_offset),
            data[cell_offset + 2],
            read_u16_be(data, cell_offset + 3),
            read_u24_be(data, cell_offset + 5),
        )
    } else {
        (0, 0, 0, 0)
    };

    Ok((
        GpsFix {
            timestamp,
            satellite_count,
            latitude_micro_deg: (latitude * 1_000_000.0) as i32,
            longitude_micro_deg: (longitude * 1_000_000.0) as i32,
            speed_kmh,
            course_raw,
            positioned,
            differential,
            mcc,
            mnc,
            lac,
            cell_id,
        },
        MIN_GPS_BLOCK,
    ))
}

/// A parsed GPS location payload (0x22). No acknowledgment is sent for this
/// opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsLocation {
    /// The fix itself.
    pub fix: GpsFix,
    /// Accessory line state, if present in the payload.
    pub acc_high: Option<bool>,
    /// Upload-mode code, if present.
    pub upload_mode: Option<u8>,
    /// Odometer reading in meters, if present (located at `len - 10`).
    pub odometer_m: Option<u32>,
    /// Sequence carried by the frame.
    pub sequence: u16,
}

/// Human-readable label for the upload-mode code table in §4.3.3.
#[must_use]
pub fn upload_mode_label(code: u8) -> &'static str {
    match code {
        0x00 => "Time",
        0x01 => "Distance",
        0x02 => "Inflection",
        0x03 => "ACC",
        0x04 => "Re-upload",
        0x05 => "Network Recovery",
        0x08 => "Power On",
        0x0E => "GPS Dup",
        _ => "Unknown",
    }
}

/// Parses a GPS location payload.
pub fn parse_gps_location(frame: &Frame) -> Result<GpsLocation> {
    let payload = frame.payload();
    let (fix, consumed) = read_gps_block(payload, 0)?;

    let mut cursor = consumed + 8; // skip the fixed cell block (mcc2+mnc1+lac2+cid3)
    let mut acc_high = None;
    let mut upload_mode = None;

    if payload.len() >= cursor + 3 {
        acc_high = Some(payload[cursor] != 0);
        upload_mode = Some(payload[cursor + 1]);
        cursor += 3;
    }
    let _ = cursor;

    let odometer_m = if frame.len() >= 10 {
        let odo_offset = frame.len() - 10;
        if odo_offset >= frame.payload_start() && odo_offset + 4 <= frame.len() - 6 {
            Some(read_u32_be(frame.raw(), odo_offset))
        } else {
            None
        }
    } else {
        None
    };

    Ok(GpsLocation { fix, acc_high, upload_mode, odometer_m, sequence: frame.sequence() })
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
    fn course_is_ten_bit() {
        // b1 = 0b1111_1111 -> low two bits = 0b11, b2 = 0xFF -> course = 0x3FF = 1023.
        let mut payload = vec![0x1A, 0x02, 0x09, 0x06, 0x11, 0x14, 0x03];
        payload.extend_from_slice(&10_800_000u32.to_be_bytes()); // lat
        payload.extend_from_slice(&10_800_000u32.to_be_bytes()); // lon
        payload.push(0x00); // speed
        payload.push(0b0001_1111); // b1: positioned, north, east
        payload.push(0xFF); // b2
        payload.extend_from_slice(&[0, 1, 0, 0, 1, 0, 0, 1]); // mcc/mnc/lac/cell

        let mut body = vec![0x22u8];
        body.extend_from_slice(&payload);
        body.extend_from_slice(&0x0001u16.to_be_bytes());
        let bytes = assemble_frame(&body);
        let frame = decode(&bytes);
        let gps = parse_gps_location(&frame).unwrap();
        assert_eq!(gps.fix.course_raw, 0x3FF);
        assert!(gps.fix.course_raw <= 1023);
    }

    #[test]
    fn out_of_range_coordinates_are_unpositioned() {
        // raw value large enough that /1_800_000 exceeds 90 degrees.
        let huge = 200_000_000u32;
        let mut payload = vec![0x1A, 0x02, 0x09, 0x06, 0x11, 0x14, 0x03];
        payload.extend_from_slice(&huge.to_be_bytes());
        payload.extend_from_slice(&huge.to_be_bytes());
        payload.push(0x00);
        payload.push(0b0001_0100); // positioned bit set, north, east
        payload.push(0x00);
        payload.extend_from_slice(&[0, 1, 0, 0, 1, 0, 0, 1]);

        let mut body = vec![0x22u8];
        body.extend_from_slice(&payload);
        body.extend_from_slice(&0x0002u16.to_be_bytes());
        let bytes = assemble_frame(&body);
        let frame = decode(&bytes);
        let gps = parse_gps_location(&frame).unwrap();
        assert!(!gps.fix.positioned);
    }
}
