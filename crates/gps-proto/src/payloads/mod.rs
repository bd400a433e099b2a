//! One parser and (where applicable) one ack builder per opcode, tied
//! together by [`TelemetryValue`] and its exhaustive-match [`parse`]
//! dispatcher.
//!
//! Dispatch is a sum type matched exhaustively, not a vtable: the sixteen
//! opcodes are fixed at compile time, so there is no value in paying for
//! dynamic dispatch to pick between them.

pub mod alarm;
pub mod command_response;
pub mod external_device;
pub mod external_module;
pub mod file_transfer;
pub mod gps;
pub mod heartbeat;
pub mod info_transmission;
pub mod lbs;
pub mod login;
pub mod time_calibration;
pub mod wifi;

use crate::{errors::Result, frame::Frame, opcode::Opcode, ProtocolError};

/// Every opcode this server can decode, collapsed into one tagged union.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryValue {
    /// 0x01.
    Login(login::Login),
    /// 0x13.
    Heartbeat(heartbeat::Heartbeat),
    /// 0x22.
    GpsLocation(gps::GpsLocation),
    /// 0x26 / 0x27.
    Alarm(alarm::Alarm),
    /// 0x19.
    LbsAlarm(lbs::LbsAlarm),
    /// 0x28.
    LbsMultiBase(lbs::LbsMultiBase),
    /// 0x2C.
    Wifi(wifi::Wifi),
    /// 0x21 / 0x15.
    CommandResponse(command_response::CommandResponse),
    /// 0x8A.
    TimeCalibrationRequest(time_calibration::TimeCalibrationRequest),
    /// 0x8D.
    FileTransferChunk(file_transfer::FileTransferChunk),
    /// 0x94.
    InformationTransmission(info_transmission::InformationTransmission),
    /// 0x9B.
    ExternalDeviceData(external_device::ExternalDeviceData),
    /// 0x9C.
    ExternalModuleData(external_module::ExternalModuleData),
}

impl TelemetryValue {
    /// The sequence number carried by the frame that produced this value.
    #[must_use]
    pub fn sequence(&self) -> u16 {
        match self {
            Self::Login(v) => v.sequence,
            Self::Heartbeat(v) => v.sequence,
            Self::GpsLocation(v) => v.sequence,
            Self::Alarm(v) => v.sequence,
            Self::LbsAlarm(v) => v.sequence,
            Self::LbsMultiBase(v) => v.sequence,
            Self::Wifi(v) => v.sequence,
            Self::CommandResponse(v) => v.sequence,
            Self::TimeCalibrationRequest(v) => v.sequence,
            Self::FileTransferChunk(v) => v.sequence,
            Self::InformationTransmission(_) => 0,
            Self::ExternalDeviceData(v) => v.sequence,
            Self::ExternalModuleData(v) => v.sequence,
        }
    }
}

/// Parses `frame` into a [`TelemetryValue`] according to its opcode.
///
/// Returns [`ProtocolError::UnknownOpcode`] for the outbound-only command
/// opcode and for any opcode this server has no parser for.
pub fn parse(frame: &Frame) -> Result<TelemetryValue> {
    match Opcode::from_byte(frame.opcode()) {
        Opcode::Login => login::parse_login(frame).map(TelemetryValue::Login),
        Opcode::Heartbeat => heartbeat::parse_heartbeat(frame).map(TelemetryValue::Heartbeat),
        Opcode::GpsLocation => gps::parse_gps_location(frame).map(TelemetryValue::GpsLocation),
        Opcode::Alarm | Opcode::AlarmHvt001 => alarm::parse_alarm(frame).map(TelemetryValue::Alarm),
        Opcode::LbsAlarm => lbs::parse_lbs_alarm(frame).map(TelemetryValue::LbsAlarm),
        Opcode::LbsMultiBase => {
            lbs::parse_lbs_multi_base(frame).map(TelemetryValue::LbsMultiBase)
        },
        Opcode::Wifi => wifi::parse_wifi(frame).map(TelemetryValue::Wifi),
        Opcode::CommandResponse => {
            command_response::parse_command_response(frame).map(TelemetryValue::CommandResponse)
        },
        Opcode::CommandResponseJm01 => command_response::parse_command_response_jm01(frame)
            .map(TelemetryValue::CommandResponse),
        Opcode::TimeCalibration => Ok(TelemetryValue::TimeCalibrationRequest(
            time_calibration::parse_time_calibration_request(frame),
        )),
        Opcode::FileTransfer => file_transfer::parse_file_transfer_chunk(frame)
            .map(TelemetryValue::FileTransferChunk),
        Opcode::InformationTransmission => info_transmission::parse_information_transmission(frame)
            .map(TelemetryValue::InformationTransmission),
        Opcode::ExternalDeviceTransfer => {
            external_device::parse_external_device(frame).map(TelemetryValue::ExternalDeviceData)
        },
        Opcode::ExternalModuleTransmission => {
            external_module::parse_external_module(frame).map(TelemetryValue::ExternalModuleData)
        },
        Opcode::Command | Opcode::Unknown(_) => Err(ProtocolError::UnknownOpcode(frame.opcode())),
    }
}

/// Builds the acknowledgment frame body for `value`, if its opcode requires
/// one. Returns `None` for opcodes the protocol does not acknowledge.
#[must_use]
pub fn build_ack(value: &TelemetryValue) -> Option<Vec<u8>> {
    match value {
        TelemetryValue::Login(v) => Some(login::build_login_ack(v.sequence)),
        TelemetryValue::Heartbeat(v) => Some(heartbeat::build_heartbeat_ack(v.sequence)),
        TelemetryValue::Alarm(v) => {
            let opcode = if v.is_hvt001 { Opcode::AlarmHvt001 } else { Opcode::Alarm };
            Some(alarm::build_alarm_ack(opcode.to_byte(), v.sequence))
        },
        TelemetryValue::LbsAlarm(v) => Some(lbs::build_lbs_alarm_ack(v.sequence)),
        TelemetryValue::Wifi(v) => Some(wifi::build_wifi_ack(v.sequence)),
        TelemetryValue::FileTransferChunk(v) => Some(file_transfer::build_file_transfer_ack(v.sequence)),
        TelemetryValue::ExternalDeviceData(v) => {
            Some(external_device::build_external_device_ack(v.sequence))
        },
        TelemetryValue::ExternalModuleData(v) => {
            Some(external_module::build_external_module_ack(v.module_id, v.sequence))
        },
        TelemetryValue::GpsLocation(_)
        | TelemetryValue::LbsMultiBase(_)
        | TelemetryValue::CommandResponse(_)
        | TelemetryValue::TimeCalibrationRequest(_)
        | TelemetryValue::InformationTransmission(_) => None,
    }
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
    fn dispatches_login_and_builds_ack() {
        const S1_LOGIN: [u8; 22] = [
            0x78, 0x78, 0x11, 0x01, 0x03, 0x55, 0x17, 0x21, 0x07, 0x46, 0x10, 0x53, 0x00, 0x36,
            0x00, 0x01, 0x00, 0x01, 0xE0, 0xD1, 0x0D, 0x0A,
        ];
        let frame = decode(&S1_LOGIN);
        let value = parse(&frame).unwrap();
        match &value {
            TelemetryValue::Login(login) => assert_eq!(login.identifier, "355172107461053"),
            other => panic!("unexpected variant: {other:?}"),
        }
        let ack = build_ack(&value).expect("login requires an ack");
        assert_eq!(&ack[..2], &[0x05, 0x01]);
    }

    #[test]
    fn gps_location_has_no_ack() {
        let mut payload = vec![0x1A, 0x02, 0x09, 0x06, 0x11, 0x14, 0x03];
        payload.extend_from_slice(&10_800_000u32.to_be_bytes());
        payload.extend_from_slice(&10_800_000u32.to_be_bytes());
        payload.push(0x00);
        payload.push(0b0001_1111);
        payload.push(0x00);
        payload.extend_from_slice(&[0, 1, 0, 0, 1, 0, 0, 1]);

        let mut body = vec![0x22u8];
        body.extend_from_slice(&payload);
        body.extend_from_slice(&0x0001u16.to_be_bytes());
        let bytes = assemble_frame(&body);
        let frame = decode(&bytes);
        let value = parse(&frame).unwrap();
        assert!(build_ack(&value).is_none());
    }

    #[test]
    fn command_opcode_is_not_dispatchable_inbound() {
        let body = vec![0x80u8, 0, 1];
        let bytes = assemble_frame(&body);
        let frame = decode(&bytes);
        assert!(parse(&frame).is_err());
    }
}
