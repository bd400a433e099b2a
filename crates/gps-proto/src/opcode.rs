//! The sixteen wire opcodes this server understands, plus the server-to-device
//! command opcode used by the command encoder.

/// A Concox V5 opcode byte.
///
/// Dispatch is a static, exhaustive match over this enum rather than a
/// dynamic lookup table keyed by `u8` — the wire opcode space is small and
/// fixed, so a match keeps the parser table auditable at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Login (0x01).
    Login,
    /// Command response JM01 variant (0x15), no server-flag field.
    CommandResponseJm01,
    /// LBS alarm (0x19).
    LbsAlarm,
    /// Heartbeat (0x13).
    Heartbeat,
    /// Command response (0x21).
    CommandResponse,
    /// GPS location (0x22).
    GpsLocation,
    /// Alarm (0x26).
    Alarm,
    /// Alarm, HVT001 variant (0x27).
    AlarmHvt001,
    /// LBS multi-base extension (0x28).
    LbsMultiBase,
    /// WiFi access point report (0x2C).
    Wifi,
    /// Time calibration request (0x8A).
    TimeCalibration,
    /// Large file transfer chunk (0x8D).
    FileTransfer,
    /// Information transmission (0x94).
    InformationTransmission,
    /// External device data transfer (0x9B).
    ExternalDeviceTransfer,
    /// External module transmission (0x9C).
    ExternalModuleTransmission,
    /// Server-to-device command (0x80). Only ever appears outbound.
    Command,
    /// Anything this server does not have a parser for.
    Unknown(u8),
}

impl Opcode {
    /// Maps a wire byte to an [`Opcode`].
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => Self::Login,
            0x15 => Self::CommandResponseJm01,
            0x19 => Self::LbsAlarm,
            0x13 => Self::Heartbeat,
            0x21 => Self::CommandResponse,
            0x22 => Self::GpsLocation,
            0x26 => Self::Alarm,
            0x27 => Self::AlarmHvt001,
            0x28 => Self::LbsMultiBase,
            0x2C => Self::Wifi,
            0x8A => Self::TimeCalibration,
            0x8D => Self::FileTransfer,
            0x94 => Self::InformationTransmission,
            0x9B => Self::ExternalDeviceTransfer,
            0x9C => Self::ExternalModuleTransmission,
            0x80 => Self::Command,
            other => Self::Unknown(other),
        }
    }

    /// Maps an [`Opcode`] back to its wire byte.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Login => 0x01,
            Self::CommandResponseJm01 => 0x15,
            Self::LbsAlarm => 0x19,
            Self::Heartbeat => 0x13,
            Self::CommandResponse => 0x21,
            Self::GpsLocation => 0x22,
            Self::Alarm => 0x26,
            Self::AlarmHvt001 => 0x27,
            Self::LbsMultiBase => 0x28,
            Self::Wifi => 0x2C,
            Self::TimeCalibration => 0x8A,
            Self::FileTransfer => 0x8D,
            Self::InformationTransmission => 0x94,
            Self::ExternalDeviceTransfer => 0x9B,
            Self::ExternalModuleTransmission => 0x9C,
            Self::Command => 0x80,
            Self::Unknown(byte) => byte,
        }
    }

    /// Whether a well-formed frame of this opcode requires an acknowledgment.
    #[must_use]
    pub fn requires_ack(self) -> bool {
        matches!(
            self,
            Self::Login
                | Self::Heartbeat
                | Self::Alarm
                | Self::AlarmHvt001
                | Self::LbsAlarm
                | Self::Wifi
                | Self::TimeCalibration
                | Self::FileTransfer
                | Self::ExternalDeviceTransfer
                | Self::ExternalModuleTransmission
        )
    }
}
