//! Command response (0x21) and its JM01 variant (0x15). Neither is
//! acknowledged; both feed the pending-command correlation handled by
//! `gps-core`.

use crate::{
    bytes_util::read_u16_be,
    errors::{ProtocolError, Result},
    frame::Frame,
};

/// A parsed command-response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    /// Response text, null bytes and trailing whitespace stripped.
    pub text: String,
    /// Sequence carried by the frame, used to correlate with the
    /// originating command.
    pub sequence: u16,
}

fn strip_response_text(raw: &[u8]) -> String {
    let trimmed_nulls: Vec<u8> = raw.iter().copied().take_while(|&b| b != 0).collect();
    let text = String::from_utf8_lossy(&trimmed_nulls);
    text.trim_end().to_string()
}

/// Parses a 0x21 command-response payload: `server-flag(4) response-length(1|2) response-text`.
pub fn parse_command_response(frame: &Frame) -> Result<CommandResponse> {
    let payload = frame.payload();
    if payload.len() < 5 {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: 5,
            have: payload.len(),
        });
    }

    let length_field_size = if frame.is_long_framed() { 2 } else { 1 };
    let length_offset = 4;
    if payload.len() < length_offset + length_field_size {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: length_offset + length_field_size,
            have: payload.len(),
        });
    }

    let declared_len = if length_field_size == 2 {
        usize::from(read_u16_be(payload, length_offset))
    } else {
        usize::from(payload[length_offset])
    };

    let text_start = length_offset + length_field_size;
    let available = payload.len().saturating_sub(text_start);
    let text_len = declared_len.min(available);

    let text = strip_response_text(&payload[text_start..text_start + text_len]);

    Ok(CommandResponse { text, sequence: frame.sequence() })
}

/// Parses a 0x15 (JM01) command-response payload: like 0x21 but with no
/// server-flag field.
pub fn parse_command_response_jm01(frame: &Frame) -> Result<CommandResponse> {
    let payload = frame.payload();
    if payload.is_empty() {
        return Err(ProtocolError::PayloadTooShort { opcode: frame.opcode(), need: 1, have: 0 });
    }

    let length_field_size = if frame.is_long_framed() { 2 } else { 1 };
    if payload.len() < length_field_size {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: length_field_size,
            have: payload.len(),
        });
    }

    let declared_len = if length_field_size == 2 {
        usize::from(read_u16_be(payload, 0))
    } else {
        usize::from(payload[0])
    };

    let text_start = length_field_size;
    let available = payload.len().saturating_sub(text_start);
    let text_len = declared_len.min(available);

    let text = strip_response_text(&payload[text_start..text_start + text_len]);

    Ok(CommandResponse { text, sequence: frame.sequence() })
}
