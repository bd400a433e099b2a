//! The stateful frame codec.
//!
//! Extracts one complete frame at a time from a growing, possibly
//! fragmented, possibly corrupted byte buffer. CRC verification is left to
//! callers (permissive inbound, strict outbound) per the protocol's error
//! handling policy.

use bytes::Bytes;

use crate::crc::crc_itu;

const SHORT_START: u16 = 0x7878;
const LONG_START: u16 = 0x7979;
const TERMINATOR: [u8; 2] = [0x0D, 0x0A];

/// A single decoded frame, still holding its full raw bytes so parsers can
/// read fields relative to `payload_start` and `len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    raw: Bytes,
    header_size: usize,
    terminator_valid: bool,
}

impl Frame {
    /// The opcode byte, immediately after the header.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.raw[self.header_size]
    }

    /// Offset of the first payload byte, just past the opcode.
    #[must_use]
    pub fn payload_start(&self) -> usize {
        self.header_size + 1
    }

    /// Full raw frame bytes, start marker through terminator inclusive.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Total frame length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the frame is empty (never true for a frame the codec emits).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The 16-bit sequence, read from the last 6 bytes before the terminator.
    #[must_use]
    pub fn sequence(&self) -> u16 {
        let end = self.len();
        u16::from_be_bytes([self.raw[end - 6], self.raw[end - 5]])
    }

    /// The CRC-ITU value carried in the frame.
    #[must_use]
    pub fn carried_crc(&self) -> u16 {
        let end = self.len();
        u16::from_be_bytes([self.raw[end - 4], self.raw[end - 3]])
    }

    /// Offset of the length field (first byte after the start marker).
    #[must_use]
    pub fn length_field_start(&self) -> usize {
        2
    }

    /// Whether this frame used the long (`0x7979`, 2-byte length) framing.
    #[must_use]
    pub fn is_long_framed(&self) -> bool {
        self.header_size == 4
    }

    /// Recomputes the CRC-ITU over `[length_field_start .. sequence_end)`
    /// and compares it against the carried CRC.
    #[must_use]
    pub fn crc_valid(&self) -> bool {
        let end = self.len();
        let crc_region_end = end - 4;
        crc_itu(&self.raw[self.length_field_start()..crc_region_end]) == self.carried_crc()
    }

    /// Bytes between the opcode and the trailing `sequence + crc + terminator`.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let end = self.len() - 6;
        &self.raw[self.payload_start()..end]
    }

    /// Whether the frame's trailing two bytes were the expected `0x0D 0x0A`
    /// terminator. The codec still returns the frame when this is `false`,
    /// per the protocol's best-effort framing policy; callers that need to
    /// log the condition check this separately.
    #[must_use]
    pub fn terminator_valid(&self) -> bool {
        self.terminator_valid
    }
}

/// Outcome of attempting to extract one frame from a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not enough bytes yet; wait for more.
    NeedMoreBytes,
    /// Leading bytes are not a plausible frame start; skip forward.
    ///
    /// `skip` bytes should be dropped from the front of the buffer before
    /// retrying. A `skip` equal to the buffer length means no plausible
    /// start byte was found anywhere in the buffer.
    Resync {
        /// Number of bytes to discard from the front of the buffer.
        skip: usize,
    },
    /// A complete frame was extracted.
    Frame {
        /// The decoded frame.
        frame: Frame,
        /// Number of bytes consumed from the front of the buffer.
        consumed: usize,
    },
}

/// Stateless frame extractor: all state lives in the caller's buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl FrameCodec {
    /// Attempts to extract one frame from the front of `buffer`.
    #[must_use]
    pub fn next_frame(buffer: &[u8]) -> FrameOutcome {
        if buffer.len() < 5 {
            return FrameOutcome::NeedMoreBytes;
        }

        let start = u16::from_be_bytes([buffer[0], buffer[1]]);

        let (header_size, declared_length) = match start {
            SHORT_START => (3, usize::from(buffer[2])),
            LONG_START => {
                if buffer.len() < 6 {
                    return FrameOutcome::NeedMoreBytes;
                }
                (4, usize::from(u16::from_be_bytes([buffer[2], buffer[3]])))
            },
            _ => {
                return match buffer[1..].iter().position(|&b| b == 0x78 || b == 0x79) {
                    Some(offset) => FrameOutcome::Resync { skip: offset + 1 },
                    None => FrameOutcome::Resync { skip: buffer.len() },
                };
            },
        };

        let total_size = header_size + declared_length + 2;

        if buffer.len() < total_size {
            return FrameOutcome::NeedMoreBytes;
        }

        let terminator_valid =
            buffer[total_size - 2] == TERMINATOR[0] && buffer[total_size - 1] == TERMINATOR[1];

        let frame = Frame {
            raw: Bytes::copy_from_slice(&buffer[..total_size]),
            header_size,
            terminator_valid,
        };

        FrameOutcome::Frame { frame, consumed: total_size }
    }
}

/// Assembles an outbound packet using the long (`0x7979`, 2-byte length)
/// framing unconditionally, regardless of `body`'s size. File-transfer acks
/// must always use long framing even though their bodies are short.
#[must_use]
pub fn assemble_long_frame(body: &[u8]) -> Vec<u8> {
    let length = (body.len() + 2) as u16;
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(&LONG_START.to_be_bytes());
    out.extend_from_slice(&length.to_be_bytes());

    let length_field_start = out.len() - 2;
    out.extend_from_slice(body);
    let crc = crc_itu(&out[length_field_start..]);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&TERMINATOR);
    out
}

/// Assembles a short- or long-framed outbound packet: start marker, length,
/// `body` (opcode through sequence), a freshly computed CRC, and terminator.
///
/// `body` must start with the opcode byte and end with the two sequence
/// bytes; the CRC is computed over the length field through the end of
/// `body`.
#[must_use]
pub fn assemble_frame(body: &[u8]) -> Vec<u8> {
    let use_long = body.len() + 2 >= 256;
    let mut out = Vec::with_capacity(body.len() + 8);

    if use_long {
        let length = (body.len() + 2) as u16;
        out.extend_from_slice(&LONG_START.to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
    } else {
        let length = (body.len() + 2) as u8;
        out.extend_from_slice(&SHORT_START.to_be_bytes());
        out.push(length);
    }

    let length_field_start = out.len() - if use_long { 2 } else { 1 };
    out.extend_from_slice(body);
    let crc = crc_itu(&out[length_field_start..]);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&TERMINATOR);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const S1_LOGIN: [u8; 22] = [
        0x78, 0x78, 0x11, 0x01, 0x03, 0x55, 0x17, 0x21, 0x07, 0x46, 0x10, 0x53, 0x00, 0x36, 0x00,
        0x01, 0x00, 0x01, 0xE0, 0xD1, 0x0D, 0x0A,
    ];

    #[test]
    fn decodes_s1_login_frame() {
        match FrameCodec::next_frame(&S1_LOGIN) {
            FrameOutcome::Frame { frame, consumed } => {
                assert_eq!(consumed, S1_LOGIN.len());
                assert_eq!(frame.opcode(), 0x01);
                assert_eq!(frame.sequence(), 0x0001);
            },
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn need_more_bytes_on_short_buffer() {
        assert_eq!(FrameCodec::next_frame(&S1_LOGIN[..10]), FrameOutcome::NeedMoreBytes);
    }

    #[test]
    fn fragmented_delivery_yields_one_frame() {
        // S4: present the S1 bytes in chunks of 7, 6, rest.
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&S1_LOGIN[..7]);
        assert_eq!(FrameCodec::next_frame(&buffer), FrameOutcome::NeedMoreBytes);

        buffer.extend_from_slice(&S1_LOGIN[7..13]);
        assert_eq!(FrameCodec::next_frame(&buffer), FrameOutcome::NeedMoreBytes);

        buffer.extend_from_slice(&S1_LOGIN[13..]);
        match FrameCodec::next_frame(&buffer) {
            FrameOutcome::Frame { consumed, .. } => assert_eq!(consumed, buffer.len()),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn resyncs_past_garbage_prefix() {
        let mut buffer = vec![0xFF, 0xAB];
        buffer.extend_from_slice(&S1_LOGIN);
        match FrameCodec::next_frame(&buffer) {
            FrameOutcome::Resync { skip } => assert_eq!(skip, 2),
            other => panic!("expected resync, got {other:?}"),
        }
    }

    #[test]
    fn resyncs_entire_buffer_when_no_start_found() {
        let buffer = [0xFF, 0xAB, 0xCD, 0xEE];
        match FrameCodec::next_frame(&buffer) {
            FrameOutcome::Resync { skip } => assert_eq!(skip, buffer.len()),
            other => panic!("expected resync, got {other:?}"),
        }
    }

    #[test]
    fn long_frame_round_trips_through_codec() {
        let body_tail = [0x12, 0x34];
        let mut body = vec![0x80u8];
        body.extend(std::iter::repeat_n(0x41u8, 260));
        body.extend_from_slice(&body_tail);
        let bytes = assemble_frame(&body);
        match FrameCodec::next_frame(&bytes) {
            FrameOutcome::Frame { frame, consumed } => {
                assert_eq!(consumed, bytes.len());
                assert_eq!(frame.opcode(), 0x80);
                assert!(frame.crc_valid());
            },
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn short_ack_frame_crc_is_valid() {
        let body = [0x05u8, 0x01, 0x00, 0x01];
        let bytes = assemble_frame(&body);
        match FrameCodec::next_frame(&bytes) {
            FrameOutcome::Frame { frame, .. } => assert!(frame.crc_valid()),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn malformed_terminator_is_tolerated_but_flagged() {
        let mut buffer = S1_LOGIN;
        let len = buffer.len();
        buffer[len - 2] = 0xFF;
        match FrameCodec::next_frame(&buffer) {
            FrameOutcome::Frame { frame, consumed } => {
                assert_eq!(consumed, buffer.len());
                assert!(!frame.terminator_valid());
            },
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn well_formed_terminator_is_valid() {
        match FrameCodec::next_frame(&S1_LOGIN) {
            FrameOutcome::Frame { frame, .. } => assert!(frame.terminator_valid()),
            other => panic!("expected a frame, got {other:?}"),
        }
    }
}
