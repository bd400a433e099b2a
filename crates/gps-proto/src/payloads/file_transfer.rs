//! File transfer chunk (0x8D), always long-framed. Used for photo/black-box
//! uploads split across many frames; the server acknowledges each chunk.

use md5::{Digest, Md5};

use crate::{
    bytes_util::{read_u16_be, read_u32_be},
    crc::crc_itu,
    errors::{ProtocolError, Result},
    frame::{assemble_long_frame, Frame},
};

/// File types 0x00 (start) and 0x02 (end) tag each chunk with the device's
/// current date-time; file type 0x01 (body) tags it with a plain serial
/// counter instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagBit {
    /// 6-byte date-time: year-offset, month, day, hour, minute, second.
    DateTime([u8; 6]),
    /// Plain serial counter.
    Serial(u16),
}

/// How a chunk's integrity is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrCheck {
    /// 2-byte CRC-ITU over `content`.
    Crc(u16),
    /// 16-byte MD5 digest over `content`.
    Md5([u8; 16]),
}

/// One chunk of a file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferChunk {
    /// Device-assigned file type code.
    pub file_type: u8,
    /// Total file length in bytes, as declared by the device.
    pub file_length: u32,
    /// The chunk's declared integrity check.
    pub err_check: ErrCheck,
    /// Byte offset of `content` within the full file.
    pub start_position: u32,
    /// Chunk payload bytes.
    pub content: Vec<u8>,
    /// Trailing flag bit, width and meaning depending on `file_type`.
    pub flag_bit: FlagBit,
    /// Sequence carried by the frame.
    pub sequence: u16,
}

impl FileTransferChunk {
    /// Whether this chunk completes the file (its end reaches or passes the
    /// declared total length).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        u64::from(self.start_position) + self.content.len() as u64 >= u64::from(self.file_length)
    }

    /// Whether the chunk's content matches its declared integrity check.
    #[must_use]
    pub fn integrity_ok(&self) -> bool {
        match self.err_check {
            ErrCheck::Crc(expected) => crc_itu(&self.content) == expected,
            ErrCheck::Md5(expected) => {
                let mut hasher = Md5::new();
                hasher.update(&self.content);
                let digest: [u8; 16] = hasher.finalize().into();
                digest == expected
            },
        }
    }
}

/// Parses a file-transfer chunk payload:
/// `file-type(1) file-length(4) err-check-type(1) err-check(2|16)
/// start-position(4) current-chunk-length(2) content(n) flag-bit(6|2)`.
///
/// `flag-bit` is 6 bytes of date-time for file-types 0x00 (start) and 0x02
/// (end), or a 2-byte serial counter for file-type 0x01 (body).
pub fn parse_file_transfer_chunk(frame: &Frame) -> Result<FileTransferChunk> {
    let payload = frame.payload();
    const HEADER_LEN: usize = 1 + 4 + 1;
    if payload.len() < HEADER_LEN {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: HEADER_LEN,
            have: payload.len(),
        });
    }

    let file_type = payload[0];
    let file_length = read_u32_be(payload, 1);
    let err_check_type = payload[5];
    let err_check_len = if err_check_type == 0 { 2 } else { 16 };

    let mut cursor = 6;
    if payload.len() < cursor + err_check_len + 8 {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: cursor + err_check_len + 8,
            have: payload.len(),
        });
    }

    let err_check = if err_check_type == 0 {
        ErrCheck::Crc(read_u16_be(payload, cursor))
    } else {
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&payload[cursor..cursor + 16]);
        ErrCheck::Md5(digest)
    };
    cursor += err_check_len;

    let start_position = read_u32_be(payload, cursor);
    cursor += 4;
    let current_chunk_length = usize::from(read_u16_be(payload, cursor));
    cursor += 2;

    let flag_bit_len = if file_type == 0x01 { 2 } else { 6 };
    if payload.len() < cursor + current_chunk_length + flag_bit_len {
        return Err(ProtocolError::PayloadTooShort {
            opcode: frame.opcode(),
            need: cursor + current_chunk_length + flag_bit_len,
            have: payload.len(),
        });
    }
    let content = payload[cursor..cursor + current_chunk_length].to_vec();
    cursor += current_chunk_length;

    let flag_bit = if file_type == 0x01 {
        FlagBit::Serial(read_u16_be(payload, cursor))
    } else {
        let mut date_time = [0u8; 6];
        date_time.copy_from_slice(&payload[cursor..cursor + 6]);
        FlagBit::DateTime(date_time)
    };

    Ok(FileTransferChunk {
        file_type,
        file_length,
        err_check,
        start_position,
        content,
        flag_bit,
        sequence: frame.sequence(),
    })
}

/// Builds the long-framed file-transfer-chunk ack: `8D 01 seq_hi seq_lo`
/// wrapped with `0x7979` framing, a freshly computed CRC, and terminator.
#[must_use]
pub fn build_file_transfer_ack(sequence: u16) -> Vec<u8> {
    let mut body = vec![0x8D, 0x01];
    body.extend_from_slice(&sequence.to_be_bytes());
    assemble_long_frame(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{assemble_long_frame as assemble, FrameCodec, FrameOutcome};

    fn decode(bytes: &[u8]) -> Frame {
        match FrameCodec::next_frame(bytes) {
            FrameOutcome::Frame { frame, .. } => frame,
            other => panic!("expected frame, got {other:?}"),
        }
    }

    /// `file_type` 0x00 or 0x02 (date-time flag bit).
    fn chunk_frame(content: &[u8], start: u32, file_length: u32) -> Frame {
        let crc = crc_itu(content);
        let mut payload = vec![0x00u8]; // file_type: start
        payload.extend_from_slice(&file_length.to_be_bytes());
        payload.push(0x00); // err_check_type = crc
        payload.extend_from_slice(&crc.to_be_bytes());
        payload.extend_from_slice(&start.to_be_bytes());
        payload.extend_from_slice(&(content.len() as u16).to_be_bytes());
        payload.extend_from_slice(content);
        payload.extend_from_slice(&[0x1A, 0x02, 0x09, 0x06, 0x11, 0x14]); // date-time flag bit

        let mut body = vec![0x8Du8];
        body.extend_from_slice(&payload);
        body.extend_from_slice(&0x0003u16.to_be_bytes());
        let bytes = assemble(&body);
        decode(&bytes)
    }

    #[test]
    fn crc_checked_chunk_round_trips() {
        let content = b"hello chunk";
        let frame = chunk_frame(content, 0, 100);
        let chunk = parse_file_transfer_chunk(&frame).unwrap();
        assert_eq!(chunk.content, content);
        assert!(chunk.integrity_ok());
        assert!(!chunk.is_complete());
        assert_eq!(chunk.flag_bit, FlagBit::DateTime([0x1A, 0x02, 0x09, 0x06, 0x11, 0x14]));
    }

    #[test]
    fn final_chunk_reaching_file_length_is_complete() {
        let content = vec![0xAAu8; 10];
        let frame = chunk_frame(&content, 90, 100);
        let chunk = parse_file_transfer_chunk(&frame).unwrap();
        assert!(chunk.is_complete());
    }

    #[test]
    fn md5_checked_chunk_detects_corruption() {
        let content = b"file bytes";
        let mut hasher = Md5::new();
        hasher.update(content);
        let digest: [u8; 16] = hasher.finalize().into();

        let mut payload = vec![0x01u8]; // file_type: body (serial flag bit)
        payload.extend_from_slice(&50u32.to_be_bytes());
        payload.push(0x01); // err_check_type = md5
        payload.extend_from_slice(&digest);
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&(content.len() as u16).to_be_bytes());
        payload.extend_from_slice(b"corrupted!"); // wrong content, same length
        payload.extend_from_slice(&0x0007u16.to_be_bytes()); // serial flag bit

        let mut body = vec![0x8Du8];
        body.extend_from_slice(&payload);
        body.extend_from_slice(&0x0004u16.to_be_bytes());
        let bytes = assemble(&body);
        let frame = decode(&bytes);
        let chunk = parse_file_transfer_chunk(&frame).unwrap();
        assert!(!chunk.integrity_ok());
        assert_eq!(chunk.flag_bit, FlagBit::Serial(0x0007));
    }

    #[test]
    fn ack_is_always_long_framed() {
        let ack = build_file_transfer_ack(0x0003);
        assert_eq!(&ack[..2], &[0x79, 0x79]);
        assert_eq!(&ack[2..4], &[0x00, 0x06]);
    }
}
