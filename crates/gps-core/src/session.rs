//! Per-connection session state machine.
//!
//! Owns the receive buffer, drives the frame codec, and dispatches each
//! decoded frame to its payload parser. Uses the action pattern: methods
//! take time as input and return actions for the driver to execute, so the
//! state machine itself performs no I/O and stays trivially testable.
//!
//! # State machine
//!
//! ```text
//! ┌──────┐   valid login frame   ┌────────────┐   disconnect/timeout   ┌────────┐
//! │ Open │──────────────────────>│ Identified │───────────────────────>│ Closed │
//! └──────┘                       └────────────┘                        └────────┘
//!     │                                                                     ^
//!     └─────────────────────────── disconnect/timeout ────────────────────┘
//! ```

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use gps_proto::{
    frame::{assemble_frame, FrameCodec, FrameOutcome},
    payloads::{self, TelemetryValue},
    Clock,
};

use crate::error::{ConnectionError, MAX_RECEIVE_BUFFER};

/// Idle timeout applied while in [`SessionState::Open`] or
/// [`SessionState::Identified`]; the protocol does not name a value, so
/// this mirrors the heartbeat cadence devices actually use (one heartbeat
/// roughly every 30-60s) with headroom for a couple of missed beats.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);

/// A session's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no successful login yet.
    Open,
    /// A login frame bound a device identifier to this session.
    Identified,
    /// Session is gone; terminal.
    Closed,
}

/// Why a session closed itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// No activity within the idle timeout.
    IdleTimeout,
    /// The frame codec's declared length would overrun the receive buffer
    /// cap.
    FrameTooLarge,
}

/// Actions a session's state machine asks the driver to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Write these bytes to the peer (an acknowledgment frame).
    SendBytes(Vec<u8>),
    /// A structurally valid frame was extracted from the buffer, regardless
    /// of whether its payload parser later accepts it.
    FrameReceived {
        /// The frame's opcode byte.
        opcode: u8,
    },
    /// A frame's terminator bytes were not `0x0D 0x0A`; tolerated per the
    /// protocol's best-effort framing policy, but logged.
    MalformedTerminator {
        /// Opcode of the offending frame.
        opcode: u8,
    },
    /// A frame was successfully decoded into a telemetry value.
    Decoded(TelemetryValue),
    /// A login frame bound this device identifier to the session.
    IdentifierBound(String),
    /// The codec skipped `skipped` bytes of non-frame garbage before
    /// resynchronizing.
    Resynced {
        /// Bytes discarded.
        skipped: usize,
    },
    /// A frame's CRC did not match; it was parsed anyway per the
    /// permissive-inbound policy.
    CrcMismatch {
        /// Opcode of the offending frame.
        opcode: u8,
    },
    /// A structurally valid frame could not be parsed by its payload
    /// parser; it was dropped and the session stays open.
    FrameDropped {
        /// Opcode of the dropped frame.
        opcode: u8,
        /// Why the parser rejected it.
        reason: String,
    },
    /// A frame with an opcode this server has no parser for.
    UnknownOpcode {
        /// The raw opcode byte.
        opcode: u8,
    },
    /// A non-login frame arrived before the session identified itself.
    ReceivedBeforeIdentified {
        /// Opcode of the frame.
        opcode: u8,
    },
    /// The session must be closed.
    Close {
        /// Why.
        reason: CloseReason,
    },
}

/// Per-connection state machine.
///
/// Generic over the instant type so tests can drive it with a virtual
/// clock instead of [`std::time::Instant`].
#[derive(Debug, Clone)]
pub struct Session<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: SessionState,
    identifier: Option<String>,
    buffer: Vec<u8>,
    last_activity: I,
    idle_timeout: Duration,
}

impl<I> Session<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Creates a new session in [`SessionState::Open`].
    #[must_use]
    pub fn new(now: I) -> Self {
        Self {
            state: SessionState::Open,
            identifier: None,
            buffer: Vec::new(),
            last_activity: now,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The bound device identifier, if the session has logged in.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Elapsed time since the last activity, if it exceeds the idle
    /// timeout.
    #[must_use]
    pub fn check_timeout(&self, now: I) -> Option<Duration> {
        let elapsed = now - self.last_activity;
        if self.state != SessionState::Closed && elapsed > self.idle_timeout {
            Some(elapsed)
        } else {
            None
        }
    }

    /// Periodic maintenance: closes the session if it has gone idle.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        if self.check_timeout(now).is_some() {
            self.state = SessionState::Closed;
            return vec![SessionAction::Close { reason: CloseReason::IdleTimeout }];
        }
        Vec::new()
    }

    /// Appends `bytes` to the receive buffer and drains as many complete
    /// frames as are available, dispatching each one.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::FrameTooLarge`] if the buffer would grow
    /// past [`MAX_RECEIVE_BUFFER`] before a complete frame can be
    /// extracted; the caller should close the session on this error.
    pub fn ingest<C: Clock>(
        &mut self,
        bytes: &[u8],
        now: I,
        clock: &C,
    ) -> Result<Vec<SessionAction>, ConnectionError> {
        self.last_activity = now;
        self.buffer.extend_from_slice(bytes);

        if self.buffer.len() > MAX_RECEIVE_BUFFER {
            self.state = SessionState::Closed;
            return Err(ConnectionError::FrameTooLarge {
                needed: self.buffer.len(),
                cap: MAX_RECEIVE_BUFFER,
            });
        }

        let mut actions = Vec::new();
        loop {
            match FrameCodec::next_frame(&self.buffer) {
                FrameOutcome::NeedMoreBytes => break,
                FrameOutcome::Resync { skip } => {
                    self.buffer.drain(..skip);
                    actions.push(SessionAction::Resynced { skipped: skip });
                },
                FrameOutcome::Frame { frame, consumed } => {
                    self.buffer.drain(..consumed);
                    actions.push(SessionAction::FrameReceived { opcode: frame.opcode() });
                    if !frame.terminator_valid() {
                        actions.push(SessionAction::MalformedTerminator { opcode: frame.opcode() });
                    }
                    if !frame.crc_valid() {
                        actions.push(SessionAction::CrcMismatch { opcode: frame.opcode() });
                    }
                    actions.extend(self.dispatch(&frame, clock));
                },
            }
        }
        Ok(actions)
    }

    fn dispatch<C: Clock>(&mut self, frame: &gps_proto::Frame, clock: &C) -> Vec<SessionAction> {
        let opcode = frame.opcode();
        let value = match payloads::parse(frame) {
            Ok(value) => value,
            Err(err) => {
                if matches!(err, gps_proto::ProtocolError::UnknownOpcode(_)) {
                    return vec![SessionAction::UnknownOpcode { opcode }];
                }
                return vec![SessionAction::FrameDropped { opcode, reason: err.to_string() }];
            },
        };

        let mut actions = Vec::new();

        if let TelemetryValue::Login(login) = &value {
            self.identifier = Some(login.identifier.clone());
            self.state = SessionState::Identified;
            actions.push(SessionAction::IdentifierBound(login.identifier.clone()));
        } else if self.state != SessionState::Identified {
            actions.push(SessionAction::ReceivedBeforeIdentified { opcode });
        }

        if let TelemetryValue::TimeCalibrationRequest(request) = &value {
            let body =
                payloads::time_calibration::build_time_calibration_response(clock, request.sequence);
            actions.push(SessionAction::SendBytes(assemble_frame(&body)));
        } else if let Some(ack_body) = payloads::build_ack(&value) {
            actions.push(SessionAction::SendBytes(assemble_frame(&ack_body)));
        }

        actions.push(SessionAction::Decoded(value));
        actions
    }

    /// Marks the session closed, e.g. on TCP disconnect.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}
