//! The Sans-IO server driver: orchestrates sessions, the identifier
//! registry, and per-session pending-command maps without touching a
//! socket. A production host (or a test harness) feeds it [`ServerEvent`]s
//! and executes the [`ServerAction`]s it returns.

use std::{collections::HashMap, time::Duration};

use gps_proto::{
    command::{build_command_frame, CommandLanguage},
    payloads::TelemetryValue,
    Clock,
};

use crate::{
    env::Environment,
    pending::{MatchOutcome, PendingCommands},
    registry::Registry,
    session::{CloseReason, Session, SessionAction},
};

/// Inputs the driver reacts to.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new TCP connection was accepted.
    ConnectionAccepted {
        /// Driver-assigned session id.
        session_id: u64,
    },
    /// Bytes arrived on an existing session.
    BytesReceived {
        /// The session they arrived on.
        session_id: u64,
        /// The raw bytes read from the socket.
        bytes: Vec<u8>,
    },
    /// A session's TCP connection closed.
    ConnectionClosed {
        /// The session that closed.
        session_id: u64,
    },
    /// Periodic maintenance tick: sweeps idle sessions and expired
    /// pending commands.
    Tick,
    /// An operator requested a command be sent to a device.
    SendCommand {
        /// Target device identifier.
        identifier: String,
        /// Literal command text, e.g. `"STATUS#"`.
        command: String,
    },
}

/// A structured log event, one per required name in the external
/// interfaces section plus a few robustness-only events used at info/warn
/// level.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// `connection_open`.
    ConnectionOpen {
        /// The session that opened.
        session_id: u64,
    },
    /// `connection_close`.
    ConnectionClose {
        /// The session that closed.
        session_id: u64,
        /// The device identifier, if the session had logged in.
        identifier: Option<String>,
    },
    /// `frame_received`.
    FrameReceived {
        /// The session the frame arrived on.
        session_id: u64,
        /// The frame's opcode byte.
        opcode: u8,
    },
    /// `login`.
    Login {
        /// The session that logged in.
        session_id: u64,
        /// The device identifier presented at login.
        identifier: String,
    },
    /// `heartbeat`.
    Heartbeat {
        /// The session the heartbeat arrived on.
        session_id: u64,
        /// The device identifier, if the session had logged in.
        identifier: Option<String>,
    },
    /// `gps_location`.
    GpsLocation {
        /// The session the location report arrived on.
        session_id: u64,
        /// The device identifier, if the session had logged in.
        identifier: Option<String>,
        /// The device's reported odometer reading, in metres, if present.
        odometer_m: Option<u32>,
    },
    /// `alarm`.
    Alarm {
        /// The session the alarm arrived on.
        session_id: u64,
        /// The device identifier, if the session had logged in.
        identifier: Option<String>,
        /// The device-reported alarm code.
        alarm_code: u8,
    },
    /// External power voltage report (opcode 0x94, sub-type 0x00); the
    /// closest thing this protocol has to a battery reading in volts.
    ExternalPowerVoltage {
        /// The session the report arrived on.
        session_id: u64,
        /// The device identifier, if the session had logged in.
        identifier: Option<String>,
        /// The reported voltage, in volts.
        voltage: f64,
    },
    /// `command_sent`.
    CommandSent {
        /// The target device identifier.
        identifier: String,
        /// The command's sequence number.
        sequence: u16,
    },
    /// `command_response_matched`.
    CommandResponseMatched {
        /// The target device identifier.
        identifier: String,
        /// The command's sequence number.
        sequence: u16,
        /// Time elapsed between sending the command and matching its response.
        latency: Duration,
    },
    /// `command_response_unmatched`.
    CommandResponseUnmatched {
        /// The target device identifier.
        identifier: String,
        /// The command's sequence number.
        sequence: u16,
    },
    /// `command_timeout`.
    CommandTimeout {
        /// The target device identifier.
        identifier: String,
        /// The command's sequence number.
        sequence: u16,
    },
    /// Non-fatal resync past corrupted bytes; info level per §7.
    FrameResync {
        /// The session that was resynced.
        session_id: u64,
        /// The number of bytes skipped to resync.
        skipped: usize,
    },
    /// Inbound CRC mismatch, tolerated per §7's permissive-inbound policy.
    CrcMismatchWarn {
        /// The session the frame arrived on.
        session_id: u64,
        /// The frame's opcode byte.
        opcode: u8,
    },
    /// A frame's terminator bytes were not `0x0D 0x0A`, tolerated per §7's
    /// best-effort framing policy.
    MalformedTerminatorWarn {
        /// The session the frame arrived on.
        session_id: u64,
        /// The frame's opcode byte.
        opcode: u8,
    },
    /// A structurally valid frame whose payload parser rejected it.
    FrameDropped {
        /// The session the frame arrived on.
        session_id: u64,
        /// The frame's opcode byte.
        opcode: u8,
        /// Why the parser rejected the frame.
        reason: String,
    },
    /// An opcode with no registered parser.
    UnknownOpcode {
        /// The session the frame arrived on.
        session_id: u64,
        /// The frame's opcode byte.
        opcode: u8,
    },
    /// The declared frame length would overrun the per-session buffer cap.
    FrameTooLarge {
        /// The session the frame arrived on.
        session_id: u64,
    },
}

/// Actions the driver asks its host to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerAction {
    /// Write bytes to a session's socket.
    SendToSession {
        /// The target session.
        session_id: u64,
        /// The bytes to write.
        bytes: Vec<u8>,
    },
    /// Close a session's socket.
    CloseConnection {
        /// The session to close.
        session_id: u64,
    },
    /// Emit a structured log event.
    Log(LogEvent),
}

/// Orchestrates every session, the identifier registry, and per-session
/// pending-command maps.
pub struct ServerDriver<E: Environment + Clock> {
    sessions: HashMap<u64, Session<E::Instant>>,
    pending: HashMap<u64, PendingCommands<E::Instant>>,
    registry: Registry,
    env: E,
}

impl<E: Environment + Clock> ServerDriver<E> {
    /// Creates an empty driver bound to `env`.
    #[must_use]
    pub fn new(env: E) -> Self {
        Self { sessions: HashMap::new(), pending: HashMap::new(), registry: Registry::new(), env }
    }

    /// Number of identifiers currently bound to a live session.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Looks up the session id currently serving `identifier`.
    #[must_use]
    pub fn lookup(&self, identifier: &str) -> Option<u64> {
        self.registry.lookup(identifier)
    }

    /// Handles one event, returning the actions the host must execute.
    pub fn handle_event(&mut self, event: ServerEvent) -> Vec<ServerAction> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                let now = self.env.now();
                self.sessions.insert(session_id, Session::new(now));
                self.pending.insert(session_id, PendingCommands::new());
                vec![ServerAction::Log(LogEvent::ConnectionOpen { session_id })]
            },
            ServerEvent::BytesReceived { session_id, bytes } => {
                self.handle_bytes_received(session_id, &bytes)
            },
            ServerEvent::ConnectionClosed { session_id } => self.close_session(session_id),
            ServerEvent::Tick => self.handle_tick(),
            ServerEvent::SendCommand { identifier, command } => {
                self.send_command(&identifier, &command)
            },
        }
    }

    fn handle_bytes_received(&mut self, session_id: u64, bytes: &[u8]) -> Vec<ServerAction> {
        let Some(session) = self.sessions.get_mut(&session_id) else { return Vec::new() };
        let now = self.env.now();

        let session_actions = match session.ingest(bytes, now, &self.env) {
            Ok(actions) => actions,
            Err(_) => {
                let mut out = self.close_session(session_id);
                out.push(ServerAction::Log(LogEvent::FrameTooLarge { session_id }));
                return out;
            },
        };

        let mut actions = Vec::new();
        for action in session_actions {
            match action {
                SessionAction::SendBytes(bytes) => {
                    actions.push(ServerAction::SendToSession { session_id, bytes });
                },
                SessionAction::FrameReceived { opcode } => {
                    actions.push(ServerAction::Log(LogEvent::FrameReceived { session_id, opcode }));
                },
                SessionAction::MalformedTerminator { opcode } => {
                    actions.push(ServerAction::Log(LogEvent::MalformedTerminatorWarn {
                        session_id,
                        opcode,
                    }));
                },
                SessionAction::IdentifierBound(identifier) => {
                    if let Some(previous) = self.registry.register(identifier.clone(), session_id)
                    {
                        if previous != session_id {
                            actions.push(ServerAction::CloseConnection { session_id: previous });
                        }
                    }
                    actions.push(ServerAction::Log(LogEvent::Login { session_id, identifier }));
                },
                SessionAction::Decoded(value) => {
                    actions.extend(self.log_decoded(session_id, &value));
                    if let TelemetryValue::CommandResponse(response) = &value {
                        actions.extend(self.correlate_response(session_id, response, now));
                    }
                },
                SessionAction::Resynced { skipped } => {
                    actions.push(ServerAction::Log(LogEvent::FrameResync { session_id, skipped }));
                },
                SessionAction::CrcMismatch { opcode } => {
                    actions.push(ServerAction::Log(LogEvent::CrcMismatchWarn { session_id, opcode }));
                },
                SessionAction::FrameDropped { opcode, reason } => {
                    actions.push(ServerAction::Log(LogEvent::FrameDropped {
                        session_id,
                        opcode,
                        reason,
                    }));
                },
                SessionAction::UnknownOpcode { opcode } => {
                    actions.push(ServerAction::Log(LogEvent::UnknownOpcode { session_id, opcode }));
                },
                SessionAction::ReceivedBeforeIdentified { .. } => {},
                SessionAction::Close { reason } => {
                    actions.extend(self.close_session(session_id));
                    if reason == CloseReason::FrameTooLarge {
                        actions.push(ServerAction::Log(LogEvent::FrameTooLarge { session_id }));
                    }
                },
            }
        }
        actions
    }

    fn log_decoded(&self, session_id: u64, value: &TelemetryValue) -> Vec<ServerAction> {
        let identifier = self.sessions.get(&session_id).and_then(|s| s.identifier()).map(str::to_string);
        match value {
            TelemetryValue::Heartbeat(_) => {
                vec![ServerAction::Log(LogEvent::Heartbeat { session_id, identifier })]
            },
            TelemetryValue::GpsLocation(location) => {
                vec![ServerAction::Log(LogEvent::GpsLocation {
                    session_id,
                    identifier,
                    odometer_m: location.odometer_m,
                })]
            },
            TelemetryValue::Alarm(alarm) => vec![ServerAction::Log(LogEvent::Alarm {
                session_id,
                identifier,
                alarm_code: alarm.alarm_code,
            })],
            TelemetryValue::InformationTransmission(
                gps_proto::payloads::info_transmission::InformationTransmission::ExternalPowerVoltage(voltage),
            ) => vec![ServerAction::Log(LogEvent::ExternalPowerVoltage {
                session_id,
                identifier,
                voltage: *voltage,
            })],
            _ => Vec::new(),
        }
    }

    fn correlate_response(
        &mut self,
        session_id: u64,
        response: &gps_proto::payloads::command_response::CommandResponse,
        now: E::Instant,
    ) -> Vec<ServerAction> {
        let Some(pending) = self.pending.get_mut(&session_id) else { return Vec::new() };
        let identifier = self
            .sessions
            .get(&session_id)
            .and_then(|s| s.identifier())
            .unwrap_or_default()
            .to_string();

        match pending.match_response(response.sequence, now) {
            MatchOutcome::Matched { latency, .. } => vec![ServerAction::Log(
                LogEvent::CommandResponseMatched { identifier, sequence: response.sequence, latency },
            )],
            MatchOutcome::Unmatched => vec![ServerAction::Log(LogEvent::CommandResponseUnmatched {
                identifier,
                sequence: response.sequence,
            })],
        }
    }

    fn handle_tick(&mut self) -> Vec<ServerAction> {
        let now = self.env.now();
        let mut actions = Vec::new();

        let idle: Vec<u64> = self
            .sessions
            .iter_mut()
            .filter_map(|(id, session)| {
                session.tick(now).into_iter().find_map(|a| match a {
                    SessionAction::Close { .. } => Some(*id),
                    _ => None,
                })
            })
            .collect();
        for session_id in idle {
            actions.extend(self.close_session(session_id));
        }

        for pending in self.pending.values_mut() {
            for (sequence, entry) in pending.sweep_expired(now) {
                actions.push(ServerAction::Log(LogEvent::CommandTimeout {
                    identifier: entry.identifier,
                    sequence,
                }));
            }
        }

        actions
    }

    fn close_session(&mut self, session_id: u64) -> Vec<ServerAction> {
        let identifier = self.sessions.get(&session_id).and_then(|s| s.identifier()).map(str::to_string);
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.close();
        }
        if let Some(identifier) = &identifier {
            self.registry.remove_if_owner(identifier, session_id);
        }
        self.sessions.remove(&session_id);
        self.pending.remove(&session_id);
        vec![
            ServerAction::CloseConnection { session_id },
            ServerAction::Log(LogEvent::ConnectionClose { session_id, identifier }),
        ]
    }

    /// Looks up `identifier`'s session and, if connected, encodes and
    /// queues `command`, recording it in that session's pending map.
    /// Returns no actions if the identifier has no live session (§4.6).
    pub fn send_command(&mut self, identifier: &str, command: &str) -> Vec<ServerAction> {
        let Some(session_id) = self.registry.lookup(identifier) else { return Vec::new() };
        let now = self.env.now();
        let sequence = self.env.random_u16();
        let bytes = build_command_frame(command, 0, CommandLanguage::English, sequence);

        if let Some(pending) = self.pending.get_mut(&session_id) {
            pending.insert(sequence, identifier.to_string(), command.to_string(), now);
        }

        vec![
            ServerAction::SendToSession { session_id, bytes },
            ServerAction::Log(LogEvent::CommandSent { identifier: identifier.to_string(), sequence }),
        ]
    }
}
