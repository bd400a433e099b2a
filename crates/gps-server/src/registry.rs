//! Session directory for the operator control surface.
//!
//! The directory tracks the metadata a [`crate::control::ControlSurface`]
//! needs to answer `list_sessions`/`get_session`: remote address, connect
//! time, and the latest observed battery voltage and odometer reading. It
//! is kept current by feeding it the [`gps_core::LogEvent`]s the driver
//! already emits, rather than duplicating the identifier → session mapping
//! `gps_core::Registry` already owns.

use std::{collections::HashMap, net::SocketAddr, time::SystemTime};

use gps_core::LogEvent;

/// Snapshot of a tracked device session, returned to operators.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    /// Device identifier (IMEI), once logged in. `None` before login.
    pub identifier: Option<String>,
    /// Remote socket address of the TCP connection.
    pub remote: SocketAddr,
    /// Wall-clock time the connection was accepted.
    pub connected_at: SystemTime,
    /// Last reported external power voltage, if any has arrived.
    pub last_battery_v: Option<f64>,
    /// Last reported odometer reading in meters, if any has arrived.
    pub last_odometer_m: Option<u32>,
}

/// Tracks per-connection metadata for the operator control surface.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: HashMap<u64, SessionInfo>,
    identifiers: HashMap<String, u64>,
}

impl SessionDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly accepted connection, before login.
    pub fn insert(&mut self, session_id: u64, remote: SocketAddr, connected_at: SystemTime) {
        self.sessions.insert(
            session_id,
            SessionInfo { identifier: None, remote, connected_at, last_battery_v: None, last_odometer_m: None },
        );
    }

    /// Removes a connection's metadata and returns it.
    pub fn remove(&mut self, session_id: u64) -> Option<SessionInfo> {
        let info = self.sessions.remove(&session_id)?;
        if let Some(identifier) = &info.identifier {
            self.identifiers.remove(identifier);
        }
        Some(info)
    }

    /// Applies a driver log event, updating tracked metadata.
    ///
    /// Ignores events for sessions the directory has not seen (it is
    /// fed the full log stream, most of which carries no new metadata).
    pub fn apply(&mut self, event: &LogEvent) {
        match event {
            LogEvent::Login { session_id, identifier } => {
                if let Some(info) = self.sessions.get_mut(session_id) {
                    info.identifier = Some(identifier.clone());
                    self.identifiers.insert(identifier.clone(), *session_id);
                }
            },
            LogEvent::ExternalPowerVoltage { session_id, voltage, .. } => {
                if let Some(info) = self.sessions.get_mut(session_id) {
                    info.last_battery_v = Some(*voltage);
                }
            },
            LogEvent::GpsLocation { session_id, odometer_m: Some(odometer_m), .. } => {
                if let Some(info) = self.sessions.get_mut(session_id) {
                    info.last_odometer_m = Some(*odometer_m);
                }
            },
            LogEvent::ConnectionClose { session_id, .. } => {
                self.remove(*session_id);
            },
            _ => {},
        }
    }

    /// Looks up a session by device identifier.
    #[must_use]
    pub fn by_identifier(&self, identifier: &str) -> Option<&SessionInfo> {
        let session_id = self.identifiers.get(identifier)?;
        self.sessions.get(session_id)
    }

    /// All tracked sessions, most-recent-session-id first.
    pub fn all(&self) -> impl Iterator<Item = &SessionInfo> + '_ {
        self.sessions.values()
    }

    /// Total tracked session count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the directory has no tracked sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
