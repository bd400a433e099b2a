//! Operator control surface.
//!
//! §1 places the HTTP control surface out of scope as an external
//! collaborator; this module defines the interface a deployer wires
//! whatever transport they like on top of, plus one in-process
//! implementation backed directly by the running server's session
//! directory and device registry. No HTTP/gRPC listener lives here.

use std::time::Instant;

use crate::registry::SessionInfo;

/// Aggregate server statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerStats {
    /// Number of devices currently logged in.
    pub session_count: usize,
    /// The device-facing TCP port.
    pub listen_port: u16,
    /// How long the server has been running.
    pub uptime_seconds: u64,
}

/// Outcome of a `send_command` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendCommandOutcome {
    /// The command was encoded and queued to the device's connection.
    Accepted,
    /// No device with that identifier is currently connected.
    NotConnected,
}

/// The operations an operator-facing surface exposes over the running
/// server, independent of whatever transport (HTTP, gRPC, a CLI) carries
/// them.
pub trait ControlSurface {
    /// Lists every currently tracked device session.
    fn list_sessions(&self) -> Vec<SessionInfo>;

    /// Looks up a single device session by identifier.
    fn get_session(&self, identifier: &str) -> Option<SessionInfo>;

    /// Sends a literal command string to a device.
    fn send_command(&self, identifier: &str, text: &str) -> SendCommandOutcome;

    /// Cuts the vehicle's relay output (`RELAY,1#`), immobilizing it.
    fn immobilize(&self, identifier: &str) -> SendCommandOutcome {
        self.send_command(identifier, "RELAY,1#")
    }

    /// Restores the vehicle's relay output (`RELAY,0#`).
    fn mobilize(&self, identifier: &str) -> SendCommandOutcome {
        self.send_command(identifier, "RELAY,0#")
    }

    /// Requests a status report.
    fn request_status(&self, identifier: &str) -> SendCommandOutcome {
        self.send_command(identifier, "STATUS#")
    }

    /// Requests an immediate location fix.
    fn request_location(&self, identifier: &str) -> SendCommandOutcome {
        self.send_command(identifier, "WHERE#")
    }

    /// Requests battery parameters, falling back to the generic parameter
    /// dump on devices that do not support `BATPARAM`.
    fn request_battery(&self, identifier: &str) -> SendCommandOutcome {
        match self.send_command(identifier, "BATPARAM,0#") {
            SendCommandOutcome::NotConnected => self.send_command(identifier, "PARAM#"),
            outcome => outcome,
        }
    }

    /// Configures how often the device reports battery voltage, in minutes.
    fn configure_battery_reporting(&self, identifier: &str, minutes: u32) -> SendCommandOutcome {
        self.send_command(identifier, &format!("BATINTERVAL,{minutes}#"))
    }

    /// Aggregate statistics about the running server.
    fn stats(&self) -> ServerStats;
}

/// In-process [`ControlSurface`] backed by the live device registry and
/// session directory.
pub struct RegistryControlSurface<S> {
    sender: S,
    directory: std::sync::Arc<std::sync::Mutex<crate::registry::SessionDirectory>>,
    listen_port: u16,
    started_at: Instant,
}

/// What `RegistryControlSurface` needs from the running driver: a way to
/// hand a command off for encoding and delivery, and a way to check
/// whether a device is currently connected.
pub trait CommandSender {
    /// Queues `command` for `identifier`. Returns `false` if no session is
    /// currently bound to that identifier.
    fn send(&self, identifier: &str, command: &str) -> bool;
}

impl<S: CommandSender> RegistryControlSurface<S> {
    /// Builds a control surface over `sender` and `directory`.
    pub fn new(
        sender: S,
        directory: std::sync::Arc<std::sync::Mutex<crate::registry::SessionDirectory>>,
        listen_port: u16,
    ) -> Self {
        Self { sender, directory, listen_port, started_at: Instant::now() }
    }
}

impl<S: CommandSender> ControlSurface for RegistryControlSurface<S> {
    fn list_sessions(&self) -> Vec<SessionInfo> {
        self.directory.lock().unwrap().all().cloned().collect()
    }

    fn get_session(&self, identifier: &str) -> Option<SessionInfo> {
        self.directory.lock().unwrap().by_identifier(identifier).cloned()
    }

    fn send_command(&self, identifier: &str, text: &str) -> SendCommandOutcome {
        if self.sender.send(identifier, text) {
            SendCommandOutcome::Accepted
        } else {
            SendCommandOutcome::NotConnected
        }
    }

    fn stats(&self) -> ServerStats {
        ServerStats {
            session_count: self.directory.lock().unwrap().len(),
            listen_port: self.listen_port,
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::SocketAddr,
        sync::{Arc, Mutex},
        time::SystemTime,
    };

    use super::*;
    use crate::registry::SessionDirectory;

    struct FakeSender {
        known: Vec<&'static str>,
    }

    impl CommandSender for FakeSender {
        fn send(&self, identifier: &str, _command: &str) -> bool {
            self.known.contains(&identifier)
        }
    }

    fn directory_with_one_session() -> Arc<Mutex<SessionDirectory>> {
        let mut dir = SessionDirectory::new();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        dir.insert(1, addr, SystemTime::now());
        dir.apply(&gps_core::LogEvent::Login { session_id: 1, identifier: "355172107461053".to_string() });
        Arc::new(Mutex::new(dir))
    }

    #[test]
    fn send_command_to_connected_device_is_accepted() {
        let surface = RegistryControlSurface::new(
            FakeSender { known: vec!["355172107461053"] },
            directory_with_one_session(),
            5027,
        );
        assert_eq!(surface.send_command("355172107461053", "STATUS#"), SendCommandOutcome::Accepted);
    }

    #[test]
    fn send_command_to_unknown_device_is_not_connected() {
        let surface =
            RegistryControlSurface::new(FakeSender { known: vec![] }, directory_with_one_session(), 5027);
        assert_eq!(surface.send_command("000000000000000", "STATUS#"), SendCommandOutcome::NotConnected);
    }

    #[test]
    fn immobilize_sends_relay_cut() {
        let surface = RegistryControlSurface::new(
            FakeSender { known: vec!["355172107461053"] },
            directory_with_one_session(),
            5027,
        );
        assert_eq!(surface.immobilize("355172107461053"), SendCommandOutcome::Accepted);
    }

    #[test]
    fn request_battery_falls_back_to_param() {
        struct OnlyParam;
        impl CommandSender for OnlyParam {
            fn send(&self, _identifier: &str, command: &str) -> bool {
                command == "PARAM#"
            }
        }
        let surface = RegistryControlSurface::new(OnlyParam, directory_with_one_session(), 5027);
        assert_eq!(surface.request_battery("355172107461053"), SendCommandOutcome::Accepted);
    }

    #[test]
    fn list_sessions_reflects_directory() {
        let surface = RegistryControlSurface::new(
            FakeSender { known: vec!["355172107461053"] },
            directory_with_one_session(),
            5027,
        );
        let sessions = surface.list_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].identifier.as_deref(), Some("355172107461053"));
    }

    #[test]
    fn stats_reports_listen_port_and_session_count() {
        let surface = RegistryControlSurface::new(
            FakeSender { known: vec!["355172107461053"] },
            directory_with_one_session(),
            5027,
        );
        let stats = surface.stats();
        assert_eq!(stats.listen_port, 5027);
        assert_eq!(stats.session_count, 1);
    }
}
