//! GPS tracker protocol server.
//!
//! Production server implementation using Tokio for the async runtime and
//! plain TCP for the device-facing transport. The Concox V5 wire protocol
//! carries no encryption or multiplexing of its own, so unlike a QUIC-based
//! peer this crate needs only one stream per connection.
//!
//! # Architecture
//!
//! This crate provides production "glue" that wraps [`gps_core`]'s
//! action-based [`ServerDriver`] with real I/O. The driver follows the
//! Sans-IO pattern (see `gps_core` for details): it never touches a socket,
//! so the same orchestration logic runs unmodified under a virtual clock in
//! tests and under [`SystemEnv`] here.
//!
//! # Components
//!
//! - [`ServerDriver`]: action-based orchestrator (pure logic, no I/O)
//! - [`Server`]: production runtime that executes driver actions over TCP
//! - [`TcpTransport`]: plain-TCP transport
//! - [`SystemEnv`]: production environment (real time, crypto RNG, wall clock)
//! - [`control`]: the operator control surface trait and its in-process impl

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod control;
pub mod registry;
pub mod server_error;
mod system_env;
mod transport;

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::SystemTime};

use gps_core::{env::Environment, LogEvent, ServerAction, ServerDriver, ServerEvent};
pub use registry::{SessionDirectory, SessionInfo};
pub use server_error::ServerError;
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::tcp::OwnedWriteHalf,
    sync::{Mutex, RwLock},
};
pub use transport::TcpTransport;

/// How often the driver is ticked to sweep idle sessions and timed-out
/// pending commands.
const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

const READ_BUFFER_SIZE: usize = 4096;

/// Server runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the device-facing listener binds to.
    pub listen_address: SocketAddr,
}

/// Connection bookkeeping shared across every per-connection task and the
/// operator-facing [`DriverCommandSender`].
struct SharedState {
    /// Session id → the half of the socket used to write to it.
    writers: RwLock<HashMap<u64, Mutex<OwnedWriteHalf>>>,
}

/// Production GPS tracker protocol server.
///
/// Wraps [`ServerDriver`] with a plain-TCP transport and system
/// environment.
pub struct Server {
    driver: Arc<Mutex<ServerDriver<SystemEnv>>>,
    directory: Arc<std::sync::Mutex<SessionDirectory>>,
    shared: Arc<SharedState>,
    transport: TcpTransport,
    env: SystemEnv,
}

impl Server {
    /// Creates and binds a new server.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let env = SystemEnv::new();
        let driver = ServerDriver::new(env.clone());
        let transport = TcpTransport::bind(config.listen_address).await?;

        Ok(Self {
            driver: Arc::new(Mutex::new(driver)),
            directory: Arc::new(std::sync::Mutex::new(SessionDirectory::new())),
            shared: Arc::new(SharedState { writers: RwLock::new(HashMap::new()) }),
            transport,
            env,
        })
    }

    /// The session directory backing `list_sessions`/`get_session`.
    #[must_use]
    pub fn directory(&self) -> Arc<std::sync::Mutex<SessionDirectory>> {
        Arc::clone(&self.directory)
    }

    /// A [`control::CommandSender`] that queues commands on this server's
    /// live driver, for building a [`control::RegistryControlSurface`].
    #[must_use]
    pub fn command_sender(&self) -> DriverCommandSender {
        DriverCommandSender { driver: Arc::clone(&self.driver), shared: Arc::clone(&self.shared) }
    }

    /// Local address the device-facing listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Runs the server: accepts connections and processes frames until an
    /// unrecoverable transport error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(address = %self.transport.local_addr()?, "server starting");

        spawn_tick_loop(Arc::clone(&self.driver), Arc::clone(&self.shared), self.env.clone());

        loop {
            match self.transport.accept().await {
                Ok((stream, remote)) => {
                    let driver = Arc::clone(&self.driver);
                    let directory = Arc::clone(&self.directory);
                    let shared = Arc::clone(&self.shared);
                    let env = self.env.clone();

                    tokio::spawn(async move {
                        handle_connection(stream, remote, driver, directory, shared, env).await;
                    });
                },
                Err(err) => tracing::error!(%err, "accept failed"),
            }
        }
    }
}

/// Hands operator `send_command` requests off to the live [`ServerDriver`].
///
/// Implements [`control::CommandSender`], so it plugs directly into
/// [`control::RegistryControlSurface`].
pub struct DriverCommandSender {
    driver: Arc<Mutex<ServerDriver<SystemEnv>>>,
    shared: Arc<SharedState>,
}

impl control::CommandSender for DriverCommandSender {
    fn send(&self, identifier: &str, command: &str) -> bool {
        let driver = Arc::clone(&self.driver);
        let shared = Arc::clone(&self.shared);
        let identifier = identifier.to_string();
        let command = command.to_string();

        // CommandSender::send is synchronous so a deployer's control-surface
        // transport doesn't have to be async; bridge onto the running
        // multi-threaded runtime rather than requiring a nested executor.
        tokio::task::block_in_place(move || {
            tokio::runtime::Handle::current().block_on(async move {
                let mut driver = driver.lock().await;
                let actions = driver.send_command(&identifier, &command);
                let sent = actions.iter().any(|a| matches!(a, ServerAction::SendToSession { .. }));
                execute_actions(actions, &shared, None).await;
                sent
            })
        })
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    remote: SocketAddr,
    driver: Arc<Mutex<ServerDriver<SystemEnv>>>,
    directory: Arc<std::sync::Mutex<SessionDirectory>>,
    shared: Arc<SharedState>,
    env: SystemEnv,
) {
    let session_id = env.random_u64();
    tracing::debug!(session_id, %remote, "connection accepted");

    let (mut read_half, write_half) = stream.into_split();
    shared.writers.write().await.insert(session_id, Mutex::new(write_half));
    directory.lock().unwrap().insert(session_id, remote, SystemTime::now());

    {
        let actions = driver.lock().await.handle_event(ServerEvent::ConnectionAccepted { session_id });
        execute_actions(actions, &shared, Some(&directory)).await;
    }

    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let bytes = buf[..n].to_vec();
                let actions =
                    driver.lock().await.handle_event(ServerEvent::BytesReceived { session_id, bytes });
                execute_actions(actions, &shared, Some(&directory)).await;
            },
            Err(err) => {
                tracing::debug!(session_id, %err, "read error");
                break;
            },
        }
    }

    shared.writers.write().await.remove(&session_id);
    let actions = driver.lock().await.handle_event(ServerEvent::ConnectionClosed { session_id });
    execute_actions(actions, &shared, Some(&directory)).await;
}

fn spawn_tick_loop(driver: Arc<Mutex<ServerDriver<SystemEnv>>>, shared: Arc<SharedState>, env: SystemEnv) {
    tokio::spawn(async move {
        loop {
            env.sleep(TICK_INTERVAL).await;
            let actions = driver.lock().await.handle_event(ServerEvent::Tick);
            execute_actions(actions, &shared, None).await;
        }
    });
}

async fn execute_actions(
    actions: Vec<ServerAction>,
    shared: &SharedState,
    directory: Option<&Arc<std::sync::Mutex<SessionDirectory>>>,
) {
    for action in actions {
        match action {
            ServerAction::SendToSession { session_id, bytes } => {
                let writers = shared.writers.read().await;
                if let Some(writer) = writers.get(&session_id) {
                    let mut writer = writer.lock().await;
                    if let Err(err) = writer.write_all(&bytes).await {
                        tracing::warn!(session_id, %err, "write failed");
                    }
                }
            },
            ServerAction::CloseConnection { session_id } => {
                if let Some(writer) = shared.writers.write().await.remove(&session_id) {
                    let _ = writer.into_inner().shutdown().await;
                }
            },
            ServerAction::Log(event) => {
                if let Some(directory) = directory {
                    directory.lock().unwrap().apply(&event);
                }
                log_event(&event);
            },
        }
    }
}

fn log_event(event: &LogEvent) {
    match event {
        LogEvent::ConnectionOpen { session_id } => tracing::info!(session_id, "connection_open"),
        LogEvent::ConnectionClose { session_id, identifier } => {
            tracing::info!(session_id, ?identifier, "connection_close");
        },
        LogEvent::FrameReceived { session_id, opcode } => {
            tracing::debug!(session_id, opcode, "frame_received");
        },
        LogEvent::Login { session_id, identifier } => {
            tracing::info!(session_id, identifier, "login");
        },
        LogEvent::Heartbeat { session_id, identifier } => {
            tracing::debug!(session_id, ?identifier, "heartbeat");
        },
        LogEvent::GpsLocation { session_id, identifier, odometer_m } => {
            tracing::info!(session_id, ?identifier, ?odometer_m, "gps_location");
        },
        LogEvent::Alarm { session_id, identifier, alarm_code } => {
            tracing::warn!(session_id, ?identifier, alarm_code, "alarm");
        },
        LogEvent::ExternalPowerVoltage { session_id, identifier, voltage } => {
            tracing::info!(session_id, ?identifier, voltage, "external_power_voltage");
        },
        LogEvent::CommandSent { identifier, sequence } => {
            tracing::info!(identifier, sequence, "command_sent");
        },
        LogEvent::CommandResponseMatched { identifier, sequence, latency } => {
            tracing::info!(
                identifier,
                sequence,
                latency_ms = latency.as_millis() as u64,
                "command_response_matched"
            );
        },
        LogEvent::CommandResponseUnmatched { identifier, sequence } => {
            tracing::warn!(identifier, sequence, "command_response_unmatched");
        },
        LogEvent::CommandTimeout { identifier, sequence } => {
            tracing::warn!(identifier, sequence, "command_timeout");
        },
        LogEvent::FrameResync { session_id, skipped } => {
            tracing::info!(session_id, skipped, "frame_resync");
        },
        LogEvent::CrcMismatchWarn { session_id, opcode } => {
            tracing::warn!(session_id, opcode, "crc_mismatch");
        },
        LogEvent::MalformedTerminatorWarn { session_id, opcode } => {
            tracing::warn!(session_id, opcode, "malformed_terminator");
        },
        LogEvent::FrameDropped { session_id, opcode, reason } => {
            tracing::warn!(session_id, opcode, reason, "frame_dropped");
        },
        LogEvent::UnknownOpcode { session_id, opcode } => {
            tracing::info!(session_id, opcode, "unknown_opcode");
        },
        LogEvent::FrameTooLarge { session_id } => {
            tracing::warn!(session_id, "frame_too_large");
        },
    }
}
