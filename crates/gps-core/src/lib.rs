//! GPS tracking device protocol core.
//!
//! Sans-IO session state machine and server orchestration for the Concox
//! V5 device protocol. Pure logic only: [`Session`] and [`ServerDriver`]
//! take bytes and time as input and return actions for a production
//! runtime to execute, so both run unmodified under a virtual clock in
//! tests.
//!
//! # Components
//!
//! - [`Session`]: per-connection state machine (framing, login,
//!   ack generation, idle timeout)
//! - [`ServerDriver`]: orchestrates every session plus the identifier
//!   [`Registry`] and per-session [`PendingCommands`] map
//! - [`Environment`]: abstracts time and randomness for deterministic
//!   testing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod driver;
pub mod env;
pub mod error;
pub mod pending;
pub mod registry;
pub mod session;

pub use driver::{LogEvent, ServerAction, ServerDriver, ServerEvent};
pub use env::Environment;
pub use error::ConnectionError;
pub use pending::{MatchOutcome, PendingCommand, PendingCommands};
pub use registry::Registry;
pub use session::{CloseReason, Session, SessionAction, SessionState};
