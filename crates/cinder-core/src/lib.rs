//! Cinder core: the asynchronous TLS 1.3 handshake driver.
//!
//! The driver sits between a connection and a pluggable protocol state
//! machine. It serializes application events and transport notifications
//! into one FIFO, feeds them to the machine one at a time, and dispatches the
//! resulting actions to a visitor. It never re-enters the machine, latches
//! the first fatal error, and keeps the owning connection alive while actions
//! run.
//!
//! # Modules
//!
//! - [`driver`]: the driver, its configuration and the visitor context
//! - [`machine`]: traits the protocol logic and action sink implement
//! - [`event`]: events fed to the state machine
//! - [`lifetime`]: deferred teardown of the owner
//! - [`transport`]: the shared transport read buffer

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod driver;
mod error;
pub mod event;
pub mod lifetime;
pub mod machine;
pub mod transport;

pub use driver::{DEFAULT_MAX_PENDING_EVENTS, Driver, DriverConfig, DriverContext, DriverPhase};
pub use error::{DriverError, ErrorKind};
pub use event::{
    AppClose, AppWrite, EarlyAppWrite, Event, PendingEvent, WriteNewSessionTicket,
};
pub use lifetime::{DelayedDestruction, DestructorGuard, TeardownOutcome};
pub use machine::{ActionVisitor, HandshakeState, Processed, StateMachine};
pub use transport::{SharedReadBuffer, TransportReadBuffer};
