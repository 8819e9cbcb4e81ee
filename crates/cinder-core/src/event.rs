//! Events fed to the state machine.
//!
//! Application-originated events are [`PendingEvent`]s: they may wait in the
//! driver's queue while another batch is in flight. [`Event`] is what the
//! state machine actually receives, which adds access to the transport read
//! buffer.

use crate::transport::TransportReadBuffer;

/// Application data to encrypt and send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppWrite {
    /// Plaintext application data.
    pub data: Vec<u8>,
}

/// 0-RTT application data to send before the handshake completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarlyAppWrite {
    /// Plaintext application data.
    pub data: Vec<u8>,
}

/// Application request to close the connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppClose;

/// Server request to issue a NewSessionTicket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteNewSessionTicket {
    /// Opaque application state bound into the ticket.
    pub app_token: Vec<u8>,
}

/// Application-originated event, queued in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingEvent {
    /// See [`AppWrite`].
    AppWrite(AppWrite),
    /// See [`EarlyAppWrite`].
    EarlyAppWrite(EarlyAppWrite),
    /// See [`AppClose`].
    AppClose(AppClose),
    /// See [`WriteNewSessionTicket`].
    WriteNewSessionTicket(WriteNewSessionTicket),
}

impl PendingEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AppWrite(_) => "app_write",
            Self::EarlyAppWrite(_) => "early_app_write",
            Self::AppClose(_) => "app_close",
            Self::WriteNewSessionTicket(_) => "write_new_session_ticket",
        }
    }
}

/// Input to one [`crate::StateMachine::process`] call.
#[derive(Debug)]
pub enum Event<'a> {
    /// Bytes are available in the transport read buffer. The state machine
    /// consumes what it can from the front.
    TransportData(&'a mut TransportReadBuffer),
    /// See [`AppWrite`].
    AppWrite(AppWrite),
    /// See [`EarlyAppWrite`].
    EarlyAppWrite(EarlyAppWrite),
    /// See [`AppClose`].
    AppClose(AppClose),
    /// See [`WriteNewSessionTicket`].
    WriteNewSessionTicket(WriteNewSessionTicket),
}

impl Event<'_> {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TransportData(_) => "transport_data",
            Self::AppWrite(_) => "app_write",
            Self::EarlyAppWrite(_) => "early_app_write",
            Self::AppClose(_) => "app_close",
            Self::WriteNewSessionTicket(_) => "write_new_session_ticket",
        }
    }
}

impl From<PendingEvent> for Event<'_> {
    fn from(event: PendingEvent) -> Self {
        match event {
            PendingEvent::AppWrite(write) => Self::AppWrite(write),
            PendingEvent::EarlyAppWrite(write) => Self::EarlyAppWrite(write),
            PendingEvent::AppClose(close) => Self::AppClose(close),
            PendingEvent::WriteNewSessionTicket(ticket) => Self::WriteNewSessionTicket(ticket),
        }
    }
}
