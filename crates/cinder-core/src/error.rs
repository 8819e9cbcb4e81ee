//! Error types for the handshake driver.
//!
//! Every error that reaches the driver during processing is fatal: it is
//! funnelled through the error latch and the connection is unusable
//! afterwards. The lifecycle variants are returned directly to callers of
//! [`crate::Driver::get_ekm`] and never latch.

use cinder_crypto::CryptoError;
use thiserror::Error;

/// Coarse classification of a [`DriverError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The state machine rejected an event for the current state.
    ProtocolViolation,
    /// Hash, HMAC or HKDF failure, including a Finished mismatch.
    CryptographicFailure,
    /// The driver was used outside its lifecycle.
    LifecycleMisuse,
    /// The owner or transport aborted the connection.
    Aborted,
}

/// Errors raised by the driver, the state machine or the action visitor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Event is not legal in the current handshake state
    #[error("unexpected {event} in state {state}")]
    UnexpectedEvent {
        /// Event that was rejected
        event: &'static str,
        /// Handshake state when it arrived
        state: String,
    },

    /// Peer sent something malformed or out of order
    #[error("protocol violation: {reason}")]
    ProtocolViolation {
        /// What was wrong
        reason: String,
    },

    /// Cryptographic primitive failure
    #[error("cryptographic failure: {0}")]
    Crypto(#[from] CryptoError),

    /// Connection aborted through `move_to_error_state`
    #[error("connection aborted: {reason}")]
    Aborted {
        /// Reason supplied by the caller
        reason: String,
    },

    /// Too many events queued behind the in-flight batch
    #[error("pending event queue full ({limit} events)")]
    QueueOverflow {
        /// Configured limit
        limit: usize,
    },

    /// Shared state was already mutably borrowed when the driver needed it
    #[error("{what} is already borrowed")]
    StateBusy {
        /// Which shared object was busy
        what: &'static str,
    },

    /// Exporter master secret not derived yet
    #[error("exported keying material requested before handshake completion")]
    ExporterUnavailable,

    /// Driver is in its terminal error state
    #[error("driver is in error state")]
    Closed,
}

impl DriverError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnexpectedEvent { .. } | Self::ProtocolViolation { .. } => {
                ErrorKind::ProtocolViolation
            },
            Self::Crypto(_) => ErrorKind::CryptographicFailure,
            Self::Aborted { .. } => ErrorKind::Aborted,
            Self::QueueOverflow { .. }
            | Self::StateBusy { .. }
            | Self::ExporterUnavailable
            | Self::Closed => ErrorKind::LifecycleMisuse,
        }
    }

    /// Returns true if this error is a failed authentication check, such as
    /// a Finished MAC that does not match the transcript.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Crypto(err) if err.is_authentication_failure())
    }
}
