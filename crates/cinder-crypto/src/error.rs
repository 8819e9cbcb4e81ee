//! Error types for the key schedule primitives.

use thiserror::Error;

/// Errors from hashing, HMAC and HKDF operations.
///
/// Every variant is fatal to the handshake that produced it. Re-running an
/// authentication check over the same transcript cannot give a different
/// answer, so callers never retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// HKDF-Expand was asked for more than `255 * HashLen` bytes
    #[error("invalid HKDF output length {requested} (max {max})")]
    InvalidOutputLength {
        /// Requested output length
        requested: usize,
        /// Largest length the hash supports
        max: usize,
    },

    /// Pseudorandom key shorter than the hash output
    #[error("invalid pseudorandom key length {actual} (need at least {min})")]
    InvalidPrkLength {
        /// Minimum accepted length
        min: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Label or context does not fit its one-byte length prefix
    #[error("{field} too long for HkdfLabel: {len} bytes")]
    LabelTooLong {
        /// Which field overflowed ("label" or "context")
        field: &'static str,
        /// Its length in bytes
        len: usize,
    },

    /// Received Finished verify_data does not match the transcript
    #[error("finished verify_data mismatch")]
    FinishedMismatch,

    /// Key schedule secret requested from the wrong stage
    #[error("key schedule in {actual} stage, {operation} requires {expected}")]
    InvalidStage {
        /// Stage the operation needs
        expected: &'static str,
        /// Stage the schedule is in
        actual: &'static str,
        /// Operation that was attempted
        operation: &'static str,
    },
}

impl CryptoError {
    /// Returns true if the error is an authentication failure rather than a
    /// misuse of the primitive.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::FinishedMismatch)
    }
}
