//! Handshake transcript hashing (RFC 8446 §4.4.1).
//!
//! The transcript is the running digest over every handshake message sent or
//! received, in order. Reading the current digest clones the hasher before
//! finalizing, so the accumulator keeps accepting messages afterwards.

use std::fmt;

use sha2::Digest;
use zeroize::Zeroizing;

use crate::{
    error::CryptoError,
    hash::{HashAlgorithm, HashFunction, Sha256, Sha384},
    key_derivation::hkdf_expand_label,
};

/// Label for the Finished key.
const FINISHED_LABEL: &str = "finished";

/// Transcript operations for a hash chosen at runtime.
pub trait HandshakeContext: Send + Sync {
    /// Hash the transcript is computed with.
    fn hash_algorithm(&self) -> HashAlgorithm;

    /// Append one encoded handshake message.
    fn append_to_transcript(&mut self, data: &[u8]);

    /// Digest of everything appended so far. Does not finalize the
    /// accumulator.
    fn handshake_context(&self) -> Vec<u8>;

    /// Finished `verify_data` for the current transcript:
    /// `HMAC(HKDF-Expand-Label(base_key, "finished", "", HashLen), digest)`.
    fn finished_data(&self, base_key: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Check a peer's Finished `verify_data` in constant time.
    fn verify_finished(&self, base_key: &[u8], verify_data: &[u8]) -> Result<(), CryptoError>;

    /// Boxed copy of this transcript, sharing no state with it.
    fn clone_box(&self) -> Box<dyn HandshakeContext>;
}

/// Running transcript hash for a statically known hash function.
pub struct Transcript<H: HashFunction> {
    hasher: H::Hasher,
}

impl<H: HashFunction> Transcript<H> {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self { hasher: <H::Hasher as Digest>::new() }
    }

    fn finished_key(base_key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        hkdf_expand_label::<H>(base_key, FINISHED_LABEL, &[], H::HASH_LEN).map(Zeroizing::new)
    }
}

impl<H: HashFunction> HandshakeContext for Transcript<H> {
    fn hash_algorithm(&self) -> HashAlgorithm {
        H::ALGORITHM
    }

    fn append_to_transcript(&mut self, data: &[u8]) {
        Digest::update(&mut self.hasher, data);
    }

    fn handshake_context(&self) -> Vec<u8> {
        self.hasher.clone().finalize().to_vec()
    }

    fn finished_data(&self, base_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let finished_key = Self::finished_key(base_key)?;
        Ok(H::hmac(&finished_key, &self.handshake_context()))
    }

    fn verify_finished(&self, base_key: &[u8], verify_data: &[u8]) -> Result<(), CryptoError> {
        let finished_key = Self::finished_key(base_key)?;
        H::verify_hmac(&finished_key, &self.handshake_context(), verify_data)
    }

    fn clone_box(&self) -> Box<dyn HandshakeContext> {
        Box::new(self.clone())
    }
}

impl<H: HashFunction> Clone for Transcript<H> {
    fn clone(&self) -> Self {
        Self { hasher: self.hasher.clone() }
    }
}

impl<H: HashFunction> Default for Transcript<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HashFunction> fmt::Debug for Transcript<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript").field("hash", &H::ALGORITHM).finish_non_exhaustive()
    }
}

/// Empty transcript for a hash chosen at runtime.
pub fn make_handshake_context(algorithm: HashAlgorithm) -> Box<dyn HandshakeContext> {
    match algorithm {
        HashAlgorithm::Sha256 => Box::new(Transcript::<Sha256>::new()),
        HashAlgorithm::Sha384 => Box::new(Transcript::<Sha384>::new()),
    }
}
