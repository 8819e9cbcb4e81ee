//! HKDF-Expand-Label and the derivation helpers of the TLS 1.3 key schedule.
//!
//! All functions are pure: same inputs, same output, no state. The info
//! string for every expansion is the `HkdfLabel` structure of RFC 8446 §7.1:
//!
//! ```text
//! struct {
//!     uint16 length = Length;
//!     opaque label<7..255> = "tls13 " + Label;
//!     opaque context<0..255> = Context;
//! } HkdfLabel;
//! ```

use std::marker::PhantomData;

use crate::{
    error::CryptoError,
    hash::{HashAlgorithm, HashFunction, Sha256, Sha384},
};

/// Prefix prepended to every TLS 1.3 label.
const LABEL_PREFIX: &[u8] = b"tls13 ";

/// Build the `HkdfLabel` info string.
fn hkdf_label(label: &str, context: &[u8], length: usize) -> Result<Vec<u8>, CryptoError> {
    let full_label_len = LABEL_PREFIX.len() + label.len();
    if full_label_len > usize::from(u8::MAX) {
        return Err(CryptoError::LabelTooLong { field: "label", len: full_label_len });
    }
    if context.len() > usize::from(u8::MAX) {
        return Err(CryptoError::LabelTooLong { field: "context", len: context.len() });
    }
    let Ok(length) = u16::try_from(length) else {
        return Err(CryptoError::InvalidOutputLength { requested: length, max: usize::from(u16::MAX) });
    };

    let mut info = Vec::with_capacity(2 + 1 + full_label_len + 1 + context.len());
    info.extend_from_slice(&length.to_be_bytes());
    info.push(full_label_len as u8);
    info.extend_from_slice(LABEL_PREFIX);
    info.extend_from_slice(label.as_bytes());
    info.push(context.len() as u8);
    info.extend_from_slice(context);
    Ok(info)
}

/// HKDF-Expand-Label (RFC 8446 §7.1).
///
/// Produces exactly `length` bytes. Fails if `secret` is shorter than the
/// hash output, if `length` exceeds `255 * HASH_LEN`, or if the label or
/// context do not fit their length prefix.
pub fn hkdf_expand_label<H: HashFunction>(
    secret: &[u8],
    label: &str,
    context: &[u8],
    length: usize,
) -> Result<Vec<u8>, CryptoError> {
    let info = hkdf_label(label, context, length)?;
    let mut out = vec![0u8; length];
    H::hkdf_expand(secret, &info, &mut out)?;
    Ok(out)
}

/// Key derivation operations for one negotiated hash.
///
/// Object safe so that a handshake can pick the implementation from the
/// cipher suite at runtime; see [`make_key_deriver`].
pub trait KeyDeriver: Send + Sync {
    /// Hash the deriver is bound to.
    fn hash_algorithm(&self) -> HashAlgorithm;

    /// Digest length in bytes.
    fn hash_len(&self) -> usize;

    /// HKDF-Expand-Label. Output is exactly `length` bytes.
    fn expand_label(
        &self,
        secret: &[u8],
        label: &str,
        context: &[u8],
        length: usize,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Derive-Secret with an already computed transcript hash:
    /// `HKDF-Expand-Label(secret, label, messages_hash, HashLen)`.
    fn derive_secret(
        &self,
        secret: &[u8],
        label: &str,
        messages_hash: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.expand_label(secret, label, messages_hash, self.hash_len())
    }

    /// HKDF-Extract.
    fn hkdf_extract(&self, salt: &[u8], ikm: &[u8]) -> Vec<u8>;

    /// Raw HKDF-Expand.
    fn hkdf_expand(&self, prk: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>, CryptoError>;

    /// HMAC keyed by `key`.
    fn hmac(&self, key: &[u8], message: &[u8]) -> Vec<u8>;

    /// Digest of `data`.
    fn hash(&self, data: &[u8]) -> Vec<u8>;

    /// Digest of the empty string.
    fn blank_hash(&self) -> Vec<u8> {
        self.hash(&[])
    }
}

/// [`KeyDeriver`] for a statically known hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDerivation<H> {
    _hash: PhantomData<H>,
}

impl<H: HashFunction> KeyDerivation<H> {
    /// Create a deriver for `H`.
    pub fn new() -> Self {
        Self { _hash: PhantomData }
    }
}

impl<H: HashFunction> KeyDeriver for KeyDerivation<H> {
    fn hash_algorithm(&self) -> HashAlgorithm {
        H::ALGORITHM
    }

    fn hash_len(&self) -> usize {
        H::HASH_LEN
    }

    fn expand_label(
        &self,
        secret: &[u8],
        label: &str,
        context: &[u8],
        length: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        hkdf_expand_label::<H>(secret, label, context, length)
    }

    fn hkdf_extract(&self, salt: &[u8], ikm: &[u8]) -> Vec<u8> {
        H::hkdf_extract(salt, ikm)
    }

    fn hkdf_expand(&self, prk: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>, CryptoError> {
        let mut out = vec![0u8; length];
        H::hkdf_expand(prk, info, &mut out)?;
        Ok(out)
    }

    fn hmac(&self, key: &[u8], message: &[u8]) -> Vec<u8> {
        H::hmac(key, message)
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        H::hash(data)
    }
}

/// Key deriver for a hash chosen at runtime.
pub fn make_key_deriver(algorithm: HashAlgorithm) -> Box<dyn KeyDeriver> {
    match algorithm {
        HashAlgorithm::Sha256 => Box::new(KeyDerivation::<Sha256>::new()),
        HashAlgorithm::Sha384 => Box::new(KeyDerivation::<Sha384>::new()),
    }
}
