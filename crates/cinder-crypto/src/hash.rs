//! Hash functions negotiated by TLS 1.3 cipher suites.
//!
//! Each cipher suite fixes one hash function that is used for the transcript,
//! HMAC and HKDF. [`HashFunction`] is the static (generic) view used by
//! [`crate::Transcript`] and [`crate::KeyDerivation`]; [`HashAlgorithm`] and
//! [`CipherSuite`] are the runtime view used when the suite is only known
//! after ServerHello.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Digest;

use crate::error::CryptoError;

/// A hash function with the HMAC and HKDF operations built on it.
pub trait HashFunction: Copy + Send + Sync + 'static {
    /// Digest length in bytes.
    const HASH_LEN: usize;

    /// Runtime identifier of this hash.
    const ALGORITHM: HashAlgorithm;

    /// Incremental hasher state.
    type Hasher: Digest + Clone + Send + Sync;

    /// Digest of `data`.
    fn hash(data: &[u8]) -> Vec<u8>;

    /// HMAC of `message` keyed by `key`.
    fn hmac(key: &[u8], message: &[u8]) -> Vec<u8>;

    /// Constant-time check that `tag` is the HMAC of `message` under `key`.
    fn verify_hmac(key: &[u8], message: &[u8], tag: &[u8]) -> Result<(), CryptoError>;

    /// HKDF-Extract. Returns a `HASH_LEN` pseudorandom key.
    fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> Vec<u8>;

    /// HKDF-Expand of `prk` with `info`, filling `okm`.
    fn hkdf_expand(prk: &[u8], info: &[u8], okm: &mut [u8]) -> Result<(), CryptoError>;
}

macro_rules! hash_function {
    ($(#[$meta:meta])* $name:ident, $digest:ty, $len:expr, $algorithm:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl HashFunction for $name {
            const HASH_LEN: usize = $len;
            const ALGORITHM: HashAlgorithm = $algorithm;

            type Hasher = $digest;

            fn hash(data: &[u8]) -> Vec<u8> {
                <$digest as Digest>::digest(data).to_vec()
            }

            fn hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
                let Ok(mut mac) = Hmac::<$digest>::new_from_slice(key) else {
                    unreachable!("HMAC accepts any key size");
                };
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }

            fn verify_hmac(key: &[u8], message: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
                let Ok(mut mac) = Hmac::<$digest>::new_from_slice(key) else {
                    unreachable!("HMAC accepts any key size");
                };
                mac.update(message);
                mac.verify_slice(tag).map_err(|_| CryptoError::FinishedMismatch)
            }

            fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> Vec<u8> {
                let (prk, _) = Hkdf::<$digest>::extract(Some(salt), ikm);
                prk.to_vec()
            }

            fn hkdf_expand(prk: &[u8], info: &[u8], okm: &mut [u8]) -> Result<(), CryptoError> {
                let hkdf = Hkdf::<$digest>::from_prk(prk).map_err(|_| {
                    CryptoError::InvalidPrkLength { min: Self::HASH_LEN, actual: prk.len() }
                })?;
                hkdf.expand(info, okm).map_err(|_| CryptoError::InvalidOutputLength {
                    requested: okm.len(),
                    max: 255 * Self::HASH_LEN,
                })
            }
        }
    };
}

hash_function!(
    /// SHA-256, used by `TLS_AES_128_GCM_SHA256` and
    /// `TLS_CHACHA20_POLY1305_SHA256`.
    Sha256,
    sha2::Sha256,
    32,
    HashAlgorithm::Sha256
);

hash_function!(
    /// SHA-384, used by `TLS_AES_256_GCM_SHA384`.
    Sha384,
    sha2::Sha384,
    48,
    HashAlgorithm::Sha384
);

/// Runtime identifier for a [`HashFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub fn hash_len(self) -> usize {
        match self {
            Self::Sha256 => Sha256::HASH_LEN,
            Self::Sha384 => Sha384::HASH_LEN,
        }
    }
}

/// TLS 1.3 cipher suites (RFC 8446 §B.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    /// `TLS_AES_128_GCM_SHA256` (0x1301)
    TlsAes128GcmSha256,
    /// `TLS_AES_256_GCM_SHA384` (0x1302)
    TlsAes256GcmSha384,
    /// `TLS_CHACHA20_POLY1305_SHA256` (0x1303)
    TlsChacha20Poly1305Sha256,
}

impl CipherSuite {
    /// Hash function bound to this suite.
    pub fn hash_algorithm(self) -> HashAlgorithm {
        match self {
            Self::TlsAes128GcmSha256 | Self::TlsChacha20Poly1305Sha256 => HashAlgorithm::Sha256,
            Self::TlsAes256GcmSha384 => HashAlgorithm::Sha384,
        }
    }

    /// IANA code point.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::TlsAes128GcmSha256 => 0x1301,
            Self::TlsAes256GcmSha384 => 0x1302,
            Self::TlsChacha20Poly1305Sha256 => 0x1303,
        }
    }

    /// Suite for an IANA code point. `None` if unknown.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x1301 => Some(Self::TlsAes128GcmSha256),
            0x1302 => Some(Self::TlsAes256GcmSha384),
            0x1303 => Some(Self::TlsChacha20Poly1305Sha256),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_lengths_match_algorithm() {
        assert_eq!(Sha256::hash(b"").len(), HashAlgorithm::Sha256.hash_len());
        assert_eq!(Sha384::hash(b"").len(), HashAlgorithm::Sha384.hash_len());
    }

    #[test]
    fn empty_sha256_digest() {
        assert_eq!(
            hex::encode(Sha256::hash(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn cipher_suite_code_points_round_trip() {
        for suite in [
            CipherSuite::TlsAes128GcmSha256,
            CipherSuite::TlsAes256GcmSha384,
            CipherSuite::TlsChacha20Poly1305Sha256,
        ] {
            assert_eq!(CipherSuite::from_u16(suite.to_u16()), Some(suite));
        }
        assert_eq!(CipherSuite::from_u16(0x1304), None);
    }

    #[test]
    fn cipher_suite_hash_binding() {
        assert_eq!(CipherSuite::TlsAes256GcmSha384.hash_algorithm(), HashAlgorithm::Sha384);
        assert_eq!(CipherSuite::TlsChacha20Poly1305Sha256.hash_algorithm(), HashAlgorithm::Sha256);
    }

    #[test]
    fn verify_hmac_rejects_modified_tag() {
        let mut tag = Sha256::hmac(b"key", b"message");
        assert!(Sha256::verify_hmac(b"key", b"message", &tag).is_ok());

        tag[0] ^= 0x01;
        assert_eq!(Sha256::verify_hmac(b"key", b"message", &tag), Err(CryptoError::FinishedMismatch));
    }

    #[test]
    fn expand_rejects_short_prk() {
        let mut okm = [0u8; 32];
        let result = Sha256::hkdf_expand(&[0u8; 16], b"info", &mut okm);
        assert_eq!(result, Err(CryptoError::InvalidPrkLength { min: 32, actual: 16 }));
    }

    #[test]
    fn expand_rejects_oversized_output() {
        let mut okm = vec![0u8; 255 * 32 + 1];
        let result = Sha256::hkdf_expand(&[0u8; 32], b"info", &mut okm);
        assert!(matches!(result, Err(CryptoError::InvalidOutputLength { max: 8160, .. })));
    }
}
