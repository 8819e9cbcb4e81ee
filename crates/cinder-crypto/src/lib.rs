//! Cinder Cryptographic Primitives
//!
//! Transcript hashing and key derivation for the TLS 1.3 handshake. Pure
//! functions with deterministic outputs built on the RustCrypto `sha2`,
//! `hmac` and `hkdf` crates.
//!
//! # Key Lifecycle
//!
//! ```text
//! handshake messages ──► Transcript ──► Hash(CH..X)
//!                                           │
//! PSK / (EC)DHE ──► KeySchedule ──► Derive-Secret(stage, label, Hash(CH..X))
//!                                           │
//!                        ┌──────────────────┼──────────────────┐
//!                        ▼                  ▼                  ▼
//!              traffic secrets      Finished verify_data   exporter master
//!                                   (Transcript)           (get_ekm)
//! ```
//!
//! # Security
//!
//! - Byte-exact `HkdfLabel` construction (RFC 8446 §7.1); any deviation
//!   breaks interoperability, so it is pinned by RFC 8448 and RFC 9001
//!   known-answer tests.
//! - Finished verification compares in constant time.
//! - Finished keys and stage secrets are zeroized after use.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
pub mod exporter;
pub mod hash;
pub mod key_derivation;
pub mod key_schedule;
pub mod transcript;

pub use error::CryptoError;
pub use exporter::get_ekm;
pub use hash::{CipherSuite, HashAlgorithm, HashFunction, Sha256, Sha384};
pub use key_derivation::{KeyDerivation, KeyDeriver, hkdf_expand_label, make_key_deriver};
pub use key_schedule::{
    EarlySecret, HandshakeSecret, KeySchedule, MasterSecret, SecretType, Stage,
};
pub use transcript::{HandshakeContext, Transcript, make_handshake_context};
