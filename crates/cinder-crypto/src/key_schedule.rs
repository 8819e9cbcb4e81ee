//! TLS 1.3 key schedule (RFC 8446 §7.1).
//!
//! ```text
//!              0
//!              |
//!    PSK ->  HKDF-Extract = Early Secret
//!              |
//!              +-----> Derive-Secret(., "c e traffic", ClientHello)
//!              +-----> Derive-Secret(., "e exp master", ClientHello)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!   (EC)DHE -> HKDF-Extract = Handshake Secret
//!              |
//!              +-----> Derive-Secret(., "c hs traffic", CH..SH)
//!              +-----> Derive-Secret(., "s hs traffic", CH..SH)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!   0 ------> HKDF-Extract = Master Secret
//!              |
//!              +-----> Derive-Secret(., "c ap traffic", CH..server Finished)
//!              +-----> Derive-Secret(., "s ap traffic", CH..server Finished)
//!              +-----> Derive-Secret(., "exp master", CH..server Finished)
//!              +-----> Derive-Secret(., "res master", CH..client Finished)
//! ```
//!
//! Stage secrets are zeroized when replaced or dropped.

use zeroize::Zeroizing;

use crate::{
    error::CryptoError,
    hash::HashAlgorithm,
    key_derivation::{KeyDeriver, make_key_deriver},
};

/// Label chaining one stage into the next.
const DERIVED_LABEL: &str = "derived";

/// Label for resumption PSKs derived from the resumption master secret.
const RESUMPTION_LABEL: &str = "resumption";

/// Current stage of the key schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Early secret extracted from the PSK (or zeros)
    Early,
    /// Handshake secret extracted from the (EC)DHE shared secret
    Handshake,
    /// Master secret
    Master,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Self::Early => "early",
            Self::Handshake => "handshake",
            Self::Master => "master",
        }
    }
}

/// Secrets derived from the early secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlySecret {
    /// PSK binder key for external PSKs
    ExternalPskBinder,
    /// PSK binder key for resumption PSKs
    ResumptionPskBinder,
    /// 0-RTT traffic secret
    ClientEarlyTraffic,
    /// Early exporter master secret
    EarlyExporterMaster,
}

/// Secrets derived from the handshake secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeSecret {
    /// Client handshake traffic secret
    ClientHandshakeTraffic,
    /// Server handshake traffic secret
    ServerHandshakeTraffic,
}

/// Secrets derived from the master secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterSecret {
    /// Client application traffic secret
    ClientAppTraffic,
    /// Server application traffic secret
    ServerAppTraffic,
    /// Exporter master secret
    ExporterMaster,
    /// Resumption master secret
    ResumptionMaster,
}

/// Any named secret of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretType {
    /// Derived from the early secret
    Early(EarlySecret),
    /// Derived from the handshake secret
    Handshake(HandshakeSecret),
    /// Derived from the master secret
    Master(MasterSecret),
}

impl SecretType {
    /// Derive-Secret label for this secret.
    pub fn label(self) -> &'static str {
        match self {
            Self::Early(EarlySecret::ExternalPskBinder) => "ext binder",
            Self::Early(EarlySecret::ResumptionPskBinder) => "res binder",
            Self::Early(EarlySecret::ClientEarlyTraffic) => "c e traffic",
            Self::Early(EarlySecret::EarlyExporterMaster) => "e exp master",
            Self::Handshake(HandshakeSecret::ClientHandshakeTraffic) => "c hs traffic",
            Self::Handshake(HandshakeSecret::ServerHandshakeTraffic) => "s hs traffic",
            Self::Master(MasterSecret::ClientAppTraffic) => "c ap traffic",
            Self::Master(MasterSecret::ServerAppTraffic) => "s ap traffic",
            Self::Master(MasterSecret::ExporterMaster) => "exp master",
            Self::Master(MasterSecret::ResumptionMaster) => "res master",
        }
    }

    fn stage(self) -> Stage {
        match self {
            Self::Early(_) => Stage::Early,
            Self::Handshake(_) => Stage::Handshake,
            Self::Master(_) => Stage::Master,
        }
    }
}

impl From<EarlySecret> for SecretType {
    fn from(secret: EarlySecret) -> Self {
        Self::Early(secret)
    }
}

impl From<HandshakeSecret> for SecretType {
    fn from(secret: HandshakeSecret) -> Self {
        Self::Handshake(secret)
    }
}

impl From<MasterSecret> for SecretType {
    fn from(secret: MasterSecret) -> Self {
        Self::Master(secret)
    }
}

/// Stateful walk down the TLS 1.3 secret ladder.
pub struct KeySchedule {
    deriver: Box<dyn KeyDeriver>,
    stage: Stage,
    secret: Zeroizing<Vec<u8>>,
}

impl KeySchedule {
    /// Start the schedule. With no PSK the early secret is extracted from a
    /// zero string of hash length.
    pub fn new(algorithm: HashAlgorithm, psk: Option<&[u8]>) -> Self {
        let deriver = make_key_deriver(algorithm);
        let zeros = vec![0u8; deriver.hash_len()];
        let secret = Zeroizing::new(deriver.hkdf_extract(&zeros, psk.unwrap_or(&zeros)));
        Self { deriver, stage: Stage::Early, secret }
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Deriver bound to the schedule's hash.
    pub fn deriver(&self) -> &dyn KeyDeriver {
        self.deriver.as_ref()
    }

    /// Advance from the early secret to the handshake secret.
    pub fn derive_handshake_secret(&mut self, ecdhe: &[u8]) -> Result<(), CryptoError> {
        self.require(Stage::Early, "derive_handshake_secret")?;
        self.advance(ecdhe)?;
        self.stage = Stage::Handshake;
        Ok(())
    }

    /// Advance from the handshake secret to the master secret.
    pub fn derive_master_secret(&mut self) -> Result<(), CryptoError> {
        self.require(Stage::Handshake, "derive_master_secret")?;
        let zeros = vec![0u8; self.deriver.hash_len()];
        self.advance(&zeros)?;
        self.stage = Stage::Master;
        Ok(())
    }

    /// Derive a named secret over `transcript_hash`. The schedule must be in
    /// the stage the secret belongs to.
    pub fn get_secret(
        &self,
        secret: impl Into<SecretType>,
        transcript_hash: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let secret = secret.into();
        self.require(secret.stage(), secret.label())?;
        self.deriver
            .derive_secret(&self.secret, secret.label(), transcript_hash)
            .map(Zeroizing::new)
    }

    /// Resumption PSK for one ticket nonce (RFC 8446 §4.6.1).
    pub fn resumption_secret(
        &self,
        resumption_master: &[u8],
        ticket_nonce: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let length = self.deriver.hash_len();
        self.deriver
            .expand_label(resumption_master, RESUMPTION_LABEL, ticket_nonce, length)
            .map(Zeroizing::new)
    }

    fn advance(&mut self, ikm: &[u8]) -> Result<(), CryptoError> {
        let blank = self.deriver.blank_hash();
        let salt = Zeroizing::new(self.deriver.derive_secret(&self.secret, DERIVED_LABEL, &blank)?);
        self.secret = Zeroizing::new(self.deriver.hkdf_extract(&salt, ikm));
        Ok(())
    }

    fn require(&self, expected: Stage, operation: &'static str) -> Result<(), CryptoError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(CryptoError::InvalidStage {
                expected: expected.name(),
                actual: self.stage.name(),
                operation,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unhex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    // RFC 8448 §3 "Simple 1-RTT Handshake"
    const ECDHE: &str = "8bd4054fb55b9d63fdfbacf9f04b9f0d35e6d63f537563efd46272900f89492d";
    const HELLO_HASH: &str = "860c06edc07858ee8e78f0e7428c58edd6b43f2ca3e6e95f02ed063cf0e1cad8";

    #[test]
    fn handshake_traffic_secrets_rfc8448() {
        let mut schedule = KeySchedule::new(HashAlgorithm::Sha256, None);
        schedule.derive_handshake_secret(&unhex(ECDHE)).unwrap();

        let client =
            schedule.get_secret(HandshakeSecret::ClientHandshakeTraffic, &unhex(HELLO_HASH)).unwrap();
        let server =
            schedule.get_secret(HandshakeSecret::ServerHandshakeTraffic, &unhex(HELLO_HASH)).unwrap();

        assert_eq!(
            hex::encode(client.as_slice()),
            "b3eddb126e067f35a780b3abf45e2d8f3b1a950738f52e9600746a0e27a55a21"
        );
        assert_eq!(
            hex::encode(server.as_slice()),
            "b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38"
        );
    }

    #[test]
    fn master_secret_rfc8448() {
        let mut schedule = KeySchedule::new(HashAlgorithm::Sha256, None);
        schedule.derive_handshake_secret(&unhex(ECDHE)).unwrap();
        schedule.derive_master_secret().unwrap();

        assert_eq!(schedule.stage(), Stage::Master);
        assert_eq!(
            hex::encode(schedule.secret.as_slice()),
            "18df06843d13a08bf2a449844c5f8a478001bc4d4c627984d5a41da8d0402919"
        );
    }

    #[test]
    fn secret_from_wrong_stage_is_rejected() {
        let schedule = KeySchedule::new(HashAlgorithm::Sha256, None);
        let result = schedule.get_secret(MasterSecret::ExporterMaster, &[0u8; 32]);
        assert_eq!(
            result.err(),
            Some(CryptoError::InvalidStage {
                expected: "master",
                actual: "early",
                operation: "exp master",
            })
        );
    }

    #[test]
    fn stages_cannot_be_repeated() {
        let mut schedule = KeySchedule::new(HashAlgorithm::Sha384, None);
        assert!(schedule.derive_master_secret().is_err());
        schedule.derive_handshake_secret(&[1u8; 48]).unwrap();
        assert!(schedule.derive_handshake_secret(&[1u8; 48]).is_err());
    }

    #[test]
    fn psk_changes_early_secret() {
        let without = KeySchedule::new(HashAlgorithm::Sha256, None);
        let with = KeySchedule::new(HashAlgorithm::Sha256, Some(&[9u8; 32]));
        assert_ne!(without.secret.as_slice(), with.secret.as_slice());
    }

    #[test]
    fn resumption_secret_depends_on_nonce() {
        let schedule = KeySchedule::new(HashAlgorithm::Sha256, None);
        let master = [3u8; 32];
        let a = schedule.resumption_secret(&master, &[0]).unwrap();
        let b = schedule.resumption_secret(&master, &[1]).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a.as_slice(), b.as_slice());
    }
}
