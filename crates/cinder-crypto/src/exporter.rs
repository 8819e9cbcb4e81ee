//! Keying material exporters (RFC 8446 §7.5).

use crate::{error::CryptoError, key_derivation::KeyDeriver};

/// Label of the final exporter expansion.
const EXPORTER_LABEL: &str = "exporter";

/// TLS-Exporter(label, context, length):
///
/// ```text
/// HKDF-Expand-Label(Derive-Secret(Secret, label, ""),
///                   "exporter", Hash(context_value), key_length)
/// ```
///
/// `exporter_master` is the exporter master secret of the connection (or the
/// early exporter master secret for 0-RTT exporters).
pub fn get_ekm(
    deriver: &dyn KeyDeriver,
    exporter_master: &[u8],
    label: &str,
    context: &[u8],
    length: usize,
) -> Result<Vec<u8>, CryptoError> {
    let secret = deriver.derive_secret(exporter_master, label, &deriver.blank_hash())?;
    let hashed_context = deriver.hash(context);
    deriver.expand_label(&secret, EXPORTER_LABEL, &hashed_context, length)
}
