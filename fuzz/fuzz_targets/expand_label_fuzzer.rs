//! Fuzz target for HKDF-Expand-Label and the Finished MAC
//!
//! # Strategy
//!
//! - Secret: empty, short, hash-length, long
//! - Label and context: any length, including past the 255-byte field limit
//! - Output length: zero through well past 255 * HashLen
//!
//! # Invariants
//!
//! - Never panics; oversized fields and outputs are structured errors
//! - Successful output is exactly the requested length
//! - Static and runtime derivers agree
//! - A Finished MAC always verifies against the transcript it was made from

#![no_main]

use arbitrary::Arbitrary;
use cinder_crypto::{
    CryptoError, HandshakeContext, HashAlgorithm, Sha256, Sha384, Transcript, hkdf_expand_label,
    make_key_deriver,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct ExpandInput {
    use_sha384: bool,
    secret: Vec<u8>,
    label: String,
    context: Vec<u8>,
    length: u16,
    messages: Vec<Vec<u8>>,
}

fuzz_target!(|input: ExpandInput| {
    let length = usize::from(input.length);
    let (algorithm, result) = if input.use_sha384 {
        let result = hkdf_expand_label::<Sha384>(&input.secret, &input.label, &input.context, length);
        (HashAlgorithm::Sha384, result)
    } else {
        let result = hkdf_expand_label::<Sha256>(&input.secret, &input.label, &input.context, length);
        (HashAlgorithm::Sha256, result)
    };

    let deriver = make_key_deriver(algorithm);
    let dynamic = deriver.expand_label(&input.secret, &input.label, &input.context, length);
    assert_eq!(result, dynamic);

    match result {
        Ok(okm) => assert_eq!(okm.len(), length),
        Err(
            CryptoError::LabelTooLong { .. }
            | CryptoError::InvalidOutputLength { .. }
            | CryptoError::InvalidPrkLength { .. },
        ) => {},
        Err(other) => panic!("unexpected error: {other}"),
    }

    let mut transcript = Transcript::<Sha256>::new();
    for message in input.messages.iter().take(32) {
        transcript.append_to_transcript(message);
    }
    if let Ok(mac) = transcript.finished_data(&input.secret) {
        assert!(transcript.verify_finished(&input.secret, &mac).is_ok());
    }
});
