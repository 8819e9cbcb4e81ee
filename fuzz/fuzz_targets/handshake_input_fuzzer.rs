//! Fuzz target for hostile transport input to a driven server connection
//!
//! # Strategy
//!
//! - Random chunks of bytes, optionally prefixed by a valid ClientHello
//! - Chunk boundaries anywhere, including inside frame headers
//!
//! # Invariants
//!
//! - Never panics
//! - At most one error is reported
//! - Keying material is exported only after a verified client Finished

#![no_main]

use arbitrary::Arbitrary;
use cinder_core::DriverError;
use cinder_harness::{ServerPhase, SimClient, SimRng, SimServer};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct HostileInput {
    seed: u64,
    start_with_hello: bool,
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|input: HostileInput| {
    let rng = SimRng::with_seed(input.seed);
    let mut client = SimClient::new(rng.clone());
    let mut server = SimServer::new(rng);

    if input.start_with_hello {
        server.receive(&client.client_hello());
    }
    for chunk in input.chunks.iter().take(64) {
        server.receive(chunk);
    }

    let visitor = server.driver().visitor();
    assert!(visitor.errors.len() <= 1);

    let ekm = server.driver().get_ekm("EXPORTER-fuzz", b"", 32);
    match server.phase() {
        Some(ServerPhase::Established | ServerPhase::Closed) if !server.driver().in_error_state() => {
            assert!(visitor.handshake_complete);
            assert!(ekm.is_ok());
        },
        _ if server.driver().in_error_state() => assert_eq!(ekm, Err(DriverError::Closed)),
        _ => assert_eq!(ekm, Err(DriverError::ExporterUnavailable)),
    }
});
