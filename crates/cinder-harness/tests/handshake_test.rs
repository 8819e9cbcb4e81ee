//! End-to-end handshake through the driver.
//!
//! A simulated client runs ClientHello/ServerHello/Finished against a server
//! whose connection is driven by the real driver, transcript and key
//! schedule. Exported keying material is checked on both sides.

use cinder_core::{DriverError, ErrorKind, WriteNewSessionTicket};
use cinder_harness::{ServerPhase, SimClient, SimRng, SimServer, connected_pair, handshake};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init();
}

#[test]
fn get_ekm_is_unavailable_until_handshake_completes() {
    init_tracing();
    let rng = SimRng::with_seed(7);
    let mut client = SimClient::new(rng.clone());
    let mut server = SimServer::new(rng);

    assert_eq!(
        server.driver().get_ekm("EXPORTER-test", b"", 32),
        Err(DriverError::ExporterUnavailable)
    );

    server.receive(&client.client_hello());
    assert_eq!(server.phase(), Some(ServerPhase::ExpectFinished));
    assert_eq!(
        server.driver().get_ekm("EXPORTER-test", b"", 32),
        Err(DriverError::ExporterUnavailable)
    );

    let finished = client.handle_server_flight(&server.take_outbound()).unwrap();
    server.receive(&finished);

    assert_eq!(server.phase(), Some(ServerPhase::Established));
    assert!(server.driver().visitor().handshake_complete);
    let server_ekm = server.driver().get_ekm("EXPORTER-test", b"context", 32).unwrap();
    let client_ekm = client.get_ekm("EXPORTER-test", b"context", 32).unwrap();
    assert_eq!(server_ekm, client_ekm);
    assert_eq!(server_ekm.len(), 32);
}

#[test]
fn ekm_is_bound_to_label_context_and_length() {
    let (_, server) = connected_pair(11).unwrap();
    let driver = server.driver();

    let base = driver.get_ekm("EXPORTER-a", b"ctx", 32).unwrap();
    assert_ne!(base, driver.get_ekm("EXPORTER-b", b"ctx", 32).unwrap());
    assert_ne!(base, driver.get_ekm("EXPORTER-a", b"other", 32).unwrap());

    let long = driver.get_ekm("EXPORTER-a", b"ctx", 64).unwrap();
    assert_eq!(long.len(), 64);
    assert_ne!(&long[..32], &base[..]);
}

#[test]
fn same_seed_same_session() {
    let (first, _) = connected_pair(3).unwrap();
    let (second, _) = connected_pair(3).unwrap();
    let (other, _) = connected_pair(4).unwrap();

    assert_eq!(first.exporter_master_secret(), second.exporter_master_secret());
    assert_ne!(first.exporter_master_secret(), other.exporter_master_secret());
}

#[test]
fn corrupted_client_finished_is_fatal() {
    init_tracing();
    let rng = SimRng::with_seed(5);
    let mut client = SimClient::new(rng.clone());
    let mut server = SimServer::new(rng);

    server.receive(&client.client_hello());
    let mut finished = client.handle_server_flight(&server.take_outbound()).unwrap().to_vec();
    if let Some(last) = finished.last_mut() {
        *last ^= 0x01;
    }
    server.receive(&finished);

    let errors = &server.driver().visitor().errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::CryptographicFailure);
    assert!(errors[0].is_authentication_failure());
    assert!(!server.driver().visitor().handshake_complete);
    assert_eq!(server.phase(), Some(ServerPhase::ExpectFinished));
    assert_eq!(server.driver().get_ekm("EXPORTER-test", b"", 32), Err(DriverError::Closed));

    // Nothing is processed once the error is latched.
    server.receive(&finished);
    assert_eq!(server.driver().visitor().errors.len(), 1);
}

#[test]
fn corrupted_server_finished_is_rejected_by_client() {
    let rng = SimRng::with_seed(6);
    let mut client = SimClient::new(rng.clone());
    let mut server = SimServer::new(rng);

    server.receive(&client.client_hello());
    let mut flight = server.take_outbound().to_vec();
    if let Some(last) = flight.last_mut() {
        *last ^= 0x80;
    }

    let err = client.handle_server_flight(&flight).unwrap_err();
    assert!(err.is_authentication_failure());
    assert!(client.exporter_master_secret().is_none());
}

#[test]
fn byte_at_a_time_delivery_completes() {
    let rng = SimRng::with_seed(9);
    let mut client = SimClient::new(rng.clone());
    let mut server = SimServer::new(rng);

    let hello = client.client_hello();
    for (index, byte) in hello.iter().enumerate() {
        server.receive(&[*byte]);
        let outbound = server.take_outbound();
        if index + 1 < hello.len() {
            assert!(outbound.is_empty());
        } else {
            let finished = client.handle_server_flight(&outbound).unwrap();
            server.receive(&finished);
        }
    }

    assert_eq!(server.phase(), Some(ServerPhase::Established));
    assert_eq!(
        server.driver().get_ekm("EXPORTER-test", b"", 16).unwrap(),
        client.get_ekm("EXPORTER-test", b"", 16).unwrap()
    );
}

#[test]
fn application_data_flows_both_ways() {
    let (_, mut server) = connected_pair(12).unwrap();

    let mut inbound = SimClient::app_data(b"ping").to_vec();
    inbound.extend_from_slice(&SimClient::app_data(b"again"));
    server.receive(&inbound);
    let delivered: Vec<_> =
        server.driver().visitor().delivered.iter().map(|data| data.to_vec()).collect();
    assert_eq!(delivered, vec![b"ping".to_vec(), b"again".to_vec()]);

    server.driver_mut().app_write(b"pong".to_vec());
    assert_eq!(server.take_outbound(), SimClient::app_data(b"pong"));
}

#[test]
fn app_write_before_handshake_is_a_protocol_violation() {
    let mut server = SimServer::new(SimRng::with_seed(1));
    server.driver_mut().app_write(b"too early".to_vec());

    let errors = &server.driver().visitor().errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::ProtocolViolation);
    assert!(server.driver().in_error_state());
}

#[test]
fn early_data_is_handed_back() {
    let mut server = SimServer::new(SimRng::with_seed(1));
    server.driver_mut().early_app_write(b"0-rtt".to_vec());

    assert_eq!(server.driver().visitor().early_write_failures, vec![b"0-rtt".to_vec()]);
    assert!(!server.driver().in_error_state());
}

#[test]
fn tickets_carry_psks_the_client_can_derive() {
    let (client, mut server) = connected_pair(21).unwrap();

    for token in [b"a", b"b"] {
        let ticket = WriteNewSessionTicket { app_token: token.to_vec() };
        server.driver_mut().write_new_session_ticket(ticket);
    }

    let tickets = &server.driver().visitor().tickets;
    assert_eq!(tickets.len(), 2);
    assert_ne!(tickets[0].nonce, tickets[1].nonce);
    for ticket in tickets {
        let psk = client.resumption_psk(&ticket.nonce).unwrap();
        assert_eq!(*psk, *ticket.resumption_psk);
    }
    assert_ne!(*tickets[0].resumption_psk, *tickets[1].resumption_psk);

    let frames = handshake::split_frames(&server.take_outbound()).unwrap();
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|frame| frame.kind == handshake::NEW_SESSION_TICKET));
}

#[test]
fn ticket_before_handshake_is_rejected() {
    let mut server = SimServer::new(SimRng::with_seed(2));
    server.driver_mut().write_new_session_ticket(WriteNewSessionTicket::default());
    assert_eq!(server.driver().visitor().errors[0].kind(), ErrorKind::ProtocolViolation);
}

#[test]
fn peer_close_ends_data_and_local_close_is_idempotent() {
    let (_, mut server) = connected_pair(13).unwrap();

    server.receive(&SimClient::close());
    assert!(server.driver().visitor().end_of_data);
    assert_eq!(server.phase(), Some(ServerPhase::Closed));

    server.driver_mut().app_close();
    assert!(server.take_outbound().is_empty());
    assert!(!server.driver().in_error_state());
}

#[test]
fn local_close_sends_close_frame() {
    let (_, mut server) = connected_pair(14).unwrap();
    server.driver_mut().app_close();

    assert_eq!(server.take_outbound(), SimClient::close());
    assert_eq!(server.phase(), Some(ServerPhase::Closed));
}

#[test]
fn unexpected_frame_moves_to_error_state() {
    let mut server = SimServer::new(SimRng::with_seed(15));
    server.receive(&SimClient::app_data(b"hello?"));

    let errors = &server.driver().visitor().errors;
    assert_eq!(
        errors[0],
        DriverError::UnexpectedEvent {
            event: "application_data",
            state: "ExpectClientHello".to_string()
        }
    );
}
