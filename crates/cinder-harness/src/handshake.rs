//! Miniature TLS 1.3-shaped handshake run through the real driver.
//!
//! The server side is a [`StateMachine`] that uses the real transcript, key
//! schedule and Finished computation; [`SimClient`] is its peer. Messages are
//! plaintext frames and the key exchange is simulated, so this exercises the
//! driver and the key schedule end to end without a record layer.
//!
//! ```text
//! SimClient                                      SimServer
//!   ClientHello   ─────────────────────────────►
//!                 ◄─────────────────────────────  ServerHello, Finished
//!   Finished      ─────────────────────────────►
//!                                                 exporter available
//!   AppData       ◄────────────────────────────►  AppData
//! ```
//!
//! # Framing
//!
//! ```text
//! +------+----------------+------------------+
//! | type | length (u24 BE)| body             |
//! +------+----------------+------------------+
//! ```

use std::{cell::RefCell, fmt, rc::Rc};

use bytes::{BufMut, Bytes, BytesMut};
use cinder_core::{
    ActionVisitor, DelayedDestruction, Driver, DriverConfig, DriverContext, DriverError, Event,
    HandshakeState, PendingEvent, Processed, StateMachine, TransportReadBuffer,
    WriteNewSessionTicket,
};
use cinder_crypto::{
    CipherSuite, HandshakeContext, HandshakeSecret, HashAlgorithm, HashFunction, KeySchedule,
    MasterSecret, Sha256, Transcript, make_key_deriver,
};
use tracing::debug;
use zeroize::Zeroizing;

use crate::sim_rng::SimRng;

/// ClientHello frame type.
pub const CLIENT_HELLO: u8 = 1;
/// ServerHello frame type.
pub const SERVER_HELLO: u8 = 2;
/// NewSessionTicket frame type.
pub const NEW_SESSION_TICKET: u8 = 4;
/// Finished frame type.
pub const FINISHED: u8 = 20;
/// Close frame type.
pub const CLOSE: u8 = 21;
/// Application data frame type.
pub const APPLICATION_DATA: u8 = 23;

/// Suite the simulated server always selects.
pub const SIM_CIPHER_SUITE: CipherSuite = CipherSuite::TlsAes128GcmSha256;

const HEADER_LEN: usize = 4;
const RANDOM_LEN: usize = 32;
const KEY_SHARE_LEN: usize = 32;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame type
    pub kind: u8,
    /// Frame body
    pub body: Bytes,
    /// Header and body as received, for the transcript
    pub raw: Bytes,
}

impl Frame {
    fn from_raw(raw: Bytes) -> Self {
        Self { kind: raw[0], body: raw.slice(HEADER_LEN..), raw }
    }
}

/// Encode one frame.
pub fn encode_frame(kind: u8, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_u8(kind);
    buf.put_uint(body.len() as u64, 3);
    buf.put_slice(body);
    buf.freeze()
}

/// Total length of the frame at the front of `data`, if its header is
/// complete.
pub fn frame_len(data: &[u8]) -> Option<usize> {
    match data {
        [_, a, b, c, ..] => Some(HEADER_LEN + u32::from_be_bytes([0, *a, *b, *c]) as usize),
        _ => None,
    }
}

/// Consume one complete frame from the front of `buf`.
pub fn read_frame(buf: &mut TransportReadBuffer) -> Option<Frame> {
    let len = frame_len(buf.peek())?;
    buf.take(len).map(Frame::from_raw)
}

/// Split a flight into frames. Trailing partial frames are an error.
pub fn split_frames(data: &[u8]) -> Result<Vec<Frame>, DriverError> {
    let mut buf = TransportReadBuffer::new();
    buf.append(data);

    let mut frames = Vec::new();
    while !buf.is_empty() {
        let frame = read_frame(&mut buf)
            .ok_or_else(|| DriverError::ProtocolViolation { reason: "truncated frame".into() })?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Stand-in for (EC)DHE: both sides hash the two key shares.
fn shared_secret(client_share: &[u8], server_share: &[u8]) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(Sha256::hash(&[client_share, server_share].concat()))
}

fn malformed(what: &str) -> DriverError {
    DriverError::ProtocolViolation { reason: format!("malformed {what}") }
}

/// Server handshake phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    /// Waiting for ClientHello
    ExpectClientHello,
    /// ServerHello and Finished sent, waiting for the client Finished
    ExpectFinished,
    /// Handshake complete
    Established,
    /// Closed by either side
    Closed,
}

/// Connection state owned by the server connection and shared with the
/// driver.
pub struct ServerState {
    /// Handshake phase
    pub phase: ServerPhase,
    /// Negotiated suite
    pub cipher_suite: Option<CipherSuite>,
    /// Every handshake frame sent or received so far
    pub transcript: Transcript<Sha256>,
    client_handshake_secret: Option<Zeroizing<Vec<u8>>>,
    exporter_master_secret: Option<Zeroizing<Vec<u8>>>,
}

impl ServerState {
    /// State before ClientHello.
    pub fn new() -> Self {
        Self {
            phase: ServerPhase::ExpectClientHello,
            cipher_suite: None,
            transcript: Transcript::new(),
            client_handshake_secret: None,
            exporter_master_secret: None,
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerState")
            .field("phase", &self.phase)
            .field("cipher_suite", &self.cipher_suite)
            .finish_non_exhaustive()
    }
}

impl HandshakeState for ServerState {
    fn cipher_suite(&self) -> Option<CipherSuite> {
        self.cipher_suite
    }

    fn exporter_master_secret(&self) -> Option<&[u8]> {
        self.exporter_master_secret.as_deref().map(Vec::as_slice)
    }
}

/// Deferred change to [`ServerState`], applied by the visitor.
pub struct StateUpdate(Box<dyn FnOnce(&mut ServerState)>);

impl StateUpdate {
    /// Wrap a mutation.
    pub fn new(update: impl FnOnce(&mut ServerState) + 'static) -> Self {
        Self(Box::new(update))
    }

    /// Apply to `state`.
    pub fn apply(self, state: &mut ServerState) {
        (self.0)(state);
    }
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateUpdate")
    }
}

/// Actions emitted by [`ServerMachine`].
#[derive(Debug)]
pub enum SimAction {
    /// Send bytes to the peer
    WriteToTransport(Bytes),
    /// Hand received application data to the application
    DeliverAppData(Bytes),
    /// Client Finished verified
    ReportHandshakeSuccess,
    /// Early data could not be sent; hand it back
    ReportEarlyWriteFailed(Vec<u8>),
    /// A NewSessionTicket was written
    TicketIssued(IssuedTicket),
    /// Peer closed
    EndOfData,
    /// Change the connection state
    MutateState(StateUpdate),
}

impl SimAction {
    fn mutate(update: impl FnOnce(&mut ServerState) + 'static) -> Self {
        Self::MutateState(StateUpdate::new(update))
    }
}

/// Ticket issued to the client.
pub struct IssuedTicket {
    /// Ticket nonce
    pub nonce: Vec<u8>,
    /// Application token bound into the ticket
    pub app_token: Vec<u8>,
    /// PSK the client will resume with
    pub resumption_psk: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for IssuedTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedTicket")
            .field("nonce", &self.nonce)
            .field("app_token", &self.app_token)
            .finish_non_exhaustive()
    }
}

/// Server transition logic.
pub struct ServerMachine {
    rng: SimRng,
    schedule: Option<KeySchedule>,
    pending_exporter: Option<Zeroizing<Vec<u8>>>,
    resumption_master: Option<Zeroizing<Vec<u8>>>,
    tickets_issued: u32,
}

impl ServerMachine {
    /// Machine drawing its random and key share from `rng`.
    pub fn new(rng: SimRng) -> Self {
        Self {
            rng,
            schedule: None,
            pending_exporter: None,
            resumption_master: None,
            tickets_issued: 0,
        }
    }

    fn unexpected(event: &'static str, state: &ServerState) -> DriverError {
        DriverError::UnexpectedEvent { event, state: format!("{:?}", state.phase) }
    }

    fn on_frame(&mut self, state: &ServerState, frame: Frame) -> Result<Vec<SimAction>, DriverError> {
        match (state.phase, frame.kind) {
            (ServerPhase::ExpectClientHello, CLIENT_HELLO) => self.on_client_hello(state, &frame),
            (ServerPhase::ExpectFinished, FINISHED) => self.on_client_finished(state, &frame),
            (ServerPhase::Established, APPLICATION_DATA) => {
                Ok(vec![SimAction::DeliverAppData(frame.body)])
            },
            (ServerPhase::Established, CLOSE) => Ok(vec![
                SimAction::mutate(|state| state.phase = ServerPhase::Closed),
                SimAction::EndOfData,
            ]),
            _ => Err(Self::unexpected(frame_name(frame.kind), state)),
        }
    }

    fn on_client_hello(
        &mut self,
        state: &ServerState,
        client_hello: &Frame,
    ) -> Result<Vec<SimAction>, DriverError> {
        if client_hello.body.len() != RANDOM_LEN + KEY_SHARE_LEN {
            return Err(malformed("ClientHello"));
        }
        let client_share = &client_hello.body[RANDOM_LEN..];
        let server_share: [u8; KEY_SHARE_LEN] = self.rng.random_array();

        let mut body = Vec::with_capacity(RANDOM_LEN + KEY_SHARE_LEN + 2);
        body.extend_from_slice(&self.rng.random_array::<RANDOM_LEN>());
        body.extend_from_slice(&server_share);
        body.extend_from_slice(&SIM_CIPHER_SUITE.to_u16().to_be_bytes());
        let server_hello = encode_frame(SERVER_HELLO, &body);

        let mut transcript = state.transcript.clone();
        transcript.append_to_transcript(&client_hello.raw);
        transcript.append_to_transcript(&server_hello);

        let mut schedule = KeySchedule::new(SIM_CIPHER_SUITE.hash_algorithm(), None);
        schedule.derive_handshake_secret(&shared_secret(client_share, &server_share))?;
        let hello_hash = transcript.handshake_context();
        let client_hs = schedule.get_secret(HandshakeSecret::ClientHandshakeTraffic, &hello_hash)?;
        let server_hs = schedule.get_secret(HandshakeSecret::ServerHandshakeTraffic, &hello_hash)?;

        let finished = encode_frame(FINISHED, &transcript.finished_data(&server_hs)?);
        transcript.append_to_transcript(&finished);

        schedule.derive_master_secret()?;
        let exporter =
            schedule.get_secret(MasterSecret::ExporterMaster, &transcript.handshake_context())?;
        self.schedule = Some(schedule);
        self.pending_exporter = Some(exporter);

        let mut flight = BytesMut::with_capacity(server_hello.len() + finished.len());
        flight.extend_from_slice(&server_hello);
        flight.extend_from_slice(&finished);

        debug!("sending ServerHello and Finished");
        Ok(vec![
            SimAction::mutate(move |state| {
                state.phase = ServerPhase::ExpectFinished;
                state.cipher_suite = Some(SIM_CIPHER_SUITE);
                state.transcript = transcript;
                state.client_handshake_secret = Some(client_hs);
            }),
            SimAction::WriteToTransport(flight.freeze()),
        ])
    }

    fn on_client_finished(
        &mut self,
        state: &ServerState,
        finished: &Frame,
    ) -> Result<Vec<SimAction>, DriverError> {
        let (Some(client_hs), Some(schedule)) =
            (state.client_handshake_secret.as_deref(), self.schedule.as_ref())
        else {
            return Err(Self::unexpected("finished", state));
        };
        state.transcript.verify_finished(client_hs, &finished.body)?;

        let mut transcript = state.transcript.clone();
        transcript.append_to_transcript(&finished.raw);
        self.resumption_master = Some(
            schedule.get_secret(MasterSecret::ResumptionMaster, &transcript.handshake_context())?,
        );
        let exporter = self.pending_exporter.take();

        debug!("client Finished verified");
        Ok(vec![
            SimAction::mutate(move |state| {
                state.phase = ServerPhase::Established;
                state.transcript = transcript;
                state.client_handshake_secret = None;
                state.exporter_master_secret = exporter;
            }),
            SimAction::ReportHandshakeSuccess,
        ])
    }

    fn on_app_write(&self, state: &ServerState, data: &[u8]) -> Result<Vec<SimAction>, DriverError> {
        if state.phase != ServerPhase::Established {
            return Err(Self::unexpected("app_write", state));
        }
        Ok(vec![SimAction::WriteToTransport(encode_frame(APPLICATION_DATA, data))])
    }

    fn on_app_close(&self, state: &ServerState) -> Vec<SimAction> {
        if state.phase == ServerPhase::Closed {
            return Vec::new();
        }
        vec![
            SimAction::WriteToTransport(encode_frame(CLOSE, &[])),
            SimAction::mutate(|state| state.phase = ServerPhase::Closed),
        ]
    }

    fn on_new_session_ticket(
        &mut self,
        state: &ServerState,
        ticket: WriteNewSessionTicket,
    ) -> Result<Vec<SimAction>, DriverError> {
        let (ServerPhase::Established, Some(schedule), Some(resumption_master)) =
            (state.phase, self.schedule.as_ref(), self.resumption_master.as_deref())
        else {
            return Err(Self::unexpected("write_new_session_ticket", state));
        };

        let nonce = self.tickets_issued.to_be_bytes().to_vec();
        let resumption_psk = schedule.resumption_secret(resumption_master, &nonce)?;
        self.tickets_issued += 1;

        let mut body = Vec::with_capacity(1 + nonce.len() + ticket.app_token.len());
        body.push(nonce.len() as u8);
        body.extend_from_slice(&nonce);
        body.extend_from_slice(&ticket.app_token);

        Ok(vec![
            SimAction::WriteToTransport(encode_frame(NEW_SESSION_TICKET, &body)),
            SimAction::TicketIssued(IssuedTicket {
                nonce,
                app_token: ticket.app_token,
                resumption_psk,
            }),
        ])
    }
}

impl fmt::Debug for ServerMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerMachine")
            .field("tickets_issued", &self.tickets_issued)
            .finish_non_exhaustive()
    }
}

fn frame_name(kind: u8) -> &'static str {
    match kind {
        CLIENT_HELLO => "client_hello",
        SERVER_HELLO => "server_hello",
        NEW_SESSION_TICKET => "new_session_ticket",
        FINISHED => "finished",
        CLOSE => "close",
        APPLICATION_DATA => "application_data",
        _ => "unknown_frame",
    }
}

impl StateMachine for ServerMachine {
    type State = ServerState;
    type Action = SimAction;

    fn process(
        &mut self,
        state: &ServerState,
        event: Event<'_>,
    ) -> Result<Processed<SimAction>, DriverError> {
        let actions = match event {
            Event::TransportData(buf) => {
                let Some(frame) = read_frame(buf) else {
                    return Ok(Processed::NeedMoreData);
                };
                self.on_frame(state, frame)?
            },
            Event::AppWrite(write) => self.on_app_write(state, &write.data)?,
            Event::EarlyAppWrite(write) => vec![SimAction::ReportEarlyWriteFailed(write.data)],
            Event::AppClose(_) => self.on_app_close(state),
            Event::WriteNewSessionTicket(ticket) => self.on_new_session_ticket(state, ticket)?,
        };
        Ok(Processed::Actions(actions))
    }
}

/// Visitor for the server connection. Applies state updates and collects
/// everything observable.
pub struct ConnectionVisitor {
    state: Rc<RefCell<ServerState>>,
    outbound: BytesMut,
    /// Application data delivered, in order
    pub delivered: Vec<Bytes>,
    /// Handshake completed
    pub handshake_complete: bool,
    /// Peer closed
    pub end_of_data: bool,
    /// Tickets issued
    pub tickets: Vec<IssuedTicket>,
    /// Early writes handed back
    pub early_write_failures: Vec<Vec<u8>>,
    /// Errors passed to `report_error`
    pub errors: Vec<DriverError>,
    /// Events failed out when the driver errored
    pub failed_events: Vec<PendingEvent>,
}

impl ConnectionVisitor {
    /// Visitor applying updates to `state`.
    pub fn new(state: Rc<RefCell<ServerState>>) -> Self {
        Self {
            state,
            outbound: BytesMut::new(),
            delivered: Vec::new(),
            handshake_complete: false,
            end_of_data: false,
            tickets: Vec::new(),
            early_write_failures: Vec::new(),
            errors: Vec::new(),
            failed_events: Vec::new(),
        }
    }

    /// Drain bytes written to the transport.
    pub fn take_outbound(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }
}

impl fmt::Debug for ConnectionVisitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionVisitor")
            .field("outbound", &self.outbound.len())
            .field("handshake_complete", &self.handshake_complete)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl ActionVisitor<SimAction> for ConnectionVisitor {
    fn visit(&mut self, action: SimAction, cx: &mut DriverContext<'_>) -> Result<(), DriverError> {
        match action {
            SimAction::WriteToTransport(data) => self.outbound.extend_from_slice(&data),
            SimAction::DeliverAppData(data) => self.delivered.push(data),
            SimAction::ReportHandshakeSuccess => self.handshake_complete = true,
            SimAction::ReportEarlyWriteFailed(data) => self.early_write_failures.push(data),
            SimAction::TicketIssued(ticket) => self.tickets.push(ticket),
            SimAction::EndOfData => {
                self.end_of_data = true;
                cx.wait_for_data();
            },
            SimAction::MutateState(update) => {
                let mut state = self
                    .state
                    .try_borrow_mut()
                    .map_err(|_| DriverError::StateBusy { what: "server state" })?;
                update.apply(&mut state);
            },
        }
        Ok(())
    }

    fn report_error(&mut self, error: &DriverError) {
        self.errors.push(error.clone());
    }

    fn pending_event_failed(&mut self, event: PendingEvent, _error: &DriverError) {
        self.failed_events.push(event);
    }
}

/// Server connection: driver, machine and visitor wired together.
#[derive(Debug)]
pub struct SimServer {
    driver: Driver<ServerMachine, ConnectionVisitor>,
}

impl SimServer {
    /// Server with default driver configuration.
    pub fn new(rng: SimRng) -> Self {
        Self::with_owner(rng, DelayedDestruction::detached())
    }

    /// Server whose driver guards `owner`.
    pub fn with_owner(rng: SimRng, owner: DelayedDestruction) -> Self {
        let state = Rc::new(RefCell::new(ServerState::new()));
        let visitor = ConnectionVisitor::new(Rc::clone(&state));
        let driver = Driver::with_config(
            ServerMachine::new(rng),
            state,
            TransportReadBuffer::shared(),
            visitor,
            owner,
            DriverConfig::default(),
        );
        Self { driver }
    }

    /// Bytes arrived from the client.
    pub fn receive(&mut self, data: &[u8]) {
        self.driver.transport_read_buf().borrow_mut().append(data);
        self.driver.new_transport_data();
    }

    /// Bytes the server wrote since the last call.
    pub fn take_outbound(&mut self) -> Bytes {
        self.driver.visitor_mut().take_outbound()
    }

    /// Current handshake phase.
    pub fn phase(&self) -> Option<ServerPhase> {
        self.driver.state().try_borrow().ok().map(|state| state.phase)
    }

    /// The driver.
    pub fn driver(&self) -> &Driver<ServerMachine, ConnectionVisitor> {
        &self.driver
    }

    /// The driver, mutably.
    pub fn driver_mut(&mut self) -> &mut Driver<ServerMachine, ConnectionVisitor> {
        &mut self.driver
    }
}

/// Client side of the simulated handshake. Computes everything directly,
/// without a driver.
pub struct SimClient {
    rng: SimRng,
    key_share: [u8; KEY_SHARE_LEN],
    transcript: Transcript<Sha256>,
    schedule: Option<KeySchedule>,
    exporter_master_secret: Option<Zeroizing<Vec<u8>>>,
    resumption_master: Option<Zeroizing<Vec<u8>>>,
}

impl SimClient {
    /// Client drawing its random and key share from `rng`.
    pub fn new(rng: SimRng) -> Self {
        let key_share = rng.random_array();
        Self {
            rng,
            key_share,
            transcript: Transcript::new(),
            schedule: None,
            exporter_master_secret: None,
            resumption_master: None,
        }
    }

    /// Encode ClientHello and add it to the transcript.
    pub fn client_hello(&mut self) -> Bytes {
        let mut body = Vec::with_capacity(RANDOM_LEN + KEY_SHARE_LEN);
        body.extend_from_slice(&self.rng.random_array::<RANDOM_LEN>());
        body.extend_from_slice(&self.key_share);
        let frame = encode_frame(CLIENT_HELLO, &body);
        self.transcript.append_to_transcript(&frame);
        frame
    }

    /// Process ServerHello and the server Finished. Returns the client
    /// Finished frame.
    pub fn handle_server_flight(&mut self, flight: &[u8]) -> Result<Bytes, DriverError> {
        let frames = split_frames(flight)?;
        let [server_hello, server_finished] = frames.as_slice() else {
            return Err(malformed("server flight"));
        };
        if server_hello.kind != SERVER_HELLO
            || server_hello.body.len() != RANDOM_LEN + KEY_SHARE_LEN + 2
        {
            return Err(malformed("ServerHello"));
        }
        if server_finished.kind != FINISHED {
            return Err(malformed("server Finished"));
        }
        let server_share = &server_hello.body[RANDOM_LEN..RANDOM_LEN + KEY_SHARE_LEN];
        self.transcript.append_to_transcript(&server_hello.raw);

        let mut schedule = KeySchedule::new(HashAlgorithm::Sha256, None);
        schedule.derive_handshake_secret(&shared_secret(&self.key_share, server_share))?;
        let hello_hash = self.transcript.handshake_context();
        let client_hs = schedule.get_secret(HandshakeSecret::ClientHandshakeTraffic, &hello_hash)?;
        let server_hs = schedule.get_secret(HandshakeSecret::ServerHandshakeTraffic, &hello_hash)?;

        self.transcript.verify_finished(&server_hs, &server_finished.body)?;
        self.transcript.append_to_transcript(&server_finished.raw);

        schedule.derive_master_secret()?;
        self.exporter_master_secret = Some(
            schedule
                .get_secret(MasterSecret::ExporterMaster, &self.transcript.handshake_context())?,
        );

        let finished = encode_frame(FINISHED, &self.transcript.finished_data(&client_hs)?);
        self.transcript.append_to_transcript(&finished);
        self.resumption_master = Some(
            schedule
                .get_secret(MasterSecret::ResumptionMaster, &self.transcript.handshake_context())?,
        );
        self.schedule = Some(schedule);
        Ok(finished)
    }

    /// Exporter master secret, once the server flight has been processed.
    pub fn exporter_master_secret(&self) -> Option<&[u8]> {
        self.exporter_master_secret.as_deref().map(Vec::as_slice)
    }

    /// Exported keying material on the client side.
    pub fn get_ekm(&self, label: &str, context: &[u8], length: usize) -> Result<Vec<u8>, DriverError> {
        let secret = self.exporter_master_secret().ok_or(DriverError::ExporterUnavailable)?;
        let deriver = make_key_deriver(HashAlgorithm::Sha256);
        Ok(cinder_crypto::get_ekm(deriver.as_ref(), secret, label, context, length)?)
    }

    /// PSK for a ticket carrying `nonce`.
    pub fn resumption_psk(&self, nonce: &[u8]) -> Result<Zeroizing<Vec<u8>>, DriverError> {
        let (Some(schedule), Some(resumption_master)) =
            (self.schedule.as_ref(), self.resumption_master.as_deref())
        else {
            return Err(DriverError::ExporterUnavailable);
        };
        Ok(schedule.resumption_secret(resumption_master, nonce)?)
    }

    /// Application data frame.
    pub fn app_data(data: &[u8]) -> Bytes {
        encode_frame(APPLICATION_DATA, data)
    }

    /// Close frame.
    pub fn close() -> Bytes {
        encode_frame(CLOSE, &[])
    }
}

impl fmt::Debug for SimClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimClient")
            .field("complete", &self.exporter_master_secret.is_some())
            .finish_non_exhaustive()
    }
}

/// Run a full handshake between a fresh client and server seeded from
/// `seed`.
pub fn connected_pair(seed: u64) -> Result<(SimClient, SimServer), DriverError> {
    let rng = SimRng::with_seed(seed);
    let mut client = SimClient::new(rng.clone());
    let mut server = SimServer::new(rng);

    server.receive(&client.client_hello());
    let flight = server.take_outbound();
    let finished = client.handle_server_flight(&flight)?;
    server.receive(&finished);

    Ok((client, server))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_header_is_type_and_u24_length() {
        let frame = encode_frame(APPLICATION_DATA, b"abc");
        assert_eq!(&frame[..], &[23, 0, 0, 3, b'a', b'b', b'c']);
        assert_eq!(frame_len(&frame), Some(7));
        assert_eq!(frame_len(&frame[..3]), None);
    }

    #[test]
    fn read_frame_waits_for_whole_frame() {
        let frame = encode_frame(FINISHED, &[0xAA; 32]);
        let mut buf = TransportReadBuffer::new();
        buf.append(&frame[..10]);
        assert!(read_frame(&mut buf).is_none());
        assert_eq!(buf.len(), 10);

        buf.append(&frame[10..]);
        let decoded = read_frame(&mut buf).unwrap();
        assert_eq!(decoded.kind, FINISHED);
        assert_eq!(&decoded.body[..], &[0xAA; 32]);
        assert!(buf.is_empty());
    }

    #[test]
    fn split_frames_rejects_truncation() {
        let mut flight = encode_frame(SERVER_HELLO, &[0; 66]).to_vec();
        flight.extend_from_slice(&encode_frame(FINISHED, &[0; 32])[..5]);
        assert!(matches!(split_frames(&flight), Err(DriverError::ProtocolViolation { .. })));
    }

    #[test]
    fn handshake_completes() {
        let (client, server) = connected_pair(1).unwrap();
        assert_eq!(server.phase(), Some(ServerPhase::Established));
        assert!(server.driver().visitor().handshake_complete);
        assert_eq!(
            server.driver().state().borrow().exporter_master_secret(),
            client.exporter_master_secret()
        );
    }
}
