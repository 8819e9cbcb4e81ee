//! Asynchronous handshake driver.
//!
//! The driver serializes everything that can happen to a connection into one
//! FIFO and feeds it to the [`StateMachine`] one event at a time. Actions
//! returned by the machine are dispatched to the [`ActionVisitor`] in order.
//! Anything the visitor asks for while an action is being dispatched (another
//! write, a close, an error) goes through [`DriverContext`] and is queued
//! behind the current batch, so the machine never sees overlapping batches.
//!
//! # Phases
//!
//! ```text
//!            trigger             batch done, queue non-empty
//! ┌──────┐ ─────────> ┌────────────┐ ─────────> ┌──────────┐ ──┐
//! │ Idle │            │ Processing │            │ Draining │   │ next event
//! └──────┘ <───────── └────────────┘            └──────────┘ <─┘
//!    ^      queue empty      │                    │     │
//!    └───────────────────────┼────────────────────┘     │
//!                            │ failure                  │ failure
//!                            ↓                          ↓
//!                       ┌───────────────────────────────────┐
//!                       │ Error (absorbing)                 │
//!                       └───────────────────────────────────┘
//! ```
//!
//! A [`DestructorGuard`] on the owner is held for the whole pass, including
//! the drain. Teardown requested by the visitor mid-pass runs after the pass.

use std::{cell::RefCell, collections::VecDeque, fmt, mem, rc::Rc};

use cinder_crypto::make_key_deriver;
use tracing::{debug, trace, warn};

use crate::{
    error::DriverError,
    event::{AppClose, AppWrite, EarlyAppWrite, Event, PendingEvent, WriteNewSessionTicket},
    lifetime::{DelayedDestruction, DestructorGuard},
    machine::{ActionVisitor, HandshakeState, Processed, StateMachine},
    transport::SharedReadBuffer,
};

/// Default bound on queued events.
pub const DEFAULT_MAX_PENDING_EVENTS: usize = 1024;

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Bound on queued application events. Transport notifications do not
    /// count against it. Submitting past it is fatal.
    pub max_pending_events: usize,
    /// Initial transport gate. When true, buffered transport bytes are left
    /// alone until the first [`Driver::new_transport_data`].
    pub wait_for_data: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { max_pending_events: DEFAULT_MAX_PENDING_EVENTS, wait_for_data: true }
    }
}

/// Driver phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    /// Nothing in flight
    Idle,
    /// First batch of a pass is being processed
    Processing,
    /// Events queued during the pass are being processed
    Draining,
    /// Terminal. Every further event is dropped.
    Error,
}

#[derive(Debug)]
enum Queued {
    Event(PendingEvent),
    /// `new_transport_data` was called at this point in the FIFO.
    TransportData,
}

enum Work {
    Event(PendingEvent),
    TransportData,
}

/// Queue and flags shared between the driver loop and [`DriverContext`].
#[derive(Debug)]
struct Pending {
    queue: VecDeque<Queued>,
    limit: usize,
    wait_for_data: bool,
    /// First failure recorded while the visitor was running.
    requested_error: Option<DriverError>,
    /// Error state entered and reported.
    errored: bool,
}

impl Pending {
    fn new(config: &DriverConfig) -> Self {
        Self {
            queue: VecDeque::new(),
            limit: config.max_pending_events,
            wait_for_data: config.wait_for_data,
            requested_error: None,
            errored: false,
        }
    }

    fn in_error_state(&self) -> bool {
        self.errored || self.requested_error.is_some()
    }

    fn push(&mut self, event: PendingEvent) {
        if self.in_error_state() {
            trace!(event = event.name(), "dropping event in error state");
            return;
        }
        let depth = self.event_count();
        if depth >= self.limit {
            self.request_error(DriverError::QueueOverflow { limit: self.limit });
            return;
        }
        debug!(event = event.name(), depth = depth + 1, "queued event");
        self.queue.push_back(Queued::Event(event));
    }

    fn push_transport_data(&mut self) {
        if self.in_error_state() {
            trace!("dropping transport notification in error state");
            return;
        }
        self.wait_for_data = false;
        // Adjacent markers coalesce, so markers never outnumber events by
        // more than one and need no bound of their own.
        if matches!(self.queue.back(), Some(Queued::TransportData)) {
            return;
        }
        self.queue.push_back(Queued::TransportData);
    }

    fn request_error(&mut self, error: DriverError) {
        if self.in_error_state() {
            trace!(%error, "error already pending");
            return;
        }
        debug!(%error, "error requested");
        self.requested_error = Some(error);
    }

    fn event_count(&self) -> usize {
        self.queue.iter().filter(|queued| matches!(queued, Queued::Event(_))).count()
    }
}

/// Handle given to the visitor while an action is dispatched.
///
/// Everything submitted here is queued behind the current batch.
pub struct DriverContext<'a> {
    pending: &'a mut Pending,
}

impl DriverContext<'_> {
    /// Queue application data.
    pub fn app_write(&mut self, data: impl Into<Vec<u8>>) {
        self.pending.push(PendingEvent::AppWrite(AppWrite { data: data.into() }));
    }

    /// Queue 0-RTT application data.
    pub fn early_app_write(&mut self, data: impl Into<Vec<u8>>) {
        self.pending.push(PendingEvent::EarlyAppWrite(EarlyAppWrite { data: data.into() }));
    }

    /// Queue a close.
    pub fn app_close(&mut self) {
        self.pending.push(PendingEvent::AppClose(AppClose));
    }

    /// Queue a NewSessionTicket.
    pub fn write_new_session_ticket(&mut self, ticket: WriteNewSessionTicket) {
        self.pending.push(PendingEvent::WriteNewSessionTicket(ticket));
    }

    /// Stop consuming transport data until [`new_transport_data`](Self::new_transport_data).
    pub fn wait_for_data(&mut self) {
        if !self.pending.in_error_state() {
            self.pending.wait_for_data = true;
        }
    }

    /// Allow transport data to be consumed once the current batch is done.
    pub fn new_transport_data(&mut self) {
        self.pending.push_transport_data();
    }

    /// Abort the connection. The rest of the current batch is still
    /// dispatched. After that queued events are failed and nothing else is
    /// processed.
    pub fn move_to_error_state(&mut self, reason: impl Into<String>) {
        self.pending.request_error(DriverError::Aborted { reason: reason.into() });
    }

    /// Like [`move_to_error_state`](Self::move_to_error_state) with a
    /// specific error.
    pub fn fail(&mut self, error: DriverError) {
        self.pending.request_error(error);
    }

    /// True once an error has been requested or latched.
    pub fn in_error_state(&self) -> bool {
        self.pending.in_error_state()
    }

    /// Always true: a context only exists while an action is dispatched.
    pub fn action_processing(&self) -> bool {
        true
    }

    /// Events queued behind the current batch.
    pub fn pending_events(&self) -> usize {
        self.pending.event_count()
    }
}

/// Drives a [`StateMachine`] for one connection.
///
/// The handshake state and transport read buffer are owned by the connection
/// and shared with the driver. The driver only borrows the state immutably,
/// and only for the duration of a `process` call.
pub struct Driver<M: StateMachine, V> {
    machine: M,
    state: Rc<RefCell<M::State>>,
    transport_read_buf: SharedReadBuffer,
    visitor: V,
    owner: DelayedDestruction,
    pending: Pending,
    phase: DriverPhase,
}

impl<M, V> Driver<M, V>
where
    M: StateMachine,
    V: ActionVisitor<M::Action>,
{
    /// Driver with [`DriverConfig::default`].
    pub fn new(
        machine: M,
        state: Rc<RefCell<M::State>>,
        transport_read_buf: SharedReadBuffer,
        visitor: V,
        owner: DelayedDestruction,
    ) -> Self {
        Self::with_config(machine, state, transport_read_buf, visitor, owner, DriverConfig::default())
    }

    /// Driver with explicit configuration.
    pub fn with_config(
        machine: M,
        state: Rc<RefCell<M::State>>,
        transport_read_buf: SharedReadBuffer,
        visitor: V,
        owner: DelayedDestruction,
        config: DriverConfig,
    ) -> Self {
        Self {
            machine,
            state,
            transport_read_buf,
            visitor,
            owner,
            pending: Pending::new(&config),
            phase: DriverPhase::Idle,
        }
    }

    /// Send a NewSessionTicket.
    pub fn write_new_session_ticket(&mut self, ticket: WriteNewSessionTicket) {
        self.submit(PendingEvent::WriteNewSessionTicket(ticket));
    }

    /// Send application data.
    pub fn app_write(&mut self, data: impl Into<Vec<u8>>) {
        self.submit(PendingEvent::AppWrite(AppWrite { data: data.into() }));
    }

    /// Send 0-RTT application data.
    pub fn early_app_write(&mut self, data: impl Into<Vec<u8>>) {
        self.submit(PendingEvent::EarlyAppWrite(EarlyAppWrite { data: data.into() }));
    }

    /// Close the connection.
    pub fn app_close(&mut self) {
        self.submit(PendingEvent::AppClose(AppClose));
    }

    /// Stop consuming buffered transport data.
    pub fn wait_for_data(&mut self) {
        if self.in_error_state() {
            trace!("ignoring wait_for_data in error state");
            return;
        }
        self.pending.wait_for_data = true;
    }

    /// New bytes were appended to the transport read buffer. Lifts the
    /// transport gate and processes the buffer in FIFO order with queued
    /// events.
    pub fn new_transport_data(&mut self) {
        self.pending.push_transport_data();
        self.process_pending_events();
    }

    /// Abort the connection. The visitor is told once, queued events are
    /// failed, and every later event is dropped.
    pub fn move_to_error_state(&mut self, reason: impl Into<String>) {
        self.fail(DriverError::Aborted { reason: reason.into() });
    }

    /// True once the driver has entered its terminal error state.
    pub fn in_error_state(&self) -> bool {
        self.pending.in_error_state()
    }

    /// True while a batch is in flight.
    pub fn action_processing(&self) -> bool {
        matches!(self.phase, DriverPhase::Processing | DriverPhase::Draining)
    }

    /// Current phase.
    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    /// Number of queued application events.
    pub fn pending_events(&self) -> usize {
        self.pending.event_count()
    }

    /// Exported keying material (RFC 8446 §7.5) from the exporter master
    /// secret held by the handshake state.
    ///
    /// Fails with [`DriverError::ExporterUnavailable`] before the handshake
    /// has completed and with [`DriverError::Closed`] in the error state.
    pub fn get_ekm(
        &self,
        label: &str,
        context: &[u8],
        length: usize,
    ) -> Result<Vec<u8>, DriverError> {
        if self.in_error_state() {
            return Err(DriverError::Closed);
        }
        let state = self
            .state
            .try_borrow()
            .map_err(|_| DriverError::StateBusy { what: "handshake state" })?;
        let suite = state.cipher_suite().ok_or(DriverError::ExporterUnavailable)?;
        let exporter_master =
            state.exporter_master_secret().ok_or(DriverError::ExporterUnavailable)?;

        let deriver = make_key_deriver(suite.hash_algorithm());
        Ok(cinder_crypto::get_ekm(deriver.as_ref(), exporter_master, label, context, length)?)
    }

    /// Action visitor.
    pub fn visitor(&self) -> &V {
        &self.visitor
    }

    /// Action visitor, mutably.
    pub fn visitor_mut(&mut self) -> &mut V {
        &mut self.visitor
    }

    /// State machine.
    pub fn machine(&self) -> &M {
        &self.machine
    }

    /// Shared handshake state.
    pub fn state(&self) -> &Rc<RefCell<M::State>> {
        &self.state
    }

    /// Shared transport read buffer.
    pub fn transport_read_buf(&self) -> &SharedReadBuffer {
        &self.transport_read_buf
    }

    /// Lifetime handle of the owner.
    pub fn owner(&self) -> &DelayedDestruction {
        &self.owner
    }

    fn submit(&mut self, event: PendingEvent) {
        self.pending.push(event);
        self.process_pending_events();
    }

    /// Run one pass: process queued work until nothing is runnable or the
    /// driver fails.
    fn process_pending_events(&mut self) {
        if self.pending.errored {
            trace!("driver in error state, not processing");
            return;
        }
        if self.latch_requested_error() {
            return;
        }

        let guard: DestructorGuard = self.owner.guard();
        self.phase = DriverPhase::Processing;
        let mut batches = 0usize;

        while let Some(work) = self.next_work() {
            if batches > 0 {
                self.phase = DriverPhase::Draining;
            }
            batches += 1;

            let result = match work {
                Work::Event(event) => self.process_event(event),
                Work::TransportData => self.process_transport_data(),
            };
            if let Err(error) = result {
                self.fail(error);
                break;
            }
            if self.latch_requested_error() {
                break;
            }
        }

        if !self.pending.errored {
            self.phase = DriverPhase::Idle;
        }
        debug!(batches, phase = ?self.phase, "pass complete");
        drop(guard);
    }

    fn next_work(&mut self) -> Option<Work> {
        loop {
            match self.pending.queue.pop_front() {
                Some(Queued::Event(event)) => return Some(Work::Event(event)),
                Some(Queued::TransportData) => {
                    if self.transport_ready() {
                        return Some(Work::TransportData);
                    }
                    trace!("skipping transport notification, nothing to read");
                },
                None => return self.transport_ready().then_some(Work::TransportData),
            }
        }
    }

    fn transport_ready(&self) -> bool {
        !self.pending.wait_for_data
            && self.transport_read_buf.try_borrow().is_ok_and(|buf| !buf.is_empty())
    }

    fn process_event(&mut self, event: PendingEvent) -> Result<(), DriverError> {
        let name = event.name();
        let processed = {
            let state = self
                .state
                .try_borrow()
                .map_err(|_| DriverError::StateBusy { what: "handshake state" })?;
            self.machine.process(&state, Event::from(event))?
        };

        match processed {
            Processed::Actions(actions) => self.dispatch(name, actions),
            Processed::NeedMoreData => {
                trace!(event = name, "no actions");
                Ok(())
            },
        }
    }

    fn process_transport_data(&mut self) -> Result<(), DriverError> {
        let (processed, consumed, remaining) = {
            let state = self
                .state
                .try_borrow()
                .map_err(|_| DriverError::StateBusy { what: "handshake state" })?;
            let mut buf = self
                .transport_read_buf
                .try_borrow_mut()
                .map_err(|_| DriverError::StateBusy { what: "transport read buffer" })?;
            let before = buf.len();
            let processed = self.machine.process(&state, Event::TransportData(&mut *buf))?;
            (processed, before.saturating_sub(buf.len()), buf.len())
        };

        match processed {
            Processed::NeedMoreData => {
                debug!(remaining, "waiting for more transport data");
                self.pending.wait_for_data = true;
                Ok(())
            },
            Processed::Actions(actions) => {
                if consumed == 0 {
                    // No progress: consuming again would spin.
                    debug!(remaining, "transport data not consumed, waiting");
                    self.pending.wait_for_data = true;
                } else if remaining > 0
                    && !matches!(self.pending.queue.front(), Some(Queued::TransportData))
                {
                    // Keep draining what was buffered before later events.
                    self.pending.queue.push_front(Queued::TransportData);
                }
                self.dispatch("transport_data", actions)
            },
        }
    }

    fn dispatch(&mut self, source: &'static str, actions: Vec<M::Action>) -> Result<(), DriverError> {
        debug!(event = source, actions = actions.len(), "dispatching actions");
        let mut actions = actions.into_iter();
        while let Some(action) = actions.next() {
            let mut cx = DriverContext { pending: &mut self.pending };
            if let Err(error) = self.visitor.visit(action, &mut cx) {
                let dropped = actions.len();
                if dropped > 0 {
                    debug!(event = source, dropped, "visitor failed, dropping rest of batch");
                }
                return Err(error);
            }
        }
        // An error requested through `cx` lets the batch finish; the drain
        // stops once the loop latches it.
        Ok(())
    }

    /// Enter the error state with any error the visitor requested. Returns
    /// true if the driver is in the error state afterwards.
    fn latch_requested_error(&mut self) -> bool {
        if let Some(error) = self.pending.requested_error.take() {
            self.enter_error_state(error);
        }
        self.pending.errored
    }

    fn fail(&mut self, error: DriverError) {
        if self.pending.errored {
            trace!(%error, "suppressing error, already in error state");
            return;
        }
        // An error requested earlier in this pass wins.
        let error = match self.pending.requested_error.take() {
            Some(first) => {
                trace!(%error, "suppressing error, earlier error pending");
                first
            },
            None => error,
        };
        self.enter_error_state(error);
    }

    fn enter_error_state(&mut self, error: DriverError) {
        self.pending.errored = true;
        self.phase = DriverPhase::Error;
        warn!(%error, kind = ?error.kind(), "driver entering error state");
        self.visitor.report_error(&error);

        let queued = mem::take(&mut self.pending.queue);
        for entry in queued {
            if let Queued::Event(event) = entry {
                debug!(event = event.name(), "failing queued event");
                self.visitor.pending_event_failed(event, &error);
            }
        }
    }
}

impl<M: StateMachine, V> fmt::Debug for Driver<M, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("phase", &self.phase)
            .field("pending", &self.pending.queue.len())
            .field("wait_for_data", &self.pending.wait_for_data)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use cinder_crypto::CipherSuite;

    use super::*;
    use crate::transport::TransportReadBuffer;

    #[derive(Default)]
    struct EchoState {
        exporter: Option<Vec<u8>>,
    }

    impl HandshakeState for EchoState {
        fn cipher_suite(&self) -> Option<CipherSuite> {
            Some(CipherSuite::TlsAes128GcmSha256)
        }

        fn exporter_master_secret(&self) -> Option<&[u8]> {
            self.exporter.as_deref()
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Echo {
        Data(Vec<u8>),
        Byte(u8),
    }

    /// Echoes writes (one action per `|`-separated part), consumes transport
    /// data one byte per call, rejects closes.
    struct EchoMachine;

    impl StateMachine for EchoMachine {
        type State = EchoState;
        type Action = Echo;

        fn process(
            &mut self,
            _state: &EchoState,
            event: Event<'_>,
        ) -> Result<Processed<Echo>, DriverError> {
            match event {
                Event::AppWrite(write) => {
                    let parts: Vec<Echo> = write
                        .data
                        .split(|byte| *byte == b'|')
                        .map(|part| Echo::Data(part.to_vec()))
                        .collect();
                    Ok(parts.into())
                },
                Event::TransportData(buf) => match buf.take(1) {
                    Some(byte) => Ok(vec![Echo::Byte(byte[0])].into()),
                    None => Ok(Processed::NeedMoreData),
                },
                other => Err(DriverError::UnexpectedEvent {
                    event: other.name(),
                    state: "Echo".to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Vec<Echo>,
        errors: Vec<DriverError>,
        failed: Vec<PendingEvent>,
        processing_seen: Vec<bool>,
    }

    impl ActionVisitor<Echo> for Recorder {
        fn visit(&mut self, action: Echo, cx: &mut DriverContext<'_>) -> Result<(), DriverError> {
            self.processing_seen.push(cx.action_processing());
            if action == Echo::Data(b"again".to_vec()) {
                cx.app_write(b"queued".to_vec());
            }
            if action == Echo::Data(b"interleave".to_vec()) {
                for _ in 0..2 {
                    cx.new_transport_data();
                    cx.app_write(b"queued".to_vec());
                }
            }
            if action == Echo::Data(b"abort".to_vec()) {
                cx.move_to_error_state("visitor abort");
                cx.app_write(b"dropped".to_vec());
            }
            self.seen.push(action);
            Ok(())
        }

        fn report_error(&mut self, error: &DriverError) {
            self.errors.push(error.clone());
        }

        fn pending_event_failed(&mut self, event: PendingEvent, _error: &DriverError) {
            self.failed.push(event);
        }
    }

    fn driver() -> Driver<EchoMachine, Recorder> {
        Driver::new(
            EchoMachine,
            Rc::new(RefCell::new(EchoState::default())),
            TransportReadBuffer::shared(),
            Recorder::default(),
            DelayedDestruction::detached(),
        )
    }

    #[test]
    fn app_write_is_processed_immediately() {
        let mut driver = driver();
        driver.app_write(b"hi".to_vec());

        assert_eq!(driver.visitor().seen, vec![Echo::Data(b"hi".to_vec())]);
        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert!(!driver.action_processing());
        assert_eq!(driver.visitor().processing_seen, vec![true]);
    }

    #[test]
    fn reentrant_write_is_queued_behind_batch() {
        let mut driver = driver();
        driver.app_write(b"again".to_vec());

        assert_eq!(
            driver.visitor().seen,
            vec![Echo::Data(b"again".to_vec()), Echo::Data(b"queued".to_vec())]
        );
        assert_eq!(driver.pending_events(), 0);
    }

    #[test]
    fn transport_data_waits_for_notification() {
        let mut driver = driver();
        driver.transport_read_buf().borrow_mut().append(b"ab");
        driver.app_write(b"x".to_vec());
        assert_eq!(driver.visitor().seen, vec![Echo::Data(b"x".to_vec())]);

        driver.new_transport_data();
        assert_eq!(
            driver.visitor().seen,
            vec![Echo::Data(b"x".to_vec()), Echo::Byte(b'a'), Echo::Byte(b'b')]
        );
        assert!(driver.transport_read_buf().borrow().is_empty());
    }

    #[test]
    fn machine_error_is_reported_once_and_latches() {
        let mut driver = driver();
        driver.app_close();
        driver.app_close();
        driver.app_write(b"late".to_vec());

        assert!(driver.in_error_state());
        assert_eq!(driver.phase(), DriverPhase::Error);
        assert_eq!(driver.visitor().errors.len(), 1);
        assert!(driver.visitor().seen.is_empty());
    }

    #[test]
    fn visitor_abort_drops_later_requests() {
        let mut driver = driver();
        driver.app_write(b"abort".to_vec());

        assert_eq!(
            driver.visitor().errors,
            vec![DriverError::Aborted { reason: "visitor abort".to_string() }]
        );
        assert!(driver.visitor().failed.is_empty());
        assert_eq!(driver.visitor().seen, vec![Echo::Data(b"abort".to_vec())]);
    }

    #[test]
    fn visitor_abort_finishes_batch_then_fails_queue() {
        let mut driver = driver();
        driver.app_write(b"again|abort|alert".to_vec());

        assert_eq!(
            driver.visitor().seen,
            vec![
                Echo::Data(b"again".to_vec()),
                Echo::Data(b"abort".to_vec()),
                Echo::Data(b"alert".to_vec()),
            ]
        );
        assert_eq!(
            driver.visitor().errors,
            vec![DriverError::Aborted { reason: "visitor abort".to_string() }]
        );
        assert_eq!(
            driver.visitor().failed,
            vec![PendingEvent::AppWrite(AppWrite { data: b"queued".to_vec() })]
        );
        assert_eq!(driver.phase(), DriverPhase::Error);
    }

    #[test]
    fn explicit_error_fails_nothing_when_idle() {
        let mut driver = driver();
        driver.move_to_error_state("peer reset");
        driver.move_to_error_state("again");

        assert_eq!(driver.visitor().errors.len(), 1);
        assert_eq!(driver.get_ekm("EXPORTER-test", b"", 32), Err(DriverError::Closed));
    }

    #[test]
    fn get_ekm_requires_exporter_secret() {
        let driver = driver();
        assert_eq!(driver.get_ekm("EXPORTER-test", b"", 32), Err(DriverError::ExporterUnavailable));

        driver.state().borrow_mut().exporter = Some(vec![0x42; 32]);
        let ekm = driver.get_ekm("EXPORTER-test", b"ctx", 32).unwrap();
        let expected = cinder_crypto::get_ekm(
            make_key_deriver(cinder_crypto::HashAlgorithm::Sha256).as_ref(),
            &[0x42; 32],
            "EXPORTER-test",
            b"ctx",
            32,
        )
        .unwrap();
        assert_eq!(ekm, expected);
    }

    #[test]
    fn teardown_waits_for_pass() {
        let torn_down = Rc::new(Cell::new(false));
        let flag = Rc::clone(&torn_down);
        let owner = DelayedDestruction::new(move || flag.set(true));
        let guard = owner.guard();

        let mut driver = Driver::new(
            EchoMachine,
            Rc::new(RefCell::new(EchoState::default())),
            TransportReadBuffer::shared(),
            Recorder::default(),
            owner.clone(),
        );
        owner.destroy();
        driver.app_write(b"hi".to_vec());
        assert!(!torn_down.get());

        drop(guard);
        assert!(torn_down.get());
    }

    /// Returns an action for transport data without consuming any of it.
    struct Stubborn;

    impl StateMachine for Stubborn {
        type State = EchoState;
        type Action = Echo;

        fn process(
            &mut self,
            _state: &EchoState,
            event: Event<'_>,
        ) -> Result<Processed<Echo>, DriverError> {
            match event {
                Event::TransportData(buf) => Ok(vec![Echo::Byte(buf.peek()[0])].into()),
                _ => Ok(Processed::empty()),
            }
        }
    }

    #[test]
    fn transport_batch_without_progress_waits() {
        let mut driver = Driver::new(
            Stubborn,
            Rc::new(RefCell::new(EchoState::default())),
            TransportReadBuffer::shared(),
            Recorder::default(),
            DelayedDestruction::detached(),
        );
        driver.transport_read_buf().borrow_mut().append(b"z");
        driver.new_transport_data();

        assert_eq!(driver.visitor().seen, vec![Echo::Byte(b'z')]);
        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert_eq!(driver.transport_read_buf().borrow().len(), 1);
    }

    #[test]
    fn queue_overflow_is_fatal() {
        let mut driver = Driver::with_config(
            EchoMachine,
            Rc::new(RefCell::new(EchoState::default())),
            TransportReadBuffer::shared(),
            Recorder::default(),
            DelayedDestruction::detached(),
            DriverConfig { max_pending_events: 0, ..DriverConfig::default() },
        );
        driver.app_write(b"hi".to_vec());

        assert_eq!(driver.visitor().errors, vec![DriverError::QueueOverflow { limit: 0 }]);
        assert!(driver.visitor().seen.is_empty());
    }

    #[test]
    fn transport_notifications_do_not_count_against_queue_bound() {
        let mut driver = Driver::with_config(
            EchoMachine,
            Rc::new(RefCell::new(EchoState::default())),
            TransportReadBuffer::shared(),
            Recorder::default(),
            DelayedDestruction::detached(),
            DriverConfig { max_pending_events: 2, ..DriverConfig::default() },
        );
        driver.app_write(b"interleave".to_vec());

        assert!(driver.visitor().errors.is_empty());
        assert_eq!(
            driver.visitor().seen,
            vec![
                Echo::Data(b"interleave".to_vec()),
                Echo::Data(b"queued".to_vec()),
                Echo::Data(b"queued".to_vec()),
            ]
        );
        assert_eq!(driver.phase(), DriverPhase::Idle);
    }
}
