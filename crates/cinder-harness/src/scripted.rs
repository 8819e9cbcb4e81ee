//! Instrumented stand-ins for the state machine and the action visitor.
//!
//! [`ScriptedMachine`] turns every event into [`Step`]s through a responder
//! closure. [`RecordingVisitor`] performs each step against the
//! [`DriverContext`], which is how tests drive reentrant submissions, errors
//! and owner teardown from inside dispatch. Both record into a shared
//! [`Trace`].
//!
//! Transport data is newline-framed: one `process` call consumes one line.

use std::{cell::RefCell, fmt, rc::Rc};

use cinder_core::{
    ActionVisitor, DelayedDestruction, Driver, DriverConfig, DriverContext, DriverError, Event,
    HandshakeState, PendingEvent, Processed, StateMachine, TransportReadBuffer,
    WriteNewSessionTicket,
};
use cinder_crypto::CipherSuite;

use crate::trace::{Trace, TraceEntry};

/// Action emitted by [`ScriptedMachine`] and performed by
/// [`RecordingVisitor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Record the payload and do nothing else.
    Emit(Vec<u8>),
    /// Submit an application write from inside dispatch.
    AppWrite(Vec<u8>),
    /// Submit a close from inside dispatch.
    AppClose,
    /// Submit a NewSessionTicket request from inside dispatch.
    WriteNewSessionTicket(Vec<u8>),
    /// Close the transport gate.
    WaitForData,
    /// Signal that transport data is available.
    NewTransportData,
    /// Request the error state through the context.
    Abort(String),
    /// Return this error from `visit`.
    Fail(DriverError),
    /// Request teardown of the owner.
    DestroyOwner,
    /// Install the exporter master secret.
    CompleteHandshake(Vec<u8>),
}

impl Step {
    /// Label recorded in the trace.
    pub fn label(&self) -> String {
        match self {
            Self::Emit(data) => format!("emit:{}", String::from_utf8_lossy(data)),
            Self::AppWrite(data) => format!("app_write:{}", String::from_utf8_lossy(data)),
            Self::AppClose => "app_close".to_string(),
            Self::WriteNewSessionTicket(_) => "write_new_session_ticket".to_string(),
            Self::WaitForData => "wait_for_data".to_string(),
            Self::NewTransportData => "new_transport_data".to_string(),
            Self::Abort(reason) => format!("abort:{reason}"),
            Self::Fail(_) => "fail".to_string(),
            Self::DestroyOwner => "destroy_owner".to_string(),
            Self::CompleteHandshake(_) => "complete_handshake".to_string(),
        }
    }
}

/// State read by the scripted machine. Only [`Step::CompleteHandshake`]
/// changes it.
#[derive(Debug, Default)]
pub struct ScriptState {
    /// Negotiated suite
    pub cipher_suite: Option<CipherSuite>,
    /// Exporter master secret, once installed
    pub exporter_master_secret: Option<Vec<u8>>,
}

impl HandshakeState for ScriptState {
    fn cipher_suite(&self) -> Option<CipherSuite> {
        self.cipher_suite
    }

    fn exporter_master_secret(&self) -> Option<&[u8]> {
        self.exporter_master_secret.as_deref()
    }
}

/// Event as seen by a responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Event name
    pub kind: &'static str,
    /// Write data, ticket token, or one transport line without its newline
    pub data: Vec<u8>,
}

type Responder = Box<dyn FnMut(&Input) -> Result<Vec<Step>, DriverError>>;

/// State machine whose transitions are a closure.
pub struct ScriptedMachine {
    trace: Trace,
    responder: Responder,
    in_dispatch: Rc<RefCell<bool>>,
}

impl ScriptedMachine {
    /// Machine driven by `responder`.
    pub fn new(
        trace: Trace,
        responder: impl FnMut(&Input) -> Result<Vec<Step>, DriverError> + 'static,
    ) -> Self {
        Self { trace, responder: Box::new(responder), in_dispatch: Rc::default() }
    }

    /// Machine that answers every event with one [`Step::Emit`] of its
    /// payload.
    pub fn echo(trace: Trace) -> Self {
        Self::new(trace, |input| Ok(vec![Step::Emit(input.data.clone())]))
    }

    /// Flag the visitor sets while an action is dispatched. Shared with
    /// [`RecordingVisitor::new`].
    pub fn dispatch_flag(&self) -> Rc<RefCell<bool>> {
        Rc::clone(&self.in_dispatch)
    }

    fn next_line(buf: &mut TransportReadBuffer) -> Option<Vec<u8>> {
        let end = buf.peek().iter().position(|byte| *byte == b'\n')?;
        let line = buf.take(end + 1)?;
        Some(line[..end].to_vec())
    }
}

impl fmt::Debug for ScriptedMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedMachine").finish_non_exhaustive()
    }
}

impl StateMachine for ScriptedMachine {
    type State = ScriptState;
    type Action = Step;

    fn process(
        &mut self,
        _state: &ScriptState,
        event: Event<'_>,
    ) -> Result<Processed<Step>, DriverError> {
        assert!(!*self.in_dispatch.borrow(), "state machine entered during action dispatch");

        let input = match event {
            Event::TransportData(buf) => match Self::next_line(buf) {
                Some(line) => Input { kind: "transport_data", data: line },
                None => {
                    self.trace.record(TraceEntry::NeedMoreData);
                    return Ok(Processed::NeedMoreData);
                },
            },
            Event::AppWrite(write) => Input { kind: "app_write", data: write.data },
            Event::EarlyAppWrite(write) => Input { kind: "early_app_write", data: write.data },
            Event::AppClose(_) => Input { kind: "app_close", data: Vec::new() },
            Event::WriteNewSessionTicket(ticket) => {
                Input { kind: "write_new_session_ticket", data: ticket.app_token }
            },
        };

        self.trace.record(TraceEntry::ProcessBegin { event: input.kind, data: input.data.clone() });
        let result = (self.responder)(&input);
        self.trace.record(TraceEntry::ProcessEnd);
        result.map(Processed::Actions)
    }
}

/// Visitor that performs [`Step`]s and records everything.
pub struct RecordingVisitor {
    trace: Trace,
    state: Rc<RefCell<ScriptState>>,
    owner: DelayedDestruction,
    in_dispatch: Rc<RefCell<bool>>,
    emitted: Vec<Vec<u8>>,
}

impl RecordingVisitor {
    /// Visitor sharing `trace`, `state` and `owner` with the driver.
    pub fn new(
        trace: Trace,
        state: Rc<RefCell<ScriptState>>,
        owner: DelayedDestruction,
        in_dispatch: Rc<RefCell<bool>>,
    ) -> Self {
        Self { trace, state, owner, in_dispatch, emitted: Vec::new() }
    }

    /// Payloads of every [`Step::Emit`], in dispatch order.
    pub fn emitted(&self) -> &[Vec<u8>] {
        &self.emitted
    }

    fn perform(&mut self, step: Step, cx: &mut DriverContext<'_>) -> Result<(), DriverError> {
        match step {
            Step::Emit(data) => self.emitted.push(data),
            Step::AppWrite(data) => cx.app_write(data),
            Step::AppClose => cx.app_close(),
            Step::WriteNewSessionTicket(app_token) => {
                cx.write_new_session_ticket(WriteNewSessionTicket { app_token });
            },
            Step::WaitForData => cx.wait_for_data(),
            Step::NewTransportData => cx.new_transport_data(),
            Step::Abort(reason) => cx.move_to_error_state(reason),
            Step::Fail(error) => return Err(error),
            Step::DestroyOwner => {
                self.owner.destroy();
            },
            Step::CompleteHandshake(secret) => {
                let mut state = self
                    .state
                    .try_borrow_mut()
                    .map_err(|_| DriverError::StateBusy { what: "script state" })?;
                state.cipher_suite = Some(CipherSuite::TlsAes128GcmSha256);
                state.exporter_master_secret = Some(secret);
            },
        }
        Ok(())
    }
}

impl fmt::Debug for RecordingVisitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingVisitor").field("emitted", &self.emitted.len()).finish()
    }
}

impl ActionVisitor<Step> for RecordingVisitor {
    fn visit(&mut self, action: Step, cx: &mut DriverContext<'_>) -> Result<(), DriverError> {
        self.trace.record(TraceEntry::VisitBegin { action: action.label() });
        *self.in_dispatch.borrow_mut() = true;
        let result = self.perform(action, cx);
        *self.in_dispatch.borrow_mut() = false;
        self.trace.record(TraceEntry::VisitEnd);
        result
    }

    fn report_error(&mut self, error: &DriverError) {
        self.trace.record(TraceEntry::ErrorReported(error.clone()));
    }

    fn pending_event_failed(&mut self, event: PendingEvent, _error: &DriverError) {
        self.trace.record(TraceEntry::EventFailed(event));
    }
}

/// Driver over the scripted pair.
pub type ScriptedDriver = Driver<ScriptedMachine, RecordingVisitor>;

/// A scripted driver plus handles to everything it shares.
#[derive(Debug)]
pub struct ScriptedHarness {
    /// The driver under test
    pub driver: ScriptedDriver,
    /// Shared trace
    pub trace: Trace,
    /// Owner lifetime handle; teardown records [`TraceEntry::Teardown`]
    pub owner: DelayedDestruction,
}

impl ScriptedHarness {
    /// Harness with default configuration.
    pub fn new(
        responder: impl FnMut(&Input) -> Result<Vec<Step>, DriverError> + 'static,
    ) -> Self {
        Self::with_config(responder, DriverConfig::default())
    }

    /// Harness with echo responses.
    pub fn echo() -> Self {
        Self::new(|input| Ok(vec![Step::Emit(input.data.clone())]))
    }

    /// Harness with explicit configuration.
    pub fn with_config(
        responder: impl FnMut(&Input) -> Result<Vec<Step>, DriverError> + 'static,
        config: DriverConfig,
    ) -> Self {
        let trace = Trace::new();
        let teardown_trace = trace.clone();
        let owner =
            DelayedDestruction::new(move || teardown_trace.record(TraceEntry::Teardown));

        let machine = ScriptedMachine::new(trace.clone(), responder);
        let state = Rc::new(RefCell::new(ScriptState::default()));
        let visitor = RecordingVisitor::new(
            trace.clone(),
            Rc::clone(&state),
            owner.clone(),
            machine.dispatch_flag(),
        );
        let driver = Driver::with_config(
            machine,
            state,
            TransportReadBuffer::shared(),
            visitor,
            owner.clone(),
            config,
        );

        Self { driver, trace, owner }
    }

    /// Append bytes to the transport buffer without notifying the driver.
    pub fn buffer(&self, data: &[u8]) {
        self.driver.transport_read_buf().borrow_mut().append(data);
    }

    /// Append bytes and notify the driver.
    pub fn receive(&mut self, data: &[u8]) {
        self.buffer(data);
        self.driver.new_transport_data();
    }
}
