//! Seams between the driver and the pluggable protocol logic.
//!
//! The driver knows nothing about the TLS transition table. It feeds events
//! to a [`StateMachine`] together with an immutable view of the handshake
//! state, and routes the returned actions to an [`ActionVisitor`]. Actions
//! are the only way state changes: the visitor applies them.
//!
//! ```text
//!   event ──► StateMachine::process(&state, event) ──► Vec<Action>
//!                                                          │
//!                       ActionVisitor::visit(action, cx) ◄─┘
//!                                  │
//!                      cx.app_write(..)  (queued, never reentrant)
//! ```

use cinder_crypto::CipherSuite;

use crate::{
    driver::DriverContext,
    error::DriverError,
    event::{Event, PendingEvent},
};

/// Outcome of feeding one event to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed<A> {
    /// Completed actions, to be dispatched in order.
    Actions(Vec<A>),
    /// Not enough transport data buffered to make progress.
    NeedMoreData,
}

impl<A> Processed<A> {
    /// Batch with no actions.
    pub fn empty() -> Self {
        Self::Actions(Vec::new())
    }
}

impl<A> From<Vec<A>> for Processed<A> {
    fn from(actions: Vec<A>) -> Self {
        Self::Actions(actions)
    }
}

/// What the driver needs to read from the handshake state.
pub trait HandshakeState {
    /// Negotiated cipher suite, once known.
    fn cipher_suite(&self) -> Option<CipherSuite>;

    /// Exporter master secret. `None` until the handshake has completed.
    fn exporter_master_secret(&self) -> Option<&[u8]>;
}

/// Pluggable protocol transition logic.
///
/// `process` sees the state by shared reference only. It may keep private
/// bookkeeping in `self`, but any change to the handshake state must be
/// expressed as an action.
pub trait StateMachine {
    /// Handshake state the machine reads.
    type State: HandshakeState;
    /// Actions the machine emits.
    type Action;

    /// Consume one event. For [`Event::TransportData`] the machine consumes
    /// whole messages from the front of the buffer and leaves the rest.
    fn process(
        &mut self,
        state: &Self::State,
        event: Event<'_>,
    ) -> Result<Processed<Self::Action>, DriverError>;
}

/// Output sink for actions.
pub trait ActionVisitor<A> {
    /// Apply one action. Returning an error moves the driver into its error
    /// state and drops the rest of the batch.
    ///
    /// `cx` accepts new events and error requests. They are queued behind the
    /// current batch; the state machine is never re-entered from here. An
    /// error requested through `cx` does not cut the batch short: the
    /// remaining actions are still visited before the driver fails.
    fn visit(&mut self, action: A, cx: &mut DriverContext<'_>) -> Result<(), DriverError>;

    /// Called exactly once, when the driver first enters its error state.
    fn report_error(&mut self, error: &DriverError);

    /// Called for each event still queued when the driver enters its error
    /// state, in queue order.
    fn pending_event_failed(&mut self, event: PendingEvent, error: &DriverError) {
        let _ = (event, error);
    }
}
