//! Operations for model-based and fuzz testing of the driver.
//!
//! Operations are generated randomly (by proptest strategies or from fuzzer
//! input via `arbitrary`) and applied to a [`ScriptedHarness`] built with
//! [`chaos_responder`]. The first byte of every payload decides how the
//! scripted machine reacts, so random payloads exercise reentrant writes,
//! aborts, visitor failures and teardown.

use arbitrary::Arbitrary;
use cinder_core::{DriverError, WriteNewSessionTicket};

use crate::scripted::{Input, ScriptedHarness, Step};

/// Payload marker: the machine fails.
pub const REACT_MACHINE_ERROR: u8 = 15;
/// Payload marker: the visitor requests the error state.
pub const REACT_ABORT: u8 = 14;
/// Payload marker: the visitor returns an error.
pub const REACT_VISITOR_ERROR: u8 = 13;
/// Payload marker: the visitor queues a follow-up write.
pub const REACT_REENTER: u8 = 12;
/// Payload marker: the visitor closes the transport gate.
pub const REACT_WAIT: u8 = 11;
/// Payload marker: the visitor requests owner teardown.
pub const REACT_DESTROY: u8 = 10;

/// Small deterministic payload.
///
/// Kept small so proptest shrinks well; the content is expanded from the
/// seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct SmallPayload {
    /// First byte; selects the machine's reaction modulo 16.
    pub seed: u8,
    /// Payload length (1..=16).
    pub len: u8,
}

impl SmallPayload {
    /// Expand to bytes.
    pub fn to_bytes(self) -> Vec<u8> {
        let len = usize::from(self.len % 16) + 1;
        (0..len).map(|i| self.seed.wrapping_add(i as u8)).collect()
    }
}

/// Public driver operations.
#[derive(Debug, Clone, Arbitrary)]
pub enum DriverOp {
    /// `app_write`
    AppWrite(SmallPayload),
    /// `early_app_write`
    EarlyAppWrite(SmallPayload),
    /// `app_close`
    AppClose,
    /// `write_new_session_ticket`
    WriteNewSessionTicket(SmallPayload),
    /// Buffer newline-terminated lines, then `new_transport_data`
    Receive(Vec<SmallPayload>),
    /// Buffer a line without notifying the driver
    Buffer(SmallPayload),
    /// `wait_for_data`
    WaitForData,
    /// `move_to_error_state`
    MoveToErrorState,
}

impl DriverOp {
    /// Apply to the harness through the driver's public API.
    pub fn apply(&self, harness: &mut ScriptedHarness) {
        match self {
            Self::AppWrite(payload) => harness.driver.app_write(payload.to_bytes()),
            Self::EarlyAppWrite(payload) => harness.driver.early_app_write(payload.to_bytes()),
            Self::AppClose => harness.driver.app_close(),
            Self::WriteNewSessionTicket(payload) => harness
                .driver
                .write_new_session_ticket(WriteNewSessionTicket { app_token: payload.to_bytes() }),
            Self::Receive(lines) => {
                let mut data = Vec::new();
                for line in lines {
                    data.extend(line.to_bytes().into_iter().filter(|byte| *byte != b'\n'));
                    data.push(b'\n');
                }
                harness.receive(&data);
            },
            Self::Buffer(line) => {
                let mut data: Vec<u8> =
                    line.to_bytes().into_iter().filter(|byte| *byte != b'\n').collect();
                data.push(b'\n');
                harness.buffer(&data);
            },
            Self::WaitForData => harness.driver.wait_for_data(),
            Self::MoveToErrorState => harness.driver.move_to_error_state("operation"),
        }
    }
}

/// Responder that reacts to the first payload byte (see the `REACT_*`
/// markers). Follow-up writes start with 0, so reentrancy is bounded.
pub fn chaos_responder(input: &Input) -> Result<Vec<Step>, DriverError> {
    let emit = Step::Emit(input.data.clone());
    let Some(first) = input.data.first() else {
        return Ok(vec![emit]);
    };

    let steps = match first % 16 {
        REACT_MACHINE_ERROR => {
            return Err(DriverError::ProtocolViolation {
                reason: format!("{} rejected", input.kind),
            });
        },
        REACT_ABORT => vec![emit, Step::Abort("scripted abort".to_string())],
        REACT_VISITOR_ERROR => vec![
            Step::Fail(DriverError::Aborted { reason: "visitor failure".to_string() }),
            emit,
        ],
        REACT_REENTER => vec![emit, Step::AppWrite(vec![0, *first])],
        REACT_WAIT => vec![emit, Step::WaitForData],
        REACT_DESTROY => vec![Step::DestroyOwner, emit],
        _ => vec![emit],
    };
    Ok(steps)
}
