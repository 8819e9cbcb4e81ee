//! Deterministic test harness for the cinder handshake driver.
//!
//! Two ways to drive a [`cinder_core::Driver`] in tests:
//!
//! - [`scripted`]: a state machine whose reactions are a closure and a
//!   visitor that performs them, both recording into a shared [`Trace`].
//!   Used to pin ordering, reentrancy, error latching and teardown.
//! - [`handshake`]: a small ClientHello/ServerHello/Finished exchange over the
//!   real transcript and key schedule, for end-to-end checks such as
//!   exported keying material.
//!
//! # Model-Based Testing
//!
//! [`DriverOp`]s are generated randomly and applied to a scripted harness
//! built with [`chaos_responder`]. After every operation the
//! [`InvariantRegistry`] checks the trace.
//!
//! Randomness comes from a seeded [`SimRng`], so every run replays exactly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod handshake;
pub mod invariants;
pub mod operation;
pub mod scripted;
pub mod sim_rng;
pub mod trace;

pub use handshake::{
    ConnectionVisitor, IssuedTicket, ServerMachine, ServerPhase, ServerState, SimAction,
    SimClient, SimServer, connected_pair,
};
pub use invariants::{
    DriverSnapshot, ErrorReportedOnce, Invariant, InvariantRegistry, InvariantResult,
    NoReentrantProcessing, NoWorkAfterError, QueueDrained, Violation,
};
pub use operation::{DriverOp, SmallPayload, chaos_responder};
pub use scripted::{
    Input, RecordingVisitor, ScriptState, ScriptedDriver, ScriptedHarness, ScriptedMachine, Step,
};
pub use sim_rng::SimRng;
pub use trace::{Trace, TraceEntry};
