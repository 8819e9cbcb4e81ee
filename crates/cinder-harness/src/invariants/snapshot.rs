//! Observable driver state at one point in time.

use cinder_core::DriverPhase;

use crate::{scripted::ScriptedHarness, trace::TraceEntry};

/// Trace plus driver observers, captured together.
#[derive(Debug, Clone)]
pub struct DriverSnapshot {
    /// Everything recorded so far.
    pub entries: Vec<TraceEntry>,
    /// Driver phase.
    pub phase: DriverPhase,
    /// `in_error_state()`.
    pub in_error_state: bool,
    /// `pending_events()`.
    pub pending_events: usize,
}

impl DriverSnapshot {
    /// Snapshot of an idle driver that has done nothing.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            phase: DriverPhase::Idle,
            in_error_state: false,
            pending_events: 0,
        }
    }

    /// Capture a scripted harness.
    pub fn capture(harness: &ScriptedHarness) -> Self {
        Self {
            entries: harness.trace.entries(),
            phase: harness.driver.phase(),
            in_error_state: harness.driver.in_error_state(),
            pending_events: harness.driver.pending_events(),
        }
    }
}
