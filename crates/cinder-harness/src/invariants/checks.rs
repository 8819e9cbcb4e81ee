//! Standard driver invariants.

use cinder_core::DriverPhase;

use super::{DriverSnapshot, Invariant, InvariantResult, Violation};
use crate::trace::TraceEntry;

/// The state machine is never entered while another `process` call or an
/// action dispatch is in progress.
pub struct NoReentrantProcessing;

impl Invariant for NoReentrantProcessing {
    fn name(&self) -> &'static str {
        "no_reentrant_processing"
    }

    fn check(&self, snapshot: &DriverSnapshot) -> InvariantResult {
        let mut in_process = false;
        let mut in_visit = false;
        for (index, entry) in snapshot.entries.iter().enumerate() {
            match entry {
                TraceEntry::ProcessBegin { event, .. } => {
                    if in_process || in_visit {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!("entry {index}: {event} processed re-entrantly"),
                        });
                    }
                    in_process = true;
                },
                TraceEntry::ProcessEnd => in_process = false,
                TraceEntry::VisitBegin { action } => {
                    if in_process {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!("entry {index}: {action} dispatched inside process"),
                        });
                    }
                    in_visit = true;
                },
                TraceEntry::VisitEnd => in_visit = false,
                _ => {},
            }
        }
        Ok(())
    }
}

/// `report_error` is called at most once, and exactly once if the driver is
/// in its error state.
pub struct ErrorReportedOnce;

impl Invariant for ErrorReportedOnce {
    fn name(&self) -> &'static str {
        "error_reported_once"
    }

    fn check(&self, snapshot: &DriverSnapshot) -> InvariantResult {
        let reports = snapshot
            .entries
            .iter()
            .filter(|entry| matches!(entry, TraceEntry::ErrorReported(_)))
            .count();

        let expected = usize::from(snapshot.phase == DriverPhase::Error);
        if reports != expected {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "{reports} error reports in phase {:?} (in_error_state={})",
                    snapshot.phase, snapshot.in_error_state
                ),
            });
        }
        Ok(())
    }
}

/// Once the error is reported, nothing else is processed or dispatched.
pub struct NoWorkAfterError;

impl Invariant for NoWorkAfterError {
    fn name(&self) -> &'static str {
        "no_work_after_error"
    }

    fn check(&self, snapshot: &DriverSnapshot) -> InvariantResult {
        let Some(reported) = snapshot
            .entries
            .iter()
            .position(|entry| matches!(entry, TraceEntry::ErrorReported(_)))
        else {
            return Ok(());
        };

        let late = snapshot.entries[reported..].iter().position(|entry| {
            matches!(entry, TraceEntry::ProcessBegin { .. } | TraceEntry::VisitBegin { .. })
        });
        match late {
            Some(offset) => Err(Violation {
                invariant: self.name(),
                message: format!(
                    "entry {}: {:?} after error report",
                    reported + offset,
                    snapshot.entries[reported + offset]
                ),
            }),
            None => Ok(()),
        }
    }
}

/// Between public calls the driver is idle or errored, with nothing queued.
pub struct QueueDrained;

impl Invariant for QueueDrained {
    fn name(&self) -> &'static str {
        "queue_drained"
    }

    fn check(&self, snapshot: &DriverSnapshot) -> InvariantResult {
        if !matches!(snapshot.phase, DriverPhase::Idle | DriverPhase::Error) {
            return Err(Violation {
                invariant: self.name(),
                message: format!("driver left in phase {:?}", snapshot.phase),
            });
        }
        if snapshot.pending_events != 0 {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{} events left queued", snapshot.pending_events),
            });
        }
        Ok(())
    }
}
