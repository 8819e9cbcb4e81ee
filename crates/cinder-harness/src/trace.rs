//! Shared log of what the driver did, in the order it happened.
//!
//! The scripted machine and visitor both write to one [`Trace`], so tests can
//! assert on the interleaving of `process` calls and action dispatch.

use std::{cell::RefCell, rc::Rc};

use cinder_core::{DriverError, PendingEvent};

/// One observed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEntry {
    /// State machine entered with an event.
    ProcessBegin {
        /// Event name
        event: &'static str,
        /// Event payload (write data, or the consumed transport message)
        data: Vec<u8>,
    },
    /// State machine returned.
    ProcessEnd,
    /// State machine asked for more transport data.
    NeedMoreData,
    /// Visitor entered with an action.
    VisitBegin {
        /// Action label
        action: String,
    },
    /// Visitor returned.
    VisitEnd,
    /// `report_error` was called.
    ErrorReported(DriverError),
    /// A queued event was failed out.
    EventFailed(PendingEvent),
    /// The owner's teardown ran.
    Teardown,
}

/// Cloneable handle to a shared trace.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    entries: Rc<RefCell<Vec<TraceEntry>>>,
}

impl Trace {
    /// Empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&self, entry: TraceEntry) {
        self.entries.borrow_mut().push(entry);
    }

    /// Copy of every entry so far.
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.borrow().clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Payloads the state machine was entered with, in order.
    pub fn processed(&self) -> Vec<Vec<u8>> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                TraceEntry::ProcessBegin { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Labels of dispatched actions, in order.
    pub fn visited(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                TraceEntry::VisitBegin { action } => Some(action.clone()),
                _ => None,
            })
            .collect()
    }

    /// Errors passed to `report_error`.
    pub fn errors(&self) -> Vec<DriverError> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                TraceEntry::ErrorReported(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    /// Events failed out by the error path.
    pub fn failed_events(&self) -> Vec<PendingEvent> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                TraceEntry::EventFailed(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Index of the first entry matching `pred`.
    pub fn position(&self, pred: impl Fn(&TraceEntry) -> bool) -> Option<usize> {
        self.entries.borrow().iter().position(pred)
    }
}
