//! Properties of a driver run that hold after every public call.
//!
//! Checks read a [`DriverSnapshot`] (the recorded trace plus the driver's
//! observable flags) rather than the driver itself, so a failing run can be
//! reported with the full history that led to it.
//!
//! ```ignore
//! harness.driver.app_write(b"hi".to_vec());
//! InvariantRegistry::standard()
//!     .assert_all(&DriverSnapshot::capture(&harness), "after app_write");
//! ```

mod checks;
mod snapshot;

pub use checks::{ErrorReportedOnce, NoReentrantProcessing, NoWorkAfterError, QueueDrained};
pub use snapshot::DriverSnapshot;

/// Outcome of a single check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{invariant}: {message}")]
pub struct Violation {
    /// Which check failed.
    pub invariant: &'static str,
    /// Where in the trace, and what was seen.
    pub message: String,
}

/// A property checked against a driver snapshot.
pub trait Invariant {
    /// Stable name, used in violation reports.
    fn name(&self) -> &'static str;

    /// Check the snapshot.
    fn check(&self, snapshot: &DriverSnapshot) -> InvariantResult;
}

/// Set of checks run together.
#[derive(Default)]
pub struct InvariantRegistry {
    checks: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Every driver invariant:
    /// - [`NoReentrantProcessing`]: the machine never runs inside dispatch
    /// - [`ErrorReportedOnce`]: `report_error` at most once, and exactly once
    ///   in the error state
    /// - [`NoWorkAfterError`]: nothing is processed after the error report
    /// - [`QueueDrained`]: no event is left queued between calls
    pub fn standard() -> Self {
        Self::default()
            .with(NoReentrantProcessing)
            .with(ErrorReportedOnce)
            .with(NoWorkAfterError)
            .with(QueueDrained)
    }

    /// Builder form of [`add`](Self::add).
    #[must_use]
    pub fn with(mut self, invariant: impl Invariant + 'static) -> Self {
        self.add(invariant);
        self
    }

    /// Register another check.
    pub fn add(&mut self, invariant: impl Invariant + 'static) {
        self.checks.push(Box::new(invariant));
    }

    /// Run every check. All violations are returned, not just the first.
    pub fn check_all(&self, snapshot: &DriverSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> =
            self.checks.iter().filter_map(|check| check.check(snapshot).err()).collect();
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every check and panic with the full list of violations.
    #[allow(clippy::panic, reason = "assertion helper for tests")]
    pub fn assert_all(&self, snapshot: &DriverSnapshot, context: &str) {
        let Err(violations) = self.check_all(snapshot) else {
            return;
        };
        let report = violations.iter().fold(String::new(), |mut report, violation| {
            report.push_str("\n  ");
            report.push_str(&violation.to_string());
            report
        });
        panic!("{} invariant(s) violated {context}:{report}", violations.len());
    }

    /// Number of checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
