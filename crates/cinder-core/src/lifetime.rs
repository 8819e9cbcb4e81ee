//! Deferred teardown of the object that owns a driver.
//!
//! Dispatching an action runs arbitrary visitor code, and that code may ask
//! for the owning connection to be torn down. Teardown requested while a
//! [`DestructorGuard`] is alive is deferred until the last guard is dropped.
//! It is never refused.
//!
//! ```text
//!  destroy() ──► guards == 0 ? ──yes──► run teardown
//!                    │
//!                    no
//!                    ▼
//!              mark pending ──► last guard dropped ──► run teardown
//! ```

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

type Teardown = Box<dyn FnOnce()>;

struct Inner {
    guards: Cell<usize>,
    destroy_requested: Cell<bool>,
    destroyed: Cell<bool>,
    teardown: RefCell<Option<Teardown>>,
}

impl Inner {
    fn run_teardown(&self) {
        self.destroyed.set(true);
        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }
}

/// Result of [`DelayedDestruction::destroy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// No guard was held; teardown ran before `destroy` returned.
    Immediate,
    /// Guards are held; teardown runs when the last one is released.
    Deferred,
    /// Teardown already ran or is already pending.
    AlreadyRequested,
}

/// Reference-counted lifetime handle for a driver's owner.
///
/// Clones share one counter. [`guard`](Self::guard) increments it and the
/// returned [`DestructorGuard`] decrements it on drop.
#[derive(Clone)]
pub struct DelayedDestruction {
    inner: Rc<Inner>,
}

impl DelayedDestruction {
    /// Handle whose teardown runs `teardown`.
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            inner: Rc::new(Inner {
                guards: Cell::new(0),
                destroy_requested: Cell::new(false),
                destroyed: Cell::new(false),
                teardown: RefCell::new(Some(Box::new(teardown))),
            }),
        }
    }

    /// Handle with no teardown action. Useful for owners that only need the
    /// in-flight count.
    pub fn detached() -> Self {
        Self::new(|| {})
    }

    /// Acquire a guard that defers teardown until it is dropped.
    pub fn guard(&self) -> DestructorGuard {
        self.inner.guards.set(self.inner.guards.get() + 1);
        DestructorGuard { inner: Rc::clone(&self.inner) }
    }

    /// Request teardown of the owner.
    pub fn destroy(&self) -> TeardownOutcome {
        if self.inner.destroy_requested.replace(true) {
            return TeardownOutcome::AlreadyRequested;
        }
        if self.inner.guards.get() == 0 {
            self.inner.run_teardown();
            TeardownOutcome::Immediate
        } else {
            tracing::debug!(guards = self.inner.guards.get(), "owner teardown deferred");
            TeardownOutcome::Deferred
        }
    }

    /// Number of live guards.
    pub fn guard_count(&self) -> usize {
        self.inner.guards.get()
    }

    /// True once teardown has been requested, whether or not it has run.
    pub fn is_destroy_requested(&self) -> bool {
        self.inner.destroy_requested.get()
    }

    /// True once teardown has run.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }
}

impl fmt::Debug for DelayedDestruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedDestruction")
            .field("guards", &self.inner.guards.get())
            .field("destroy_requested", &self.inner.destroy_requested.get())
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}

/// Keeps the owner alive while held. Releases on drop.
#[must_use = "dropping the guard releases it immediately"]
pub struct DestructorGuard {
    inner: Rc<Inner>,
}

impl Drop for DestructorGuard {
    fn drop(&mut self) {
        let remaining = self.inner.guards.get().saturating_sub(1);
        self.inner.guards.set(remaining);
        if remaining == 0 && self.inner.destroy_requested.get() && !self.inner.destroyed.get() {
            self.inner.run_teardown();
        }
    }
}

impl fmt::Debug for DestructorGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestructorGuard").finish_non_exhaustive()
    }
}
