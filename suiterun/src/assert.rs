//! The handle test bodies use to record assertions and request pauses.
//!
//! An [`Assert`] is bound to one test. Recording only succeeds while that
//! test is the one the scheduler is running; afterwards (including after a
//! timeout) the handle is stale and every call returns [`UsageError`].

use std::any::Any;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, Location};
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::core::recorder::AssertionLog;
use crate::core::types::TestKind;
use crate::emitter::EventEmitter;
use crate::error::UsageError;
use crate::events::Event;
use crate::tree::TestId;

/// Point at which a running test is force-failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Deadline {
    pub(crate) at: Instant,
    pub(crate) limit: Duration,
}

impl Deadline {
    pub(crate) fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }
}

/// The running test's mutable state.
pub(crate) struct ActiveTest {
    pub(crate) id: TestId,
    pub(crate) log: AssertionLog,
    pub(crate) pending_pauses: usize,
    /// Set by `Assert::timeout`; overrides the configured default.
    pub(crate) deadline: Option<Deadline>,
}

impl ActiveTest {
    pub(crate) fn new(id: TestId, kind: TestKind) -> Self {
        Self {
            id,
            log: AssertionLog::new(kind),
            pending_pauses: 0,
            deadline: None,
        }
    }
}

/// State shared between the scheduler and the handles of the running test.
pub(crate) struct RunContext {
    pub(crate) current: RefCell<Option<ActiveTest>>,
    pub(crate) emitter: RefCell<EventEmitter>,
    /// Signalled when the last outstanding pause is released.
    pub(crate) resumed: Notify,
    /// Signalled when the running test replaces its deadline.
    pub(crate) rearmed: Notify,
    dispatch_panic: RefCell<Option<Box<dyn Any + Send>>>,
}

impl RunContext {
    pub(crate) fn new(emitter: EventEmitter) -> Self {
        Self {
            current: RefCell::new(None),
            emitter: RefCell::new(emitter),
            resumed: Notify::new(),
            rearmed: Notify::new(),
            dispatch_panic: RefCell::new(None),
        }
    }

    /// Dispatch `event` to every handler.
    ///
    /// A panicking handler is caught here so it is never mistaken for a
    /// failure of the running test. Dispatch stops for good and the
    /// scheduler re-raises the panic once the current step returns.
    pub(crate) fn emit(&self, event: &Event) {
        if self.dispatch_panic.borrow().is_some() {
            return;
        }
        let outcome =
            std::panic::catch_unwind(AssertUnwindSafe(|| self.emitter.borrow_mut().emit(event)));
        if let Err(payload) = outcome {
            error!(event = %event.kind(), "event handler panicked; aborting run");
            *self.dispatch_panic.borrow_mut() = Some(payload);
        }
    }

    pub(crate) fn take_dispatch_panic(&self) -> Option<Box<dyn Any + Send>> {
        self.dispatch_panic.borrow_mut().take()
    }

    pub(crate) fn pending_pauses(&self, id: TestId) -> usize {
        match self.current.borrow().as_ref() {
            Some(active) if active.id == id => active.pending_pauses,
            _ => 0,
        }
    }

    pub(crate) fn deadline(&self, id: TestId) -> Option<Deadline> {
        match self.current.borrow().as_ref() {
            Some(active) if active.id == id => active.deadline,
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Assert {
    test: TestId,
    test_name: Rc<str>,
    ctx: Rc<RunContext>,
}

impl Assert {
    pub(crate) fn new(test: TestId, test_name: &str, ctx: Rc<RunContext>) -> Self {
        Self {
            test,
            test_name: Rc::from(test_name),
            ctx,
        }
    }

    /// Record a check that passes when `condition` holds.
    #[track_caller]
    pub fn ok(&self, condition: bool, message: impl Into<String>) -> Result<(), UsageError> {
        let stack = Location::caller().to_string();
        self.record(condition, Some(message.into()), Some(stack))
    }

    /// Record a check that passes when `condition` does not hold.
    #[track_caller]
    pub fn not_ok(&self, condition: bool, message: impl Into<String>) -> Result<(), UsageError> {
        let stack = Location::caller().to_string();
        self.record(!condition, Some(message.into()), Some(stack))
    }

    /// Record a check that passes when `actual == expected`.
    #[track_caller]
    pub fn equal<T: PartialEq + ?Sized>(
        &self,
        actual: &T,
        expected: &T,
        message: impl Into<String>,
    ) -> Result<(), UsageError> {
        let stack = Location::caller().to_string();
        self.record(actual == expected, Some(message.into()), Some(stack))
    }

    /// Record a raw outcome with an optional message.
    #[track_caller]
    pub fn push_result(&self, passed: bool, message: Option<String>) -> Result<(), UsageError> {
        let stack = Location::caller().to_string();
        self.record(passed, message, Some(stack))
    }

    /// Record a named step. Steps must later be checked, in order, with
    /// [`Assert::verify_steps`].
    #[track_caller]
    pub fn step(&self, message: impl Into<String>) -> Result<(), UsageError> {
        let stack = Location::caller().to_string();
        let message = message.into();
        if message.is_empty() {
            return self.record(
                false,
                Some("step() requires a non-empty message".to_string()),
                Some(stack),
            );
        }
        self.with_active(|active| active.log.push_step(message.clone()))?;
        self.record(true, Some(message), Some(stack))
    }

    /// Check the steps recorded since the last verification against
    /// `expected`, then clear them.
    #[track_caller]
    pub fn verify_steps(
        &self,
        expected: &[&str],
        message: impl Into<String>,
    ) -> Result<(), UsageError> {
        let stack = Location::caller().to_string();
        let recorded = self.with_active(|active| active.log.take_steps())?;
        self.record(recorded == expected, Some(message.into()), Some(stack))
    }

    /// Require exactly `count` assertions by the end of the test.
    pub fn expect(&self, count: usize) -> Result<(), UsageError> {
        self.with_active(|active| active.log.set_expected(count))
    }

    /// Fail the test if it is still running `ms` milliseconds from now.
    ///
    /// Overrides the configured default timeout and any earlier call. The
    /// scheduler then stops waiting on the body and its pauses.
    pub fn timeout(&self, ms: u64) -> Result<(), UsageError> {
        let deadline = Deadline::after(Duration::from_millis(ms));
        self.with_active(|active| active.deadline = Some(deadline))?;
        self.ctx.rearmed.notify_one();
        Ok(())
    }

    /// Hold the test open until the returned handle is resolved.
    ///
    /// The scheduler does not advance past this test while any pause is
    /// outstanding (or until the test times out).
    pub fn pause(&self) -> Result<Resume, UsageError> {
        self.with_active(|active| active.pending_pauses += 1)?;
        Ok(Resume {
            assert: self.clone(),
            released: false,
        })
    }

    /// Publish the assertion, then append it to the running test's log.
    pub(crate) fn record(
        &self,
        passed: bool,
        message: Option<String>,
        stack: Option<String>,
    ) -> Result<(), UsageError> {
        let assertion = match self.ctx.current.borrow().as_ref() {
            Some(active) if active.id == self.test => active.log.build(passed, message, stack),
            _ => return Err(self.not_running()),
        };

        self.ctx.emit(&Event::Assertion(assertion.clone()));

        if let Some(active) = self.ctx.current.borrow_mut().as_mut() {
            active.log.push(assertion);
        }
        Ok(())
    }

    fn with_active<R>(&self, f: impl FnOnce(&mut ActiveTest) -> R) -> Result<R, UsageError> {
        let mut current = self.ctx.current.borrow_mut();
        match current.as_mut() {
            Some(active) if active.id == self.test => Ok(f(active)),
            _ => Err(self.not_running()),
        }
    }

    fn not_running(&self) -> UsageError {
        UsageError::NoActiveTest {
            test: self.test_name.to_string(),
        }
    }
}

/// Handle for one outstanding pause.
///
/// Call [`Resume::done`] once the asynchronous work finishes. Dropping the
/// handle without calling it releases the pause and fails the test.
pub struct Resume {
    assert: Assert,
    released: bool,
}

impl Resume {
    pub fn done(mut self) {
        self.release(false);
    }

    fn release(&mut self, dropped: bool) {
        if self.released {
            return;
        }
        self.released = true;

        let still_running = {
            let mut current = self.assert.ctx.current.borrow_mut();
            match current.as_mut() {
                Some(active) if active.id == self.assert.test => {
                    active.pending_pauses = active.pending_pauses.saturating_sub(1);
                    true
                }
                _ => false,
            }
        };
        // A late resolution after the test ended is discarded.
        if !still_running {
            return;
        }

        if dropped {
            let message = "pause handle dropped before done() was called".to_string();
            if let Err(err) = self.assert.record(false, Some(message), None) {
                warn!(error = %err, "could not record dropped pause");
            }
        }
        self.assert.ctx.resumed.notify_one();
    }
}

impl Drop for Resume {
    fn drop(&mut self) {
        self.release(true);
    }
}
