//! The cooperative run-loop.
//!
//! The scheduler drains the step queue one entry at a time on a single
//! thread. A test body may suspend (an async body, or outstanding pauses);
//! the queue waits for it and never starts the next test before the current
//! test's `testEnd` has been emitted.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::pin::{Pin, pin};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::assert::{ActiveTest, Assert, Deadline, RunContext};
use crate::config::EngineConfig;
use crate::core::plan::{Step, build_queue, last_runners};
use crate::core::recorder::AssertionLog;
use crate::core::rollup;
use crate::core::status::{policy_failures, test_status};
use crate::core::types::{Status, TestCounts, TestKind};
use crate::emitter::EventEmitter;
use crate::events::{Event, EventKind};
use crate::snapshot;
use crate::tree::{Hook, SuiteId, SuiteTree, TestBody, TestId, TestResult};

/// Cross-thread switch that stops the run from starting further tests.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final aggregate of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub status: Status,
    pub counts: TestCounts,
    pub runtime: Duration,
    pub aborted: bool,
}

pub struct Runner {
    tree: SuiteTree,
    config: EngineConfig,
    emitter: EventEmitter,
    abort: AbortHandle,
}

impl Runner {
    pub fn new(tree: SuiteTree, config: EngineConfig) -> Self {
        Self {
            tree,
            config,
            emitter: EventEmitter::new(),
            abort: AbortHandle::default(),
        }
    }

    /// Register a reporter handler. Handlers cannot be added once the run
    /// has started.
    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&Event) + 'static) -> &mut Self {
        self.emitter.on(kind, handler);
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Run to completion on a dedicated current-thread runtime.
    pub fn start(self) -> Result<RunSummary> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .context("build test runtime")?;
        let local = tokio::task::LocalSet::new();
        Ok(local.block_on(&runtime, self.run()))
    }

    /// Run to completion. Must be polled inside a `LocalSet` when test
    /// bodies spawn local tasks.
    pub async fn run(self) -> RunSummary {
        let Runner {
            tree,
            config,
            emitter,
            abort,
        } = self;
        let handlers: usize = EventKind::ALL
            .iter()
            .map(|kind| emitter.handler_count(*kind))
            .sum();
        debug!(handlers, "event handlers attached");
        let last_runner = last_runners(&tree);
        let mut scheduler = Scheduler {
            tree,
            timeout: config.test_timeout(),
            require_assertions: config.require_assertions,
            ctx: Rc::new(RunContext::new(emitter)),
            abort,
            suite_started: HashMap::new(),
            test_number: 0,
            before_ran: HashSet::new(),
            last_runner,
        };
        scheduler.drain().await
    }
}

struct Scheduler {
    tree: SuiteTree,
    timeout: Option<Duration>,
    require_assertions: bool,
    ctx: Rc<RunContext>,
    abort: AbortHandle,
    suite_started: HashMap<SuiteId, Instant>,
    test_number: usize,
    /// Suites whose `before` hooks already ran.
    before_ran: HashSet<SuiteId>,
    /// Test after which each suite's `after` hooks run.
    last_runner: HashMap<SuiteId, TestId>,
}

impl Scheduler {
    async fn drain(&mut self) -> RunSummary {
        let run_started = Instant::now();
        let root = self.tree.root();
        let mut queue = build_queue(&self.tree);
        info!(
            tests = rollup::total(&self.tree, root),
            steps = queue.len(),
            "run started"
        );
        self.ctx
            .emit(&Event::RunStart(snapshot::suite_start(&self.tree, root)));
        self.reraise_dispatch_panic();

        let mut aborted = false;
        while let Some(step) = queue.pop_front() {
            if !aborted && self.abort.is_aborted() {
                aborted = true;
                warn!(
                    remaining_steps = queue.len() + 1,
                    "run aborted; remaining tests are not started"
                );
            }
            match step {
                Step::EnterSuite(id) => self.enter_suite(id),
                Step::RunTest(id) => self.run_test(id, aborted).await,
                Step::LeaveSuite(id) => self.leave_suite(id),
            }
            self.reraise_dispatch_panic();
        }

        let runtime = run_started.elapsed();
        self.tree.suite_mut(root).runtime = Some(runtime);
        let end = snapshot::suite_end(&self.tree, root);
        let summary = RunSummary {
            status: end.status,
            counts: end.test_counts,
            runtime,
            aborted,
        };
        info!(
            status = summary.status.label(),
            passed = summary.counts.passed,
            failed = summary.counts.failed,
            total = summary.counts.total,
            "run finished"
        );
        self.ctx.emit(&Event::RunEnd(end));
        self.reraise_dispatch_panic();
        summary
    }

    /// A panicking event handler is fatal to the run.
    fn reraise_dispatch_panic(&self) {
        if let Some(payload) = self.ctx.take_dispatch_panic() {
            std::panic::resume_unwind(payload);
        }
    }

    fn enter_suite(&mut self, id: SuiteId) {
        debug!(suite = ?self.tree.suite(id).full_name, "suite start");
        self.suite_started.insert(id, Instant::now());
        self.ctx
            .emit(&Event::SuiteStart(snapshot::suite_start(&self.tree, id)));
    }

    fn leave_suite(&mut self, id: SuiteId) {
        let runtime = self
            .suite_started
            .remove(&id)
            .map(|started| started.elapsed())
            .unwrap_or_default();
        self.tree.suite_mut(id).runtime = Some(runtime);
        let end = snapshot::suite_end(&self.tree, id);
        debug_assert!(end.test_counts.reconciles(), "counts of {:?}", end.full_name);
        debug!(suite = ?end.full_name, status = end.status.label(), "suite end");
        self.ctx.emit(&Event::SuiteEnd(end));
    }

    async fn run_test(&mut self, id: TestId, aborted: bool) {
        self.test_number += 1;
        debug!(test = ?self.tree.test(id).full_name, number = self.test_number, "test start");
        self.ctx
            .emit(&Event::TestStart(snapshot::test_start(&self.tree, id)));

        let kind = self.tree.test(id).kind;
        let body = self.tree.take_body(id);
        let result = match (aborted, kind, body) {
            (true, _, _) => TestResult::not_run(Status::Skipped, true),
            (false, TestKind::Skip, _) | (false, _, None) => {
                TestResult::not_run(Status::Skipped, false)
            }
            (false, kind, Some(body)) => self.execute(id, kind, body).await,
        };

        self.tree.test_mut(id).result = Some(result);
        self.ctx
            .emit(&Event::TestEnd(snapshot::test_end(&self.tree, id)));
    }

    async fn execute(&mut self, id: TestId, kind: TestKind, body: TestBody) -> TestResult {
        let started = Instant::now();
        let name = self.tree.test(id).name.clone();
        let number = self.test_number;
        let assert = Assert::new(id, &name, Rc::clone(&self.ctx));
        let hooks = self.take_hooks(id);
        *self.ctx.current.borrow_mut() = Some(ActiveTest::new(id, kind));

        run_hooks(&hooks.before, "before", number, &assert);
        run_hooks(&hooks.before_each, "before_each", number, &assert);

        let work = run_body(id, number, assert.clone(), Rc::clone(&self.ctx), body);
        let mut work = pin!(work);
        let fallback = self.timeout.map(Deadline::after);
        if let Some(limit) = self.await_body(id, work.as_mut(), fallback).await {
            let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            warn!(test = %name, timeout_ms = limit_ms, "test timed out");
            record_failure(
                &assert,
                format!("test took longer than {limit_ms}ms; test timed out"),
            );
        }

        // Teardown runs even when the body timed out.
        run_hooks(&hooks.after_each, "after_each", number, &assert);
        run_hooks(&hooks.after, "after", number, &assert);

        let require_assertions = self.require_assertions;
        let owed = match self.ctx.current.borrow().as_ref() {
            Some(active) => policy_failures(kind, &active.log, require_assertions),
            None => Vec::new(),
        };
        for message in owed {
            record_failure(&assert, message);
        }

        // `work` outlives this point: anything an unfinished body still owns
        // is dropped after the test stops being current and is discarded.
        let log = match self.ctx.current.borrow_mut().take() {
            Some(active) => active.log,
            None => AssertionLog::new(kind),
        };
        let status = test_status(kind, &log);
        let errors = log.errors();
        let (passed, failed) = log.tally();
        debug!(test = %name, status = status.label(), passed, failed, "test end");
        TestResult {
            status,
            assertions: log.into_assertions(),
            errors,
            runtime: started.elapsed(),
            aborted: false,
        }
    }

    /// Drive `work` until it finishes or the test's deadline passes.
    ///
    /// A deadline set through `Assert::timeout` replaces `fallback`, also
    /// while the body is suspended. Returns the limit that expired.
    async fn await_body<F>(
        &self,
        id: TestId,
        mut work: Pin<&mut F>,
        fallback: Option<Deadline>,
    ) -> Option<Duration>
    where
        F: Future<Output = ()>,
    {
        loop {
            match self.ctx.deadline(id).or(fallback) {
                Some(deadline) => {
                    tokio::select! {
                        biased;
                        _ = work.as_mut() => return None,
                        _ = tokio::time::sleep_until(deadline.at) => return Some(deadline.limit),
                        _ = self.ctx.rearmed.notified() => {}
                    }
                }
                None => {
                    tokio::select! {
                        biased;
                        _ = work.as_mut() => return None,
                        _ = self.ctx.rearmed.notified() => {}
                    }
                }
            }
        }
    }

    /// Hooks that wrap one test, in run order per phase. Marks the `before`
    /// hooks it hands out as used.
    fn take_hooks(&mut self, id: TestId) -> TestHooks {
        let chain = self.tree.ancestors(id);
        let mut before = Vec::new();
        for suite in chain.iter().rev() {
            if self.before_ran.insert(*suite) {
                before.extend(self.tree.suite(*suite).before.iter().cloned());
            }
        }
        let after = chain
            .iter()
            .filter(|suite| self.last_runner.get(*suite) == Some(&id))
            .flat_map(|suite| self.tree.suite(*suite).after.iter().rev().cloned())
            .collect();
        let (before_each, after_each) = self.tree.hooks_for(id);
        TestHooks {
            before,
            before_each,
            after_each,
            after,
        }
    }
}

struct TestHooks {
    before: Vec<Hook>,
    before_each: Vec<Hook>,
    after_each: Vec<Hook>,
    after: Vec<Hook>,
}

/// Body and outstanding pauses of one test.
///
/// Errors and panics are recovered here and recorded as failing assertions
/// on the test.
async fn run_body(
    id: TestId,
    number: usize,
    assert: Assert,
    ctx: Rc<RunContext>,
    body: TestBody,
) {
    let handle = assert.clone();
    let outcome = AssertUnwindSafe(async move { body(handle).await })
        .catch_unwind()
        .await;
    let died = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(format!("{err:#}")),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };
    if let Some(message) = died {
        warn!(number, error = %message, "uncaught error in test body");
        record_failure(&assert, format!("died on test #{number}: {message}"));
    }

    while ctx.pending_pauses(id) > 0 {
        ctx.resumed.notified().await;
    }
}

fn run_hooks(hooks: &[Hook], phase: &str, number: usize, assert: &Assert) {
    for hook in hooks {
        if let Err(message) = run_hook(hook, assert) {
            record_failure(assert, format!("{phase} hook failed on test #{number}: {message}"));
        }
    }
}

fn run_hook(hook: &Hook, assert: &Assert) -> Result<(), String> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| hook(assert))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn record_failure(assert: &Assert, message: String) {
    if let Err(err) = assert.record(false, Some(message), None) {
        warn!(error = %err, "could not record synthetic failure");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "panic with non-string payload");
    }

    #[test]
    fn abort_handle_is_shared() {
        let handle = AbortHandle::default();
        let clone = handle.clone();
        clone.abort();
        assert!(handle.is_aborted());
    }
}
