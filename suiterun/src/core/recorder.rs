//! Per-test assertion log.
//!
//! The log is pure bookkeeping: building an assertion and appending it are
//! separate steps so the caller can publish the assertion in between.

use crate::core::types::{Assertion, TestKind};

#[derive(Debug, Clone)]
pub struct AssertionLog {
    todo: bool,
    expected: Option<usize>,
    assertions: Vec<Assertion>,
    steps: Vec<String>,
}

impl AssertionLog {
    pub fn new(kind: TestKind) -> Self {
        Self {
            todo: kind == TestKind::Todo,
            expected: None,
            assertions: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Build the assertion that `push` would append, tagged with the test's
    /// todo flag.
    pub fn build(&self, passed: bool, message: Option<String>, stack: Option<String>) -> Assertion {
        Assertion {
            passed,
            message,
            todo: self.todo,
            stack,
        }
    }

    pub fn push(&mut self, assertion: Assertion) {
        self.assertions.push(assertion);
    }

    /// Declare how many assertions the test must record.
    pub fn set_expected(&mut self, count: usize) {
        self.expected = Some(count);
    }

    pub fn expected(&self) -> Option<usize> {
        self.expected
    }

    pub fn push_step(&mut self, step: String) {
        self.steps.push(step);
    }

    /// Drain the steps recorded since the last verification.
    pub fn take_steps(&mut self) -> Vec<String> {
        std::mem::take(&mut self.steps)
    }

    pub fn unverified_steps(&self) -> &[String] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    /// Returns `(passed, failed)`.
    pub fn tally(&self) -> (usize, usize) {
        let failed = self.assertions.iter().filter(|a| a.is_error()).count();
        (self.assertions.len() - failed, failed)
    }

    pub fn has_failures(&self) -> bool {
        self.assertions.iter().any(Assertion::is_error)
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    /// Failing assertions in recording order.
    pub fn errors(&self) -> Vec<Assertion> {
        self.assertions
            .iter()
            .filter(|a| a.is_error())
            .cloned()
            .collect()
    }

    pub fn into_assertions(self) -> Vec<Assertion> {
        self.assertions
    }
}
