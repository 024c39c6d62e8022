//! Shared deterministic types for the engine core.
//!
//! These types are the stable reporter contract. Field names serialize in
//! camelCase and must not change shape between runs.

use serde::{Deserialize, Serialize};

/// Terminal status of a test or suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
    Todo,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
            Status::Todo => "todo",
        }
    }
}

/// How a test was declared. Fixes the status of `Skip` and `Todo` tests
/// before they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Normal,
    Todo,
    Skip,
}

/// One recorded check inside a running test.
///
/// `stack` is diagnostic only (the caller location) and is excluded from
/// conformance comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub passed: bool,
    pub message: Option<String>,
    pub todo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl Assertion {
    /// Whether this assertion belongs in a test's `errors`.
    pub fn is_error(&self) -> bool {
        !self.passed
    }
}

/// Pre-run counts carried by `suiteStart`. Only the total is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StartCounts {
    pub total: usize,
}

/// Rolled-up status counts of every test under a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestCounts {
    pub skipped: usize,
    pub passed: usize,
    pub failed: usize,
    pub todo: usize,
    pub total: usize,
}

impl TestCounts {
    pub fn add_status(&mut self, status: Status) {
        match status {
            Status::Passed => self.passed += 1,
            Status::Failed => self.failed += 1,
            Status::Skipped => self.skipped += 1,
            Status::Todo => self.todo += 1,
        }
        self.total += 1;
    }

    pub fn merge(&mut self, other: &TestCounts) {
        self.skipped += other.skipped;
        self.passed += other.passed;
        self.failed += other.failed;
        self.todo += other.todo;
        self.total += other.total;
    }

    /// True when every status bucket sums to `total`.
    pub fn reconciles(&self) -> bool {
        self.passed + self.failed + self.skipped + self.todo == self.total
    }
}
