//! Building event payloads from the tree.
//!
//! Every function here copies out of the tree; nothing returned borrows it.

use std::time::Duration;

use crate::core::rollup;
use crate::core::status::suite_status;
use crate::core::types::{StartCounts, Status};
use crate::events::{SuiteEnd, SuiteStart, TestEnd, TestStart};
use crate::tree::{SuiteId, SuiteTree, TestId, TestResult};

pub fn test_start(tree: &SuiteTree, id: TestId) -> TestStart {
    let test = tree.test(id);
    TestStart {
        name: test.name.clone(),
        full_name: test.full_name.clone(),
        suite_name: test.suite_name.clone(),
    }
}

/// End snapshot of `id`. A test that has no result is reported as an
/// aborted skip.
pub fn test_end(tree: &SuiteTree, id: TestId) -> TestEnd {
    let test = tree.test(id);
    let result = test
        .result
        .clone()
        .unwrap_or_else(|| TestResult::not_run(Status::Skipped, true));
    TestEnd {
        name: test.name.clone(),
        full_name: test.full_name.clone(),
        suite_name: test.suite_name.clone(),
        status: result.status,
        runtime: millis(result.runtime),
        errors: result.errors,
        assertions: result.assertions,
        aborted: result.aborted,
    }
}

/// Start snapshot of `id` and its descendants. Only totals are known.
pub fn suite_start(tree: &SuiteTree, id: SuiteId) -> SuiteStart {
    let suite = tree.suite(id);
    SuiteStart {
        name: suite.name.clone(),
        full_name: suite.full_name.clone(),
        tests: suite.tests().map(|test| test_start(tree, test)).collect(),
        child_suites: suite
            .child_suites()
            .map(|child| suite_start(tree, child))
            .collect(),
        test_counts: StartCounts {
            total: rollup::total(tree, id),
        },
    }
}

/// End snapshot of `id`, re-walking the populated tree.
pub fn suite_end(tree: &SuiteTree, id: SuiteId) -> SuiteEnd {
    let suite = tree.suite(id);
    let counts = rollup::counts(tree, id);
    SuiteEnd {
        name: suite.name.clone(),
        full_name: suite.full_name.clone(),
        tests: suite.tests().map(|test| test_end(tree, test)).collect(),
        child_suites: suite
            .child_suites()
            .map(|child| suite_end(tree, child))
            .collect(),
        status: suite_status(&counts),
        test_counts: counts,
        runtime: millis(suite.runtime.unwrap_or_default()),
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
