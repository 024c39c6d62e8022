//! Status precedence rules for tests and suites.

use crate::core::recorder::AssertionLog;
use crate::core::types::{Status, TestCounts, TestKind};

/// Final status of a test that ran (or was skipped).
///
/// - `Skip` is fixed at declaration.
/// - `Todo` is terminal regardless of assertion outcomes.
/// - Otherwise any failing assertion fails the test.
pub fn test_status(kind: TestKind, log: &AssertionLog) -> Status {
    match kind {
        TestKind::Skip => Status::Skipped,
        TestKind::Todo => Status::Todo,
        TestKind::Normal if log.has_failures() => Status::Failed,
        TestKind::Normal => Status::Passed,
    }
}

/// Messages for the synthetic failures a finished test owes its log.
///
/// Covers steps never checked by `verify_steps`, an `expect(n)` mismatch
/// and, when `require_assertions` is on, a regular test that recorded
/// nothing. Todo tests are exempt from the zero-assertion rule since their
/// status cannot change.
pub fn policy_failures(
    kind: TestKind,
    log: &AssertionLog,
    require_assertions: bool,
) -> Vec<String> {
    let mut failures = Vec::new();
    if !log.unverified_steps().is_empty() {
        failures.push(format!(
            "expected verify_steps() to be called before the end of the test after using step(); unverified steps: {}",
            log.unverified_steps().join(", ")
        ));
    }
    match log.expected() {
        Some(expected) if expected != log.len() => failures.push(format!(
            "expected {} assertions, but {} were run",
            expected,
            log.len()
        )),
        Some(_) => {}
        None if require_assertions && kind == TestKind::Normal && log.is_empty() => {
            failures.push(
                "expected at least one assertion, but none were run; call expect(0) to accept zero assertions"
                    .to_string(),
            );
        }
        None => {}
    }
    failures
}

/// Rolled-up status of a suite from its final counts.
///
/// `failed` wins, then all-skipped, then all-todo. An empty suite passes.
pub fn suite_status(counts: &TestCounts) -> Status {
    if counts.failed > 0 {
        Status::Failed
    } else if counts.total == 0 {
        Status::Passed
    } else if counts.skipped == counts.total {
        Status::Skipped
    } else if counts.todo == counts.total {
        Status::Todo
    } else {
        Status::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(kind: TestKind, outcomes: &[bool]) -> AssertionLog {
        let mut log = AssertionLog::new(kind);
        for passed in outcomes {
            let assertion = log.build(*passed, None, None);
            log.push(assertion);
        }
        log
    }

    #[test]
    fn todo_with_failures_stays_todo() {
        let log = log_with(TestKind::Todo, &[false]);
        assert_eq!(test_status(TestKind::Todo, &log), Status::Todo);
    }

    #[test]
    fn todo_passing_everything_is_not_elevated() {
        let log = log_with(TestKind::Todo, &[true, true]);
        assert_eq!(test_status(TestKind::Todo, &log), Status::Todo);
    }

    #[test]
    fn any_failure_fails_normal_test() {
        let log = log_with(TestKind::Normal, &[true, false, true]);
        assert_eq!(test_status(TestKind::Normal, &log), Status::Failed);
    }

    #[test]
    fn zero_assertions_policy() {
        let log = log_with(TestKind::Normal, &[]);
        assert_eq!(policy_failures(TestKind::Normal, &log, true).len(), 1);
        assert!(policy_failures(TestKind::Normal, &log, false).is_empty());
        assert!(policy_failures(TestKind::Todo, &log, true).is_empty());
    }

    #[test]
    fn expect_zero_accepts_empty_test() {
        let mut log = log_with(TestKind::Normal, &[]);
        log.set_expected(0);
        assert!(policy_failures(TestKind::Normal, &log, true).is_empty());
    }

    #[test]
    fn expect_mismatch_reports_counts() {
        let mut log = log_with(TestKind::Normal, &[true]);
        log.set_expected(2);
        let failures = policy_failures(TestKind::Normal, &log, true);
        assert_eq!(failures, vec!["expected 2 assertions, but 1 were run"]);
    }

    #[test]
    fn unverified_steps_are_reported() {
        let mut log = log_with(TestKind::Normal, &[true, true]);
        log.push_step("load".to_string());
        log.push_step("save".to_string());
        let failures = policy_failures(TestKind::Normal, &log, true);
        assert_eq!(
            failures,
            vec![
                "expected verify_steps() to be called before the end of the test after using step(); unverified steps: load, save"
            ]
        );

        log.take_steps();
        assert!(policy_failures(TestKind::Normal, &log, true).is_empty());
    }

    #[test]
    fn suite_status_precedence() {
        let counts = |skipped, passed, failed, todo| TestCounts {
            skipped,
            passed,
            failed,
            todo,
            total: skipped + passed + failed + todo,
        };
        assert_eq!(suite_status(&counts(1, 1, 0, 1)), Status::Passed);
        assert_eq!(suite_status(&counts(0, 0, 0, 1)), Status::Todo);
        assert_eq!(suite_status(&counts(2, 0, 0, 0)), Status::Skipped);
        assert_eq!(suite_status(&counts(1, 3, 1, 1)), Status::Failed);
        assert_eq!(suite_status(&counts(0, 0, 0, 0)), Status::Passed);
    }
}
