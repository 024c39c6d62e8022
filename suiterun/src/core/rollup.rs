//! Bottom-up aggregation of test counts through nested suites.

use crate::core::types::TestCounts;
use crate::tree::{Child, SuiteId, SuiteTree};

/// Number of tests under `suite`, direct and transitive.
pub fn total(tree: &SuiteTree, suite: SuiteId) -> usize {
    tree.suite(suite)
        .entries
        .iter()
        .map(|child| match child {
            Child::Test(_) => 1,
            Child::Suite(id) => total(tree, *id),
        })
        .sum()
}

/// Status counts under `suite`.
///
/// Direct tests contribute their own status; child suites contribute their
/// already-aggregated counts. A test without a result yet only adds to
/// `total`.
pub fn counts(tree: &SuiteTree, suite: SuiteId) -> TestCounts {
    let mut counts = TestCounts::default();
    for child in &tree.suite(suite).entries {
        match child {
            Child::Test(id) => match &tree.test(*id).result {
                Some(result) => counts.add_status(result.status),
                None => counts.total += 1,
            },
            Child::Suite(id) => counts.merge(&self::counts(tree, *id)),
        }
    }
    counts
}
