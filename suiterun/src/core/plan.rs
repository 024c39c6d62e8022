//! Flattening the suite tree into the execution queue.

use std::collections::{HashMap, VecDeque};

use crate::core::types::TestKind;
use crate::tree::{Child, SuiteId, SuiteTree, TestId};

/// One unit of scheduler work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    EnterSuite(SuiteId),
    RunTest(TestId),
    LeaveSuite(SuiteId),
}

/// Depth-first, declaration-ordered steps for every suite below the root.
///
/// The root contributes no enter/leave steps: `runStart`/`runEnd` wrap it.
pub fn build_queue(tree: &SuiteTree) -> VecDeque<Step> {
    let mut queue = VecDeque::new();
    push_entries(tree, tree.root(), &mut queue);
    queue
}

fn push_entries(tree: &SuiteTree, suite: SuiteId, queue: &mut VecDeque<Step>) {
    for child in &tree.suite(suite).entries {
        match child {
            Child::Test(id) => queue.push_back(Step::RunTest(*id)),
            Child::Suite(id) => {
                queue.push_back(Step::EnterSuite(*id));
                push_entries(tree, *id, queue);
                queue.push_back(Step::LeaveSuite(*id));
            }
        }
    }
}

/// For every suite, the last test in its subtree whose body will run.
///
/// Module `after` hooks fire once that test finishes. Suites whose tests are
/// all skipped have no entry.
pub fn last_runners(tree: &SuiteTree) -> HashMap<SuiteId, TestId> {
    let mut last = HashMap::new();
    for id in tree.reachable_tests() {
        let test = tree.test(id);
        if test.kind == TestKind::Skip || test.body.is_none() {
            continue;
        }
        for suite in tree.ancestors(id) {
            last.insert(suite, id);
        }
    }
    last
}
