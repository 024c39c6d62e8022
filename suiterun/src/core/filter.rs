//! Test selection: `only` declarations and the name filter.

use crate::tree::{Child, SuiteId, SuiteTree, TestId};

/// Case-insensitive substring match over a test's full name joined with
/// `" > "`. A leading `!` inverts the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFilter {
    needle: String,
    negate: bool,
}

impl NameFilter {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (negate, needle) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, raw),
        };
        Self {
            needle: needle.to_lowercase(),
            negate,
        }
    }

    pub fn matches(&self, full_name: &[String]) -> bool {
        let haystack = full_name.join(" > ").to_lowercase();
        haystack.contains(&self.needle) != self.negate
    }
}

/// Drop unselected tests from the tree.
///
/// When any reachable test is declared `only`, every other test is dropped.
/// Suites left without tests by this pass are dropped too; suites that were
/// declared empty stay. Returns the number of dropped tests.
pub fn apply_selection(tree: &mut SuiteTree, filter: Option<&NameFilter>) -> usize {
    let reachable = tree.reachable_tests();
    let only_active = reachable.iter().any(|id| tree.test(*id).only);
    if !only_active && filter.is_none() {
        return 0;
    }

    let selected = |tree: &SuiteTree, id: TestId| {
        let test = tree.test(id);
        (!only_active || test.only) && filter.is_none_or(|f| f.matches(&test.full_name))
    };

    let root = tree.root();
    let (_, dropped) = prune_suite(tree, root, &selected);
    dropped
}

/// Returns `(remaining tests, dropped tests)` for `suite`.
fn prune_suite(
    tree: &mut SuiteTree,
    suite: SuiteId,
    selected: &dyn Fn(&SuiteTree, TestId) -> bool,
) -> (usize, usize) {
    let entries = tree.suite(suite).entries.clone();
    let mut kept = Vec::with_capacity(entries.len());
    let mut remaining = 0;
    let mut dropped = 0;

    for child in entries {
        match child {
            Child::Test(id) => {
                if selected(tree, id) {
                    remaining += 1;
                    kept.push(child);
                } else {
                    dropped += 1;
                }
            }
            Child::Suite(id) => {
                let (child_remaining, child_dropped) = prune_suite(tree, id, selected);
                dropped += child_dropped;
                remaining += child_remaining;
                if child_remaining > 0 || child_dropped == 0 {
                    kept.push(child);
                }
            }
        }
    }

    tree.suite_mut(suite).entries = kept;
    (remaining, dropped)
}
