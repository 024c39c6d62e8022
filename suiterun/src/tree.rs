//! Arena-backed suite tree.
//!
//! Suites and tests live in flat vectors and refer to each other by id. The
//! tree is assembled by [`crate::builder::Builder`] and afterwards only the
//! per-node result state changes, written by the scheduler.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;

use crate::assert::Assert;
use crate::core::types::{Assertion, Status, TestKind};

/// Future returned by a test body.
pub type TestFuture = LocalBoxFuture<'static, anyhow::Result<()>>;
/// Deferred test body, invoked at most once.
pub type TestBody = Box<dyn FnOnce(Assert) -> TestFuture>;
/// Module hook: `before`, `before_each`, `after_each` or `after`.
pub type Hook = Rc<dyn Fn(&Assert) -> anyhow::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SuiteId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestId(pub(crate) usize);

/// A direct child of a suite, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    Test(TestId),
    Suite(SuiteId),
}

pub struct SuiteNode {
    pub name: String,
    pub full_name: Vec<String>,
    pub parent: Option<SuiteId>,
    pub entries: Vec<Child>,
    /// Run once, before the first test of this subtree that runs.
    pub before: Vec<Hook>,
    pub before_each: Vec<Hook>,
    pub after_each: Vec<Hook>,
    /// Run once, after the last test of this subtree that runs.
    pub after: Vec<Hook>,
    pub runtime: Option<Duration>,
}

impl SuiteNode {
    fn new(name: &str, full_name: Vec<String>, parent: Option<SuiteId>) -> Self {
        Self {
            name: name.to_string(),
            full_name,
            parent,
            entries: Vec::new(),
            before: Vec::new(),
            before_each: Vec::new(),
            after_each: Vec::new(),
            after: Vec::new(),
            runtime: None,
        }
    }

    pub fn tests(&self) -> impl Iterator<Item = TestId> + '_ {
        self.entries.iter().filter_map(|child| match child {
            Child::Test(id) => Some(*id),
            Child::Suite(_) => None,
        })
    }

    pub fn child_suites(&self) -> impl Iterator<Item = SuiteId> + '_ {
        self.entries.iter().filter_map(|child| match child {
            Child::Suite(id) => Some(*id),
            Child::Test(_) => None,
        })
    }
}

/// Result state of a finished test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub status: Status,
    pub assertions: Vec<Assertion>,
    pub errors: Vec<Assertion>,
    pub runtime: Duration,
    pub aborted: bool,
}

impl TestResult {
    /// Result of a test that never ran its body.
    pub fn not_run(status: Status, aborted: bool) -> Self {
        Self {
            status,
            assertions: Vec::new(),
            errors: Vec::new(),
            runtime: Duration::ZERO,
            aborted,
        }
    }
}

pub struct TestNode {
    pub name: String,
    pub full_name: Vec<String>,
    pub suite: SuiteId,
    pub suite_name: String,
    pub kind: TestKind,
    pub only: bool,
    pub(crate) body: Option<TestBody>,
    pub result: Option<TestResult>,
}

impl fmt::Debug for TestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestNode")
            .field("full_name", &self.full_name)
            .field("kind", &self.kind)
            .field("only", &self.only)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

pub struct SuiteTree {
    suites: Vec<SuiteNode>,
    tests: Vec<TestNode>,
}

impl fmt::Debug for SuiteTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiteTree")
            .field("suites", &self.suites.len())
            .field("tests", &self.tests)
            .finish()
    }
}

impl Default for SuiteTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SuiteTree {
    /// A tree holding only the unnamed root suite.
    pub fn new() -> Self {
        Self {
            suites: vec![SuiteNode::new("", Vec::new(), None)],
            tests: Vec::new(),
        }
    }

    pub fn root(&self) -> SuiteId {
        SuiteId(0)
    }

    pub fn suite(&self, id: SuiteId) -> &SuiteNode {
        &self.suites[id.0]
    }

    pub fn suite_mut(&mut self, id: SuiteId) -> &mut SuiteNode {
        &mut self.suites[id.0]
    }

    pub fn test(&self, id: TestId) -> &TestNode {
        &self.tests[id.0]
    }

    pub fn test_mut(&mut self, id: TestId) -> &mut TestNode {
        &mut self.tests[id.0]
    }

    pub fn add_suite(&mut self, parent: SuiteId, name: &str) -> SuiteId {
        let mut full_name = self.suite(parent).full_name.clone();
        full_name.push(name.to_string());
        let id = SuiteId(self.suites.len());
        self.suites.push(SuiteNode::new(name, full_name, Some(parent)));
        self.suite_mut(parent).entries.push(Child::Suite(id));
        id
    }

    pub fn add_test(
        &mut self,
        suite: SuiteId,
        name: &str,
        kind: TestKind,
        only: bool,
        body: Option<TestBody>,
    ) -> TestId {
        let owner = self.suite(suite);
        let mut full_name = owner.full_name.clone();
        full_name.push(name.to_string());
        let suite_name = owner.name.clone();
        let id = TestId(self.tests.len());
        self.tests.push(TestNode {
            name: name.to_string(),
            full_name,
            suite,
            suite_name,
            kind,
            only,
            body,
            result: None,
        });
        self.suite_mut(suite).entries.push(Child::Test(id));
        id
    }

    pub(crate) fn take_body(&mut self, id: TestId) -> Option<TestBody> {
        self.test_mut(id).body.take()
    }

    /// Suites enclosing `id`, innermost first, ending with the root.
    pub fn ancestors(&self, id: TestId) -> Vec<SuiteId> {
        let mut chain = Vec::new();
        let mut cursor = Some(self.test(id).suite);
        while let Some(suite) = cursor {
            chain.push(suite);
            cursor = self.suite(suite).parent;
        }
        chain
    }

    /// Per-test hooks that wrap `id`: `before_each` outermost first,
    /// `after_each` innermost first.
    pub fn hooks_for(&self, id: TestId) -> (Vec<Hook>, Vec<Hook>) {
        let chain = self.ancestors(id);
        let before = chain
            .iter()
            .rev()
            .flat_map(|suite| self.suite(*suite).before_each.iter().cloned())
            .collect();
        let after = chain
            .iter()
            .flat_map(|suite| self.suite(*suite).after_each.iter().rev().cloned())
            .collect();
        (before, after)
    }

    /// Tests reachable from the root, in declaration order.
    pub fn reachable_tests(&self) -> Vec<TestId> {
        let mut out = Vec::new();
        self.collect_tests(self.root(), &mut out);
        out
    }

    fn collect_tests(&self, suite: SuiteId, out: &mut Vec<TestId>) {
        for child in &self.suite(suite).entries {
            match child {
                Child::Test(id) => out.push(*id),
                Child::Suite(id) => self.collect_tests(*id, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_names_extend_parent_path() {
        let mut tree = SuiteTree::new();
        let outer = tree.add_suite(tree.root(), "Outer");
        let inner = tree.add_suite(outer, "Inner");
        let test = tree.add_test(inner, "works", TestKind::Normal, false, None);

        assert_eq!(tree.suite(inner).full_name, vec!["Outer", "Inner"]);
        assert_eq!(tree.test(test).full_name, vec!["Outer", "Inner", "works"]);
        assert_eq!(tree.test(test).suite_name, "Inner");
        assert_eq!(tree.suite(inner).parent, Some(outer));
        assert_eq!(tree.ancestors(test), vec![inner, outer, tree.root()]);
    }

    #[test]
    fn root_tests_have_empty_suite_name() {
        let mut tree = SuiteTree::new();
        let test = tree.add_test(tree.root(), "top", TestKind::Normal, false, None);
        assert_eq!(tree.test(test).suite_name, "");
        assert_eq!(tree.test(test).full_name, vec!["top"]);
    }

    #[test]
    fn entries_interleave_in_declaration_order() {
        let mut tree = SuiteTree::new();
        let root = tree.root();
        let first = tree.add_test(root, "a", TestKind::Normal, false, None);
        let suite = tree.add_suite(root, "S");
        let last = tree.add_test(root, "b", TestKind::Skip, false, None);

        assert_eq!(
            tree.suite(root).entries,
            vec![Child::Test(first), Child::Suite(suite), Child::Test(last)]
        );
        assert_eq!(tree.suite(root).tests().collect::<Vec<_>>(), vec![first, last]);
    }
}
