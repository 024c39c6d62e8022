//! Declaration API: turns nested module/test declarations into a tree.
//!
//! Declaration is a separate phase. Module bodies run immediately, inside
//! [`Builder::module`], with the new module pushed as the current suite;
//! the tree is complete before any test runs.

use std::rc::Rc;

use futures::FutureExt;
use tracing::debug;

use crate::assert::Assert;
use crate::config::EngineConfig;
use crate::core::filter::{NameFilter, apply_selection};
use crate::core::invariants::validate_invariants;
use crate::core::types::TestKind;
use crate::error::BuildError;
use crate::tree::{SuiteId, SuiteTree, TestBody};

/// One open module. `mode` is the kind forced on tests declared inside it.
#[derive(Debug, Clone, Copy)]
struct Frame {
    suite: SuiteId,
    mode: TestKind,
}

pub struct Builder {
    tree: SuiteTree,
    stack: Vec<Frame>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        let tree = SuiteTree::new();
        let root = tree.root();
        Self {
            tree,
            stack: vec![Frame {
                suite: root,
                mode: TestKind::Normal,
            }],
        }
    }

    fn current(&self) -> Frame {
        // The root is pushed in `new` and never popped.
        self.stack.last().copied().unwrap_or_else(|| Frame {
            suite: self.tree.root(),
            mode: TestKind::Normal,
        })
    }

    /// Declare a module; `body` declares its tests and nested modules.
    pub fn module(&mut self, name: &str, body: impl FnOnce(&mut Builder)) -> &mut Self {
        self.open_module(name, TestKind::Normal, body)
    }

    /// Declare a module whose tests, nested ones included, are all skipped.
    pub fn module_skip(&mut self, name: &str, body: impl FnOnce(&mut Builder)) -> &mut Self {
        self.open_module(name, TestKind::Skip, body)
    }

    /// Declare a module whose runnable tests, nested ones included, are all
    /// todo.
    pub fn module_todo(&mut self, name: &str, body: impl FnOnce(&mut Builder)) -> &mut Self {
        self.open_module(name, TestKind::Todo, body)
    }

    fn open_module(
        &mut self,
        name: &str,
        mode: TestKind,
        body: impl FnOnce(&mut Builder),
    ) -> &mut Self {
        let parent = self.current();
        let suite = self.tree.add_suite(parent.suite, name);
        self.stack.push(Frame {
            suite,
            mode: inherit(parent.mode, mode),
        });
        body(self);
        self.stack.pop();
        self
    }

    pub fn test(
        &mut self,
        name: &str,
        body: impl FnOnce(&Assert) -> anyhow::Result<()> + 'static,
    ) -> &mut Self {
        self.declare(name, TestKind::Normal, false, Some(sync_body(body)))
    }

    pub fn async_test<F, Fut>(&mut self, name: &str, body: F) -> &mut Self
    where
        F: FnOnce(Assert) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.declare(name, TestKind::Normal, false, Some(async_body(body)))
    }

    /// Declare a test whose failures are expected. It always ends `todo`.
    pub fn todo(
        &mut self,
        name: &str,
        body: impl FnOnce(&Assert) -> anyhow::Result<()> + 'static,
    ) -> &mut Self {
        self.declare(name, TestKind::Todo, false, Some(sync_body(body)))
    }

    pub fn async_todo<F, Fut>(&mut self, name: &str, body: F) -> &mut Self
    where
        F: FnOnce(Assert) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.declare(name, TestKind::Todo, false, Some(async_body(body)))
    }

    /// Declare a test that is reported as skipped and never runs.
    pub fn skip(&mut self, name: &str) -> &mut Self {
        self.declare(name, TestKind::Skip, false, None)
    }

    /// Declare a focused test. Once any test is focused, unfocused tests are
    /// dropped from the run.
    pub fn only(
        &mut self,
        name: &str,
        body: impl FnOnce(&Assert) -> anyhow::Result<()> + 'static,
    ) -> &mut Self {
        self.declare(name, TestKind::Normal, true, Some(sync_body(body)))
    }

    pub fn async_only<F, Fut>(&mut self, name: &str, body: F) -> &mut Self
    where
        F: FnOnce(Assert) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.declare(name, TestKind::Normal, true, Some(async_body(body)))
    }

    /// Run `hook` once, inside the first test of the current module (or its
    /// nested modules) that runs.
    pub fn before(&mut self, hook: impl Fn(&Assert) -> anyhow::Result<()> + 'static) -> &mut Self {
        let suite = self.current().suite;
        self.tree.suite_mut(suite).before.push(Rc::new(hook));
        self
    }

    /// Run `hook` before every test of the current module and its nested
    /// modules.
    pub fn before_each(
        &mut self,
        hook: impl Fn(&Assert) -> anyhow::Result<()> + 'static,
    ) -> &mut Self {
        let suite = self.current().suite;
        self.tree.suite_mut(suite).before_each.push(Rc::new(hook));
        self
    }

    /// Run `hook` after every test of the current module and its nested
    /// modules.
    pub fn after_each(
        &mut self,
        hook: impl Fn(&Assert) -> anyhow::Result<()> + 'static,
    ) -> &mut Self {
        let suite = self.current().suite;
        self.tree.suite_mut(suite).after_each.push(Rc::new(hook));
        self
    }

    /// Run `hook` once, inside the last test of the current module (or its
    /// nested modules) that runs.
    pub fn after(&mut self, hook: impl Fn(&Assert) -> anyhow::Result<()> + 'static) -> &mut Self {
        let suite = self.current().suite;
        self.tree.suite_mut(suite).after.push(Rc::new(hook));
        self
    }

    /// Validate declarations and config, then apply `only` and the
    /// configured filter.
    pub fn finish(self, config: &EngineConfig) -> Result<SuiteTree, BuildError> {
        let Builder { mut tree, .. } = self;
        let mut violations = validate_invariants(&tree);
        if let Err(err) = config.validate() {
            violations.push(format!("config: {err}"));
        }
        if !violations.is_empty() {
            return Err(BuildError { violations });
        }

        let filter = config.filter.as_deref().map(NameFilter::parse);
        let dropped = apply_selection(&mut tree, filter.as_ref());
        debug!(
            tests = tree.reachable_tests().len(),
            dropped, "declarations finished"
        );
        Ok(tree)
    }

    fn declare(
        &mut self,
        name: &str,
        kind: TestKind,
        only: bool,
        body: Option<TestBody>,
    ) -> &mut Self {
        let frame = self.current();
        let kind = inherit(frame.mode, kind);
        // A skipped test never runs, so its body is not kept.
        let body = if kind == TestKind::Skip { None } else { body };
        self.tree.add_test(frame.suite, name, kind, only, body);
        self
    }
}

/// Kind of a declaration made inside a module declared with `outer`.
///
/// Skip beats todo, and todo turns normal tests into todo ones.
fn inherit(outer: TestKind, declared: TestKind) -> TestKind {
    match (outer, declared) {
        (TestKind::Skip, _) | (_, TestKind::Skip) => TestKind::Skip,
        (TestKind::Todo, _) | (_, TestKind::Todo) => TestKind::Todo,
        (TestKind::Normal, TestKind::Normal) => TestKind::Normal,
    }
}

fn sync_body(body: impl FnOnce(&Assert) -> anyhow::Result<()> + 'static) -> TestBody {
    Box::new(move |assert: Assert| {
        let result = body(&assert);
        async move { result }.boxed_local()
    })
}

fn async_body<F, Fut>(body: F) -> TestBody
where
    F: FnOnce(Assert) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<()>> + 'static,
{
    Box::new(move |assert: Assert| body(assert).boxed_local())
}
