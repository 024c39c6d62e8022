//! Module-level declarations: once-per-module hooks, skip/todo modules and
//! step verification.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};
use suiterun::core::types::Status;
use suiterun::test_support::EventLog;
use suiterun::{Assert, Builder, EngineConfig, EventKind, RunSummary, Runner};

fn run(builder: Builder) -> (RunSummary, EventLog) {
    let config = EngineConfig::default();
    let tree = builder.finish(&config).expect("build");
    let mut runner = Runner::new(tree, config);
    let log = EventLog::attach(&mut runner);
    let summary = runner.start().expect("run");
    (summary, log)
}

fn by_name<'a>(payloads: &'a [Value], name: &str) -> &'a Value {
    payloads
        .iter()
        .find(|payload| payload["name"] == json!(name))
        .unwrap_or_else(|| panic!("no payload for {name}"))
}

fn messages(end: &Value, field: &str) -> Vec<String> {
    end[field]
        .as_array()
        .expect("array")
        .iter()
        .map(|a| a["message"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn before_and_after_run_once_per_module() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let record = |label: &'static str| {
        let calls = Rc::clone(&calls);
        move |_: &Assert| -> anyhow::Result<()> {
            calls.borrow_mut().push(label);
            Ok(())
        }
    };
    let body = |label: &'static str| {
        let calls = Rc::clone(&calls);
        move |assert: &Assert| -> anyhow::Result<()> {
            calls.borrow_mut().push(label);
            assert.ok(true, label)?;
            Ok(())
        }
    };
    let setup_calls = Rc::clone(&calls);

    let mut builder = Builder::new();
    builder.module("Db", |b| {
        b.before(move |assert| {
            setup_calls.borrow_mut().push("db before");
            assert.ok(true, "setup")?;
            Ok(())
        });
        b.before_each(record("db before_each"));
        b.after_each(record("db after_each"));
        b.after(record("db after"));
        b.test("one", body("one"));
        b.module("Nested", |b| {
            b.before(record("nested before"));
            b.after(record("nested after"));
            b.test("two", body("two"));
        });
        b.skip("three");
    });

    let (summary, log) = run(builder);
    assert_eq!(
        *calls.borrow(),
        vec![
            "db before",
            "db before_each",
            "one",
            "db after_each",
            "nested before",
            "db before_each",
            "two",
            "db after_each",
            "nested after",
            "db after",
        ]
    );

    let ends = log.stable_payloads(EventKind::TestEnd);
    assert_eq!(messages(by_name(&ends, "one"), "assertions"), vec!["setup", "one"]);
    assert_eq!(messages(by_name(&ends, "two"), "assertions"), vec!["two"]);
    assert_eq!(by_name(&ends, "three")["status"], json!("skipped"));
    assert_eq!(summary.counts.passed, 2);
    assert_eq!(summary.counts.skipped, 1);
}

#[test]
fn failing_once_hook_is_reported_on_its_test() {
    let mut builder = Builder::new();
    builder.module("Broken", |b| {
        b.after(|_| Err(anyhow::anyhow!("could not close")));
        b.test("only test", |assert| {
            assert.ok(true, "fine")?;
            Ok(())
        });
    });

    let (summary, log) = run(builder);
    let ends = log.stable_payloads(EventKind::TestEnd);
    assert_eq!(
        messages(&ends[0], "errors"),
        vec!["after hook failed on test #1: could not close"]
    );
    assert_eq!(summary.status, Status::Failed);
}

#[test]
fn skipped_module_never_runs_bodies_or_hooks() {
    let mut builder = Builder::new();
    builder.module_skip("Off", |b| {
        b.before(|_| panic!("hooks of a skipped module do not run"));
        b.test("plain", |_| panic!("skipped bodies do not run"));
        b.module("Inner", |b| {
            b.todo("pending", |_| panic!("skipped bodies do not run"));
        });
    });
    builder.module_todo("Later", |b| {
        b.test("unfinished", |assert| {
            assert.ok(false, "not yet")?;
            Ok(())
        });
        b.skip("off");
    });

    let (summary, log) = run(builder);
    let ends = log.stable_payloads(EventKind::TestEnd);
    for name in ["plain", "pending", "off"] {
        let end = by_name(&ends, name);
        assert_eq!(end["status"], json!("skipped"), "{name}");
        assert_eq!(end["assertions"], json!([]), "{name}");
    }
    let unfinished = by_name(&ends, "unfinished");
    assert_eq!(unfinished["status"], json!("todo"));
    assert_eq!(messages(unfinished, "errors"), vec!["not yet"]);

    let suites = log.stable_payloads(EventKind::SuiteEnd);
    assert_eq!(by_name(&suites, "Off")["status"], json!("skipped"));
    assert_eq!(summary.counts.skipped, 3);
    assert_eq!(summary.counts.todo, 1);
    assert_eq!(summary.counts.failed, 0);
}

#[test]
fn steps_must_be_verified_in_order() {
    let mut builder = Builder::new();
    builder.test("ordered", |assert| {
        assert.step("connect")?;
        assert.step("query")?;
        assert.verify_steps(&["connect", "query"], "steps in order")?;
        Ok(())
    });
    builder.test("swapped", |assert| {
        assert.step("connect")?;
        assert.step("query")?;
        assert.verify_steps(&["query", "connect"], "steps in order")?;
        Ok(())
    });
    builder.test("forgotten", |assert| {
        assert.step("dangling")?;
        Ok(())
    });

    let (summary, log) = run(builder);
    let ends = log.stable_payloads(EventKind::TestEnd);

    let ordered = by_name(&ends, "ordered");
    assert_eq!(ordered["status"], json!("passed"));
    assert_eq!(
        messages(ordered, "assertions"),
        vec!["connect", "query", "steps in order"]
    );
    assert_eq!(
        messages(by_name(&ends, "swapped"), "errors"),
        vec!["steps in order"]
    );
    assert_eq!(
        messages(by_name(&ends, "forgotten"), "errors"),
        vec![
            "expected verify_steps() to be called before the end of the test after using step(); unverified steps: dangling"
        ]
    );
    assert_eq!(summary.counts.passed, 1);
    assert_eq!(summary.counts.failed, 2);
}
