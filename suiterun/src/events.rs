//! Reporter events and their payload snapshots.
//!
//! Payloads are owned copies built from the tree at emission time. Field
//! names follow the reporter contract (camelCase). `runtime` and `stack` are
//! the only unstable fields; [`strip_unstable`] removes them for comparisons.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::{Assertion, StartCounts, Status, TestCounts};
use crate::error::UsageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    RunStart,
    SuiteStart,
    TestStart,
    Assertion,
    TestEnd,
    SuiteEnd,
    RunEnd,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::RunStart,
        EventKind::SuiteStart,
        EventKind::TestStart,
        EventKind::Assertion,
        EventKind::TestEnd,
        EventKind::SuiteEnd,
        EventKind::RunEnd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::RunStart => "runStart",
            EventKind::SuiteStart => "suiteStart",
            EventKind::TestStart => "testStart",
            EventKind::Assertion => "assertion",
            EventKind::TestEnd => "testEnd",
            EventKind::SuiteEnd => "suiteEnd",
            EventKind::RunEnd => "runEnd",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UsageError::UnknownEvent(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStart {
    pub name: String,
    pub full_name: Vec<String>,
    pub suite_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEnd {
    pub name: String,
    pub full_name: Vec<String>,
    pub suite_name: String,
    pub status: Status,
    /// Milliseconds.
    pub runtime: f64,
    pub errors: Vec<Assertion>,
    pub assertions: Vec<Assertion>,
    /// Set on tests the run declined to start after an abort.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub aborted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteStart {
    pub name: String,
    pub full_name: Vec<String>,
    pub tests: Vec<TestStart>,
    pub child_suites: Vec<SuiteStart>,
    pub test_counts: StartCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteEnd {
    pub name: String,
    pub full_name: Vec<String>,
    pub tests: Vec<TestEnd>,
    pub child_suites: Vec<SuiteEnd>,
    pub status: Status,
    pub test_counts: TestCounts,
    /// Milliseconds.
    pub runtime: f64,
}

/// A lifecycle event. Serializes to its bare payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    RunStart(SuiteStart),
    SuiteStart(SuiteStart),
    TestStart(TestStart),
    Assertion(Assertion),
    TestEnd(TestEnd),
    SuiteEnd(SuiteEnd),
    RunEnd(SuiteEnd),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::RunStart(_) => EventKind::RunStart,
            Event::SuiteStart(_) => EventKind::SuiteStart,
            Event::TestStart(_) => EventKind::TestStart,
            Event::Assertion(_) => EventKind::Assertion,
            Event::TestEnd(_) => EventKind::TestEnd,
            Event::SuiteEnd(_) => EventKind::SuiteEnd,
            Event::RunEnd(_) => EventKind::RunEnd,
        }
    }

    /// The payload as JSON.
    pub fn payload(&self) -> Value {
        // Payloads contain only strings, numbers, bools and sequences.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Remove `runtime` and `stack` from every object in `value`.
pub fn strip_unstable(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("runtime");
            map.remove("stack");
            for child in map.values_mut() {
                strip_unstable(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_unstable(item);
            }
        }
        _ => {}
    }
}
