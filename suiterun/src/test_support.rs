//! Test-only helpers for recording and normalising reporter events.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::events::{EventKind, strip_unstable};
use crate::scheduler::Runner;

/// Ordered record of every event a runner emitted.
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Rc<RefCell<Vec<(EventKind, Value)>>>,
}

impl EventLog {
    /// Subscribe to every event kind on `runner`.
    pub fn attach(runner: &mut Runner) -> Self {
        let log = Self::default();
        for kind in EventKind::ALL {
            let entries = Rc::clone(&log.entries);
            runner.on(kind, move |event| {
                entries.borrow_mut().push((event.kind(), event.payload()));
            });
        }
        log
    }

    /// Event names in emission order.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.entries.borrow().iter().map(|(kind, _)| *kind).collect()
    }

    /// Payloads of one kind with `runtime`/`stack` removed.
    pub fn stable_payloads(&self, kind: EventKind) -> Vec<Value> {
        self.entries
            .borrow()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, value)| {
                let mut value = value.clone();
                strip_unstable(&mut value);
                value
            })
            .collect()
    }

    /// Raw payloads of one kind.
    pub fn payloads(&self, kind: EventKind) -> Vec<Value> {
        self.entries
            .borrow()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// `(kind, name)` pairs for start/end events, for compact order checks.
    pub fn trace(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .map(|(kind, value)| match value.get("name").and_then(Value::as_str) {
                Some(name) if !name.is_empty() => format!("{kind}({name})"),
                _ => kind.to_string(),
            })
            .collect()
    }
}
