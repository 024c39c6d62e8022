//! Synchronous, ordered event dispatch.
//!
//! Handlers run to completion, in registration order, before the scheduler
//! moves on. There is no buffering: a slow handler stalls the run.

use std::collections::HashMap;

use crate::events::{Event, EventKind};

pub type Handler = Box<dyn FnMut(&Event)>;

#[derive(Default)]
pub struct EventEmitter {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&Event) + 'static) {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every handler registered for the event's kind.
    pub fn emit(&mut self, event: &Event) {
        let Some(handlers) = self.handlers.get_mut(&event.kind()) else {
            return;
        };
        for handler in handlers {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Assertion;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn assertion_event() -> Event {
        Event::Assertion(Assertion {
            passed: true,
            message: Some("m".to_string()),
            todo: false,
            stack: None,
        })
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut emitter = EventEmitter::new();
        for label in ["first", "second"] {
            let seen = Rc::clone(&seen);
            emitter.on(EventKind::Assertion, move |_| seen.borrow_mut().push(label));
        }

        emitter.emit(&assertion_event());
        assert_eq!(*seen.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn emit_only_reaches_matching_kind() {
        let hits = Rc::new(RefCell::new(0));
        let mut emitter = EventEmitter::new();
        let counter = Rc::clone(&hits);
        emitter.on(EventKind::TestEnd, move |_| *counter.borrow_mut() += 1);

        emitter.emit(&assertion_event());
        assert_eq!(*hits.borrow(), 0);
        assert_eq!(emitter.handler_count(EventKind::TestEnd), 1);
        assert_eq!(emitter.handler_count(EventKind::RunEnd), 0);
    }

    #[test]
    fn handler_copy_does_not_leak_to_next_handler() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut emitter = EventEmitter::new();
        emitter.on(EventKind::Assertion, |event| {
            let mut owned = event.clone();
            if let Event::Assertion(assertion) = &mut owned {
                assertion.message = Some("mutated".to_string());
            }
        });
        let sink = Rc::clone(&seen);
        emitter.on(EventKind::Assertion, move |event| sink.borrow_mut().push(event.clone()));

        emitter.emit(&assertion_event());
        assert_eq!(seen.borrow()[0], assertion_event());
    }
}
