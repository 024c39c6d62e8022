//! Hierarchical test-execution engine.
//!
//! Client code declares modules and tests through a [`builder::Builder`];
//! the resulting [`tree::SuiteTree`] is drained by a single-threaded
//! [`scheduler::Runner`] that emits reporter [`events`] in a fixed order.
//!
//! - **[`core`]**: Pure, deterministic logic (status precedence, rollup,
//!   queue flattening, selection, invariants). No scheduling or I/O.
//! - **[`scheduler`]**: The cooperative run-loop, timeouts, error capture.
//! - **[`events`]** / **[`emitter`]**: The reporter contract and its
//!   synchronous dispatch.

pub mod assert;
pub mod builder;
pub mod config;
pub mod core;
pub mod emitter;
pub mod error;
pub mod events;
pub mod logging;
pub mod scheduler;
pub mod snapshot;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;

pub use assert::{Assert, Resume};
pub use builder::Builder;
pub use config::EngineConfig;
pub use error::{BuildError, UsageError};
pub use events::{Event, EventKind};
pub use scheduler::{AbortHandle, RunSummary, Runner};
