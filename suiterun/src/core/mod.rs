//! Deterministic, pure logic shared by the engine.
//!
//! Core modules must be free of I/O and scheduling side effects. They operate
//! on in-memory data structures and return deterministic outputs suitable for
//! tests.

pub mod filter;
pub mod invariants;
pub mod plan;
pub mod recorder;
pub mod rollup;
pub mod status;
pub mod types;
