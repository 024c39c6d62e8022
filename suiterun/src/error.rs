//! Typed engine errors.
//!
//! Assertion failures, uncaught test errors and timeouts are not errors at
//! this level: they become failing assertions on the running test.

use thiserror::Error;

/// Invalid declarations, reported before the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid test declarations:\n- {}", .violations.join("\n- "))]
pub struct BuildError {
    pub violations: Vec<String>,
}

/// Misuse of the engine API by test code or embedders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("assertion recorded while `{test}` is not the running test")]
    NoActiveTest { test: String },
    #[error("unknown event name `{0}`")]
    UnknownEvent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_lists_every_violation() {
        let err = BuildError {
            violations: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "invalid test declarations:\n- first\n- second"
        );
    }
}
