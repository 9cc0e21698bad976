use crate::step::StepId;
use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Most failures inside a run are *not* errors: a failing block attempt, a
/// timeout, or an unresolvable binding is recorded in the step result and
/// handled by branching. This enum covers the cases that do escape — a run
/// that could not acquire an execution surface, invalid workflow
/// configuration, and the error channel of the injected capability traits.
///
/// # Non-Exhaustive
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code. When matching
/// on this error, always include a wildcard pattern.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// The execution surface (browser tab) could not be created.
    ///
    /// This is the only failure that aborts a run: without a surface there
    /// is nothing to run against.
    #[error("failed to open execution surface: {0}")]
    Surface(String),

    /// A block dispatch failed.
    ///
    /// Returned by [`BlockExecutor`](crate::BlockExecutor) implementations.
    /// Inside the engine this is converted into a failed attempt and never
    /// propagates out of the step.
    #[error("block dispatch failed: {0}")]
    Block(String),

    /// The status indicator could not be shown or hidden.
    ///
    /// Returned by [`StatusController`](crate::StatusController)
    /// implementations. The runner logs and swallows it; the indicator is
    /// best-effort.
    #[error("status indicator error: {0}")]
    Status(String),

    /// The workflow definition is invalid.
    ///
    /// Returned by the builder when required configuration is missing, and
    /// by [`Workflow::from_json`](crate::Workflow::from_json) when the
    /// document does not parse.
    #[error("invalid workflow configuration: {0}")]
    Configuration(String),

    /// The configured start step does not exist in the workflow.
    ///
    /// Only construction validates the entry point; at runtime an unknown
    /// step id silently ends the run instead.
    #[error("step not found: {0}")]
    StepNotFound(StepId),

    /// A boolean expression failed to parse or evaluate.
    ///
    /// The condition evaluator maps this to `false`; it is visible only to
    /// callers driving [`expr`](crate::expr) directly.
    #[error("expression error: {0}")]
    Expr(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EngineError::Surface("no browser".to_string());
        assert_eq!(
            error.to_string(),
            "failed to open execution surface: no browser"
        );

        let error = EngineError::StepNotFound(StepId::new("login"));
        assert_eq!(error.to_string(), "step not found: login");

        let error = EngineError::Configuration("start step must be specified".to_string());
        assert_eq!(
            error.to_string(),
            "invalid workflow configuration: start step must be specified"
        );
    }

    #[test]
    fn test_expr_error_display() {
        let error = EngineError::Expr("unexpected token '}'".to_string());
        assert_eq!(error.to_string(), "expression error: unexpected token '}'");
    }
}
