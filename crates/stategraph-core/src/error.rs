use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    // Graph construction errors
    #[error("Step already registered: {0}")]
    DuplicateName(String),

    #[error("Step name is reserved: {0}")]
    ReservedName(String),

    #[error("Graph validation failed: {}", format_issues(.0))]
    GraphValidation(Vec<ValidationIssue>),

    // Graph execution errors
    #[error("Router for step '{step}' returned unmapped label: {label}")]
    UnknownLabel { step: String, label: String },

    #[error("Step '{step}' failed: {source}")]
    StepExecution {
        step: String,
        #[source]
        source: Box<GraphError>,
    },

    #[error("Run exceeded step limit ({0})")]
    StepLimitExceeded(usize),

    /// Failure raised by user code inside a step or router.
    #[error("{0}")]
    Step(String),

    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    /// Shorthand for a failure raised from step or router code.
    pub fn step(message: impl Into<String>) -> Self {
        Self::Step(message.into())
    }

    /// The innermost error, unwrapping any `StepExecution` layers.
    pub fn root_cause(&self) -> &GraphError {
        match self {
            GraphError::StepExecution { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A single referential-integrity problem found by `compile()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// No entry step was set.
    MissingEntry,
    /// The entry step is not a declared step.
    UnknownEntry(String),
    /// An edge leaves a step that was never declared.
    UnknownSource { from: String },
    /// An edge points at a step that was never declared.
    UnknownTarget { from: String, to: String },
    /// A step has more than one outgoing transition.
    AmbiguousTransition { step: String, count: usize },
    /// A step has no outgoing transition and can never reach the end.
    DeadEnd(String),
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingEntry => write!(f, "no entry step set"),
            ValidationIssue::UnknownEntry(name) => write!(f, "entry step '{}' is not declared", name),
            ValidationIssue::UnknownSource { from } => {
                write!(f, "edge source '{}' is not declared", from)
            }
            ValidationIssue::UnknownTarget { from, to } => {
                write!(f, "edge '{}' -> '{}' targets an undeclared step", from, to)
            }
            ValidationIssue::AmbiguousTransition { step, count } => {
                write!(f, "step '{}' has {} outgoing transitions", step, count)
            }
            ValidationIssue::DeadEnd(step) => write!(f, "step '{}' has no outgoing transition", step),
        }
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_issue() {
        let err = GraphError::GraphValidation(vec![
            ValidationIssue::MissingEntry,
            ValidationIssue::UnknownTarget {
                from: "a".into(),
                to: "ghost".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("no entry step set"));
        assert!(msg.contains("'a' -> 'ghost'"));
    }

    #[test]
    fn test_root_cause_unwraps_step_execution() {
        let err = GraphError::StepExecution {
            step: "outer".into(),
            source: Box::new(GraphError::LlmRequest("HTTP 500".into())),
        };
        assert!(matches!(err.root_cause(), GraphError::LlmRequest(_)));
        assert!(err.to_string().contains("Step 'outer' failed"));
    }
}
