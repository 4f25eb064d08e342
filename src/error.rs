//! Error taxonomy for the scenario runner.
//!
//! Every failure that can surface from loading, expanding, resolving, or
//! executing a scenario is one of the variants of [`RunnerError`]. Each
//! variant additionally carries a numbered [`ErrorCode`] purely for log
//! correlation; callers must match on the variant, never the number.

use std::fmt;

use thiserror::Error;

/// A numbered error code, grouped by category via its leading digit.
///
/// `1xxx` validation, `2xxx` expansion, `3xxx` selector, `4xxx`
/// execution/timeout, `5xxx` artifact/report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    pub const VALIDATION_STRUCTURE: ErrorCode = ErrorCode(1001);
    pub const VALIDATION_GRAMMAR: ErrorCode = ErrorCode(1002);
    pub const VALIDATION_ENUM: ErrorCode = ErrorCode(1003);
    pub const VALIDATION_RANGE: ErrorCode = ErrorCode(1004);

    pub const UNRESOLVED_VARIABLE: ErrorCode = ErrorCode(2001);

    pub const SELECTOR_RESOLUTION: ErrorCode = ErrorCode(3001);
    pub const SELECTOR_AMBIGUOUS: ErrorCode = ErrorCode(3002);

    pub const UNKNOWN_STEP_KIND: ErrorCode = ErrorCode(4001);
    pub const STEP_TIMEOUT: ErrorCode = ErrorCode(4002);
    pub const STEP_EXECUTION: ErrorCode = ErrorCode(4003);

    pub const ARTIFACT_IO: ErrorCode = ErrorCode(5001);
    pub const SECRET_LOST: ErrorCode = ErrorCode(5002);

    pub fn code(&self) -> u16 {
        self.0
    }

    pub fn formatted(&self) -> String {
        format!("E{:04}", self.0)
    }

    pub fn category(&self) -> ErrorCategory {
        match self.0 / 1000 {
            1 => ErrorCategory::Validation,
            2 => ErrorCategory::Expansion,
            3 => ErrorCategory::Selector,
            4 => ErrorCategory::Execution,
            5 => ErrorCategory::Artifact,
            _ => ErrorCategory::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Expansion,
    Selector,
    Execution,
    Artifact,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Expansion => "expansion",
            ErrorCategory::Selector => "selector",
            ErrorCategory::Execution => "execution",
            ErrorCategory::Artifact => "artifact",
            ErrorCategory::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// One structural or grammatical problem found while loading a scenario.
///
/// Validation never short-circuits: a load collects every `ValidationIssue`
/// it can find before failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub line: Option<usize>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}: {} (line {})", self.path, self.message, line),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// Top-level error taxonomy, corresponding one-for-one with the runner's
/// documented error contract.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("scenario failed validation: {}", summarize(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("unresolved variable ${{{namespace}.{name}}}")]
    UnresolvedVariable { namespace: String, name: String },

    #[error("selector resolution failed: {0}")]
    SelectorResolution(String),

    #[error("step '{step_name}' exceeded its {budget_ms}ms timeout")]
    StepTimeout { step_name: String, budget_ms: u64 },

    #[error("step '{step_name}' failed: {source}")]
    StepExecution {
        step_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unknown step kind '{0}'")]
    UnknownStepKind(String),

    #[error("refine would drop {before} secret flag(s) down to {after}")]
    SecretLost { before: usize, after: usize },

    #[error("artifact error: {0}")]
    Artifact(String),
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl RunnerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RunnerError::Validation(_) => ErrorCode::VALIDATION_STRUCTURE,
            RunnerError::UnresolvedVariable { .. } => ErrorCode::UNRESOLVED_VARIABLE,
            RunnerError::SelectorResolution(_) => ErrorCode::SELECTOR_RESOLUTION,
            RunnerError::StepTimeout { .. } => ErrorCode::STEP_TIMEOUT,
            RunnerError::StepExecution { .. } => ErrorCode::STEP_EXECUTION,
            RunnerError::UnknownStepKind(_) => ErrorCode::UNKNOWN_STEP_KIND,
            RunnerError::SecretLost { .. } => ErrorCode::SECRET_LOST,
            RunnerError::Artifact(_) => ErrorCode::ARTIFACT_IO,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code().category()
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
