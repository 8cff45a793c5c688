//! Inputs to a pipeline run.

use std::fmt;

/// UI runtime a submission targets.
///
/// Only React components can be previewed; every other tag is carried
/// verbatim so the failure can name it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetRuntime {
    #[default]
    React,
    Unsupported(String),
}

impl TargetRuntime {
    /// Parse a runtime tag. `react`, `tsx` and `jsx` select React.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "react" | "tsx" | "jsx" => TargetRuntime::React,
            _ => TargetRuntime::Unsupported(tag.to_string()),
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, TargetRuntime::React)
    }
}

impl fmt::Display for TargetRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRuntime::React => f.write_str("react"),
            TargetRuntime::Unsupported(tag) => f.write_str(tag),
        }
    }
}

/// One source-text-plus-target unit driving a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSubmission {
    pub text: String,
    pub target: TargetRuntime,
}

impl SourceSubmission {
    pub fn new(text: impl Into<String>, target: TargetRuntime) -> Self {
        Self {
            text: text.into(),
            target,
        }
    }

    /// A submission targeting React.
    pub fn react(text: impl Into<String>) -> Self {
        Self::new(text, TargetRuntime::React)
    }
}
