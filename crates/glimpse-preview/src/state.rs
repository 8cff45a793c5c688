//! The externally observed preview state.

use std::fmt;

use glimpse_runtime::ComponentHandle;

/// Coarse phase of [`PreviewState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Compiling,
    Ready,
    Failed,
}

/// Why a pipeline run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UnsupportedTarget,
    EmptyInput,
    IdentifierNotFound,
    CompilationFailed,
    InstantiationFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::UnsupportedTarget => "unsupported target",
            FailureKind::EmptyInput => "empty input",
            FailureKind::IdentifierNotFound => "identifier not found",
            FailureKind::CompilationFailed => "compilation failed",
            FailureKind::InstantiationFailed => "instantiation failed",
        };
        f.write_str(label)
    }
}

/// A terminal failure with its human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl PreviewFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PreviewFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What the hosting surface should show: nothing, a spinner, the component
/// or an error panel.
#[derive(Debug, Clone, Default)]
pub enum PreviewState {
    #[default]
    Idle,
    Compiling,
    Ready(ComponentHandle),
    Failed(PreviewFailure),
}

impl PreviewState {
    pub(crate) fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        PreviewState::Failed(PreviewFailure::new(kind, message))
    }

    pub fn phase(&self) -> Phase {
        match self {
            PreviewState::Idle => Phase::Idle,
            PreviewState::Compiling => Phase::Compiling,
            PreviewState::Ready(_) => Phase::Ready,
            PreviewState::Failed(_) => Phase::Failed,
        }
    }

    pub fn component(&self) -> Option<&ComponentHandle> {
        match self {
            PreviewState::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&PreviewFailure> {
        match self {
            PreviewState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Failure message, if the run failed.
    pub fn message(&self) -> Option<&str> {
        self.failure().map(|f| f.message.as_str())
    }

    /// Whether a run has reached `Ready` or `Failed`.
    pub fn is_settled(&self) -> bool {
        matches!(self, PreviewState::Ready(_) | PreviewState::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_follow_the_variant() {
        let state = PreviewState::failed(FailureKind::EmptyInput, "No code provided");
        assert_eq!(state.phase(), Phase::Failed);
        assert_eq!(state.message(), Some("No code provided"));
        assert!(state.component().is_none());
        assert!(state.is_settled());

        let idle = PreviewState::default();
        assert_eq!(idle.phase(), Phase::Idle);
        assert_eq!(idle.message(), None);
        assert!(!PreviewState::Compiling.is_settled());
    }
}
