//! Error types for instantiation and rendering.

/// Errors turning compiled code into a component handle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InstantiationError {
    #[error("Invalid component identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Failed to prepare script sandbox: {0}")]
    Sandbox(String),

    #[error("Component code failed to evaluate: {0}")]
    Evaluation(String),

    #[error("Component '{name}' is not callable (found {found})")]
    NotCallable { name: String, found: &'static str },
}

/// Errors raised while a mounted component renders or updates.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    #[error("{0}")]
    Script(String),

    #[error("Objects of type {0} are not valid as a child")]
    InvalidChild(&'static str),

    #[error("Element type is invalid: expected a tag name or a component function, found {0}")]
    InvalidElementType(&'static str),

    #[error("Too many re-renders ({0}); a component keeps updating state while rendering")]
    TooManyRerenders(usize),

    #[error("Maximum render depth of {0} exceeded")]
    DepthExceeded(usize),

    #[error("Host callback panicked: {0}")]
    Panic(String),
}

impl From<mlua::Error> for RenderError {
    fn from(err: mlua::Error) -> Self {
        RenderError::Script(err.to_string())
    }
}

/// Errors dispatching an event to a rendered handler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error("Nothing is mounted")]
    NotMounted,

    #[error("The boundary is showing a captured error")]
    Captured,

    #[error("Unknown handler id {0}")]
    UnknownHandler(usize),

    #[error("Event handler failed: {0}")]
    Handler(String),
}
