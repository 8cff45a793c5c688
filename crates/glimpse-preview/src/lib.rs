//! Preview pipeline for generated React components.
//!
//! A [`PreviewController`] takes each [`SourceSubmission`], finds the
//! component name, normalizes the TSX, sends it through a
//! [`CompilationGateway`] and instantiates the result with a
//! [`ComponentFactory`](glimpse_runtime::ComponentFactory). Only the latest
//! submission's outcome is ever visible in [`PreviewState`].

pub mod command;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod state;
pub mod submission;
pub mod watcher;

pub use command::CommandGateway;
pub use controller::{PipelineRun, PreviewController, EMPTY_INPUT_MESSAGE};
pub use error::{GatewayError, PipelineError};
pub use gateway::{
    CompilationGateway, CompilationOutcome, CompileResponse, FallbackGateway,
    DEFAULT_COMPILE_ERROR,
};
pub use state::{FailureKind, Phase, PreviewFailure, PreviewState};
pub use submission::{SourceSubmission, TargetRuntime};
pub use watcher::{SourceEvent, SourceWatcher, SOURCE_EXTENSIONS};
