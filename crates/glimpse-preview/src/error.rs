use std::time::Duration;

/// Transport-level gateway failures.
///
/// A compiler that runs and rejects the source is not an error here; that is
/// a [`CompileResponse`](crate::CompileResponse) with `success: false`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to start compiler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Compiler I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Compiler did not respond within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Compiler unavailable: {0}")]
    Unavailable(String),
}

/// Errors driving the pipeline itself rather than a run's outcome.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Pipeline task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Failed to watch sources: {0}")]
    Watch(#[from] notify::Error),
}
