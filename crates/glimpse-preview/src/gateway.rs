//! The compilation port: normalized source in, executable code out.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GatewayError;

/// Message used when a compiler rejects source without saying why.
pub const DEFAULT_COMPILE_ERROR: &str = "Compilation failed";

/// Wire shape of a compile answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResponse {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub error: Option<String>,

    pub success: bool,
}

impl CompileResponse {
    pub fn compiled(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            error: None,
            success: true,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: String::new(),
            error: Some(message.into()),
            success: false,
        }
    }

    /// Collapse the wire shape into an outcome.
    ///
    /// Rejection messages pass through verbatim; a missing or blank message
    /// becomes [`DEFAULT_COMPILE_ERROR`].
    pub fn into_outcome(self) -> CompilationOutcome {
        if self.success {
            return CompilationOutcome::Compiled { code: self.code };
        }
        let message = self
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COMPILE_ERROR.to_string());
        CompilationOutcome::Rejected { message }
    }
}

/// Result of one compile call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilationOutcome {
    Compiled { code: String },
    Rejected { message: String },
}

/// A service that compiles normalized JSX into executable component code.
///
/// Called once per pipeline run and never retried. Whether the work happens
/// out of process or in process is up to the implementation.
#[async_trait]
pub trait CompilationGateway: Send + Sync {
    async fn compile(&self, source: &str) -> Result<CompileResponse, GatewayError>;
}

#[async_trait]
impl<T: CompilationGateway + ?Sized> CompilationGateway for Arc<T> {
    async fn compile(&self, source: &str) -> Result<CompileResponse, GatewayError> {
        (**self).compile(source).await
    }
}

#[async_trait]
impl<T: CompilationGateway + ?Sized> CompilationGateway for Box<T> {
    async fn compile(&self, source: &str) -> Result<CompileResponse, GatewayError> {
        (**self).compile(source).await
    }
}

/// Tries `primary`, then `fallback` when the primary is unreachable or
/// rejects the source.
pub struct FallbackGateway<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackGateway<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P, F> CompilationGateway for FallbackGateway<P, F>
where
    P: CompilationGateway,
    F: CompilationGateway,
{
    async fn compile(&self, source: &str) -> Result<CompileResponse, GatewayError> {
        match self.primary.compile(source).await {
            Ok(response) if response.success => Ok(response),
            Ok(response) => {
                warn!(
                    error = response.error.as_deref().unwrap_or(DEFAULT_COMPILE_ERROR),
                    "Primary compiler rejected source, trying fallback"
                );
                self.fallback.compile(source).await
            }
            Err(e) => {
                warn!(error = %e, "Primary compiler unavailable, trying fallback");
                self.fallback.compile(source).await
            }
        }
    }
}
