//! Gateway backed by an external compiler process.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::GatewayError;
use crate::gateway::{CompilationGateway, CompileResponse};

/// Runs a compiler command per compile call.
///
/// Normalized source goes to stdin. Stdout is either a JSON
/// [`CompileResponse`] or the compiled code itself. A failing exit without a
/// JSON answer becomes a rejection carrying stderr.
#[derive(Debug, Clone)]
pub struct CommandGateway {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandGateway {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Give up on the process after `timeout`. Off by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl CompilationGateway for CommandGateway {
    async fn compile(&self, source: &str) -> Result<CompileResponse, GatewayError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        debug!(program = %self.program, bytes = source.len(), "Invoking compiler");
        let mut child = command.spawn().map_err(|source| GatewayError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Feed stdin while collecting output; a compiler that streams its
        // answer would otherwise fill the stdout pipe before reading all input.
        let stdin = child.stdin.take();
        let write_input = async move {
            if let Some(mut stdin) = stdin {
                // A compiler that exits without reading is judged by its output.
                if let Err(e) = stdin.write_all(source.as_bytes()).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(e);
                    }
                }
            }
            Ok::<_, std::io::Error>(())
        };
        let run = async move {
            let (written, output) = tokio::join!(write_input, child.wait_with_output());
            written?;
            output
        };

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| GatewayError::Timeout(limit))??,
            None => run.await?,
        };

        Ok(parse_output(
            output.status,
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

fn parse_output(status: ExitStatus, stdout: &str, stderr: &str) -> CompileResponse {
    let trimmed = stdout.trim();
    if trimmed.starts_with('{') {
        if let Ok(response) = serde_json::from_str::<CompileResponse>(trimmed) {
            return response;
        }
    }

    if status.success() {
        return CompileResponse::compiled(stdout);
    }

    let message = stderr.trim();
    if message.is_empty() {
        CompileResponse::failed(format!("Compiler exited with {status}"))
    } else {
        CompileResponse::failed(message)
    }
}
