//! `glimpse.toml` configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use glimpse_preview::CommandGateway;
use glimpse_runtime::{SandboxLimits, DEFAULT_BINDING_NAME};
use serde::Deserialize;

/// Configuration file structure (glimpse.toml).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub preview: PreviewSettings,
    #[serde(default)]
    pub compiler: CompilerSettings,
    #[serde(default)]
    pub fallback: CompilerSettings,
    #[serde(default)]
    pub sandbox: SandboxSettings,
}

#[derive(Debug, Deserialize)]
pub struct PreviewSettings {
    /// Target runtime tag for submissions
    #[serde(default = "default_target")]
    pub target: String,
    /// Name the UI runtime is injected under
    #[serde(default = "default_binding")]
    pub binding: String,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            target: default_target(),
            binding: default_binding(),
        }
    }
}

/// An external compiler command.
#[derive(Debug, Deserialize, Default)]
pub struct CompilerSettings {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub timeout_ms: Option<u64>,
}

impl CompilerSettings {
    /// Gateway for this command, if one is configured.
    pub fn gateway(&self) -> Option<CommandGateway> {
        let command = self.command.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        let mut gateway = CommandGateway::new(command).args(self.args.iter().cloned());
        if let Some(ms) = self.timeout_ms {
            gateway = gateway.timeout(Duration::from_millis(ms));
        }
        Some(gateway)
    }
}

#[derive(Debug, Deserialize)]
pub struct SandboxSettings {
    #[serde(default = "default_memory_mb")]
    pub memory_mb: usize,
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            memory_mb: default_memory_mb(),
            time_budget_ms: default_time_budget_ms(),
        }
    }
}

impl SandboxSettings {
    pub fn limits(&self) -> SandboxLimits {
        SandboxLimits {
            memory_bytes: self.memory_mb.saturating_mul(1024 * 1024),
            time_budget: Duration::from_millis(self.time_budget_ms),
        }
    }
}

fn default_target() -> String {
    "react".to_string()
}
fn default_binding() -> String {
    DEFAULT_BINDING_NAME.to_string()
}
fn default_memory_mb() -> usize {
    8
}
fn default_time_budget_ms() -> u64 {
    250
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}

pub const DEFAULT_CONFIG: &str = r#"# Glimpse Configuration

[preview]
# Target runtime; only "react" can be previewed
target = "react"

# Name the UI runtime is visible under in compiled code
binding = "React"

[compiler]
# Command that reads normalized JSX on stdin and prints compiled Luau,
# or a JSON object { "code": "...", "error": null, "success": true }
# command = "jsx2luau"
args = []
# timeout_ms = 10000

[fallback]
# Optional second compiler, used when the first is unreachable or rejects
# command = ""

[sandbox]
# Heap limit per component VM
memory_mb = 8

# Time budget per evaluation, render or event handler
time_budget_ms = 250
"#;
