//! Compile, instantiate and render a component.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use glimpse_preview::{
    CompilationGateway, FallbackGateway, PreviewController, PreviewState, SourceEvent,
    SourceSubmission, SourceWatcher, TargetRuntime,
};
use glimpse_runtime::{to_markup, BoundaryState, ComponentFactory, ElementRuntime, IsolationBoundary};

use super::read_source;
use crate::config::{load_config, ConfigFile};

/// Options for the preview command.
pub struct PreviewOptions {
    pub file: PathBuf,
    pub target: Option<String>,
    pub props: Option<String>,
    pub watch: bool,
}

type Controller = PreviewController<Box<dyn CompilationGateway>>;

/// Build the compiler gateway from config.
fn build_gateway(config: &ConfigFile, config_path: &Path) -> Result<Box<dyn CompilationGateway>> {
    let Some(primary) = config.compiler.gateway() else {
        bail!(
            "No compiler configured. Set [compiler] command in {}",
            config_path.display()
        );
    };

    match config.fallback.gateway() {
        Some(fallback) => {
            tracing::debug!(
                "Using {} with fallback {}",
                primary.program(),
                fallback.program()
            );
            Ok(Box::new(FallbackGateway::new(primary, fallback)))
        }
        None => Ok(Box::new(primary)),
    }
}

fn parse_props(props: Option<&str>) -> Result<serde_json::Value> {
    let Some(props) = props else {
        return Ok(serde_json::json!({}));
    };
    let value: serde_json::Value =
        serde_json::from_str(props).context("Failed to parse --props as JSON")?;
    if !value.is_object() {
        bail!("--props must be a JSON object");
    }
    Ok(value)
}

/// Run the preview command.
pub async fn run(config_path: &Path, options: PreviewOptions) -> Result<()> {
    let config = load_config(config_path)?;
    let props = parse_props(options.props.as_deref())?;
    let target = TargetRuntime::from_tag(options.target.as_deref().unwrap_or(&config.preview.target));

    let factory = ComponentFactory::with_binding(ElementRuntime::named(&config.preview.binding))
        .with_limits(config.sandbox.limits());
    let controller: Controller =
        PreviewController::new(build_gateway(&config, config_path)?, factory);
    let mut boundary = IsolationBoundary::new();

    let rendered = preview_once(&controller, &mut boundary, &options.file, &target, &props).await?;

    if !options.watch {
        controller.unmount();
        if !rendered {
            bail!("Preview of {} failed", options.file.display());
        }
        return Ok(());
    }

    // Watch the parent directory; editors often replace files instead of writing in place.
    let watch_dir = options
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = options.file.file_name().map(|n| n.to_os_string());

    let (_watcher, mut events) = SourceWatcher::new(&[watch_dir])?;
    tracing::info!("Watching {} for changes", options.file.display());

    while let Some(event) = events.recv().await {
        if event.path().file_name().map(|n| n.to_os_string()) != file_name {
            continue;
        }
        match event {
            SourceEvent::Changed(_) => {
                refresh(&controller, &mut boundary, &options.file, &target, &props).await;
            }
            SourceEvent::Removed(path) => {
                tracing::warn!("{} was removed", path.display());
            }
        }
    }

    controller.unmount();
    Ok(())
}

/// Re-run the preview after a change. Failures are logged so the watch
/// session survives a file that is briefly missing mid-save.
async fn refresh(
    controller: &Controller,
    boundary: &mut IsolationBoundary,
    file: &Path,
    target: &TargetRuntime,
    props: &serde_json::Value,
) -> bool {
    match preview_once(controller, boundary, file, target, props).await {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::error!("Preview of {} failed: {:#}", file.display(), e);
            false
        }
    }
}

/// Submit the file once and print the outcome. Returns whether it rendered.
async fn preview_once(
    controller: &Controller,
    boundary: &mut IsolationBoundary,
    file: &Path,
    target: &TargetRuntime,
    props: &serde_json::Value,
) -> Result<bool> {
    let source = read_source(file, false)?;
    tracing::info!("Compiling {}...", file.display());

    controller
        .submit(SourceSubmission::new(source, target.clone()))
        .wait()
        .await?;

    match controller.state() {
        PreviewState::Ready(handle) => {
            let name = handle.name().to_string();
            match boundary.mount(handle, props.clone()) {
                BoundaryState::Rendered(nodes) => {
                    tracing::info!("Rendered {}", name);
                    println!("{}", to_markup(nodes));
                    Ok(true)
                }
                BoundaryState::Captured(captured) => {
                    tracing::error!("{} threw while rendering: {}", name, captured.error);
                    Ok(false)
                }
                BoundaryState::Empty => Ok(false),
            }
        }
        PreviewState::Failed(failure) => {
            boundary.unmount();
            tracing::error!("{}: {}", failure.kind, failure.message);
            Ok(false)
        }
        PreviewState::Idle | PreviewState::Compiling => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn props_must_be_an_object() {
        assert_eq!(parse_props(None).unwrap(), serde_json::json!({}));
        assert_eq!(
            parse_props(Some(r#"{"title":"Hi"}"#)).unwrap()["title"],
            "Hi"
        );
        assert!(parse_props(Some("[1, 2]")).is_err());
        assert!(parse_props(Some("{oops")).is_err());
    }

    #[test]
    fn gateway_requires_a_compiler() {
        let config = ConfigFile::default();
        assert!(build_gateway(&config, Path::new("glimpse.toml")).is_err());
    }

    #[cfg(unix)]
    fn echo_controller() -> Controller {
        let mut config = ConfigFile::default();
        config.compiler.command = Some("sh".to_string());
        config.compiler.args = vec![
            "-c".to_string(),
            "cat > /dev/null; echo \"local Hello = function() return React.createElement('p', nil, 'hi') end\"".to_string(),
        ];
        PreviewController::new(
            build_gateway(&config, Path::new("glimpse.toml")).unwrap(),
            ComponentFactory::new(),
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn refresh_survives_a_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("Hello.tsx");
        let controller = echo_controller();
        let mut boundary = IsolationBoundary::new();
        let props = serde_json::json!({});

        let rendered = refresh(&controller, &mut boundary, &file, &TargetRuntime::React, &props).await;
        assert!(!rendered);

        std::fs::write(&file, "const Hello = () => <p>hi</p>;").unwrap();
        let rendered = refresh(&controller, &mut boundary, &file, &TargetRuntime::React, &props).await;
        assert!(rendered);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn previews_with_a_command_compiler() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("Hello.tsx");
        std::fs::write(&file, "const Hello = () => <p>hi</p>;").unwrap();

        let controller = echo_controller();
        let mut boundary = IsolationBoundary::new();
        let rendered = preview_once(
            &controller,
            &mut boundary,
            &file,
            &TargetRuntime::React,
            &serde_json::json!({}),
        )
        .await
        .unwrap();

        assert!(rendered);
        assert_eq!(to_markup(boundary.output().unwrap()), "<p>hi</p>");
    }
}
