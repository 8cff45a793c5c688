//! The cancellable pipeline driver.
//!
//! Every submission starts a run tagged with a new generation. A run commits
//! to the shared state only if its generation is still current and the
//! controller is still mounted; the check happens inside the state channel's
//! write so no newer commit can slip in between. Superseded runs are not
//! aborted, their results are just never observed. Instantiation runs on the
//! blocking pool; its result goes through the same check.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use glimpse_runtime::ComponentFactory;
use glimpse_source::{extract_component_name, normalize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::PipelineError;
use crate::gateway::{CompilationGateway, CompilationOutcome};
use crate::state::{FailureKind, PreviewState};
use crate::submission::{SourceSubmission, TargetRuntime};

/// Failure message for blank submissions.
pub const EMPTY_INPUT_MESSAGE: &str = "No code provided";

struct Inner<G> {
    gateway: G,
    factory: ComponentFactory,
    state: watch::Sender<PreviewState>,
    generation: AtomicU64,
    mounted: AtomicBool,
}

impl<G> Inner<G> {
    fn is_live(&self, generation: u64) -> bool {
        self.mounted.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Write `next` if `generation` is still current. Returns whether it was.
    fn commit(&self, generation: u64, next: PreviewState) -> bool {
        let committed = self.state.send_if_modified(|state| {
            if !self.is_live(generation) {
                return false;
            }
            *state = next;
            true
        });
        if !committed {
            debug!(generation, "Dropping stale pipeline result");
        }
        committed
    }
}

impl<G: CompilationGateway> Inner<G> {
    async fn run(&self, generation: u64, submission: &SourceSubmission) -> PreviewState {
        let Some(identifier) = extract_component_name(&submission.text) else {
            return PreviewState::failed(
                FailureKind::IdentifierNotFound,
                "Could not find a component name. Declare it as `const Name = ...`, \
                 `function Name(...)` or `export default Name`.",
            );
        };

        let normalized = normalize(&submission.text);
        debug!(generation, component = %identifier, bytes = normalized.len(), "Compiling preview");

        let outcome = match self.gateway.compile(&normalized).await {
            Ok(response) => response.into_outcome(),
            Err(e) => CompilationOutcome::Rejected {
                message: e.to_string(),
            },
        };
        let code = match outcome {
            CompilationOutcome::Compiled { code } => code,
            CompilationOutcome::Rejected { message } => {
                return PreviewState::failed(FailureKind::CompilationFailed, message)
            }
        };

        if !self.is_live(generation) {
            // Commit would drop it anyway; skip building a VM.
            return PreviewState::Compiling;
        }

        // Evaluation can run for the whole sandbox budget; keep it off the
        // async workers.
        let factory = self.factory.clone();
        let instantiated =
            tokio::task::spawn_blocking(move || factory.instantiate(&code, &identifier)).await;
        match instantiated {
            Ok(Ok(handle)) => PreviewState::Ready(handle),
            Ok(Err(e)) => PreviewState::failed(FailureKind::InstantiationFailed, e.to_string()),
            Err(e) => PreviewState::failed(FailureKind::InstantiationFailed, e.to_string()),
        }
    }
}

/// Drives submissions through extract, normalize, compile and instantiate.
pub struct PreviewController<G> {
    inner: Arc<Inner<G>>,
}

impl<G> Clone for PreviewController<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: CompilationGateway + 'static> PreviewController<G> {
    pub fn new(gateway: G, factory: ComponentFactory) -> Self {
        let (state, _) = watch::channel(PreviewState::Idle);
        Self {
            inner: Arc::new(Inner {
                gateway,
                factory,
                state,
                generation: AtomicU64::new(0),
                mounted: AtomicBool::new(true),
            }),
        }
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.inner.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PreviewState {
        self.inner.state.borrow().clone()
    }

    /// Generation of the most recent submission.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    /// Start a run for `submission`, superseding any run in flight.
    ///
    /// Unsupported targets and blank text fail immediately. Anything else
    /// moves to `Compiling` and continues on a spawned task, so this must be
    /// called from within a Tokio runtime. Submissions after
    /// [`unmount`](Self::unmount) are ignored.
    pub fn submit(&self, submission: SourceSubmission) -> PipelineRun {
        if !self.is_mounted() {
            debug!("Ignoring submission after unmount");
            return PipelineRun::settled(self.generation());
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let TargetRuntime::Unsupported(tag) = &submission.target {
            self.inner.commit(
                generation,
                PreviewState::failed(
                    FailureKind::UnsupportedTarget,
                    format!("Target runtime '{tag}' is not supported; only React components can be previewed"),
                ),
            );
            return PipelineRun::settled(generation);
        }

        if submission.text.trim().is_empty() {
            self.inner.commit(
                generation,
                PreviewState::failed(FailureKind::EmptyInput, EMPTY_INPUT_MESSAGE),
            );
            return PipelineRun::settled(generation);
        }

        self.inner.commit(generation, PreviewState::Compiling);

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let next = inner.run(generation, &submission).await;
            if inner.commit(generation, next) {
                debug!(generation, phase = ?inner.state.borrow().phase(), "Pipeline run settled");
            }
        });

        PipelineRun {
            generation,
            task: Some(task),
        }
    }

    /// Stop observing runs. Results arriving later never change the state.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        debug!("Preview controller unmounted");
    }
}

/// Handle to one submitted run.
///
/// Dropping it does not cancel anything; the run finishes in the background
/// and commits only if still current.
#[derive(Debug)]
pub struct PipelineRun {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl PipelineRun {
    fn settled(generation: u64) -> Self {
        Self {
            generation,
            task: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the run settled without reaching the gateway stage.
    pub fn is_immediate(&self) -> bool {
        self.task.is_none()
    }

    /// Wait for the run's task to finish.
    pub async fn wait(self) -> Result<(), PipelineError> {
        if let Some(task) = self.task {
            task.await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::CompileResponse;
    use crate::state::Phase;
    use async_trait::async_trait;
    use glimpse_runtime::SandboxLimits;
    use std::time::{Duration, Instant};

    struct Echo;

    #[async_trait]
    impl CompilationGateway for Echo {
        async fn compile(&self, _source: &str) -> Result<CompileResponse, GatewayError> {
            Ok(CompileResponse::compiled(
                "local Hello = function() return 'hi' end",
            ))
        }
    }

    #[tokio::test]
    async fn starts_idle_and_reaches_ready() {
        let controller = PreviewController::new(Echo, ComponentFactory::new());
        assert_eq!(controller.state().phase(), Phase::Idle);

        let run = controller.submit(SourceSubmission::react("const Hello = () => <p>hi</p>;"));
        assert_eq!(controller.state().phase(), Phase::Compiling);
        assert_eq!(run.generation(), 1);
        run.wait().await.unwrap();

        let state = controller.state();
        assert_eq!(state.component().map(|c| c.name()), Some("Hello"));
    }

    struct Spin;

    #[async_trait]
    impl CompilationGateway for Spin {
        async fn compile(&self, _source: &str) -> Result<CompileResponse, GatewayError> {
            Ok(CompileResponse::compiled(
                "while true do end\nlocal Hello = function() end",
            ))
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn instantiation_does_not_hold_the_runtime() {
        let factory = ComponentFactory::new().with_limits(SandboxLimits {
            time_budget: Duration::from_millis(300),
            ..Default::default()
        });
        let controller = PreviewController::new(Spin, factory);

        let started = Instant::now();
        let run = controller.submit(SourceSubmission::react("const Hello = () => null;"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let slept = started.elapsed();
        run.wait().await.unwrap();

        assert!(slept < Duration::from_millis(250), "timer held for {slept:?}");
        let state = controller.state();
        assert_eq!(state.failure().unwrap().kind, FailureKind::InstantiationFailed);
    }

    #[tokio::test]
    async fn submissions_after_unmount_are_ignored() {
        let controller = PreviewController::new(Echo, ComponentFactory::new());
        controller.unmount();
        let run = controller.submit(SourceSubmission::react("const Hello = () => null;"));
        assert!(run.is_immediate());
        assert_eq!(controller.state().phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let controller = PreviewController::new(Echo, ComponentFactory::new());
        let mut rx = controller.subscribe();

        controller.submit(SourceSubmission::react("const Hello = () => null;"));
        let state = rx.wait_for(|s| s.is_settled()).await.unwrap().clone();
        assert_eq!(state.phase(), Phase::Ready);
    }
}
