//! End-to-end pipeline behavior with a scripted compiler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use glimpse_preview::{
    CompilationGateway, CompileResponse, FailureKind, GatewayError, Phase, PreviewController,
    SourceSubmission, TargetRuntime, EMPTY_INPUT_MESSAGE,
};
use glimpse_runtime::{BoundaryState, ComponentFactory, IsolationBoundary, RenderPhase};
use serde_json::json;
use tokio::sync::oneshot;

type Reply = Result<CompileResponse, GatewayError>;

/// Compiler double. Each reply is keyed by a name that appears in the
/// submitted source, and is held until the test releases it.
#[derive(Default)]
struct ScriptedGateway {
    calls: AtomicUsize,
    sources: Mutex<Vec<String>>,
    replies: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
}

impl ScriptedGateway {
    fn expect(&self, key: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().insert(key.to_string(), rx);
        tx
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompilationGateway for ScriptedGateway {
    async fn compile(&self, source: &str) -> Result<CompileResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sources.lock().unwrap().push(source.to_string());

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            let key = replies.keys().find(|k| source.contains(k.as_str())).cloned();
            key.and_then(|k| replies.remove(&k))
        };
        match reply {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(GatewayError::Unavailable("reply dropped".into()))),
            None => Err(GatewayError::Unavailable("no scripted reply".into())),
        }
    }
}

fn controller() -> (Arc<ScriptedGateway>, PreviewController<Arc<ScriptedGateway>>) {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = PreviewController::new(Arc::clone(&gateway), ComponentFactory::new());
    (gateway, controller)
}

fn luau_component(name: &str, text: &str) -> CompileResponse {
    CompileResponse::compiled(format!(
        "local {name} = function() return React.createElement('p', nil, '{text}') end"
    ))
}

#[tokio::test]
async fn later_submission_wins_when_it_resolves_first() {
    let (gateway, controller) = controller();
    let alpha = gateway.expect("Alpha");
    let beta = gateway.expect("Beta");

    let run_a = controller.submit(SourceSubmission::react("const Alpha = () => <p>a</p>;"));
    let run_b = controller.submit(SourceSubmission::react("const Beta = () => <p>b</p>;"));

    beta.send(Ok(luau_component("Beta", "b"))).unwrap();
    run_b.wait().await.unwrap();
    assert_eq!(controller.state().component().unwrap().name(), "Beta");

    alpha.send(Ok(luau_component("Alpha", "a"))).unwrap();
    run_a.wait().await.unwrap();
    assert_eq!(controller.state().component().unwrap().name(), "Beta");
}

#[tokio::test]
async fn earlier_submission_resolving_first_is_discarded() {
    let (gateway, controller) = controller();
    let alpha = gateway.expect("Alpha");
    let beta = gateway.expect("Beta");

    let run_a = controller.submit(SourceSubmission::react("const Alpha = () => <p>a</p>;"));
    let run_b = controller.submit(SourceSubmission::react("const Beta = () => <p>b</p>;"));

    alpha.send(Ok(luau_component("Alpha", "a"))).unwrap();
    run_a.wait().await.unwrap();
    assert_eq!(controller.state().phase(), Phase::Compiling);

    beta.send(Ok(luau_component("Beta", "b"))).unwrap();
    run_b.wait().await.unwrap();
    assert_eq!(controller.state().component().unwrap().name(), "Beta");
}

#[tokio::test]
async fn stale_failures_are_discarded_too() {
    let (gateway, controller) = controller();
    let alpha = gateway.expect("Alpha");
    let beta = gateway.expect("Beta");

    let run_a = controller.submit(SourceSubmission::react("const Alpha = () => <p>a</p>;"));
    let run_b = controller.submit(SourceSubmission::react("const Beta = () => <p>b</p>;"));

    beta.send(Ok(luau_component("Beta", "b"))).unwrap();
    run_b.wait().await.unwrap();
    alpha.send(Ok(CompileResponse::failed("boom"))).unwrap();
    run_a.wait().await.unwrap();

    assert_eq!(controller.state().phase(), Phase::Ready);
}

#[tokio::test]
async fn blank_input_fails_without_compiling() {
    let (gateway, controller) = controller();

    for text in ["", "   ", "\n\t"] {
        let run = controller.submit(SourceSubmission::react(text));
        assert!(run.is_immediate());
        let state = controller.state();
        assert_eq!(state.failure().unwrap().kind, FailureKind::EmptyInput);
        assert_eq!(state.message(), Some(EMPTY_INPUT_MESSAGE));
    }
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn unsupported_target_is_named_and_skips_the_pipeline() {
    let (gateway, controller) = controller();

    let run = controller.submit(SourceSubmission::new(
        "const Card = () => <div />;",
        TargetRuntime::from_tag("vue"),
    ));
    assert!(run.is_immediate());

    let state = controller.state();
    assert_eq!(state.failure().unwrap().kind, FailureKind::UnsupportedTarget);
    assert!(state.message().unwrap().contains("vue"));
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn missing_identifier_fails_before_the_gateway() {
    let (gateway, controller) = controller();

    controller
        .submit(SourceSubmission::react("const lower = () => <div />;"))
        .wait()
        .await
        .unwrap();

    let state = controller.state();
    assert_eq!(state.failure().unwrap().kind, FailureKind::IdentifierNotFound);
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn compiler_message_passes_through_verbatim() {
    let (gateway, controller) = controller();
    let reply = gateway.expect("Card");

    let run = controller.submit(SourceSubmission::react("const Card = () => <div>;"));
    reply
        .send(Ok(CompileResponse {
            code: String::new(),
            error: Some("Unexpected token".to_string()),
            success: false,
        }))
        .unwrap();
    run.wait().await.unwrap();

    let state = controller.state();
    assert_eq!(state.failure().unwrap().kind, FailureKind::CompilationFailed);
    assert_eq!(state.message(), Some("Unexpected token"));
}

#[tokio::test]
async fn transport_errors_become_compilation_failures() {
    let (gateway, controller) = controller();
    let reply = gateway.expect("Card");

    let run = controller.submit(SourceSubmission::react("const Card = () => <div />;"));
    reply
        .send(Err(GatewayError::Unavailable("service down".into())))
        .unwrap();
    run.wait().await.unwrap();

    let state = controller.state();
    assert_eq!(state.failure().unwrap().kind, FailureKind::CompilationFailed);
    assert_eq!(state.message(), Some("Compiler unavailable: service down"));
}

#[tokio::test]
async fn gateway_receives_normalized_source() {
    let (gateway, controller) = controller();
    let reply = gateway.expect("Card");

    let source = r#"```tsx
import { useState } from 'react';

interface CardProps {
  title: string;
}

export default function Card({ title }: CardProps) {
  return <div className="md:flex">{title}</div>;
}
```"#;
    let run = controller.submit(SourceSubmission::react(source));
    reply.send(Ok(luau_component("Card", "x"))).unwrap();
    run.wait().await.unwrap();

    let sent = gateway.sources.lock().unwrap()[0].clone();
    assert!(!sent.contains("import"));
    assert!(!sent.contains("interface"));
    assert!(!sent.contains("```"));
    assert!(sent.contains("function Card("));
    assert!(!sent.contains("CardProps"));
    assert!(sent.contains(r#"className="md:flex""#));
}

#[tokio::test]
async fn non_callable_result_fails_instantiation() {
    let (gateway, controller) = controller();
    let reply = gateway.expect("Card");

    let run = controller.submit(SourceSubmission::react("const Card = () => <div />;"));
    reply
        .send(Ok(CompileResponse::compiled("local Card = 42")))
        .unwrap();
    run.wait().await.unwrap();

    let state = controller.state();
    assert_eq!(state.failure().unwrap().kind, FailureKind::InstantiationFailed);
}

#[tokio::test]
async fn render_phase_throw_stays_ready_and_is_captured_by_the_boundary() {
    let (gateway, controller) = controller();
    let reply = gateway.expect("Bomb");

    let run = controller.submit(SourceSubmission::react(
        "const Bomb = () => { throw new Error('kaboom'); };",
    ));
    reply
        .send(Ok(CompileResponse::compiled(
            "local Bomb = function() error('kaboom') end",
        )))
        .unwrap();
    run.wait().await.unwrap();

    let state = controller.state();
    assert_eq!(state.phase(), Phase::Ready);

    let mut boundary = IsolationBoundary::new();
    boundary.mount(state.component().unwrap().clone(), json!({}));
    let BoundaryState::Captured(captured) = boundary.state() else {
        panic!("expected the boundary to capture the render error");
    };
    assert!(captured.error.to_string().contains("kaboom"));
    assert_eq!(captured.info.phase, RenderPhase::Mount);

    assert_eq!(controller.state().phase(), Phase::Ready);
}

#[tokio::test]
async fn unmount_discards_in_flight_results() {
    let (gateway, controller) = controller();
    let reply = gateway.expect("Card");

    let run = controller.submit(SourceSubmission::react("const Card = () => <div />;"));
    controller.unmount();
    reply.send(Ok(luau_component("Card", "late"))).unwrap();
    run.wait().await.unwrap();

    assert_eq!(controller.state().phase(), Phase::Compiling);

    let ignored = controller.submit(SourceSubmission::react(""));
    assert!(ignored.is_immediate());
    assert_eq!(controller.state().phase(), Phase::Compiling);
}
