//! Containment for errors thrown by a mounted component.
//!
//! The factory only guarantees a handle is callable. Anything the component
//! throws once invoked (script errors, resource limits, runaway re-renders,
//! panics in host callbacks) is captured here and shown in place of the
//! output. Nothing is retried: the owner recovers by mounting again.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use mlua::{Function, Lua, LuaSerdeExt, SerializeOptions, Value};
use tracing::{debug, warn};

use crate::error::{DispatchError, RenderError};
use crate::factory::ComponentHandle;
use crate::node::{HandlerId, Node};
use crate::render::Renderer;

/// Render passes allowed for one update before giving up.
pub const MAX_RERENDERS: usize = 25;

/// Which lifecycle step was running when an error was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Mount,
    Update,
}

/// Context passed to the error observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Identifier of the mounted component
    pub component: String,
    pub phase: RenderPhase,
}

#[derive(Debug, Clone)]
pub struct CapturedError {
    pub error: RenderError,
    pub info: ErrorInfo,
}

/// What the boundary is currently showing.
#[derive(Debug, Clone, Default)]
pub enum BoundaryState {
    #[default]
    Empty,
    Rendered(Vec<Node>),
    Captured(CapturedError),
}

type ErrorObserver = Box<dyn Fn(&RenderError, &ErrorInfo) + Send + Sync>;

struct Mounted {
    handle: ComponentHandle,
    props: serde_json::Value,
    handlers: Vec<Function>,
}

/// Mount point for one component handle.
pub struct IsolationBoundary {
    mounted: Option<Mounted>,
    state: BoundaryState,
    observer: Option<ErrorObserver>,
    max_rerenders: usize,
}

impl IsolationBoundary {
    pub fn new() -> Self {
        Self {
            mounted: None,
            state: BoundaryState::Empty,
            observer: None,
            max_rerenders: MAX_RERENDERS,
        }
    }

    /// Call `observer` whenever an error is captured.
    pub fn on_error(
        mut self,
        observer: impl Fn(&RenderError, &ErrorInfo) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn with_max_rerenders(mut self, max: usize) -> Self {
        self.max_rerenders = max;
        self
    }

    pub fn state(&self) -> &BoundaryState {
        &self.state
    }

    pub fn is_captured(&self) -> bool {
        matches!(self.state, BoundaryState::Captured(_))
    }

    /// The mounted handle, if any.
    pub fn handle(&self) -> Option<&ComponentHandle> {
        self.mounted.as_ref().map(|m| &m.handle)
    }

    /// Rendered output, when not showing an error.
    pub fn output(&self) -> Option<&[Node]> {
        match &self.state {
            BoundaryState::Rendered(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Replace whatever is mounted with `handle` and render it.
    ///
    /// `props` must be a JSON object; anything else mounts with empty props.
    pub fn mount(&mut self, handle: ComponentHandle, props: serde_json::Value) -> &BoundaryState {
        self.unmount();
        release_effects(&handle);

        debug!(component = handle.name(), "Mounting component");
        self.mounted = Some(Mounted {
            handle,
            props,
            handlers: Vec::new(),
        });
        self.render(RenderPhase::Mount);
        &self.state
    }

    /// Re-render with new props. A no-op while an error is captured.
    pub fn update(&mut self, props: serde_json::Value) -> &BoundaryState {
        if self.is_captured() {
            return &self.state;
        }
        if let Some(mounted) = self.mounted.as_mut() {
            mounted.props = props;
            self.render(RenderPhase::Update);
        }
        &self.state
    }

    /// Re-render if state changed since the last pass.
    pub fn flush(&mut self) -> &BoundaryState {
        let dirty = self
            .mounted
            .as_ref()
            .is_some_and(|m| m.handle.hooks().is_dirty());
        if dirty && !self.is_captured() {
            self.render(RenderPhase::Update);
        }
        &self.state
    }

    /// Invoke a rendered event handler with `event`, then flush.
    ///
    /// Errors thrown by the handler itself go back to the caller. Errors in
    /// the re-render it triggers are captured like any other update.
    pub fn dispatch(
        &mut self,
        handler: HandlerId,
        event: serde_json::Value,
    ) -> Result<&BoundaryState, DispatchError> {
        if self.is_captured() {
            return Err(DispatchError::Captured);
        }
        let mounted = self.mounted.as_ref().ok_or(DispatchError::NotMounted)?;
        let callback = mounted
            .handlers
            .get(handler.0)
            .cloned()
            .ok_or(DispatchError::UnknownHandler(handler.0))?;
        let handle = mounted.handle.clone();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            handle.sandbox().with_budget(|lua| {
                let event = json_to_lua(lua, &event)?;
                callback.call::<()>(event)
            })
        }));
        let outcome = match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DispatchError::Handler(e.to_string())),
            Err(panic) => Err(DispatchError::Handler(panic_message(panic))),
        };

        // State set before a handler failed still applies.
        self.flush();
        outcome.map(|()| &self.state)
    }

    /// Tear down the mounted component, running effect cleanups.
    pub fn unmount(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            debug!(component = mounted.handle.name(), "Unmounting component");
            release_effects(&mounted.handle);
        }
        self.state = BoundaryState::Empty;
    }

    fn render(&mut self, phase: RenderPhase) {
        let max_rerenders = self.max_rerenders;
        let Some(mounted) = self.mounted.as_mut() else {
            return;
        };
        let handle = mounted.handle.clone();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            render_cycle(&handle, &mounted.props, max_rerenders)
        }))
        .unwrap_or_else(|panic| Err(RenderError::Panic(panic_message(panic))));

        match outcome {
            Ok((nodes, handlers)) => {
                mounted.handlers = handlers;
                self.state = BoundaryState::Rendered(nodes);
            }
            Err(error) => {
                mounted.handlers.clear();
                let info = ErrorInfo {
                    component: handle.name().to_string(),
                    phase,
                };
                warn!(
                    component = %info.component,
                    phase = ?phase,
                    error = %error,
                    "Component render failed"
                );
                if let Some(observer) = &self.observer {
                    observer(&error, &info);
                }
                release_effects(&handle);
                self.state = BoundaryState::Captured(CapturedError { error, info });
            }
        }
    }
}

impl Default for IsolationBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IsolationBoundary {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Render until state settles, then run effects.
///
/// A pass that sets state while rendering is discarded and redone. Effects
/// that set state trigger another pass after the output is committed.
fn render_cycle(
    handle: &ComponentHandle,
    props: &serde_json::Value,
    max_rerenders: usize,
) -> Result<(Vec<Node>, Vec<Function>), RenderError> {
    let hooks = handle.hooks();
    let sandbox = handle.sandbox();

    for _ in 0..=max_rerenders {
        hooks.begin_pass();
        let (nodes, handlers) = sandbox.with_budget(|lua| {
            let props = props_to_lua(lua, props)?;
            let mut renderer = Renderer::new(hooks);
            let nodes = renderer.render_root(handle.render_fn(), props)?;
            Ok::<_, RenderError>((nodes, renderer.into_handlers()))
        })?;

        let removed = hooks.finish_pass();
        sandbox.with_budget(|_| {
            for cleanup in removed {
                cleanup.call::<()>(())?;
            }
            Ok::<_, mlua::Error>(())
        })?;

        if hooks.is_dirty() {
            continue;
        }

        sandbox.with_budget(|_| {
            for effect in hooks.take_effects() {
                if let Some(cleanup) = hooks.take_cleanup(&effect.key, effect.index) {
                    cleanup.call::<()>(())?;
                }
                if let Value::Function(cleanup) = effect.callback.call::<Value>(())? {
                    hooks.set_cleanup(effect.key, effect.index, cleanup);
                }
            }
            Ok::<_, mlua::Error>(())
        })?;

        if !hooks.is_dirty() {
            return Ok((nodes, handlers));
        }
    }

    Err(RenderError::TooManyRerenders(max_rerenders))
}

/// Drop hook state and run outstanding cleanups, logging failures.
fn release_effects(handle: &ComponentHandle) {
    let cleanups = handle.hooks().reset();
    if cleanups.is_empty() {
        return;
    }

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        handle.sandbox().with_budget(|_| {
            for cleanup in cleanups {
                cleanup.call::<()>(())?;
            }
            Ok::<_, mlua::Error>(())
        })
    }));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(component = handle.name(), error = %e, "Effect cleanup failed"),
        Err(panic) => warn!(
            component = handle.name(),
            error = %panic_message(panic),
            "Effect cleanup panicked"
        ),
    }
}

fn serialize_options() -> SerializeOptions {
    SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false)
}

fn props_to_lua(lua: &Lua, props: &serde_json::Value) -> mlua::Result<Value> {
    match props {
        serde_json::Value::Object(_) => lua.to_value_with(props, serialize_options()),
        _ => lua.create_table().map(Value::Table),
    }
}

fn json_to_lua(lua: &Lua, value: &serde_json::Value) -> mlua::Result<Value> {
    lua.to_value_with(value, serialize_options())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
