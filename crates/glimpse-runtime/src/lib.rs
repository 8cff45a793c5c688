//! Sandboxed execution of compiled preview components.
//!
//! Compiled component code is Luau. [`ComponentFactory`] evaluates it in a
//! fresh, resource-limited VM whose scope holds only the injected UI runtime,
//! and hands back a [`ComponentHandle`]. [`IsolationBoundary`] mounts a handle,
//! renders it into a [`Node`] tree and contains whatever it throws.

pub mod binding;
pub mod boundary;
pub mod error;
pub mod factory;
pub mod hooks;
pub mod node;
mod render;
pub mod sandbox;

pub use binding::{ElementRuntime, RuntimeBinding, DEFAULT_BINDING_NAME};
pub use boundary::{BoundaryState, CapturedError, ErrorInfo, IsolationBoundary, RenderPhase};
pub use error::{DispatchError, InstantiationError, RenderError};
pub use factory::{ComponentFactory, ComponentHandle};
pub use hooks::Hooks;
pub use node::{find_handler, text_content, to_markup, ElementNode, HandlerId, Node};
pub use render::MAX_RENDER_DEPTH;
pub use sandbox::{SandboxLimits, DEFAULT_MEMORY_LIMIT_BYTES, DEFAULT_TIME_BUDGET};
