//! Turning compiled component code into a renderable handle.

use std::fmt;
use std::sync::Arc;

use mlua::{Function, Table, Value};
use tracing::debug;

use crate::binding::{ElementRuntime, RuntimeBinding};
use crate::error::InstantiationError;
use crate::hooks::Hooks;
use crate::sandbox::{Sandbox, SandboxLimits};

/// Builds component handles from compiled code.
///
/// Every instantiation gets its own VM. Compiled code runs in a scope that
/// contains the runtime binding and the pure language intrinsics listed in
/// [`INTRINSICS`](crate::sandbox::INTRINSICS): no host globals, no module
/// loader, no metatable access.
#[derive(Clone)]
pub struct ComponentFactory {
    binding: Arc<dyn RuntimeBinding>,
    limits: SandboxLimits,
}

impl ComponentFactory {
    /// Factory injecting the default [`ElementRuntime`] as `React`.
    pub fn new() -> Self {
        Self::with_binding(ElementRuntime::new())
    }

    pub fn with_binding(binding: impl RuntimeBinding + 'static) -> Self {
        Self {
            binding: Arc::new(binding),
            limits: SandboxLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SandboxLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Name the runtime is injected under.
    pub fn binding_name(&self) -> &str {
        self.binding.name()
    }

    /// Evaluate `code` and return the value bound to `identifier`.
    ///
    /// The chunk evaluated is the code followed by `return <identifier>`, so
    /// the identifier must be a plain name. Anything other than a function
    /// (or a table with a `__call` metamethod) is rejected.
    pub fn instantiate(&self, code: &str, identifier: &str) -> Result<ComponentHandle, InstantiationError> {
        if !is_identifier(identifier) {
            return Err(InstantiationError::InvalidIdentifier(identifier.to_string()));
        }

        let sandbox =
            Sandbox::new(&self.limits).map_err(|e| InstantiationError::Sandbox(e.to_string()))?;
        let hooks = Hooks::default();

        let value = sandbox
            .with_budget(|lua| {
                let runtime = self.binding.install(lua, &hooks)?;
                let env = sandbox.scope()?;
                env.set(self.binding.name(), runtime)?;

                lua.load(format!("{code}\nreturn {identifier}"))
                    .set_name(format!("={identifier}"))
                    .set_environment(env)
                    .call::<Value>(())
            })
            .map_err(|e| InstantiationError::Evaluation(e.to_string()))?;

        let render = match value {
            Value::Function(f) => f,
            Value::Table(t) if is_callable(&t) => sandbox
                .lua()
                .load("local target = ... return function(props) return target(props) end")
                .set_name("=callable")
                .call::<Function>(t)
                .map_err(|e| InstantiationError::Evaluation(e.to_string()))?,
            other => {
                return Err(InstantiationError::NotCallable {
                    name: identifier.to_string(),
                    found: other.type_name(),
                })
            }
        };

        debug!(component = identifier, "Instantiated component");

        Ok(ComponentHandle {
            inner: Arc::new(HandleInner {
                name: identifier.to_string(),
                render,
                hooks,
                sandbox,
            }),
        })
    }
}

impl Default for ComponentFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("binding", &self.binding.name())
            .field("limits", &self.limits)
            .finish()
    }
}

struct HandleInner {
    name: String,
    render: Function,
    hooks: Hooks,
    sandbox: Sandbox,
}

/// A callable component, ready to mount.
///
/// Cloning is cheap and clones share the VM and its hook state, so a handle
/// should be mounted in one boundary at a time.
#[derive(Clone)]
pub struct ComponentHandle {
    inner: Arc<HandleInner>,
}

impl ComponentHandle {
    /// The identifier the component was found under.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn render_fn(&self) -> &Function {
        &self.inner.render
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.inner.hooks
    }

    pub(crate) fn sandbox(&self) -> &Sandbox {
        &self.inner.sandbox
    }

    /// Whether two handles refer to the same instantiation.
    pub fn ptr_eq(&self, other: &ComponentHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_callable(table: &Table) -> bool {
    table
        .metatable()
        .and_then(|mt| mt.raw_get::<Value>("__call").ok())
        .is_some_and(|call| matches!(call, Value::Function(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn instantiates_function_components() {
        let handle = ComponentFactory::new()
            .instantiate(
                "local function Card(props) return React.createElement('div', nil, props.title) end",
                "Card",
            )
            .unwrap();
        assert_eq!(handle.name(), "Card");
    }

    #[test]
    fn scope_hides_host_globals() {
        let factory = ComponentFactory::new();
        for global in ["print", "os", "io", "require", "load", "getfenv", "setmetatable", "debug"] {
            let code = format!("local Check = function() end\nif {global} ~= nil then Check = 1 end");
            assert!(
                factory.instantiate(&code, "Check").is_ok(),
                "{global} visible in component scope"
            );
        }
    }

    #[test]
    fn scope_keeps_language_intrinsics() {
        let handle = ComponentFactory::new().instantiate(
            "local label = string.upper('ok') .. tostring(math.max(1, 2))\nlocal Card = function() return label end",
            "Card",
        );
        assert!(handle.is_ok());
    }

    #[test]
    fn unresolved_identifier_is_not_callable() {
        let err = ComponentFactory::new()
            .instantiate("local x = 1", "Missing")
            .unwrap_err();
        assert!(matches!(err, InstantiationError::NotCallable { found: "nil", .. }));
    }

    #[test]
    fn rejects_non_callable_values() {
        let err = ComponentFactory::new()
            .instantiate("local Thing = { a = 1 }", "Thing")
            .unwrap_err();
        assert!(matches!(err, InstantiationError::NotCallable { found: "table", .. }));
    }

    #[test]
    fn detects_callable_tables() {
        let lua = mlua::Lua::new();
        let callable: Table = lua
            .load("return setmetatable({}, { __call = function() return 1 end })")
            .eval()
            .unwrap();
        let plain: Table = lua.load("return { a = 1 }").eval().unwrap();
        assert!(is_callable(&callable));
        assert!(!is_callable(&plain));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = ComponentFactory::new()
            .instantiate("local function Broken( return end", "Broken")
            .unwrap_err();
        assert!(matches!(err, InstantiationError::Evaluation(_)));
    }

    #[test]
    fn runtime_errors_in_module_scope_are_reported() {
        let err = ComponentFactory::new()
            .instantiate("error('exploded at load')\nlocal Card = function() end", "Card")
            .unwrap_err();
        assert!(err.to_string().contains("exploded at load"));
    }

    #[test]
    fn rejects_identifiers_that_are_not_names() {
        let err = ComponentFactory::new()
            .instantiate("local A = function() end", "A end os.exit() local B")
            .unwrap_err();
        assert!(matches!(err, InstantiationError::InvalidIdentifier(_)));
    }

    #[test]
    fn runaway_module_code_hits_the_budget() {
        let factory = ComponentFactory::new().with_limits(SandboxLimits {
            time_budget: Duration::from_millis(20),
            ..Default::default()
        });
        let err = factory
            .instantiate("while true do end\nlocal A = function() end", "A")
            .unwrap_err();
        assert!(err.to_string().contains("time budget"));
    }

    #[test]
    fn custom_binding_name() {
        let factory = ComponentFactory::with_binding(ElementRuntime::named("UI"));
        assert_eq!(factory.binding_name(), "UI");
        factory
            .instantiate("local A = function() return UI.createElement('p') end", "A")
            .unwrap();
        assert!(factory
            .instantiate("local B = function() end\nlocal _ = React.createElement", "B")
            .is_err());
    }
}
