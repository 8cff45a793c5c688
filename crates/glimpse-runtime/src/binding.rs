//! The UI runtime injected into component scope.

use mlua::{Lua, Table, Value, Variadic};

use crate::hooks::Hooks;

/// Marker field identifying element tables.
pub const ELEMENT_MARKER: &str = "$$element";

/// Element type used for fragments.
pub const FRAGMENT: &str = "$$fragment";

/// Default name the runtime is bound under.
pub const DEFAULT_BINDING_NAME: &str = "React";

/// A UI runtime that compiled components reference by name.
///
/// Implementations build the table exposed to component code. The renderer
/// reads elements in the shape `createElement` produces here: a table carrying
/// [`ELEMENT_MARKER`], a `type` and a `props` table with `children` inside.
pub trait RuntimeBinding: Send + Sync {
    /// Name the runtime is visible under in component scope.
    fn name(&self) -> &str;

    /// Build the runtime table inside `lua`, wiring hooks to `hooks`.
    fn install(&self, lua: &Lua, hooks: &Hooks) -> mlua::Result<Table>;
}

/// Element construction, fragments and hooks.
#[derive(Debug, Clone)]
pub struct ElementRuntime {
    name: String,
}

impl ElementRuntime {
    pub fn new() -> Self {
        Self::named(DEFAULT_BINDING_NAME)
    }

    /// Bind the runtime under a different name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ElementRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBinding for ElementRuntime {
    fn name(&self) -> &str {
        &self.name
    }

    fn install(&self, lua: &Lua, hooks: &Hooks) -> mlua::Result<Table> {
        let runtime = lua.create_table()?;

        let create_element = lua.create_function(
            |lua, (element_type, props, children): (Value, Option<Table>, Variadic<Value>)| {
                let element = lua.create_table()?;
                element.set(ELEMENT_MARKER, true)?;
                element.set("type", element_type)?;

                let own_props = lua.create_table()?;
                if let Some(props) = props {
                    for pair in props.pairs::<Value, Value>() {
                        let (key, value) = pair?;
                        own_props.set(key, value)?;
                    }
                }
                match children.len() {
                    0 => {}
                    1 => own_props.set("children", children[0].clone())?,
                    _ => own_props
                        .set("children", lua.create_sequence_from(children.iter().cloned())?)?,
                }

                element.set("props", own_props)?;
                Ok(element)
            },
        )?;

        runtime.set("createElement", create_element)?;
        runtime.set("Fragment", FRAGMENT)?;
        hooks.install(lua, &runtime)?;

        Ok(runtime)
    }
}
