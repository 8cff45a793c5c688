//! Walks element tables into a [`Node`] tree.

use std::collections::BTreeMap;

use mlua::{Function, Table, Value};

use crate::binding::{ELEMENT_MARKER, FRAGMENT};
use crate::error::RenderError;
use crate::hooks::Hooks;
use crate::node::{ElementNode, HandlerId, Node};

/// Deepest element nesting a render pass will follow.
pub const MAX_RENDER_DEPTH: usize = 256;

/// One render pass over a component tree.
///
/// Component instances are keyed by tree position plus function identity, so
/// swapping a component for another at the same position starts fresh state.
pub(crate) struct Renderer<'a> {
    hooks: &'a Hooks,
    handlers: Vec<Function>,
}

impl<'a> Renderer<'a> {
    pub fn new(hooks: &'a Hooks) -> Self {
        Self {
            hooks,
            handlers: Vec::new(),
        }
    }

    /// Render the root component with `props`.
    pub fn render_root(&mut self, component: &Function, props: Value) -> Result<Vec<Node>, RenderError> {
        self.render_component(component, props, "root", 0)
    }

    /// Handlers captured during the pass, indexed by [`HandlerId`].
    pub fn into_handlers(self) -> Vec<Function> {
        self.handlers
    }

    fn render_component(
        &mut self,
        component: &Function,
        props: Value,
        path: &str,
        depth: usize,
    ) -> Result<Vec<Node>, RenderError> {
        if depth > MAX_RENDER_DEPTH {
            return Err(RenderError::DepthExceeded(MAX_RENDER_DEPTH));
        }

        let key = format!("{path}@{:p}", component.to_pointer());
        self.hooks.enter(key.clone());
        let output = component.call::<Value>(props);
        self.hooks.exit();

        self.render_value(output?, &format!("{key}>"), depth + 1)
    }

    fn render_value(&mut self, value: Value, path: &str, depth: usize) -> Result<Vec<Node>, RenderError> {
        if depth > MAX_RENDER_DEPTH {
            return Err(RenderError::DepthExceeded(MAX_RENDER_DEPTH));
        }

        match value {
            Value::Nil | Value::Boolean(_) | Value::LightUserData(_) => Ok(Vec::new()),
            Value::String(s) => Ok(vec![Node::Text(s.to_string_lossy())]),
            Value::Integer(i) => Ok(vec![Node::Text(i.to_string())]),
            Value::Number(n) => Ok(vec![Node::Text(format_number(n))]),
            Value::Table(table) => {
                if is_element(&table)? {
                    return self.render_element(&table, path, depth);
                }
                if table.raw_len() == 0 && table.pairs::<Value, Value>().next().is_some() {
                    return Err(RenderError::InvalidChild("object"));
                }

                let mut nodes = Vec::new();
                for (i, child) in table.sequence_values::<Value>().enumerate() {
                    let child = child?;
                    let child_path = child_path(path, i, &child)?;
                    nodes.extend(self.render_value(child, &child_path, depth + 1)?);
                }
                Ok(nodes)
            }
            other => Err(RenderError::InvalidChild(other.type_name())),
        }
    }

    fn render_element(&mut self, element: &Table, path: &str, depth: usize) -> Result<Vec<Node>, RenderError> {
        let element_type: Value = element.raw_get("type")?;
        let props: Option<Table> = element.raw_get("props")?;

        match element_type {
            Value::String(tag) => {
                let tag = tag.to_string_lossy();
                let children = match &props {
                    Some(props) => props.get::<Value>("children")?,
                    None => Value::Nil,
                };
                if tag == FRAGMENT {
                    return self.render_value(children, path, depth + 1);
                }

                let mut node = ElementNode {
                    tag,
                    ..Default::default()
                };
                if let Some(props) = &props {
                    self.read_props(props, &mut node)?;
                }
                node.children = self.render_value(children, path, depth + 1)?;
                Ok(vec![Node::Element(node)])
            }
            Value::Function(component) => {
                let props = props.map(Value::Table).unwrap_or(Value::Nil);
                self.render_component(&component, props, path, depth + 1)
            }
            other => Err(RenderError::InvalidElementType(other.type_name())),
        }
    }

    fn read_props(&mut self, props: &Table, node: &mut ElementNode) -> Result<(), RenderError> {
        for pair in props.pairs::<Value, Value>() {
            let (name, value) = pair?;
            let Value::String(name) = name else { continue };
            let name = name.to_string_lossy();
            if matches!(name.as_str(), "children" | "key" | "ref") {
                continue;
            }

            match value {
                Value::Function(handler) => {
                    self.handlers.push(handler);
                    node.handlers
                        .insert(name, HandlerId(self.handlers.len() - 1));
                }
                Value::String(s) => {
                    node.attributes.insert(name, s.to_string_lossy());
                }
                Value::Integer(i) => {
                    node.attributes.insert(name, i.to_string());
                }
                Value::Number(n) => {
                    node.attributes.insert(name, format_number(n));
                }
                Value::Boolean(true) => {
                    node.attributes.insert(name, String::new());
                }
                Value::Table(style) if name == "style" => {
                    node.attributes.insert(name, style_string(&style)?);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn is_element(table: &Table) -> mlua::Result<bool> {
    Ok(matches!(table.raw_get::<Value>(ELEMENT_MARKER)?, Value::Boolean(true)))
}

/// Keyed elements keep their identity when siblings move.
fn child_path(parent: &str, index: usize, child: &Value) -> mlua::Result<String> {
    if let Value::Table(table) = child {
        if is_element(table)? {
            if let Some(props) = table.raw_get::<Option<Table>>("props")? {
                match props.get::<Value>("key")? {
                    Value::String(key) => return Ok(format!("{parent}.#{}", key.to_string_lossy())),
                    Value::Integer(key) => return Ok(format!("{parent}.#{key}")),
                    Value::Number(key) => return Ok(format!("{parent}.#{}", format_number(key))),
                    _ => {}
                }
            }
        }
    }
    Ok(format!("{parent}.{index}"))
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// `{ backgroundColor = "red", padding = 4 }` becomes `background-color: red; padding: 4`.
fn style_string(style: &Table) -> mlua::Result<String> {
    let mut rules = BTreeMap::new();
    for pair in style.pairs::<String, Value>() {
        let (name, value) = pair?;
        let value = match value {
            Value::String(s) => s.to_string_lossy(),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => format_number(n),
            _ => continue,
        };
        rules.insert(kebab_case(&name), value);
    }

    Ok(rules
        .into_iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("; "))
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
