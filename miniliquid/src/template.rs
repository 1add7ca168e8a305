use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::compiler::ast::Node;
use crate::error::Error;
use crate::output::RenderOutput;
use crate::value::{Value, ValueMap};
use crate::vm::{Context, GlobalFilter};

/// Represents a parsed template.
///
/// Templates are created with [`Environment::parse`](crate::Environment::parse)
/// and never change afterwards, so one template can be rendered from many
/// threads at once.  Every render gets its own [`Context`].
///
/// ```
/// # use miniliquid::{Environment, RenderOptions, context};
/// let env = Environment::new();
/// let tmpl = env.parse("Hello {{ name }}!").unwrap();
/// let rendered = env.render(&tmpl, context!(name => "World"), RenderOptions::new()).unwrap();
/// assert_eq!(rendered.to_string(), "Hello World!");
/// ```
pub struct Template {
    name: String,
    nodes: Vec<Node>,
    presets: ValueMap,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("presets", &self.presets)
            .finish()
    }
}

impl Template {
    pub(crate) fn new(name: &str, nodes: Vec<Node>) -> Template {
        Template {
            name: name.to_string(),
            nodes,
            presets: ValueMap::new(),
        }
    }

    /// Returns the name of the template.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the root nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the preset defaults of the template.
    pub fn presets(&self) -> &ValueMap {
        &self.presets
    }

    /// Adds a preset default.
    ///
    /// Presets are looked up after the assigns of a render.
    pub fn with_preset<V: Serialize>(mut self, name: &str, value: V) -> Template {
        self.presets
            .insert(Arc::from(name), Value::from_serialize(&value));
        self
    }
}

/// Options for a single render.
#[derive(Clone)]
pub struct RenderOptions {
    pub(crate) registers: BTreeMap<String, Value>,
    pub(crate) escape_variables: bool,
    pub(crate) stringify_output: bool,
    pub(crate) global_filter: Option<GlobalFilter>,
}

impl Default for RenderOptions {
    fn default() -> RenderOptions {
        RenderOptions {
            registers: BTreeMap::new(),
            escape_variables: false,
            stringify_output: true,
            global_filter: None,
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("registers", &self.registers)
            .field("escape_variables", &self.escape_variables)
            .field("stringify_output", &self.stringify_output)
            .field("global_filter", &self.global_filter.is_some())
            .finish()
    }
}

impl RenderOptions {
    /// Creates the default options.
    pub fn new() -> RenderOptions {
        RenderOptions::default()
    }

    /// Sets the initial registers.
    ///
    /// Registers hold state for tags and blocks which is not visible to
    /// the template.
    pub fn with_registers(mut self, registers: BTreeMap<String, Value>) -> RenderOptions {
        self.registers = registers;
        self
    }

    /// Enables JavaScript string escaping of interpolated strings.
    pub fn with_escape_variables(mut self, yes: bool) -> RenderOptions {
        self.escape_variables = yes;
        self
    }

    /// Selects between one joined string (the default) and a list of
    /// fragments in document order.
    pub fn with_stringify_output(mut self, yes: bool) -> RenderOptions {
        self.stringify_output = yes;
        self
    }

    /// Sets a filter applied to every interpolated value after its own
    /// filters.
    pub fn with_global_filter<F>(mut self, f: F) -> RenderOptions
    where
        F: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.global_filter = Some(Arc::new(f));
        self
    }
}

/// The result of a render: the output and the final context.
pub struct Rendered<'a> {
    output: RenderOutput,
    context: Context<'a>,
}

impl<'a> fmt::Debug for Rendered<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendered")
            .field("output", &self.output)
            .field("context", &self.context)
            .finish()
    }
}

impl<'a> fmt::Display for Rendered<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.output, f)
    }
}

impl<'a> Rendered<'a> {
    pub(crate) fn new(output: RenderOutput, context: Context<'a>) -> Rendered<'a> {
        Rendered { output, context }
    }

    /// Returns the output.
    pub fn output(&self) -> &RenderOutput {
        &self.output
    }

    /// Returns the context as it was when rendering finished.
    pub fn context(&self) -> &Context<'a> {
        &self.context
    }

    /// Returns the errors recorded in strict mode.
    pub fn errors(&self) -> &[Error] {
        self.context.errors()
    }

    /// Splits into output and final context.
    pub fn into_parts(self) -> (RenderOutput, Context<'a>) {
        (self.output, self.context)
    }

    /// Returns the output as a single string.
    pub fn into_string(self) -> String {
        self.output.into_string()
    }
}
