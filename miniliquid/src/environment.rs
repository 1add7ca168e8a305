use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::compiler::parser::Parser;
use crate::error::{Error, ErrorKind};
use crate::filters::{self, BoxedFilter, Filter};
use crate::registry::{Block, BoxedHandler, Registry, Tag};
use crate::template::{RenderOptions, Rendered, Template};
use crate::utils::BTreeMapKeysDebug;
use crate::value::{FunctionArgs, FunctionResult, Value, ValueKind, ValueMap};
use crate::{tags, vm};

/// The default limit for nested blocks.
const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// How failures while rendering are handled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// The error message is rendered in place of the failing node.
    #[default]
    Lax,
    /// Nothing is rendered for the failing node and the error is recorded
    /// on the [`Context`](crate::Context).
    Strict,
}

/// An abstraction that holds the engine configuration.
///
/// This object holds the central configuration state for templates: the
/// registry of tags and blocks, the filters, the error mode and presets.  It
/// is also the container for named templates that other templates can
/// `extends`.
///
/// There are generally two ways to construct an environment:
///
/// * [`Environment::new`] creates an environment preconfigured with sensible
///   defaults.  It will contain all built-in tags, blocks and filters.
/// * [`Environment::empty`] creates a completely blank environment.
///
/// All configuration requires `&mut self` while parsing and rendering only
/// need `&self`, so an environment is fully set up before it is shared.
#[derive(Clone)]
pub struct Environment {
    registry: Registry,
    filters: BTreeMap<Cow<'static, str>, BoxedFilter>,
    presets: ValueMap,
    templates: BTreeMap<String, Arc<Template>>,
    error_mode: ErrorMode,
    max_nesting_depth: usize,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::empty()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("registry", &self.registry)
            .field("filters", &BTreeMapKeysDebug(&self.filters))
            .field("presets", &self.presets)
            .field("templates", &BTreeMapKeysDebug(&self.templates))
            .field("error_mode", &self.error_mode)
            .finish()
    }
}

impl Environment {
    /// Creates a new environment with sensible defaults.
    ///
    /// This environment does not yet contain any templates but it will have
    /// all the default tags, blocks and filters loaded.  If you do not want
    /// any default configuration you can use the alternative
    /// [`empty`](Environment::empty) method.
    pub fn new() -> Environment {
        Environment {
            registry: Registry::from_handlers(tags::get_builtin_handlers()),
            filters: filters::get_builtin_filters()
                .into_iter()
                .map(|(name, filter)| (Cow::Borrowed(name), filter))
                .collect(),
            ..Environment::empty()
        }
    }

    /// Creates a completely empty environment.
    ///
    /// This environment has no tags, blocks or filters.
    pub fn empty() -> Environment {
        Environment {
            registry: Registry::new(),
            filters: BTreeMap::new(),
            presets: ValueMap::new(),
            templates: BTreeMap::new(),
            error_mode: ErrorMode::default(),
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    /// Registers a tag.
    ///
    /// Registering a stateless tag type under the same name twice is a
    /// no-op, any other handler for a taken name fails with
    /// [`ErrorKind::DuplicateRegistration`].  Tags that carry state are
    /// boxed once with [`BoxedHandler::tag`] and passed to
    /// [`register`](Self::register) if they need to be registered again.
    pub fn register_tag<T: Tag>(&mut self, name: &str, tag: T) -> Result<(), Error> {
        self.registry.register(name, BoxedHandler::tag(tag))
    }

    /// Registers a block.
    ///
    /// The same rules as for [`register_tag`](Self::register_tag) apply.
    pub fn register_block<B: Block>(&mut self, name: &str, block: B) -> Result<(), Error> {
        self.registry.register(name, BoxedHandler::block(block))
    }

    /// Registers an already boxed handler.
    pub fn register(&mut self, name: &str, handler: BoxedHandler) -> Result<(), Error> {
        self.registry.register(name, handler)
    }

    /// Returns the tag and block registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Adds a new filter function.
    ///
    /// Filter functions are functions that can be applied to values in
    /// templates.  For details about filters have a look at
    /// [`filters`](crate::filters).
    pub fn add_filter<N, F, Rv, Args>(&mut self, name: N, f: F)
    where
        N: Into<Cow<'static, str>>,
        F: Filter<Rv, Args>,
        Rv: FunctionResult,
        Args: FunctionArgs,
    {
        self.filters.insert(name.into(), BoxedFilter::new(f));
    }

    /// Removes a filter by name.
    pub fn remove_filter(&mut self, name: &str) {
        self.filters.remove(name);
    }

    pub(crate) fn get_filter(&self, name: &str) -> Option<&BoxedFilter> {
        self.filters.get(name)
    }

    /// Sets how failures while rendering are handled.
    pub fn set_error_mode(&mut self, mode: ErrorMode) {
        self.error_mode = mode;
    }

    /// Returns the current error mode.
    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    /// Sets how deeply blocks may be nested before parsing fails.
    pub fn set_max_nesting_depth(&mut self, depth: usize) {
        self.max_nesting_depth = depth;
    }

    /// Returns the nesting limit for blocks.
    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    /// Adds a preset.
    ///
    /// Presets are visible in every template rendered from this
    /// environment and have the lowest priority of all variables.
    pub fn add_preset<V: Serialize>(&mut self, name: &str, value: V) {
        self.presets.insert(name.into(), Value::from_serialize(&value));
    }

    /// Returns the presets.
    pub fn presets(&self) -> &ValueMap {
        &self.presets
    }

    /// Parses a template.
    ///
    /// Fails with the first syntax error.  Errors carry the line they were
    /// found on.
    pub fn parse(&self, source: &str) -> Result<Template, Error> {
        self.parse_named("<string>", source)
    }

    /// Parses a template with a name used in error messages.
    pub fn parse_named(&self, name: &str, source: &str) -> Result<Template, Error> {
        let mut parser = Parser::new(source, name, &self.registry, self.max_nesting_depth);
        let nodes = ok!(parser.parse());
        tracing::debug!(name, nodes = nodes.len(), "parsed template");
        Ok(Template::new(name, nodes))
    }

    /// Parses a template and stores it under a name.
    ///
    /// Stored templates can be extended by other templates.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), Error> {
        let template = ok!(self.parse_named(name, source));
        self.templates.insert(name.to_string(), Arc::new(template));
        Ok(())
    }

    /// Removes a stored template.
    pub fn remove_template(&mut self, name: &str) {
        self.templates.remove(name);
    }

    /// Returns a stored template.
    pub fn get_template(&self, name: &str) -> Result<&Template, Error> {
        match self.templates.get(name) {
            Some(template) => Ok(&**template),
            None => Err(Error::new(
                ErrorKind::TemplateNotFound,
                format!("template {name:?} does not exist"),
            )),
        }
    }

    /// Renders a template.
    ///
    /// The assigns are converted with serde and must be a map (or unit for
    /// no assigns).  Rendering itself never fails: failing nodes are
    /// handled according to the [`ErrorMode`] and the final context is part
    /// of the result.
    ///
    /// ```
    /// # use miniliquid::{Environment, RenderOptions, context};
    /// let env = Environment::new();
    /// let tmpl = env.parse("{{ greeting | upcase }}").unwrap();
    /// let rendered = env
    ///     .render(&tmpl, context!(greeting => "hi"), RenderOptions::new())
    ///     .unwrap();
    /// assert_eq!(rendered.into_string(), "HI");
    /// ```
    pub fn render<'a, S: Serialize>(
        &'a self,
        template: &'a Template,
        assigns: S,
        options: RenderOptions,
    ) -> Result<Rendered<'a>, Error> {
        let assigns = ok!(Value::try_from_serialize(&assigns));
        match assigns.kind() {
            ValueKind::Map | ValueKind::None | ValueKind::Undefined => {}
            kind => {
                return Err(Error::new(
                    ErrorKind::InvalidArguments,
                    format!("assigns must be a map, got {kind}"),
                ))
            }
        }
        Ok(vm::render(self, template, assigns, options))
    }

    /// Parses and renders a template in one go.
    ///
    /// In strict mode the first recorded error is returned instead of the
    /// output.
    pub fn render_str<S: Serialize>(&self, source: &str, assigns: S) -> Result<String, Error> {
        let template = ok!(self.parse(source));
        let (output, ctx) = ok!(self.render(&template, assigns, RenderOptions::new())).into_parts();
        let mut errors = ctx.into_errors();
        if errors.is_empty() {
            Ok(output.into_string())
        } else {
            Err(errors.swap_remove(0))
        }
    }
}

static GLOBAL_ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Installs the process wide environment.
///
/// This can only happen once and must happen before the first call to
/// [`global_environment`], [`parse`] or [`render`].  Later calls fail with
/// [`ErrorKind::DuplicateRegistration`].
pub fn set_global_environment(env: Environment) -> Result<(), Error> {
    GLOBAL_ENVIRONMENT.set(env).map_err(|_| {
        Error::new(
            ErrorKind::DuplicateRegistration,
            "the global environment is already initialized",
        )
    })
}

/// Returns the process wide environment.
///
/// If none was installed an environment with the defaults is created.
pub fn global_environment() -> &'static Environment {
    GLOBAL_ENVIRONMENT.get_or_init(Environment::new)
}

/// Parses a template with the process wide environment.
pub fn parse(source: &str) -> Result<Template, Error> {
    global_environment().parse(source)
}

/// Renders a template with the process wide environment.
pub fn render<S: Serialize>(
    template: &Template,
    assigns: S,
    options: RenderOptions,
) -> Result<Rendered<'_>, Error> {
    global_environment().render(template, assigns, options)
}
