use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::compiler::ast::{CompareOp, Condition, ConditionChain, Expr, Filter, LogicalOp, Node, Segment, Variable};
use crate::environment::Environment;
use crate::error::{Error, ErrorKind};
use crate::output::Output;
use crate::template::Template;
use crate::value::ops::{self, Number};
use crate::value::{Value, ValueMap};

/// The maximum depth of nested node sequences while rendering.
const MAX_RECURSION: usize = 100;

/// The maximum number of items a range literal may produce.
const MAX_RANGE: i64 = 100_000;

/// A transform applied to every interpolated value after its filters.
pub type GlobalFilter = Arc<dyn Fn(Value) -> Result<Value, Error> + Send + Sync + 'static>;

/// The control signal of a render pass.
///
/// As long as the signal is [`Normal`](Signal::Normal) sibling nodes keep
/// rendering.  Any other signal abandons the remaining siblings at every
/// level until the construct that owns it clears it again.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Signal {
    /// Keep rendering.
    #[default]
    Normal,
    /// Leave the innermost loop.
    Break,
    /// Continue with the next iteration of the innermost loop.
    Continue,
    /// The template extended another one and is done.
    Extended,
}

/// The mutable state of a single render.
///
/// Tags and blocks receive the context to look up and bind variables, keep
/// state in registers, raise control signals and render nested nodes.
pub struct Context<'a> {
    env: &'a Environment,
    template: &'a Template,
    assigns: Value,
    scopes: Vec<ValueMap>,
    registers: BTreeMap<String, Value>,
    blocks: HashMap<String, &'a [Node]>,
    signal: Signal,
    errors: Vec<Error>,
    escape_variables: bool,
    global_filter: Option<GlobalFilter>,
    depth: usize,
}

impl<'a> fmt::Debug for Context<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("template", &self.template.name())
            .field("assigns", &self.assigns)
            .field("scopes", &self.scopes)
            .field("registers", &self.registers)
            .field("signal", &self.signal)
            .field("errors", &self.errors)
            .finish()
    }
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        env: &'a Environment,
        template: &'a Template,
        assigns: Value,
        registers: BTreeMap<String, Value>,
        escape_variables: bool,
        global_filter: Option<GlobalFilter>,
    ) -> Context<'a> {
        Context {
            env,
            template,
            assigns,
            scopes: vec![ValueMap::new()],
            registers,
            blocks: HashMap::new(),
            signal: Signal::Normal,
            errors: Vec::new(),
            escape_variables,
            global_filter,
            depth: 0,
        }
    }

    /// Returns the environment.
    pub fn env(&self) -> &'a Environment {
        self.env
    }

    /// Returns the template currently being rendered.
    ///
    /// While a parent template renders on behalf of `extends` this is the
    /// parent.
    pub fn template(&self) -> &'a Template {
        self.template
    }

    pub(crate) fn swap_template(&mut self, template: &'a Template) -> &'a Template {
        std::mem::replace(&mut self.template, template)
    }

    /// Returns the assigns the render was started with.
    pub fn assigns(&self) -> &Value {
        &self.assigns
    }

    /// Looks up a variable.
    ///
    /// Block-local scopes win over global bindings, then come the assigns,
    /// the presets of the template and the presets of the environment.
    /// Missing variables are undefined.
    pub fn lookup(&self, name: &str) -> Value {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return value.clone();
            }
        }
        if let Some(value) = self.assigns.as_map().and_then(|x| x.get(name)) {
            return value.clone();
        }
        if let Some(value) = self.template.presets().get(name) {
            return value.clone();
        }
        self.env.presets().get(name).cloned().unwrap_or_default()
    }

    /// Binds a variable in the global scope.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.scopes[0].insert(name.into(), value);
    }

    /// Binds a variable in the innermost scope.
    pub fn set_local(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    /// Opens a new block-local scope.
    pub fn push_scope(&mut self) {
        self.scopes.push(ValueMap::new());
    }

    /// Closes the innermost block-local scope.
    ///
    /// The global scope is never removed.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Returns the global bindings made during the render.
    pub fn globals(&self) -> &ValueMap {
        &self.scopes[0]
    }

    /// Returns a register.
    pub fn register(&self, key: &str) -> Option<&Value> {
        self.registers.get(key)
    }

    /// Sets a register.
    pub fn set_register(&mut self, key: &str, value: Value) {
        self.registers.insert(key.to_string(), value);
    }

    /// Returns all registers.
    pub fn registers(&self) -> &BTreeMap<String, Value> {
        &self.registers
    }

    /// Returns the current control signal.
    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Raises a control signal.
    pub fn set_signal(&mut self, signal: Signal) {
        self.signal = signal;
    }

    /// Clears the control signal and returns what it was.
    pub fn take_signal(&mut self) -> Signal {
        std::mem::take(&mut self.signal)
    }

    /// Returns the errors recorded in strict mode.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Consumes the context and returns the recorded errors.
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }

    pub(crate) fn push_error(&mut self, err: Error) {
        self.errors.push(err);
    }

    pub(crate) fn escape_variables(&self) -> bool {
        self.escape_variables
    }

    pub(crate) fn global_filter(&self) -> Option<&GlobalFilter> {
        self.global_filter.as_ref()
    }

    /// Returns the nodes that override a named block.
    pub fn block_override(&self, name: &str) -> Option<&'a [Node]> {
        self.blocks.get(name).copied()
    }

    /// Registers an override for a named block unless one exists.
    ///
    /// The first template to define a block wins, which is the most derived
    /// one when walking up an inheritance chain.
    pub fn add_block_override(&mut self, name: &str, nodes: &'a [Node]) {
        self.blocks.entry(name.to_string()).or_insert(nodes);
    }

    /// Renders a sequence of nodes.
    ///
    /// Failures of individual nodes are recovered according to the error
    /// mode.  Rendering stops early once a control signal is raised.  This
    /// only fails if the nesting limit is exceeded.
    pub fn render_nodes(&mut self, nodes: &[Node], out: &mut Output) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > MAX_RECURSION {
            self.depth -= 1;
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                "recursion limit exceeded",
            ));
        }
        crate::vm::render_nodes(self, nodes, out);
        self.depth -= 1;
        Ok(())
    }

    /// Evaluates an expression.
    pub fn eval_expr(&self, expr: &Expr) -> Result<Value, Error> {
        match expr {
            Expr::Const(value) => Ok(value.clone()),
            Expr::Empty => Ok(Value::from("")),
            Expr::Path(path) => {
                let mut value = self.lookup(&path.root);
                for segment in &path.segments {
                    value = match segment {
                        Segment::Attr(name) => value.get_attr(name),
                        Segment::Index(index) => value.get_item(&ok!(self.eval_expr(index))),
                    };
                }
                Ok(value)
            }
            Expr::Range(start, end) => {
                let start = ok!(self.eval_range_bound(start));
                let end = ok!(self.eval_range_bound(end));
                if end.saturating_sub(start) >= MAX_RANGE {
                    return Err(Error::new(
                        ErrorKind::InvalidOperation,
                        "range has too many elements",
                    ));
                }
                Ok((start..=end).collect())
            }
        }
    }

    fn eval_range_bound(&self, expr: &Expr) -> Result<i64, Error> {
        let value = ok!(self.eval_expr(expr));
        match ops::to_number(&value) {
            Ok(Number::Int(val)) => Ok(val),
            Ok(Number::Float(val)) => Ok(val as i64),
            Err(_) => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("range bounds must be numbers, got {}", value.kind()),
            )),
        }
    }

    /// Evaluates a variable with its filters.
    pub fn eval_variable(&self, var: &Variable) -> Result<Value, Error> {
        let mut value = ok!(self.eval_expr(&var.expr));
        for filter in &var.filters {
            value = ok!(self.apply_filter(filter, value));
        }
        Ok(value)
    }

    /// Applies a single filter to a value.
    pub fn apply_filter(&self, filter: &Filter, value: Value) -> Result<Value, Error> {
        let func = match self.env.get_filter(&filter.name) {
            Some(func) => func,
            None => {
                return Err(Error::new(
                    ErrorKind::UnknownFilter,
                    format!("unknown filter `{}`", filter.name),
                ))
            }
        };
        let mut args = Vec::with_capacity(filter.args.len() + 1);
        args.push(value);
        for arg in &filter.args {
            args.push(ok!(self.eval_expr(arg)));
        }
        func.apply_to(&args)
    }

    /// Evaluates a condition chain.
    ///
    /// The chain is evaluated from the right, so `a or b and c` is
    /// `a or (b and c)`.
    pub fn eval_condition(&self, chain: &ConditionChain) -> Result<bool, Error> {
        // `a and rest` is `rest` once `a` holds, `a or rest` is `rest` once
        // `a` fails, so the right fold is a left to right walk.
        let mut condition = &chain.first;
        for (op, next) in &chain.rest {
            let value = ok!(self.eval_single_condition(condition));
            match op {
                LogicalOp::And if !value => return Ok(false),
                LogicalOp::Or if value => return Ok(true),
                _ => condition = next,
            }
        }
        self.eval_single_condition(condition)
    }

    fn eval_single_condition(&self, condition: &Condition) -> Result<bool, Error> {
        let (left, op, right) = match condition {
            Condition::Value(expr) => return Ok(ok!(self.eval_expr(expr)).is_true()),
            Condition::Compare(left, op, right) => (left, *op, right),
        };

        // `empty` compares by emptiness rather than by value
        if let Some(other) = match (left, right) {
            (Expr::Empty, other) | (other, Expr::Empty) => Some(other),
            _ => None,
        } {
            let is_empty = ok!(self.eval_expr(other)).len() == Some(0);
            return Ok(match op {
                CompareOp::Eq => is_empty,
                CompareOp::Ne => !is_empty,
                _ => false,
            });
        }

        let left = ok!(self.eval_expr(left));
        let right = ok!(self.eval_expr(right));
        Ok(match op {
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Contains => left.contains(&right),
            CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
                if left.is_nil() || right.is_nil() {
                    return Ok(false);
                }
                let ordering = match ops::partial_order(&left, &right) {
                    Some(ordering) => ordering,
                    None => {
                        return Err(Error::new(
                            ErrorKind::InvalidOperation,
                            format!("cannot compare {} with {}", left.kind(), right.kind()),
                        ))
                    }
                };
                match op {
                    CompareOp::Gt => ordering.is_gt(),
                    CompareOp::Gte => ordering.is_ge(),
                    CompareOp::Lt => ordering.is_lt(),
                    _ => ordering.is_le(),
                }
            }
        })
    }
}
