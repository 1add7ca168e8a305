use std::any::Any;
use std::fmt;
use std::ops::Deref;

use crate::compiler::tokens::Span;
use crate::value::Value;

/// Container for nodes with location info.
///
/// This container fulfills two purposes: it adds location information
/// to nodes, but it also ensures the nodes is heap allocated.  The
/// latter is useful to ensure that enum variants do not cause the enum
/// to become too large.
///
/// Equality ignores the location.
pub struct Spanned<T> {
    inner: Box<(T, Span)>,
}

impl<T> Spanned<T> {
    /// Creates a new spanned node.
    pub fn new(node: T, span: Span) -> Spanned<T> {
        Spanned {
            inner: Box::new((node, span)),
        }
    }

    /// Accesses the span.
    pub fn span(&self) -> Span {
        self.inner.1
    }
}

impl<T> Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner.0
    }
}

impl<T: PartialEq> PartialEq for Spanned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.0 == other.inner.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ok!(fmt::Debug::fmt(&self.inner.0, f));
        write!(f, "{:?}", self.inner.1)
    }
}

/// Markup as parsed by the handler registered for a tag or block.
pub(crate) type Markup = Box<dyn Any + Send + Sync>;

/// A node in the document.
#[derive(Debug, PartialEq)]
pub enum Node {
    /// Literal text that is emitted unchanged.
    Literal(String),
    /// A `{{ }}` interpolation.
    Variable(Spanned<Variable>),
    /// A tag without body.
    Tag(Spanned<TagNode>),
    /// A block with a nested body.
    Block(Spanned<BlockNode>),
}

/// A variable reference with its filter chain.
#[derive(Debug, PartialEq)]
pub struct Variable {
    pub expr: Expr,
    pub filters: Vec<Filter>,
}

/// A single filter invocation (`| name: arg, arg`).
#[derive(Debug, PartialEq)]
pub struct Filter {
    pub name: String,
    pub args: Vec<Expr>,
}

/// A value expression.
#[derive(Debug, PartialEq)]
pub enum Expr {
    /// A literal value.
    Const(Value),
    /// The `empty` (or `blank`) keyword.
    Empty,
    /// A variable lookup.
    Path(Path),
    /// An inclusive integer range `(a..b)`.
    Range(Box<Expr>, Box<Expr>),
}

/// A dotted or indexed variable path such as `a.b[0]["c"]`.
#[derive(Debug, PartialEq)]
pub struct Path {
    pub root: String,
    pub segments: Vec<Segment>,
}

/// One step in a [`Path`].
#[derive(Debug, PartialEq)]
pub enum Segment {
    /// `.name`
    Attr(String),
    /// `[expr]`
    Index(Expr),
}

/// Comparison operators.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

/// Logical operators joining conditions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// A single condition.
#[derive(Debug, PartialEq)]
pub enum Condition {
    /// A value tested for truthiness.
    Value(Expr),
    /// `value operator value`
    Compare(Expr, CompareOp, Expr),
}

/// Conditions joined with logical operators.
///
/// Chains are evaluated from the right: `a or b and c` means
/// `a or (b and c)`.
#[derive(Debug, PartialEq)]
pub struct ConditionChain {
    pub first: Condition,
    pub rest: Vec<(LogicalOp, Condition)>,
}

/// A tag invocation.
pub struct TagNode {
    pub name: String,
    pub markup: String,
    pub(crate) parsed: Markup,
}

impl fmt::Debug for TagNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagNode")
            .field("name", &self.name)
            .field("markup", &self.markup)
            .finish()
    }
}

impl PartialEq for TagNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.markup == other.markup
    }
}

/// A block with its body and the sections introduced by clauses.
pub struct BlockNode {
    pub name: String,
    pub markup: String,
    pub(crate) parsed: Markup,
    pub body: Vec<Node>,
    pub clauses: Vec<Clause>,
}

impl fmt::Debug for BlockNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockNode")
            .field("name", &self.name)
            .field("markup", &self.markup)
            .field("body", &self.body)
            .field("clauses", &self.clauses)
            .finish()
    }
}

impl PartialEq for BlockNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.markup == other.markup
            && self.body == other.body
            && self.clauses == other.clauses
    }
}

/// A section of a block body started by a clause such as `else`.
pub struct Clause {
    pub name: String,
    pub markup: String,
    pub(crate) parsed: Markup,
    pub body: Vec<Node>,
}

impl fmt::Debug for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clause")
            .field("name", &self.name)
            .field("markup", &self.markup)
            .field("body", &self.body)
            .finish()
    }
}

impl PartialEq for Clause {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.markup == other.markup && self.body == other.body
    }
}
