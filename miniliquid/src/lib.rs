//! miniliquid is a template engine for Rust in the style of
//! [Liquid](https://shopify.github.io/liquid/).  Templates are parsed once
//! into an immutable tree and can then be rendered any number of times, from
//! any number of threads, with data from any [`serde`] serializable value.
//!
//! ```liquid
//! {% for user in users %}
//!   <li>{{ user.name | capitalize }}</li>
//! {% endfor %}
//! ```
//!
//! # Template Usage
//!
//! To use miniliquid one creates an [`Environment`], parses a source into a
//! [`Template`] and renders it with some assigns.  The [`context!`] macro is
//! a convenient way to create assigns:
//!
//! ```
//! use miniliquid::{Environment, context};
//!
//! let env = Environment::new();
//! let rv = env.render_str("Hello {{ name }}!", context!(name => "John")).unwrap();
//! assert_eq!(rv, "Hello John!");
//! ```
//!
//! For more control use [`Environment::parse`] and [`Environment::render`]
//! together with [`RenderOptions`].  Rendering hands back the output along
//! with the final [`Context`], so variables bound by `assign` and the
//! registers are available afterwards.
//!
//! # Syntax
//!
//! A template is text with two kinds of markup:
//!
//! * `{{ value | filter: arg }}` interpolates a value.  Values are literals
//!   (`"text"`, `42`, `1.5`, `true`, `nil`, `(1..3)`) or variable paths
//!   such as `user.name` or `items[0]`.  Filters apply left to right.
//! * `{% name markup %}` invokes a tag or a block.  Blocks are closed with
//!   `{% endname %}` and may be split into sections by clauses such as
//!   `{% else %}`.
//!
//! The built-in tags and blocks are `assign`, `capture`, `increment`,
//! `decrement`, `if`, `unless`, `case`, `comment`, `for`, `break`,
//! `continue`, `extends` and `block`.  Nothing about them is special: they
//! go through the same [`registry`] that custom tags use.
//!
//! # Error Handling
//!
//! Parsing fails with the first [`Error`] found.  Failures while rendering
//! are governed by the [`ErrorMode`] of the environment: in lax mode the
//! message is rendered in place of the failing node, in strict mode the
//! failing node renders nothing and the error is recorded on the
//! [`Context`].
//!
//! # Logging
//!
//! The engine emits [`tracing`](https://docs.rs/tracing) events: parsing and
//! rendering log at `debug`, recovered render errors at `warn`.
//!
//! # Optional Features
//!
//! - `builtins`: the built-in tags, blocks and filters.  Enabled by default.
//! - `json`: the `json` filter.  Enabled by default.
//! - `unstable_machinery`: exposes the tokenizer and parser.  There are no
//!   stability guarantees for this.
#![allow(clippy::new_without_default)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

#[macro_use]
mod macros;

mod compiler;
mod environment;
mod error;
mod output;
mod template;
mod utils;
mod vm;

pub mod filters;
pub mod registry;
pub mod tags;
pub mod value;

pub use self::environment::{
    global_environment, parse, render, set_global_environment, Environment, ErrorMode,
};
pub use self::error::{Error, ErrorCategory, ErrorKind};
pub use self::output::{Output, RenderOutput};
pub use self::template::{RenderOptions, Rendered, Template};
pub use self::utils::{HtmlEscape, JsEscape};
pub use self::value::Value;
pub use self::vm::{Context, GlobalFilter, Signal};

#[doc(hidden)]
pub use self::macros::__context;

/// Parsing of tag markup and the parsed syntax tree.
///
/// Custom tags and blocks use [`MarkupParser`](syntax::MarkupParser) to
/// read their markup into the same expressions the built-in tags use and
/// evaluate them with the [`Context`].
///
/// ```
/// use miniliquid::syntax::{parse_condition, parse_variable};
///
/// let condition = parse_condition("a > 1 and b contains 'x'").unwrap();
/// assert_eq!(condition.rest.len(), 1);
/// let variable = parse_variable("name | upcase | append: '!'").unwrap();
/// assert_eq!(variable.filters.len(), 2);
/// ```
pub mod syntax {
    pub use crate::compiler::ast::{
        BlockNode, Clause, CompareOp, Condition, ConditionChain, Expr, Filter, LogicalOp, Node,
        Path, Segment, Spanned, TagNode, Variable,
    };
    pub use crate::compiler::parser::{parse_condition, parse_expr, parse_variable, MarkupParser};
    pub use crate::compiler::tokens::Span;
}

/// This module gives access to the low level machinery.
///
/// This module is only provided by the `unstable_machinery` feature and does
/// not have a stable interface.  It mostly exists for internal testing
/// purposes and for debugging.
#[cfg(feature = "unstable_machinery")]
#[cfg_attr(docsrs, doc(cfg(feature = "unstable_machinery")))]
pub mod machinery {
    #![allow(missing_docs)]
    pub use crate::compiler::lexer::{tokenize, Tokenizer};
    pub use crate::compiler::parser::Parser;
    pub use crate::compiler::tokens::Token;
}
