//! Tag and block registration.
//!
//! Tags and blocks are not hardcoded into the grammar.  Every `{% name %}` is
//! looked up in the [`Registry`] of the environment: the parser asks it
//! whether `name` opens a block that needs a matching `{% endname %}`, and the
//! renderer dispatches to the registered handler.
//!
//! A tag implements [`Tag`], a block implements [`Block`].  Both parse their
//! markup once when the template is parsed into a value of their own choosing
//! and get that value back when they render:
//!
//! ```
//! use miniliquid::{Context, Environment, Error, Output};
//! use miniliquid::registry::Tag;
//!
//! struct Shout;
//!
//! impl Tag for Shout {
//!     type Markup = String;
//!
//!     fn parse(&self, markup: &str) -> Result<String, Error> {
//!         Ok(markup.to_uppercase())
//!     }
//!
//!     fn render(&self, markup: &String, out: &mut Output, _ctx: &mut Context) -> Result<(), Error> {
//!         out.write_str(markup);
//!         Ok(())
//!     }
//! }
//!
//! let mut env = Environment::new();
//! env.register_tag("shout", Shout).unwrap();
//! assert_eq!(env.render_str("{% shout hello %}!", ()).unwrap(), "HELLO!");
//! ```
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::Arc;

use crate::compiler::ast::{BlockNode, Markup, Node, TagNode};
use crate::compiler::lexer;
use crate::error::{Error, ErrorKind};
use crate::output::Output;
use crate::vm::Context;

/// Whether a name stands alone or opens a block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HandlerKind {
    /// A tag without body.
    Tag,
    /// A block terminated by `end<name>`.
    Block,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Tag => f.write_str("tag"),
            HandlerKind::Block => f.write_str("block"),
        }
    }
}

/// A tag without body such as `assign`.
pub trait Tag: Send + Sync + 'static {
    /// The parsed form of the markup.
    type Markup: Send + Sync + 'static;

    /// Parses the markup after the tag name.
    fn parse(&self, markup: &str) -> Result<Self::Markup, Error>;

    /// Renders the tag.
    ///
    /// The tag may write to the output and change the context, including
    /// setting a control signal.
    fn render(
        &self,
        markup: &Self::Markup,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error>;
}

/// A block with a body such as `if` or `for`.
pub trait Block: Send + Sync + 'static {
    /// The parsed form of the markup of the opening tag.
    type Markup: Send + Sync + 'static;
    /// The parsed form of the markup of a clause.
    type Clause: Send + Sync + 'static;

    /// Parses the markup of the opening tag.
    fn parse(&self, markup: &str) -> Result<Self::Markup, Error>;

    /// The names of the clauses (like `else`) that split the body.
    fn clauses(&self) -> &'static [&'static str] {
        &[]
    }

    /// The clauses that have to be the last clause of the block.
    ///
    /// Any clause following one of these is a syntax error.
    fn final_clauses(&self) -> &'static [&'static str] {
        &[]
    }

    /// Parses the markup of a clause.
    fn parse_clause(&self, name: &str, markup: &str) -> Result<Self::Clause, Error> {
        let _ = markup;
        Err(Error::new(
            ErrorKind::SyntaxError,
            format!("unexpected clause `{name}`"),
        ))
    }

    /// Renders the block.
    ///
    /// The block decides if and how often its body is rendered, usually
    /// through [`Context::render_nodes`].
    fn render(
        &self,
        body: &Body<'_, Self::Markup, Self::Clause>,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error>;
}

/// A block as it is handed to [`Block::render`].
pub struct Body<'n, M, C> {
    /// The name of the block.
    pub name: &'n str,
    /// The parsed markup of the opening tag.
    pub markup: &'n M,
    /// The nodes between the opening tag and the first clause.
    pub nodes: &'n [Node],
    /// The clause sections in document order.
    pub clauses: Vec<Section<'n, C>>,
}

/// A section of a block started by a clause.
pub struct Section<'n, C> {
    /// The name of the clause.
    pub name: &'n str,
    /// The parsed markup of the clause.
    pub markup: &'n C,
    /// The nodes of the section.
    pub nodes: &'n [Node],
}

fn downcast<T: 'static>(markup: &Markup) -> Result<&T, Error> {
    markup.downcast_ref::<T>().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            "markup was parsed by a different handler",
        )
    })
}

trait ErasedHandler: Send + Sync {
    fn clauses(&self) -> &'static [&'static str];
    fn final_clauses(&self) -> &'static [&'static str];
    fn parse(&self, markup: &str) -> Result<Markup, Error>;
    fn parse_clause(&self, name: &str, markup: &str) -> Result<Markup, Error>;
    fn render_tag(&self, node: &TagNode, out: &mut Output, ctx: &mut Context<'_>)
        -> Result<(), Error>;
    fn render_block(
        &self,
        node: &BlockNode,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error>;
}

struct TagAdapter<T>(T);

impl<T: Tag> ErasedHandler for TagAdapter<T> {
    fn clauses(&self) -> &'static [&'static str] {
        &[]
    }

    fn final_clauses(&self) -> &'static [&'static str] {
        &[]
    }

    fn parse(&self, markup: &str) -> Result<Markup, Error> {
        self.0.parse(markup).map(|m| Box::new(m) as Markup)
    }

    fn parse_clause(&self, name: &str, _markup: &str) -> Result<Markup, Error> {
        Err(Error::new(
            ErrorKind::SyntaxError,
            format!("unexpected clause `{name}`"),
        ))
    }

    fn render_tag(
        &self,
        node: &TagNode,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        let markup = ok!(downcast::<T::Markup>(&node.parsed));
        self.0.render(markup, out, ctx)
    }

    fn render_block(
        &self,
        node: &BlockNode,
        _out: &mut Output,
        _ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("`{}` is a tag, not a block", node.name),
        ))
    }
}

struct BlockAdapter<B>(B);

impl<B: Block> ErasedHandler for BlockAdapter<B> {
    fn clauses(&self) -> &'static [&'static str] {
        self.0.clauses()
    }

    fn final_clauses(&self) -> &'static [&'static str] {
        self.0.final_clauses()
    }

    fn parse(&self, markup: &str) -> Result<Markup, Error> {
        self.0.parse(markup).map(|m| Box::new(m) as Markup)
    }

    fn parse_clause(&self, name: &str, markup: &str) -> Result<Markup, Error> {
        self.0
            .parse_clause(name, markup)
            .map(|m| Box::new(m) as Markup)
    }

    fn render_tag(
        &self,
        node: &TagNode,
        _out: &mut Output,
        _ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("`{}` is a block, not a tag", node.name),
        ))
    }

    fn render_block(
        &self,
        node: &BlockNode,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        let mut clauses = Vec::with_capacity(node.clauses.len());
        for clause in &node.clauses {
            clauses.push(Section {
                name: &clause.name,
                markup: ok!(downcast::<B::Clause>(&clause.parsed)),
                nodes: &clause.body,
            });
        }
        let body = Body {
            name: &node.name,
            markup: ok!(downcast::<B::Markup>(&node.parsed)),
            nodes: &node.body,
            clauses,
        };
        self.0.render(&body, out, ctx)
    }
}

/// A type erased tag or block handler.
#[derive(Clone)]
pub struct BoxedHandler {
    kind: HandlerKind,
    type_id: TypeId,
    stateless: bool,
    inner: Arc<dyn ErasedHandler>,
}

impl fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedHandler")
            .field("kind", &self.kind)
            .finish()
    }
}

impl BoxedHandler {
    /// Boxes a tag.
    pub fn tag<T: Tag>(tag: T) -> BoxedHandler {
        BoxedHandler {
            kind: HandlerKind::Tag,
            type_id: TypeId::of::<T>(),
            stateless: mem::size_of::<T>() == 0,
            inner: Arc::new(TagAdapter(tag)),
        }
    }

    /// Boxes a block.
    pub fn block<B: Block>(block: B) -> BoxedHandler {
        BoxedHandler {
            kind: HandlerKind::Block,
            type_id: TypeId::of::<B>(),
            stateless: mem::size_of::<B>() == 0,
            inner: Arc::new(BlockAdapter(block)),
        }
    }

    /// Returns the kind of the handler.
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Checks if two boxed handlers are the same handler.
    ///
    /// Clones of one boxed handler are the same.  Separately boxed handlers
    /// only are if they share kind and type and the type carries no state.
    pub fn is_same(&self, other: &BoxedHandler) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.kind == other.kind && self.type_id == other.type_id && self.stateless)
    }

    pub(crate) fn clauses(&self) -> &'static [&'static str] {
        self.inner.clauses()
    }

    pub(crate) fn final_clauses(&self) -> &'static [&'static str] {
        self.inner.final_clauses()
    }

    pub(crate) fn parse(&self, markup: &str) -> Result<Markup, Error> {
        self.inner.parse(markup)
    }

    pub(crate) fn parse_clause(&self, name: &str, markup: &str) -> Result<Markup, Error> {
        self.inner.parse_clause(name, markup)
    }

    pub(crate) fn render_tag(
        &self,
        node: &TagNode,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        self.inner.render_tag(node, out, ctx)
    }

    pub(crate) fn render_block(
        &self,
        node: &BlockNode,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        self.inner.render_block(node, out, ctx)
    }
}

/// Maps tag and block names to their handlers.
#[derive(Clone, Default, Debug)]
pub struct Registry {
    handlers: HashMap<String, BoxedHandler>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    pub(crate) fn from_handlers(handlers: Vec<(&'static str, BoxedHandler)>) -> Registry {
        Registry {
            handlers: handlers
                .into_iter()
                .map(|(name, handler)| (name.to_string(), handler))
                .collect(),
        }
    }

    /// Registers a handler under a name.
    ///
    /// Registering the same handler again is a no-op (see
    /// [`BoxedHandler::is_same`]).  Any other handler for an already registered name fails with
    /// [`ErrorKind::DuplicateRegistration`].
    pub fn register(&mut self, name: &str, handler: BoxedHandler) -> Result<(), Error> {
        if lexer::name(name) != Some((name, "")) {
            return Err(Error::new(
                ErrorKind::InvalidArguments,
                format!("`{name}` is not a valid tag name"),
            ));
        }
        match self.handlers.get(name) {
            Some(existing) if existing.is_same(&handler) => Ok(()),
            Some(existing) => Err(Error::new(
                ErrorKind::DuplicateRegistration,
                format!("`{name}` is already registered as a {}", existing.kind),
            )),
            None => {
                tracing::debug!(name, kind = %handler.kind, "registered handler");
                self.handlers.insert(name.to_string(), handler);
                Ok(())
            }
        }
    }

    /// Looks up a handler with its kind.
    pub fn lookup(&self, name: &str) -> Option<(HandlerKind, &BoxedHandler)> {
        self.handlers.get(name).map(|handler| (handler.kind, handler))
    }

    pub(crate) fn get(&self, name: &str) -> Option<&BoxedHandler> {
        self.handlers.get(name)
    }

    /// Returns `true` if some registered block accepts `name` as a clause.
    pub(crate) fn is_clause(&self, name: &str) -> bool {
        self.handlers
            .values()
            .any(|handler| handler.clauses().contains(&name))
    }

    /// Iterates over the registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|x| x.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Tag for Noop {
        type Markup = ();

        fn parse(&self, _markup: &str) -> Result<(), Error> {
            Ok(())
        }

        fn render(&self, _: &(), _: &mut Output, _: &mut Context<'_>) -> Result<(), Error> {
            Ok(())
        }
    }

    struct Other;

    impl Tag for Other {
        type Markup = ();

        fn parse(&self, _markup: &str) -> Result<(), Error> {
            Ok(())
        }

        fn render(&self, _: &(), _: &mut Output, _: &mut Context<'_>) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn test_registration_is_idempotent() {
        let mut registry = Registry::new();
        registry.register("noop", BoxedHandler::tag(Noop)).unwrap();
        registry.register("noop", BoxedHandler::tag(Noop)).unwrap();
        assert_eq!(registry.lookup("noop").map(|x| x.0), Some(HandlerKind::Tag));
    }

    struct Greeting(&'static str);

    impl Tag for Greeting {
        type Markup = ();

        fn parse(&self, _markup: &str) -> Result<(), Error> {
            Ok(())
        }

        fn render(&self, _: &(), out: &mut Output, _: &mut Context<'_>) -> Result<(), Error> {
            out.write_str(self.0);
            Ok(())
        }
    }

    #[test]
    fn test_stateful_handlers_are_compared_by_identity() {
        let mut registry = Registry::new();
        let hi = BoxedHandler::tag(Greeting("hi"));
        registry.register("greet", hi.clone()).unwrap();
        registry.register("greet", hi).unwrap();

        let err = registry
            .register("greet", BoxedHandler::tag(Greeting("bye")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateRegistration);
        let err = registry
            .register("greet", BoxedHandler::tag(Greeting("hi")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateRegistration);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = Registry::new();
        registry.register("noop", BoxedHandler::tag(Noop)).unwrap();
        let err = registry
            .register("noop", BoxedHandler::tag(Other))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateRegistration);
        assert_eq!(
            err.to_string(),
            "duplicate registration: `noop` is already registered as a tag"
        );
    }

    #[test]
    fn test_invalid_names() {
        let mut registry = Registry::new();
        for name in ["", "1x", "a b", "%"] {
            let err = registry.register(name, BoxedHandler::tag(Noop)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArguments);
        }
        assert!(registry.lookup("a").is_none());
    }
}
