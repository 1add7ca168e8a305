//! The built-in tags and blocks.
//!
//! These are registered by [`Environment::new`](crate::Environment::new) and
//! go through the same [`Registry`](crate::registry::Registry) as custom
//! handlers.
use crate::registry::BoxedHandler;

#[cfg(feature = "builtins")]
mod control;
#[cfg(feature = "builtins")]
mod inheritance;
#[cfg(feature = "builtins")]
mod iteration;
#[cfg(feature = "builtins")]
mod variable;

#[cfg(feature = "builtins")]
pub use self::{control::*, inheritance::*, iteration::*, variable::*};

pub(crate) fn get_builtin_handlers() -> Vec<(&'static str, BoxedHandler)> {
    #[allow(unused_mut)]
    let mut rv = Vec::new();
    #[cfg(feature = "builtins")]
    {
        rv.push(("assign", BoxedHandler::tag(Assign)));
        rv.push(("capture", BoxedHandler::block(Capture)));
        rv.push(("increment", BoxedHandler::tag(Increment)));
        rv.push(("decrement", BoxedHandler::tag(Decrement)));
        rv.push(("if", BoxedHandler::block(If)));
        rv.push(("unless", BoxedHandler::block(Unless)));
        rv.push(("case", BoxedHandler::block(Case)));
        rv.push(("comment", BoxedHandler::block(Comment)));
        rv.push(("for", BoxedHandler::block(For)));
        rv.push(("break", BoxedHandler::tag(Break)));
        rv.push(("continue", BoxedHandler::tag(Continue)));
        rv.push(("extends", BoxedHandler::tag(Extends)));
        rv.push(("block", BoxedHandler::block(NamedBlock)));
    }
    rv
}
