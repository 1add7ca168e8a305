use crate::compiler::ast::Expr;
use crate::compiler::parser::MarkupParser;
use crate::error::{Error, ErrorKind};
use crate::output::Output;
use crate::registry::{Block, Body, Tag};
use crate::value::{Value, ValueMap};
use crate::vm::{Context, Signal};

/// `{% for item in collection limit: n offset: n reversed %}`.
///
/// The body renders once per item with `item` and `forloop` bound in a
/// scope of its own.  An `{% else %}` section renders for empty
/// collections.
#[derive(Debug, Default)]
pub struct For;

/// The parsed markup of [`For`].
#[derive(Debug)]
pub struct ForMarkup {
    var: String,
    iter: Expr,
    limit: Option<Expr>,
    offset: Option<Expr>,
    reversed: bool,
}

fn parse_for(markup: &str) -> Result<ForMarkup, Error> {
    let mut parser = MarkupParser::new(markup);
    let var = ok!(parser.parse_name()).to_string();
    if !parser.eat_keyword("in") {
        return Err(Error::new(
            ErrorKind::SyntaxError,
            format!("expected `in` after `{var}`"),
        ));
    }
    let iter = ok!(parser.parse_expr());
    let mut rv = ForMarkup {
        var,
        iter,
        limit: None,
        offset: None,
        reversed: false,
    };
    loop {
        if parser.eat_keyword("reversed") {
            rv.reversed = true;
        } else if parser.eat_keyword("limit") {
            ok!(parser.expect(":"));
            rv.limit = Some(ok!(parser.parse_expr()));
        } else if parser.eat_keyword("offset") {
            ok!(parser.expect(":"));
            rv.offset = Some(ok!(parser.parse_expr()));
        } else {
            break;
        }
    }
    ok!(parser.expect_eof());
    Ok(rv)
}

fn eval_count(ctx: &Context<'_>, expr: Option<&Expr>, what: &str) -> Result<Option<usize>, Error> {
    let expr = match expr {
        Some(expr) => expr,
        None => return Ok(None),
    };
    let value = ok!(ctx.eval_expr(expr));
    if value.is_undefined() || value.is_none() {
        return Ok(None);
    }
    match value.as_i64() {
        Some(count) => Ok(Some(count.max(0) as usize)),
        None => Err(Error::new(
            ErrorKind::InvalidArguments,
            format!("{what} must be a number, got {}", value.kind()),
        )),
    }
}

fn forloop(index: usize, length: usize) -> Value {
    let mut rv = ValueMap::new();
    rv.insert("index".into(), Value::from(index + 1));
    rv.insert("index0".into(), Value::from(index));
    rv.insert("rindex".into(), Value::from(length - index));
    rv.insert("rindex0".into(), Value::from(length - index - 1));
    rv.insert("first".into(), Value::from(index == 0));
    rv.insert("last".into(), Value::from(index + 1 == length));
    rv.insert("length".into(), Value::from(length));
    Value::from(rv)
}

impl Block for For {
    type Markup = ForMarkup;
    type Clause = ();

    fn parse(&self, markup: &str) -> Result<ForMarkup, Error> {
        parse_for(markup)
    }

    fn clauses(&self) -> &'static [&'static str] {
        &["else"]
    }

    fn final_clauses(&self) -> &'static [&'static str] {
        &["else"]
    }

    fn parse_clause(&self, name: &str, markup: &str) -> Result<(), Error> {
        if name == "else" && markup.trim().is_empty() {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::SyntaxError,
                format!("unexpected clause `{name}`"),
            ))
        }
    }

    fn render(
        &self,
        body: &Body<'_, ForMarkup, ()>,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        let markup = body.markup;
        let mut items = ok!(ok!(ctx.eval_expr(&markup.iter)).try_iter());
        let offset = ok!(eval_count(ctx, markup.offset.as_ref(), "offset")).unwrap_or(0);
        items.drain(..offset.min(items.len()));
        if let Some(limit) = ok!(eval_count(ctx, markup.limit.as_ref(), "limit")) {
            items.truncate(limit);
        }
        if markup.reversed {
            items.reverse();
        }

        if items.is_empty() {
            return match body.clauses.first() {
                Some(section) => ctx.render_nodes(section.nodes, out),
                None => Ok(()),
            };
        }

        let length = items.len();
        ctx.push_scope();
        let mut rv = Ok(());
        for (index, item) in items.into_iter().enumerate() {
            ctx.set_local(&markup.var, item);
            ctx.set_local("forloop", forloop(index, length));
            rv = ctx.render_nodes(body.nodes, out);
            if rv.is_err() {
                break;
            }
            match ctx.signal() {
                Signal::Normal => {}
                Signal::Continue => {
                    ctx.take_signal();
                }
                Signal::Break => {
                    ctx.take_signal();
                    break;
                }
                Signal::Extended => break,
            }
        }
        ctx.pop_scope();
        rv
    }
}

fn parse_bare(name: &str, markup: &str) -> Result<(), Error> {
    if markup.trim().is_empty() {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::SyntaxError,
            format!("`{name}` does not take any arguments"),
        ))
    }
}

/// `{% break %}` leaves the innermost loop.
#[derive(Debug, Default)]
pub struct Break;

impl Tag for Break {
    type Markup = ();

    fn parse(&self, markup: &str) -> Result<(), Error> {
        parse_bare("break", markup)
    }

    fn render(&self, _: &(), _out: &mut Output, ctx: &mut Context<'_>) -> Result<(), Error> {
        ctx.set_signal(Signal::Break);
        Ok(())
    }
}

/// `{% continue %}` skips to the next iteration of the innermost loop.
#[derive(Debug, Default)]
pub struct Continue;

impl Tag for Continue {
    type Markup = ();

    fn parse(&self, markup: &str) -> Result<(), Error> {
        parse_bare("continue", markup)
    }

    fn render(&self, _: &(), _out: &mut Output, ctx: &mut Context<'_>) -> Result<(), Error> {
        ctx.set_signal(Signal::Continue);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_parse_for() {
        let markup = parse_for("item in items reversed limit: 2 offset: 1").unwrap();
        assert_eq!(markup.var, "item");
        assert!(markup.reversed);
        assert!(markup.limit.is_some());
        assert!(markup.offset.is_some());

        let err = parse_for("item of items").unwrap_err();
        assert_eq!(err.to_string(), "syntax error: expected `in` after `item`");
        assert!(parse_for("item in items sideways").is_err());
    }

    #[test]
    fn test_forloop() {
        let value = forloop(0, 3);
        assert_eq!(value.get_attr("index"), Value::from(1));
        assert_eq!(value.get_attr("rindex0"), Value::from(2));
        assert_eq!(value.get_attr("first"), Value::from(true));
        assert_eq!(forloop(2, 3).get_attr("last"), Value::from(true));
    }

    #[test]
    fn test_bare_tags() {
        assert!(Break.parse("").is_ok());
        assert_eq!(
            Continue.parse("now").unwrap_err().kind(),
            ErrorKind::SyntaxError
        );
    }
}
