use crate::compiler::ast::Variable;
use crate::compiler::parser::MarkupParser;
use crate::error::Error;
use crate::output::Output;
use crate::registry::{Block, Body, Tag};
use crate::value::Value;
use crate::vm::Context;

fn parse_single_name(markup: &str) -> Result<String, Error> {
    let mut parser = MarkupParser::new(markup);
    let name = ok!(parser.parse_name());
    ok!(parser.expect_eof());
    Ok(name.to_string())
}

/// `{% assign name = value | filter %}` binds a global variable.
#[derive(Debug, Default)]
pub struct Assign;

/// The parsed markup of [`Assign`].
#[derive(Debug)]
pub struct AssignMarkup {
    name: String,
    value: Variable,
}

impl Tag for Assign {
    type Markup = AssignMarkup;

    fn parse(&self, markup: &str) -> Result<AssignMarkup, Error> {
        let mut parser = MarkupParser::new(markup);
        let name = ok!(parser.parse_name()).to_string();
        ok!(parser.expect("="));
        let value = ok!(parser.parse_variable());
        ok!(parser.expect_eof());
        Ok(AssignMarkup { name, value })
    }

    fn render(
        &self,
        markup: &AssignMarkup,
        _out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        let value = ok!(ctx.eval_variable(&markup.value));
        ctx.set_global(&markup.name, value);
        Ok(())
    }
}

/// `{% capture name %}...{% endcapture %}` binds the rendered body.
#[derive(Debug, Default)]
pub struct Capture;

impl Block for Capture {
    type Markup = String;
    type Clause = ();

    fn parse(&self, markup: &str) -> Result<String, Error> {
        parse_single_name(markup)
    }

    fn render(
        &self,
        body: &Body<'_, String, ()>,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        out.begin_capture();
        let rv = ctx.render_nodes(body.nodes, out);
        let captured = out.end_capture();
        ok!(rv);
        ctx.set_global(body.markup, Value::from(captured));
        Ok(())
    }
}

fn counter_key(name: &str) -> String {
    format!("counter:{name}")
}

fn counter(ctx: &Context<'_>, name: &str) -> i64 {
    ctx.register(&counter_key(name))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

/// `{% increment name %}` outputs a counter and then increases it.
///
/// Counters start at zero and live in the registers, apart from
/// variables bound with `assign`.
#[derive(Debug, Default)]
pub struct Increment;

impl Tag for Increment {
    type Markup = String;

    fn parse(&self, markup: &str) -> Result<String, Error> {
        parse_single_name(markup)
    }

    fn render(&self, name: &String, out: &mut Output, ctx: &mut Context<'_>) -> Result<(), Error> {
        let value = counter(ctx, name);
        out.write_str(&value.to_string());
        ctx.set_register(&counter_key(name), Value::from(value.saturating_add(1)));
        Ok(())
    }
}

/// `{% decrement name %}` decreases a counter and then outputs it.
#[derive(Debug, Default)]
pub struct Decrement;

impl Tag for Decrement {
    type Markup = String;

    fn parse(&self, markup: &str) -> Result<String, Error> {
        parse_single_name(markup)
    }

    fn render(&self, name: &String, out: &mut Output, ctx: &mut Context<'_>) -> Result<(), Error> {
        let value = counter(ctx, name).saturating_sub(1);
        out.write_str(&value.to_string());
        ctx.set_register(&counter_key(name), Value::from(value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::ErrorKind;

    #[test]
    fn test_assign_markup() {
        let markup = Assign.parse("greeting = 'hi' | upcase").unwrap();
        assert_eq!(markup.name, "greeting");
        assert_eq!(markup.value.filters.len(), 1);

        let err = Assign.parse("greeting 'hi'").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert_eq!(
            Assign.parse("x = y z").unwrap_err().kind(),
            ErrorKind::SyntaxError
        );
    }

    #[test]
    fn test_counter_names() {
        assert_eq!(Increment.parse(" hits ").unwrap(), "hits");
        assert!(Decrement.parse("a b").is_err());
    }
}
