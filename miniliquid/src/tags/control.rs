use crate::compiler::ast::{ConditionChain, Expr, Node};
use crate::compiler::parser::{self, MarkupParser};
use crate::error::{Error, ErrorKind};
use crate::output::Output;
use crate::registry::{Block, Body};
use crate::vm::{Context, Signal};

fn expect_empty(name: &str, markup: &str) -> Result<(), Error> {
    if markup.trim().is_empty() {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::SyntaxError,
            format!("`{name}` does not take any arguments"),
        ))
    }
}

fn parse_else(name: &str, markup: &str) -> Result<(), Error> {
    match name {
        "else" => expect_empty(name, markup),
        _ => Err(Error::new(
            ErrorKind::SyntaxError,
            format!("unexpected clause `{name}`"),
        )),
    }
}

/// Renders the first section whose condition holds.
///
/// `None` stands for an unconditional `else`.
fn render_first_match<'n, I>(
    sections: I,
    out: &mut Output,
    ctx: &mut Context<'_>,
) -> Result<(), Error>
where
    I: IntoIterator<Item = (Option<&'n ConditionChain>, &'n [Node])>,
{
    for (condition, nodes) in sections {
        let matches = match condition {
            Some(condition) => ok!(ctx.eval_condition(condition)),
            None => true,
        };
        if matches {
            return ctx.render_nodes(nodes, out);
        }
    }
    Ok(())
}

/// `{% if condition %}...{% elsif condition %}...{% else %}...{% endif %}`.
#[derive(Debug, Default)]
pub struct If;

impl Block for If {
    type Markup = ConditionChain;
    type Clause = Option<ConditionChain>;

    fn parse(&self, markup: &str) -> Result<ConditionChain, Error> {
        parser::parse_condition(markup)
    }

    fn clauses(&self) -> &'static [&'static str] {
        &["elsif", "else"]
    }

    fn final_clauses(&self) -> &'static [&'static str] {
        &["else"]
    }

    fn parse_clause(&self, name: &str, markup: &str) -> Result<Option<ConditionChain>, Error> {
        match name {
            "elsif" => parser::parse_condition(markup).map(Some),
            _ => parse_else(name, markup).map(|_| None),
        }
    }

    fn render(
        &self,
        body: &Body<'_, ConditionChain, Option<ConditionChain>>,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        let sections = std::iter::once((Some(body.markup), body.nodes)).chain(
            body.clauses
                .iter()
                .map(|section| (section.markup.as_ref(), section.nodes)),
        );
        render_first_match(sections, out, ctx)
    }
}

/// `{% unless condition %}...{% else %}...{% endunless %}`.
#[derive(Debug, Default)]
pub struct Unless;

impl Block for Unless {
    type Markup = ConditionChain;
    type Clause = ();

    fn parse(&self, markup: &str) -> Result<ConditionChain, Error> {
        parser::parse_condition(markup)
    }

    fn clauses(&self) -> &'static [&'static str] {
        &["else"]
    }

    fn final_clauses(&self) -> &'static [&'static str] {
        &["else"]
    }

    fn parse_clause(&self, name: &str, markup: &str) -> Result<(), Error> {
        parse_else(name, markup)
    }

    fn render(
        &self,
        body: &Body<'_, ConditionChain, ()>,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        if !ok!(ctx.eval_condition(body.markup)) {
            return ctx.render_nodes(body.nodes, out);
        }
        match body.clauses.first() {
            Some(section) => ctx.render_nodes(section.nodes, out),
            None => Ok(()),
        }
    }
}

/// `{% case value %}{% when a, b %}...{% else %}...{% endcase %}`.
///
/// Every `when` section with a matching value renders.  The `else`
/// section renders if no `when` before it matched.
#[derive(Debug, Default)]
pub struct Case;

impl Block for Case {
    type Markup = Expr;
    type Clause = Option<Vec<Expr>>;

    fn parse(&self, markup: &str) -> Result<Expr, Error> {
        parser::parse_expr(markup)
    }

    fn clauses(&self) -> &'static [&'static str] {
        &["when", "else"]
    }

    fn parse_clause(&self, name: &str, markup: &str) -> Result<Option<Vec<Expr>>, Error> {
        if name != "when" {
            return parse_else(name, markup).map(|_| None);
        }
        let mut parser = MarkupParser::new(markup);
        let mut values = vec![ok!(parser.parse_expr())];
        while parser.eat(",") || parser.eat_keyword("or") {
            values.push(ok!(parser.parse_expr()));
        }
        ok!(parser.expect_eof());
        Ok(Some(values))
    }

    fn render(
        &self,
        body: &Body<'_, Expr, Option<Vec<Expr>>>,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        let value = ok!(ctx.eval_expr(body.markup));
        let mut matched = false;
        for section in &body.clauses {
            let render = match section.markup {
                Some(candidates) => {
                    let mut found = false;
                    for candidate in candidates {
                        if ok!(ctx.eval_expr(candidate)) == value {
                            found = true;
                            break;
                        }
                    }
                    found
                }
                None => !matched,
            };
            if render {
                matched = true;
                ok!(ctx.render_nodes(section.nodes, out));
                if ctx.signal() != Signal::Normal {
                    break;
                }
            }
        }
        Ok(())
    }
}

/// `{% comment %}...{% endcomment %}` renders nothing.
#[derive(Debug, Default)]
pub struct Comment;

impl Block for Comment {
    type Markup = ();
    type Clause = ();

    fn parse(&self, _markup: &str) -> Result<(), Error> {
        Ok(())
    }

    fn render(&self, _: &Body<'_, (), ()>, _: &mut Output, _: &mut Context<'_>) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_markup() {
        assert!(If.parse_clause("elsif", "a == 1").unwrap().is_some());
        assert!(If.parse_clause("else", "").unwrap().is_none());
        assert_eq!(
            If.parse_clause("else", "junk").unwrap_err().kind(),
            ErrorKind::SyntaxError
        );
        assert_eq!(
            Case.parse_clause("when", "1, 2 or 3").unwrap().map(|x| x.len()),
            Some(3)
        );
        assert!(Case.parse_clause("when", "").is_err());
    }
}
