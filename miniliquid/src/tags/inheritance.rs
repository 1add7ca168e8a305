use crate::compiler::ast::{Expr, Node};
use crate::compiler::lexer;
use crate::compiler::parser::{self, MarkupParser};
use crate::error::{Error, ErrorKind};
use crate::output::Output;
use crate::registry::{Block, Body, Tag};
use crate::vm::{Context, Signal};

/// `{% extends "layout" %}` renders a stored parent template instead.
///
/// The `block` definitions of the current template override the blocks of
/// the same name in the parent.  Nothing after the tag renders.
#[derive(Debug, Default)]
pub struct Extends;

impl Tag for Extends {
    type Markup = Expr;

    fn parse(&self, markup: &str) -> Result<Expr, Error> {
        parser::parse_expr(markup)
    }

    fn render(&self, markup: &Expr, out: &mut Output, ctx: &mut Context<'_>) -> Result<(), Error> {
        let name = ok!(ctx.eval_expr(markup));
        let name = match name.as_str() {
            Some(name) => name,
            None => {
                return Err(Error::new(
                    ErrorKind::InvalidArguments,
                    format!("template name must be a string, got {}", name.kind()),
                ))
            }
        };
        let parent = ok!(ctx.env().get_template(name));
        tracing::debug!(
            child = ctx.template().name(),
            parent = parent.name(),
            "extending template"
        );

        let mut blocks = Vec::new();
        collect_blocks(ctx.template().nodes(), &mut blocks);
        for (name, nodes) in blocks {
            ctx.add_block_override(name, nodes);
        }

        let child = ctx.swap_template(parent);
        let rv = ctx.render_nodes(parent.nodes(), out);
        ctx.swap_template(child);
        ctx.set_signal(Signal::Extended);
        rv
    }
}

/// Finds every `block` definition, including nested ones.
fn collect_blocks<'n>(nodes: &'n [Node], rv: &mut Vec<(&'n str, &'n [Node])>) {
    for node in nodes {
        if let Node::Block(block) = node {
            if block.name == "block" {
                if let Some((name, _)) = lexer::name(&block.markup) {
                    rv.push((name, &block.body));
                }
            }
            collect_blocks(&block.body, rv);
            for clause in &block.clauses {
                collect_blocks(&clause.body, rv);
            }
        }
    }
}

/// `{% block name %}...{% endblock %}` marks an overridable region.
#[derive(Debug, Default)]
pub struct NamedBlock;

impl Block for NamedBlock {
    type Markup = String;
    type Clause = ();

    fn parse(&self, markup: &str) -> Result<String, Error> {
        let mut parser = MarkupParser::new(markup);
        let name = ok!(parser.parse_name());
        ok!(parser.expect_eof());
        Ok(name.to_string())
    }

    fn render(
        &self,
        body: &Body<'_, String, ()>,
        out: &mut Output,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        match ctx.block_override(body.markup) {
            Some(nodes) => ctx.render_nodes(nodes, out),
            None => ctx.render_nodes(body.nodes, out),
        }
    }
}
