use crate::compiler::ast::Node;
use crate::compiler::tokens::Span;
use crate::environment::{Environment, ErrorMode};
use crate::error::Error;
use crate::output::{Output, OutputMode};
use crate::template::{RenderOptions, Rendered, Template};
use crate::utils::JsEscape;
use crate::value::Value;

pub use crate::vm::context::{Context, GlobalFilter, Signal};

mod context;

/// Renders a template into a fresh context.
pub(crate) fn render<'a>(
    env: &'a Environment,
    template: &'a Template,
    assigns: Value,
    options: RenderOptions,
) -> Rendered<'a> {
    tracing::debug!(template = template.name(), "rendering template");
    let RenderOptions {
        registers,
        escape_variables,
        stringify_output,
        global_filter,
    } = options;
    let mut ctx = Context::new(
        env,
        template,
        assigns,
        registers,
        escape_variables,
        global_filter,
    );
    let mut out = Output::new(if stringify_output {
        OutputMode::Joined
    } else {
        OutputMode::Fragments
    });
    if let Err(err) = ctx.render_nodes(template.nodes(), &mut out) {
        recover(&mut ctx, &mut out, err, Span::default(), false);
    }
    tracing::debug!(
        template = template.name(),
        errors = ctx.errors().len(),
        "rendered template"
    );
    Rendered::new(out.finish(), ctx)
}

/// Walks sibling nodes until one of them raises a control signal.
pub(crate) fn render_nodes(ctx: &mut Context<'_>, nodes: &[Node], out: &mut Output) {
    for node in nodes {
        render_node(ctx, node, out);
        if ctx.signal() != Signal::Normal {
            tracing::trace!(signal = ?ctx.signal(), "abandoning remaining nodes");
            break;
        }
    }
}

fn render_node(ctx: &mut Context<'_>, node: &Node, out: &mut Output) {
    let (rv, span) = match node {
        Node::Literal(text) => {
            out.write_str(text);
            return;
        }
        Node::Variable(var) => match ctx.eval_variable(var) {
            Ok(value) => {
                write_value(ctx, out, value, var.span());
                return;
            }
            Err(err) => return recover(ctx, out, err, var.span(), true),
        },
        Node::Tag(tag) => match ctx.env().registry().get(&tag.name) {
            Some(handler) => (handler.render_tag(tag, out, ctx), tag.span()),
            None => return,
        },
        Node::Block(block) => match ctx.env().registry().get(&block.name) {
            Some(handler) => (handler.render_block(block, out, ctx), block.span()),
            None => (ctx.render_nodes(&block.body, out), block.span()),
        },
    };
    if let Err(err) = rv {
        recover(ctx, out, err, span, false);
    }
}

fn write_value(ctx: &mut Context<'_>, out: &mut Output, value: Value, span: Span) {
    let value = match ctx.global_filter().cloned() {
        Some(filter) => match filter(value) {
            Ok(value) => value,
            Err(err) => return recover(ctx, out, err, span, true),
        },
        None => value,
    };
    match value.as_str() {
        Some(s) if ctx.escape_variables() => out.write_str(&JsEscape(s).to_string()),
        _ => out.write_str(&value.to_string()),
    }
}

/// Applies the error mode to a failure during rendering.
///
/// In lax mode the message takes the place of the output, escaped like a
/// variable if the failing node was one.  In strict mode nothing is written
/// and the error is recorded on the context.
fn recover(ctx: &mut Context<'_>, out: &mut Output, mut err: Error, span: Span, variable: bool) {
    if err.line().is_none() && span != Span::default() {
        err.set_location(ctx.template().name(), span.start_line as usize);
    }
    tracing::warn!(error = %err, "recovered render error");
    match ctx.env().error_mode() {
        ErrorMode::Lax if variable && ctx.escape_variables() => {
            out.write_str(&JsEscape(&err.inline_message()).to_string())
        }
        ErrorMode::Lax => out.write_str(&err.inline_message()),
        ErrorMode::Strict => ctx.push_error(err),
    }
}
