use crate::compiler::ast::{
    BlockNode, Clause, Condition, ConditionChain, Expr, Filter, Node, Path, Segment, Spanned,
    TagNode, Variable,
};
use crate::compiler::lexer::{self, Tokenizer};
use crate::compiler::tokens::{Span, Token};
use crate::error::{Error, ErrorKind};
use crate::registry::{BoxedHandler, HandlerKind, Registry};
use crate::value::Value;

const MAX_RECURSION: usize = 150;

fn syntax_error(msg: String) -> Error {
    Error::new(ErrorKind::SyntaxError, msg)
}

fn describe(rest: &str) -> String {
    match lexer::skip_ws(rest).chars().next() {
        Some(c) => format!("`{c}`"),
        None => "end of markup".into(),
    }
}

/// Parses the markup of tags and the bodies of variables.
///
/// This is what tag and block implementations use to read their markup.
/// All methods skip leading whitespace.
pub struct MarkupParser<'a> {
    rest: &'a str,
    depth: usize,
}

impl<'a> MarkupParser<'a> {
    /// Creates a parser over some markup.
    pub fn new(markup: &'a str) -> MarkupParser<'a> {
        MarkupParser {
            rest: markup,
            depth: 0,
        }
    }

    /// Returns the unparsed remainder.
    pub fn rest(&self) -> &'a str {
        lexer::skip_ws(self.rest)
    }

    /// Returns `true` if only whitespace is left.
    pub fn is_eof(&self) -> bool {
        self.rest().is_empty()
    }

    /// Fails unless only whitespace is left.
    pub fn expect_eof(&self) -> Result<(), Error> {
        if self.is_eof() {
            Ok(())
        } else {
            Err(syntax_error(format!("unexpected {}", describe(self.rest))))
        }
    }

    /// Consumes a punctuation token if it comes next.
    pub fn eat(&mut self, token: &str) -> bool {
        match lexer::punct(self.rest, token) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    /// Consumes a punctuation token or fails.
    pub fn expect(&mut self, token: &str) -> Result<(), Error> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(syntax_error(format!(
                "expected `{token}`, found {}",
                describe(self.rest)
            )))
        }
    }

    /// Consumes a keyword if it is the next name.
    pub fn eat_keyword(&mut self, word: &str) -> bool {
        match lexer::name(self.rest) {
            Some((name, rest)) if name == word => {
                self.rest = rest;
                true
            }
            _ => false,
        }
    }

    /// Parses a name.
    pub fn parse_name(&mut self) -> Result<&'a str, Error> {
        match lexer::name(self.rest) {
            Some((name, rest)) => {
                self.rest = rest;
                Ok(name)
            }
            None => Err(syntax_error(format!(
                "expected a name, found {}",
                describe(self.rest)
            ))),
        }
    }

    /// Parses a value expression.
    pub fn parse_expr(&mut self) -> Result<Expr, Error> {
        self.depth += 1;
        if self.depth > MAX_RECURSION {
            return Err(Error::new(
                ErrorKind::NestingTooDeep,
                "expression nested too deeply",
            ));
        }
        let rv = self.parse_primary();
        self.depth -= 1;
        rv
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        if let Some((s, rest)) = lexer::quoted(self.rest) {
            self.rest = rest;
            return Ok(Expr::Const(Value::from(s)));
        }
        if let Some((num, rest)) = lexer::number(self.rest) {
            self.rest = rest;
            return Ok(Expr::Const(num));
        }
        if self.eat("(") {
            let start = ok!(self.parse_expr());
            ok!(self.expect(".."));
            let end = ok!(self.parse_expr());
            ok!(self.expect(")"));
            return Ok(Expr::Range(Box::new(start), Box::new(end)));
        }
        let root = match lexer::name(self.rest) {
            Some((name, rest)) => {
                self.rest = rest;
                name
            }
            None => {
                return Err(syntax_error(format!(
                    "expected a value, found {}",
                    describe(self.rest)
                )))
            }
        };
        match root {
            "true" => return Ok(Expr::Const(Value::from(true))),
            "false" => return Ok(Expr::Const(Value::from(false))),
            "nil" | "null" => return Ok(Expr::Const(Value::from(()))),
            "empty" | "blank" => return Ok(Expr::Empty),
            _ => {}
        }
        let mut segments = Vec::new();
        loop {
            // segments must directly follow the previous one
            if let Some(rest) = self.rest.strip_prefix('.') {
                if rest.starts_with('.') {
                    break;
                }
                self.rest = rest;
                segments.push(Segment::Attr(ok!(self.parse_name()).to_string()));
            } else if let Some(rest) = self.rest.strip_prefix('[') {
                self.rest = rest;
                let index = ok!(self.parse_expr());
                ok!(self.expect("]"));
                segments.push(Segment::Index(index));
            } else {
                break;
            }
        }
        Ok(Expr::Path(Path {
            root: root.to_string(),
            segments,
        }))
    }

    /// Parses a single `value` or `value operator value` condition.
    pub fn parse_condition(&mut self) -> Result<Condition, Error> {
        let left = ok!(self.parse_expr());
        match lexer::comparison_op(self.rest) {
            Some((op, rest)) => {
                self.rest = rest;
                let right = ok!(self.parse_expr());
                Ok(Condition::Compare(left, op, right))
            }
            None => Ok(Condition::Value(left)),
        }
    }

    /// Parses conditions joined by `and`, `or` or a comma.
    pub fn parse_condition_chain(&mut self) -> Result<ConditionChain, Error> {
        let first = ok!(self.parse_condition());
        let mut rest = Vec::new();
        while let Some((op, remaining)) = lexer::logical_op(self.rest) {
            self.rest = remaining;
            rest.push((op, ok!(self.parse_condition())));
        }
        Ok(ConditionChain { first, rest })
    }

    /// Parses a (possibly empty) chain of `| name: args` filters.
    pub fn parse_filters(&mut self) -> Result<Vec<Filter>, Error> {
        let mut rv = Vec::new();
        while self.eat("|") {
            let name = match lexer::filter_name(self.rest) {
                Some((name, rest)) => {
                    self.rest = rest;
                    name
                }
                None => {
                    return Err(Error::new(
                        ErrorKind::EmptyFilter,
                        "expected a filter name after `|`",
                    ))
                }
            };
            let mut args = Vec::new();
            if self.eat(":") {
                loop {
                    args.push(ok!(self.parse_expr()));
                    if !self.eat(",") {
                        break;
                    }
                }
            }
            rv.push(Filter {
                name: name.to_string(),
                args,
            });
        }
        Ok(rv)
    }

    /// Parses a value followed by its filters.
    pub fn parse_variable(&mut self) -> Result<Variable, Error> {
        let body = lexer::skip_ws(self.rest);
        if body.starts_with('|') {
            return Err(Error::new(
                ErrorKind::EmptyFilter,
                "expected a value before `|`",
            ));
        }
        if !body.starts_with(['"', '\'']) {
            let head = body
                .split(|c: char| c == '|' || lexer::is_ws(c))
                .next()
                .unwrap_or("");
            if head.contains('%') {
                return Err(Error::new(
                    ErrorKind::InvalidVariableName,
                    format!("invalid variable name `{head}`"),
                ));
            }
        }
        let expr = ok!(self.parse_expr());
        let filters = ok!(self.parse_filters());
        Ok(Variable { expr, filters })
    }
}

/// Parses a complete value expression.
pub fn parse_expr(markup: &str) -> Result<Expr, Error> {
    let mut parser = MarkupParser::new(markup);
    let rv = ok!(parser.parse_expr());
    ok!(parser.expect_eof());
    Ok(rv)
}

/// Parses a complete condition chain.
pub fn parse_condition(markup: &str) -> Result<ConditionChain, Error> {
    let mut parser = MarkupParser::new(markup);
    let rv = ok!(parser.parse_condition_chain());
    ok!(parser.expect_eof());
    Ok(rv)
}

/// Parses a complete variable with filters.
pub fn parse_variable(markup: &str) -> Result<Variable, Error> {
    let mut parser = MarkupParser::new(markup);
    let rv = ok!(parser.parse_variable());
    ok!(parser.expect_eof());
    Ok(rv)
}

enum Terminator<'a> {
    Eof,
    End,
    Clause(&'a str, &'a str),
}

struct OpenBlock {
    end: String,
    clauses: &'static [&'static str],
}

/// Parses a document into nodes.
///
/// Whether a `{% name %}` opens a block or stands alone is decided by the
/// registry.
pub struct Parser<'a> {
    tokens: Tokenizer<'a>,
    registry: &'a Registry,
    name: &'a str,
    max_depth: usize,
    depth: usize,
    last_line: u32,
}

impl<'a> Parser<'a> {
    /// Creates a new parser.
    pub fn new(
        source: &'a str,
        name: &'a str,
        registry: &'a Registry,
        max_depth: usize,
    ) -> Parser<'a> {
        Parser {
            tokens: Tokenizer::new(source, name),
            registry,
            name,
            max_depth,
            depth: 0,
            last_line: 1,
        }
    }

    /// Parses the whole document.
    pub fn parse(&mut self) -> Result<Vec<Node>, Error> {
        match self.subparse(None) {
            Ok((nodes, _)) => Ok(nodes),
            Err(mut err) => {
                if err.line().is_none() {
                    err.set_location(self.name, self.last_line as usize);
                }
                Err(err)
            }
        }
    }

    fn subparse(&mut self, open: Option<&OpenBlock>) -> Result<(Vec<Node>, Terminator<'a>), Error> {
        let mut rv = Vec::new();
        while let Some(token) = self.tokens.next() {
            let (token, span) = ok!(token);
            self.last_line = span.start_line;
            match token {
                Token::TemplateData(data) => rv.push(Node::Literal(data.to_string())),
                Token::Variable(body) => {
                    let var = ok!(parse_variable(body));
                    rv.push(Node::Variable(Spanned::new(var, span)));
                }
                Token::Tag(name, markup) => {
                    if let Some(open) = open {
                        if name == open.end {
                            return Ok((rv, Terminator::End));
                        }
                        if open.clauses.contains(&name) {
                            return Ok((rv, Terminator::Clause(name, markup)));
                        }
                    }
                    rv.push(ok!(self.parse_tag(name, markup, span)));
                }
            }
        }
        Ok((rv, Terminator::Eof))
    }

    fn parse_tag(&mut self, name: &'a str, markup: &'a str, span: Span) -> Result<Node, Error> {
        let registry = self.registry;
        let handler = match registry.get(name) {
            Some(handler) => handler,
            None => return Err(self.unknown_tag(name, span)),
        };
        match handler.kind() {
            HandlerKind::Tag => {
                let parsed = ok!(handler.parse(markup));
                Ok(Node::Tag(Spanned::new(
                    TagNode {
                        name: name.to_string(),
                        markup: markup.to_string(),
                        parsed,
                    },
                    span,
                )))
            }
            HandlerKind::Block => {
                self.depth += 1;
                if self.depth > self.max_depth {
                    let mut err = Error::new(
                        ErrorKind::NestingTooDeep,
                        format!("blocks are nested deeper than {} levels", self.max_depth),
                    );
                    err.set_location(self.name, span.start_line as usize);
                    return Err(err);
                }
                let rv = self.parse_block(handler, name, markup, span);
                self.depth -= 1;
                rv
            }
        }
    }

    fn parse_block(
        &mut self,
        handler: &BoxedHandler,
        name: &'a str,
        markup: &'a str,
        span: Span,
    ) -> Result<Node, Error> {
        let parsed = ok!(handler.parse(markup));
        let open = OpenBlock {
            end: format!("end{name}"),
            clauses: handler.clauses(),
        };
        let (body, mut terminator) = ok!(self.subparse(Some(&open)));
        let mut clauses: Vec<Clause> = Vec::new();
        loop {
            match terminator {
                Terminator::End => break,
                Terminator::Eof => {
                    let mut err = Error::new(
                        ErrorKind::UnterminatedBlock,
                        format!("`{name}` is missing its `{}`", open.end),
                    );
                    err.set_location(self.name, span.start_line as usize);
                    return Err(err);
                }
                Terminator::Clause(clause_name, clause_markup) => {
                    if let Some(last) = clauses.last() {
                        if handler.final_clauses().contains(&last.name.as_str()) {
                            let mut err = syntax_error(format!(
                                "`{clause_name}` cannot follow `{}` in `{name}`",
                                last.name
                            ));
                            err.set_location(self.name, self.last_line as usize);
                            return Err(err);
                        }
                    }
                    let parsed = ok!(handler.parse_clause(clause_name, clause_markup));
                    let (body, next) = ok!(self.subparse(Some(&open)));
                    clauses.push(Clause {
                        name: clause_name.to_string(),
                        markup: clause_markup.to_string(),
                        parsed,
                        body,
                    });
                    terminator = next;
                }
            }
        }
        Ok(Node::Block(Spanned::new(
            BlockNode {
                name: name.to_string(),
                markup: markup.to_string(),
                parsed,
                body,
                clauses,
            },
            span,
        )))
    }

    fn unknown_tag(&self, name: &str, span: Span) -> Error {
        let mut err = if name.starts_with("end") {
            syntax_error(format!("unexpected `{name}`"))
        } else if self.registry.is_clause(name) {
            syntax_error(format!("unexpected `{name}` outside of its block"))
        } else {
            Error::new(ErrorKind::UnknownTag, format!("unknown tag `{name}`"))
        };
        err.set_location(self.name, span.start_line as usize);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::compiler::ast::{CompareOp, LogicalOp};

    use similar_asserts::assert_eq;

    fn path(root: &str) -> Expr {
        Expr::Path(Path {
            root: root.into(),
            segments: vec![],
        })
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            parse_expr("a.b[0][\"c\"].size").unwrap(),
            Expr::Path(Path {
                root: "a".into(),
                segments: vec![
                    Segment::Attr("b".into()),
                    Segment::Index(Expr::Const(Value::from(0))),
                    Segment::Index(Expr::Const(Value::from("c"))),
                    Segment::Attr("size".into()),
                ],
            })
        );
        assert_eq!(
            parse_expr("(1..n)").unwrap(),
            Expr::Range(Box::new(Expr::Const(Value::from(1))), Box::new(path("n")))
        );
    }

    #[test]
    fn test_condition_chain() {
        let chain = parse_condition("a >= 1 and b, c contains 'x'").unwrap();
        assert_eq!(
            chain,
            ConditionChain {
                first: Condition::Compare(path("a"), CompareOp::Gte, Expr::Const(Value::from(1))),
                rest: vec![
                    (LogicalOp::And, Condition::Value(path("b"))),
                    (
                        LogicalOp::Or,
                        Condition::Compare(path("c"), CompareOp::Contains, Expr::Const(Value::from("x")))
                    ),
                ],
            }
        );
    }

    #[test]
    fn test_filter_chain_order() {
        let var = parse_variable("x | f1 | f2: 1, 'a'").unwrap();
        let names: Vec<_> = var.filters.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["f1", "f2"]);
        assert_eq!(var.filters[1].args.len(), 2);
    }

    #[test]
    fn test_variable_errors() {
        assert_eq!(
            parse_variable("fo%o").unwrap_err().kind(),
            ErrorKind::InvalidVariableName
        );
        assert_eq!(parse_variable("x |").unwrap_err().kind(), ErrorKind::EmptyFilter);
        assert_eq!(parse_variable("| x").unwrap_err().kind(), ErrorKind::EmptyFilter);
        assert_eq!(parse_variable("x || y").unwrap_err().kind(), ErrorKind::EmptyFilter);
        assert_eq!(parse_variable("").unwrap_err().kind(), ErrorKind::SyntaxError);
    }
}
