//! Lexical primitives and the document tokenizer.
//!
//! The primitives operate on the remaining input and return the recognized
//! item together with the rest of the input.  They never allocate and never
//! consume anything on failure, which lets the parser try alternatives in a
//! fixed order.

use crate::compiler::ast::{CompareOp, LogicalOp};
use crate::compiler::tokens::{Span, Token};
use crate::error::{Error, ErrorKind};
use crate::value::Value;

const VARIABLE_START: &str = "{{";
const VARIABLE_END: &str = "}}";
const BLOCK_START: &str = "{%";
const BLOCK_END: &str = "%}";

/// Checks if a character is template whitespace.
#[inline(always)]
pub fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Skips a run of whitespace of any length, including none.
#[inline]
pub fn skip_ws(input: &str) -> &str {
    input.trim_start_matches(is_ws)
}

fn trim_ws(input: &str) -> &str {
    input.trim_matches(is_ws)
}

/// Splits off the literal text up to the next `{{` or `{%`.
///
/// The literal may be empty and the delimiter is left in the rest.
pub fn literal_text(input: &str) -> (&str, &str) {
    let bytes = input.as_bytes();
    let mut offset = 0;
    while let Some(idx) = bytes[offset..].iter().position(|&b| b == b'{') {
        let pos = offset + idx;
        if matches!(bytes.get(pos + 1), Some(b'{' | b'%')) {
            return input.split_at(pos);
        }
        offset = pos + 1;
    }
    (input, "")
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Recognizes a name (`[A-Za-z_][A-Za-z0-9_-]*` with an optional trailing `?`).
///
/// Leading whitespace is skipped.
pub fn name(input: &str) -> Option<(&str, &str)> {
    let input = skip_ws(input);
    if !input.starts_with(is_name_start) {
        return None;
    }
    let mut end = input
        .find(|c: char| !is_name_continue(c))
        .unwrap_or(input.len());
    if input[end..].starts_with('?') {
        end += 1;
    }
    Some(input.split_at(end))
}

/// Recognizes a filter name: any run without `:`, `|`, `}` or whitespace.
pub fn filter_name(input: &str) -> Option<(&str, &str)> {
    let input = skip_ws(input);
    let end = input
        .find(|c: char| matches!(c, ':' | '|' | '}') || is_ws(c))
        .unwrap_or(input.len());
    if end == 0 {
        None
    } else {
        Some(input.split_at(end))
    }
}

/// Recognizes a single or double quoted token and returns its contents.
///
/// The quoted run may not contain a comma or the matching quote.
pub fn quoted(input: &str) -> Option<(&str, &str)> {
    let input = skip_ws(input);
    let quote = input.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let body = &input[1..];
    let end = body.find(|c: char| c == quote || c == ',')?;
    if body[end..].starts_with(quote) {
        Some((&body[..end], &body[end + 1..]))
    } else {
        None
    }
}

/// Recognizes an integer or a float literal with an optional minus sign.
pub fn number(input: &str) -> Option<(Value, &str)> {
    let input = skip_ws(input);
    let bytes = input.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    let digits_start = end;
    while bytes.get(end).map_or(false, u8::is_ascii_digit) {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    let mut is_float = false;
    if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).map_or(false, u8::is_ascii_digit) {
        is_float = true;
        end += 1;
        while bytes.get(end).map_or(false, u8::is_ascii_digit) {
            end += 1;
        }
    }
    if input[end..].starts_with(is_name_start) {
        return None;
    }
    let (num, rest) = input.split_at(end);
    let value = if is_float {
        Value::from(num.parse::<f64>().ok()?)
    } else {
        match num.parse::<i64>() {
            Ok(val) => Value::from(val),
            Err(_) => Value::from(num.parse::<f64>().ok()?),
        }
    };
    Some((value, rest))
}

/// Checks that a keyword is not just the prefix of a longer name.
fn keyword<'a>(input: &'a str, word: &str) -> Option<&'a str> {
    let rest = input.strip_prefix(word)?;
    if rest.starts_with(|c: char| is_name_continue(c) || c == '?') {
        None
    } else {
        Some(rest)
    }
}

/// Recognizes a comparison operator.
///
/// Alternatives are tried longest first so that `>=` is never read as `>`.
pub fn comparison_op(input: &str) -> Option<(CompareOp, &str)> {
    let input = skip_ws(input);
    for (token, op) in [
        ("==", CompareOp::Eq),
        (">=", CompareOp::Gte),
        ("<=", CompareOp::Lte),
        ("!=", CompareOp::Ne),
        ("<>", CompareOp::Ne),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
    ] {
        if let Some(rest) = input.strip_prefix(token) {
            return Some((op, rest));
        }
    }
    keyword(input, "contains").map(|rest| (CompareOp::Contains, rest))
}

/// Recognizes a logical operator; a bare comma reads as `or`.
pub fn logical_op(input: &str) -> Option<(LogicalOp, &str)> {
    let input = skip_ws(input);
    if let Some(rest) = input.strip_prefix(',') {
        Some((LogicalOp::Or, rest))
    } else if let Some(rest) = keyword(input, "and") {
        Some((LogicalOp::And, rest))
    } else {
        keyword(input, "or").map(|rest| (LogicalOp::Or, rest))
    }
}

/// Consumes a punctuation token after optional whitespace.
pub fn punct<'a>(input: &'a str, token: &str) -> Option<&'a str> {
    skip_ws(input).strip_prefix(token)
}

/// Tokenizes a template document.
pub struct Tokenizer<'s> {
    name: &'s str,
    rest: &'s str,
    current_line: u32,
    current_col: u32,
    emitted: bool,
    failed: bool,
}

impl<'s> Tokenizer<'s> {
    /// Creates a new tokenizer.
    pub fn new(input: &'s str, name: &'s str) -> Tokenizer<'s> {
        Tokenizer {
            name,
            rest: input,
            current_line: 1,
            current_col: 0,
            emitted: false,
            failed: false,
        }
    }

    #[inline]
    fn loc(&self) -> (u32, u32) {
        (self.current_line, self.current_col)
    }

    fn span(&self, (start_line, start_col): (u32, u32)) -> Span {
        Span {
            start_line,
            start_col,
            end_line: self.current_line,
            end_col: self.current_col,
        }
    }

    fn advance(&mut self, bytes: usize) -> &'s str {
        let (skipped, new_rest) = self.rest.split_at(bytes);
        for c in skipped.chars() {
            match c {
                '\n' => {
                    self.current_line += 1;
                    self.current_col = 0;
                }
                _ => self.current_col += 1,
            }
        }
        self.rest = new_rest;
        skipped
    }

    fn syntax_error(&mut self, msg: &'static str) -> Error {
        self.failed = true;
        let mut err = Error::new(ErrorKind::SyntaxError, msg);
        err.set_location(self.name, self.current_line as usize);
        err
    }

    fn next_token(&mut self) -> Result<Option<(Token<'s>, Span)>, Error> {
        if self.rest.is_empty() {
            // an empty document still has one (empty) literal
            if self.emitted {
                return Ok(None);
            }
            self.emitted = true;
            return Ok(Some((Token::TemplateData(""), self.span(self.loc()))));
        }
        self.emitted = true;
        let old_loc = self.loc();

        if self.rest.starts_with(VARIABLE_START) {
            let end = match self.rest[VARIABLE_START.len()..].find(VARIABLE_END) {
                Some(end) => end,
                None => return Err(self.syntax_error("unexpected end of variable block")),
            };
            let body = self.advance(VARIABLE_START.len() + end + VARIABLE_END.len());
            let body = &body[VARIABLE_START.len()..body.len() - VARIABLE_END.len()];
            return Ok(Some((Token::Variable(trim_ws(body)), self.span(old_loc))));
        }

        if self.rest.starts_with(BLOCK_START) {
            let end = match self.rest[BLOCK_START.len()..].find(BLOCK_END) {
                Some(end) => end,
                None => return Err(self.syntax_error("unexpected end of block")),
            };
            let inner = self.advance(BLOCK_START.len() + end + BLOCK_END.len());
            let inner = &inner[BLOCK_START.len()..inner.len() - BLOCK_END.len()];
            let (tag_name, markup) = match name(inner) {
                Some(rv) => rv,
                None => return Err(self.syntax_error("expected tag name")),
            };
            return Ok(Some((
                Token::Tag(tag_name, trim_ws(markup)),
                self.span(old_loc),
            )));
        }

        let (lead, _) = literal_text(self.rest);
        let lead = self.advance(lead.len());
        Ok(Some((Token::TemplateData(lead), self.span(old_loc))))
    }
}

impl<'s> Iterator for Tokenizer<'s> {
    type Item = Result<(Token<'s>, Span), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.next_token().transpose()
    }
}

/// Tokenizes the source.
#[cfg(any(test, feature = "unstable_machinery"))]
pub fn tokenize<'s>(
    input: &'s str,
    name: &'s str,
) -> impl Iterator<Item = Result<(Token<'s>, Span), Error>> {
    Tokenizer::new(input, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn tokens(input: &str) -> Vec<Token<'_>> {
        tokenize(input, "<string>")
            .map(|rv| rv.map(|(token, _)| token))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_plain_text_is_one_literal() {
        assert_eq!(tokens(""), vec![Token::TemplateData("")]);
        assert_eq!(
            tokens("just { text }"),
            vec![Token::TemplateData("just { text }")]
        );
    }

    #[test]
    fn test_literal_stops_at_delimiter() {
        assert_eq!(literal_text("stop in {{"), ("stop in ", "{{"));
        assert_eq!(literal_text("a {% b"), ("a ", "{% b"));
        assert_eq!(literal_text("{{"), ("", "{{"));
    }

    #[test]
    fn test_whitespace_never_fails() {
        assert_eq!(skip_ws(""), "");
        assert_eq!(skip_ws("x"), "x");
        assert_eq!(skip_ws(" \t\r\n x"), "x");
    }

    #[test]
    fn test_tag_whitespace_is_insignificant() {
        assert_eq!(tokens("{%   tag %}"), tokens("{%tag%}"));
        assert_eq!(
            tokens("{%\n assign  x = 1\t%}"),
            vec![Token::Tag("assign", "x = 1")]
        );
    }

    #[test]
    fn test_names() {
        assert_eq!(name("  foo-bar_1? rest"), Some(("foo-bar_1?", " rest")));
        assert_eq!(name("1abc"), None);
        assert_eq!(filter_name(" upcase: 1"), Some(("upcase", ": 1")));
        assert_eq!(filter_name(" | x"), None);
    }

    #[test]
    fn test_quoted() {
        assert_eq!(quoted("'hello' x"), Some(("hello", " x")));
        assert_eq!(quoted("\"it's\""), Some(("it's", "")));
        assert_eq!(quoted("'a,b'"), None);
        assert_eq!(quoted("'open"), None);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(number("42 "), Some((Value::from(42), " ")));
        assert_eq!(number("-1.5"), Some((Value::from(-1.5), "")));
        assert_eq!(number("1..5"), Some((Value::from(1), "..5")));
        assert_eq!(number("12abc"), None);
        assert_eq!(number("-"), None);
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(comparison_op(">= 1"), Some((CompareOp::Gte, " 1")));
        assert_eq!(comparison_op("> 1"), Some((CompareOp::Gt, " 1")));
        assert_eq!(comparison_op("<=1"), Some((CompareOp::Lte, "1")));
        assert_eq!(comparison_op(" contains 'x'"), Some((CompareOp::Contains, " 'x'")));
        assert_eq!(comparison_op("containsx"), None);
        assert_eq!(logical_op(", b"), Some((LogicalOp::Or, " b")));
        assert_eq!(logical_op(" and b"), Some((LogicalOp::And, " b")));
        assert_eq!(logical_op("order"), None);
    }

    #[test]
    fn test_spans() {
        let spans: Vec<_> = tokenize("a\n{{ x }}\n{% y %}", "<string>")
            .map(|rv| rv.unwrap().1.start_line)
            .collect();
        assert_eq!(spans, vec![1, 2, 2, 3]);
    }

    #[test]
    fn test_unclosed_variable() {
        let err = tokenize("stop in {{", "<string>").find_map(Result::err).unwrap();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert_eq!(err.detail(), Some("unexpected end of variable block"));
    }
}
