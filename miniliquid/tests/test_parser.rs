use similar_asserts::assert_eq;

use miniliquid::syntax::{parse_condition, CompareOp, Condition, Expr, LogicalOp, MarkupParser, Node};
use miniliquid::value::Value;
use miniliquid::{Environment, ErrorKind};

#[test]
fn test_unknown_tag() {
    let env = Environment::new();
    let err = env.parse("hello\n{% nope %}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownTag);
    assert_eq!(err.line(), Some(2));
    insta::assert_snapshot!(err.to_string(), @"unknown tag: unknown tag `nope` (in <string>:2)");
}

#[test]
fn test_unterminated_block() {
    let env = Environment::new();
    let err = env
        .parse_named("page", "line1\n{% if x %}\nfoo\n{% for y in z %}{% endfor %}")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnterminatedBlock);
    assert_eq!(err.name(), Some("page"));
    assert_eq!(err.line(), Some(2));
    assert_eq!(err.detail(), Some("`if` is missing its `endif`"));
}

#[test]
fn test_stray_end_and_clause_tags() {
    let env = Environment::new();
    let err = env.parse("{% endif %}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert_eq!(err.detail(), Some("unexpected `endif`"));

    let err = env.parse("a {% else %} b").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert_eq!(err.detail(), Some("unexpected `else` outside of its block"));

    let err = env.parse("{% if a %}{% endfor %}{% endif %}").unwrap_err();
    assert_eq!(err.detail(), Some("unexpected `endfor`"));
}

#[test]
fn test_clauses_after_else() {
    let env = Environment::new();
    let err = env
        .parse("{% if a %}1{% else %}2\n{% elsif b %}3{% endif %}")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert_eq!(err.detail(), Some("`elsif` cannot follow `else` in `if`"));
    assert_eq!(err.line(), Some(2));

    let err = env
        .parse("{% for x in y %}{% else %}{% else %}{% endfor %}")
        .unwrap_err();
    assert_eq!(err.detail(), Some("`else` cannot follow `else` in `for`"));
    assert!(env
        .parse("{% unless a %}{% else %}{% else %}{% endunless %}")
        .is_err());

    // `case` checks every `when` in order, even after `else`
    assert!(env
        .parse("{% case a %}{% when 1 %}{% else %}{% when 2 %}{% endcase %}")
        .is_ok());
    assert!(env
        .parse("{% if a %}{% elsif b %}{% elsif c %}{% else %}{% endif %}")
        .is_ok());
}

#[test]
fn test_variable_errors() {
    let env = Environment::new();
    assert_eq!(
        env.parse("{{ fo%o }}").unwrap_err().kind(),
        ErrorKind::InvalidVariableName
    );
    assert_eq!(
        env.parse("{{ x | }}").unwrap_err().kind(),
        ErrorKind::EmptyFilter
    );
    assert_eq!(
        env.parse("{{ | upcase }}").unwrap_err().kind(),
        ErrorKind::EmptyFilter
    );
    assert_eq!(
        env.parse("{{ x").unwrap_err().kind(),
        ErrorKind::SyntaxError
    );
}

#[test]
fn test_markup_errors() {
    let env = Environment::new();
    let err = env.parse("\n\n{% assign = 1 %}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert_eq!(err.line(), Some(3));
    assert_eq!(
        env.parse("{% for x items %}{% endfor %}").unwrap_err().kind(),
        ErrorKind::SyntaxError
    );
    assert_eq!(
        env.parse("{% if %}{% endif %}").unwrap_err().kind(),
        ErrorKind::SyntaxError
    );
}

#[test]
fn test_nesting_limit() {
    let mut env = Environment::new();
    env.set_max_nesting_depth(2);
    let source = "{% if a %}{% if b %}{% if c %}{% endif %}{% endif %}{% endif %}";
    let err = env.parse(source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NestingTooDeep);
    assert!(env.parse("{% if a %}{% if b %}{% endif %}{% endif %}").is_ok());

    env.set_max_nesting_depth(3);
    assert!(env.parse(source).is_ok());
}

#[test]
fn test_node_structure() {
    let env = Environment::new();
    let tmpl = env
        .parse("a{{ b }}{% assign c = 1 %}{% if d %}e{% else %}f{% endif %}")
        .unwrap();
    let nodes = tmpl.nodes();
    assert_eq!(nodes.len(), 4);
    assert_eq!(nodes[0], Node::Literal("a".into()));
    assert!(matches!(nodes[1], Node::Variable(_)));
    match &nodes[2] {
        Node::Tag(tag) => {
            assert_eq!(tag.name, "assign");
            assert_eq!(tag.markup.trim(), "c = 1");
        }
        other => panic!("unexpected node {other:?}"),
    }
    match &nodes[3] {
        Node::Block(block) => {
            assert_eq!(block.name, "if");
            assert_eq!(block.body, vec![Node::Literal("e".into())]);
            assert_eq!(block.clauses.len(), 1);
            assert_eq!(block.clauses[0].name, "else");
            assert_eq!(block.clauses[0].body, vec![Node::Literal("f".into())]);
        }
        other => panic!("unexpected node {other:?}"),
    }
}

#[test]
fn test_empty_source() {
    let env = Environment::new();
    let tmpl = env.parse("").unwrap();
    assert_eq!(tmpl.nodes(), &[Node::Literal(String::new())][..]);
    assert_eq!(env.render_str("", ()).unwrap(), "");

    let tmpl = env.parse("just { text } here").unwrap();
    assert_eq!(tmpl.nodes(), &[Node::Literal("just { text } here".into())][..]);
}

#[test]
fn test_conditions() {
    let chain = parse_condition("a >= 1, b <> 'x' and c").unwrap();
    match &chain.first {
        Condition::Compare(_, op, Expr::Const(value)) => {
            assert_eq!(*op, CompareOp::Gte);
            assert_eq!(value, &Value::from(1));
        }
        other => panic!("unexpected condition {other:?}"),
    }
    let ops = chain.rest.iter().map(|x| x.0).collect::<Vec<_>>();
    assert_eq!(ops, vec![LogicalOp::Or, LogicalOp::And]);
    assert!(matches!(chain.rest[0].1, Condition::Compare(_, CompareOp::Ne, _)));
}

#[test]
fn test_markup_parser() {
    let mut parser = MarkupParser::new("product with: 'title', 3 flag");
    assert_eq!(parser.parse_name().unwrap(), "product");
    assert!(parser.eat_keyword("with"));
    parser.expect(":").unwrap();
    assert_eq!(parser.parse_expr().unwrap(), Expr::Const(Value::from("title")));
    assert!(parser.eat(","));
    assert_eq!(parser.parse_expr().unwrap(), Expr::Const(Value::from(3)));
    assert!(!parser.is_eof());
    assert_eq!(parser.rest(), "flag");
    assert!(parser.expect_eof().is_err());
}
