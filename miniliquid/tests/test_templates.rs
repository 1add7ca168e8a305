use std::collections::BTreeMap;

use similar_asserts::assert_eq;

use miniliquid::value::Value;
use miniliquid::{context, Environment, ErrorKind, ErrorMode, RenderOptions, Signal};

fn render(source: &str, assigns: Value) -> String {
    let env = Environment::new();
    let tmpl = env.parse(source).unwrap();
    env.render(&tmpl, assigns, RenderOptions::new())
        .unwrap()
        .into_string()
}

#[test]
fn test_basic() {
    let rv = render(
        "{% for x in seq %}[{{ x }}]{% endfor %}",
        context!(seq => vec![0, 1, 2]),
    );
    assert_eq!(rv, "[0][1][2]");
}

#[test]
fn test_literals_and_paths() {
    assert_eq!(render("{{ 'hello' }} {{ 42 }} {{ 2.0 }}", context!()), "hello 42 2.0");
    assert_eq!(render("[{{ nil }}][{{ missing.deep }}]", context!()), "[][]");
    assert_eq!(
        render(
            "{{ user.name }} {{ items[1] }} {{ items[-1] }} {{ items.size }}",
            context!(user => context!(name => "Peter"), items => vec!["a", "b", "c"]),
        ),
        "Peter b c 3"
    );
    assert_eq!(
        render("{{ user[key] }}", context!(user => context!(id => 7), key => "id")),
        "7"
    );
}

#[test]
fn test_filter_chain() {
    assert_eq!(
        render("{{ 'hello' | append: ' world' | upcase }}", context!()),
        "HELLO WORLD"
    );
    assert_eq!(
        render("{{ name | upcase | prepend: 'Mr. ' }}", context!(name => "x")),
        "Mr. X"
    );
    assert_eq!(
        render("{{ 'a b c' | split: ' ' | reverse | join: '-' }}", context!()),
        "c-b-a"
    );
    assert_eq!(render("{{ missing | default: 'none' }}", context!()), "none");
}

#[test]
fn test_math_filters() {
    assert_eq!(render("{{ 10 | divided_by: 4 }}", context!()), "2");
    assert_eq!(render("{{ 10.0 | divided_by: 4 }}", context!()), "2.5");
    assert_eq!(render("{{ 3 | times: 1.5 }}", context!()), "4.5");
    assert_eq!(render("{{ -7 | modulo: 3 }}", context!()), "2");
    assert_eq!(render("{{ '5' | plus: 1 }}", context!()), "6");
}

#[test]
fn test_conditions() {
    let tmpl = "{% if n > 10 %}big{% elsif n > 5 %}medium{% else %}small{% endif %}";
    assert_eq!(render(tmpl, context!(n => 20)), "big");
    assert_eq!(render(tmpl, context!(n => 7)), "medium");
    assert_eq!(render(tmpl, context!(n => 1)), "small");

    // evaluated from the right: true or (false and false)
    assert_eq!(
        render("{% if true or false and false %}yes{% endif %}", context!()),
        "yes"
    );
    assert_eq!(
        render(
            "{% if tags contains 'rust' and 'hello' contains 'ell' %}yes{% endif %}",
            context!(tags => vec!["rust", "go"]),
        ),
        "yes"
    );
    assert_eq!(
        render("{% unless done %}todo{% else %}done{% endunless %}", context!()),
        "todo"
    );
    assert_eq!(
        render("{% if missing > 1 %}x{% else %}y{% endif %}", context!()),
        "y"
    );
    assert_eq!(
        render(
            "{% if items == empty %}empty{% endif %}{% if name != blank %}named{% endif %}",
            context!(items => Vec::<i32>::new(), name => "x"),
        ),
        "emptynamed"
    );
    assert_eq!(render("{% if 0 %}zero is true{% endif %}", context!()), "zero is true");
}

#[test]
fn test_long_condition_chains() {
    let mut source = String::from("{% if ");
    for _ in 0..50_000 {
        source.push_str("a or ");
    }
    source.push_str("b %}yes{% else %}no{% endif %}");
    assert_eq!(render(&source, context!(b => true)), "yes");
    assert_eq!(render(&source, context!(b => false)), "no");

    let source = source.replace(" or ", " and ");
    assert_eq!(render(&source, context!(a => true, b => true)), "yes");
    assert_eq!(render(&source, context!(b => true)), "no");
}

#[test]
fn test_case() {
    let tmpl = "{% case x %}{% when 1 %}one{% when 2, 3 %}few{% else %}many{% endcase %}";
    assert_eq!(render(tmpl, context!(x => 1)), "one");
    assert_eq!(render(tmpl, context!(x => 3)), "few");
    assert_eq!(render(tmpl, context!(x => 9)), "many");
    assert_eq!(
        render(
            "{% case s %}{% when 'a' or 'b' %}ab{% endcase %}",
            context!(s => "b")
        ),
        "ab"
    );
}

#[test]
fn test_for_loop() {
    assert_eq!(
        render(
            "{% for x in items %}{{ forloop.index }}/{{ forloop.length }}\
             {% unless forloop.last %},{% endunless %}{% endfor %}",
            context!(items => vec!["a", "b", "c"]),
        ),
        "1/3,2/3,3/3"
    );
    assert_eq!(
        render(
            "{% for x in items %}{{ x }}{% else %}none{% endfor %}",
            context!(items => Vec::<i32>::new()),
        ),
        "none"
    );
    assert_eq!(
        render(
            "{% for x in (1..6) limit: 3 offset: 1 reversed %}{{ x }}{% endfor %}",
            context!()
        ),
        "432"
    );
    assert_eq!(
        render(
            "{% for pair in map %}{{ pair[0] }}={{ pair[1] }};{% endfor %}",
            context!(map => context!(a => 1, b => 2)),
        ),
        "a=1;b=2;"
    );
}

#[test]
fn test_loop_variables_are_scoped() {
    assert_eq!(
        render(
            "{% for x in (1..2) %}{% assign last = x %}{% endfor %}[{{ x }}][{{ last }}]",
            context!()
        ),
        "[][2]"
    );
}

#[test]
fn test_break_and_continue() {
    assert_eq!(
        render(
            "{% for x in (1..5) %}{% if x == 2 %}{% continue %}{% endif %}\
             {% if x == 4 %}{% break %}{% endif %}{{ x }}{% endfor %}",
            context!()
        ),
        "13"
    );

    // only the innermost loop is left
    assert_eq!(
        render(
            "{% for a in (1..2) %}{% for b in (1..3) %}{% if b == 2 %}{% break %}\
             {% endif %}{{ a }}{{ b }} {% endfor %}{% endfor %}",
            context!()
        ),
        "11 21 "
    );
}

#[test]
fn test_signal_outside_loop() {
    let env = Environment::new();
    let tmpl = env.parse("a{% break %}b").unwrap();
    let rendered = env.render(&tmpl, (), RenderOptions::new()).unwrap();
    assert_eq!(rendered.to_string(), "a");
    assert_eq!(rendered.context().signal(), Signal::Break);
}

#[test]
fn test_assign_and_capture() {
    let env = Environment::new();
    let tmpl = env
        .parse(
            "{% assign greeting = 'hi' | upcase %}\
             {% capture msg %}{{ greeting }} there{% endcapture %}{{ msg }}!",
        )
        .unwrap();
    let rendered = env.render(&tmpl, (), RenderOptions::new()).unwrap();
    assert_eq!(rendered.to_string(), "HI there!");
    assert_eq!(
        rendered.context().globals().get("msg"),
        Some(&Value::from("HI there"))
    );
    assert_eq!(rendered.context().lookup("greeting"), Value::from("HI"));
}

#[test]
fn test_counters() {
    let env = Environment::new();
    let tmpl = env
        .parse("{% increment c %}{% increment c %}{% decrement d %}{% decrement d %}")
        .unwrap();
    let rendered = env.render(&tmpl, (), RenderOptions::new()).unwrap();
    assert_eq!(rendered.to_string(), "01-1-2");
    assert_eq!(
        rendered.context().register("counter:c"),
        Some(&Value::from(2))
    );

    let mut registers = BTreeMap::new();
    registers.insert("counter:c".to_string(), Value::from(10));
    let rendered = env
        .render(&tmpl, (), RenderOptions::new().with_registers(registers))
        .unwrap();
    assert_eq!(rendered.to_string(), "1011-1-2");
}

#[test]
fn test_lax_errors() {
    let rv = render("a{{ x | nope }}b{{ 1 | divided_by: 0 }}c", context!(x => 1));
    assert_eq!(
        rv,
        "aunknown filter: unknown filter `nope`binvalid operation: divided by 0c"
    );
}

#[test]
fn test_strict_errors() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("miniliquid=debug")
        .with_test_writer()
        .try_init();
    let mut env = Environment::new();
    env.set_error_mode(ErrorMode::Strict);
    let tmpl = env.parse("a\n{{ x | nope }}b{{ x | plus }}c").unwrap();
    let rendered = env
        .render(&tmpl, context!(x => 1), RenderOptions::new())
        .unwrap();
    assert_eq!(rendered.to_string(), "a\nbc");
    let errors = rendered.errors();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].kind(), ErrorKind::UnknownFilter);
    assert_eq!(errors[0].line(), Some(2));
    assert_eq!(errors[1].kind(), ErrorKind::InvalidArguments);
    assert_eq!(errors[1].detail(), Some("missing argument"));

    let err = env.render_str("{{ 1 | nope }}", ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownFilter);
}

#[test]
fn test_structured_output() {
    let env = Environment::new();
    let tmpl = env
        .parse("a{{ b }}c{% for x in (1..2) %}{{ x }}{% endfor %}{{ missing }}")
        .unwrap();
    let rendered = env
        .render(
            &tmpl,
            context!(b => "B"),
            RenderOptions::new().with_stringify_output(false),
        )
        .unwrap();
    assert_eq!(
        rendered.output().fragments(),
        Some(&["a", "B", "c", "1", "2"].map(String::from)[..])
    );
    assert_eq!(rendered.into_string(), "aBc12");
}

#[test]
fn test_escape_variables() {
    let env = Environment::new();
    let tmpl = env.parse("var s = \"{{ s }}\"; {{ n }}").unwrap();
    let rendered = env
        .render(
            &tmpl,
            context!(s => "a\"b\n</script>", n => 42),
            RenderOptions::new().with_escape_variables(true),
        )
        .unwrap();
    assert_eq!(rendered.to_string(), "var s = \"a\\\"b\\n<\\/script>\"; 42");
}

#[test]
fn test_escape_variables_covers_inline_errors() {
    let env = Environment::new();
    let tmpl = env.parse("var s = '{{ s | plus: 1 }}';").unwrap();
    let assigns = context!(s => "';alert(1);//</script>");
    let rendered = env
        .render(&tmpl, assigns.clone(), RenderOptions::new().with_escape_variables(true))
        .unwrap();
    assert_eq!(
        rendered.to_string(),
        "var s = 'invalid operation: could not convert \\\"\\';alert(1);//<\\/script>\\\" to a number';"
    );

    let rendered = env.render(&tmpl, assigns, RenderOptions::new()).unwrap();
    assert_eq!(
        rendered.to_string(),
        "var s = 'invalid operation: could not convert \"';alert(1);//</script>\" to a number';"
    );
}

#[test]
fn test_global_filter() {
    let env = Environment::new();
    let tmpl = env.parse("{{ a }}-{{ b | append: 'z' }}!").unwrap();
    let rendered = env
        .render(
            &tmpl,
            context!(a => "x", b => "y"),
            RenderOptions::new()
                .with_global_filter(|value| Ok(Value::from(value.to_string().to_uppercase()))),
        )
        .unwrap();
    assert_eq!(rendered.to_string(), "X-YZ!");
}

#[test]
fn test_comment() {
    assert_eq!(
        render("a{% comment %}{{ secret }}{% endcomment %}b", context!(secret => 1)),
        "ab"
    );
}
