use onek_runtime::{Flags, Grammar, GrammarBuilder, Node, NoTrace, TokenKind, TraceBuffer};
use rstest::rstest;

fn text(node: Node<'_, '_, String>) -> String {
    node.text().to_owned()
}

fn join(node: Node<'_, '_, String>) -> String {
    node.children()
        .map(|child| child.eval())
        .collect::<Vec<_>>()
        .join(" ")
}

fn count_idents(node: Node<'_, '_, usize>) -> usize {
    node.children()
        .filter(|child| child.token() == TokenKind::Ident)
        .count()
}

fn sum(node: Node<'_, '_, usize>) -> usize {
    node.children()
        .filter(|child| child.token() == TokenKind::IntNumber)
        .map(|child| child.eval())
        .sum()
}

fn parse_int(node: Node<'_, '_, usize>) -> usize {
    node.text().parse().unwrap_or_default()
}

#[test]
fn failed_alternative_leaves_no_nodes() {
    let b = GrammarBuilder::new(text);
    let a = b.literals(TokenKind::Ident, ["a"]);
    let x = b.literals(TokenKind::Ident, ["b"]);
    let c = b.literals(TokenKind::Ident, ["c"]);
    let root = ((a >> x) | (a >> c)).named("root").action(join).id();
    let grammar = b.resolve_placeholders(root).unwrap();

    let ast = grammar.parse("a c").unwrap();
    assert_eq!(ast.execute().as_deref(), Some("a c"));
    // root, the right sequence and its two terminals
    assert_eq!(ast.len(), 4);
    insta::assert_snapshot!(ast.to_string(), @r"
    root
      ident 'a'
      ident 'c'
    ");
}

fn repeated_xs() -> Grammar<usize> {
    let b = GrammarBuilder::new(|_: Node<'_, '_, usize>| 0);
    let xs = b.literals(TokenKind::Ident, ["x"]).repeat(2, 3);
    let root = (xs >> b.end_of_input())
        .named("xs")
        .action(count_idents)
        .id();
    b.resolve_placeholders(root).unwrap()
}

#[rstest]
#[case("", None)]
#[case("x", None)]
#[case("xx", Some(2))]
#[case("x x x", Some(3))]
#[case("x x x x", None)]
fn repeat_bounds(#[case] text: &str, #[case] expected: Option<usize>) {
    let grammar = repeated_xs();
    let count = grammar.parse(text).ok().and_then(|ast| ast.execute());
    assert_eq!(count, expected);
}

#[test]
fn repeat_stops_at_max() {
    let grammar = repeated_xs();
    let failure = grammar.parse("xxxx").unwrap_err();
    assert_eq!(failure.position, 3);
    assert_eq!(failure.expected, ["end of input"]);
}

#[test]
fn empty_iterations_terminate() {
    let b = GrammarBuilder::new(|_: Node<'_, '_, usize>| 0);
    let x = b.literals(TokenKind::Ident, ["x"]).optional();
    let y = b.literals(TokenKind::Ident, ["y"]).optional();
    let root = ((x >> y).zero_or_more() >> b.end_of_input())
        .named("root")
        .action(count_idents)
        .id();
    let grammar = b.resolve_placeholders(root).unwrap();

    assert_eq!(grammar.parse("").unwrap().execute(), Some(0));
    assert_eq!(grammar.parse("x y x").unwrap().execute(), Some(3));
}

#[test]
fn choice_commits_to_first_success() {
    let b = GrammarBuilder::new(text);
    let short = b.literals(TokenKind::Ident, ["a"]);
    let long = b.literals(TokenKind::Ident, ["ab"]);
    let first = ((short | long) >> b.end_of_input()).named("first").id();
    let second = ((long | short) >> b.end_of_input()).named("second").id();
    let grammar = b.resolve_placeholders(first).unwrap();

    assert!(grammar.parse("ab").is_err());
    let ast = grammar
        .parse_with(second, "ab", &mut NoTrace)
        .unwrap();
    assert_eq!(ast.execute().as_deref(), Some("ab"));
}

#[test]
fn choice_never_tries_later_alternatives() {
    let b = GrammarBuilder::new(text);
    let short = b.literals(TokenKind::Ident, ["a"]);
    let long = b.literals(TokenKind::Ident, ["ab"]);
    let root = ((short | long) >> b.end_of_input()).named("root").id();
    let grammar = b.resolve_placeholders(root).unwrap();

    let mut trace = TraceBuffer::new(grammar.config().trace_capacity);
    grammar.parse_with(root, "a", &mut trace).unwrap();
    assert!(trace
        .messages()
        .any(|m| m.trim_start() == "ident 'a' matched 'a'"));
    assert!(!trace.messages().any(|m| m.contains("'ab'")));
}

#[test]
fn failed_alternative_restores_enclosing_root() {
    let b = GrammarBuilder::new(text);
    let open = b.literals(TokenKind::Open, ["("]);
    let paren = b.literals(TokenKind::Delimiter, ["("]);
    let a = b.literals(TokenKind::Ident, ["a"]);
    let x = b.literals(TokenKind::Ident, ["x"]);
    let c = b.literals(TokenKind::Ident, ["c"]);
    let backtracking = ((open >> a >> x) | (paren >> a >> c))
        .named("root")
        .action(join)
        .id();
    let direct = (paren >> a >> c).named("root").action(join).id();
    let grammar = b.resolve_placeholders(backtracking).unwrap();

    let ast = grammar.parse("(a c").unwrap();
    let expected = grammar.parse_with(direct, "(a c", &mut NoTrace).unwrap();

    let root = ast.node(ast.root().unwrap());
    assert!(!root.is_bracketed());
    let children: Vec<_> = root.children().map(|child| child.text()).collect();
    assert_eq!(children, ["(", "a", "c"]);
    assert_eq!(ast.to_string(), expected.to_string());
    // the choice, both sequences of the right alternative and its three terminals
    assert_eq!(ast.len(), 6);
}

#[test]
fn delimited_repetition() {
    let b = GrammarBuilder::new(parse_int);
    let ints = b
        .regex(TokenKind::IntNumber, "[0-9]+")
        .one_or_more()
        .separated_by(",");
    let strict = (ints >> b.end_of_input()).named("strict").action(sum).id();
    let trailing = ints.clone_node().with_flags(Flags::DELIM_AT_END);
    let lenient = (trailing >> b.end_of_input())
        .named("lenient")
        .action(sum)
        .id();
    let grammar = b.resolve_placeholders(strict).unwrap();

    assert_eq!(grammar.parse("1, 2 ,3").unwrap().execute(), Some(6));
    assert_eq!(grammar.parse("1 2").unwrap_err().position, 2);
    let failure = grammar.parse("1,2,").unwrap_err();
    assert_eq!(failure.position, 4);
    assert_eq!(failure.expected, ["int_number"]);

    let ast = grammar
        .parse_with(lenient, "1,2,", &mut NoTrace)
        .unwrap();
    assert_eq!(ast.execute(), Some(3));
}

#[test]
fn trailing_delimiter_after_last_repetition() {
    let b = GrammarBuilder::new(|_: Node<'_, '_, usize>| 0);
    let x = b.literals(TokenKind::Ident, ["x"]);
    let pair = x.repeat(2, 2).separated_by(";");
    let strict = (pair >> b.end_of_input())
        .named("strict")
        .action(count_idents)
        .id();
    let trailing = pair.clone_node().with_flags(Flags::DELIM_AT_END);
    let lenient = (trailing >> b.end_of_input())
        .named("lenient")
        .action(count_idents)
        .id();
    let grammar = b.resolve_placeholders(strict).unwrap();

    assert_eq!(grammar.parse("x;x").unwrap().execute(), Some(2));
    assert!(grammar.parse("x;x;").is_err());

    for text in ["x;x", "x ; x ;"] {
        let ast = grammar.parse_with(lenient, text, &mut NoTrace).unwrap();
        assert_eq!(ast.execute(), Some(2));
    }
    assert!(grammar.parse_with(lenient, "x;x;;", &mut NoTrace).is_err());
}

#[test]
fn delimited_composed_repetition() {
    let b = GrammarBuilder::new(|_: Node<'_, '_, usize>| 0);
    let key = b.regex(TokenKind::Ident, "[a-z]+");
    let value = b.regex(TokenKind::IntNumber, "[0-9]+");
    let entry = (key >> value).named("entry");
    let entries = entry.one_or_more().separated_by(",");
    let strict = (entries >> b.end_of_input())
        .named("strict")
        .action(count_idents)
        .id();
    let trailing = entries.clone_node().with_flags(Flags::DELIM_AT_END);
    let lenient = (trailing >> b.end_of_input())
        .named("lenient")
        .action(count_idents)
        .id();
    let pair = entry
        .repeat(2, 2)
        .separated_by(",")
        .with_flags(Flags::DELIM_AT_END);
    let exact = (pair >> b.end_of_input())
        .named("exact")
        .action(count_idents)
        .id();
    let grammar = b.resolve_placeholders(strict).unwrap();

    assert_eq!(grammar.parse("a 1, b 2 ,c 3").unwrap().execute(), Some(3));
    let failure = grammar.parse("a 1, b").unwrap_err();
    assert_eq!(failure.position, 6);
    assert_eq!(failure.expected, ["int_number"]);
    assert!(grammar.parse("a 1, b 2,").is_err());

    let ast = grammar
        .parse_with(lenient, "a 1, b 2,", &mut NoTrace)
        .unwrap();
    assert_eq!(ast.execute(), Some(2));

    let ast = grammar.parse_with(exact, "a 1, b 2,", &mut NoTrace).unwrap();
    assert_eq!(ast.execute(), Some(2));
    assert!(grammar.parse_with(exact, "a 1", &mut NoTrace).is_err());
}

#[test]
fn failure_reports_furthest_position() {
    let b = GrammarBuilder::new(parse_int);
    let int = b.regex(TokenKind::IntNumber, "[0-9]+");
    let plus = b.literals(TokenKind::Func, ["+"]);
    let root = (int >> (plus >> int).zero_or_more() >> b.end_of_input())
        .named("sum")
        .action(sum)
        .id();
    let grammar = b.resolve_placeholders(root).unwrap();

    let mut trace = TraceBuffer::new(grammar.config().trace_capacity);
    let failure = grammar.parse_with(root, "1 + ", &mut trace).unwrap_err();
    assert_eq!(failure.position, 4);
    assert_eq!(failure.line_number, 1);
    assert_eq!(failure.column, 5);
    assert_eq!(
        failure.to_string(),
        "in line 1 error: expected int_number\n    text: '1 + '"
    );
    assert!(trace.messages().any(|m| m == "sum <- '1 + '"));
    assert!(trace.messages().any(|m| m == "sum failed"));
}

#[test]
fn failure_on_later_line() {
    let b = GrammarBuilder::new(parse_int);
    let int = b.regex(TokenKind::IntNumber, "[0-9]+");
    let root = (int.one_or_more() >> b.end_of_input())
        .named("ints")
        .action(sum)
        .id();
    let grammar = b.resolve_placeholders(root).unwrap();

    let failure = grammar.parse("1\n2\n  x 3").unwrap_err();
    assert_eq!(failure.line_number, 3);
    assert_eq!(failure.column, 3);
    assert_eq!(failure.line, "  x 3");
}

#[test]
fn recursion_through_placeholder() {
    let b = GrammarBuilder::new(text);
    let item = b.regex(TokenKind::Ident, "[a-z]+");
    let open = b.literals(TokenKind::Open, ["("]);
    let close = b.literals(TokenKind::Close, [")"]);
    let nested = b.placeholder("list", true).zero_or_more();
    let list = (item | (open >> nested >> close)).named("list").action(join);
    let root = (list >> b.end_of_input()).named("program").id();
    let grammar = b.resolve_placeholders(root).unwrap();

    let ast = grammar.parse("(a (b c))").unwrap();
    insta::assert_snapshot!(ast.to_string(), @r"
    start
      list (...)
        list (...)
          ident 'a'
          list
            ident 'b'
            ident 'c'
      the_end ''
    ");
    assert_eq!(ast.execute().as_deref(), Some("a b c"));
}

#[test]
fn parsing_is_repeatable() {
    let b = GrammarBuilder::new(text);
    let word = b.regex(TokenKind::Ident, "[a-z]+");
    let root = (word.one_or_more() >> b.end_of_input())
        .named("words")
        .action(join)
        .id();
    let grammar = b.resolve_placeholders(root).unwrap();

    let first = grammar.parse("one two three").unwrap();
    let second = grammar.parse("one two three").unwrap();
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.execute(), second.execute());
    assert_eq!(first.len(), second.len());
}

#[test]
fn custom_matcher() {
    let b = GrammarBuilder::new(text);
    let statement = b.custom(TokenKind::Custom(1), |scan| scan.rest().find(';'));
    let semicolon = b.literals(TokenKind::Delimiter, [";"]);
    let root = (statement >> semicolon)
        .one_or_more()
        .named("statements")
        .action(join)
        .id();
    let grammar = b.resolve_placeholders(root).unwrap();

    let ast = grammar.parse("let a = 1; a;").unwrap();
    assert_eq!(ast.execute().as_deref(), Some("let a = 1 ; a ;"));
    assert!(grammar.parse(";").is_err());
}

#[test]
fn invalid_grammar_is_reported() {
    let b = GrammarBuilder::new(text);
    let broken = b.regex(TokenKind::Ident, "[a-z");
    let root = broken.repeat(3, 1).id();

    let err = b.resolve_placeholders(root).unwrap_err();
    assert!(matches!(
        err,
        onek_runtime::GrammarError::InvalidPattern { .. }
    ));
}
