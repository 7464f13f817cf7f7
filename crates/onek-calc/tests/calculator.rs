use onek_calc::{evaluate, grammar, CalcError, Failure, Value};
use onek_runtime::{graph::DotGraph, Config};
use rstest::rstest;

#[rstest]
#[case("1 + 1", 2)]
#[case("1 - 2 + 3", 2)]
#[case("2 * 3", 6)]
#[case("2 + 3 * 7", 23)]
#[case("(2 + 3) * 7", 35)]
#[case("(2 + -3) * 7", -7)]
#[case("(2 -  3) * -7", 7)]
#[case("10 - (2 * 10) + 30", 20)]
#[case("10 - 2 * 2", 6)]
#[case("100 / 10 / 5", 2)]
#[case("-(4)", -4)]
#[case("((((1))))", 1)]
#[case("1 +\n 2 *\n 3", 7)]
fn integer_expressions(#[case] text: &str, #[case] expected: i64) {
    let grammar = grammar(Config::default()).unwrap();
    assert_eq!(evaluate(&grammar, text).unwrap(), Value::Int(expected));
}

#[rstest]
#[case("1.5 * 2", 3.0)]
#[case(".5 + .25", 0.75)]
#[case("3 / 2.0", 1.5)]
fn float_expressions(#[case] text: &str, #[case] expected: f64) {
    let grammar = grammar(Config::default()).unwrap();
    assert_eq!(evaluate(&grammar, text).unwrap(), Value::Float(expected));
}

#[test]
fn incomplete_expression() {
    let grammar = grammar(Config::default()).unwrap();
    let Err(Failure::Parse(failure)) = evaluate(&grammar, "1 + ") else {
        panic!("`1 + ` should not parse");
    };
    assert_eq!(failure.position, 4);
    assert_eq!(
        failure.expected,
        ["'-'", "float_number", "int_number", "'('"]
    );
    assert_eq!(
        failure.to_string(),
        "in line 1 error: expected '-', float_number, int_number or '('\n    text: '1 + '"
    );
}

#[test]
fn unbalanced_brackets() {
    let grammar = grammar(Config::default()).unwrap();
    let Err(Failure::Parse(failure)) = evaluate(&grammar, "(1 + 2") else {
        panic!("missing `)` should not parse");
    };
    assert_eq!(failure.position, 6);
    assert!(failure.expected.contains(&"')'".to_owned()));
}

#[test]
fn evaluation_errors() {
    let grammar = grammar(Config::default()).unwrap();
    assert!(matches!(
        evaluate(&grammar, "1 / (2 - 2)"),
        Err(Failure::Eval(CalcError::DivisionByZero))
    ));
    assert!(matches!(
        evaluate(&grammar, "9223372036854775807 + 1"),
        Err(Failure::Eval(CalcError::Overflow))
    ));
}

#[test]
fn custom_whitespace() {
    let config = Config {
        whitespace: " _".to_owned(),
        ..Config::default()
    };
    let grammar = grammar(config).unwrap();
    assert_eq!(evaluate(&grammar, "1_+__2").unwrap(), Value::Int(3));
    assert!(evaluate(&grammar, "1\n+ 2").is_err());
}

#[test]
fn tree_is_flattened_per_precedence_level() {
    let grammar = grammar(Config::default()).unwrap();
    let ast = grammar.parse("(2 + 3) * 7").unwrap();
    insta::assert_snapshot!(ast.to_string(), @r"
    program
      expression
        term
          factor (...)
            expression
              term
                factor
                  int_number '2'
              func '+'
              term
                factor
                  int_number '3'
          func '*'
          factor
            int_number '7'
      the_end ''
    ");
}

#[test]
fn graphviz_export() {
    let grammar = grammar(Config::default()).unwrap();
    let ast = grammar.parse("1 + 2").unwrap();
    let mut graph = DotGraph::new();
    ast.export_graph(&mut graph);

    let dot = graph.to_string();
    assert!(dot.starts_with("digraph {\n"));
    assert!(dot.contains("[label=\"func\\n+\"]"));
    assert!(dot.contains("[label=\"int_number\\n2\"]"));
    assert_eq!(dot.matches(" -> ").count(), 9);
}
