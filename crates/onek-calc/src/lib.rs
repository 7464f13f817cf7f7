//! Arithmetic expressions over integers and floats, built on `onek-runtime`.
//!
//! ```text
//! program         = expression END
//! expression      = term (("+" | "-") term)*
//! term            = factor (("*" | "/") factor)*
//! factor          = "-"? unsigned_factor
//! unsigned_factor = float | int | "(" expression ")"
//! ```
//!
//! The repetitions are written right recursively, flattening collects every operand and
//! operator of one precedence level under a single node which is then folded left to right.

use std::fmt::Display;

use onek_runtime::{
    Config, Flags, Grammar, GrammarBuilder, GrammarError, Node, ParseFailure, TokenKind,
};
use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Value {
    Int(i64),
    Char(char),
    Float(f64),
}

impl Value {
    fn operator(self) -> Result<char, CalcError> {
        match self {
            Value::Char(c) => Ok(c),
            other => Err(CalcError::NotAnOperator(other)),
        }
    }

    fn negate(self) -> Eval {
        match self {
            Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(CalcError::Overflow),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Char(_) => Err(CalcError::NotANumber(self)),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Char(c) => write!(f, "'{c}'"),
            Value::Float(x) => write!(f, "{x}"),
        }
    }
}

#[derive(Clone, PartialEq, Debug, Error)]
pub enum CalcError {
    #[error("expected a number, found {0}")]
    NotANumber(Value),
    #[error("expected an operator, found {0}")]
    NotAnOperator(Value),
    #[error("unknown operator '{0}'")]
    UnknownOperator(char),
    #[error("operator '{0}' is missing its right operand")]
    MissingOperand(char),
    #[error("'{0}' has no operands")]
    Empty(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
}

pub type Eval = Result<Value, CalcError>;

#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    #[error(transparent)]
    Eval(#[from] CalcError),
}

/// Value of a token, used for every node without children or action.
fn leaf(node: Node<'_, '_, Eval>) -> Eval {
    let text = node.text();
    match node.token() {
        TokenKind::Func => text
            .chars()
            .next()
            .map(Value::Char)
            .ok_or_else(|| CalcError::UnexpectedToken(text.to_owned())),
        TokenKind::IntNumber => text
            .parse()
            .map(Value::Int)
            .map_err(|_| CalcError::InvalidNumber(text.to_owned())),
        TokenKind::FloatNumber => text
            .parse()
            .map(Value::Float)
            .map_err(|_| CalcError::InvalidNumber(text.to_owned())),
        _ => Err(CalcError::UnexpectedToken(node.name().to_owned())),
    }
}

/// Applies an optional prefix (or postfix) operator to its operand.
fn unary(node: Node<'_, '_, Eval>) -> Eval {
    let mut children = node.children();
    let Some(first) = children.next() else {
        return Err(CalcError::Empty(node.name().to_owned()));
    };
    let Some(second) = children.next() else {
        return first.eval();
    };

    let (op, operand) = if node.flags().contains(Flags::POSTFIX) {
        (second, first)
    } else {
        (first, second)
    };
    let value = operand.eval()?;
    match op.eval()?.operator()? {
        '-' => value.negate(),
        '+' => Ok(value),
        other => Err(CalcError::UnknownOperator(other)),
    }
}

/// Folds `operand (operator operand)*` from the left.
fn arithmetic(node: Node<'_, '_, Eval>) -> Eval {
    let mut children = node.children();
    let Some(first) = children.next() else {
        return Err(CalcError::Empty(node.name().to_owned()));
    };

    let mut acc = first.eval()?;
    while let Some(op) = children.next() {
        let op = op.eval()?.operator()?;
        let right = children.next().ok_or(CalcError::MissingOperand(op))?;
        acc = apply(op, acc, right.eval()?)?;
    }
    Ok(acc)
}

fn apply(op: char, left: Value, right: Value) -> Eval {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => {
            let result = match op {
                '+' => l.checked_add(r),
                '-' => l.checked_sub(r),
                '*' => l.checked_mul(r),
                '/' if r == 0 => return Err(CalcError::DivisionByZero),
                '/' => l.checked_div(r),
                other => return Err(CalcError::UnknownOperator(other)),
            };
            result.map(Value::Int).ok_or(CalcError::Overflow)
        }
        (Value::Char(_), _) => Err(CalcError::NotANumber(left)),
        (_, Value::Char(_)) => Err(CalcError::NotANumber(right)),
        (l, r) => {
            let (l, r) = (as_float(l), as_float(r));
            match op {
                '+' => Ok(Value::Float(l + r)),
                '-' => Ok(Value::Float(l - r)),
                '*' => Ok(Value::Float(l * r)),
                '/' if r == 0.0 => Err(CalcError::DivisionByZero),
                '/' => Ok(Value::Float(l / r)),
                other => Err(CalcError::UnknownOperator(other)),
            }
        }
    }
}

fn as_float(value: Value) -> f64 {
    match value {
        Value::Int(i) => i as f64,
        Value::Float(f) => f,
        Value::Char(_) => f64::NAN,
    }
}

pub fn grammar(config: Config) -> Result<Grammar<Eval>, GrammarError> {
    let b = GrammarBuilder::with_config(config, leaf);

    let the_end = b.end_of_input();
    let int_number = b.regex(TokenKind::IntNumber, "[0-9]+");
    let float_number = b.regex(TokenKind::FloatNumber, "[0-9]*[.][0-9]+");
    let open = b.literals(TokenKind::Open, ["("]);
    let close = b.literals(TokenKind::Close, [")"]);
    let prefix_op = |ops: &[&'static str]| {
        b.literals(TokenKind::Func, ops.iter().copied())
            .with_flags(Flags::PREFIX)
    };
    let infix_op = |ops: &[&'static str]| {
        b.literals(TokenKind::Func, ops.iter().copied())
            .with_flags(Flags::INFIX)
    };

    // `expression` is found among the enclosing rules, the `_x` helpers are never enclosing
    // their own placeholder and have to be bound
    let p_expression = b.placeholder("expression", true);
    let p_expression_x = b.placeholder("expression_x", false);
    let p_term_x = b.placeholder("term_x", false);

    let sub_expression = (open >> p_expression >> close).named("sub_expression");
    let unsigned_factor = (float_number | int_number | sub_expression).named("unsigned_factor");
    let factor = (prefix_op(&["-"]).optional() >> unsigned_factor)
        .named("factor")
        .action(unary);
    let term_x = (factor >> (infix_op(&["*", "/"]) >> p_term_x).zero_or_more()).named("term_x");
    let term = term_x.clone_node().named("term").action(arithmetic);
    let expression_x =
        (term >> (infix_op(&["+", "-"]) >> p_expression_x).zero_or_more()).named("expression_x");
    let expression = expression_x
        .clone_node()
        .named("expression")
        .action(arithmetic);
    let program = (expression >> the_end)
        .named("program")
        .with_flags(Flags::ACTION_ROOT);

    p_expression_x.bind(expression_x);
    p_term_x.bind(term_x);

    let root = program.id();
    b.resolve_placeholders(root)
}

/// Parses and evaluates `text`.
pub fn evaluate(grammar: &Grammar<Eval>, text: &str) -> Result<Value, Failure> {
    let ast = grammar.parse(text)?;
    let value = ast
        .execute()
        .unwrap_or_else(|| Err(CalcError::Empty(text.to_owned())))?;
    Ok(value)
}
