//! Backtracking parser combinators whose matches build an action tree.
//!
//! A grammar is assembled from terminals with [`GrammarBuilder`], sealed by
//! [`GrammarBuilder::resolve_placeholders`] and can then parse any number of inputs. Every parse
//! produces an [`AstStore`] whose action roots are evaluated with [`AstStore::execute`].

pub mod arena;
pub mod ast;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod grammar;
pub mod graph;
pub mod parser;
pub mod scan;
pub mod span;
pub mod trace;

mod resolve;

use bitflags::bitflags;

pub use ast::{AstId, AstNode, AstStore, Node};
pub use config::Config;
pub use error::{GrammarError, ParseFailure};
pub use grammar::{Action, Grammar, GrammarBuilder, Rule};
pub use parser::{Combinator, Matcher, ParserId, ParserNode, Repeat};
pub use span::Span;
pub use trace::{LogTrace, NoTrace, Trace, TraceBuffer};

/// Upper repeat bound standing in for "unbounded".
pub const MANY: usize = 1_000_000;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TokenKind {
    Error,
    End,
    Ident,
    IntNumber,
    FloatNumber,
    Delimiter,
    /// Opening bracket, never attached to an action root.
    Open,
    /// Closing bracket, never attached to an action root.
    Close,
    Func,
    HigherOrderFunction,
    Composed,
    /// Application defined token.
    Custom(u16),
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Error => "error",
            TokenKind::End => "the_end",
            TokenKind::Ident => "ident",
            TokenKind::IntNumber => "int_number",
            TokenKind::FloatNumber => "float_number",
            TokenKind::Delimiter => "delimiter",
            TokenKind::Open => "open",
            TokenKind::Close => "close",
            TokenKind::Func => "func",
            TokenKind::HigherOrderFunction => "higher_order_function",
            TokenKind::Composed => "composed",
            TokenKind::Custom(_) => "custom",
        }
    }

    pub fn is_bracket(self) -> bool {
        matches!(self, TokenKind::Open | TokenKind::Close)
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct Flags: u16 {
        /// A trailing delimiter after the last repetition is consumed.
        const DELIM_AT_END = 8;
        /// Node holds a semantic action and collects the flattened children below it.
        const ACTION_ROOT = 16;
        const PREFIX = 32;
        const INFIX = 64;
        const POSTFIX = 128;
        const PLACEHOLDER = 256;
    }
}

#[test]
fn token_names() {
    assert_eq!(TokenKind::IntNumber.name(), "int_number");
    assert_eq!(TokenKind::End.name(), "the_end");
    assert!(TokenKind::Open.is_bracket());
    assert!(!TokenKind::Func.is_bracket());
}
