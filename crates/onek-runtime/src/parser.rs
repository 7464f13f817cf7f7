use std::{borrow::Cow, fmt::Debug, rc::Rc};

use cranelift_entity::entity_impl;
use regex::Regex;

use crate::{
    ast::{AstId, AstStore},
    checkpoint::Checkpoint,
    error::FailureTracker,
    grammar::Grammar,
    scan::ScanState,
    span::Span,
    trace::{MatchError, Trace},
    Flags, TokenKind, MANY,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ParserId(u32);
entity_impl! { ParserId }

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Repeat {
    pub min: usize,
    pub max: usize,
}

impl Repeat {
    pub const ONCE: Repeat = Repeat::new(1, 1);
    pub const OPTIONAL: Repeat = Repeat::new(0, 1);
    pub const ZERO_OR_MORE: Repeat = Repeat::new(0, MANY);
    pub const ONE_OR_MORE: Repeat = Repeat::new(1, MANY);

    pub const fn new(min: usize, max: usize) -> Repeat {
        Repeat { min, max }
    }
    pub fn is_valid(self) -> bool {
        self.min <= self.max
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::ONCE
    }
}

pub type MatchFn = Rc<dyn Fn(&ScanState<'_>) -> Option<usize>>;

/// Recognizes a single token at the cursor.
#[derive(Clone)]
pub enum Matcher {
    /// Pattern anchored at the cursor, see [`Matcher::regex`].
    Regex(Regex),
    /// The first literal of the list that the input starts with.
    Literals(Vec<Cow<'static, str>>),
    /// Returns the byte length of the token at the cursor.
    Custom(MatchFn),
    /// Matches nothing, but only at the end of the input.
    End,
}

impl Matcher {
    pub fn regex(pattern: &str) -> Result<Matcher, regex::Error> {
        Regex::new(&format!("^(?:{pattern})")).map(Matcher::Regex)
    }

    pub fn literals<S: Into<Cow<'static, str>>>(literals: impl IntoIterator<Item = S>) -> Matcher {
        Matcher::Literals(literals.into_iter().map(Into::into).collect())
    }

    pub fn custom(f: impl Fn(&ScanState<'_>) -> Option<usize> + 'static) -> Matcher {
        Matcher::Custom(Rc::new(f))
    }

    /// Byte length of the token at the cursor.
    ///
    /// Apart from [`Matcher::End`], a match of length zero counts as no match.
    pub fn match_at(&self, scan: &ScanState<'_>) -> Option<usize> {
        let rest = scan.rest();
        let len = match self {
            Matcher::Regex(regex) => regex
                .find(rest)
                .filter(|m| m.start() == 0)
                .map(|m| m.end()),
            Matcher::Literals(literals) => literals
                .iter()
                .find(|literal| !literal.is_empty() && rest.starts_with(literal.as_ref()))
                .map(|literal| literal.len()),
            Matcher::Custom(f) => f(scan).map(|len| usize::min(len, rest.len())),
            Matcher::End => return scan.is_at_end().then_some(0),
        };
        len.filter(|&len| len > 0 && rest.is_char_boundary(len))
    }

    /// Description of the expected input used in diagnostics.
    pub fn describe(&self, name: &str) -> String {
        match self {
            Matcher::Literals(literals) => literals
                .iter()
                .map(|literal| format!("'{literal}'"))
                .collect::<Vec<_>>()
                .join(", "),
            Matcher::End => "end of input".to_owned(),
            Matcher::Regex(_) | Matcher::Custom(_) => name.to_owned(),
        }
    }
}

impl Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Matcher::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Matcher::Literals(literals) => f.debug_tuple("Literals").field(literals).finish(),
            Matcher::Custom(_) => f.write_str("Custom"),
            Matcher::End => f.write_str("End"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Combinator {
    Sequence,
    Choice,
}

#[derive(Clone, Debug)]
pub struct Terminal {
    pub token: TokenKind,
    pub name: Cow<'static, str>,
    pub matcher: Matcher,
    pub repeat: Repeat,
    /// Required between repetitions.
    pub delimiter: Option<Cow<'static, str>>,
    pub flags: Flags,
    pub expected: String,
}

#[derive(Clone, Debug)]
pub struct Composed {
    pub name: Cow<'static, str>,
    pub combinator: Combinator,
    pub left: Option<ParserId>,
    pub right: Option<ParserId>,
    pub repeat: Repeat,
    pub delimiter: Option<Cow<'static, str>>,
    pub flags: Flags,
}

/// A node of a resolved grammar.
#[derive(Clone, Debug)]
pub enum ParserNode {
    Terminal(Terminal),
    Composed(Composed),
}

impl ParserNode {
    pub fn name(&self) -> &str {
        match self {
            ParserNode::Terminal(t) => &t.name,
            ParserNode::Composed(c) => &c.name,
        }
    }
    pub fn set_name(&mut self, name: Cow<'static, str>) {
        match self {
            ParserNode::Terminal(t) => t.name = name,
            ParserNode::Composed(c) => c.name = name,
        }
    }
    pub fn repeat(&self) -> Repeat {
        match self {
            ParserNode::Terminal(t) => t.repeat,
            ParserNode::Composed(c) => c.repeat,
        }
    }
    pub fn delimiter(&self) -> Option<&str> {
        match self {
            ParserNode::Terminal(t) => t.delimiter.as_deref(),
            ParserNode::Composed(c) => c.delimiter.as_deref(),
        }
    }
    /// How often and with what separator the node is matched.
    pub fn repetition_mut(&mut self) -> (&mut Repeat, &mut Option<Cow<'static, str>>) {
        match self {
            ParserNode::Terminal(t) => (&mut t.repeat, &mut t.delimiter),
            ParserNode::Composed(c) => (&mut c.repeat, &mut c.delimiter),
        }
    }
    pub fn flags(&self) -> Flags {
        match self {
            ParserNode::Terminal(t) => t.flags,
            ParserNode::Composed(c) => c.flags,
        }
    }
    pub fn flags_mut(&mut self) -> &mut Flags {
        match self {
            ParserNode::Terminal(t) => &mut t.flags,
            ParserNode::Composed(c) => &mut c.flags,
        }
    }
    pub fn children(&self) -> impl Iterator<Item = ParserId> {
        let (left, right) = match self {
            ParserNode::Terminal(_) => (None, None),
            ParserNode::Composed(c) => (c.left, c.right),
        };
        left.into_iter().chain(right)
    }
}

/// State of a single parse.
pub(crate) struct ParseCx<'a, 't, V> {
    grammar: &'a Grammar<V>,
    pub scan: ScanState<'a>,
    pub ast: AstStore<'a, V>,
    pub failure: FailureTracker,
    trace: &'t mut dyn Trace,
}

impl<'a, 't, V> ParseCx<'a, 't, V> {
    pub fn new(grammar: &'a Grammar<V>, src: &'a str, trace: &'t mut dyn Trace) -> Self {
        ParseCx {
            grammar,
            scan: ScanState::new(src, &grammar.config().whitespace),
            ast: AstStore::new(grammar, src),
            failure: FailureTracker::default(),
            trace,
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint::take(&self.scan, &self.ast)
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        checkpoint.restore(&mut self.scan, &mut self.ast);
    }

    /// Matches `id` at the cursor, on failure the cursor and the store are left untouched.
    ///
    /// `report` decides whether a failing terminal is an error or merely absent, it only
    /// changes which trace event is emitted.
    pub fn parse_node(&mut self, id: ParserId, parent: Option<AstId>, report: bool) -> bool {
        let grammar = self.grammar;
        match grammar.node(id) {
            ParserNode::Terminal(t) => self.parse_terminal(id, t, parent, report),
            ParserNode::Composed(c) => self.parse_composed(id, c, parent, report),
        }
    }

    fn parse_terminal(
        &mut self,
        id: ParserId,
        t: &'a Terminal,
        parent: Option<AstId>,
        mut report: bool,
    ) -> bool {
        if t.repeat.min == 0 {
            report = false;
        }

        let start = self.checkpoint();
        let mut count = 0;
        while count < t.repeat.min {
            if count > 0 {
                if let Some(delimiter) = t.delimiter.as_deref() {
                    if !self.delimiter(delimiter, report) {
                        self.rollback(start);
                        return false;
                    }
                }
            }
            let Some(span) = self.match_terminal(t, report) else {
                self.rollback(start);
                return false;
            };
            self.push_terminal(id, t, parent, span);
            count += 1;
        }

        while count < t.repeat.max {
            let before = self.scan.checkpoint();
            let delimiter = t.delimiter.as_deref().filter(|_| count > 0);
            if let Some(delimiter) = delimiter {
                if !self.scan.match_delimiter(delimiter) {
                    break;
                }
            }
            let Some(span) = self.match_terminal(t, false) else {
                if delimiter.is_some() && !t.flags.contains(Flags::DELIM_AT_END) {
                    self.scan.rollback(before);
                }
                break;
            };
            self.push_terminal(id, t, parent, span);
            count += 1;
            if span.is_empty() {
                break;
            }
        }

        if count > 0 && count == t.repeat.max {
            self.trailing_delimiter(t.delimiter.as_deref(), t.flags);
        }
        true
    }

    fn match_terminal(&mut self, t: &'a Terminal, report: bool) -> Option<Span> {
        let backup = self.scan.checkpoint();
        self.scan.skip_whitespace();

        let start = self.scan.position();
        match t.matcher.match_at(&self.scan) {
            Some(len) => {
                self.scan.advance(len);
                Some(Span::new(start, start + len))
            }
            None => {
                self.failure.record(&self.scan, &t.expected);
                self.report_failure(t.token, &t.expected, report);
                self.scan.rollback(backup);
                None
            }
        }
    }

    fn push_terminal(&mut self, id: ParserId, t: &'a Terminal, parent: Option<AstId>, span: Span) {
        let text = span.as_str(self.scan.src());
        self.trace.match_success(t.token, &t.expected, text);
        self.ast.add_node(Some(id), t.token, &t.name, parent, span, t.flags);
    }

    /// Consumes a delimiter that is required between repetitions.
    fn delimiter(&mut self, delimiter: &str, report: bool) -> bool {
        if self.scan.match_delimiter(delimiter) {
            return true;
        }

        let backup = self.scan.checkpoint();
        self.scan.skip_whitespace();
        let expected = format!("'{delimiter}'");
        self.failure.record(&self.scan, &expected);
        self.report_failure(TokenKind::Delimiter, &expected, report);
        self.scan.rollback(backup);
        false
    }

    /// Consumes a delimiter after the final repetition of a `DELIM_AT_END` node.
    fn trailing_delimiter(&mut self, delimiter: Option<&str>, flags: Flags) {
        if let Some(delimiter) = delimiter.filter(|_| flags.contains(Flags::DELIM_AT_END)) {
            self.scan.match_delimiter(delimiter);
        }
    }

    fn report_failure(&mut self, token: TokenKind, expected: &str, report: bool) {
        if report {
            self.trace.match_error(&MatchError {
                token,
                expected,
                line_number: self.scan.line_number(),
                line: self.scan.line(),
            });
        } else {
            self.trace.match_empty(token, expected);
        }
    }

    fn parse_composed(
        &mut self,
        id: ParserId,
        c: &'a Composed,
        parent: Option<AstId>,
        mut report: bool,
    ) -> bool {
        let preview_length = self.grammar.config().preview_length;
        self.trace.block_entry(&c.name, self.scan.preview(preview_length));

        if c.repeat.min == 0 {
            report = false;
        }

        let start = self.checkpoint();
        let this = self.ast.add_node(
            Some(id),
            TokenKind::Composed,
            &c.name,
            parent,
            Span::at(self.scan.position()),
            c.flags,
        );

        let mut count = 0;
        while count < c.repeat.min {
            if count > 0 {
                if let Some(delimiter) = c.delimiter.as_deref() {
                    if !self.delimiter(delimiter, report) {
                        return self.fail_composed(c, start);
                    }
                }
            }
            if !self.combine(c, this, report) {
                return self.fail_composed(c, start);
            }
            count += 1;
        }

        while count < c.repeat.max {
            let before = self.checkpoint();
            let delimiter = c.delimiter.as_deref().filter(|_| count > 0);
            if let Some(delimiter) = delimiter {
                if !self.scan.match_delimiter(delimiter) {
                    break;
                }
            }
            if !self.combine(c, this, false) {
                self.rollback(before);
                if delimiter.is_some() {
                    self.trailing_delimiter(delimiter, c.flags);
                }
                break;
            }
            // an iteration that consumed nothing would repeat forever
            if self.scan.position() == before.scan.position() {
                self.rollback(before);
                break;
            }
            count += 1;
        }

        if count == 0 {
            self.rollback(start);
        } else if count == c.repeat.max {
            self.trailing_delimiter(c.delimiter.as_deref(), c.flags);
        }
        self.trace.block_exit(&c.name, true);
        true
    }

    fn fail_composed(&mut self, c: &'a Composed, start: Checkpoint) -> bool {
        self.rollback(start);
        self.trace.block_exit(&c.name, false);
        false
    }

    fn combine(&mut self, c: &'a Composed, this: AstId, report: bool) -> bool {
        match c.combinator {
            Combinator::Sequence => {
                self.parse_child(c.left, this, report) && self.parse_child(c.right, this, report)
            }
            Combinator::Choice => {
                self.parse_child(c.left, this, false) || self.parse_child(c.right, this, report)
            }
        }
    }

    fn parse_child(&mut self, child: Option<ParserId>, parent: AstId, report: bool) -> bool {
        match child {
            Some(child) => self.parse_node(child, Some(parent), report),
            None => true,
        }
    }
}
