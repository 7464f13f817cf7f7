use std::collections::VecDeque;

use log::Level;

use crate::TokenKind;

/// A terminal that failed to match where its enclosing rule required it.
#[derive(Clone, Copy, Debug)]
pub struct MatchError<'a> {
    pub token: TokenKind,
    pub expected: &'a str,
    pub line_number: usize,
    pub line: &'a str,
}

/// Receiver of the events of a parse.
///
/// Every method defaults to doing nothing.
pub trait Trace {
    fn block_entry(&mut self, _name: &str, _preview: &str) {}
    fn block_exit(&mut self, _name: &str, _success: bool) {}
    fn match_success(&mut self, _token: TokenKind, _expected: &str, _text: &str) {}
    /// A terminal that was allowed to be absent did not match.
    fn match_empty(&mut self, _token: TokenKind, _expected: &str) {}
    fn match_error(&mut self, _error: &MatchError<'_>) {}
}

pub struct NoTrace;
impl Trace for NoTrace {}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn render_entry(depth: usize, name: &str, preview: &str) -> String {
    format!("{}{name} <- '{preview}'", indent(depth))
}

fn render_exit(depth: usize, name: &str, success: bool) -> String {
    let result = if success { "ok" } else { "failed" };
    format!("{}{name} {result}", indent(depth))
}

fn render_success(depth: usize, token: TokenKind, expected: &str, text: &str) -> String {
    format!("{}{} {expected} matched '{text}'", indent(depth), token.name())
}

fn render_empty(depth: usize, token: TokenKind, expected: &str) -> String {
    format!("{}{} {expected} absent", indent(depth), token.name())
}

fn render_error(depth: usize, error: &MatchError<'_>) -> String {
    format!(
        "{}in line {} error: expected token '{}' {}\n{}    text: '{}'",
        indent(depth),
        error.line_number,
        error.token.name(),
        error.expected,
        indent(depth),
        error.line
    )
}

/// Forwards events to the `log` facade, flow at trace level and reported errors at debug level.
#[derive(Default)]
pub struct LogTrace {
    depth: usize,
}

impl LogTrace {
    pub fn new() -> LogTrace {
        LogTrace::default()
    }
}

impl Trace for LogTrace {
    fn block_entry(&mut self, name: &str, preview: &str) {
        if log::log_enabled!(Level::Trace) {
            log::trace!("{}", render_entry(self.depth, name, preview));
        }
        self.depth += 1;
    }
    fn block_exit(&mut self, name: &str, success: bool) {
        self.depth = self.depth.saturating_sub(1);
        if log::log_enabled!(Level::Trace) {
            log::trace!("{}", render_exit(self.depth, name, success));
        }
    }
    fn match_success(&mut self, token: TokenKind, expected: &str, text: &str) {
        if log::log_enabled!(Level::Trace) {
            log::trace!("{}", render_success(self.depth, token, expected, text));
        }
    }
    fn match_empty(&mut self, token: TokenKind, expected: &str) {
        if log::log_enabled!(Level::Trace) {
            log::trace!("{}", render_empty(self.depth, token, expected));
        }
    }
    fn match_error(&mut self, error: &MatchError<'_>) {
        if log::log_enabled!(Level::Debug) {
            log::debug!("{}", render_error(self.depth, error));
        }
    }
}

/// Keeps the most recent rendered events.
pub struct TraceBuffer {
    messages: VecDeque<String>,
    capacity: usize,
    depth: usize,
}

impl TraceBuffer {
    pub fn new(capacity: usize) -> TraceBuffer {
        TraceBuffer {
            messages: VecDeque::with_capacity(capacity),
            capacity,
            depth: 0,
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> + '_ {
        self.messages.iter().map(String::as_str)
    }
    pub fn len(&self) -> usize {
        self.messages.len()
    }
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
    pub fn clear(&mut self) {
        self.messages.clear();
        self.depth = 0;
    }

    pub fn display_into(&self, buf: &mut dyn std::fmt::Write) -> std::fmt::Result {
        for message in &self.messages {
            writeln!(buf, "{message}")?;
        }
        Ok(())
    }

    fn push(&mut self, message: String) {
        if self.capacity == 0 {
            return;
        }
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }
}

impl Trace for TraceBuffer {
    fn block_entry(&mut self, name: &str, preview: &str) {
        self.push(render_entry(self.depth, name, preview));
        self.depth += 1;
    }
    fn block_exit(&mut self, name: &str, success: bool) {
        self.depth = self.depth.saturating_sub(1);
        self.push(render_exit(self.depth, name, success));
    }
    fn match_success(&mut self, token: TokenKind, expected: &str, text: &str) {
        self.push(render_success(self.depth, token, expected, text));
    }
    fn match_empty(&mut self, token: TokenKind, expected: &str) {
        self.push(render_empty(self.depth, token, expected));
    }
    fn match_error(&mut self, error: &MatchError<'_>) {
        self.push(render_error(self.depth, error));
    }
}

impl std::fmt::Display for TraceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display_into(f)
    }
}
