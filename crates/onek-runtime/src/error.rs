use std::cell::RefCell;

use thiserror::Error;

use crate::{scan::ScanState, span::MAX_INPUT_LEN};

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("placeholder '{name}' does not name any enclosing production")]
    UnresolvedPlaceholder { name: String },
    #[error("invalid pattern for terminal '{name}'")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid repeat bounds {min}..{max} for '{name}'")]
    InvalidRepeat { name: String, min: usize, max: usize },
    #[error("'{name}' is not a placeholder and cannot be bound")]
    NotAPlaceholder { name: String },
    #[error("binding of placeholder '{name}' never reaches a production")]
    UnresolvedBinding { name: String },
}

/// Errors found while building a grammar, reported once it is resolved.
#[derive(Default)]
pub(crate) struct ErrorAccumulator {
    errors: RefCell<Vec<GrammarError>>,
}

impl ErrorAccumulator {
    pub fn error(&self, err: GrammarError) {
        self.errors.borrow_mut().push(err);
    }
    pub fn take(&self) -> Vec<GrammarError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }
}

/// The furthest point the input could be matched up to and what was expected there.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
#[error("in line {line_number} error: expected {}\n    text: '{line}'", expected_list(.expected))]
pub struct ParseFailure {
    pub position: usize,
    pub line_number: usize,
    /// One based character column.
    pub column: usize,
    pub line: String,
    pub expected: Vec<String>,
}

impl ParseFailure {
    /// Fails for inputs whose offsets do not fit a [`Span`](crate::Span).
    pub(crate) fn check_input_len(len: usize) -> Result<(), ParseFailure> {
        if len <= MAX_INPUT_LEN {
            return Ok(());
        }
        Err(ParseFailure {
            position: 0,
            line_number: 1,
            column: 1,
            line: String::new(),
            expected: vec![format!("at most {MAX_INPUT_LEN} bytes of input")],
        })
    }
}

fn expected_list(expected: &[String]) -> String {
    match expected {
        [] => "more input".to_owned(),
        [single] => single.clone(),
        [init @ .., last] => format!("{} or {last}", init.join(", ")),
    }
}

/// Tracks the failed match attempt that got furthest into the input.
///
/// Attempts are recorded whether or not the enclosing rule reports them, a choice that later
/// succeeds may still have tried the terminal that explains a failure further on.
#[derive(Default)]
pub(crate) struct FailureTracker {
    furthest: Option<(usize, usize, usize)>,
    expected: Vec<String>,
}

impl FailureTracker {
    pub fn record(&mut self, scan: &ScanState<'_>, expected: &str) {
        let position = scan.position();
        match self.furthest {
            Some((furthest, ..)) if furthest > position => return,
            Some((furthest, ..)) if furthest == position => {}
            _ => {
                self.furthest = Some((position, scan.line_number(), scan.line_start()));
                self.expected.clear();
            }
        }
        if !self.expected.iter().any(|e| e == expected) {
            self.expected.push(expected.to_owned());
        }
    }

    pub fn finish(self, src: &str) -> ParseFailure {
        let (position, line_number, line_start) = self.furthest.unwrap_or((0, 1, 0));
        let line = src.get(line_start..).unwrap_or_default();
        let line = line
            .split('\n')
            .next()
            .unwrap_or_default()
            .trim_end_matches('\r');
        let column = src
            .get(line_start..position)
            .map_or(1, |before| before.chars().count() + 1);

        ParseFailure {
            position,
            line_number,
            column,
            line: line.to_owned(),
            expected: self.expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FailureTracker, ParseFailure};
    use crate::{scan::ScanState, span::MAX_INPUT_LEN};

    #[test]
    fn rejects_inputs_longer_than_spans() {
        assert!(ParseFailure::check_input_len(MAX_INPUT_LEN).is_ok());
        let failure = ParseFailure::check_input_len(MAX_INPUT_LEN + 1).unwrap_err();
        assert_eq!(failure.position, 0);
        assert_eq!(
            failure.to_string(),
            "in line 1 error: expected at most 4294967295 bytes of input\n    text: ''"
        );
    }

    #[test]
    fn keeps_furthest_attempts() {
        let src = "ab\ncd ";
        let mut scan = ScanState::new(src, " \n");
        let mut tracker = FailureTracker::default();

        tracker.record(&scan, "x");
        scan.advance(2);
        tracker.record(&scan, "int_number");
        tracker.record(&scan, "'('");
        tracker.record(&scan, "'('");

        let mut behind = ScanState::new(src, " \n");
        behind.advance(1);
        tracker.record(&behind, "y");

        let failure = tracker.finish(src);
        assert_eq!(failure.position, 3);
        assert_eq!(failure.line_number, 2);
        assert_eq!(failure.column, 1);
        assert_eq!(failure.line, "cd ");
        assert_eq!(
            failure.to_string(),
            "in line 2 error: expected int_number or '('\n    text: 'cd '"
        );
    }
}
