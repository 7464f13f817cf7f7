/// Saved cursor of a [`ScanState`], see [`ScanState::checkpoint`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ScanCheckpoint {
    position: usize,
    line_start: usize,
    line_number: usize,
}

impl ScanCheckpoint {
    pub fn position(self) -> usize {
        self.position
    }
}

/// Cursor into the input buffer of a parse.
///
/// The cursor only ever moves forward, except through [`ScanState::rollback`].
#[derive(Clone, Debug)]
pub struct ScanState<'a> {
    src: &'a str,
    whitespace: &'a str,
    position: usize,
    line_start: usize,
    line_number: usize,
}

impl<'a> ScanState<'a> {
    pub fn new(src: &'a str, whitespace: &'a str) -> ScanState<'a> {
        ScanState {
            src,
            whitespace,
            position: 0,
            line_start: 0,
            line_number: 1,
        }
    }

    pub fn src(&self) -> &'a str {
        self.src
    }
    pub fn position(&self) -> usize {
        self.position
    }
    pub fn end(&self) -> usize {
        self.src.len()
    }
    /// One based line number of the cursor.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
    pub fn line_start(&self) -> usize {
        self.line_start
    }
    /// One based character column of the cursor.
    pub fn column(&self) -> usize {
        self.src[self.line_start..self.position].chars().count() + 1
    }
    pub fn rest(&self) -> &'a str {
        &self.src[self.position..]
    }
    pub fn is_at_end(&self) -> bool {
        self.position >= self.src.len()
    }

    /// Text of the line the cursor is on, without the line terminator.
    pub fn line(&self) -> &'a str {
        let line = &self.src[self.line_start..];
        match line.find('\n') {
            Some(end) => line[..end].trim_end_matches('\r'),
            None => line,
        }
    }

    /// At most `max_chars` characters of upcoming input.
    pub fn preview(&self, max_chars: usize) -> &'a str {
        let rest = self.rest();
        match rest.char_indices().nth(max_chars) {
            Some((end, _)) => &rest[..end],
            None => rest,
        }
    }

    pub fn checkpoint(&self) -> ScanCheckpoint {
        ScanCheckpoint {
            position: self.position,
            line_start: self.line_start,
            line_number: self.line_number,
        }
    }

    pub fn rollback(&mut self, checkpoint: ScanCheckpoint) {
        debug_assert!(checkpoint.position <= self.src.len());
        self.position = checkpoint.position;
        self.line_start = checkpoint.line_start;
        self.line_number = checkpoint.line_number;
    }

    pub fn skip_whitespace(&mut self) {
        let rest = self.rest();
        for c in rest.chars() {
            if !self.whitespace.contains(c) {
                break;
            }
            self.bump(c);
        }
    }

    /// Moves the cursor past `count` bytes and then past any whitespace that follows.
    pub fn advance(&mut self, count: usize) {
        let src = self.src;
        let end = usize::min(self.position + count, src.len());
        debug_assert!(src.is_char_boundary(end), "Advancing into a character");

        let consumed = &src[self.position..end];
        for c in consumed.chars() {
            self.bump(c);
        }
        self.skip_whitespace();
    }

    /// Consumes `delimiter` if it is the next non-whitespace text.
    pub fn match_delimiter(&mut self, delimiter: &str) -> bool {
        if delimiter.is_empty() {
            return false;
        }

        let backup = self.checkpoint();
        self.skip_whitespace();
        if self.rest().starts_with(delimiter) {
            self.advance(delimiter.len());
            return true;
        }

        self.rollback(backup);
        false
    }

    fn bump(&mut self, c: char) {
        self.position += c.len_utf8();
        if c == '\n' {
            self.line_number += 1;
            self.line_start = self.position;
        }
    }
}
